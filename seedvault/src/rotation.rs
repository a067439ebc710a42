//! Key-set lifecycle: active/inactive status and rotation lineage
//!
//! Every stored label has a [`RotationState`]. A label starts ACTIVE when it
//! is first saved. Rotating it saves a successor record under a new label,
//! which starts ACTIVE and points back at its origin, and then marks the
//! old label INACTIVE with a history entry pointing forward. Old records
//! are never deleted by rotation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::vault::SessionKey;
use crate::error::{Error, Result};
use crate::keyset::{verify_seed_consistency, Manifest};
use crate::storage::{KeySetBackend, KeySetStore};

/// One rotation away from a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEvent {
    pub rotated_at: DateTime<Utc>,
    pub rotated_to: String,
    pub reason: String,
}

/// Lifecycle state of one label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    pub label: String,
    pub active: bool,
    pub activated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_from: Option<String>,
    #[serde(default)]
    pub rotation_history: Vec<RotationEvent>,
}

impl RotationState {
    pub fn new_active(label: &str, rotated_from: Option<&str>) -> Self {
        Self {
            label: label.to_string(),
            active: true,
            activated_at: Utc::now(),
            deactivated_at: None,
            rotated_from: rotated_from.map(str::to_string),
            rotation_history: Vec::new(),
        }
    }

    /// Mark active. Already-active states get a fresh `activated_at`.
    pub fn activate(&mut self) {
        self.active = true;
        self.activated_at = Utc::now();
    }

    /// Mark inactive. Returns false if it already was.
    pub fn deactivate(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.deactivated_at = Some(Utc::now());
        true
    }

    fn record_rotation(&mut self, rotated_to: &str, reason: &str) {
        self.deactivate();
        self.rotation_history.push(RotationEvent {
            rotated_at: Utc::now(),
            rotated_to: rotated_to.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Drives lifecycle transitions through a [`KeySetStore`]
pub struct RotationManager<'a, B: KeySetBackend> {
    store: &'a KeySetStore<B>,
}

impl<'a, B: KeySetBackend> RotationManager<'a, B> {
    pub fn new(store: &'a KeySetStore<B>) -> Self {
        Self { store }
    }

    pub fn activate(&self, label: &str) -> Result<RotationState> {
        let mut state = self.store.state(label)?;
        state.activate();
        self.store.put_state(&state)?;

        tracing::info!(label, "activated key set");
        Ok(state)
    }

    pub fn deactivate(&self, label: &str) -> Result<RotationState> {
        let mut state = self.store.state(label)?;
        if state.deactivate() {
            self.store.put_state(&state)?;
            tracing::info!(label, "deactivated key set");
        }
        Ok(state)
    }

    pub fn set_active(&self, label: &str, active: bool) -> Result<RotationState> {
        if active {
            self.activate(label)
        } else {
            self.deactivate(label)
        }
    }

    /// Rotate `old` to a new label and return it.
    ///
    /// `old` is only mutated once the successor is durably saved. If that
    /// last step fails the successor is removed again.
    pub fn rotate(&self, old: &str, reason: &str, key: &SessionKey) -> Result<String> {
        let mut state = self.store.state(old)?;
        if !state.active {
            return Err(Error::Validation(format!("Key set '{}' is not active", old)));
        }

        let record = self.store.load(old, Some(key))?;
        let successor = record.successor(old, reason);

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let new_label = self.store.unique_label(&format!("{}_rotated_{}", old, timestamp))?;
        self.store.save_with_state(
            &successor,
            &new_label,
            key,
            RotationState::new_active(&new_label, Some(old)),
        )?;

        state.record_rotation(&new_label, reason);
        if let Err(e) = self.store.put_state(&state) {
            if let Err(cleanup) = self.store.delete(&new_label) {
                tracing::warn!(label = %new_label, error = %cleanup, "failed to remove rotated key set");
            }
            return Err(e);
        }

        tracing::info!(from = old, to = %new_label, "rotated key set");
        Ok(new_label)
    }

    /// Every active label with its manifest, sorted by label
    pub fn get_active(&self) -> Result<Vec<(Manifest, RotationState)>> {
        let mut active = Vec::new();
        for manifest in self.store.list()? {
            let state = self.store.state(&manifest.label)?;
            if state.active {
                active.push((manifest, state));
            }
        }
        Ok(active)
    }

    pub fn history(&self, label: &str) -> Result<Vec<RotationEvent>> {
        Ok(self.store.state(label)?.rotation_history)
    }

    /// Check that `phrase` is the one the stored key set was derived from
    pub fn verify_label(&self, phrase: &str, label: &str, key: &SessionKey) -> Result<bool> {
        let record = self.store.load(label, Some(key))?;
        Ok(verify_seed_consistency(phrase, &record))
    }
}
