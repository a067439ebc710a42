//! Encrypted key-set store

use std::path::PathBuf;

use chrono::Utc;
use zeroize::Zeroizing;

use super::backend::{EntryKind, KeySetBackend};
use super::file::FileBackend;
use super::validate_label;
use crate::crypto::vault::{self, KdfParams, KdfSalt, SessionKey};
use crate::error::{Error, Result};
use crate::keyset::{KeySetRecord, Manifest, PrivateKeyExport, PublicSummary};
use crate::rotation::RotationState;

/// Persists key sets under unique labels.
///
/// Each label has an encrypted blob, a rotation state and a plaintext
/// manifest. The manifest is written last, so a listed label always has
/// its blob.
#[derive(Debug)]
pub struct KeySetStore<B = FileBackend> {
    backend: B,
}

impl KeySetStore<FileBackend> {
    /// Open (or create) an on-disk storage root
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(FileBackend::new(root)?))
    }
}

impl<B: KeySetBackend> KeySetStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.backend.read_salt()?.is_some())
    }

    fn salt(&self) -> Result<KdfSalt> {
        let bytes = self
            .backend
            .read_salt()?
            .ok_or_else(|| Error::NotFound("Storage root is not initialized".to_string()))?;
        KdfSalt::from_bytes(&bytes)
    }

    /// Create the salt for a new storage root and return the session key
    pub fn initialize(&self, password: &str, params: KdfParams) -> Result<SessionKey> {
        if self.is_initialized()? {
            return Err(Error::Validation("Storage root is already initialized".to_string()));
        }

        let (key, salt) = vault::setup_from_password(password, params)?;
        self.backend.write_salt(&salt.to_bytes()?)?;

        tracing::info!(iterations = params.iterations(), "initialized storage root");
        Ok(key)
    }

    /// Derive the session key from the stored salt.
    ///
    /// When the store already holds key sets, the first one is decrypted as
    /// a check, so a wrong password fails here.
    pub fn unlock(&self, password: &str) -> Result<SessionKey> {
        let salt = self.salt()?;
        let key = vault::load_from_password(password, &salt)?;

        if let Some(label) = self.backend.labels()?.first() {
            if let Some(blob) = self.backend.read(label, EntryKind::Blob)? {
                vault::decrypt(&key, &blob_text(&blob)?)?;
            }
        }

        tracing::debug!("unlocked storage root");
        Ok(key)
    }

    /// Encrypt and persist `record`, returning the label used.
    ///
    /// Without a label one is generated from the current UTC time.
    pub fn save(&self, record: &KeySetRecord, label: Option<&str>, key: &SessionKey) -> Result<String> {
        let label = match label {
            Some(label) => {
                validate_label(label)?;
                if self.backend.contains(label)? {
                    return Err(Error::Validation(format!("Label '{}' already exists", label)));
                }
                label.to_string()
            }
            None => self.unique_label(&format!("keyset_{}", Utc::now().format("%Y%m%d_%H%M%S")))?,
        };

        let state = RotationState::new_active(&label, None);
        self.save_with_state(record, &label, key, state)?;
        Ok(label)
    }

    pub(crate) fn save_with_state(
        &self,
        record: &KeySetRecord,
        label: &str,
        key: &SessionKey,
        state: RotationState,
    ) -> Result<()> {
        if !self.is_initialized()? {
            return Err(Error::NotFound("Storage root is not initialized".to_string()));
        }

        let plaintext = Zeroizing::new(serde_json::to_vec(record)?);
        let blob = vault::encrypt(key, &plaintext)?;
        let manifest = Manifest::from_record(label, record, self.backend.blob_path(label));

        self.backend.write(label, EntryKind::Blob, blob.as_bytes())?;

        let committed = serde_json::to_vec_pretty(&state)
            .map_err(Error::from)
            .and_then(|bytes| self.backend.write(label, EntryKind::State, &bytes))
            .and_then(|_| serde_json::to_vec_pretty(&manifest).map_err(Error::from))
            .and_then(|bytes| self.backend.write(label, EntryKind::Manifest, &bytes));

        if let Err(e) = committed {
            for kind in [EntryKind::State, EntryKind::Blob] {
                if let Err(cleanup) = self.backend.remove(label, kind) {
                    tracing::warn!(label, ?kind, error = %cleanup, "failed to clean up partial save");
                }
            }
            return Err(e);
        }

        tracing::info!(label, networks = manifest.network_names.len(), "saved key set");
        Ok(())
    }

    /// `base` if unused, otherwise `base_1`, `base_2`, ...
    pub(crate) fn unique_label(&self, base: &str) -> Result<String> {
        validate_label(base)?;
        if !self.backend.contains(base)? {
            return Ok(base.to_string());
        }

        let mut n: u32 = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            validate_label(&candidate)?;
            if !self.backend.contains(&candidate)? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Decrypt the record stored under `label`
    pub fn load(&self, label: &str, key: Option<&SessionKey>) -> Result<KeySetRecord> {
        let key = key.ok_or(Error::KeyNotLoaded)?;
        validate_label(label)?;

        let blob = self
            .backend
            .read(label, EntryKind::Blob)?
            .ok_or_else(|| Error::NotFound(format!("Key set '{}'", label)))?;
        let plaintext = vault::decrypt(key, &blob_text(&blob)?)?;

        tracing::debug!(label, "loaded key set");
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Every manifest, sorted by label
    pub fn list(&self) -> Result<Vec<Manifest>> {
        let mut manifests = Vec::new();
        for label in self.backend.labels()? {
            match self.manifest(&label) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => tracing::warn!(label = %label, error = %e, "skipping unreadable manifest"),
            }
        }
        Ok(manifests)
    }

    pub fn manifest(&self, label: &str) -> Result<Manifest> {
        validate_label(label)?;
        let bytes = self
            .backend
            .read(label, EntryKind::Manifest)?
            .ok_or_else(|| Error::NotFound(format!("Key set '{}'", label)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Remove every entry for `label`
    pub fn delete(&self, label: &str) -> Result<()> {
        validate_label(label)?;
        if !self.backend.contains(label)? {
            return Err(Error::NotFound(format!("Key set '{}'", label)));
        }

        for kind in [EntryKind::Manifest, EntryKind::State, EntryKind::Blob, EntryKind::Summary] {
            self.backend.remove(label, kind)?;
        }

        tracing::info!(label, "deleted key set");
        Ok(())
    }

    /// Lifecycle state of `label`. A label without a state is active.
    pub fn state(&self, label: &str) -> Result<RotationState> {
        let manifest = self.manifest(label)?;
        match self.backend.read(label, EntryKind::State)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => {
                let mut state = RotationState::new_active(label, None);
                state.activated_at = manifest.created_at;
                Ok(state)
            }
        }
    }

    pub fn put_state(&self, state: &RotationState) -> Result<()> {
        validate_label(&state.label)?;
        self.backend
            .write(&state.label, EntryKind::State, &serde_json::to_vec_pretty(state)?)
    }

    pub fn export_summary(&self, label: &str, key: &SessionKey) -> Result<PublicSummary> {
        let record = self.load(label, Some(key))?;
        Ok(PublicSummary::from_record(label, &record))
    }

    /// Store the public summary of `label` next to its key set
    pub fn write_summary(&self, label: &str, key: &SessionKey) -> Result<PublicSummary> {
        let summary = self.export_summary(label, key)?;
        self.backend
            .write(label, EntryKind::Summary, &serde_json::to_vec_pretty(&summary)?)?;

        tracing::info!(label, "wrote public summary");
        Ok(summary)
    }

    pub fn export_private_key(
        &self,
        label: &str,
        network: &str,
        account: u32,
        key: &SessionKey,
    ) -> Result<PrivateKeyExport> {
        let record = self.load(label, Some(key))?;
        let entry = record.key(network, account)?;

        tracing::warn!(label, network, account, "exporting private key");
        Ok(PrivateKeyExport {
            label: label.to_string(),
            network: network.to_string(),
            account,
            path: entry.path.clone(),
            private_key: entry.private_key.clone(),
            public_key: entry.public_key.clone(),
        })
    }

    /// Re-encrypt every key set under a new password and salt.
    ///
    /// All blobs are decrypted before anything is written. If a write fails,
    /// blobs already rewritten are restored and the old salt stays.
    pub fn change_password(
        &self,
        old_key: &SessionKey,
        new_password: &str,
        params: KdfParams,
    ) -> Result<SessionKey> {
        let mut blobs = Vec::new();
        for label in self.backend.labels()? {
            let blob = self
                .backend
                .read(&label, EntryKind::Blob)?
                .ok_or_else(|| Error::NotFound(format!("Key set '{}'", label)))?;
            let plaintext = vault::decrypt(old_key, &blob_text(&blob)?)?;
            blobs.push((label, blob, plaintext));
        }

        let (new_key, new_salt) = vault::setup_from_password(new_password, params)?;

        let mut rewritten: Vec<(&str, &[u8])> = Vec::new();
        let mut outcome = Ok(());
        for (label, old_blob, plaintext) in &blobs {
            let written = vault::encrypt(&new_key, plaintext)
                .and_then(|blob| self.backend.write(label, EntryKind::Blob, blob.as_bytes()));
            if let Err(e) = written {
                outcome = Err(e);
                break;
            }
            rewritten.push((label.as_str(), old_blob.as_slice()));
        }
        if outcome.is_ok() {
            outcome = new_salt
                .to_bytes()
                .and_then(|bytes| self.backend.write_salt(&bytes));
        }

        if let Err(e) = outcome {
            for (label, old_blob) in rewritten {
                if let Err(restore) = self.backend.write(label, EntryKind::Blob, old_blob) {
                    tracing::warn!(label, error = %restore, "failed to restore key set");
                }
            }
            return Err(e);
        }

        tracing::info!(key_sets = blobs.len(), "changed storage password");
        Ok(new_key)
    }
}

fn blob_text(blob: &[u8]) -> Result<String> {
    String::from_utf8(blob.to_vec())
        .map_err(|_| Error::Authentication("Malformed ciphertext".to_string()))
}
