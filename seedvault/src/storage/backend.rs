//! Persistence seam for key sets

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::Result;

/// The per-label entries a backend stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKind {
    /// Encrypted record
    Blob,
    Manifest,
    State,
    /// Exported public summary
    Summary,
}

/// Byte-level storage for one storage root.
///
/// Writes must be atomic per entry: a reader sees either the previous
/// contents or the new ones, never a mix.
pub trait KeySetBackend {
    fn read_salt(&self) -> Result<Option<Vec<u8>>>;

    fn write_salt(&self, bytes: &[u8]) -> Result<()>;

    fn read(&self, label: &str, kind: EntryKind) -> Result<Option<Vec<u8>>>;

    fn write(&self, label: &str, kind: EntryKind, bytes: &[u8]) -> Result<()>;

    /// Returns whether the entry existed
    fn remove(&self, label: &str, kind: EntryKind) -> Result<bool>;

    /// Labels that have a manifest, sorted
    fn labels(&self) -> Result<Vec<String>>;

    /// Whether any entry for `label` exists
    fn contains(&self, label: &str) -> Result<bool> {
        for kind in [EntryKind::Blob, EntryKind::Manifest, EntryKind::State] {
            if self.read(label, kind)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Location of the blob as recorded in the manifest
    fn blob_path(&self, label: &str) -> String {
        format!("{}.encrypted", label)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    salt: Option<Vec<u8>>,
    entries: BTreeMap<(String, EntryKind), Vec<u8>>,
}

/// Keeps everything in process memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<MemoryInner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeySetBackend for MemoryBackend {
    fn read_salt(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().salt.clone())
    }

    fn write_salt(&self, bytes: &[u8]) -> Result<()> {
        self.lock().salt = Some(bytes.to_vec());
        Ok(())
    }

    fn read(&self, label: &str, kind: EntryKind) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().entries.get(&(label.to_string(), kind)).cloned())
    }

    fn write(&self, label: &str, kind: EntryKind, bytes: &[u8]) -> Result<()> {
        self.lock()
            .entries
            .insert((label.to_string(), kind), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, label: &str, kind: EntryKind) -> Result<bool> {
        Ok(self.lock().entries.remove(&(label.to_string(), kind)).is_some())
    }

    fn labels(&self) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .entries
            .keys()
            .filter(|(_, kind)| *kind == EntryKind::Manifest)
            .map(|(label, _)| label.clone())
            .collect())
    }
}
