//! On-disk storage root
//!
//! ```text
//! <root>/.salt
//! <root>/<label>.encrypted
//! <root>/<label>.manifest
//! <root>/<label>.state
//! <root>/<label>_summary.json
//! ```

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::backend::{EntryKind, KeySetBackend};
use super::validate_label;
use crate::error::{Error, Result};

const SALT_FILE: &str = ".salt";
const MANIFEST_SUFFIX: &str = ".manifest";

/// Key sets stored as files under one directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open a storage root, creating the directory if needed.
    ///
    /// A directory created here is restricted to its owner. An existing one
    /// keeps its permissions.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            fs::create_dir_all(&root)?;
            restrict_dir_permissions(&root)?;
            tracing::debug!(root = %root.display(), "created storage root");
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self, label: &str, kind: EntryKind) -> PathBuf {
        let file_name = match kind {
            EntryKind::Blob => self.blob_path(label),
            EntryKind::Manifest => format!("{}{}", label, MANIFEST_SUFFIX),
            EntryKind::State => format!("{}.state", label),
            EntryKind::Summary => format!("{}_summary.json", label),
        };
        self.root.join(file_name)
    }
}

impl KeySetBackend for FileBackend {
    fn read_salt(&self) -> Result<Option<Vec<u8>>> {
        read_optional(&self.root.join(SALT_FILE))
    }

    fn write_salt(&self, bytes: &[u8]) -> Result<()> {
        write_private_file(&self.root.join(SALT_FILE), bytes)
    }

    fn read(&self, label: &str, kind: EntryKind) -> Result<Option<Vec<u8>>> {
        read_optional(&self.entry_path(label, kind))
    }

    fn write(&self, label: &str, kind: EntryKind, bytes: &[u8]) -> Result<()> {
        write_private_file(&self.entry_path(label, kind), bytes)
    }

    fn remove(&self, label: &str, kind: EntryKind) -> Result<bool> {
        let path = self.entry_path(label, kind);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed file");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn labels(&self) -> Result<Vec<String>> {
        let mut labels = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(label) = file_name.to_str().and_then(|n| n.strip_suffix(MANIFEST_SUFFIX)) else {
                continue;
            };
            if validate_label(label).is_ok() {
                labels.push(label.to_string());
            }
        }
        labels.sort();
        Ok(labels)
    }

    fn contains(&self, label: &str) -> Result<bool> {
        Ok([EntryKind::Blob, EntryKind::Manifest, EntryKind::State]
            .into_iter()
            .any(|kind| self.entry_path(label, kind).exists()))
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Atomically replace `path` with `bytes`, readable by the owner only.
///
/// Writes a temp file in the same directory, syncs it and renames it over
/// the target, so an interrupted write never leaves a partial file.
pub fn write_private_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    restrict_file_permissions(tmp.as_file())?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Storage(e.error))?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}

#[cfg(unix)]
fn restrict_file_permissions(file: &File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file_permissions(_file: &File) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn restrict_dir_permissions(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_dir_permissions(_dir: &Path) -> Result<()> {
    Ok(())
}
