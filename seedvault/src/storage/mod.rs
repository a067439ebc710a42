//! Durable storage of encrypted key sets

mod backend;
mod file;
mod store;

pub use backend::{EntryKind, KeySetBackend, MemoryBackend};
pub use file::{write_private_file, FileBackend};
pub use store::KeySetStore;

use crate::error::{Error, Result};

pub const MAX_LABEL_LEN: usize = 128;

/// Labels are 1-128 of `[A-Za-z0-9_.-]` and never start with `.`
pub fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return Err(Error::Validation(format!(
            "Label must be 1 to {} characters",
            MAX_LABEL_LEN
        )));
    }
    if label.starts_with('.') {
        return Err(Error::Validation("Label must not start with '.'".to_string()));
    }
    if !label
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
    {
        return Err(Error::Validation(format!("Invalid characters in label '{}'", label)));
    }
    Ok(())
}
