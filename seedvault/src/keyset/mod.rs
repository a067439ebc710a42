//! Key-set records
//!
//! A key set is every derived account key for one phrase, plus the metadata
//! needed to list and verify it without decrypting.

mod derive;
mod record;

pub use derive::*;
pub use record::*;
