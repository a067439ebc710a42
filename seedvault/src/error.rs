//! Error types for the seedvault library

use thiserror::Error;

/// Custom error type for seedvault operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed phrase, word count, label, password or state transition
    #[error("Validation error: {0}")]
    Validation(String),

    /// Wrong password or tampered ciphertext. Never carries plaintext.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed derivation path or an invalid derived key
    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Encryption key not loaded")]
    KeyNotLoaded,

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for seedvault operations
pub type Result<T> = std::result::Result<T, Error>;
