//! Seedvault - hierarchical key derivation and encrypted key-set storage
//!
//! This library derives per-network account keys from a single BIP-39
//! phrase (BIP-32/BIP-44 on secp256k1, SLIP-0010 on ed25519), encrypts the
//! resulting key sets under a password-derived key, persists them under
//! unique labels and tracks their rotation lifecycle.
//!
//! ```no_run
//! use seedvault::crypto::keys::KeyDerivationEngine;
//! use seedvault::crypto::mnemonic::Bip39SeedSource;
//! use seedvault::crypto::vault::KdfParams;
//! use seedvault::keyset::derive_key_set;
//! use seedvault::storage::KeySetStore;
//!
//! # fn main() -> seedvault::Result<()> {
//! let store = KeySetStore::open("./wallets/seedvault")?;
//! let key = store.initialize("a long enough password", KdfParams::default())?;
//!
//! let engine = KeyDerivationEngine::default();
//! let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
//! let networks = vec!["bitcoin".to_string(), "ethereum".to_string()];
//! let derived = derive_key_set(&engine, &Bip39SeedSource, phrase, None, &networks, 2)?;
//!
//! let label = store.save(&derived.record, Some("main"), &key)?;
//! let record = store.load(&label, Some(&key))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod keyset;
pub mod rotation;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::VaultConfig;
pub use error::{Error, Result};
pub use keyset::{KeySetRecord, Manifest};
pub use rotation::{RotationManager, RotationState};
pub use storage::KeySetStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
