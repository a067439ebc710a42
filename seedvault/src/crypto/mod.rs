//! Cryptographic primitives and operations
//!
//! This module provides the seed source seam, hierarchical key derivation,
//! and the password-based cipher used to protect stored key sets.

pub mod mnemonic;
pub mod keys;
pub mod vault;

pub use mnemonic::*;
pub use keys::*;
pub use vault::*;
