//! Key derivation and management
//!
//! This module provides hierarchical deterministic derivation of account keys
//! for every registered network, plus the address encoders that turn a
//! derived key into a public identifier.

pub mod bitcoin;
pub mod ethereum;
pub mod solana;
mod bip32;
mod derivation;
mod path;
mod slip10;

pub use derivation::*;
pub use path::*;
