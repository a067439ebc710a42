//! Solana addresses

use super::derivation::PrivateKey;
use super::slip10;
use crate::error::Result;

/// Base58 encoding of the ed25519 public key
pub fn address(private_key: &PrivateKey) -> Result<String> {
    Ok(bs58::encode(slip10::public_key(private_key)).into_string())
}
