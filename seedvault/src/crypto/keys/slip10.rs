//! SLIP-0010 derivation over ed25519
//!
//! ed25519 has no public-parent derivation, so every component of the path
//! must be hardened. The whole path is checked before any hashing happens.

use ed25519_dalek::SigningKey;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use super::derivation::PrivateKey;
use super::path::DerivationPath;
use crate::error::{Error, Result};

type HmacSha512 = Hmac<Sha512>;

const MASTER_KEY_DOMAIN: &[u8] = b"ed25519 seed";

/// Derive the private key at `path` from a seed
pub fn derive_private_key(seed: &[u8], path: &DerivationPath) -> Result<PrivateKey> {
    if let Some(component) = path.components().iter().find(|c| !c.is_hardened()) {
        return Err(Error::Derivation(format!(
            "ed25519 only supports hardened derivation, got {} in {}",
            component, path
        )));
    }

    let (mut secret_key, mut chain_code) = hmac_split(MASTER_KEY_DOMAIN, &[seed])?;
    for component in path.components() {
        let index = component.effective_index().to_be_bytes();
        (secret_key, chain_code) =
            hmac_split(chain_code.as_slice(), &[&[0u8][..], &secret_key[..], &index[..]])?;
    }

    Ok(PrivateKey::new(*secret_key))
}

/// Raw 32-byte ed25519 public key
pub fn public_key(private_key: &PrivateKey) -> [u8; 32] {
    let signing_key = SigningKey::from_bytes(private_key.as_bytes());
    signing_key.verifying_key().to_bytes()
}

fn hmac_split(key: &[u8], parts: &[&[u8]]) -> Result<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>)> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let mut result = Zeroizing::new([0u8; 64]);
    result.copy_from_slice(&mac.finalize().into_bytes());

    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&result[..32]);
    right.copy_from_slice(&result[32..]);
    Ok((left, right))
}
