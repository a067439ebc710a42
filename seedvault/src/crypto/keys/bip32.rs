//! BIP-32 derivation over secp256k1

use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey, Signing};
use sha2::Sha512;
use zeroize::Zeroizing;

use super::derivation::PrivateKey;
use super::path::{ChildIndex, DerivationPath};
use crate::error::{Error, Result};

type HmacSha512 = Hmac<Sha512>;

const MASTER_KEY_DOMAIN: &[u8] = b"Bitcoin seed";

/// Derive the private key at `path` from a BIP-32 seed
pub fn derive_private_key(seed: &[u8], path: &DerivationPath) -> Result<PrivateKey> {
    let secp = Secp256k1::signing_only();

    let (mut secret_key, mut chain_code) = derive_master_key(seed)?;
    for component in path.components() {
        (secret_key, chain_code) = derive_child_key(&secp, &secret_key, &chain_code, *component)?;
    }

    Ok(PrivateKey::new(secret_key.secret_bytes()))
}

/// Compressed SEC1 public key for a secp256k1 private key
pub fn public_key(private_key: &PrivateKey) -> Result<PublicKey> {
    let secp = Secp256k1::signing_only();
    let secret_key = SecretKey::from_slice(private_key.as_bytes())
        .map_err(|e| Error::Derivation(format!("Invalid secret key: {}", e)))?;
    Ok(PublicKey::from_secret_key(&secp, &secret_key))
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;
    for part in parts {
        mac.update(part);
    }

    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn split(i: &[u8; 64]) -> (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>) {
    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&i[..32]);
    right.copy_from_slice(&i[32..]);
    (left, right)
}

fn derive_master_key(seed: &[u8]) -> Result<(SecretKey, Zeroizing<[u8; 32]>)> {
    let i = hmac_sha512(MASTER_KEY_DOMAIN, &[seed])?;
    let (il, chain_code) = split(&i);

    let secret_key = SecretKey::from_slice(il.as_slice())
        .map_err(|e| Error::Derivation(format!("Invalid master key: {}", e)))?;

    Ok((secret_key, chain_code))
}

fn derive_child_key<C: Signing>(
    secp: &Secp256k1<C>,
    parent: &SecretKey,
    parent_chain_code: &[u8; 32],
    child: ChildIndex,
) -> Result<(SecretKey, Zeroizing<[u8; 32]>)> {
    let index = child.effective_index().to_be_bytes();

    let i = if child.is_hardened() {
        let parent_bytes = Zeroizing::new(parent.secret_bytes());
        hmac_sha512(parent_chain_code, &[&[0u8][..], &parent_bytes[..], &index[..]])?
    } else {
        let parent_public = PublicKey::from_secret_key(secp, parent);
        hmac_sha512(parent_chain_code, &[&parent_public.serialize()[..], &index[..]])?
    };
    let (il, chain_code) = split(&i);

    // parse256(IL) must be below the curve order, and the sum must not be zero
    let tweak = Scalar::from_be_bytes(*il)
        .map_err(|_| Error::Derivation(format!("Derived tweak out of range at index {}", child)))?;
    let child_key = parent
        .add_tweak(&tweak)
        .map_err(|e| Error::Derivation(format!("Key addition error at index {}: {}", child, e)))?;

    Ok((child_key, chain_code))
}
