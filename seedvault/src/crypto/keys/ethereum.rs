//! Ethereum addresses

use sha3::{Digest, Keccak256};

use super::bip32;
use super::derivation::PrivateKey;
use crate::error::Result;

/// EIP-55 checksummed address of a secp256k1 private key
pub fn checksum_address(private_key: &PrivateKey) -> Result<String> {
    let public_key = bip32::public_key(private_key)?.serialize_uncompressed();

    // Skip the 0x04 prefix and keep the last 20 bytes of the hash
    let key_hash = keccak256(&public_key[1..]);
    Ok(to_checksum(&hex::encode(&key_hash[12..])))
}

/// Apply EIP-55 mixed-case checksumming to a lowercase hex address
fn to_checksum(lower_hex: &str) -> String {
    let hash = keccak256(lower_hex.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower_hex.chars().enumerate() {
        let nibble = (hash[i / 2] >> if i % 2 == 0 { 4 } else { 0 }) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Calculate the Keccak-256 hash of data
fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}
