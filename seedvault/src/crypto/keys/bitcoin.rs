//! Bitcoin-family P2PKH addresses

use ::bitcoin::hashes::{hash160, Hash};

use super::bip32;
use super::derivation::PrivateKey;
use crate::error::Result;

/// Base58check version byte for mainnet P2PKH on Bitcoin
pub const BITCOIN_P2PKH_VERSION: u8 = 0x00;
/// Base58check version byte for mainnet P2PKH on Litecoin
pub const LITECOIN_P2PKH_VERSION: u8 = 0x30;
/// Base58check version byte for mainnet P2PKH on Dogecoin
pub const DOGECOIN_P2PKH_VERSION: u8 = 0x1e;

/// Legacy pay-to-pubkey-hash address of the compressed public key
pub fn p2pkh_address(private_key: &PrivateKey, version: u8) -> Result<String> {
    let public_key = bip32::public_key(private_key)?;
    let hash = hash160::Hash::hash(&public_key.serialize());

    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(&hash.to_byte_array());

    Ok(bs58::encode(payload).with_check().into_string())
}

pub fn bitcoin_address(private_key: &PrivateKey) -> Result<String> {
    p2pkh_address(private_key, BITCOIN_P2PKH_VERSION)
}

pub fn litecoin_address(private_key: &PrivateKey) -> Result<String> {
    p2pkh_address(private_key, LITECOIN_P2PKH_VERSION)
}

pub fn dogecoin_address(private_key: &PrivateKey) -> Result<String> {
    p2pkh_address(private_key, DOGECOIN_P2PKH_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> PrivateKey {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        PrivateKey::new(bytes)
    }

    #[test]
    fn test_generator_point_address() {
        // Private key 1 maps to the generator point
        assert_eq!(
            bitcoin_address(&key(1)).unwrap(),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
    }

    #[test]
    fn test_network_prefixes() {
        assert!(litecoin_address(&key(1)).unwrap().starts_with('L'));
        assert!(dogecoin_address(&key(1)).unwrap().starts_with('D'));
    }
}
