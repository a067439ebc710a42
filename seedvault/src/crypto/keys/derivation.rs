//! Network registry and the key derivation engine

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::path::{ChildIndex, DerivationPath};
use super::{bip32, bitcoin, ethereum, slip10, solana};
use crate::crypto::mnemonic::RootSecret;
use crate::error::{Error, Result};

/// A 32-byte private key. Zeroed on drop, redacted in debug output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw private key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

impl Serialize for PrivateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut s = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        let decoded = hex::decode_to_slice(&s, &mut bytes);
        s.zeroize();
        decoded.map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// Public identifier of a derived key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum PublicIdentifier {
    Available(String),
    /// The network has no public encoding implemented
    Unavailable,
}

impl PublicIdentifier {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Available(id) => Some(id),
            Self::Unavailable => None,
        }
    }
}

impl fmt::Display for PublicIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available(id) => f.write_str(id),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// One derived account key for one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAccountKey {
    pub path: DerivationPath,
    pub private_key: PrivateKey,
    pub public_key: PublicIdentifier,
}

/// Elliptic curve a network derives keys on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    /// BIP-32
    Secp256k1,
    /// SLIP-0010, hardened only
    Ed25519,
}

impl Curve {
    pub fn derive_private_key(&self, seed: &RootSecret, path: &DerivationPath) -> Result<PrivateKey> {
        match self {
            Self::Secp256k1 => bip32::derive_private_key(seed.as_bytes(), path),
            Self::Ed25519 => slip10::derive_private_key(seed.as_bytes(), path),
        }
    }
}

/// Encodes a private key's public half into a network identifier
pub type PublicEncoder = fn(&PrivateKey) -> Result<String>;

/// Everything needed to derive and identify keys on one network
#[derive(Clone)]
pub struct NetworkSpec {
    pub id: &'static str,
    pub curve: Curve,
    pub path_prefix: DerivationPath,
    /// Whether the appended account component is hardened
    pub hardened_account: bool,
    pub encoder: Option<PublicEncoder>,
}

impl NetworkSpec {
    pub fn new(id: &'static str, curve: Curve, path_prefix: DerivationPath) -> Self {
        Self {
            id,
            curve,
            path_prefix,
            hardened_account: false,
            encoder: None,
        }
    }

    pub fn with_hardened_account(mut self) -> Self {
        self.hardened_account = true;
        self
    }

    pub fn with_encoder(mut self, encoder: PublicEncoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Full path for `account`: the network prefix plus one component
    pub fn account_path(&self, account: u32) -> Result<DerivationPath> {
        let child = if self.hardened_account {
            ChildIndex::hardened(account)?
        } else {
            ChildIndex::normal(account)?
        };
        Ok(self.path_prefix.child(child))
    }

    pub fn public_identifier(&self, private_key: &PrivateKey) -> Result<PublicIdentifier> {
        match self.encoder {
            Some(encode) => encode(private_key).map(PublicIdentifier::Available),
            None => Ok(PublicIdentifier::Unavailable),
        }
    }
}

impl fmt::Debug for NetworkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkSpec")
            .field("id", &self.id)
            .field("curve", &self.curve)
            .field("path_prefix", &self.path_prefix.to_string())
            .field("hardened_account", &self.hardened_account)
            .field("encoder", &self.encoder.is_some())
            .finish()
    }
}

/// Capability registry of supported networks, keyed by network id
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    networks: BTreeMap<&'static str, NetworkSpec>,
}

impl NetworkRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in BIP-44 networks
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            NetworkSpec::new("bitcoin", Curve::Secp256k1, bip44_external_chain(0))
                .with_encoder(bitcoin::bitcoin_address),
        );
        registry.register(
            NetworkSpec::new("ethereum", Curve::Secp256k1, bip44_external_chain(60))
                .with_encoder(ethereum::checksum_address),
        );
        registry.register(
            NetworkSpec::new("litecoin", Curve::Secp256k1, bip44_external_chain(2))
                .with_encoder(bitcoin::litecoin_address),
        );
        registry.register(
            NetworkSpec::new("dogecoin", Curve::Secp256k1, bip44_external_chain(3))
                .with_encoder(bitcoin::dogecoin_address),
        );
        // CashAddr is not encoded
        registry.register(NetworkSpec::new("bch", Curve::Secp256k1, bip44_external_chain(145)));
        registry.register(
            NetworkSpec::new(
                "solana",
                Curve::Ed25519,
                DerivationPath::from(vec![ChildIndex::Hardened(44), ChildIndex::Hardened(501)]),
            )
            .with_hardened_account()
            .with_encoder(solana::address),
        );
        registry
    }

    /// Add or replace a network
    pub fn register(&mut self, spec: NetworkSpec) {
        self.networks.insert(spec.id, spec);
    }

    pub fn get(&self, id: &str) -> Result<&NetworkSpec> {
        self.networks
            .get(id)
            .ok_or_else(|| Error::Unsupported(format!("Network '{}' is not registered", id)))
    }

    /// Registered network ids in sorted order
    pub fn ids(&self) -> Vec<&'static str> {
        self.networks.keys().copied().collect()
    }
}

/// `m/44'/coin'/0'/0`: first BIP-44 account, external chain
fn bip44_external_chain(coin_type: u32) -> DerivationPath {
    DerivationPath::from(vec![
        ChildIndex::Hardened(44),
        ChildIndex::Hardened(coin_type),
        ChildIndex::Hardened(0),
        ChildIndex::Normal(0),
    ])
}

/// Deterministic derivation of per-network account keys
#[derive(Debug, Clone)]
pub struct KeyDerivationEngine {
    registry: NetworkRegistry,
}

impl Default for KeyDerivationEngine {
    fn default() -> Self {
        Self::new(NetworkRegistry::standard())
    }
}

impl KeyDerivationEngine {
    pub fn new(registry: NetworkRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    /// Derive the key for `account` on `network`
    pub fn derive(&self, seed: &RootSecret, network: &str, account: u32) -> Result<NetworkAccountKey> {
        let spec = self.registry.get(network)?;
        let path = spec.account_path(account)?;

        tracing::debug!(network, account, path = %path, "deriving account key");

        let private_key = spec.curve.derive_private_key(seed, &path)?;
        let public_key = spec.public_identifier(&private_key)?;

        Ok(NetworkAccountKey { path, private_key, public_key })
    }

    /// Derive the raw private key at an arbitrary path
    pub fn derive_path(&self, seed: &RootSecret, curve: Curve, path: &str) -> Result<PrivateKey> {
        let path: DerivationPath = path.parse()?;
        curve.derive_private_key(seed, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> RootSecret {
        RootSecret::new(hex::decode("000102030405060708090a0b0c0d0e0f").unwrap())
    }

    #[test]
    fn test_standard_registry() {
        let registry = NetworkRegistry::standard();
        assert_eq!(
            registry.ids(),
            vec!["bch", "bitcoin", "dogecoin", "ethereum", "litecoin", "solana"]
        );
        assert!(matches!(registry.get("cardano"), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_account_path() {
        let registry = NetworkRegistry::standard();
        assert_eq!(
            registry.get("ethereum").unwrap().account_path(4).unwrap().to_string(),
            "m/44'/60'/0'/0/4"
        );
        assert_eq!(
            registry.get("solana").unwrap().account_path(2).unwrap().to_string(),
            "m/44'/501'/2'"
        );
    }

    #[test]
    fn test_unavailable_public_key_is_explicit() {
        let engine = KeyDerivationEngine::default();
        let key = engine.derive(&seed(), "bch", 0).unwrap();
        assert_eq!(key.public_key, PublicIdentifier::Unavailable);
        assert_eq!(key.public_key.as_str(), None);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let engine = KeyDerivationEngine::default();
        for network in engine.registry().ids() {
            let a = engine.derive(&seed(), network, 1).unwrap();
            let b = engine.derive(&seed(), network, 1).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_derive_path_rejects_malformed_path() {
        let engine = KeyDerivationEngine::default();
        let err = engine.derive_path(&seed(), Curve::Secp256k1, "m/44'/x").unwrap_err();
        assert!(matches!(err, Error::Derivation(_)));
    }

    #[test]
    fn test_private_key_serde_and_debug() {
        let key = PrivateKey::new([0xab; 32]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        assert_eq!(serde_json::from_str::<PrivateKey>(&json).unwrap(), key);
        assert!(!format!("{:?}", key).contains("ab"));
    }

    #[test]
    fn test_public_identifier_serde() {
        let json = serde_json::to_string(&PublicIdentifier::Unavailable).unwrap();
        assert_eq!(json, r#"{"status":"unavailable"}"#);
        let json = serde_json::to_string(&PublicIdentifier::Available("1abc".into())).unwrap();
        assert_eq!(json, r#"{"status":"available","value":"1abc"}"#);
    }
}
