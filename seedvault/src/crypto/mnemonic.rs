//! Mnemonic phrase handling and the seed source seam
//!
//! The derivation engine never looks at words. It consumes the seed bytes a
//! [`SeedSource`] produces from a validated phrase, and key sets carry only a
//! one-way fingerprint of that phrase.

use bip39::Mnemonic;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Supported mnemonic strengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MnemonicStrength {
    /// 12 words (128 bits)
    Words12,
    /// 24 words (256 bits)
    Words24,
}

impl MnemonicStrength {
    /// Get entropy length in bytes
    fn entropy_bytes(&self) -> usize {
        match self {
            Self::Words12 => 16,
            Self::Words24 => 32,
        }
    }

    /// Number of words a phrase of this strength has
    pub fn word_count(&self) -> usize {
        match self {
            Self::Words12 => 12,
            Self::Words24 => 24,
        }
    }

    /// Map a word count onto a supported strength
    pub fn from_word_count(words: usize) -> Result<Self> {
        match words {
            12 => Ok(Self::Words12),
            24 => Ok(Self::Words24),
            n => Err(Error::Validation(format!("Seed must be 12 or 24 words, got {}", n))),
        }
    }
}

/// Seed bytes derived from a validated phrase.
///
/// Zeroed when dropped. Never serialized.
pub struct RootSecret(Zeroizing<Vec<u8>>);

impl RootSecret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RootSecret([REDACTED; {}])", self.0.len())
    }
}

/// Source of validated phrases and the seed bytes behind them
pub trait SeedSource {
    /// Generate a fresh random phrase
    fn generate(&self, strength: MnemonicStrength) -> Result<String>;

    /// True when the phrase has 12 or 24 words and a valid checksum
    fn validate(&self, phrase: &str) -> bool;

    /// Convert a phrase into seed bytes
    fn to_seed(&self, phrase: &str, passphrase: Option<&str>) -> Result<RootSecret>;
}

/// BIP-39 English wordlist seed source
#[derive(Debug, Clone, Copy, Default)]
pub struct Bip39SeedSource;

impl Bip39SeedSource {
    fn parse(phrase: &str) -> Result<Mnemonic> {
        let normalized = normalize_phrase(phrase);
        MnemonicStrength::from_word_count(normalized.split(' ').filter(|w| !w.is_empty()).count())?;

        Mnemonic::parse_normalized(&normalized)
            .map_err(|e| Error::Validation(format!("Invalid seed phrase: {}", e)))
    }
}

impl SeedSource for Bip39SeedSource {
    fn generate(&self, strength: MnemonicStrength) -> Result<String> {
        let mut entropy = Zeroizing::new(vec![0u8; strength.entropy_bytes()]);
        OsRng.fill_bytes(&mut entropy);

        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|e| Error::Validation(e.to_string()))?;

        Ok(mnemonic.to_string())
    }

    fn validate(&self, phrase: &str) -> bool {
        Self::parse(phrase).is_ok()
    }

    fn to_seed(&self, phrase: &str, passphrase: Option<&str>) -> Result<RootSecret> {
        let mnemonic = Self::parse(phrase)?;
        let seed = mnemonic.to_seed(passphrase.unwrap_or(""));
        Ok(RootSecret::new(seed.to_vec()))
    }
}

/// Lowercase words joined by single spaces, the form seeds are derived from
pub fn normalize_phrase(phrase: &str) -> Zeroizing<String> {
    Zeroizing::new(
        phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// One-way fingerprint of a phrase: hex SHA-256 of its normalized form.
///
/// Spellings that derive the same seed share a fingerprint. Used only to
/// check that a phrase matches a stored key set.
pub fn seed_fingerprint(phrase: &str) -> String {
    hex::encode(Sha256::digest(normalize_phrase(phrase).as_bytes()))
}
