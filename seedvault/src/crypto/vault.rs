//! Password-based encryption for stored key sets
//!
//! A 32-byte session key is stretched from the password with
//! PBKDF2-HMAC-SHA256 over a per-storage-root salt. Payloads are sealed with
//! AES-256-GCM under a fresh random nonce, and the envelope
//!
//! ```text
//! version (1) || nonce (12) || ciphertext || tag (16)
//! ```
//!
//! is base64-encoded, so decryption needs nothing but the session key. Any
//! failure to open an envelope is reported as [`Error::Authentication`].

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};

/// Lowest PBKDF2 iteration count accepted for a new storage root
pub const MIN_PBKDF2_ITERATIONS: u32 = 480_000;

/// Minimum password length, in characters, for a new storage root
pub const MIN_PASSWORD_LEN: usize = 12;

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

const ENVELOPE_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

const KDF_ALGORITHM: &str = "pbkdf2-hmac-sha256";
const SALT_FILE_VERSION: u8 = 1;

/// Symmetric key for one session.
///
/// Never persisted. Not `Clone` or `Debug`; zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// PBKDF2 cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

impl KdfParams {
    pub fn new(iterations: u32) -> Result<Self> {
        if iterations < MIN_PBKDF2_ITERATIONS {
            return Err(Error::Validation(format!(
                "KDF iterations must be at least {}, got {}",
                MIN_PBKDF2_ITERATIONS, iterations
            )));
        }
        Ok(Self { iterations })
    }

    /// Cheap parameters for tests. Not for real storage roots.
    #[doc(hidden)]
    pub fn for_testing(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

/// The salt and KDF parameters persisted once per storage root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfSalt {
    pub params: KdfParams,
    pub salt: [u8; SALT_LEN],
}

#[derive(Serialize, Deserialize)]
struct SaltFile {
    version: u8,
    algorithm: String,
    iterations: u32,
    salt: String,
}

impl KdfSalt {
    /// Fresh random salt
    pub fn generate(params: KdfParams) -> Self {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        Self { params, salt }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let file = SaltFile {
            version: SALT_FILE_VERSION,
            algorithm: KDF_ALGORITHM.to_string(),
            iterations: self.params.iterations,
            salt: hex::encode(self.salt),
        };
        Ok(serde_json::to_vec_pretty(&file)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let file: SaltFile = serde_json::from_slice(bytes)?;

        if file.version != SALT_FILE_VERSION || file.algorithm != KDF_ALGORITHM {
            return Err(Error::Unsupported(format!(
                "salt file v{} with algorithm '{}'",
                file.version, file.algorithm
            )));
        }
        if file.iterations == 0 {
            return Err(Error::Validation("salt file has zero KDF iterations".to_string()));
        }

        let mut salt = [0u8; SALT_LEN];
        hex::decode_to_slice(&file.salt, &mut salt)
            .map_err(|e| Error::Validation(format!("Invalid salt: {}", e)))?;

        Ok(Self {
            params: KdfParams {
                iterations: file.iterations,
            },
            salt,
        })
    }
}

/// Derive a session key for a brand-new storage root
pub fn setup_from_password(password: &str, params: KdfParams) -> Result<(SessionKey, KdfSalt)> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let salt = KdfSalt::generate(params);
    let key = load_from_password(password, &salt)?;
    Ok((key, salt))
}

/// Re-derive the session key from a password and the stored salt
pub fn load_from_password(password: &str, salt: &KdfSalt) -> Result<SessionKey> {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt.salt, salt.params.iterations, &mut key);

    let session_key = SessionKey(key);
    key.zeroize();
    Ok(session_key)
}

/// Seal `plaintext` into a base64 envelope
pub fn encrypt(key: &SessionKey, plaintext: &[u8]) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Validation(format!("Invalid session key: {}", e)))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| Error::Validation("Encryption failed".to_string()))?;

    let mut envelope = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    envelope.push(ENVELOPE_VERSION);
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(envelope))
}

/// Open a base64 envelope produced by [`encrypt`]
pub fn decrypt(key: &SessionKey, token: &str) -> Result<Zeroizing<Vec<u8>>> {
    let envelope = STANDARD
        .decode(token.trim())
        .map_err(|_| Error::Authentication("Malformed ciphertext".to_string()))?;

    if envelope.len() < 1 + NONCE_LEN + TAG_LEN {
        return Err(Error::Authentication("Ciphertext too short".to_string()));
    }
    if envelope[0] != ENVELOPE_VERSION {
        return Err(Error::Authentication(format!(
            "Unknown ciphertext version {}",
            envelope[0]
        )));
    }

    let (nonce, ciphertext) = envelope[1..].split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| Error::Authentication("Invalid session key".to_string()))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Authentication("Wrong password or tampered data".to_string()))?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWORD: &str = "correct horse battery";

    fn params() -> KdfParams {
        KdfParams::for_testing(1_000)
    }

    #[test]
    fn test_round_trip() {
        let (key, _) = setup_from_password(PASSWORD, params()).unwrap();
        let payloads: [&[u8]; 3] = [b"", b"x", &[0u8; 4096]];
        for payload in payloads {
            let token = encrypt(&key, payload).unwrap();
            assert_eq!(decrypt(&key, &token).unwrap().as_slice(), payload);
        }
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let (key, _) = setup_from_password(PASSWORD, params()).unwrap();
        assert_ne!(encrypt(&key, b"same").unwrap(), encrypt(&key, b"same").unwrap());
    }

    #[test]
    fn test_load_reproduces_setup_key() {
        let (key, salt) = setup_from_password(PASSWORD, params()).unwrap();
        let token = encrypt(&key, b"payload").unwrap();

        let reloaded = load_from_password(PASSWORD, &salt).unwrap();
        assert_eq!(decrypt(&reloaded, &token).unwrap().as_slice(), b"payload");
    }

    #[test]
    fn test_wrong_password_fails_closed() {
        let (key, salt) = setup_from_password(PASSWORD, params()).unwrap();
        let token = encrypt(&key, b"payload").unwrap();

        let wrong = load_from_password("incorrect horse battery", &salt).unwrap();
        assert!(matches!(decrypt(&wrong, &token), Err(Error::Authentication(_))));
    }

    #[test]
    fn test_tampering_fails_closed() {
        let (key, _) = setup_from_password(PASSWORD, params()).unwrap();
        let token = encrypt(&key, b"payload").unwrap();

        let mut envelope = STANDARD.decode(&token).unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0x01;
        let tampered = STANDARD.encode(&envelope);
        assert!(matches!(decrypt(&key, &tampered), Err(Error::Authentication(_))));

        let truncated = STANDARD.encode(&envelope[..20]);
        assert!(matches!(decrypt(&key, &truncated), Err(Error::Authentication(_))));
        assert!(matches!(decrypt(&key, "not base64!"), Err(Error::Authentication(_))));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            setup_from_password("short", params()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_iteration_floor() {
        assert!(KdfParams::new(1_000).is_err());
        assert_eq!(KdfParams::new(MIN_PBKDF2_ITERATIONS).unwrap(), KdfParams::default());
    }

    #[test]
    fn test_salt_file_round_trip() {
        let salt = KdfSalt::generate(params());
        let parsed = KdfSalt::from_bytes(&salt.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, salt);
        assert!(KdfSalt::from_bytes(b"{}").is_err());
    }
}
