//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use seedvault::crypto::keys::KeyDerivationEngine;
use seedvault::crypto::mnemonic::Bip39SeedSource;
use seedvault::crypto::vault::KdfParams;
use seedvault::keyset::{derive_key_set, KeySetRecord};
use seedvault::storage::{EntryKind, KeySetBackend, MemoryBackend};
use seedvault::{Error, Result};

pub const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn test_params() -> KdfParams {
    KdfParams::for_testing(1_000)
}

pub fn sample_record() -> KeySetRecord {
    let networks: Vec<String> = ["bitcoin", "ethereum", "solana"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    derive_key_set(
        &KeyDerivationEngine::default(),
        &Bip39SeedSource,
        PHRASE,
        None,
        &networks,
        2,
    )
    .unwrap()
    .record
}

/// Hex of every private key in `record`
pub fn private_key_hexes(record: &KeySetRecord) -> Vec<String> {
    record
        .networks
        .values()
        .flat_map(|accounts| accounts.values())
        .map(|key| key.private_key.to_hex())
        .collect()
}

/// In-memory backend that fails writes of one entry, or of the salt, once armed
#[derive(Default)]
pub struct FailingBackend {
    pub inner: MemoryBackend,
    fail_on: Mutex<Option<(String, EntryKind)>>,
    fail_salt: AtomicBool,
}

impl FailingBackend {
    pub fn fail_writes(&self, label: &str, kind: EntryKind) {
        *self.fail_on.lock().unwrap() = Some((label.to_string(), kind));
    }

    pub fn fail_salt_writes(&self) {
        self.fail_salt.store(true, Ordering::SeqCst);
    }
}

fn injected_failure() -> Error {
    Error::Storage(io::Error::new(io::ErrorKind::Other, "injected failure"))
}

impl KeySetBackend for FailingBackend {
    fn read_salt(&self) -> Result<Option<Vec<u8>>> {
        self.inner.read_salt()
    }

    fn write_salt(&self, bytes: &[u8]) -> Result<()> {
        if self.fail_salt.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        self.inner.write_salt(bytes)
    }

    fn read(&self, label: &str, kind: EntryKind) -> Result<Option<Vec<u8>>> {
        self.inner.read(label, kind)
    }

    fn write(&self, label: &str, kind: EntryKind, bytes: &[u8]) -> Result<()> {
        if let Some((fail_label, fail_kind)) = self.fail_on.lock().unwrap().as_ref() {
            if label == fail_label && kind == *fail_kind {
                return Err(injected_failure());
            }
        }
        self.inner.write(label, kind, bytes)
    }

    fn remove(&self, label: &str, kind: EntryKind) -> Result<bool> {
        self.inner.remove(label, kind)
    }

    fn labels(&self) -> Result<Vec<String>> {
        self.inner.labels()
    }
}
