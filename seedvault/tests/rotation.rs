//! Tests for the key-set lifecycle

mod common;

use seedvault::crypto::keys::KeyDerivationEngine;
use seedvault::crypto::mnemonic::Bip39SeedSource;
use seedvault::keyset::derive_key_set;
use seedvault::storage::{EntryKind, KeySetBackend, KeySetStore, MemoryBackend};
use seedvault::{Error, RotationManager};

use common::*;

#[test]
fn test_rotate() {
    let store = KeySetStore::new(MemoryBackend::new());
    let key = store.initialize(PASSWORD, test_params()).unwrap();
    let record = sample_record();
    store.save(&record, Some("w1"), &key).unwrap();

    let rotation = RotationManager::new(&store);
    let new_label = rotation.rotate("w1", "scheduled", &key).unwrap();
    assert!(new_label.starts_with("w1_rotated_"));

    let old_state = store.state("w1").unwrap();
    assert!(!old_state.active);
    assert!(old_state.deactivated_at.is_some());
    assert_eq!(old_state.rotation_history.len(), 1);
    assert_eq!(old_state.rotation_history[0].rotated_to, new_label);
    assert_eq!(old_state.rotation_history[0].reason, "scheduled");

    let new_state = store.state(&new_label).unwrap();
    assert!(new_state.active);
    assert!(new_state.rotation_history.is_empty());
    assert_eq!(new_state.rotated_from.as_deref(), Some("w1"));

    let successor = store.load(&new_label, Some(&key)).unwrap();
    assert_eq!(successor.networks, record.networks);
    assert_eq!(successor.seed_fingerprint, record.seed_fingerprint);
    let lineage = successor.rotation_lineage.unwrap();
    assert_eq!(lineage.rotated_from, "w1");
    assert_eq!(lineage.reason, "scheduled");

    // the old record is kept
    assert_eq!(store.load("w1", Some(&key)).unwrap(), record);

    let active: Vec<_> = rotation
        .get_active()
        .unwrap()
        .into_iter()
        .map(|(manifest, _)| manifest.label)
        .collect();
    assert_eq!(active, vec![new_label]);
}

#[test]
fn test_rotation_chain() {
    let store = KeySetStore::new(MemoryBackend::new());
    let key = store.initialize(PASSWORD, test_params()).unwrap();
    store.save(&sample_record(), Some("w1"), &key).unwrap();

    let rotation = RotationManager::new(&store);
    let second = rotation.rotate("w1", "first", &key).unwrap();
    let third = rotation.rotate(&second, "second", &key).unwrap();

    assert_eq!(rotation.history(&second).unwrap()[0].rotated_to, third);
    assert_eq!(store.state(&third).unwrap().rotated_from.as_deref(), Some(second.as_str()));
    assert_eq!(rotation.get_active().unwrap().len(), 1);
    assert_eq!(store.list().unwrap().len(), 3);
}

#[test]
fn test_rotating_inactive_label_is_rejected() {
    let store = KeySetStore::new(MemoryBackend::new());
    let key = store.initialize(PASSWORD, test_params()).unwrap();
    store.save(&sample_record(), Some("w1"), &key).unwrap();

    let rotation = RotationManager::new(&store);
    rotation.deactivate("w1").unwrap();
    assert!(matches!(
        rotation.rotate("w1", "again", &key),
        Err(Error::Validation(_))
    ));
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn test_rotate_missing_label() {
    let store = KeySetStore::new(MemoryBackend::new());
    let key = store.initialize(PASSWORD, test_params()).unwrap();
    let rotation = RotationManager::new(&store);
    assert!(matches!(
        rotation.rotate("nope", "reason", &key),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(rotation.history("nope"), Err(Error::NotFound(_))));
}

#[test]
fn test_failed_rotation_is_rolled_back() {
    let store = KeySetStore::new(FailingBackend::default());
    let key = store.initialize(PASSWORD, test_params()).unwrap();
    store.save(&sample_record(), Some("w1"), &key).unwrap();
    store.backend().fail_writes("w1", EntryKind::State);

    let rotation = RotationManager::new(&store);
    assert!(matches!(
        rotation.rotate("w1", "scheduled", &key),
        Err(Error::Storage(_))
    ));

    let labels: Vec<_> = store.list().unwrap().into_iter().map(|m| m.label).collect();
    assert_eq!(labels, vec!["w1"]);
    assert!(store.backend().labels().unwrap().iter().all(|l| l == "w1"));

    let state = store.state("w1").unwrap();
    assert!(state.active);
    assert!(state.rotation_history.is_empty());
}

#[test]
fn test_activate_and_deactivate() {
    let store = KeySetStore::new(MemoryBackend::new());
    let key = store.initialize(PASSWORD, test_params()).unwrap();
    store.save(&sample_record(), Some("w1"), &key).unwrap();
    let rotation = RotationManager::new(&store);

    let first = rotation.deactivate("w1").unwrap();
    assert!(!first.active);
    let second = rotation.deactivate("w1").unwrap();
    assert_eq!(first, second);

    let active = rotation.activate("w1").unwrap();
    assert!(active.active);
    let refreshed = rotation.set_active("w1", true).unwrap();
    assert!(refreshed.activated_at >= active.activated_at);

    assert!(!rotation.set_active("w1", false).unwrap().active);
    assert!(rotation.get_active().unwrap().is_empty());
}

#[test]
fn test_verify_label() {
    let store = KeySetStore::new(MemoryBackend::new());
    let key = store.initialize(PASSWORD, test_params()).unwrap();
    store.save(&sample_record(), Some("w1"), &key).unwrap();
    let rotation = RotationManager::new(&store);

    assert!(rotation.verify_label(PHRASE, "w1", &key).unwrap());
    let altered = PHRASE.replacen("about", "absent", 1);
    assert!(!rotation.verify_label(&altered, "w1", &key).unwrap());
}

#[test]
fn test_verify_label_accepts_phrase_spelling_variants() {
    let store = KeySetStore::new(MemoryBackend::new());
    let key = store.initialize(PASSWORD, test_params()).unwrap();
    let variant = format!(" {} \n", PHRASE.replace(' ', "  ").to_uppercase());
    let networks = vec!["ethereum".to_string()];
    let imported = derive_key_set(
        &KeyDerivationEngine::default(),
        &Bip39SeedSource,
        &variant,
        None,
        &networks,
        1,
    )
    .unwrap();
    store.save(&imported.record, Some("variant"), &key).unwrap();
    store.save(&sample_record(), Some("canonical"), &key).unwrap();

    let rotation = RotationManager::new(&store);
    assert!(rotation.verify_label(PHRASE, "variant", &key).unwrap());
    assert!(rotation.verify_label(&variant, "canonical", &key).unwrap());
    assert_eq!(
        imported.record.networks["ethereum"][&0].private_key,
        sample_record().networks["ethereum"][&0].private_key
    );
}
