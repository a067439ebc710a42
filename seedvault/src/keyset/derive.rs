//! Multi-network, multi-account key-set derivation

use std::collections::BTreeMap;

use crate::crypto::keys::KeyDerivationEngine;
use crate::crypto::mnemonic::{seed_fingerprint, SeedSource};
use crate::error::{Error, Result};

use super::record::KeySetRecord;

/// A single (network, account) derivation that failed and was left out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDerivation {
    pub network: String,
    pub account: u32,
    pub reason: String,
}

#[derive(Debug)]
pub struct DerivedKeySet {
    pub record: KeySetRecord,
    pub skipped: Vec<SkippedDerivation>,
}

/// Derive accounts `0..accounts` on every network in `networks`.
///
/// Unknown networks are rejected up front. A failed derivation for one
/// account is skipped and reported rather than aborting the set.
pub fn derive_key_set<S>(
    engine: &KeyDerivationEngine,
    source: &S,
    phrase: &str,
    passphrase: Option<&str>,
    networks: &[String],
    accounts: u32,
) -> Result<DerivedKeySet>
where
    S: SeedSource + ?Sized,
{
    if accounts == 0 {
        return Err(Error::Validation("At least one account is required".to_string()));
    }
    if networks.is_empty() {
        return Err(Error::Validation("At least one network is required".to_string()));
    }
    for network in networks {
        engine.registry().get(network)?;
    }
    if !source.validate(phrase) {
        return Err(Error::Validation("Invalid mnemonic phrase".to_string()));
    }

    let seed = source.to_seed(phrase, passphrase)?;

    let mut derived = BTreeMap::new();
    let mut skipped = Vec::new();
    for network in networks {
        let mut keys = BTreeMap::new();
        for account in 0..accounts {
            match engine.derive(&seed, network, account) {
                Ok(key) => {
                    keys.insert(account, key);
                }
                Err(e) => {
                    tracing::warn!(network = %network, account, error = %e, "skipping derivation");
                    skipped.push(SkippedDerivation {
                        network: network.clone(),
                        account,
                        reason: e.to_string(),
                    });
                }
            }
        }
        if !keys.is_empty() {
            derived.insert(network.clone(), keys);
        }
    }

    if derived.is_empty() {
        return Err(Error::Derivation("No keys could be derived".to_string()));
    }

    tracing::debug!(networks = derived.len(), accounts, skipped = skipped.len(), "derived key set");

    Ok(DerivedKeySet {
        record: KeySetRecord::new(seed_fingerprint(phrase), derived),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{Curve, NetworkRegistry, NetworkSpec};
    use crate::crypto::mnemonic::Bip39SeedSource;

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn networks(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_derives_every_network_and_account() {
        let engine = KeyDerivationEngine::default();
        let set = derive_key_set(
            &engine,
            &Bip39SeedSource,
            PHRASE,
            None,
            &networks(&["bitcoin", "solana"]),
            3,
        )
        .unwrap();

        assert!(set.skipped.is_empty());
        assert_eq!(set.record.network_names(), networks(&["bitcoin", "solana"]));
        assert_eq!(set.record.accounts_per_network(), 3);
        assert_eq!(set.record.seed_fingerprint, seed_fingerprint(PHRASE));
    }

    #[test]
    fn test_passphrase_changes_keys() {
        let engine = KeyDerivationEngine::default();
        let ids = networks(&["ethereum"]);
        let plain = derive_key_set(&engine, &Bip39SeedSource, PHRASE, None, &ids, 1).unwrap();
        let salted = derive_key_set(&engine, &Bip39SeedSource, PHRASE, Some("TREZOR"), &ids, 1).unwrap();
        assert_ne!(plain.record.networks, salted.record.networks);
    }

    #[test]
    fn test_rejects_bad_input() {
        let engine = KeyDerivationEngine::default();
        let ids = networks(&["bitcoin"]);

        let invalid = "abandon ".repeat(11) + "abandon";
        assert!(matches!(
            derive_key_set(&engine, &Bip39SeedSource, &invalid, None, &ids, 1),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            derive_key_set(&engine, &Bip39SeedSource, PHRASE, None, &ids, 0),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            derive_key_set(&engine, &Bip39SeedSource, PHRASE, None, &networks(&["cardano"]), 1),
            Err(Error::Unsupported(_))
        ));
    }

    /// "ok" always derives; "broken" puts a normal account step on ed25519
    fn partly_broken_engine() -> KeyDerivationEngine {
        let mut registry = NetworkRegistry::new();
        registry.register(NetworkSpec::new("ok", Curve::Secp256k1, "m/44'/1'/0'/0".parse().unwrap()));
        registry.register(NetworkSpec::new("broken", Curve::Ed25519, "m/44'/501'".parse().unwrap()));
        KeyDerivationEngine::new(registry)
    }

    #[test]
    fn test_failed_derivations_are_skipped() {
        let engine = partly_broken_engine();
        let set = derive_key_set(
            &engine,
            &Bip39SeedSource,
            PHRASE,
            None,
            &networks(&["broken", "ok"]),
            2,
        )
        .unwrap();

        assert_eq!(set.record.network_names(), networks(&["ok"]));
        assert_eq!(set.record.networks["ok"].len(), 2);
        assert_eq!(set.skipped.len(), 2);
        assert!(set.skipped.iter().all(|s| s.network == "broken"));
        assert_eq!(
            set.skipped.iter().map(|s| s.account).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_all_derivations_failing_is_an_error() {
        let engine = partly_broken_engine();
        assert!(matches!(
            derive_key_set(&engine, &Bip39SeedSource, PHRASE, None, &networks(&["broken"]), 2),
            Err(Error::Derivation(_))
        ));
    }
}
