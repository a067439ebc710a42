//! Key-set records and the projections of them that are safe to show

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::keys::{DerivationPath, NetworkAccountKey, PrivateKey, PublicIdentifier};
use crate::crypto::mnemonic::seed_fingerprint;
use crate::error::{Error, Result};

/// Where a rotated record came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationLineage {
    pub rotated_from: String,
    pub reason: String,
}

/// One derived key bundle. Only ever persisted encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySetRecord {
    /// Hex SHA-256 of the phrase the keys were derived from
    pub seed_fingerprint: String,
    pub created_at: DateTime<Utc>,
    /// network id → account index → key
    pub networks: BTreeMap<String, BTreeMap<u32, NetworkAccountKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_lineage: Option<RotationLineage>,
}

impl KeySetRecord {
    pub fn new(
        seed_fingerprint: String,
        networks: BTreeMap<String, BTreeMap<u32, NetworkAccountKey>>,
    ) -> Self {
        Self {
            seed_fingerprint,
            created_at: Utc::now(),
            networks,
            rotation_lineage: None,
        }
    }

    /// A fresh record carrying the same keys, chained to `rotated_from`
    pub fn successor(&self, rotated_from: &str, reason: &str) -> Self {
        Self {
            seed_fingerprint: self.seed_fingerprint.clone(),
            created_at: Utc::now(),
            networks: self.networks.clone(),
            rotation_lineage: Some(RotationLineage {
                rotated_from: rotated_from.to_string(),
                reason: reason.to_string(),
            }),
        }
    }

    pub fn network_names(&self) -> Vec<String> {
        self.networks.keys().cloned().collect()
    }

    /// Largest number of accounts held for any one network
    pub fn accounts_per_network(&self) -> usize {
        self.networks.values().map(BTreeMap::len).max().unwrap_or(0)
    }

    pub fn key(&self, network: &str, account: u32) -> Result<&NetworkAccountKey> {
        let accounts = self
            .networks
            .get(network)
            .ok_or_else(|| Error::NotFound(format!("Network '{}' is not in this key set", network)))?;
        accounts
            .get(&account)
            .ok_or_else(|| Error::NotFound(format!("Account {} of network '{}'", account, network)))
    }
}

/// True iff `phrase` hashes to the record's fingerprint
pub fn verify_seed_consistency(phrase: &str, record: &KeySetRecord) -> bool {
    seed_fingerprint(phrase) == record.seed_fingerprint
}

/// Unencrypted metadata mirror of a stored record.
///
/// Has no field that can hold key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub seed_fingerprint: String,
    pub network_names: Vec<String>,
    pub accounts_per_network: usize,
    pub blob_path: String,
}

impl Manifest {
    pub fn from_record(label: &str, record: &KeySetRecord, blob_path: String) -> Self {
        Self {
            label: label.to_string(),
            created_at: record.created_at,
            seed_fingerprint: record.seed_fingerprint.clone(),
            network_names: record.network_names(),
            accounts_per_network: record.accounts_per_network(),
            blob_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAccount {
    pub account: u32,
    pub path: DerivationPath,
    pub public_key: PublicIdentifier,
}

/// Paths and public identifiers of a key set, for sharing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSummary {
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub seed_fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_lineage: Option<RotationLineage>,
    pub networks: BTreeMap<String, Vec<PublicAccount>>,
}

impl PublicSummary {
    pub fn from_record(label: &str, record: &KeySetRecord) -> Self {
        let networks = record
            .networks
            .iter()
            .map(|(network, accounts)| {
                let accounts = accounts
                    .iter()
                    .map(|(account, key)| PublicAccount {
                        account: *account,
                        path: key.path.clone(),
                        public_key: key.public_key.clone(),
                    })
                    .collect();
                (network.clone(), accounts)
            })
            .collect();

        Self {
            label: label.to_string(),
            created_at: record.created_at,
            seed_fingerprint: record.seed_fingerprint.clone(),
            rotation_lineage: record.rotation_lineage.clone(),
            networks,
        }
    }
}

/// A single private key pulled out of a stored key set
#[derive(Debug, Clone, Serialize)]
pub struct PrivateKeyExport {
    pub label: String,
    pub network: String,
    pub account: u32,
    pub path: DerivationPath,
    pub private_key: PrivateKey,
    pub public_key: PublicIdentifier,
}
