//! Runtime configuration

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::crypto::keys::NetworkRegistry;
use crate::crypto::vault::{KdfParams, MIN_PBKDF2_ITERATIONS};
use crate::error::Result;

pub const DEFAULT_STORAGE_PATH: &str = "./wallets/seedvault";

/// Vault configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    pub storage_path: PathBuf,
    pub kdf_iterations: u32,
    pub accounts_per_network: u32,
    /// Empty means every registered network
    pub networks: Vec<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            kdf_iterations: MIN_PBKDF2_ITERATIONS,
            accounts_per_network: 1,
            networks: Vec::new(),
        }
    }
}

impl VaultConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let storage_path = std::env::var("SEEDVAULT_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_path);

        let kdf_iterations = parse_or_default(
            "SEEDVAULT_KDF_ITERATIONS",
            std::env::var("SEEDVAULT_KDF_ITERATIONS").ok(),
            defaults.kdf_iterations,
        );

        let accounts_per_network = parse_or_default(
            "SEEDVAULT_ACCOUNTS",
            std::env::var("SEEDVAULT_ACCOUNTS").ok(),
            defaults.accounts_per_network,
        );

        let networks = std::env::var("SEEDVAULT_NETWORKS")
            .map(|v| parse_network_list(&v))
            .unwrap_or(defaults.networks);

        Self {
            storage_path,
            kdf_iterations,
            accounts_per_network,
            networks,
        }
    }

    /// KDF parameters for new salts. Rejects counts below the minimum.
    pub fn kdf_params(&self) -> Result<KdfParams> {
        KdfParams::new(self.kdf_iterations)
    }

    /// Configured networks, or every network in `registry`
    pub fn network_ids(&self, registry: &NetworkRegistry) -> Vec<String> {
        if self.networks.is_empty() {
            registry.ids().into_iter().map(str::to_string).collect()
        } else {
            self.networks.clone()
        }
    }
}

/// Parse `value` when set, warning and keeping `default` when it is malformed
fn parse_or_default<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(value) = value else {
        return default;
    };
    match value.trim().parse() {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(variable = name, value = %value, error = %e, fallback = %default, "ignoring malformed setting");
            default
        }
    }
}

/// Split a comma separated list, dropping blanks
pub fn parse_network_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
