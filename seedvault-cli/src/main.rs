//! Seedvault CLI
//!
//! Derives, stores, rotates and exports encrypted key sets. Secrets are read
//! from `SEEDVAULT_PASSWORD`, `SEEDVAULT_PHRASE` and friends when set, and
//! from stdin otherwise. They are never accepted as command-line arguments.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zeroize::Zeroizing;

use seedvault::crypto::keys::KeyDerivationEngine;
use seedvault::crypto::mnemonic::{Bip39SeedSource, MnemonicStrength, SeedSource};
use seedvault::crypto::vault::SessionKey;
use seedvault::keyset::derive_key_set;
use seedvault::storage::write_private_file;
use seedvault::{KeySetStore, RotationManager, VaultConfig};

#[derive(Parser)]
#[command(name = "seedvault")]
#[command(about = "Multi-network key derivation and encrypted key-set storage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Storage root override
    #[arg(short, long)]
    storage_path: Option<PathBuf>,

    /// PBKDF2 iteration count for new salts
    #[arg(long)]
    kdf_iterations: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the salt for a new storage root
    Init,
    /// Generate a new phrase, derive its keys and store them
    Generate {
        /// Phrase length, 12 or 24
        #[arg(short, long, default_value_t = 12)]
        words: usize,
        #[command(flatten)]
        derive: DeriveArgs,
    },
    /// Derive and store keys for an existing phrase
    Import {
        #[command(flatten)]
        derive: DeriveArgs,
    },
    /// List stored key sets
    List,
    /// List active key sets
    Active,
    /// Show the public summary of a key set
    Summary {
        label: String,
        /// Also store it as <label>_summary.json
        #[arg(long)]
        write: bool,
        /// Write it to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print one private key
    ExportKey {
        label: String,
        #[arg(short, long)]
        network: String,
        #[arg(short, long, default_value_t = 0)]
        account: u32,
    },
    /// Check a phrase against a stored key set
    Verify { label: String },
    /// Rotate a key set to a new label
    Rotate {
        label: String,
        #[arg(short, long, default_value = "manual rotation")]
        reason: String,
    },
    /// Show the rotation history of a key set
    History { label: String },
    /// Mark a key set active
    Activate { label: String },
    /// Mark a key set inactive
    Deactivate { label: String },
    /// Re-encrypt every key set under a new password
    ChangePassword,
    /// Delete a key set
    Delete {
        label: String,
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(clap::Args)]
struct DeriveArgs {
    /// Label to store under; generated from the time when omitted
    #[arg(short, long)]
    label: Option<String>,
    /// Accounts to derive per network
    #[arg(short, long)]
    accounts: Option<u32>,
    /// Comma separated network ids
    #[arg(short, long)]
    networks: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut config = VaultConfig::from_env();
    if let Some(path) = &cli.storage_path {
        config.storage_path = path.clone();
    }
    if let Some(iterations) = cli.kdf_iterations {
        config.kdf_iterations = iterations;
    }

    let store = KeySetStore::open(&config.storage_path)
        .with_context(|| format!("Failed to open storage root {}", config.storage_path.display()))?;

    match cli.command {
        Commands::Init => {
            let password = read_secret("SEEDVAULT_PASSWORD", "New password")?;
            store
                .initialize(&password, config.kdf_params()?)
                .context("Failed to initialize storage root")?;
            info!("Storage root ready at {}", config.storage_path.display());
        }
        Commands::Generate { words, derive } => {
            let strength = MnemonicStrength::from_word_count(words)?;
            let phrase = Zeroizing::new(Bip39SeedSource.generate(strength)?);
            let key = unlock(&store)?;
            let label = derive_and_save(&store, &config, &derive, &phrase, &key)?;

            println!("{}", phrase.as_str());
            eprintln!("Write the phrase down and store it offline. It is not saved anywhere.");
            println!("{}", label);
        }
        Commands::Import { derive } => {
            let phrase = read_secret("SEEDVAULT_PHRASE", "Seed phrase")?;
            let key = unlock(&store)?;
            let label = derive_and_save(&store, &config, &derive, &phrase, &key)?;
            println!("{}", label);
        }
        Commands::List => {
            let rotation = RotationManager::new(&store);
            for manifest in store.list()? {
                let state = store.state(&manifest.label)?;
                println!(
                    "{}\t{}\t{}\t{} networks x {} accounts",
                    manifest.label,
                    if state.active { "active" } else { "inactive" },
                    manifest.created_at.format("%Y-%m-%d %H:%M:%S"),
                    manifest.network_names.len(),
                    manifest.accounts_per_network,
                );
                for event in rotation.history(&manifest.label)? {
                    println!("\t-> {} ({})", event.rotated_to, event.reason);
                }
            }
        }
        Commands::Active => {
            for (manifest, state) in RotationManager::new(&store).get_active()? {
                println!(
                    "{}\tactive since {}",
                    manifest.label,
                    state.activated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Commands::Summary { label, write, output } => {
            let key = unlock(&store)?;
            let summary = if write {
                store.write_summary(&label, &key)?
            } else {
                store.export_summary(&label, &key)?
            };
            let json = serde_json::to_string_pretty(&summary)?;
            match output {
                Some(path) => {
                    write_private_file(&path, json.as_bytes())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Summary written to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::ExportKey { label, network, account } => {
            let key = unlock(&store)?;
            let export = store
                .export_private_key(&label, &network.to_lowercase(), account, &key)
                .with_context(|| format!("Failed to export {} account {} from {}", network, account, label))?;
            println!("{}", serde_json::to_string_pretty(&export)?);
        }
        Commands::Verify { label } => {
            let phrase = read_secret("SEEDVAULT_PHRASE", "Seed phrase")?;
            let key = unlock(&store)?;
            if !RotationManager::new(&store).verify_label(&phrase, &label, &key)? {
                bail!("Phrase does not match key set '{}'", label);
            }
            println!("Phrase matches key set '{}'", label);
        }
        Commands::Rotate { label, reason } => {
            let key = unlock(&store)?;
            let new_label = RotationManager::new(&store)
                .rotate(&label, &reason, &key)
                .with_context(|| format!("Failed to rotate {}", label))?;
            println!("{}", new_label);
        }
        Commands::History { label } => {
            let history = RotationManager::new(&store).history(&label)?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        Commands::Activate { label } => {
            RotationManager::new(&store).activate(&label)?;
        }
        Commands::Deactivate { label } => {
            RotationManager::new(&store).deactivate(&label)?;
        }
        Commands::ChangePassword => {
            let key = unlock(&store)?;
            let new_password = read_secret("SEEDVAULT_NEW_PASSWORD", "New password")?;
            store
                .change_password(&key, &new_password, config.kdf_params()?)
                .context("Failed to change password")?;
        }
        Commands::Delete { label, yes } => {
            if !yes {
                bail!("Refusing to delete '{}' without --yes", label);
            }
            store.delete(&label)?;
        }
    }

    Ok(())
}

fn unlock(store: &KeySetStore) -> Result<SessionKey> {
    let password = read_secret("SEEDVAULT_PASSWORD", "Password")?;
    store.unlock(&password).context("Failed to unlock storage root")
}

fn derive_and_save(
    store: &KeySetStore,
    config: &VaultConfig,
    args: &DeriveArgs,
    phrase: &str,
    key: &SessionKey,
) -> Result<String> {
    let engine = KeyDerivationEngine::default();
    let networks = match &args.networks {
        Some(list) => seedvault::config::parse_network_list(list),
        None => config.network_ids(engine.registry()),
    };
    let accounts = args.accounts.unwrap_or(config.accounts_per_network);
    let passphrase = std::env::var("SEEDVAULT_PASSPHRASE").ok().map(Zeroizing::new);

    let derived = derive_key_set(
        &engine,
        &Bip39SeedSource,
        phrase,
        passphrase.as_deref().map(String::as_str),
        &networks,
        accounts,
    )
    .context("Failed to derive key set")?;

    for skipped in &derived.skipped {
        eprintln!("Skipped {} account {}: {}", skipped.network, skipped.account, skipped.reason);
    }

    let label = store
        .save(&derived.record, args.label.as_deref(), key)
        .context("Failed to save key set")?;
    info!("Saved key set {}", label);
    Ok(label)
}

/// Read a secret from `env_var`, or a line from stdin
fn read_secret(env_var: &str, prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(value) = std::env::var(env_var) {
        return Ok(Zeroizing::new(value));
    }

    eprint!("{}: ", prompt);
    io::stderr().flush()?;

    let mut line = Zeroizing::new(String::new());
    io::stdin()
        .lock()
        .read_line(&mut line)
        .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))?;

    let value = line.trim();
    if value.is_empty() {
        bail!("{} is required (set {} or type it on stdin)", prompt, env_var);
    }
    Ok(Zeroizing::new(value.to_string()))
}
