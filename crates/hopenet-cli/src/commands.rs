//! Command handlers for the HopeNet CLI

use std::time::Duration;

use hopenet_core::{
    Ed25519Provider, IdentityError, IdentityPersistence, IdentityStore, Registration,
};
use tracing::info;

use crate::cli::{Cli, Commands, ConfigAction, RadioKind};
use crate::config::AppConfig;
use crate::discover::{self, format_rssi, DiscoverOptions, DiscoverySummary};
use crate::error::{CliError, Result};
use crate::storage::FileIdentityPersistence;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Register {
                country_code,
                number,
            } => Self::handle_register_command(&config, &country_code, &number),
            Commands::Whoami => Self::handle_whoami_command(&config),
            Commands::Reset { yes } => Self::handle_reset_command(&config, yes),
            Commands::Discover {
                duration,
                sim_peers,
                scan_only,
                radio,
            } => {
                let options = DiscoverOptions {
                    duration: Duration::from_secs(
                        duration.unwrap_or(config.cli.discover_duration_secs),
                    ),
                    sim_peers: sim_peers.unwrap_or(config.cli.sim_peers),
                    scan_only,
                    radio,
                };
                Self::handle_discover_command(&config, options).await
            }
            Commands::Config { action } => Self::handle_config_command(&config, action),
        }
    }

    fn persistence(config: &AppConfig) -> Result<FileIdentityPersistence> {
        Ok(FileIdentityPersistence::new(config.identity_path()?))
    }

    /// Handle the register command
    fn handle_register_command(config: &AppConfig, country_code: &str, number: &str) -> Result<()> {
        let storage = Self::persistence(config)?;
        let store = register(&storage, config, country_code, number)?;
        let identity = store.identity();

        println!("Registered {}", identity.display_handle());
        println!("  peer id:     {}", identity.id());
        println!("  fingerprint: {}", identity.fingerprint());
        println!("  stored in:   {}", storage.path().display());
        Ok(())
    }

    /// Handle the whoami command
    fn handle_whoami_command(config: &AppConfig) -> Result<()> {
        let storage = Self::persistence(config)?;
        let store = IdentityStore::require(&storage)?;
        let identity = store.identity();

        println!("Handle:      {}", identity.display_handle());
        println!("Peer ID:     {}", identity.id());
        println!("Fingerprint: {}", identity.fingerprint());
        println!("Public key:  {}", hex::encode(identity.public_key()));
        println!("Created:     {} ms since epoch", identity.created_at().as_millis());
        Ok(())
    }

    /// Handle the reset command
    fn handle_reset_command(config: &AppConfig, confirmed: bool) -> Result<()> {
        if !confirmed {
            return Err(CliError::NotConfirmed("destroy this device's identity".to_string()));
        }
        let storage = Self::persistence(config)?;
        IdentityStore::reset(&storage)?;
        println!("Identity removed from {}", storage.path().display());
        Ok(())
    }

    /// Handle the discover command
    async fn handle_discover_command(config: &AppConfig, options: DiscoverOptions) -> Result<()> {
        let storage = Self::persistence(config)?;
        let store = IdentityStore::require(&storage)?;

        if options.radio == RadioKind::Sim {
            info!(
                "Using the simulated medium with {} neighbours",
                options.sim_peers
            );
        }
        let summary = discover::run(config, &store, &options).await?;
        print_summary(&summary)
    }

    /// Handle the config command
    fn handle_config_command(config: &AppConfig, action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Example => println!("{}", AppConfig::example_config()),
            ConfigAction::Show => println!("{}", toml::to_string_pretty(config)?),
        }
        Ok(())
    }
}

/// Register a new identity; an existing one is never overwritten
pub fn register(
    storage: &dyn IdentityPersistence,
    config: &AppConfig,
    country_code: &str,
    number: &str,
) -> Result<IdentityStore> {
    IdentityStore::register(
        storage,
        &Ed25519Provider::new(),
        &Registration::new(country_code, number),
        config.discovery.key_bits,
    )
    .map_err(|e| match e {
        IdentityError::AlreadyRegistered(handle) => CliError::AlreadyRegistered(handle),
        other => other.into(),
    })
}

fn print_summary(summary: &DiscoverySummary) -> Result<()> {
    println!();
    if !summary.advertise_supported {
        println!("This device ran in scan-only mode; peers could not discover it.");
    }
    println!(
        "{} peer(s), {} verified",
        summary.peers.len(),
        summary.verified()
    );
    for peer in &summary.peers {
        println!(
            "  {}  {:<16} {:<14} {}",
            peer.peer_id.short(),
            peer.display_handle,
            peer.verification.to_string(),
            format_rssi(peer.signal_strength)
        );
    }
    println!("{}", serde_json::to_string_pretty(&summary.stats)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopenet_core::MemoryIdentityPersistence;

    #[test]
    fn test_register_twice_is_refused() {
        let storage = MemoryIdentityPersistence::new();
        let config = AppConfig::default();

        register(&storage, &config, "+49", "1512345678").unwrap();
        let second = register(&storage, &config, "+49", "1512345679");
        assert!(matches!(
            second,
            Err(CliError::AlreadyRegistered(handle)) if handle == "+491512345678"
        ));
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let storage = MemoryIdentityPersistence::new();
        let result = register(&storage, &AppConfig::default(), "+49", "12");
        assert!(matches!(result, Err(CliError::Identity(_))));
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_reset_without_confirmation_keeps_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.cli.data_dir = Some(dir.path().to_path_buf());

        CommandDispatcher::handle_register_command(&config, "+44", "7911123456").unwrap();
        let refused = CommandDispatcher::handle_reset_command(&config, false);
        assert!(matches!(refused, Err(CliError::NotConfirmed(_))));

        let storage = CommandDispatcher::persistence(&config).unwrap();
        assert!(storage.load().unwrap().is_some());

        CommandDispatcher::handle_reset_command(&config, true).unwrap();
        assert!(storage.load().unwrap().is_none());
    }
}
