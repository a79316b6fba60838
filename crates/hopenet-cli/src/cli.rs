//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Data directory holding the device identity
    #[arg(short, long, global = true)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register this device with a phone number
    Register {
        /// International dialling code, e.g. +44
        #[arg(long, allow_hyphen_values = true)]
        country_code: String,
        /// Local number (10 digits)
        number: String,
    },
    /// Show the registered identity
    Whoami,
    /// Destroy the registered identity
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Discover and verify nearby peers
    Discover {
        /// How long to run, in seconds
        #[arg(long)]
        duration: Option<u64>,
        /// Number of simulated neighbours to spawn
        #[arg(long)]
        sim_peers: Option<usize>,
        /// Do not advertise; only scan
        #[arg(long)]
        scan_only: bool,
        /// Radio to discover on
        #[arg(long, value_enum, default_value_t = RadioKind::Sim)]
        radio: RadioKind,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print an example configuration file
    Example,
    /// Print the effective configuration
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RadioKind {
    /// In-process simulated medium
    Sim,
    /// Host Bluetooth adapter (requires the `ble` feature)
    Ble,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_register() {
        let cli = Cli::parse_from([
            "hopenet",
            "register",
            "--country-code",
            "+44",
            "7911123456",
        ]);
        match cli.command {
            Commands::Register {
                country_code,
                number,
            } => {
                assert_eq!(country_code, "+44");
                assert_eq!(number, "7911123456");
            }
            _ => panic!("expected register"),
        }
    }

    #[test]
    fn test_parse_discover_flags() {
        let cli = Cli::parse_from([
            "hopenet",
            "--verbose",
            "discover",
            "--duration",
            "5",
            "--sim-peers",
            "2",
            "--scan-only",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Discover {
                duration,
                sim_peers,
                scan_only,
                radio,
            } => {
                assert_eq!(duration, Some(5));
                assert_eq!(sim_peers, Some(2));
                assert!(scan_only);
                assert_eq!(radio, RadioKind::Sim);
            }
            _ => panic!("expected discover"),
        }
    }

    #[test]
    fn test_reset_requires_explicit_flag_to_confirm() {
        let cli = Cli::parse_from(["hopenet", "reset"]);
        assert!(matches!(cli.command, Commands::Reset { yes: false }));
    }
}
