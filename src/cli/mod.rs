pub mod onboard;
pub mod prompt;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "attendance",
    about = "WiFi attendance: match device MAC addresses to enrollment numbers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for the configured scan target.
#[derive(Debug, Clone, Default, Args)]
pub struct ScanTarget {
    /// CIDR range to probe, e.g. 192.168.0.1/24
    #[arg(long)]
    pub range: Option<String>,
    /// Network interface to send ARP requests on
    #[arg(long)]
    pub interface: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive first-time configuration
    Setup,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Record one device typed in by the operator
    Manual {
        #[arg(long)]
        mac: Option<String>,
        #[arg(long = "id")]
        identifier: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Discover devices and record attendance for each
    Scan {
        #[command(flatten)]
        target: ScanTarget,
        /// Only refresh registered devices; do not prompt for identifiers
        #[arg(long, default_value_t = false)]
        known_only: bool,
    },
    /// List responding devices without recording anything
    Discover {
        #[command(flatten)]
        target: ScanTarget,
    },
    /// Rescan periodically and mark registered devices present
    Watch {
        #[command(flatten)]
        target: ScanTarget,
    },
    /// Accept MAC addresses posted by a hotspot
    Serve,
    Devices,
    Report {
        #[arg(long)]
        date: Option<String>,
    },
    Status,
    Doctor,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
