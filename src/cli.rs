//! Command-line interface definitions using clap
//!
//! This module defines the CLI structure for geokeeper using clap's derive macros.

use clap::{Parser, Subcommand};

/// GeoKeeper - keeps MaxMind GeoIP databases fresh and serves lookups
#[derive(Parser)]
#[command(name = "geokeeper")]
#[command(version)]
#[command(about = "Keeps MaxMind GeoIP databases fresh and serves lookups", long_about = None)]
pub struct Cli {
    /// Configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server with periodic download and reload (default)
    Serve,

    /// Run one update cycle and exit
    ///
    /// Exits non-zero if any database failed to update.
    Download {
        /// Edition ids to refresh (default: updater.editions)
        names: Vec<String>,
    },

    /// Look up one IP address against the local databases and print JSON
    Lookup {
        ip: std::net::IpAddr,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<String>,
    },
}
