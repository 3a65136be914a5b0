//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Short key allocation and SSO account linking
#[derive(Parser, Debug)]
#[command(name = "short-keygen")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "SHORT_KEYGEN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "SHORT_KEYGEN_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "SHORT_KEYGEN_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the development key authority over an in-process key source
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print fresh keys from the configured source
    Mint {
        /// Number of keys to print
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Link an SSO identity to an account in the configured store
    Link {
        /// Provider-scoped SSO user ID
        #[arg(long)]
        sso_id: String,

        /// Email reported by the provider
        #[arg(long, default_value = "")]
        email: String,

        /// Display name reported by the provider
        #[arg(long, default_value = "")]
        name: String,
    },
}
