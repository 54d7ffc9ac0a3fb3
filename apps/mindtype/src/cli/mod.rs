//! # Mindtype CLI Module
//!
//! This module implements the CLI interface for Mindtype.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `run` - Run one participant through the wizard in the terminal
//! - `count` - Show the number of stored records
//! - `export` - Export all records as CSV
//! - `flush` - Replay journaled records into the primary backend
//! - `init` - Write a commented configuration file
//! - `hash-secret` - Compute the BLAKE3 hash of an admin secret

mod commands;

use crate::config::{Backend, Config, DEFAULT_CONFIG_PATH};
use clap::{Parser, Subcommand};
use mindtype_core::MindtypeError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Mindtype - Typing Study Server
///
/// PHQ-9 depression screening followed by a copy task and a free-writing
/// task, one anonymous record per participant.
#[derive(Parser, Debug)]
#[command(name = "mindtype")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Storage backend override: "csv", "redb" or "sheet"
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Run one participant through the wizard in this terminal
    Run,

    /// Show the number of stored records
    Count,

    /// Export all records as CSV
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replay journaled records into the primary backend
    Flush,

    /// Write a commented configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the BLAKE3 hash of an admin secret
    HashSecret {
        /// The secret to hash
        secret: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), MindtypeError> {
    let json_mode = cli.json_mode;

    // These two never touch the configured storage.
    match &cli.command {
        Some(Commands::Init { force }) => return cmd_init(&cli.config, *force),
        Some(Commands::HashSecret { secret }) => return cmd_hash_secret(secret, json_mode),
        _ => {}
    }

    let mut config = Config::load(&cli.config)?;
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    if cli.verbose {
        tracing::info!(
            backend = %config.storage.backend,
            data = ?config.storage.data,
            journal = ?config.storage.journal,
            min_age = config.study.min_age,
            "Configuration loaded from {:?}",
            cli.config
        );
    }

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&config, &host, port).await,
        Some(Commands::Run) => cmd_run(&config).await,
        Some(Commands::Count) => cmd_count(&config, json_mode).await,
        Some(Commands::Export { output }) => cmd_export(&config, &output).await,
        Some(Commands::Flush) => cmd_flush(&config, json_mode).await,
        Some(Commands::Init { .. } | Commands::HashSecret { .. }) => Ok(()),
        None => {
            // No subcommand - show the record count by default
            cmd_count(&config, json_mode).await
        }
    }
}
