//! # Tessera CLI Module
//!
//! This module implements the CLI interface for Tessera.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show session status
//! - `init` - Initialize a new store with an empty root
//! - `define` - Store an entity definition
//! - `file-info` - Store a file info record
//! - `upload` - Store a raw file and its file info record
//! - `check` - Check an entity without publishing it
//! - `publish` - Publish an entity
//! - `feed` - Show a feed
//! - `get` - Look up a feed entry by sequence number
//! - `cat` - Print the raw bytes behind an address

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tessera_core::TesseraError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Tessera - typed entities in append-only feeds
///
/// Entities are checked against their type's definition, stored by address,
/// and appended to per-type feeds under a single published root.
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file (defaults apply if it does not exist)
    #[arg(short = 'c', long, global = true, default_value = "tessera.toml")]
    pub config: PathBuf,

    /// Store backend: "memory", "redb" or "ipfs" (overrides the config file)
    #[arg(short = 'S', long, global = true)]
    pub store: Option<String>,

    /// Path to the redb database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

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
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show session status
    Status,

    /// Initialize a new store with an empty root
    Init {
        /// Force initialization even if the database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Store an entity definition from a JSON file
    Define {
        /// Path to the definition record
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Store a file info record from a JSON file
    FileInfo {
        /// Path to the file info record
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Store a raw file and a file info record describing it
    Upload {
        /// Path to the file to upload
        #[arg(short, long)]
        file: PathBuf,

        /// File type token (defaults to the file extension)
        #[arg(short = 't', long)]
        file_type: Option<String>,
    },

    /// Check an entity against its definition without publishing it
    Check {
        /// Path to the entity record
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Publish an entity to its feed
    Publish {
        /// Path to the entity record
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show the entries of a feed, newest first
    Feed {
        /// Entity type (address of its definition)
        #[arg(short = 't', long)]
        entity_type: String,

        /// Include the evicted history, not just the recent window
        #[arg(short, long)]
        all: bool,
    },

    /// Look up a feed entry by sequence number
    Get {
        /// Entity type (address of its definition)
        #[arg(short = 't', long)]
        entity_type: String,

        /// Sequence number of the entry
        #[arg(short, long)]
        sequence: u64,
    },

    /// Print the raw bytes stored at an address
    Cat {
        /// Address of the object
        cid: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), TesseraError> {
    let mut config = Config::load(&cli.config)?;
    config.apply_overrides(cli.store.as_deref(), cli.database.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&config, host, port).await,
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Define { file }) => cmd_define(&config, json_mode, &file),
        Some(Commands::FileInfo { file }) => cmd_file_info(&config, json_mode, &file),
        Some(Commands::Upload { file, file_type }) => {
            cmd_upload(&config, json_mode, &file, file_type.as_deref())
        }
        Some(Commands::Check { file }) => cmd_check(&config, json_mode, &file),
        Some(Commands::Publish { file }) => cmd_publish(&config, json_mode, &file),
        Some(Commands::Feed { entity_type, all }) => {
            cmd_feed(&config, json_mode, &entity_type, all)
        }
        Some(Commands::Get {
            entity_type,
            sequence,
        }) => cmd_get(&config, json_mode, &entity_type, sequence),
        Some(Commands::Cat { cid }) => cmd_cat(&config, &cid),
        None => {
            // No subcommand - show status by default
            cmd_status(&config, json_mode)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
