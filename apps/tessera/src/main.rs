//! # Tessera
//!
//! The main binary for Tessera: typed entities, checked against their
//! definitions and kept in append-only feeds under one published root.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for definitions, entities and feeds
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 apps/tessera (THE BINARY)                │
//! │                                                          │
//! │   ┌─────────────┐   ┌─────────────┐   ┌──────────────┐   │
//! │   │    CLI      │   │  HTTP API   │   │  IPFS store  │   │
//! │   │   (clap)    │   │   (axum)    │   │  (ipfs CLI)  │   │
//! │   └──────┬──────┘   └──────┬──────┘   └──────┬───────┘   │
//! │          └─────────────────┼─────────────────┘           │
//! │                            ▼                             │
//! │                   ┌────────────────┐                     │
//! │                   │  tessera-core  │                     │
//! │                   │  (THE LOGIC)   │                     │
//! │                   └────────────────┘                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! tessera server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! tessera define -f profile.json
//! tessera publish -f alice.json
//! tessera feed -t <entity-type> --all
//! ```

use clap::Parser;
use tessera::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // TESSERA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TESSERA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tessera=info,tessera_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Tessera startup banner.
fn print_banner() {
    println!(
        r#"
  ▀█▀ █▀▀ █▀ █▀ █▀▀ █▀█ ▄▀█
   █  ██▄ ▄█ ▄█ ██▄ █▀▄ █▀█

  Typed entity feeds v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
