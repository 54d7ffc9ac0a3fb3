//! # Mindtype - Typing Study Server
//!
//! The main binary for the Mindtype depression-screening and typing study.
//!
//! This application provides:
//! - HTTP JSON API for the survey front end (axum-based)
//! - Interactive terminal wizard
//! - Researcher commands: count, export, journal flush
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    apps/mindtype (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐   │
//! │  │   CLI       │    │   HTTP API  │    │  Sheet driver    │   │
//! │  │  (clap)     │    │   (axum)    │    │  (ureq)          │   │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘   │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                    ┌───────────────┐                           │
//! │                    │ mindtype-core │                           │
//! │                    │ (THE LOGIC)   │                           │
//! │                    └───────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! mindtype server --host 0.0.0.0 --port 8080
//!
//! # Run one participant in the terminal
//! mindtype run
//!
//! # Researcher operations
//! mindtype count
//! mindtype export -o responses-export.csv
//! mindtype flush
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // MINDTYPE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MINDTYPE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mindtype=info,tower_http=debug".into());

    // Logs go to stderr so the terminal wizard and exports keep stdout.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = mindtype::cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = mindtype::cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Mindtype startup banner.
fn print_banner() {
    println!(
        r#"
  ███╗   ███╗██╗███╗   ██╗██████╗ ████████╗██╗   ██╗██████╗ ███████╗
  ████╗ ████║██║████╗  ██║██╔══██╗╚══██╔══╝╚██╗ ██╔╝██╔══██╗██╔════╝
  ██╔████╔██║██║██╔██╗ ██║██║  ██║   ██║    ╚████╔╝ ██████╔╝█████╗
  ██║╚██╔╝██║██║██║╚██╗██║██║  ██║   ██║     ╚██╔╝  ██╔═══╝ ██╔══╝
  ██║ ╚═╝ ██║██║██║ ╚████║██████╔╝   ██║      ██║   ██║     ███████╗
  ╚═╝     ╚═╝╚═╝╚═╝  ╚═══╝╚═════╝    ╚═╝      ╚═╝   ╚═╝     ╚══════╝

  Typing Study Server v{}

  PHQ-9 • Copy Task • Free Writing
"#,
        env!("CARGO_PKG_VERSION")
    );
}
