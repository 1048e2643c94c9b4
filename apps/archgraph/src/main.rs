//! # Archgraph
//!
//! The main binary for the archgraph dependency-graph engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            apps/archgraph (THE BINARY)        │
//! │                                               │
//! │  ┌─────────────┐        ┌─────────────────┐   │
//! │  │   CLI       │        │  Project reader │   │
//! │  │  (clap)     │        │  (walkdir)      │   │
//! │  └──────┬──────┘        └────────┬────────┘   │
//! │         └────────────┬───────────┘            │
//! │                      ▼                        │
//! │              ┌────────────────┐               │
//! │              │ archgraph-core │               │
//! │              │  (THE LOGIC)   │               │
//! │              └────────────────┘               │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! archgraph -P ./my-project deps shop/api
//! archgraph path shop/web shop/db
//! archgraph analyze --per-system --json-mode
//! archgraph add-rel shop/api shop/db -l reads -t SQL
//! ```

use archgraph::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // ARCHGRAPH_LOG_FORMAT=json enables machine-parseable logs on stderr.
    let log_format = std::env::var("ARCHGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "archgraph=info".into());

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

    let cli = cli::Cli::parse();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = cli::execute(cli, &mut out) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
