//! # Archgraph CLI Module
//!
//! This module implements the CLI interface for archgraph.
//!
//! ## Available Commands
//!
//! - `deps` - Elements an element depends on
//! - `dependents` - Elements that depend on an element
//! - `children` - Direct children in the hierarchy
//! - `path` - Shortest dependency path between two elements
//! - `analyze` - Coupling report (whole project or one system)
//! - `list` - List elements
//! - `check` - Build, report warnings and the graph checksum
//! - `add-rel` - Author a relationship
//! - `remove-rel` - Remove an authored relationship by ID
//! - `delete-element` - Cascade-delete stored relationships of an element

mod commands;

use archgraph_core::{ArchError, ElementKind, RelationshipKind};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Archgraph - architecture dependency graph
///
/// Builds a dependency graph from an architecture model, its diagram
/// sources, and authored relationship files, and answers queries over it.
#[derive(Parser, Debug)]
#[command(name = "archgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show build warnings with text output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the project root
    #[arg(short = 'P', long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the elements an element depends on
    Deps {
        /// Qualified element ID (e.g. shop/api)
        id: String,
    },

    /// List the elements that depend on an element
    Dependents {
        /// Qualified element ID
        id: String,
    },

    /// List the direct children of an element
    Children {
        /// Qualified element ID
        id: String,
    },

    /// Find the shortest dependency path
    Path {
        /// Starting element
        from: String,

        /// Target element
        to: String,
    },

    /// Report isolated, highly coupled and central elements
    Analyze {
        /// Restrict the report to one system
        #[arg(short, long)]
        system: Option<String>,

        /// One report per system
        #[arg(long, conflicts_with = "system")]
        per_system: bool,
    },

    /// List elements
    List {
        /// Only elements of this kind
        #[arg(short, long, value_enum)]
        kind: Option<KindFilter>,
    },

    /// Build the graph and report warnings and checksum
    Check,

    /// Author a relationship between two existing elements
    AddRel {
        /// Source element
        source: String,

        /// Target element
        target: String,

        /// Relationship label
        #[arg(short, long, default_value = "")]
        label: String,

        /// Technology (e.g. "HTTPS", "gRPC")
        #[arg(short, long)]
        technology: Option<String>,

        /// Communication kind
        #[arg(short = 'k', long, value_enum)]
        kind: Option<CommKind>,

        /// Mark the relationship bidirectional
        #[arg(short, long)]
        bidirectional: bool,
    },

    /// Remove an authored relationship by ID
    RemoveRel {
        /// System whose relationship file holds it
        system: String,

        /// Relationship ID (rel-...)
        id: String,
    },

    /// Remove every authored relationship touching an element
    DeleteElement {
        /// Qualified element ID
        id: String,
    },
}

/// Element kind filter for `list`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    System,
    Container,
    Component,
}

impl From<KindFilter> for ElementKind {
    fn from(kind: KindFilter) -> Self {
        match kind {
            KindFilter::System => ElementKind::System,
            KindFilter::Container => ElementKind::Container,
            KindFilter::Component => ElementKind::Component,
        }
    }
}

/// Communication kind for `add-rel`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommKind {
    Sync,
    Async,
    Event,
}

impl From<CommKind> for RelationshipKind {
    fn from(kind: CommKind) -> Self {
        match kind {
            CommKind::Sync => RelationshipKind::Sync,
            CommKind::Async => RelationshipKind::Async,
            CommKind::Event => RelationshipKind::Event,
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments, writing results to `out`.
pub fn execute(cli: Cli, out: &mut dyn Write) -> Result<(), ArchError> {
    let ctx = Context::open(&cli.project, cli.json_mode, cli.verbose)?;

    match cli.command {
        Commands::Deps { id } => cmd_deps(&ctx, out, &id),
        Commands::Dependents { id } => cmd_dependents(&ctx, out, &id),
        Commands::Children { id } => cmd_children(&ctx, out, &id),
        Commands::Path { from, to } => cmd_path(&ctx, out, &from, &to),
        Commands::Analyze { system, per_system } => {
            cmd_analyze(&ctx, out, system.as_deref(), per_system)
        }
        Commands::List { kind } => cmd_list(&ctx, out, kind.map(ElementKind::from)),
        Commands::Check => cmd_check(&ctx, out),
        Commands::AddRel {
            source,
            target,
            label,
            technology,
            kind,
            bidirectional,
        } => cmd_add_rel(
            &ctx,
            out,
            &source,
            &target,
            &label,
            archgraph_core::EdgeAttributes {
                technology,
                kind: kind.map(RelationshipKind::from),
                bidirectional,
            },
        ),
        Commands::RemoveRel { system, id } => cmd_remove_rel(&ctx, out, &system, &id),
        Commands::DeleteElement { id } => cmd_delete_element(&ctx, out, &id),
    }
}
