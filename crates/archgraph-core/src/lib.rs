//! # archgraph-core
//!
//! The architecture dependency-graph engine - THE LOGIC.
//!
//! Builds, caches and queries a directed graph of architecture elements
//! (systems, containers, components) from two independently maintained
//! relationship sources: structured metadata authored on elements (plus the
//! per-system relationship store) and arrow syntax in diagram sources.
//!
//! ## Pipeline
//!
//! ```text
//! Hierarchy ──► IdIndex ──┬─► extract_structured ──┐
//!                         └─► DiagramPool ─────────┴─► build ─► Graph ─► GraphCache
//! ```
//!
//! ## Architectural Constraints
//!
//! - Deterministic: `BTreeMap`/`BTreeSet` everywhere, so identical inputs
//!   give identical graphs and identical query output
//! - The graph is immutable once built; mutations rebuild
//! - No async, no network; the only file I/O is the relationship store and
//!   the config loader
//! - The only parallelism is the fixed-size diagram worker pool

// =============================================================================
// MODULES
// =============================================================================

pub mod analysis;
pub mod build;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod extract;
pub mod graph;
pub mod hierarchy;
pub mod ident;
pub mod primitives;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ArchError, BuildWarning, ElementKind, Node, Provenance, QualifiedId, RawRelationship,
    Relationship, RelationshipId, RelationshipKind,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use analysis::{
    CouplingThresholds, DegreeEntry, DependencyReport, analyze_by_system, analyze_dependencies,
    analyze_system,
};
pub use build::{BuildReport, BuiltGraph, ProjectInput, build, build_project, merge};
pub use cache::{GraphCache, NoopGraphCache, SharedGraphCache};
pub use cancel::CancelFlag;
pub use config::EngineConfig;
pub use engine::{EdgeAttributes, Engine};
pub use extract::{
    DiagramArrow, DiagramPool, DiagramSource, Extraction, FileExtraction, extract_file,
    extract_structured, parse_diagram,
};
pub use graph::{Graph, GraphStats};
pub use hierarchy::{AuthoredRelationship, Element, Hierarchy};
pub use ident::{IdIndex, ShortNameIndex, qualify, slugify};
pub use store::RelationshipStore;
