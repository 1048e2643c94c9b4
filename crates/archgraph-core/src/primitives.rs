//! # Engine Constants
//!
//! Fixed constants for the architecture graph engine. Tunable values
//! (pool size, coupling thresholds) live in [`crate::config::EngineConfig`];
//! the constants here are their defaults plus the format invariants.

/// Separator between segments of a qualified ID.
pub const PATH_SEPARATOR: char = '/';

/// Prefix of every derived relationship ID.
pub const RELATIONSHIP_ID_PREFIX: &str = "rel-";

/// Number of hex characters of the BLAKE3 digest kept in a relationship ID.
///
/// 16 hex chars = 64 bits, ample for a single project's relationship set.
pub const RELATIONSHIP_ID_HEX_LEN: usize = 16;

/// Default name of the per-system relationship file.
pub const DEFAULT_RELATIONSHIP_FILE: &str = "relationships.toml";

/// Default file extension of diagram sources.
pub const DEFAULT_DIAGRAM_EXTENSION: &str = "d2";

/// Default size of the diagram worker pool.
///
/// Fixed, independent of how many diagram files a project has.
pub const DEFAULT_WORKERS: usize = 4;

/// Upper bound on the worker pool size accepted by configuration.
pub const MAX_WORKERS: usize = 64;

/// Default out-degree above which a node counts as highly coupled.
pub const DEFAULT_HIGH_COUPLING_THRESHOLD: usize = 5;

/// Default in-degree above which a node counts as central.
pub const DEFAULT_CENTRAL_THRESHOLD: usize = 5;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of a single diagram source (1 MiB).
///
/// Larger texts fail as malformed for that file only.
pub const DEFAULT_MAX_DIAGRAM_BYTES: usize = 1024 * 1024;

/// Maximum size of a relationship file accepted by the store (16 MiB).
pub const MAX_RELATIONSHIP_FILE_BYTES: u64 = 16 * 1024 * 1024;

/// Maximum length of a relationship label.
pub const MAX_LABEL_LENGTH: usize = 512;
