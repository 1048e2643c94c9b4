//! # Relationship Extractors
//!
//! Two independent producers of [`RawRelationship`] tuples:
//! - `structured`: relationships authored on elements plus the relationship store
//! - `diagram`: arrow syntax in diagram sources, fanned out over a worker pool
//!
//! Both return an [`Extraction`]; problems that only affect one edge or one
//! file become warnings, never errors.

mod diagram;
mod pool;
mod structured;

pub use diagram::{DiagramArrow, DiagramSource, FileExtraction, extract_file, parse_diagram};
pub use pool::DiagramPool;
pub use structured::extract_structured;

use crate::{BuildWarning, RawRelationship};

/// Relationships produced by one extractor, with the warnings it raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub relationships: Vec<RawRelationship>,
    pub warnings: Vec<BuildWarning>,
    /// Diagram files that failed to parse (always 0 for structured).
    pub failed_files: usize,
}

impl Extraction {
    /// Fold per-file results, in the order given, into one extraction.
    #[must_use]
    pub fn from_files(files: Vec<FileExtraction>) -> Self {
        let mut extraction = Self::default();
        for file in files {
            if let Some(error) = file.error {
                extraction.failed_files = extraction.failed_files.saturating_add(1);
                extraction.warnings.push(BuildWarning::DiagramFailed {
                    file: file.path,
                    message: error.to_string(),
                });
                continue;
            }
            extraction.relationships.extend(file.relationships);
            extraction.warnings.extend(file.warnings);
        }
        extraction
    }
}
