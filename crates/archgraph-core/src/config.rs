//! # Engine Configuration
//!
//! Loaded from TOML; every field has a default, so an empty file (or no
//! file at all) yields the stock engine.
//!
//! ```toml
//! workers = 8
//! high_coupling_threshold = 6
//! central_threshold = 4
//! relationship_file = "relationships.toml"
//! diagram_extension = "d2"
//! max_diagram_bytes = 1048576
//! ```

use crate::analysis::CouplingThresholds;
use crate::extract::DiagramPool;
use crate::primitives::{
    DEFAULT_CENTRAL_THRESHOLD, DEFAULT_DIAGRAM_EXTENSION, DEFAULT_HIGH_COUPLING_THRESHOLD,
    DEFAULT_MAX_DIAGRAM_BYTES, DEFAULT_RELATIONSHIP_FILE, DEFAULT_WORKERS, MAX_WORKERS,
};
use crate::ArchError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for building and analyzing graphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Diagram worker-pool size
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Out-degree strictly above this is highly coupled
    #[serde(default = "default_high_coupling_threshold")]
    pub high_coupling_threshold: usize,

    /// In-degree strictly above this is central
    #[serde(default = "default_central_threshold")]
    pub central_threshold: usize,

    /// File name of each system's relationship store
    #[serde(default = "default_relationship_file")]
    pub relationship_file: String,

    /// Extension (without the dot) of diagram sources
    #[serde(default = "default_diagram_extension")]
    pub diagram_extension: String,

    /// Diagrams larger than this fail as malformed
    #[serde(default = "default_max_diagram_bytes")]
    pub max_diagram_bytes: usize,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_high_coupling_threshold() -> usize {
    DEFAULT_HIGH_COUPLING_THRESHOLD
}

fn default_central_threshold() -> usize {
    DEFAULT_CENTRAL_THRESHOLD
}

fn default_relationship_file() -> String {
    DEFAULT_RELATIONSHIP_FILE.to_string()
}

fn default_diagram_extension() -> String {
    DEFAULT_DIAGRAM_EXTENSION.to_string()
}

fn default_max_diagram_bytes() -> usize {
    DEFAULT_MAX_DIAGRAM_BYTES
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            high_coupling_threshold: default_high_coupling_threshold(),
            central_threshold: default_central_threshold(),
            relationship_file: default_relationship_file(),
            diagram_extension: default_diagram_extension(),
            max_diagram_bytes: default_max_diagram_bytes(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ArchError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ArchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ArchError> {
        match std::fs::read_to_string(path) {
            Ok(source) => {
                let config = Self::from_toml_str(&source)?;
                tracing::debug!(path = %path.display(), "engine config loaded");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ArchError::io(format!("reading {}", path.display()), e)),
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ArchError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ArchError::Config(format!(
                "workers must be between 1 and {MAX_WORKERS}, got {}",
                self.workers
            )));
        }
        if self.relationship_file.trim().is_empty()
            || self.relationship_file.contains(['/', '\\'])
        {
            return Err(ArchError::Config(format!(
                "relationship_file must be a plain file name, got '{}'",
                self.relationship_file
            )));
        }
        if self.diagram_extension.is_empty() || self.diagram_extension.starts_with('.') {
            return Err(ArchError::Config(format!(
                "diagram_extension must be non-empty and without a leading dot, got '{}'",
                self.diagram_extension
            )));
        }
        if self.max_diagram_bytes == 0 {
            return Err(ArchError::Config(
                "max_diagram_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn thresholds(&self) -> CouplingThresholds {
        CouplingThresholds {
            high_coupling: self.high_coupling_threshold,
            central: self.central_threshold,
        }
    }

    #[must_use]
    pub fn pool(&self) -> DiagramPool {
        DiagramPool::new(self.workers, self.max_diagram_bytes)
    }
}
