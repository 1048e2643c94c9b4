//! # Core Type Definitions
//!
//! This module contains the shared types of the architecture graph:
//! - Identifiers (`QualifiedId`, `RelationshipId`)
//! - Elements (`ElementKind`, `Node`)
//! - Relationships (`Relationship`, `RawRelationship`, `Provenance`, `RelationshipKind`)
//! - Error and warning types (`ArchError`, `BuildWarning`)
//!
//! ## Determinism Guarantees
//!
//! All identifier and relationship types implement `Ord` so they can live in
//! `BTreeMap`/`BTreeSet` and iterate in a stable order.

use crate::ident;
use crate::primitives::{PATH_SEPARATOR, RELATIONSHIP_ID_HEX_LEN, RELATIONSHIP_ID_PREFIX};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Globally unique hierarchical slug identifying one architecture element.
///
/// Segments are slugs joined with `/`, e.g. `shop/api/order-handler`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedId(String);

impl QualifiedId {
    /// Normalize a raw path into a qualified ID.
    ///
    /// Every `/`-separated segment is slugified. Fails if any segment is
    /// left empty (e.g. `"shop//api"` or `"!!!"`).
    pub fn normalize(raw: &str) -> Result<Self, ArchError> {
        let mut segments = Vec::new();
        for segment in raw.trim().split(PATH_SEPARATOR) {
            let slug = ident::slugify(segment);
            if slug.is_empty() {
                return Err(ArchError::InvalidIdentifier(raw.to_string()));
            }
            segments.push(slug);
        }
        Ok(Self(segments.join(&PATH_SEPARATOR.to_string())))
    }

    /// Join an already-slugified child segment onto this ID.
    pub(crate) fn child(&self, slug: &str) -> Self {
        Self(format!("{}{}{}", self.0, PATH_SEPARATOR, slug))
    }

    /// Wrap a single root segment that is already a slug.
    pub(crate) fn root(slug: String) -> Self {
        Self(slug)
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(PATH_SEPARATOR)
    }

    /// The trailing segment, used for short-name resolution.
    #[must_use]
    pub fn last_segment(&self) -> &str {
        self.0
            .rsplit_once(PATH_SEPARATOR)
            .map_or(self.0.as_str(), |(_, last)| last)
    }

    /// The first segment: the owning system.
    #[must_use]
    pub fn system_segment(&self) -> &str {
        self.0
            .split_once(PATH_SEPARATOR)
            .map_or(self.0.as_str(), |(first, _)| first)
    }

    /// Number of segments minus one (systems are depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.matches(PATH_SEPARATOR).count()
    }

    /// True if `self` equals `ancestor` or lies beneath it.
    #[must_use]
    pub fn is_within(&self, ancestor: &QualifiedId) -> bool {
        self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0)
                && self.0[ancestor.0.len()..].starts_with(PATH_SEPARATOR))
    }
}

impl fmt::Display for QualifiedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for QualifiedId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for QualifiedId {
    type Error = ArchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<QualifiedId> for String {
    fn from(id: QualifiedId) -> Self {
        id.0
    }
}

/// Deterministic relationship identifier.
///
/// A pure function of (source, target, label): re-deriving the same
/// relationship always yields the same ID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(String);

impl RelationshipId {
    /// Derive the ID for a relationship triple.
    #[must_use]
    pub fn derive(source: &QualifiedId, target: &QualifiedId, label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(source.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(target.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(label.as_bytes());
        let hex = hasher.finalize().to_hex();
        Self(format!(
            "{}{}",
            RELATIONSHIP_ID_PREFIX,
            &hex.as_str()[..RELATIONSHIP_ID_HEX_LEN]
        ))
    }

    /// Wrap a caller-supplied ID string (used for lookups by ID).
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ELEMENTS
// =============================================================================

/// The three levels of the architecture hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    System,
    Container,
    Component,
}

impl ElementKind {
    /// Hierarchy level: systems are 0, containers 1, components 2.
    #[must_use]
    pub const fn level(self) -> usize {
        match self {
            ElementKind::System => 0,
            ElementKind::Container => 1,
            ElementKind::Component => 2,
        }
    }

    /// The kind a direct child of this kind must have.
    #[must_use]
    pub const fn child_kind(self) -> Option<ElementKind> {
        match self {
            ElementKind::System => Some(ElementKind::Container),
            ElementKind::Container => Some(ElementKind::Component),
            ElementKind::Component => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::System => "system",
            ElementKind::Container => "container",
            ElementKind::Component => "component",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Node in the graph: one architecture element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// The qualified ID. Immutable once assigned.
    pub id: QualifiedId,
    /// Human-facing display name.
    pub name: String,
    pub kind: ElementKind,
    /// Depth in the hierarchy (0 for systems).
    pub level: usize,
    /// The owning parent, `None` for systems.
    pub parent: Option<QualifiedId>,
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

/// How two elements communicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    #[serde(alias = "synchronous")]
    Sync,
    #[serde(alias = "asynchronous")]
    Async,
    Event,
}

/// Where a relationship came from.
///
/// Ordering matters: `Structured < Diagram`, so the preferred source of a
/// colliding pair is the minimum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Authored metadata or the relationship store.
    #[default]
    Structured,
    /// Arrow syntax in a diagram file.
    Diagram,
}

/// A relationship tuple produced by an extractor, before merge.
///
/// Both extractors normalize into this one shape so that deduplication is
/// source-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRelationship {
    pub source: QualifiedId,
    pub target: QualifiedId,
    pub label: String,
    pub technology: Option<String>,
    pub kind: Option<RelationshipKind>,
    pub bidirectional: bool,
    pub provenance: Provenance,
}

impl RawRelationship {
    /// The (source, target, label) dedup key.
    #[must_use]
    pub fn key(&self) -> (QualifiedId, QualifiedId, String) {
        (self.source.clone(), self.target.clone(), self.label.clone())
    }
}

/// A directed, labeled edge between two elements.
///
/// This is also the persisted record shape of the relationship store.
/// The ID is re-derived on load, and provenance is never written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub source: QualifiedId,
    pub target: QualifiedId,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RelationshipKind>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bidirectional: bool,
    #[serde(skip)]
    pub provenance: Provenance,
}

impl Relationship {
    /// Create a structured relationship, deriving its ID.
    ///
    /// Rejects self-loops. The label is trimmed.
    pub fn new(
        source: QualifiedId,
        target: QualifiedId,
        label: impl Into<String>,
    ) -> Result<Self, ArchError> {
        if source == target {
            return Err(ArchError::SelfLoop(source.to_string()));
        }
        let label = label.into().trim().to_string();
        Ok(Self {
            id: RelationshipId::derive(&source, &target, &label),
            source,
            target,
            label,
            technology: None,
            kind: None,
            bidirectional: false,
            provenance: Provenance::Structured,
        })
    }

    #[must_use]
    pub fn with_technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: RelationshipKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    /// True if either endpoint is `element` or lies beneath it.
    #[must_use]
    pub fn references(&self, element: &QualifiedId) -> bool {
        self.source.is_within(element) || self.target.is_within(element)
    }

    /// The (source, target, label) dedup key.
    #[must_use]
    pub fn key(&self) -> (&QualifiedId, &QualifiedId, &str) {
        (&self.source, &self.target, &self.label)
    }

    /// Recompute the ID from the current triple.
    pub(crate) fn rederive_id(&mut self) {
        self.id = RelationshipId::derive(&self.source, &self.target, &self.label);
    }
}

impl From<&Relationship> for RawRelationship {
    fn from(rel: &Relationship) -> Self {
        Self {
            source: rel.source.clone(),
            target: rel.target.clone(),
            label: rel.label.clone(),
            technology: rel.technology.clone(),
            kind: rel.kind,
            bidirectional: rel.bidirectional,
            provenance: rel.provenance,
        }
    }
}

impl From<RawRelationship> for Relationship {
    fn from(raw: RawRelationship) -> Self {
        Self {
            id: RelationshipId::derive(&raw.source, &raw.target, &raw.label),
            source: raw.source,
            target: raw.target,
            label: raw.label,
            technology: raw.technology,
            kind: raw.kind,
            bidirectional: raw.bidirectional,
            provenance: raw.provenance,
        }
    }
}

// =============================================================================
// WARNINGS
// =============================================================================

/// A non-fatal condition met while building a graph.
///
/// The build carries on; the offending edge or file is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildWarning {
    /// An edge endpoint did not resolve to a known element.
    #[error("unresolved endpoint '{endpoint}' in {origin}")]
    UnresolvedEndpoint { endpoint: String, origin: String },

    /// An edge pointed from an element to itself.
    #[error("self-referencing relationship on '{element}' in {origin}")]
    SelfLoopDropped { element: String, origin: String },

    /// A whole diagram file could not be parsed.
    #[error("diagram {file} skipped: {message}")]
    DiagramFailed { file: PathBuf, message: String },
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the architecture graph engine.
///
/// - No silent failures
/// - Use `Result<T, ArchError>` for fallible operations
/// - Store failures are never swallowed
#[derive(Debug, Error)]
pub enum ArchError {
    /// A lookup named an element that does not exist.
    #[error("element not found: '{query}'{}", suggestion_hint(.suggestion))]
    ElementNotFound {
        query: String,
        suggestion: Option<String>,
    },

    /// A relationship removal named an ID not present in the system file.
    #[error("relationship '{id}' not found in system '{system}'")]
    RelationshipNotFound { system: String, id: String },

    /// An element was registered twice under the same qualified ID.
    #[error("duplicate element: '{0}'")]
    DuplicateElement(String),

    /// A parent/child pairing violates system > container > component.
    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// The input normalizes to an empty slug.
    #[error("invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// A relationship whose source equals its target.
    #[error("relationship source and target are the same element: '{0}'")]
    SelfLoop(String),

    /// A diagram file could not be parsed.
    #[error("{file}:{line}: {message}")]
    DiagramParse {
        file: String,
        line: usize,
        message: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serializing data for storage failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored file exists but could not be read back.
    #[error("corrupt file {path}: {message}")]
    Deserialization { path: PathBuf, message: String },

    /// The caller cancelled an in-flight build.
    #[error("build cancelled")]
    Cancelled,

    /// Engine configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ArchError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(id) => format!(" (did you mean '{}'?)", id),
        None => " (list all elements to see valid IDs)".to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
