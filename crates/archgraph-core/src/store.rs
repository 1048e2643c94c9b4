//! # Relationship Store
//!
//! The durable, user-authored relationship source: one TOML file per
//! system, at `<dir>/<system>/<file_name>`.
//!
//! ```toml
//! [[relationships]]
//! id = "rel-3f2a9c0d1b7e4a55"
//! source = "shop/api"
//! target = "shop/db"
//! label = "Reads orders"
//! technology = "SQL"
//! kind = "sync"
//! ```
//!
//! Files are loaded and rewritten wholesale. Writes go to a temp file in
//! the same directory which is then renamed over the target, so a reader
//! never sees a half-written file. Concurrent writers to the same file are
//! not coordinated: the last rename wins.
//!
//! Every mutation invalidates the project's cache entry before returning.

use crate::cache::GraphCache;
use crate::primitives::{DEFAULT_RELATIONSHIP_FILE, MAX_RELATIONSHIP_FILE_BYTES};
use crate::{
    ArchError, Provenance, QualifiedId, RawRelationship, Relationship, RelationshipId,
    RelationshipKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE FORMAT
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct RelationshipFile<T> {
    #[serde(default = "Vec::new")]
    relationships: Vec<T>,
}

/// A record as read from disk. Any `id` key is ignored and re-derived, so
/// hand-written entries can leave it out.
#[derive(Debug, Deserialize)]
struct StoredRecord {
    source: QualifiedId,
    target: QualifiedId,
    #[serde(default)]
    label: String,
    #[serde(default)]
    technology: Option<String>,
    #[serde(default)]
    kind: Option<RelationshipKind>,
    #[serde(default)]
    bidirectional: bool,
}

impl StoredRecord {
    /// Self-loops are kept here and dropped by the build with a warning, the
    /// same as dangling endpoints, so one bad hand-edited record does not
    /// make the whole file unreadable.
    fn into_relationship(self) -> Relationship {
        Relationship::from(RawRelationship {
            source: self.source,
            target: self.target,
            label: self.label.trim().to_string(),
            technology: self.technology,
            kind: self.kind,
            bidirectional: self.bidirectional,
            provenance: Provenance::Structured,
        })
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Per-system relationship files beneath one directory.
#[derive(Clone)]
pub struct RelationshipStore {
    dir: PathBuf,
    file_name: String,
    project_root: PathBuf,
    cache: Arc<dyn GraphCache>,
}

impl std::fmt::Debug for RelationshipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipStore")
            .field("dir", &self.dir)
            .field("file_name", &self.file_name)
            .field("project_root", &self.project_root)
            .finish()
    }
}

impl RelationshipStore {
    /// Create a store rooted at `dir`.
    ///
    /// `project_root` is the cache key invalidated on every mutation.
    pub fn new(
        dir: impl Into<PathBuf>,
        project_root: impl Into<PathBuf>,
        cache: Arc<dyn GraphCache>,
    ) -> Self {
        Self {
            dir: dir.into(),
            file_name: DEFAULT_RELATIONSHIP_FILE.to_string(),
            project_root: project_root.into(),
            cache,
        }
    }

    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file holding `system`'s relationships.
    ///
    /// Any element ID may be passed; only its system segment is used.
    #[must_use]
    pub fn path_for(&self, system: &QualifiedId) -> PathBuf {
        self.dir
            .join(system.system_segment())
            .join(&self.file_name)
    }

    // -------------------------------------------------------------------------
    // Read
    // -------------------------------------------------------------------------

    /// Load one system's relationships. A missing file is an empty list.
    pub fn load(&self, system: &QualifiedId) -> Result<Vec<Relationship>, ArchError> {
        let path = self.path_for(system);

        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArchError::io(format!("stat {}", path.display()), e)),
        };
        if metadata.len() > MAX_RELATIONSHIP_FILE_BYTES {
            return Err(ArchError::Deserialization {
                path,
                message: format!(
                    "file is {} bytes, limit is {}",
                    metadata.len(),
                    MAX_RELATIONSHIP_FILE_BYTES
                ),
            });
        }

        let source = std::fs::read_to_string(&path)
            .map_err(|e| ArchError::io(format!("reading {}", path.display()), e))?;
        let file: RelationshipFile<StoredRecord> =
            toml::from_str(&source).map_err(|e| ArchError::Deserialization {
                path: path.clone(),
                message: e.to_string(),
            })?;

        Ok(file
            .relationships
            .into_iter()
            .map(StoredRecord::into_relationship)
            .collect())
    }

    /// Systems that have a relationship file, in ID order.
    pub fn stored_systems(&self) -> Result<Vec<QualifiedId>, ArchError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArchError::io(format!("listing {}", self.dir.display()), e)),
        };

        let mut systems = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| ArchError::io(format!("listing {}", self.dir.display()), e))?;
            if !entry.path().join(&self.file_name).is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            match QualifiedId::normalize(name) {
                Ok(id) if id.as_str() == name => systems.push(id),
                _ => tracing::debug!(dir = name, "skipping non-slug system directory"),
            }
        }
        systems.sort();
        Ok(systems)
    }

    /// Every stored relationship, system by system.
    pub fn load_all(&self) -> Result<Vec<Relationship>, ArchError> {
        let mut all = Vec::new();
        for system in self.stored_systems()? {
            all.extend(self.load(&system)?);
        }
        Ok(all)
    }

    // -------------------------------------------------------------------------
    // Write
    // -------------------------------------------------------------------------

    /// Replace one system's relationships atomically.
    ///
    /// Records are written sorted by (source, target, label), one per ID.
    pub fn save(&self, system: &QualifiedId, relationships: &[Relationship]) -> Result<(), ArchError> {
        let path = self.path_for(system);
        let result = self.write_file(&path, relationships);
        self.cache.invalidate(&self.project_root);
        result?;

        tracing::info!(
            system = system.system_segment(),
            path = %path.display(),
            count = relationships.len(),
            "relationships saved"
        );
        Ok(())
    }

    fn write_file(&self, path: &Path, relationships: &[Relationship]) -> Result<(), ArchError> {
        let mut unique: BTreeMap<(&QualifiedId, &QualifiedId, &str), &Relationship> =
            BTreeMap::new();
        for rel in relationships {
            unique.entry(rel.key()).or_insert(rel);
        }
        let file = RelationshipFile {
            relationships: unique.into_values().collect::<Vec<_>>(),
        };
        let text = toml::to_string(&file).map_err(|e| ArchError::Serialization(e.to_string()))?;

        let parent = path
            .parent()
            .ok_or_else(|| ArchError::Serialization(format!("{} has no parent", path.display())))?;
        std::fs::create_dir_all(parent)
            .map_err(|e| ArchError::io(format!("creating {}", parent.display()), e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| ArchError::io("create temp file", e))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| ArchError::io("write temp file", e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| ArchError::io("fsync temp file", e))?;
        tmp.persist(path)
            .map_err(|e| ArchError::io(format!("rename to {}", path.display()), e.error))?;
        Ok(())
    }

    /// Add (or replace) a relationship in its source's system file.
    pub fn add(&self, relationship: Relationship) -> Result<RelationshipId, ArchError> {
        if relationship.source == relationship.target {
            return Err(ArchError::SelfLoop(relationship.source.to_string()));
        }
        let mut relationship = relationship;
        relationship.rederive_id();

        let system = relationship.source.clone();
        let mut current = self.load(&system)?;
        let id = relationship.id.clone();
        current.retain(|r| r.id != id);
        current.push(relationship);
        self.save(&system, &current)?;
        Ok(id)
    }

    /// Remove one relationship by ID from `system`'s file.
    pub fn remove(&self, system: &QualifiedId, id: &RelationshipId) -> Result<Relationship, ArchError> {
        let mut current = self.load(system)?;
        let Some(pos) = current.iter().position(|r| &r.id == id) else {
            return Err(ArchError::RelationshipNotFound {
                system: system.system_segment().to_string(),
                id: id.to_string(),
            });
        };
        let removed = current.remove(pos);
        self.save(system, &current)?;
        Ok(removed)
    }

    /// Drop every relationship in `system`'s file that references `element`
    /// or anything beneath it. Returns how many were removed.
    pub fn delete_element(&self, system: &QualifiedId, element: &QualifiedId) -> Result<usize, ArchError> {
        let mut current = self.load(system)?;
        let before = current.len();
        current.retain(|r| !r.references(element));
        let removed = before.saturating_sub(current.len());

        if removed > 0 {
            self.save(system, &current)?;
        } else {
            self.cache.invalidate(&self.project_root);
        }
        tracing::info!(
            system = system.system_segment(),
            element = %element,
            removed,
            "cascade delete"
        );
        Ok(removed)
    }

    /// Cascade-delete `element` from every system file, since relationships
    /// owned by other systems may target it.
    pub fn purge_element(&self, element: &QualifiedId) -> Result<usize, ArchError> {
        let mut removed = 0usize;
        for system in self.stored_systems()? {
            removed = removed.saturating_add(self.delete_element(&system, element)?);
        }
        self.cache.invalidate(&self.project_root);
        Ok(removed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
