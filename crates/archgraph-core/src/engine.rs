//! # Engine
//!
//! The facade callers hold for a session: configuration, the graph cache,
//! and cache-aware builds. Relationship mutations go through here so that
//! endpoints are checked against the current graph before anything is
//! written.

use crate::analysis::{DependencyReport, analyze_dependencies};
use crate::build::{BuiltGraph, ProjectInput, build_project};
use crate::cache::{GraphCache, SharedGraphCache};
use crate::cancel::CancelFlag;
use crate::config::EngineConfig;
use crate::graph::Graph;
use crate::store::RelationshipStore;
use crate::{ArchError, Relationship, RelationshipId, RelationshipKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Optional attributes for a new relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeAttributes {
    pub technology: Option<String>,
    pub kind: Option<RelationshipKind>,
    pub bidirectional: bool,
}

/// Session facade over configuration and the graph cache.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    cache: Arc<dyn GraphCache>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish()
    }
}

impl Engine {
    /// Create an engine with a fresh in-memory cache.
    pub fn new(config: EngineConfig) -> Result<Self, ArchError> {
        Self::with_cache(config, Arc::new(SharedGraphCache::new()))
    }

    /// Create an engine over a caller-supplied cache.
    pub fn with_cache(config: EngineConfig, cache: Arc<dyn GraphCache>) -> Result<Self, ArchError> {
        config.validate()?;
        Ok(Self { config, cache })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> Arc<dyn GraphCache> {
        Arc::clone(&self.cache)
    }

    // -------------------------------------------------------------------------
    // Builds
    // -------------------------------------------------------------------------

    /// The graph for `root`, from cache or freshly built.
    ///
    /// `load` runs only on a miss. Returns the graph and whether it was a
    /// cache hit.
    pub fn graph<F>(&self, root: &Path, load: F) -> Result<(Arc<BuiltGraph>, bool), ArchError>
    where
        F: FnOnce() -> Result<ProjectInput, ArchError>,
    {
        self.graph_with_cancel(root, load, &CancelFlag::new())
    }

    /// As [`Engine::graph`], honouring `cancel` during diagram extraction.
    pub fn graph_with_cancel<F>(
        &self,
        root: &Path,
        load: F,
        cancel: &CancelFlag,
    ) -> Result<(Arc<BuiltGraph>, bool), ArchError>
    where
        F: FnOnce() -> Result<ProjectInput, ArchError>,
    {
        if let Some(hit) = self.cache.get(root) {
            tracing::debug!(root = %root.display(), "graph cache hit");
            return Ok((hit, true));
        }

        // Read before loading: an invalidation after this point wins.
        let epoch = self.cache.epoch(root);
        let input = load()?;
        let built = Arc::new(build_project(&input, &self.config, cancel)?);
        let cached = self.cache.set_if_current(root, epoch, Arc::clone(&built));
        tracing::info!(
            root = %root.display(),
            nodes = built.graph.node_count(),
            edges = built.graph.edge_count(),
            warnings = built.report.warnings.len(),
            cached,
            "graph built"
        );
        Ok((built, false))
    }

    /// Discard any cached graph for `root` and build again.
    pub fn rebuild<F>(&self, root: &Path, load: F) -> Result<Arc<BuiltGraph>, ArchError>
    where
        F: FnOnce() -> Result<ProjectInput, ArchError>,
    {
        self.cache.invalidate(root);
        self.graph(root, load).map(|(built, _)| built)
    }

    /// Drop the cached graph for `root`.
    pub fn invalidate(&self, root: &Path) {
        self.cache.invalidate(root);
    }

    /// Coupling report using the configured thresholds.
    #[must_use]
    pub fn analyze(&self, graph: &Graph) -> DependencyReport {
        analyze_dependencies(graph, self.config.thresholds())
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// A store under `dir` that invalidates `root` in this engine's cache.
    pub fn store(&self, dir: impl Into<PathBuf>, root: impl Into<PathBuf>) -> RelationshipStore {
        RelationshipStore::new(dir, root, self.cache())
            .with_file_name(self.config.relationship_file.clone())
    }

    /// Author a relationship between two existing elements.
    ///
    /// Both endpoints must be exact IDs in `graph`; a miss carries a
    /// suggestion. Stored in the source's system file.
    pub fn add_relationship(
        &self,
        store: &RelationshipStore,
        graph: &Graph,
        source: &str,
        target: &str,
        label: &str,
        attributes: EdgeAttributes,
    ) -> Result<Relationship, ArchError> {
        let source = graph.require(source)?.id.clone();
        let target = graph.require(target)?.id.clone();

        let mut relationship = Relationship::new(source, target, label.trim())?;
        relationship.technology = attributes.technology;
        relationship.kind = attributes.kind;
        relationship.bidirectional = attributes.bidirectional;

        store.add(relationship.clone())?;
        Ok(relationship)
    }

    /// Remove a stored relationship by ID from `system`'s file.
    pub fn remove_relationship(
        &self,
        store: &RelationshipStore,
        graph: &Graph,
        system: &str,
        id: &str,
    ) -> Result<Relationship, ArchError> {
        let system = graph.require(system)?.id.clone();
        store.remove(&system, &RelationshipId::new(id))
    }

    /// Cascade-delete every stored relationship touching `element` or its
    /// descendants. Returns how many were removed.
    pub fn delete_element(
        &self,
        store: &RelationshipStore,
        graph: &Graph,
        element: &str,
    ) -> Result<usize, ArchError> {
        let element = graph.require(element)?.id.clone();
        store.purge_element(&element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoopGraphCache;
    use crate::hierarchy::Hierarchy;
    use std::cell::Cell;

    fn input() -> ProjectInput {
        let mut hierarchy = Hierarchy::new();
        let shop = hierarchy.add_system("Shop").expect("system");
        hierarchy.add_container(&shop, "API").expect("api");
        hierarchy.add_container(&shop, "DB").expect("db");
        ProjectInput {
            hierarchy,
            ..ProjectInput::default()
        }
    }

    #[test]
    fn second_call_is_a_hit_and_skips_loading() {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let root = Path::new("/project");
        let (first, hit) = engine.graph(root, || Ok(input())).expect("build");
        assert!(!hit);

        let loads = Cell::new(0);
        let (second, hit) = engine
            .graph(root, || {
                loads.set(loads.get() + 1);
                Ok(input())
            })
            .expect("cached");
        assert!(hit);
        assert_eq!(loads.get(), 0);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn load_failure_is_surfaced() {
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let result = engine.graph(Path::new("/p"), || Err(ArchError::Config("nope".into())));
        assert!(matches!(result, Err(ArchError::Config(_))));
    }

    #[test]
    fn invalid_config_rejected() {
        let config = EngineConfig {
            workers: 0,
            ..EngineConfig::default()
        };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn mutation_makes_next_get_a_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let root = dir.path();
        let store = engine.store(root.join("src"), root);

        let (built, _) = engine.graph(root, || Ok(input())).expect("build");
        engine
            .add_relationship(
                &store,
                &built.graph,
                "shop/api",
                "shop/db",
                "reads",
                EdgeAttributes::default(),
            )
            .expect("add");
        assert!(engine.cache().get(root).is_none());

        let stored = store.load_all().expect("load");
        let (rebuilt, hit) = engine
            .graph(root, || {
                Ok(ProjectInput {
                    stored,
                    ..input()
                })
            })
            .expect("rebuild");
        assert!(!hit);
        assert_eq!(rebuilt.graph.edge_count(), 1);
    }

    #[test]
    fn mutation_during_load_is_not_lost() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let root = dir.path();
        let store = engine.store(root.join("src"), root);
        let id = |s: &str| crate::QualifiedId::normalize(s).expect("id");

        let (built, hit) = engine
            .graph(root, || {
                let stored = store.load_all()?;
                store.add(Relationship::new(id("shop/api"), id("shop/db"), "reads")?)?;
                Ok(ProjectInput { stored, ..input() })
            })
            .expect("build");
        assert!(!hit);
        assert_eq!(built.graph.edge_count(), 0);
        assert!(engine.cache().get(root).is_none());

        let (rebuilt, hit) = engine
            .graph(root, || {
                Ok(ProjectInput {
                    stored: store.load_all()?,
                    ..input()
                })
            })
            .expect("rebuild");
        assert!(!hit);
        assert_eq!(rebuilt.graph.edge_count(), 1);
    }

    #[test]
    fn add_rejects_unknown_endpoint_with_suggestion() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::with_cache(EngineConfig::default(), Arc::new(NoopGraphCache))
            .expect("engine");
        let store = engine.store(dir.path(), dir.path());
        let (built, _) = engine.graph(dir.path(), || Ok(input())).expect("build");

        let err = engine
            .add_relationship(&store, &built.graph, "Shop/API", "shop/db", "x", EdgeAttributes::default())
            .expect_err("unknown");
        assert!(matches!(
            err,
            ArchError::ElementNotFound { suggestion: Some(ref s), .. } if s == "shop/api"
        ));
    }

    #[test]
    fn remove_and_delete_element() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::new(EngineConfig::default()).expect("engine");
        let store = engine.store(dir.path(), dir.path());
        let (built, _) = engine.graph(dir.path(), || Ok(input())).expect("build");
        let graph = &built.graph;

        let rel = engine
            .add_relationship(&store, graph, "shop/api", "shop/db", "reads", EdgeAttributes::default())
            .expect("add");
        engine
            .remove_relationship(&store, graph, "shop", rel.id.as_str())
            .expect("remove");
        assert!(matches!(
            engine.remove_relationship(&store, graph, "shop", rel.id.as_str()),
            Err(ArchError::RelationshipNotFound { .. })
        ));

        engine
            .add_relationship(&store, graph, "shop/api", "shop/db", "writes", EdgeAttributes::default())
            .expect("add");
        assert_eq!(engine.delete_element(&store, graph, "shop/db").expect("delete"), 1);
        assert!(store.load_all().expect("load").is_empty());
    }

    #[test]
    fn analyze_uses_configured_thresholds() {
        let config = EngineConfig {
            high_coupling_threshold: 0,
            ..EngineConfig::default()
        };
        let engine = Engine::new(config).expect("engine");
        let stored = vec![
            Relationship::new(
                crate::QualifiedId::normalize("shop/api").expect("id"),
                crate::QualifiedId::normalize("shop/db").expect("id"),
                "reads",
            )
            .expect("rel"),
        ];
        let (built, _) = engine
            .graph(Path::new("/p"), || Ok(ProjectInput { stored, ..input() }))
            .expect("build");
        let report = engine.analyze(&built.graph);
        assert_eq!(report.highly_coupled_count(), 1);
        assert_eq!(report.isolated_count(), 1);
    }
}
