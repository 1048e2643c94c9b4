//! # Graph Engine
//!
//! The immutable architecture graph and its queries.
//!
//! A `Graph` is assembled once from nodes and merged edges; every index is
//! computed at that point and never touched again. All maps are `BTreeMap`
//! so iteration (and therefore query output) is deterministic.
//!
//! Bidirectional edges are indexed from both ends: for `a <-> b`, each of
//! `a` and `b` is a dependency and a dependent of the other.

use crate::ident::IdIndex;
use crate::{ArchError, ElementKind, Node, Provenance, QualifiedId, Relationship};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// GRAPH
// =============================================================================

/// The architecture graph.
///
/// Read-only after construction. Build a new one instead of editing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    /// Node storage: qualified ID -> node
    nodes: BTreeMap<QualifiedId, Node>,

    /// Edges sorted by (source, target, label)
    edges: Vec<Relationship>,

    /// node -> indices into `edges` it can traverse outward
    outgoing: BTreeMap<QualifiedId, Vec<usize>>,

    /// node -> indices into `edges` that reach it
    incoming: BTreeMap<QualifiedId, Vec<usize>>,

    /// parent -> direct children
    children: BTreeMap<QualifiedId, Vec<QualifiedId>>,

    /// Known IDs and unambiguous short names
    index: IdIndex,
}

/// Node and edge counts by kind and provenance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub systems: usize,
    pub containers: usize,
    pub components: usize,
    pub edges: usize,
    pub structured_edges: usize,
    pub diagram_edges: usize,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a graph and compute all indices in one pass.
    ///
    /// Edges with an endpoint outside `nodes` must already be filtered out;
    /// any that remain are ignored.
    pub(crate) fn assemble(nodes: Vec<Node>, mut edges: Vec<Relationship>) -> Self {
        let nodes: BTreeMap<QualifiedId, Node> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        edges.retain(|e| nodes.contains_key(&e.source) && nodes.contains_key(&e.target));
        edges.sort_by(|a, b| a.key().cmp(&b.key()));

        let mut outgoing: BTreeMap<QualifiedId, Vec<usize>> = BTreeMap::new();
        let mut incoming: BTreeMap<QualifiedId, Vec<usize>> = BTreeMap::new();
        for (i, edge) in edges.iter().enumerate() {
            outgoing.entry(edge.source.clone()).or_default().push(i);
            incoming.entry(edge.target.clone()).or_default().push(i);
            if edge.bidirectional {
                outgoing.entry(edge.target.clone()).or_default().push(i);
                incoming.entry(edge.source.clone()).or_default().push(i);
            }
        }

        let mut children: BTreeMap<QualifiedId, Vec<QualifiedId>> = BTreeMap::new();
        for node in nodes.values() {
            if let Some(parent) = &node.parent
                && nodes.contains_key(parent)
            {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(node.id.clone());
            }
        }

        let index = IdIndex::new(nodes.keys().cloned());

        Self {
            nodes,
            edges,
            outgoing,
            incoming,
            children,
            index,
        }
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Exact lookup by qualified ID.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Exact lookup that fails with a corrected-identifier suggestion.
    pub fn require(&self, id: &str) -> Result<&Node, ArchError> {
        self.nodes.get(id).ok_or_else(|| self.index.not_found(id))
    }

    /// Lenient lookup: qualified path, display name, or unambiguous short name.
    #[must_use]
    pub fn resolve(&self, query: &str) -> Option<&Node> {
        self.node(query)
            .or_else(|| self.index.resolve(query).and_then(|id| self.nodes.get(&id)))
    }

    /// The ID index (known IDs and short-name table).
    #[must_use]
    pub fn id_index(&self) -> &IdIndex {
        &self.index
    }

    /// All nodes in ID order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All edges in (source, target, label) order.
    #[must_use]
    pub fn edges(&self) -> &[Relationship] {
        &self.edges
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // -------------------------------------------------------------------------
    // Adjacency
    // -------------------------------------------------------------------------

    /// The end of `edge` that is not `from`.
    fn other_end<'a>(edge: &'a Relationship, from: &str) -> &'a QualifiedId {
        if edge.source.as_str() == from {
            &edge.target
        } else {
            &edge.source
        }
    }

    fn edge_refs<'a>(
        &'a self,
        map: &'a BTreeMap<QualifiedId, Vec<usize>>,
        id: &str,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        map.get(id)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.edges.get(i))
    }

    /// Edges leaving `id`. O(out-degree).
    pub fn outgoing_edges(&self, id: &str) -> Result<Vec<&Relationship>, ArchError> {
        self.require(id)?;
        Ok(self.edge_refs(&self.outgoing, id).collect())
    }

    /// Edges arriving at `id`. O(in-degree).
    pub fn incoming_edges(&self, id: &str) -> Result<Vec<&Relationship>, ArchError> {
        self.require(id)?;
        Ok(self.edge_refs(&self.incoming, id).collect())
    }

    /// Edges that lead from `from` to `to`, in label order.
    #[must_use]
    pub fn edges_between(&self, from: &str, to: &str) -> Vec<&Relationship> {
        self.edge_refs(&self.outgoing, from)
            .filter(|e| Self::other_end(e, from).as_str() == to)
            .collect()
    }

    #[must_use]
    pub fn out_degree(&self, id: &str) -> usize {
        self.outgoing.get(id).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn in_degree(&self, id: &str) -> usize {
        self.incoming.get(id).map_or(0, Vec::len)
    }

    fn neighbours<'a>(
        &'a self,
        map: &'a BTreeMap<QualifiedId, Vec<usize>>,
        id: &'a str,
    ) -> impl Iterator<Item = &'a QualifiedId> + 'a {
        self.edge_refs(map, id).map(move |e| Self::other_end(e, id))
    }

    fn unique_nodes<'a>(&'a self, ids: impl Iterator<Item = &'a QualifiedId>) -> Vec<&'a Node> {
        let mut seen = BTreeSet::new();
        ids.filter(|id| seen.insert(*id))
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Elements `id` depends on (outgoing edge targets). O(out-degree).
    pub fn dependencies(&self, id: &str) -> Result<Vec<&Node>, ArchError> {
        let id = self.require(id)?.id.as_str();
        Ok(self.unique_nodes(self.neighbours(&self.outgoing, id)))
    }

    /// Elements that depend on `id` (incoming edge sources). O(in-degree).
    pub fn dependents(&self, id: &str) -> Result<Vec<&Node>, ArchError> {
        let id = self.require(id)?.id.as_str();
        Ok(self.unique_nodes(self.neighbours(&self.incoming, id)))
    }

    /// Direct children in the hierarchy. O(children).
    pub fn children(&self, id: &str) -> Result<Vec<&Node>, ArchError> {
        self.require(id)?;
        Ok(self
            .children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|c| self.nodes.get(c))
            .collect())
    }

    /// Shortest path by edge count from `source` to `target`.
    ///
    /// Returns `Ok(None)` when no path exists, which is distinct from the
    /// single-node path returned when `source == target`. Terminates on
    /// cyclic graphs.
    pub fn path(&self, source: &str, target: &str) -> Result<Option<Vec<&Node>>, ArchError> {
        let start = &self.require(source)?.id;
        let end = &self.require(target)?.id;

        if start == end {
            return Ok(self.nodes.get(start).map(|n| vec![n]));
        }

        let mut visited: BTreeSet<&QualifiedId> = BTreeSet::new();
        let mut prev: BTreeMap<&QualifiedId, &QualifiedId> = BTreeMap::new();
        let mut queue = VecDeque::new();

        visited.insert(start);
        queue.push_back(start);

        'search: while let Some(current) = queue.pop_front() {
            for next in self.neighbours(&self.outgoing, current.as_str()) {
                if !visited.insert(next) {
                    continue;
                }
                prev.insert(next, current);
                if next == end {
                    break 'search;
                }
                queue.push_back(next);
            }
        }

        if !prev.contains_key(end) {
            return Ok(None);
        }

        let mut path = vec![end];
        let mut current = end;
        while let Some(&p) = prev.get(current) {
            path.push(p);
            current = p;
        }
        path.reverse();

        Ok(Some(
            path.into_iter()
                .filter_map(|id| self.nodes.get(id))
                .collect(),
        ))
    }

    /// The subgraph beneath one element (normally a system).
    ///
    /// Keeps `root` and its descendants plus the edges with both endpoints
    /// inside; every index is recomputed for the subset.
    pub fn system_graph(&self, root: &str) -> Result<Graph, ArchError> {
        let root = &self.require(root)?.id;
        let nodes: Vec<Node> = self
            .nodes
            .values()
            .filter(|n| n.id.is_within(root))
            .cloned()
            .collect();
        let edges: Vec<Relationship> = self
            .edges
            .iter()
            .filter(|e| e.source.is_within(root) && e.target.is_within(root))
            .cloned()
            .collect();
        Ok(Graph::assemble(nodes, edges))
    }

    /// Counts by element kind and edge provenance.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            edges: self.edges.len(),
            ..GraphStats::default()
        };
        for node in self.nodes.values() {
            match node.kind {
                ElementKind::System => stats.systems = stats.systems.saturating_add(1),
                ElementKind::Container => stats.containers = stats.containers.saturating_add(1),
                ElementKind::Component => stats.components = stats.components.saturating_add(1),
            }
        }
        for edge in &self.edges {
            match edge.provenance {
                Provenance::Structured => {
                    stats.structured_edges = stats.structured_edges.saturating_add(1);
                }
                Provenance::Diagram => {
                    stats.diagram_edges = stats.diagram_edges.saturating_add(1);
                }
            }
        }
        stats
    }

    /// BLAKE3 digest over the canonical form of nodes, edges and every index.
    ///
    /// Two graphs built from identical inputs have identical checksums.
    #[must_use]
    pub fn checksum(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        let mut line = String::new();

        for node in self.nodes.values() {
            line.clear();
            line.push_str(&format!(
                "N\t{}\t{}\t{}\t{}\t{}\n",
                node.id,
                node.name,
                node.kind,
                node.level,
                node.parent.as_ref().map_or("", QualifiedId::as_str)
            ));
            hasher.update(line.as_bytes());
        }
        for edge in &self.edges {
            line.clear();
            line.push_str(&format!(
                "E\t{}\t{}\t{}\t{}\t{}\t{:?}\t{}\t{:?}\n",
                edge.id,
                edge.source,
                edge.target,
                edge.label,
                edge.technology.as_deref().unwrap_or(""),
                edge.kind,
                edge.bidirectional,
                edge.provenance
            ));
            hasher.update(line.as_bytes());
        }
        for (tag, map) in [("O", &self.outgoing), ("I", &self.incoming)] {
            for (id, indices) in map {
                line.clear();
                line.push_str(&format!("{tag}\t{id}\t{indices:?}\n"));
                hasher.update(line.as_bytes());
            }
        }
        for (parent, kids) in &self.children {
            line.clear();
            line.push_str(&format!("C\t{parent}\t{kids:?}\n"));
            hasher.update(line.as_bytes());
        }
        for (name, id) in self.index.short_names().unambiguous() {
            line.clear();
            line.push_str(&format!("S\t{name}\t{id}\n"));
            hasher.update(line.as_bytes());
        }

        hasher.finalize().to_hex().to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> QualifiedId {
        QualifiedId::normalize(s).expect("valid id")
    }

    fn node(path: &str, kind: ElementKind) -> Node {
        let qid = id(path);
        let parent = path
            .rsplit_once('/')
            .map(|(p, _)| id(p));
        Node {
            name: qid.last_segment().to_string(),
            level: kind.level(),
            id: qid,
            kind,
            parent,
        }
    }

    fn edge(from: &str, to: &str, label: &str) -> Relationship {
        Relationship::new(id(from), id(to), label).expect("edge")
    }

    /// shop{api{handler}, db, web} + billing; web -> api -> db, api -> billing
    fn sample() -> Graph {
        Graph::assemble(
            vec![
                node("shop", ElementKind::System),
                node("shop/api", ElementKind::Container),
                node("shop/api/handler", ElementKind::Component),
                node("shop/db", ElementKind::Container),
                node("shop/web", ElementKind::Container),
                node("billing", ElementKind::System),
            ],
            vec![
                edge("shop/web", "shop/api", "calls"),
                edge("shop/api", "shop/db", "reads"),
                edge("shop/api", "shop/db", "writes"),
                edge("shop/api", "billing", "charges"),
            ],
        )
    }

    fn ids(nodes: &[&Node]) -> Vec<String> {
        nodes.iter().map(|n| n.id.to_string()).collect()
    }

    #[test]
    fn dependencies_are_unique_targets() {
        let g = sample();
        let deps = g.dependencies("shop/api").expect("deps");
        assert_eq!(ids(&deps), vec!["billing", "shop/db"]);
    }

    #[test]
    fn dependents_are_sources() {
        let g = sample();
        assert_eq!(ids(&g.dependents("shop/db").expect("deps")), vec!["shop/api"]);
        assert!(g.dependents("shop/web").expect("deps").is_empty());
    }

    #[test]
    fn query_results_outlive_the_query_string() {
        let g = sample();
        let (deps, dependents) = {
            let query = String::from("shop/api");
            (
                g.dependencies(&query).expect("deps"),
                g.dependents(&query).expect("dependents"),
            )
        };
        assert_eq!(ids(&deps), vec!["billing", "shop/db"]);
        assert_eq!(ids(&dependents), vec!["shop/web"]);
    }

    #[test]
    fn children_follow_hierarchy() {
        let g = sample();
        assert_eq!(
            ids(&g.children("shop").expect("children")),
            vec!["shop/api", "shop/db", "shop/web"]
        );
        assert!(g.children("shop/api/handler").expect("children").is_empty());
    }

    #[test]
    fn unknown_id_suggests_correction() {
        let g = sample();
        let err = g.dependencies("Shop/API").expect_err("not found");
        assert!(matches!(
            err,
            ArchError::ElementNotFound { suggestion: Some(ref s), .. } if s == "shop/api"
        ));
    }

    #[test]
    fn resolve_accepts_display_and_short_names() {
        let g = sample();
        assert_eq!(g.resolve("Handler").map(|n| n.id.as_str()), Some("shop/api/handler"));
        assert_eq!(g.resolve("shop/db").map(|n| n.id.as_str()), Some("shop/db"));
        assert!(g.resolve("nowhere").is_none());
    }

    #[test]
    fn path_is_shortest_by_edges() {
        let g = sample();
        let path = g.path("shop/web", "shop/db").expect("path").expect("exists");
        assert_eq!(ids(&path), vec!["shop/web", "shop/api", "shop/db"]);
    }

    #[test]
    fn path_not_found_differs_from_trivial_path() {
        let g = sample();
        assert!(g.path("shop/db", "shop/web").expect("path").is_none());
        let same = g.path("shop/db", "shop/db").expect("path").expect("trivial");
        assert_eq!(ids(&same), vec!["shop/db"]);
    }

    #[test]
    fn path_terminates_on_cycles() {
        let g = Graph::assemble(
            vec![
                node("a", ElementKind::System),
                node("b", ElementKind::System),
                node("c", ElementKind::System),
                node("d", ElementKind::System),
            ],
            vec![edge("a", "b", ""), edge("b", "c", ""), edge("c", "a", "")],
        );
        assert!(g.path("a", "d").expect("path").is_none());
        let path = g.path("b", "a").expect("path").expect("exists");
        assert_eq!(ids(&path), vec!["b", "c", "a"]);
    }

    #[test]
    fn bidirectional_edges_index_both_ends() {
        let g = Graph::assemble(
            vec![node("a", ElementKind::System), node("b", ElementKind::System)],
            vec![edge("a", "b", "syncs").bidirectional()],
        );
        assert_eq!(ids(&g.dependencies("b").expect("deps")), vec!["a"]);
        assert_eq!(ids(&g.dependents("a").expect("deps")), vec!["b"]);
        assert_eq!(g.edges_between("b", "a").len(), 1);
        assert!(g.path("b", "a").expect("path").is_some());
    }

    #[test]
    fn edges_between_lists_all_labels() {
        let g = sample();
        let labels: Vec<_> = g
            .edges_between("shop/api", "shop/db")
            .iter()
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(labels, vec!["reads", "writes"]);
    }

    #[test]
    fn system_graph_recomputes_indices() {
        let g = sample();
        let shop = g.system_graph("shop").expect("subgraph");
        assert_eq!(shop.node_count(), 5);
        assert_eq!(shop.edge_count(), 3);
        assert!(!shop.contains("billing"));
        assert_eq!(ids(&shop.dependencies("shop/api").expect("deps")), vec!["shop/db"]);
        assert_eq!(shop.out_degree("shop/api"), 2);
    }

    #[test]
    fn assemble_drops_dangling_edges() {
        let g = Graph::assemble(
            vec![node("a", ElementKind::System)],
            vec![edge("a", "ghost", "haunts")],
        );
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.out_degree("a"), 0);
    }

    #[test]
    fn stats_count_kinds() {
        let stats = sample().stats();
        assert_eq!(stats.systems, 2);
        assert_eq!(stats.containers, 3);
        assert_eq!(stats.components, 1);
        assert_eq!(stats.edges, 4);
        assert_eq!(stats.structured_edges, 4);
    }

    #[test]
    fn checksum_is_stable_and_sensitive() {
        assert_eq!(sample().checksum(), sample().checksum());
        let other = Graph::assemble(vec![node("a", ElementKind::System)], vec![]);
        assert_ne!(sample().checksum(), other.checksum());
    }
}
