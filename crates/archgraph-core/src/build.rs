//! # Graph Merge & Build
//!
//! Unions the two relationship streams into one immutable [`Graph`].
//!
//! 1. One node per hierarchy element.
//! 2. Union of structured and diagram tuples.
//! 3. Dedup by (source, target, label), keeping the structured edge.
//! 4. Drop edges whose endpoints are unknown (warning, not error).
//! 5. Assemble and index in one pass.

use crate::cancel::CancelFlag;
use crate::config::EngineConfig;
use crate::extract::{DiagramSource, Extraction, extract_structured};
use crate::graph::Graph;
use crate::hierarchy::Hierarchy;
use crate::{ArchError, BuildWarning, Node, QualifiedId, RawRelationship, Relationship};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::PathBuf;

// =============================================================================
// BUILD REPORT
// =============================================================================

/// What happened during one build, alongside the graph it produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Every non-fatal problem, structured warnings first.
    #[serde(serialize_with = "serialize_warnings")]
    pub warnings: Vec<BuildWarning>,
    /// Tuples offered by the structured extractor.
    pub structured_edges: usize,
    /// Tuples offered by the diagram extractor.
    pub diagram_edges: usize,
    /// Tuples collapsed into an existing (source, target, label) key.
    pub duplicates: usize,
    /// Diagram files handed to the extractor.
    pub diagram_files: usize,
    /// Diagram files skipped as malformed.
    pub failed_files: usize,
}

fn serialize_warnings<S: serde::Serializer>(
    warnings: &[BuildWarning],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(warnings.iter().map(ToString::to_string))
}

impl BuildReport {
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A graph paired with the report of the build that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltGraph {
    pub graph: Graph,
    pub report: BuildReport,
}

// =============================================================================
// MERGE
// =============================================================================

/// Union two tuple streams and collapse duplicates.
///
/// On a key collision the tuple with the lower [`crate::Provenance`] wins, so
/// a structured edge always beats a diagram edge regardless of input order.
/// Between equal provenances the first one seen wins. Returns the merged
/// tuples in key order and the number collapsed.
#[must_use]
pub fn merge(
    structured: Vec<RawRelationship>,
    diagram: Vec<RawRelationship>,
) -> (Vec<RawRelationship>, usize) {
    let mut merged: BTreeMap<(QualifiedId, QualifiedId, String), RawRelationship> =
        BTreeMap::new();
    let mut duplicates = 0usize;

    for raw in structured.into_iter().chain(diagram) {
        match merged.entry(raw.key()) {
            Entry::Vacant(slot) => {
                slot.insert(raw);
            }
            Entry::Occupied(mut slot) => {
                duplicates = duplicates.saturating_add(1);
                if raw.provenance < slot.get().provenance {
                    slot.insert(raw);
                }
            }
        }
    }

    (merged.into_values().collect(), duplicates)
}

// =============================================================================
// BUILD
// =============================================================================

/// Build the graph from a hierarchy and the two extracted streams.
#[must_use]
pub fn build(hierarchy: &Hierarchy, structured: Extraction, diagram: Extraction) -> BuiltGraph {
    let nodes: Vec<Node> = hierarchy
        .elements()
        .iter()
        .map(|element| Node {
            id: element.id.clone(),
            name: element.name.clone(),
            kind: element.kind,
            level: element.kind.level(),
            parent: element.parent.clone(),
        })
        .collect();

    let mut report = BuildReport {
        structured_edges: structured.relationships.len(),
        diagram_edges: diagram.relationships.len(),
        failed_files: diagram.failed_files,
        ..BuildReport::default()
    };
    report.warnings.extend(structured.warnings);
    report.warnings.extend(diagram.warnings);

    let (merged, duplicates) = merge(structured.relationships, diagram.relationships);
    report.duplicates = duplicates;

    let mut edges: Vec<Relationship> = Vec::with_capacity(merged.len());
    for raw in merged {
        let mut dangling = false;
        for endpoint in [&raw.source, &raw.target] {
            if hierarchy.get(endpoint).is_none() {
                dangling = true;
                report.warnings.push(BuildWarning::UnresolvedEndpoint {
                    endpoint: endpoint.to_string(),
                    origin: "merged edge set".to_string(),
                });
            }
        }
        if dangling {
            continue;
        }
        if raw.source == raw.target {
            report.warnings.push(BuildWarning::SelfLoopDropped {
                element: raw.source.to_string(),
                origin: "merged edge set".to_string(),
            });
            continue;
        }
        edges.push(Relationship::from(raw));
    }

    let graph = Graph::assemble(nodes, edges);

    for warning in &report.warnings {
        tracing::warn!(%warning, "build warning");
    }
    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        duplicates = report.duplicates,
        warnings = report.warnings.len(),
        "graph built"
    );

    BuiltGraph { graph, report }
}

// =============================================================================
// PROJECT INPUT
// =============================================================================

/// Everything a collaborator has read for one project, ready to build.
#[derive(Debug, Clone, Default)]
pub struct ProjectInput {
    /// The project root, used as the cache key.
    pub root: PathBuf,
    pub hierarchy: Hierarchy,
    /// Full contents of every per-system relationship file.
    pub stored: Vec<Relationship>,
    /// Diagram texts, each tagged with the element it is scoped to.
    pub diagrams: Vec<DiagramSource>,
}

/// Run both extractors and build.
///
/// Diagram extraction fans out over the configured pool; the call blocks
/// until every dispatched file is done. Fails only on cancellation.
pub fn build_project(
    input: &ProjectInput,
    config: &EngineConfig,
    cancel: &CancelFlag,
) -> Result<BuiltGraph, ArchError> {
    let index = input.hierarchy.id_index();
    tracing::debug!(
        root = %input.root.display(),
        elements = index.len(),
        stored = input.stored.len(),
        diagrams = input.diagrams.len(),
        "building graph"
    );

    let structured = extract_structured(&input.hierarchy, &index, &input.stored);
    let files = config.pool().extract(&input.diagrams, &index, cancel)?;
    let diagram = Extraction::from_files(files);

    let mut built = build(&input.hierarchy, structured, diagram);
    built.report.diagram_files = input.diagrams.len();
    Ok(built)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Provenance;

    fn id(s: &str) -> QualifiedId {
        QualifiedId::normalize(s).expect("valid id")
    }

    fn raw(from: &str, to: &str, label: &str, provenance: Provenance) -> RawRelationship {
        RawRelationship {
            source: id(from),
            target: id(to),
            label: label.to_string(),
            technology: None,
            kind: None,
            bidirectional: false,
            provenance,
        }
    }

    fn abc() -> Hierarchy {
        let mut h = Hierarchy::new();
        for name in ["A", "B", "C"] {
            h.add_system(name).expect("system");
        }
        h
    }

    fn extraction(relationships: Vec<RawRelationship>) -> Extraction {
        Extraction {
            relationships,
            ..Extraction::default()
        }
    }

    #[test]
    fn merge_prefers_structured_on_collision() {
        let mut diagram_edge = raw("a", "b", "calls", Provenance::Diagram);
        diagram_edge.technology = Some("gRPC".to_string());
        let (merged, duplicates) = merge(
            vec![raw("a", "b", "calls", Provenance::Structured)],
            vec![diagram_edge],
        );
        assert_eq!(duplicates, 1);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].provenance, Provenance::Structured);
        assert_eq!(merged[0].technology, None);
    }

    #[test]
    fn merge_keeps_distinct_labels() {
        let (merged, duplicates) = merge(
            vec![raw("a", "b", "reads", Provenance::Structured)],
            vec![raw("a", "b", "writes", Provenance::Diagram)],
        );
        assert_eq!(duplicates, 0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_ignores_input_order_for_preference() {
        // A structured tuple arriving in the diagram stream still wins.
        let (merged, _) = merge(
            vec![],
            vec![
                raw("a", "b", "x", Provenance::Diagram),
                raw("a", "b", "x", Provenance::Structured),
            ],
        );
        assert_eq!(merged[0].provenance, Provenance::Structured);
    }

    #[test]
    fn build_mixes_sources() {
        let built = build(
            &abc(),
            extraction(vec![raw("a", "b", "", Provenance::Structured)]),
            extraction(vec![raw("b", "c", "", Provenance::Diagram)]),
        );
        let path = built
            .graph
            .path("a", "c")
            .expect("path")
            .expect("exists");
        let ids: Vec<_> = path.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(built.graph.stats().diagram_edges, 1);
    }

    #[test]
    fn build_drops_unknown_endpoint_with_warning() {
        let built = build(
            &abc(),
            extraction(vec![
                raw("a", "ghost", "", Provenance::Structured),
                raw("a", "b", "", Provenance::Structured),
            ]),
            Extraction::default(),
        );
        assert_eq!(built.graph.edge_count(), 1);
        assert!(matches!(
            built.report.warnings.as_slice(),
            [BuildWarning::UnresolvedEndpoint { endpoint, .. }] if endpoint == "ghost"
        ));
    }

    #[test]
    fn build_carries_extractor_warnings_and_counts() {
        let mut diagram = extraction(vec![raw("a", "b", "", Provenance::Diagram)]);
        diagram.failed_files = 1;
        diagram.warnings.push(BuildWarning::DiagramFailed {
            file: PathBuf::from("bad.d2"),
            message: "broken".to_string(),
        });
        let built = build(
            &abc(),
            extraction(vec![raw("a", "b", "", Provenance::Structured)]),
            diagram,
        );
        assert_eq!(built.graph.edge_count(), 1);
        assert_eq!(built.report.duplicates, 1);
        assert_eq!(built.report.failed_files, 1);
        assert!(built.report.has_warnings());
    }

    #[test]
    fn build_project_runs_both_extractors() {
        let input = ProjectInput {
            root: PathBuf::from("project"),
            hierarchy: abc(),
            stored: vec![Relationship::new(id("a"), id("b"), "stored").expect("rel")],
            diagrams: vec![DiagramSource {
                path: PathBuf::from("src/b/flow.d2"),
                scope: id("b"),
                text: "b -> c: drawn\nb -> a: stored".to_string(),
            }],
        };
        let built =
            build_project(&input, &EngineConfig::default(), &CancelFlag::new()).expect("build");
        assert_eq!(built.graph.edge_count(), 3);
        assert_eq!(built.report.diagram_files, 1);
        assert_eq!(built.report.structured_edges, 1);
        assert_eq!(built.report.diagram_edges, 2);
    }

    #[test]
    fn build_project_honours_cancellation() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let input = ProjectInput {
            hierarchy: abc(),
            diagrams: vec![DiagramSource {
                path: PathBuf::from("x.d2"),
                scope: id("a"),
                text: "a -> b".to_string(),
            }],
            ..ProjectInput::default()
        };
        let result = build_project(&input, &EngineConfig::default(), &cancel);
        assert!(matches!(result, Err(ArchError::Cancelled)));
    }
}
