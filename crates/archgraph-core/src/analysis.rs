//! # Coupling Analysis
//!
//! One pass over a graph classifying every node by degree:
//!
//! | Category | Rule |
//! |----------|------|
//! | isolated | in-degree = out-degree = 0 |
//! | highly coupled | out-degree > `high_coupling` |
//! | central | in-degree > `central` |
//!
//! A node is listed once per category it qualifies for. Isolated nodes can
//! never be in another category, while a node may be both highly coupled
//! and central.

use crate::graph::Graph;
use crate::primitives::{DEFAULT_CENTRAL_THRESHOLD, DEFAULT_HIGH_COUPLING_THRESHOLD};
use crate::{ArchError, ElementKind, QualifiedId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// THRESHOLDS
// =============================================================================

/// Degree thresholds. Both comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouplingThresholds {
    pub high_coupling: usize,
    pub central: usize,
}

impl Default for CouplingThresholds {
    fn default() -> Self {
        Self {
            high_coupling: DEFAULT_HIGH_COUPLING_THRESHOLD,
            central: DEFAULT_CENTRAL_THRESHOLD,
        }
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// One classified node with its degrees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegreeEntry {
    pub id: QualifiedId,
    pub kind: ElementKind,
    pub in_degree: usize,
    pub out_degree: usize,
}

/// Coupling report for one graph or subgraph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Edges per node, as fixed-point millionths.
    pub density_millionths: u64,
    pub isolated: Vec<DegreeEntry>,
    pub highly_coupled: Vec<DegreeEntry>,
    pub central: Vec<DegreeEntry>,
    pub thresholds: CouplingThresholds,
}

impl DependencyReport {
    #[must_use]
    pub fn isolated_count(&self) -> usize {
        self.isolated.len()
    }

    #[must_use]
    pub fn highly_coupled_count(&self) -> usize {
        self.highly_coupled.len()
    }

    #[must_use]
    pub fn central_count(&self) -> usize {
        self.central.len()
    }

    /// True if every node is isolated.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.isolated.len() == self.total_nodes
    }
}

// =============================================================================
// ANALYSIS
// =============================================================================

/// Classify every node of `graph` in one pass.
#[must_use]
pub fn analyze_dependencies(graph: &Graph, thresholds: CouplingThresholds) -> DependencyReport {
    let total_nodes = graph.node_count();
    let total_edges = graph.edge_count();
    let density_millionths = if total_nodes > 0 {
        (total_edges as u64).saturating_mul(1_000_000) / (total_nodes as u64)
    } else {
        0
    };

    let mut report = DependencyReport {
        total_nodes,
        total_edges,
        density_millionths,
        thresholds,
        ..DependencyReport::default()
    };

    for node in graph.nodes() {
        let entry = DegreeEntry {
            id: node.id.clone(),
            kind: node.kind,
            in_degree: graph.in_degree(node.id.as_str()),
            out_degree: graph.out_degree(node.id.as_str()),
        };
        if entry.in_degree == 0 && entry.out_degree == 0 {
            report.isolated.push(entry);
            continue;
        }
        if entry.out_degree > thresholds.high_coupling {
            report.highly_coupled.push(entry.clone());
        }
        if entry.in_degree > thresholds.central {
            report.central.push(entry);
        }
    }

    report
}

/// Analyze one system's subgraph.
pub fn analyze_system(
    graph: &Graph,
    system: &str,
    thresholds: CouplingThresholds,
) -> Result<DependencyReport, ArchError> {
    let subgraph = graph.system_graph(system)?;
    Ok(analyze_dependencies(&subgraph, thresholds))
}

/// Analyze every system's subgraph, keyed by system ID.
#[must_use]
pub fn analyze_by_system(
    graph: &Graph,
    thresholds: CouplingThresholds,
) -> BTreeMap<QualifiedId, DependencyReport> {
    graph
        .nodes()
        .filter(|n| n.kind == ElementKind::System)
        .filter_map(|n| {
            let report = analyze_system(graph, n.id.as_str(), thresholds).ok()?;
            Some((n.id.clone(), report))
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
