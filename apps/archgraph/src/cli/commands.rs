//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//! Every command writes to the supplied writer, text or JSON.

use crate::project::Project;
use archgraph_core::{
    ArchError, BuiltGraph, DependencyReport, EdgeAttributes, ElementKind, Engine, Node,
    RelationshipStore, analyze_by_system, analyze_system,
};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// CONTEXT
// =============================================================================

/// An opened project plus the engine and store serving it.
pub struct Context {
    project: Project,
    engine: Engine,
    store: RelationshipStore,
    json_mode: bool,
    verbose: bool,
}

impl Context {
    /// Open the project at `root` with its own engine config.
    pub fn open(root: &Path, json_mode: bool, verbose: bool) -> Result<Self, ArchError> {
        let project = Project::open(root)?;
        let engine = Engine::new(project.config().clone())?;
        let store = project.store(&engine);
        Ok(Self {
            project,
            engine,
            store,
            json_mode,
            verbose,
        })
    }

    /// The current graph, built on first use.
    fn graph(&self) -> Result<Arc<BuiltGraph>, ArchError> {
        let (built, _) = self
            .engine
            .graph(self.project.root(), || self.project.load_input(&self.store))?;
        Ok(built)
    }
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

fn write_line(out: &mut dyn Write, line: &str) -> Result<(), ArchError> {
    writeln!(out, "{line}").map_err(|e| ArchError::Io {
        context: "writing output".to_string(),
        source: e,
    })
}

fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<(), ArchError> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| ArchError::Serialization(e.to_string()))?;
    write_line(out, &text)
}

fn write_nodes(ctx: &Context, out: &mut dyn Write, heading: &str, nodes: &[&Node]) -> Result<(), ArchError> {
    if ctx.json_mode {
        return write_json(out, &nodes);
    }
    write_line(out, heading)?;
    if nodes.is_empty() {
        return write_line(out, "  (none)");
    }
    for node in nodes {
        write_line(out, &format!("  {:<40} {:<9} {}", node.id, node.kind, node.name))?;
    }
    Ok(())
}

fn write_warnings(ctx: &Context, out: &mut dyn Write, built: &BuiltGraph) -> Result<(), ArchError> {
    if !ctx.verbose || ctx.json_mode {
        return Ok(());
    }
    for warning in &built.report.warnings {
        write_line(out, &format!("warning: {warning}"))?;
    }
    Ok(())
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// Elements `id` depends on.
pub fn cmd_deps(ctx: &Context, out: &mut dyn Write, id: &str) -> Result<(), ArchError> {
    let built = ctx.graph()?;
    write_warnings(ctx, out, &built)?;
    let nodes = built.graph.dependencies(id)?;
    write_nodes(ctx, out, &format!("{id} depends on:"), &nodes)
}

/// Elements that depend on `id`.
pub fn cmd_dependents(ctx: &Context, out: &mut dyn Write, id: &str) -> Result<(), ArchError> {
    let built = ctx.graph()?;
    write_warnings(ctx, out, &built)?;
    let nodes = built.graph.dependents(id)?;
    write_nodes(ctx, out, &format!("Depends on {id}:"), &nodes)
}

/// Direct children of `id`.
pub fn cmd_children(ctx: &Context, out: &mut dyn Write, id: &str) -> Result<(), ArchError> {
    let built = ctx.graph()?;
    let nodes = built.graph.children(id)?;
    write_nodes(ctx, out, &format!("Children of {id}:"), &nodes)
}

/// Shortest path from `from` to `to`.
pub fn cmd_path(ctx: &Context, out: &mut dyn Write, from: &str, to: &str) -> Result<(), ArchError> {
    let built = ctx.graph()?;
    write_warnings(ctx, out, &built)?;
    let path = built.graph.path(from, to)?;

    if ctx.json_mode {
        let output = serde_json::json!({
            "from": from,
            "to": to,
            "found": path.is_some(),
            "path": path.as_ref().map(|nodes| nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>()),
        });
        return write_json(out, &output);
    }

    match path {
        Some(nodes) => {
            let hops: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
            write_line(out, &hops.join(" -> "))
        }
        None => write_line(out, &format!("No path from {from} to {to}")),
    }
}

/// Coupling report.
pub fn cmd_analyze(
    ctx: &Context,
    out: &mut dyn Write,
    system: Option<&str>,
    per_system: bool,
) -> Result<(), ArchError> {
    let built = ctx.graph()?;
    let thresholds = ctx.engine.config().thresholds();

    if per_system {
        let reports = analyze_by_system(&built.graph, thresholds);
        if ctx.json_mode {
            return write_json(out, &reports);
        }
        for (system, report) in &reports {
            write_report(out, &format!("System {system}"), report)?;
            write_line(out, "")?;
        }
        return Ok(());
    }

    let (title, report) = match system {
        Some(system) => (
            format!("System {system}"),
            analyze_system(&built.graph, system, thresholds)?,
        ),
        None => ("Project".to_string(), ctx.engine.analyze(&built.graph)),
    };
    if ctx.json_mode {
        return write_json(out, &report);
    }
    write_report(out, &title, &report)
}

fn write_report(out: &mut dyn Write, title: &str, report: &DependencyReport) -> Result<(), ArchError> {
    write_line(out, &format!("{title} Coupling Report"))?;
    write_line(out, &"=".repeat(title.len().saturating_add(16)))?;
    write_line(out, &format!("Elements:       {}", report.total_nodes))?;
    write_line(out, &format!("Relationships:  {}", report.total_edges))?;
    write_line(
        out,
        &format!(
            "Density:        {} per thousand",
            report.density_millionths / 1000
        ),
    )?;
    write_line(out, &format!("Isolated:       {}", report.isolated_count()))?;
    write_line(
        out,
        &format!(
            "Highly coupled: {} (out-degree > {})",
            report.highly_coupled_count(),
            report.thresholds.high_coupling
        ),
    )?;
    write_line(
        out,
        &format!(
            "Central:        {} (in-degree > {})",
            report.central_count(),
            report.thresholds.central
        ),
    )?;
    for (label, entries) in [
        ("isolated", &report.isolated),
        ("highly coupled", &report.highly_coupled),
        ("central", &report.central),
    ] {
        for entry in entries {
            write_line(
                out,
                &format!(
                    "  [{label}] {} (in {}, out {})",
                    entry.id, entry.in_degree, entry.out_degree
                ),
            )?;
        }
    }
    Ok(())
}

/// List elements, optionally filtered by kind.
pub fn cmd_list(ctx: &Context, out: &mut dyn Write, kind: Option<ElementKind>) -> Result<(), ArchError> {
    let built = ctx.graph()?;
    let nodes: Vec<&Node> = built
        .graph
        .nodes()
        .filter(|n| kind.is_none_or(|k| n.kind == k))
        .collect();
    write_nodes(ctx, out, &format!("{} elements:", nodes.len()), &nodes)
}

/// Build and report warnings, counts and checksum.
pub fn cmd_check(ctx: &Context, out: &mut dyn Write) -> Result<(), ArchError> {
    let built = ctx.graph()?;
    let stats = built.graph.stats();
    let checksum = built.graph.checksum();

    if ctx.json_mode {
        let output = serde_json::json!({
            "root": ctx.project.root().to_string_lossy(),
            "stats": stats,
            "report": built.report,
            "checksum": checksum,
        });
        return write_json(out, &output);
    }

    write_line(out, "Archgraph Check")?;
    write_line(out, "===============")?;
    write_line(out, &format!("Project:    {}", ctx.project.root().display()))?;
    write_line(
        out,
        &format!(
            "Elements:   {} systems, {} containers, {} components",
            stats.systems, stats.containers, stats.components
        ),
    )?;
    write_line(
        out,
        &format!(
            "Edges:      {} ({} structured, {} from diagrams, {} duplicates merged)",
            stats.edges, stats.structured_edges, stats.diagram_edges, built.report.duplicates
        ),
    )?;
    write_line(
        out,
        &format!(
            "Diagrams:   {} read, {} failed",
            built.report.diagram_files, built.report.failed_files
        ),
    )?;
    write_line(out, &format!("Checksum:   {checksum}"))?;
    write_line(out, &format!("Warnings:   {}", built.report.warnings.len()))?;
    for warning in &built.report.warnings {
        write_line(out, &format!("  {warning}"))?;
    }
    Ok(())
}

// =============================================================================
// MUTATION COMMANDS
// =============================================================================

/// Author a relationship.
pub fn cmd_add_rel(
    ctx: &Context,
    out: &mut dyn Write,
    source: &str,
    target: &str,
    label: &str,
    attributes: EdgeAttributes,
) -> Result<(), ArchError> {
    let built = ctx.graph()?;
    let relationship =
        ctx.engine
            .add_relationship(&ctx.store, &built.graph, source, target, label, attributes)?;

    if ctx.json_mode {
        return write_json(out, &relationship);
    }
    write_line(
        out,
        &format!(
            "Added {} ({} -> {}{})",
            relationship.id,
            relationship.source,
            relationship.target,
            if relationship.label.is_empty() {
                String::new()
            } else {
                format!(": {}", relationship.label)
            }
        ),
    )
}

/// Remove an authored relationship by ID.
pub fn cmd_remove_rel(ctx: &Context, out: &mut dyn Write, system: &str, id: &str) -> Result<(), ArchError> {
    let built = ctx.graph()?;
    let removed = ctx
        .engine
        .remove_relationship(&ctx.store, &built.graph, system, id)?;

    if ctx.json_mode {
        return write_json(out, &removed);
    }
    write_line(
        out,
        &format!("Removed {} ({} -> {})", removed.id, removed.source, removed.target),
    )
}

/// Cascade-delete the stored relationships of an element.
pub fn cmd_delete_element(ctx: &Context, out: &mut dyn Write, id: &str) -> Result<(), ArchError> {
    let built = ctx.graph()?;
    let removed = ctx.engine.delete_element(&ctx.store, &built.graph, id)?;

    if ctx.json_mode {
        let output = serde_json::json!({ "element": id, "removed": removed });
        return write_json(out, &output);
    }
    write_line(out, &format!("Removed {removed} relationship(s) referencing {id}"))
}
