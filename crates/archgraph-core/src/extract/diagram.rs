//! Diagram-source extractor.
//!
//! Parses the D2 arrow subset used for architecture diagrams:
//!
//! ```text
//! api -> db: Reads orders [PostgreSQL]
//! web <- api: Pushes updates
//! api <-> cache: Syncs
//! web -> api -> db: Request path
//! api: {
//!   handler -> repo: Uses     # resolved as api.handler -> api.repo
//! }
//! ```
//!
//! Inline blocks (`api: { handler -> repo }`) and `;`-separated statements
//! read the same as their multi-line forms.
//!
//! Shape declarations, attributes and comments are skipped. A file with an
//! arrow missing an endpoint, or with unbalanced braces, is malformed as a
//! whole; the rest of the project is unaffected.

use crate::ident::{self, IdIndex};
use crate::primitives::{MAX_LABEL_LENGTH, PATH_SEPARATOR};
use crate::{ArchError, BuildWarning, Provenance, QualifiedId, RawRelationship};
use std::path::PathBuf;

// =============================================================================
// INPUT / OUTPUT
// =============================================================================

/// Raw diagram text supplied by a file-reading collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramSource {
    /// Path of the file, used for ordering and reporting only.
    pub path: PathBuf,
    /// The element the diagram belongs to; relative endpoints resolve here first.
    pub scope: QualifiedId,
    pub text: String,
}

/// One parsed arrow hop with unresolved endpoint paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramArrow {
    pub source: Vec<String>,
    pub target: Vec<String>,
    pub label: String,
    pub technology: Option<String>,
    pub bidirectional: bool,
    /// 1-based line number.
    pub line: usize,
}

/// Result of extracting one diagram file.
#[derive(Debug)]
pub struct FileExtraction {
    pub path: PathBuf,
    pub relationships: Vec<RawRelationship>,
    pub warnings: Vec<BuildWarning>,
    /// Set when the file as a whole could not be parsed.
    pub error: Option<ArchError>,
}

// =============================================================================
// PARSER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arrow {
    Forward,
    Reverse,
    Both,
}

/// Parse diagram text into arrow hops.
///
/// `file` is only used in error messages.
pub fn parse_diagram(file: &str, text: &str) -> Result<Vec<DiagramArrow>, ArchError> {
    let mut arrows = Vec::new();
    // Open blocks: Some(path) for shape containers, None for attribute blocks.
    let mut scopes: Vec<Option<Vec<String>>> = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx.saturating_add(1);
        let fail = |message: String| ArchError::DiagramParse {
            file: file.to_string(),
            line: line_no,
            message,
        };

        for statement in statements(strip_comment(raw_line)) {
            let mut line = statement.trim();

            while let Some(rest) = line.strip_prefix('}') {
                if scopes.pop().is_none() {
                    return Err(fail("unbalanced '}'".to_string()));
                }
                line = rest.trim_start();
            }
            if line.is_empty() || line.starts_with('(') {
                continue;
            }

            let opens_block = line.ends_with('{');
            let (head, label) = match find_unquoted(line, b':') {
                Some(pos) => (&line[..pos], Some(&line[pos.saturating_add(1)..])),
                None => (line, None),
            };
            let head = head.trim().trim_end_matches('{').trim_end();

            let Some((endpoints, hops)) = split_arrows(head) else {
                if opens_block {
                    let key = split_path(head);
                    let named = !key.is_empty() && key.iter().all(|s| !s.is_empty());
                    scopes.push(named.then_some(key));
                }
                continue;
            };

            let prefix: Vec<String> = scopes.iter().flatten().flatten().cloned().collect();
            let mut paths = Vec::with_capacity(endpoints.len());
            for endpoint in &endpoints {
                if endpoint.is_empty() {
                    return Err(fail("arrow is missing an endpoint".to_string()));
                }
                let segments = split_path(endpoint);
                if segments.iter().any(String::is_empty) {
                    return Err(fail(format!("empty path segment in '{}'", endpoint)));
                }
                let mut full = prefix.clone();
                full.extend(segments);
                paths.push(full);
            }

            let (label, technology) = parse_label(label.unwrap_or(""));
            if label.len() > MAX_LABEL_LENGTH {
                return Err(fail(format!(
                    "label is {} bytes, limit is {}",
                    label.len(),
                    MAX_LABEL_LENGTH
                )));
            }

            for (i, hop) in hops.iter().enumerate() {
                let (left, right) = (&paths[i], &paths[i.saturating_add(1)]);
                let (source, target) = match hop {
                    Arrow::Reverse => (right.clone(), left.clone()),
                    Arrow::Forward | Arrow::Both => (left.clone(), right.clone()),
                };
                arrows.push(DiagramArrow {
                    source,
                    target,
                    label: label.clone(),
                    technology: technology.clone(),
                    bidirectional: *hop == Arrow::Both,
                    line: line_no,
                });
            }

            if opens_block {
                scopes.push(None);
            }
        }
    }

    if !scopes.is_empty() {
        return Err(ArchError::DiagramParse {
            file: file.to_string(),
            line: text.lines().count(),
            message: format!("{} unclosed block(s)", scopes.len()),
        });
    }

    Ok(arrows)
}

/// Split a line into statements at unquoted `;`, after `{` and before `}`,
/// so `api: { a -> b }` reads like its multi-line form.
fn statements(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, b) in line.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            b'{' => {
                parts.push(&line[start..=i]);
                start = i.saturating_add(1);
            }
            b'}' => {
                parts.push(&line[start..i]);
                start = i;
            }
            b';' => {
                parts.push(&line[start..i]);
                start = i.saturating_add(1);
            }
            _ => {}
        }
    }
    parts.push(&line[start..]);
    parts
}

/// Drop a trailing `#` comment that is not inside quotes.
fn strip_comment(line: &str) -> &str {
    match find_unquoted(line, b'#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Byte offset of the first unquoted occurrence of an ASCII byte.
fn find_unquoted(s: &str, needle: u8) -> Option<usize> {
    let mut in_quotes = false;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            _ if b == needle && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split `a -> b <- c` into endpoints and arrows. `None` if there is no arrow.
fn split_arrows(chain: &str) -> Option<(Vec<String>, Vec<Arrow>)> {
    let bytes = chain.as_bytes();
    let mut endpoints = Vec::new();
    let mut hops = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut in_quotes = false;

    while i < bytes.len() {
        if bytes[i] == b'"' {
            in_quotes = !in_quotes;
            i = i.saturating_add(1);
            continue;
        }
        if !in_quotes {
            let rest = &bytes[i..];
            let arrow = if rest.starts_with(b"<->") {
                Some((Arrow::Both, 3))
            } else if rest.starts_with(b"->") {
                Some((Arrow::Forward, 2))
            } else if rest.starts_with(b"<-") {
                Some((Arrow::Reverse, 2))
            } else {
                None
            };
            if let Some((arrow, len)) = arrow {
                endpoints.push(chain[start..i].trim().to_string());
                hops.push(arrow);
                i = i.saturating_add(len);
                start = i;
                continue;
            }
        }
        i = i.saturating_add(1);
    }

    if hops.is_empty() {
        return None;
    }
    endpoints.push(chain[start..].trim().to_string());
    Some((endpoints, hops))
}

/// Split a dotted D2 key into segments, honoring quotes.
fn split_path(key: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut rest = key.trim();
    while let Some(pos) = find_unquoted(rest, b'.') {
        segments.push(unquote(&rest[..pos]));
        rest = &rest[pos.saturating_add(1)..];
    }
    if !rest.trim().is_empty() || !segments.is_empty() {
        segments.push(unquote(rest));
    }
    segments
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
        .trim()
        .to_string()
}

/// Split `Reads orders [PostgreSQL] {` into label and technology.
fn parse_label(raw: &str) -> (String, Option<String>) {
    let trimmed = raw.trim().trim_end_matches('{').trim_end();
    if let Some(body) = trimmed.strip_suffix(']')
        && let Some(open) = body.rfind('[')
    {
        let technology = body[open.saturating_add(1)..].trim();
        let label = unquote(&body[..open]);
        let technology = (!technology.is_empty()).then(|| technology.to_string());
        return (label, technology);
    }
    (unquote(trimmed), None)
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Resolve a diagram endpoint path to a known qualified ID.
///
/// Order: beneath the diagram scope, beneath the owning system, as an
/// absolute path, then the last segment as an unambiguous short name.
fn resolve_endpoint(
    segments: &[String],
    scope: &QualifiedId,
    index: &IdIndex,
) -> Option<QualifiedId> {
    let slugs: Vec<String> = segments.iter().map(|s| ident::slugify(s)).collect();
    if slugs.is_empty() || slugs.iter().any(String::is_empty) {
        return None;
    }
    let relative = slugs.join(&PATH_SEPARATOR.to_string());

    let system = QualifiedId::root(scope.system_segment().to_string());
    let candidates = [
        scope.child(&relative),
        system.child(&relative),
        QualifiedId::root(relative.clone()),
    ];
    if let Some(found) = candidates.into_iter().find(|c| index.contains(c)) {
        return Some(found);
    }

    index.short_names().resolve(slugs.last()?).cloned()
}

/// Parse one diagram and resolve its endpoints.
///
/// Never fails: a malformed file is reported through `error`.
pub fn extract_file(source: &DiagramSource, index: &IdIndex, max_bytes: usize) -> FileExtraction {
    let file = source.path.display().to_string();
    let mut extraction = FileExtraction {
        path: source.path.clone(),
        relationships: Vec::new(),
        warnings: Vec::new(),
        error: None,
    };

    if source.text.len() > max_bytes {
        extraction.error = Some(ArchError::DiagramParse {
            file,
            line: 0,
            message: format!(
                "diagram is {} bytes, limit is {}",
                source.text.len(),
                max_bytes
            ),
        });
        return extraction;
    }

    let arrows = match parse_diagram(&file, &source.text) {
        Ok(arrows) => arrows,
        Err(e) => {
            extraction.error = Some(e);
            return extraction;
        }
    };

    for arrow in arrows {
        let origin = format!("{}:{}", file, arrow.line);
        let source_id = resolve_endpoint(&arrow.source, &source.scope, index);
        let target_id = resolve_endpoint(&arrow.target, &source.scope, index);

        let (Some(source_id), Some(target_id)) = (source_id.clone(), target_id.clone()) else {
            for (path, resolved) in [(&arrow.source, &source_id), (&arrow.target, &target_id)] {
                if resolved.is_none() {
                    extraction.warnings.push(BuildWarning::UnresolvedEndpoint {
                        endpoint: path.join("."),
                        origin: origin.clone(),
                    });
                }
            }
            continue;
        };

        if source_id == target_id {
            extraction.warnings.push(BuildWarning::SelfLoopDropped {
                element: source_id.to_string(),
                origin,
            });
            continue;
        }

        extraction.relationships.push(RawRelationship {
            source: source_id,
            target: target_id,
            label: arrow.label,
            technology: arrow.technology,
            kind: None,
            bidirectional: arrow.bidirectional,
            provenance: Provenance::Diagram,
        });
    }

    extraction
}

// =============================================================================
// TESTS
// =============================================================================
