//! Structured-metadata extractor.
//!
//! Sequential: authored relationships in hierarchy order, then stored
//! records in the order supplied.

use super::Extraction;
use crate::hierarchy::Hierarchy;
use crate::ident::IdIndex;
use crate::{BuildWarning, Provenance, QualifiedId, RawRelationship, Relationship};

/// Collect authored and stored relationships as raw tuples.
///
/// Authored targets may be short names; stored endpoints must already be
/// qualified IDs. Unknown endpoints and self-loops become warnings.
pub fn extract_structured(
    hierarchy: &Hierarchy,
    index: &IdIndex,
    stored: &[Relationship],
) -> Extraction {
    let mut extraction = Extraction::default();

    for element in hierarchy.elements() {
        let origin = format!("relationships of '{}'", element.id);
        for authored in &element.relationships {
            let Some(target) = index.resolve(&authored.target) else {
                extraction.warnings.push(BuildWarning::UnresolvedEndpoint {
                    endpoint: authored.target.clone(),
                    origin: origin.clone(),
                });
                continue;
            };
            if !accept_endpoints(&element.id, &target, &origin, &mut extraction.warnings) {
                continue;
            }
            extraction.relationships.push(RawRelationship {
                source: element.id.clone(),
                target,
                label: authored.label.trim().to_string(),
                technology: authored.technology.clone(),
                kind: authored.kind,
                bidirectional: authored.bidirectional,
                provenance: Provenance::Structured,
            });
        }
    }

    let origin = "relationship store".to_string();
    for record in stored {
        let mut known = true;
        for endpoint in [&record.source, &record.target] {
            if !index.contains(endpoint) {
                known = false;
                extraction.warnings.push(BuildWarning::UnresolvedEndpoint {
                    endpoint: endpoint.to_string(),
                    origin: origin.clone(),
                });
            }
        }
        if !known || !accept_endpoints(&record.source, &record.target, &origin, &mut extraction.warnings) {
            continue;
        }
        let mut raw = RawRelationship::from(record);
        raw.provenance = Provenance::Structured;
        extraction.relationships.push(raw);
    }

    extraction
}

fn accept_endpoints(
    source: &QualifiedId,
    target: &QualifiedId,
    origin: &str,
    warnings: &mut Vec<BuildWarning>,
) -> bool {
    if source == target {
        warnings.push(BuildWarning::SelfLoopDropped {
            element: source.to_string(),
            origin: origin.to_string(),
        });
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::AuthoredRelationship;

    fn shop() -> (Hierarchy, QualifiedId, QualifiedId) {
        let mut h = Hierarchy::new();
        let shop = h.add_system("Shop").expect("system");
        let api = h.add_container(&shop, "API").expect("api");
        let db = h.add_container(&shop, "DB").expect("db");
        (h, api, db)
    }

    #[test]
    fn authored_short_name_target_resolves() {
        let (mut h, api, db) = shop();
        h.relate(&api, AuthoredRelationship::new("DB", "reads"))
            .expect("relate");

        let extraction = extract_structured(&h, &h.id_index(), &[]);
        assert!(extraction.warnings.is_empty());
        assert_eq!(extraction.relationships.len(), 1);
        assert_eq!(extraction.relationships[0].target, db);
        assert_eq!(extraction.relationships[0].provenance, Provenance::Structured);
    }

    #[test]
    fn unknown_target_is_a_warning() {
        let (mut h, api, _) = shop();
        h.relate(&api, AuthoredRelationship::new("cache", "reads"))
            .expect("relate");

        let extraction = extract_structured(&h, &h.id_index(), &[]);
        assert!(extraction.relationships.is_empty());
        assert!(matches!(
            extraction.warnings.as_slice(),
            [BuildWarning::UnresolvedEndpoint { endpoint, .. }] if endpoint == "cache"
        ));
    }

    #[test]
    fn stored_records_with_dangling_endpoint_are_dropped() {
        let (h, api, db) = shop();
        let good = Relationship::new(api.clone(), db, "writes").expect("rel");
        let ghost = QualifiedId::normalize("shop/ghost").expect("id");
        let bad = Relationship::new(api, ghost, "haunts").expect("rel");

        let extraction = extract_structured(&h, &h.id_index(), &[good, bad]);
        assert_eq!(extraction.relationships.len(), 1);
        assert_eq!(extraction.warnings.len(), 1);
    }

    #[test]
    fn authored_self_loop_is_dropped() {
        let (mut h, api, _) = shop();
        h.relate(&api, AuthoredRelationship::new("shop/api", "recurses"))
            .expect("relate");

        let extraction = extract_structured(&h, &h.id_index(), &[]);
        assert!(extraction.relationships.is_empty());
        assert!(matches!(
            extraction.warnings.as_slice(),
            [BuildWarning::SelfLoopDropped { .. }]
        ));
    }
}
