//! # Identifier Scheme
//!
//! Hierarchical slug identifiers and the reverse short-name lookup.
//!
//! - `slugify` lowercases and collapses every non-alphanumeric run to `-`
//! - `qualify` joins the full ancestor chain, so equal display names under
//!   different parents never collide
//! - `ShortNameIndex` resolves a trailing segment only when exactly one
//!   element carries it

use crate::{ArchError, QualifiedId};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Normalize a display name into a slug segment.
///
/// `"Order API (v2)"` becomes `"order-api-v2"`. Returns an empty string
/// for input without any alphanumeric character.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Build the qualified ID of `name` beneath `parent`.
pub fn qualify(parent: Option<&QualifiedId>, name: &str) -> Result<QualifiedId, ArchError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(ArchError::InvalidIdentifier(name.to_string()));
    }
    Ok(match parent {
        Some(parent) => parent.child(&slug),
        None => QualifiedId::root(slug),
    })
}

// =============================================================================
// SHORT-NAME INDEX
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShortEntry {
    Unique(QualifiedId),
    Ambiguous,
}

/// Trailing segment -> qualified ID, populated only when unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortNameIndex {
    entries: BTreeMap<String, ShortEntry>,
}

impl ShortNameIndex {
    /// Build the index over a set of IDs.
    pub fn from_ids<'a>(ids: impl IntoIterator<Item = &'a QualifiedId>) -> Self {
        let mut entries: BTreeMap<String, ShortEntry> = BTreeMap::new();
        for id in ids {
            entries
                .entry(id.last_segment().to_string())
                .and_modify(|e| {
                    if *e != ShortEntry::Unique(id.clone()) {
                        *e = ShortEntry::Ambiguous;
                    }
                })
                .or_insert_with(|| ShortEntry::Unique(id.clone()));
        }
        Self { entries }
    }

    /// Resolve a short name. Ambiguous or unknown names return `None`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&QualifiedId> {
        match self.entries.get(&slugify(name))? {
            ShortEntry::Unique(id) => Some(id),
            ShortEntry::Ambiguous => None,
        }
    }

    /// True if more than one element shares this short name.
    #[must_use]
    pub fn is_ambiguous(&self, name: &str) -> bool {
        matches!(self.entries.get(&slugify(name)), Some(ShortEntry::Ambiguous))
    }

    /// Unambiguous short names in sorted order.
    pub fn unambiguous(&self) -> impl Iterator<Item = (&str, &QualifiedId)> {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            ShortEntry::Unique(id) => Some((name.as_str(), id)),
            ShortEntry::Ambiguous => None,
        })
    }
}

// =============================================================================
// ID INDEX
// =============================================================================

/// The set of known IDs plus their short-name table.
///
/// Extractors resolve endpoints against this before the graph exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdIndex {
    ids: BTreeSet<QualifiedId>,
    short: ShortNameIndex,
}

impl IdIndex {
    pub fn new(ids: impl IntoIterator<Item = QualifiedId>) -> Self {
        let ids: BTreeSet<QualifiedId> = ids.into_iter().collect();
        let short = ShortNameIndex::from_ids(&ids);
        Self { ids, short }
    }

    #[must_use]
    pub fn contains(&self, id: &QualifiedId) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn short_names(&self) -> &ShortNameIndex {
        &self.short
    }

    /// Resolve user input to a known ID.
    ///
    /// Tries, in order: the input as a qualified path, then the input as an
    /// unambiguous short name.
    #[must_use]
    pub fn resolve(&self, query: &str) -> Option<QualifiedId> {
        if let Ok(id) = QualifiedId::normalize(query)
            && self.ids.contains(&id)
        {
            return Some(id);
        }
        self.short.resolve(query).cloned()
    }

    /// Best-effort corrected identifier for a failed lookup.
    ///
    /// Same as [`IdIndex::resolve`], falling back to the final path segment
    /// of the query as a short name.
    #[must_use]
    pub fn suggest(&self, query: &str) -> Option<QualifiedId> {
        self.resolve(query).or_else(|| {
            let tail = query.rsplit('/').next()?;
            self.short.resolve(tail).cloned()
        })
    }

    /// The not-found error for `query`, with a suggestion when one exists.
    #[must_use]
    pub fn not_found(&self, query: &str) -> ArchError {
        ArchError::ElementNotFound {
            query: query.to_string(),
            suggestion: self.suggest(query).map(|id| id.to_string()),
        }
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

    #[test]
    fn slugify_collapses_runs() {
        assert_eq!(slugify("Order API (v2)"), "order-api-v2");
        assert_eq!(slugify("  Api   Lambda  "), "api-lambda");
        assert_eq!(slugify("a__b--c"), "a-b-c");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn qualify_joins_ancestor_chain() {
        let system = qualify(None, "Shop").expect("system");
        let container = qualify(Some(&system), "Order API").expect("container");
        let component = qualify(Some(&container), "Handler").expect("component");
        assert_eq!(component.as_str(), "shop/order-api/handler");
    }

    #[test]
    fn qualify_same_name_under_different_parents_differs() {
        let a = qualify(Some(&id("shop/api")), "Handler").expect("a");
        let b = qualify(Some(&id("shop/worker")), "Handler").expect("b");
        assert_ne!(a, b);
    }

    #[test]
    fn qualify_rejects_empty_slug() {
        assert!(matches!(
            qualify(None, "???"),
            Err(ArchError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn short_name_unique_resolves() {
        let ids = [id("shop/api"), id("shop/db")];
        let index = ShortNameIndex::from_ids(&ids);
        assert_eq!(index.resolve("API"), Some(&id("shop/api")));
    }

    #[test]
    fn short_name_ambiguous_never_resolves() {
        let ids = [id("shop/api/handler"), id("shop/worker/handler")];
        let index = ShortNameIndex::from_ids(&ids);
        assert_eq!(index.resolve("handler"), None);
        assert!(index.is_ambiguous("handler"));
        assert_eq!(index.unambiguous().count(), 0);
    }

    #[test]
    fn id_index_resolves_path_then_short_name() {
        let index = IdIndex::new([id("shop"), id("shop/api-lambda")]);
        assert_eq!(index.resolve("Shop/Api Lambda"), Some(id("shop/api-lambda")));
        assert_eq!(index.resolve("Api Lambda"), Some(id("shop/api-lambda")));
        assert_eq!(index.resolve("missing"), None);
    }

    #[test]
    fn suggestion_for_display_name() {
        let index = IdIndex::new([id("api-lambda")]);
        let err = index.not_found("Api Lambda");
        assert!(matches!(
            err,
            ArchError::ElementNotFound { suggestion: Some(ref s), .. } if s == "api-lambda"
        ));
    }

    #[test]
    fn suggestion_falls_back_to_tail_segment() {
        let index = IdIndex::new([id("shop/api/handler")]);
        assert_eq!(index.suggest("wrong/path/Handler"), Some(id("shop/api/handler")));
    }
}
