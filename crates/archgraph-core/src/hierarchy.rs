//! # Entity Hierarchy
//!
//! The ordered collection of systems, containers and components that the
//! graph is built from. Each element carries its qualified ID and the
//! relationships authored on it.
//!
//! A hierarchy is usually read from an architecture model file
//! ([`Hierarchy::from_toml_str`]) but can be assembled programmatically.

use crate::ident::{self, IdIndex};
use crate::{ArchError, ElementKind, QualifiedId, RelationshipKind};
use serde::Deserialize;
use std::collections::BTreeSet;

// =============================================================================
// ELEMENTS
// =============================================================================

/// A relationship authored on an element, before its target is resolved.
///
/// `target` may be a qualified path or an unambiguous short name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthoredRelationship {
    pub target: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub technology: Option<String>,
    #[serde(default)]
    pub kind: Option<RelationshipKind>,
    #[serde(default)]
    pub bidirectional: bool,
}

impl AuthoredRelationship {
    #[must_use]
    pub fn new(target: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            label: label.into(),
            technology: None,
            kind: None,
            bidirectional: false,
        }
    }
}

/// One architecture element with its assigned qualified ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: QualifiedId,
    pub name: String,
    pub kind: ElementKind,
    pub parent: Option<QualifiedId>,
    pub relationships: Vec<AuthoredRelationship>,
}

/// The ordered element collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
    elements: Vec<Element>,
    ids: BTreeSet<QualifiedId>,
}

impl Hierarchy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a top-level system.
    pub fn add_system(&mut self, name: &str) -> Result<QualifiedId, ArchError> {
        self.insert(None, name, ElementKind::System)
    }

    /// Register a container beneath a system.
    pub fn add_container(
        &mut self,
        system: &QualifiedId,
        name: &str,
    ) -> Result<QualifiedId, ArchError> {
        self.insert(Some(system), name, ElementKind::Container)
    }

    /// Register a component beneath a container.
    pub fn add_component(
        &mut self,
        container: &QualifiedId,
        name: &str,
    ) -> Result<QualifiedId, ArchError> {
        self.insert(Some(container), name, ElementKind::Component)
    }

    /// Attach an authored relationship to an existing element.
    pub fn relate(
        &mut self,
        source: &QualifiedId,
        relationship: AuthoredRelationship,
    ) -> Result<(), ArchError> {
        let element = self
            .elements
            .iter_mut()
            .find(|e| &e.id == source)
            .ok_or_else(|| ArchError::ElementNotFound {
                query: source.to_string(),
                suggestion: None,
            })?;
        element.relationships.push(relationship);
        Ok(())
    }

    fn insert(
        &mut self,
        parent: Option<&QualifiedId>,
        name: &str,
        kind: ElementKind,
    ) -> Result<QualifiedId, ArchError> {
        if let Some(parent) = parent {
            let parent_kind = self
                .get(parent)
                .map(|e| e.kind)
                .ok_or_else(|| ArchError::InvalidHierarchy(format!("unknown parent '{parent}'")))?;
            if parent_kind.child_kind() != Some(kind) {
                return Err(ArchError::InvalidHierarchy(format!(
                    "a {kind} cannot live beneath {parent_kind} '{parent}'"
                )));
            }
        } else if kind != ElementKind::System {
            return Err(ArchError::InvalidHierarchy(format!(
                "{kind} '{name}' needs a parent"
            )));
        }

        let id = ident::qualify(parent, name)?;
        if !self.ids.insert(id.clone()) {
            return Err(ArchError::DuplicateElement(id.to_string()));
        }

        self.elements.push(Element {
            id: id.clone(),
            name: name.trim().to_string(),
            kind,
            parent: parent.cloned(),
            relationships: Vec::new(),
        });
        Ok(id)
    }

    /// Elements in registration order.
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    #[must_use]
    pub fn get(&self, id: &QualifiedId) -> Option<&Element> {
        if !self.ids.contains(id) {
            return None;
        }
        self.elements.iter().find(|e| &e.id == id)
    }

    /// IDs of all systems, in registration order.
    pub fn systems(&self) -> impl Iterator<Item = &QualifiedId> {
        self.elements
            .iter()
            .filter(|e| e.kind == ElementKind::System)
            .map(|e| &e.id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Known IDs plus the short-name table, for endpoint resolution.
    #[must_use]
    pub fn id_index(&self) -> IdIndex {
        IdIndex::new(self.ids.iter().cloned())
    }

    /// Parse an architecture model file.
    ///
    /// ```toml
    /// [[systems]]
    /// name = "Shop"
    ///
    /// [[systems.containers]]
    /// name = "API"
    /// relationships = [{ target = "shop/db", label = "reads" }]
    ///
    /// [[systems.containers.components]]
    /// name = "Order Handler"
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ArchError> {
        let model: ModelFile =
            toml::from_str(source).map_err(|e| ArchError::Serialization(e.to_string()))?;

        let mut hierarchy = Self::new();
        for system in model.systems {
            let system_id = hierarchy.add_system(&system.name)?;
            hierarchy.attach(&system_id, system.relationships)?;
            for container in system.containers {
                let container_id = hierarchy.add_container(&system_id, &container.name)?;
                hierarchy.attach(&container_id, container.relationships)?;
                for component in container.components {
                    let component_id = hierarchy.add_component(&container_id, &component.name)?;
                    hierarchy.attach(&component_id, component.relationships)?;
                }
            }
        }
        Ok(hierarchy)
    }

    fn attach(
        &mut self,
        id: &QualifiedId,
        relationships: Vec<AuthoredRelationship>,
    ) -> Result<(), ArchError> {
        for relationship in relationships {
            self.relate(id, relationship)?;
        }
        Ok(())
    }
}

// =============================================================================
// MODEL FILE FORMAT
// =============================================================================

#[derive(Debug, Deserialize)]
struct ModelFile {
    #[serde(default)]
    systems: Vec<SystemEntry>,
}

#[derive(Debug, Deserialize)]
struct SystemEntry {
    name: String,
    #[serde(default)]
    relationships: Vec<AuthoredRelationship>,
    #[serde(default)]
    containers: Vec<ContainerEntry>,
}

#[derive(Debug, Deserialize)]
struct ContainerEntry {
    name: String,
    #[serde(default)]
    relationships: Vec<AuthoredRelationship>,
    #[serde(default)]
    components: Vec<ComponentEntry>,
}

#[derive(Debug, Deserialize)]
struct ComponentEntry {
    name: String,
    #[serde(default)]
    relationships: Vec<AuthoredRelationship>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_ids() {
        let mut h = Hierarchy::new();
        let shop = h.add_system("Shop").expect("system");
        let api = h.add_container(&shop, "Order API").expect("container");
        let handler = h.add_component(&api, "Handler").expect("component");

        assert_eq!(handler.as_str(), "shop/order-api/handler");
        assert_eq!(h.len(), 3);
        assert_eq!(h.get(&handler).map(|e| e.kind), Some(ElementKind::Component));
        assert_eq!(h.get(&handler).and_then(|e| e.parent.clone()), Some(api));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut h = Hierarchy::new();
        h.add_system("Shop").expect("system");
        assert!(matches!(
            h.add_system("shop"),
            Err(ArchError::DuplicateElement(_))
        ));
    }

    #[test]
    fn rejects_invalid_nesting() {
        let mut h = Hierarchy::new();
        let shop = h.add_system("Shop").expect("system");
        assert!(matches!(
            h.add_component(&shop, "Handler"),
            Err(ArchError::InvalidHierarchy(_))
        ));
    }

    #[test]
    fn same_component_name_in_two_containers() {
        let mut h = Hierarchy::new();
        let shop = h.add_system("Shop").expect("system");
        let api = h.add_container(&shop, "API").expect("api");
        let worker = h.add_container(&shop, "Worker").expect("worker");
        let a = h.add_component(&api, "Handler").expect("a");
        let b = h.add_component(&worker, "Handler").expect("b");
        assert_ne!(a, b);
    }

    #[test]
    fn parses_model_file() {
        let model = r#"
            [[systems]]
            name = "Shop"

            [[systems.containers]]
            name = "API"
            relationships = [{ target = "shop/db", label = "reads", kind = "sync" }]

            [[systems.containers.components]]
            name = "Order Handler"

            [[systems.containers]]
            name = "DB"
        "#;
        let h = Hierarchy::from_toml_str(model).expect("parse");
        let ids: Vec<_> = h.elements().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["shop", "shop/api", "shop/api/order-handler", "shop/db"]);

        let api = h
            .get(&QualifiedId::normalize("shop/api").expect("id"))
            .expect("api");
        assert_eq!(api.relationships.len(), 1);
        assert_eq!(api.relationships[0].kind, Some(RelationshipKind::Sync));
    }

    #[test]
    fn malformed_model_is_an_error() {
        assert!(Hierarchy::from_toml_str("[[systems]]\nnope = 1").is_err());
    }
}
