use super::{EntitySchema, RelationDef, SchemaRegistry};
use crate::core::{GraphError, IdDescriptor, Result, TypeTag};
use std::collections::HashSet;
use std::sync::Arc;

/// One queryable set exposed by a context, e.g. `orders: Order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedSet {
    pub name: String,
    pub element: TypeTag,
}

/// Describes what a persistence context exposes to application code.
///
/// Aggregate-root classification is derived from it, so one entity type can
/// be a root in one context and a dependent in another.
#[derive(Debug, Clone, Default)]
pub struct ContextDescriptor {
    name: String,
    sets: Vec<ExposedSet>,
}

impl ContextDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sets: Vec::new(),
        }
    }

    pub fn expose(mut self, set: impl Into<String>, element: impl Into<TypeTag>) -> Self {
        self.sets.push(ExposedSet {
            name: set.into(),
            element: element.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sets(&self) -> &[ExposedSet] {
        &self.sets
    }
}

/// Decides, once per context, which entity types are aggregate roots.
#[derive(Debug)]
pub struct OwnershipClassifier {
    registry: Arc<SchemaRegistry>,
    context: String,
    roots: HashSet<TypeTag>,
}

impl OwnershipClassifier {
    /// A type is an aggregate root here iff the context exposes it and its
    /// schema carries the marker.
    pub fn classify(registry: Arc<SchemaRegistry>, context: &ContextDescriptor) -> Result<Self> {
        let mut roots = HashSet::new();
        for set in context.sets() {
            let schema = registry.get(set.element.as_str()).ok_or_else(|| {
                GraphError::Configuration(format!(
                    "context '{}' exposes set '{}' of unregistered type '{}'",
                    context.name(),
                    set.name,
                    set.element
                ))
            })?;
            if schema.id_descriptor().is_none() {
                return Err(GraphError::Configuration(format!(
                    "context '{}' exposes set '{}' of type '{}' which has no id",
                    context.name(),
                    set.name,
                    set.element
                )));
            }
            if schema.is_marked_aggregate_root() {
                roots.insert(set.element.clone());
            }
        }

        Ok(Self {
            registry,
            context: context.name().to_string(),
            roots,
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn context_name(&self) -> &str {
        &self.context
    }

    pub fn is_aggregate_root(&self, type_tag: &str) -> bool {
        self.roots.contains(type_tag)
    }

    pub fn schema(&self, type_tag: &str) -> Result<&EntitySchema> {
        self.registry.schema(type_tag)
    }

    /// Fails unless `type_tag` is registered with an id declaration.
    pub fn require_identifiable(&self, type_tag: &str) -> Result<&IdDescriptor> {
        self.registry
            .schema(type_tag)?
            .id_descriptor()
            .ok_or_else(|| {
                GraphError::Configuration(format!(
                    "entity type '{type_tag}' is not identifiable: it declares no id"
                ))
            })
    }

    /// Fails if any type reachable from `type_tag`, at any depth, is not identifiable.
    pub fn require_identifiable_graph(&self, type_tag: &str) -> Result<()> {
        self.registry.schema(type_tag)?;
        match self.registry.unidentifiable_from(type_tag) {
            None => Ok(()),
            Some(found) if found.path.is_empty() => Err(GraphError::Configuration(format!(
                "entity type '{type_tag}' is not identifiable: it declares no id"
            ))),
            Some(found) => Err(GraphError::Configuration(format!(
                "entity type '{}' reached via {}.{} is not identifiable: it declares no id",
                found.type_tag,
                type_tag,
                found.path.join(".")
            ))),
        }
    }

    /// Relation properties of `type_tag` in declaration order, each target checked for identity.
    pub fn relations(&self, type_tag: &str) -> Result<&[RelationDef]> {
        let relations = self.registry.schema(type_tag)?.relations();
        for relation in relations {
            self.require_identifiable(relation.target.as_str())?;
        }
        Ok(relations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::schema::EntitySchema;

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(
            SchemaRegistry::builder()
                .entity(
                    EntitySchema::new("Order")
                        .id(IdDescriptor::integer())
                        .aggregate_root()
                        .reference("customer", "Customer")
                        .collection("lines", "Line"),
                )
                .entity(EntitySchema::new("Customer").id(IdDescriptor::integer()).aggregate_root())
                .entity(EntitySchema::new("Line").id(IdDescriptor::integer()))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_root_requires_exposure_and_marker() {
        let ctx = ContextDescriptor::new("sales")
            .expose("orders", "Order")
            .expose("lines", "Line");
        let classifier = OwnershipClassifier::classify(registry(), &ctx).unwrap();
        assert!(classifier.is_aggregate_root("Order"));
        // exposed but unmarked
        assert!(!classifier.is_aggregate_root("Line"));
        // marked but not exposed by this context
        assert!(!classifier.is_aggregate_root("Customer"));
    }

    #[test]
    fn test_same_type_classified_per_context() {
        let registry = registry();
        let sales = ContextDescriptor::new("sales").expose("orders", "Order");
        let crm = ContextDescriptor::new("crm")
            .expose("orders", "Order")
            .expose("customers", "Customer");
        let sales = OwnershipClassifier::classify(registry.clone(), &sales).unwrap();
        let crm = OwnershipClassifier::classify(registry, &crm).unwrap();
        assert!(!sales.is_aggregate_root("Customer"));
        assert!(crm.is_aggregate_root("Customer"));
    }

    #[test]
    fn test_exposing_unknown_type_fails_at_setup() {
        let ctx = ContextDescriptor::new("sales").expose("invoices", "Invoice");
        let err = OwnershipClassifier::classify(registry(), &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
