//! Startup-declared entity schemas.
//!
//! Each entity type is registered once with its id declaration, the
//! aggregate-root marker and its ordered relation properties. The registry
//! precomputes, for every type, whether its whole reachable schema graph is
//! identifiable, so save-time checks never re-derive metadata.

pub mod classifier;

pub use classifier::{ContextDescriptor, ExposedSet, OwnershipClassifier};

use crate::core::{GraphError, IdDescriptor, Result, TypeTag};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Reference,
    Collection,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Collection => write!(f, "collection"),
        }
    }
}

/// One relation property of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    pub kind: RelationKind,
    pub target: TypeTag,
}

/// Declared shape of one entity type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    type_tag: TypeTag,
    id: Option<IdDescriptor>,
    aggregate_root: bool,
    relations: Vec<RelationDef>,
}

impl EntitySchema {
    pub fn new(type_tag: impl Into<TypeTag>) -> Self {
        Self {
            type_tag: type_tag.into(),
            id: None,
            aggregate_root: false,
            relations: Vec::new(),
        }
    }

    pub fn id(mut self, id: IdDescriptor) -> Self {
        self.id = Some(id);
        self
    }

    /// Marks the type as an aggregate root. It only acts as one in contexts that expose it.
    pub fn aggregate_root(mut self) -> Self {
        self.aggregate_root = true;
        self
    }

    pub fn reference(self, name: impl Into<String>, target: impl Into<TypeTag>) -> Self {
        self.relation(name, RelationKind::Reference, target)
    }

    pub fn collection(self, name: impl Into<String>, target: impl Into<TypeTag>) -> Self {
        self.relation(name, RelationKind::Collection, target)
    }

    fn relation(
        mut self,
        name: impl Into<String>,
        kind: RelationKind,
        target: impl Into<TypeTag>,
    ) -> Self {
        self.relations.push(RelationDef {
            name: name.into(),
            kind,
            target: target.into(),
        });
        self
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    pub fn id_descriptor(&self) -> Option<&IdDescriptor> {
        self.id.as_ref()
    }

    pub fn is_marked_aggregate_root(&self) -> bool {
        self.aggregate_root
    }

    /// Relations in declaration order.
    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    pub fn relation_def(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// A non-identifiable type reachable from some entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnidentifiablePath {
    pub type_tag: TypeTag,
    /// Property path from the starting type, e.g. `["lines", "note"]`.
    pub path: Vec<String>,
}

/// All entity schemas known to the application.
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: HashMap<TypeTag, EntitySchema>,
    order: Vec<TypeTag>,
    unidentifiable: HashMap<TypeTag, UnidentifiablePath>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    pub fn get(&self, type_tag: &str) -> Option<&EntitySchema> {
        self.schemas.get(type_tag)
    }

    pub fn schema(&self, type_tag: &str) -> Result<&EntitySchema> {
        self.get(type_tag).ok_or_else(|| {
            GraphError::Configuration(format!("entity type '{type_tag}' is not registered"))
        })
    }

    /// Registered types in registration order.
    pub fn types(&self) -> &[TypeTag] {
        &self.order
    }

    /// First non-identifiable type reachable from `type_tag` (itself included), if any.
    pub fn unidentifiable_from(&self, type_tag: &str) -> Option<&UnidentifiablePath> {
        self.unidentifiable.get(type_tag)
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: Vec<EntitySchema>,
}

impl SchemaRegistryBuilder {
    pub fn entity(mut self, schema: EntitySchema) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn build(self) -> Result<SchemaRegistry> {
        let mut schemas = HashMap::new();
        let mut order = Vec::new();

        for schema in self.schemas {
            check_identifier("entity type", schema.type_tag.as_str())?;
            let mut names = HashSet::new();
            for relation in &schema.relations {
                check_identifier("relation", &relation.name)?;
                if !names.insert(relation.name.as_str()) {
                    return Err(GraphError::Configuration(format!(
                        "entity type '{}' declares relation '{}' twice",
                        schema.type_tag, relation.name
                    )));
                }
            }
            if schemas.contains_key(&schema.type_tag) {
                return Err(GraphError::Configuration(format!(
                    "entity type '{}' registered twice",
                    schema.type_tag
                )));
            }
            order.push(schema.type_tag.clone());
            schemas.insert(schema.type_tag.clone(), schema);
        }

        for schema in schemas.values() {
            for relation in &schema.relations {
                if !schemas.contains_key(&relation.target) {
                    return Err(GraphError::Configuration(format!(
                        "relation '{}.{}' targets unregistered type '{}'",
                        schema.type_tag, relation.name, relation.target
                    )));
                }
            }
        }

        let unidentifiable = order
            .iter()
            .filter_map(|tag| {
                first_unidentifiable(&schemas, tag).map(|path| (tag.clone(), path))
            })
            .collect();

        Ok(SchemaRegistry {
            schemas,
            order,
            unidentifiable,
        })
    }
}

fn check_identifier(what: &str, name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(GraphError::Configuration(format!(
            "invalid {what} name '{name}'"
        )))
    }
}

/// Depth-first search, in declaration order, for a type without an id.
fn first_unidentifiable(
    schemas: &HashMap<TypeTag, EntitySchema>,
    start: &TypeTag,
) -> Option<UnidentifiablePath> {
    let mut seen = HashSet::new();
    let mut stack = vec![(start.clone(), Vec::<String>::new())];

    while let Some((tag, path)) = stack.pop() {
        if !seen.insert(tag.clone()) {
            continue;
        }
        let schema = schemas.get(&tag)?;
        if schema.id.is_none() {
            return Some(UnidentifiablePath {
                type_tag: tag,
                path,
            });
        }
        for relation in schema.relations.iter().rev() {
            let mut next = path.clone();
            next.push(relation.name.clone());
            stack.push((relation.target.clone(), next));
        }
    }
    None
}
