use super::visited::VisitedSet;
use crate::core::{EntityKey, EntityRef, GraphError, IdDescriptor, RelationValue, Result};
use crate::schema::{OwnershipClassifier, RelationDef, RelationKind};
use std::sync::Arc;
use tracing::warn;

/// One current member of a relation, captured with its key.
#[derive(Debug, Clone)]
pub struct Member {
    pub entity: EntityRef,
    pub key: EntityKey,
    pub is_new: bool,
}

/// A declared relation of an entity together with its current members.
#[derive(Debug, Clone)]
pub struct RelatedProperty {
    pub def: RelationDef,
    pub members: Vec<Member>,
}

impl RelatedProperty {
    /// The referenced member of a reference property.
    pub fn reference(&self) -> Option<&Member> {
        self.members.first()
    }
}

/// Schema-checked view of one entity, taken without holding any lock.
#[derive(Debug, Clone)]
pub struct EntityView {
    pub entity: EntityRef,
    pub key: EntityKey,
    pub id: IdDescriptor,
    pub is_new: bool,
    /// Declared relations, in declaration order.
    pub properties: Vec<RelatedProperty>,
}

impl EntityView {
    /// Marks this entity as visited; `false` means it was already reconciled.
    pub fn enter(&self, visited: &mut VisitedSet) -> bool {
        if self.is_new {
            visited.insert_instance(self.entity.instance_addr())
        } else {
            visited.insert_key(&self.key)
        }
    }
}

/// Reads entity relations through the declared schema.
#[derive(Debug, Clone)]
pub struct GraphWalker {
    classifier: Arc<OwnershipClassifier>,
    strict_relations: bool,
}

impl GraphWalker {
    pub fn new(classifier: Arc<OwnershipClassifier>) -> Self {
        Self {
            classifier,
            strict_relations: true,
        }
    }

    /// When lenient, relations an instance carries but the schema does not declare are ignored.
    pub fn strict_relations(mut self, strict: bool) -> Self {
        self.strict_relations = strict;
        self
    }

    pub fn classifier(&self) -> &OwnershipClassifier {
        &self.classifier
    }

    /// Relation properties of a type in declaration order; every target must be identifiable.
    pub fn properties(&self, type_tag: &str) -> Result<&[RelationDef]> {
        self.classifier.relations(type_tag)
    }

    pub fn view(&self, entity: &EntityRef) -> Result<EntityView> {
        let (key, mut relations) = {
            let record = entity.read()?;
            (record.key(), record.relations().clone())
        };

        let type_name = key.type_tag.as_str();
        let id = *self.classifier.require_identifiable(type_name)?;
        id.check(type_name, &key.id)?;
        let is_new = id.is_new(&key.id);

        let defs = self.properties(type_name)?;
        let mut properties = Vec::with_capacity(defs.len());
        for def in defs {
            let value = relations.remove(&def.name);
            let members = match (def.kind, value) {
                (_, None) => Vec::new(),
                (RelationKind::Reference, Some(value @ RelationValue::Reference(_)))
                | (RelationKind::Collection, Some(value @ RelationValue::Collection(_))) => {
                    value.members()
                }
                (kind, Some(_)) => {
                    return Err(GraphError::Configuration(format!(
                        "{}.{} is declared as a {} but the instance holds a different kind",
                        type_name, def.name, kind
                    )));
                }
            };
            properties.push(RelatedProperty {
                def: def.clone(),
                members: self.members(&key, def, members)?,
            });
        }

        if let Some(name) = relations.keys().next() {
            if self.strict_relations {
                return Err(GraphError::Configuration(format!(
                    "{type_name}.{name} is not a declared relation"
                )));
            }
            for name in relations.keys() {
                warn!(entity = %key, relation = %name, "ignoring undeclared relation");
            }
        }

        Ok(EntityView {
            entity: entity.clone(),
            key,
            id,
            is_new,
            properties,
        })
    }

    fn members(
        &self,
        owner: &EntityKey,
        def: &RelationDef,
        entities: Vec<EntityRef>,
    ) -> Result<Vec<Member>> {
        let target_id = *self.classifier.require_identifiable(def.target.as_str())?;
        entities
            .into_iter()
            .map(|entity| {
                let key = entity.key()?;
                if key.type_tag != def.target {
                    return Err(GraphError::Configuration(format!(
                        "{}.{} expects '{}' but holds '{}'",
                        owner.type_tag, def.name, def.target, key.type_tag
                    )));
                }
                let is_new = target_id.is_new(&key.id);
                Ok(Member { entity, key, is_new })
            })
            .collect()
    }
}
