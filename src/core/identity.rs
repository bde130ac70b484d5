//! Entity identity: id values, their declared kinds and the "unset" sentinel.

use super::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An entity id value.
///
/// Ids compare by value, so two distinct in-memory objects carrying the same
/// id are the same logical entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityId {
    Int(i64),
    Uuid(Uuid),
    Text(String),
}

impl EntityId {
    pub fn kind(&self) -> IdKind {
        match self {
            Self::Int(_) => IdKind::Integer,
            Self::Uuid(_) => IdKind::Uuid,
            Self::Text(_) => IdKind::Text,
        }
    }

    /// True when this value equals the default of its own kind.
    pub fn is_default(&self) -> bool {
        match self {
            Self::Int(v) => *v == 0,
            Self::Uuid(v) => v.is_nil(),
            Self::Text(v) => v.is_empty(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for EntityId {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<Uuid> for EntityId {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&EntityId> for EntityId {
    fn from(value: &EntityId) -> Self {
        value.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdKind {
    Integer,
    Uuid,
    Text,
}

impl IdKind {
    /// The "unset" value for this kind: `0`, the nil UUID or the empty string.
    pub fn default_id(self) -> EntityId {
        match self {
            Self::Integer => EntityId::Int(0),
            Self::Uuid => EntityId::Uuid(Uuid::nil()),
            Self::Text => EntityId::Text(String::new()),
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Integer => "integer",
            Self::Uuid => "uuid",
            Self::Text => "text",
        };
        write!(f, "{label}")
    }
}

/// Who assigns ids for an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdGeneration {
    /// The store assigns the id at commit; the default value means "unsaved".
    Store,
    /// Natural keys: the application always supplies the id.
    Client,
}

/// Declared id type of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdDescriptor {
    pub kind: IdKind,
    pub generation: IdGeneration,
}

impl IdDescriptor {
    pub const fn new(kind: IdKind, generation: IdGeneration) -> Self {
        Self { kind, generation }
    }

    /// Store-generated integer ids.
    pub const fn integer() -> Self {
        Self::new(IdKind::Integer, IdGeneration::Store)
    }

    /// Client-supplied UUIDs.
    pub const fn uuid() -> Self {
        Self::new(IdKind::Uuid, IdGeneration::Client)
    }

    /// Client-supplied text keys.
    pub const fn text() -> Self {
        Self::new(IdKind::Text, IdGeneration::Client)
    }

    /// Opts into generated-id semantics for this kind.
    pub const fn generated(self) -> Self {
        Self::new(self.kind, IdGeneration::Store)
    }

    /// Opts into client-supplied natural keys for this kind.
    pub const fn natural(self) -> Self {
        Self::new(self.kind, IdGeneration::Client)
    }

    pub fn default_id(&self) -> EntityId {
        self.kind.default_id()
    }

    pub fn generates_ids(&self) -> bool {
        self.generation == IdGeneration::Store
    }

    /// An entity is new iff the store generates its ids and it still has the default one.
    pub fn is_new(&self, id: &EntityId) -> bool {
        self.generates_ids() && id.kind() == self.kind && id.is_default()
    }

    /// Rejects ids of the wrong kind and unset natural keys.
    pub fn check(&self, type_name: &str, id: &EntityId) -> Result<()> {
        if id.kind() != self.kind {
            return Err(GraphError::Configuration(format!(
                "entity type '{}' declares {} ids but an instance carries {} id {}",
                type_name,
                self.kind,
                id.kind(),
                id
            )));
        }
        if !self.generates_ids() && id.is_default() {
            return Err(GraphError::Configuration(format!(
                "entity type '{}' uses client-supplied {} keys but an instance has no key set",
                type_name, self.kind
            )));
        }
        Ok(())
    }
}
