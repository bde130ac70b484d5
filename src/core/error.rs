use std::fmt;
use thiserror::Error;

/// A single failed scalar constraint on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every violation reported for one staged entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityViolations {
    /// Display form of the entity key, e.g. `Order#12`.
    pub entity: String,
    pub violations: Vec<FieldViolation>,
}

/// Aggregated validation failure for a whole commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub entities: Vec<EntityViolations>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn push(&mut self, entity: impl Into<String>, violations: Vec<FieldViolation>) {
        if violations.is_empty() {
            return;
        }
        self.entities.push(EntityViolations {
            entity: entity.into(),
            violations,
        });
    }

    /// Total number of failing fields across all entities.
    pub fn violation_count(&self) -> usize {
        self.entities.iter().map(|e| e.violations.len()).sum()
    }

    pub fn for_entity(&self, entity: &str) -> Option<&EntityViolations> {
        self.entities.iter().find(|e| e.entity == entity)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for entity in &self.entities {
            for violation in &entity.violations {
                if !first {
                    write!(f, "; ")?;
                }
                first = false;
                write!(f, "{}.{}: {}", entity.entity, violation.field, violation.message)?;
            }
        }
        Ok(())
    }
}

/// Coarse classification of a [`GraphError`], stable across context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Concurrency,
    NotFound,
    Lock,
    Storage,
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Concurrency conflict: {0}")]
    Concurrency(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("while reconciling {entity}{}: {source}", property_suffix(.property))]
    Reconcile {
        entity: String,
        property: Option<String>,
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Returns the kind of the innermost error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Concurrency(_) => ErrorKind::Concurrency,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::LockError(_) => ErrorKind::Lock,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Reconcile { source, .. } => source.kind(),
        }
    }

    /// Wraps the error with the entity (and optionally the property) being reconciled.
    ///
    /// Configuration errors already name the offending type and are returned as is.
    pub fn in_entity(self, entity: impl fmt::Display, property: Option<&str>) -> Self {
        match self {
            Self::Configuration(_) | Self::Reconcile { .. } => self,
            other => Self::Reconcile {
                entity: entity.to_string(),
                property: property.map(str::to_string),
                source: Box::new(other),
            },
        }
    }

    /// Strips reconciliation context and returns the original error.
    pub fn into_root(self) -> Self {
        match self {
            Self::Reconcile { source, .. } => source.into_root(),
            other => other,
        }
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::Reconcile { source, .. } => source.validation_errors(),
            _ => None,
        }
    }
}

fn property_suffix(property: &Option<String>) -> String {
    property
        .as_deref()
        .map(|p| format!(".{p}"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, GraphError>;

impl<T> From<std::sync::PoisonError<T>> for GraphError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
