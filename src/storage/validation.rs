use crate::core::{EntityRecord, FieldViolation};

/// Scalar constraint check run by the store at commit.
pub trait Validator: Send + Sync {
    fn validate(&self, entity: &EntityRecord) -> Vec<FieldViolation>;
}

impl<F> Validator for F
where
    F: Fn(&EntityRecord) -> Vec<FieldViolation> + Send + Sync,
{
    fn validate(&self, entity: &EntityRecord) -> Vec<FieldViolation> {
        self(entity)
    }
}

/// Fails every listed field that is missing, null or an empty string.
#[derive(Debug, Clone)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for RequiredFields {
    fn validate(&self, entity: &EntityRecord) -> Vec<FieldViolation> {
        self.fields
            .iter()
            .filter(|name| match entity.field(name) {
                None | Some(serde_json::Value::Null) => true,
                Some(serde_json::Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|name| FieldViolation::new(name.as_str(), "is required"))
            .collect()
    }
}
