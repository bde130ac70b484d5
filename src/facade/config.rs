/// Domain context configuration
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Label used in tracing spans
    pub name: String,

    /// Reject relations that an instance carries but its schema does not declare
    pub strict_relations: bool,
}

impl ContextConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            strict_relations: true,
        }
    }

    /// Ignore undeclared relations (with a warning) instead of failing the save
    pub fn lenient_relations(mut self) -> Self {
        self.strict_relations = false;
        self
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::new("default")
    }
}
