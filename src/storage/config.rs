/// In-memory store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Record an audit entry for every committed change
    pub audit_enabled: bool,

    /// Write audit entries in their own scope, so failed commits are audited too.
    ///
    /// When `false`, audit entries share the fate of the commit that produced them.
    pub audit_independent_scope: bool,

    /// First value handed out for store-generated integer ids
    pub integer_seed: i64,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            audit_enabled: true,
            audit_independent_scope: false,
            integer_seed: 1,
        }
    }

    /// Enable or disable the audit trail
    pub fn audit(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    /// Commit audit writes independently of the audited commit
    pub fn audit_independent_scope(mut self, independent: bool) -> Self {
        self.audit_independent_scope = independent;
        self
    }

    /// Set the first generated integer id
    pub fn integer_seed(mut self, seed: i64) -> Self {
        self.integer_seed = seed.max(1);
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert!(config.audit_enabled);
        assert!(!config.audit_independent_scope);
        assert_eq!(config.integer_seed, 1);
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::new()
            .audit_independent_scope(true)
            .integer_seed(0);
        assert!(config.audit_independent_scope);
        assert_eq!(config.integer_seed, 1);
    }
}
