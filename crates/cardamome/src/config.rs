//! Engine configuration

use crate::eval::DEFAULT_DIALECT;

/// Settings fixed when an [`Engine`](crate::Engine) is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Dialect for expressions that do not name one
    pub default_dialect: String,
    /// Register the `core` library
    pub core_library: bool,
    /// Report equally close converters as an error instead of taking the first registered
    pub strict_conversions: bool,
    /// Deepest allowed subcontext nesting (includes, fragment calls)
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_dialect: DEFAULT_DIALECT.to_string(),
            core_library: true,
            strict_conversions: false,
            max_depth: 32,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.default_dialect = dialect.into();
        self
    }

    pub fn core_library(mut self, enabled: bool) -> Self {
        self.core_library = enabled;
        self
    }

    pub fn strict_conversions(mut self, strict: bool) -> Self {
        self.strict_conversions = strict;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_dialect, "path");
        assert!(config.core_library);
        assert!(!config.strict_conversions);
        assert_eq!(config.max_depth, 32);
    }

    #[test]
    fn test_setters_chain() {
        let config = EngineConfig::new()
            .core_library(false)
            .strict_conversions(true)
            .max_depth(4);
        assert!(!config.core_library);
        assert!(config.strict_conversions);
        assert_eq!(config.max_depth, 4);
    }
}
