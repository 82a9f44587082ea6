//! Generator configuration

use serde::{Deserialize, Serialize};

/// What to do when an entry point's component type cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTypePolicy {
    /// Abort the run
    Strict,
    /// Log, skip the entry point and keep going
    #[default]
    Lenient,
}

/// What to do when a native component creates units it did not register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnregisteredUnitPolicy {
    /// Record a diagnostic
    #[default]
    Warn,
    /// Attribute silently
    Silent,
}

/// Configuration for one generation run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Missing component type handling
    pub missing_types: MissingTypePolicy,
    /// Unregistered unit handling
    pub unregistered_units: UnregisteredUnitPolicy,
    /// Root unit that parentless units are attached to after `parent_units`
    pub root_unit: Option<String>,
}

impl GeneratorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With missing-type policy
    #[inline]
    #[must_use]
    pub fn with_missing_types(mut self, policy: MissingTypePolicy) -> Self {
        self.missing_types = policy;
        self
    }

    /// Abort on unresolvable component types
    #[inline]
    #[must_use]
    pub fn strict(self) -> Self {
        self.with_missing_types(MissingTypePolicy::Strict)
    }

    /// With unregistered-unit policy
    #[inline]
    #[must_use]
    pub fn with_unregistered_units(mut self, policy: UnregisteredUnitPolicy) -> Self {
        self.unregistered_units = policy;
        self
    }

    /// With a root unit for auto-parenting
    #[inline]
    #[must_use]
    pub fn with_root_unit(mut self, name: impl Into<String>) -> Self {
        self.root_unit = Some(name.into());
        self
    }

    /// Check if missing types abort the run
    #[inline]
    #[must_use]
    pub fn halt_on_missing(&self) -> bool {
        self.missing_types == MissingTypePolicy::Strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_lenient() {
        let config = GeneratorConfig::new();
        assert!(!config.halt_on_missing());
        assert_eq!(config.unregistered_units, UnregisteredUnitPolicy::Warn);
        assert_eq!(config.root_unit, None);
    }

    #[test]
    fn builder_methods() {
        let config = GeneratorConfig::new()
            .strict()
            .with_unregistered_units(UnregisteredUnitPolicy::Silent)
            .with_root_unit("root");
        assert!(config.halt_on_missing());
        assert_eq!(config.root_unit.as_deref(), Some("root"));
    }

    #[test]
    fn deserializes_partial() {
        let config: GeneratorConfig =
            serde_json::from_value(serde_json::json!({"missing_types": "strict"})).unwrap();
        assert!(config.halt_on_missing());
        assert_eq!(config.unregistered_units, UnregisteredUnitPolicy::Warn);
    }
}
