//! Command line configuration
//!
//! A TOML file with every key optional:
//!
//! ```toml
//! missing_types = "strict"        # or "lenient"
//! unregistered_units = "silent"   # or "warn"
//! root_unit = "root"              # "" disables auto-parenting
//!
//! [logging]
//! filter = "rigforge=debug"
//! json = false
//! ```

use anyhow::{Context, Result};
use rigforge_core::{GeneratorConfig, InputHierarchy, MissingTypePolicy, UnregisteredUnitPolicy};
use serde::Deserialize;
use std::path::Path;

/// Root unit used when the config file names none
pub const DEFAULT_ROOT_UNIT: &str = "root";

/// Filter used when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "rigforge=info";

/// Logging section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive
    pub filter: Option<String>,
    /// Emit JSON lines instead of text
    pub json: bool,
}

/// Contents of a config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Missing component type handling
    pub missing_types: Option<MissingTypePolicy>,
    /// Unregistered unit handling
    pub unregistered_units: Option<UnregisteredUnitPolicy>,
    /// Root unit for auto-parenting
    pub root_unit: Option<String>,
    /// Logging
    pub logging: LoggingConfig,
}

/// Command line overrides, applied on top of the file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// `--strict`
    pub strict: bool,
    /// `--silent-unregistered`
    pub silent_unregistered: bool,
    /// `--root NAME`
    pub root_unit: Option<String>,
}

impl CliConfig {
    /// Parse TOML text
    ///
    /// # Errors
    /// Malformed TOML or unknown keys.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid config")
    }

    /// Load a config file
    ///
    /// # Errors
    /// Unreadable file or invalid contents.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Generator configuration after applying `overrides`
    #[must_use]
    pub fn generator_config(&self, overrides: &Overrides) -> GeneratorConfig {
        let mut config = GeneratorConfig::new();
        if let Some(policy) = self.missing_types {
            config = config.with_missing_types(policy);
        }
        if let Some(policy) = self.unregistered_units {
            config = config.with_unregistered_units(policy);
        }
        if overrides.strict {
            config = config.strict();
        }
        if overrides.silent_unregistered {
            config = config.with_unregistered_units(UnregisteredUnitPolicy::Silent);
        }

        let root = overrides
            .root_unit
            .as_deref()
            .or(self.root_unit.as_deref())
            .unwrap_or(DEFAULT_ROOT_UNIT);
        if !root.is_empty() {
            config = config.with_root_unit(root);
        }
        config
    }

    /// Log filter directive
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.logging.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// Load an input hierarchy, JSON for `.json` files and YAML otherwise
///
/// # Errors
/// Unreadable file, parse failure, or a hierarchy that fails validation.
pub fn load_input(path: &Path) -> Result<InputHierarchy> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read input {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let input: InputHierarchy = if is_json {
        serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))?
    } else {
        serde_yaml::from_str(&text).with_context(|| format!("invalid YAML in {}", path.display()))?
    };
    input.validate()?;
    Ok(input)
}
