//! Subcommand implementations

use anyhow::{Context, Result};
use rigforge_catalog::standard_catalog;
use rigforge_core::{
    ComponentCatalog, GenerateError, GenerationReport, Generator, GeneratorConfig, InputHierarchy, Stage,
};
use rigforge_skeleton::{ScriptBuffer, Skeleton};
use std::fmt::Write as _;

/// Result of `generate`
#[derive(Debug)]
pub struct GenerateOutcome {
    /// Report of the run, also when it failed part way
    pub report: GenerationReport,
    /// Generated script
    pub script: String,
    /// Fatal error that stopped the run
    pub error: Option<GenerateError>,
}

impl GenerateOutcome {
    /// Whether the run reached the end
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Printable output, text or pretty JSON
    ///
    /// # Errors
    /// JSON serialization failure.
    pub fn render(&self, json: bool) -> Result<String> {
        if json {
            let mut value = serde_json::to_value(&self.report)?;
            if let (Some(map), Some(err)) = (value.as_object_mut(), &self.error) {
                map.insert("error".to_string(), serde_json::Value::String(err.to_string()));
            }
            return serde_json::to_string_pretty(&value).context("cannot serialize report");
        }

        let mut out = self.report.to_string();
        if let Some(err) = &self.error {
            let _ = writeln!(out, "error: {err}");
        }
        Ok(out)
    }
}

/// Run a full generation over `input` with the standard catalog
///
/// # Errors
/// Only catalog definition failures; generation errors are carried in the
/// outcome.
pub fn generate(input: &InputHierarchy, config: GeneratorConfig) -> Result<GenerateOutcome> {
    let catalog = standard_catalog().context("standard catalog failed to load")?;
    Ok(generate_with(&catalog, input, config))
}

/// Run a full generation with an explicit catalog
#[must_use]
pub fn generate_with(catalog: &ComponentCatalog, input: &InputHierarchy, config: GeneratorConfig) -> GenerateOutcome {
    let mut skeleton = Skeleton::from_hierarchy(input);
    let mut script = ScriptBuffer::new();

    let mut generator = Generator::new(catalog, &mut skeleton, &mut script, config);
    let error = generator.run(input).err();
    let report = generator.finish();

    if let Some(err) = &error {
        tracing::error!(run = %report.run_id, error = %err, "generation failed");
    }
    GenerateOutcome {
        report,
        script: script.render(),
        error,
    }
}

/// `types`: registered component types, then aliases
#[must_use]
pub fn list_types(catalog: &ComponentCatalog) -> String {
    let mut out = String::from("component types:\n");
    for class in catalog.classes() {
        let kind = if class.is_legacy() { " (legacy)" } else { "" };
        let stages: Vec<&str> = class.stages().iter().map(|s| s.name()).collect();
        let _ = writeln!(out, "  {}{kind}: {}", class.name(), stages.join(", "));
    }

    let mut aliases: Vec<(&str, &str)> = catalog.aliases().collect();
    aliases.sort_unstable();
    if !aliases.is_empty() {
        out.push_str("aliases:\n");
        for (old, new) in aliases {
            if new.is_empty() {
                let _ = writeln!(out, "  {old} (retired)");
            } else {
                let _ = writeln!(out, "  {old} -> {new}");
            }
        }
    }

    if !catalog.plugin_names().is_empty() {
        let _ = writeln!(out, "plugins: {}", catalog.plugin_names().join(", "));
    }
    out
}

/// `stages`: stage order with the structural mode of each
#[must_use]
pub fn list_stages() -> String {
    let mut out = String::new();
    for (i, stage) in Stage::ALL.iter().enumerate() {
        let _ = writeln!(out, "{}. {stage} [{}]", i + 1, stage.mode());
    }
    out
}
