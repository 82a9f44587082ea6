//! Script assembly sink
//!
//! Collects generated runtime glue in append order and renders it as one
//! text script. Imports and registrations are deduplicated.

use indexmap::{IndexMap, IndexSet};
use rigforge_core::ScriptAssembly;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;

/// Code contributed by one component or plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    /// Contributor name
    pub contributor: String,
    /// Code text
    pub code: String,
}

/// Reference [`ScriptAssembly`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptBuffer {
    panel_code: Vec<Fragment>,
    imports: IndexSet<String>,
    utilities: Vec<Fragment>,
    classes: IndexSet<String>,
    driver_functions: IndexSet<String>,
    properties: IndexMap<String, Value>,
}

impl ScriptBuffer {
    /// Create empty buffer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Panel code in append order
    #[inline]
    #[must_use]
    pub fn panel_code(&self) -> &[Fragment] {
        &self.panel_code
    }

    /// Imports, deduplicated
    pub fn imports(&self) -> impl Iterator<Item = &str> {
        self.imports.iter().map(String::as_str)
    }

    /// Utility fragments in append order
    #[inline]
    #[must_use]
    pub fn utilities(&self) -> &[Fragment] {
        &self.utilities
    }

    /// Registered class names
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    /// Registered driver function names
    pub fn driver_functions(&self) -> impl Iterator<Item = &str> {
        self.driver_functions.iter().map(String::as_str)
    }

    /// Registered properties with their defaults
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    /// Check if nothing was contributed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.panel_code.is_empty()
            && self.imports.is_empty()
            && self.utilities.is_empty()
            && self.classes.is_empty()
            && self.driver_functions.is_empty()
            && self.properties.is_empty()
    }

    /// Render the collected glue as one script
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for import in &self.imports {
            let _ = writeln!(out, "{import}");
        }
        if !self.imports.is_empty() {
            out.push('\n');
        }

        for fragment in &self.utilities {
            let _ = writeln!(out, "# utility from {}\n{}\n", fragment.contributor, fragment.code);
        }

        if !self.panel_code.is_empty() {
            out.push_str("def draw_panel(layout):\n");
            let mut contributor = None;
            for fragment in &self.panel_code {
                if contributor != Some(fragment.contributor.as_str()) {
                    let _ = writeln!(out, "    # {}", fragment.contributor);
                    contributor = Some(fragment.contributor.as_str());
                }
                let _ = writeln!(out, "    {}", fragment.code);
            }
            out.push('\n');
        }

        for (name, value) in &self.properties {
            let _ = writeln!(out, "register_property({name:?}, {value})");
        }
        for class in &self.classes {
            let _ = writeln!(out, "register_class({class})");
        }
        for function in &self.driver_functions {
            let _ = writeln!(out, "register_driver_function({function})");
        }
        out
    }
}

fn fragments(contributor: &str, code: Vec<String>) -> impl Iterator<Item = Fragment> + '_ {
    code.into_iter().map(move |code| Fragment {
        contributor: contributor.to_string(),
        code,
    })
}

impl ScriptAssembly for ScriptBuffer {
    fn add_panel_code(&mut self, contributor: &str, lines: Vec<String>) {
        self.panel_code.extend(fragments(contributor, lines));
    }

    fn add_imports(&mut self, _contributor: &str, imports: Vec<String>) {
        self.imports.extend(imports);
    }

    fn add_utilities(&mut self, contributor: &str, code: Vec<String>) {
        self.utilities.extend(fragments(contributor, code));
    }

    fn register_classes(&mut self, _contributor: &str, classes: Vec<String>) {
        self.classes.extend(classes);
    }

    fn register_driver_functions(&mut self, _contributor: &str, functions: Vec<String>) {
        self.driver_functions.extend(functions);
    }

    fn register_property(&mut self, contributor: &str, name: &str, value: Value) {
        if let Some(previous) = self.properties.insert(name.to_string(), value) {
            tracing::debug!(contributor, name, %previous, "property re-registered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_new_empty() {
        let buffer = ScriptBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.render(), "");
    }

    #[test]
    fn imports_are_deduplicated() {
        let mut buffer = ScriptBuffer::new();
        buffer.add_imports("arm", vec!["import math".into(), "import bpy".into()]);
        buffer.add_imports("leg", vec!["import math".into()]);
        assert_eq!(buffer.imports().collect::<Vec<_>>(), vec!["import math", "import bpy"]);
    }

    #[test]
    fn panel_code_keeps_contributors() {
        let mut buffer = ScriptBuffer::new();
        buffer.add_panel_code("arm", vec!["layout.prop(fk)".into()]);
        buffer.add_panel_code("leg", vec!["layout.prop(ik)".into()]);

        assert_eq!(buffer.panel_code()[1].contributor, "leg");
        let script = buffer.render();
        assert!(script.contains("    # arm\n    layout.prop(fk)\n"));
        assert!(script.contains("    # leg\n    layout.prop(ik)\n"));
    }

    #[test]
    fn render_lists_registrations() {
        let mut buffer = ScriptBuffer::new();
        buffer.register_classes("arm", vec!["ArmPanel".into()]);
        buffer.register_driver_functions("arm", vec!["arm_stretch".into()]);
        buffer.register_property("arm", "ik_fk", Value::from(1.0));

        let script = buffer.render();
        assert!(script.contains("register_property(\"ik_fk\", 1.0)"));
        assert!(script.contains("register_class(ArmPanel)"));
        assert!(script.contains("register_driver_function(arm_stretch)"));
    }
}
