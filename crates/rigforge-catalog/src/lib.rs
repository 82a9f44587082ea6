//! Rigforge Catalog - standard component types
//!
//! - [`BasicCopy`]: one unit copied as control and deformer (`basic.copy`)
//! - [`SimpleChain`]: control and deform chains over a connected chain (`chain.simple`)
//! - [`TweakChain`]: simple chain plus tweak controls (`chain.tweak`)
//! - [`FingerGenerator`]: single-call generator behind the legacy adapter (`limbs.finger`)
//! - [`ControlsPanel`]: plugin collecting panel rows from components

#![warn(unreachable_pub)]

pub mod components;
pub mod naming;
pub mod panel;

pub use components::{BasicCopy, FingerGenerator, SimpleChain, TweakChain};
pub use panel::ControlsPanel;

use rigforge_core::{ComponentCatalog, DefinitionError};

/// Outdated type names and their replacements; an empty target is retired
pub const OUTDATED_TYPES: &[(&str, &str)] = &[
    ("copy", "basic.copy"),
    ("simple_chain", "chain.simple"),
    ("tweak_chain", "chain.tweak"),
    ("finger", "limbs.finger"),
    ("pitchipoy.super_finger", "limbs.finger"),
    ("pitchipoy.simple_tentacle", "chain.tweak"),
    ("basic.copy_chain", ""),
];

/// Catalog with every standard type, plugin and alias registered
///
/// # Errors
/// Stage table definition conflicts.
pub fn standard_catalog() -> Result<ComponentCatalog, DefinitionError> {
    let mut catalog = ComponentCatalog::new();
    catalog.register::<BasicCopy>("basic.copy")?;
    catalog.register::<SimpleChain>("chain.simple")?;
    catalog.register::<TweakChain>("chain.tweak")?;
    catalog.register_legacy::<FingerGenerator>("limbs.finger")?;
    catalog.register_plugin::<ControlsPanel>()?;
    for (old, new) in OUTDATED_TYPES {
        catalog.alias(old, new);
    }
    tracing::debug!(types = catalog.len(), "standard catalog loaded");
    Ok(catalog)
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_resolves_aliases() {
        let catalog = standard_catalog().unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.find_component_class("copy").unwrap().name(), "basic.copy");
        assert_eq!(
            catalog.find_component_class("pitchipoy.super_finger").unwrap().name(),
            "limbs.finger"
        );
        assert!(catalog.find_component_class("limbs.finger").unwrap().is_legacy());
        assert!(catalog.find_component_class("basic.copy_chain").is_err());
        assert_eq!(catalog.plugin_names(), &["controls_panel"]);
    }
}
