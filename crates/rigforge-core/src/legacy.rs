//! Legacy generator adapter
//!
//! Older generators do all their work in one call. [`LegacyAdapter`] wraps
//! such a generator as a component whose whole unit-creation work happens in
//! `generate_units`, forwarding any returned payload to the script sink.

use crate::component::{ComponentType, EntryPoint};
use crate::context::StageContext;
use crate::error::{DefinitionError, GenerateError, StageResult};
use crate::host::HostStructure;
use crate::registry::{StageTable, StageTableBuilder};
use crate::stage::Stage;
use crate::types::{StructuralMode, UnitName};
use serde::{Deserialize, Serialize};

/// Structured side-channel payload of a legacy generator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptPayload {
    /// Panel code lines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<Vec<String>>,
    /// Import statements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imports: Option<Vec<String>>,
    /// Utility code fragments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilities: Option<Vec<String>>,
    /// Classes to register
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register: Option<Vec<String>>,
    /// Driver functions to register
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_drivers: Option<Vec<String>>,
    /// Properties to register, as `(name, default)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_props: Option<Vec<(String, serde_json::Value)>>,
    /// Units to exempt from auto-parenting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noparent_units: Option<Vec<UnitName>>,
}

/// What a legacy generator's single call returns
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyOutput {
    /// Keyed payload, forwarded field by field
    Structured(ScriptPayload),
    /// Bare panel code; only the first fragment is used
    PanelCode(Vec<String>),
}

/// A single-call generator
pub trait LegacyGenerator: Sized + 'static {
    /// Construct at an entry point
    ///
    /// # Errors
    /// Construction failures abort tree building.
    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError>;

    /// Units the generator controls, if it keeps such a list
    fn org_units(&self) -> Option<Vec<UnitName>> {
        None
    }

    /// Do all the work
    ///
    /// # Errors
    /// Generation failures abort the run.
    fn generate(&mut self, host: &mut dyn HostStructure) -> Result<Option<LegacyOutput>, GenerateError>;

    /// Cross-component glue, run during `finalize`
    ///
    /// # Errors
    /// Glue failures abort the run.
    fn glue(&mut self, _host: &mut dyn HostStructure) -> StageResult {
        Ok(())
    }
}

/// Component wrapping a [`LegacyGenerator`]
#[derive(Debug)]
pub struct LegacyAdapter<G> {
    wrapped: G,
}

impl<G: LegacyGenerator> LegacyAdapter<G> {
    /// Wrapped generator
    #[inline]
    #[must_use]
    pub fn wrapped(&self) -> &G {
        &self.wrapped
    }

    fn generate_units(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        let output = self.wrapped.generate(ctx.host_mut())?;

        if ctx.host().mode() != StructuralMode::Editable {
            tracing::debug!("legacy generator left editable mode, restoring");
            ctx.host_mut().set_mode(StructuralMode::Editable);
        }

        match output {
            Some(LegacyOutput::Structured(payload)) => forward(ctx, payload),
            Some(LegacyOutput::PanelCode(fragments)) => {
                if let Some(first) = fragments.into_iter().next() {
                    let contributor = ctx.contributor();
                    ctx.script().add_panel_code(&contributor, vec![first]);
                }
            }
            None => {}
        }
        Ok(())
    }

    fn finalize(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        self.wrapped.glue(ctx.host_mut())
    }
}

fn forward(ctx: &mut StageContext<'_, '_>, payload: ScriptPayload) {
    let contributor = ctx.contributor();
    let script = ctx.script();

    if let Some(lines) = payload.script {
        script.add_panel_code(&contributor, lines);
    }
    if let Some(imports) = payload.imports {
        script.add_imports(&contributor, imports);
    }
    if let Some(utilities) = payload.utilities {
        script.add_utilities(&contributor, utilities);
    }
    if let Some(classes) = payload.register {
        script.register_classes(&contributor, classes);
    }
    if let Some(functions) = payload.register_drivers {
        script.register_driver_functions(&contributor, functions);
    }
    if let Some(props) = payload.register_props {
        for (name, value) in props {
            script.register_property(&contributor, &name, value);
        }
    }
    if let Some(units) = payload.noparent_units {
        for unit in units {
            ctx.disable_auto_parent(unit);
        }
    }
}

impl<G: LegacyGenerator> ComponentType for LegacyAdapter<G> {
    const LEGACY: bool = true;

    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        Ok(Self {
            wrapped: G::create(entry)?,
        })
    }

    fn resolve_controlled_units(&self, entry: &EntryPoint<'_>) -> Vec<UnitName> {
        self.wrapped
            .org_units()
            .unwrap_or_else(|| vec![entry.unit().clone()])
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("LegacyAdapter")
            .hook(Stage::GenerateUnits.name(), Self::generate_units)
            .hook(Stage::Finalize.name(), Self::finalize)
            .build()
    }
}
