//! Built-in root auto-parenting
//!
//! Requested by the engine when a root unit is configured. Runs after every
//! other plugin: creates the root during `generate_units`, then parents every
//! parentless unit to it during `parent_units`, except units exempted with
//! `disable_auto_parent`.

use crate::context::StageContext;
use crate::error::{DefinitionError, GenerateError, StageResult};
use crate::plugin::Plugin;
use crate::registry::{StageTable, StageTableBuilder};
use crate::stage::Stage;
use crate::types::UnitName;

/// Root unit creation and orphan parenting
#[derive(Debug)]
pub struct AutoParentPlugin {
    root: UnitName,
}

impl AutoParentPlugin {
    /// Root unit name (after creation, the name the host assigned)
    #[inline]
    #[must_use]
    pub fn root(&self) -> &UnitName {
        &self.root
    }

    fn create_root(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        if !ctx.host().contains(self.root.as_str()) {
            self.root = ctx.new_unit(self.root.as_str())?;
        }
        ctx.disable_auto_parent(self.root.clone());
        Ok(())
    }

    fn parent_orphans(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        let orphans: Vec<UnitName> = ctx
            .host()
            .unit_names()
            .into_iter()
            .filter(|unit| ctx.host().parent_of(unit.as_str()).is_none())
            .filter(|unit| !ctx.run().noparent().contains(unit))
            .collect();

        for unit in &orphans {
            ctx.set_unit_parent(unit.as_str(), Some(self.root.as_str()))?;
        }
        tracing::debug!(root = %self.root, parented = orphans.len(), "parented orphans to root");
        Ok(())
    }
}

impl Plugin for AutoParentPlugin {
    type Args = String;

    const NAME: &'static str = "auto_parent";
    const PRIORITY: i32 = i32::MIN;

    fn create(args: &String, _ctx: &mut StageContext<'_, '_>) -> Result<Self, GenerateError> {
        if args.is_empty() {
            return Err(GenerateError::InvalidInput("empty root unit name".to_string()));
        }
        Ok(Self {
            root: UnitName::from(args.as_str()),
        })
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("AutoParentPlugin")
            .hook(Stage::GenerateUnits.name(), Self::create_root)
            .hook(Stage::ParentUnits.name(), Self::parent_orphans)
            .build()
    }
}
