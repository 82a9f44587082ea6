//! Single-unit copy
//!
//! Duplicates its entry unit as a control and a deformer, and makes the
//! original follow the control.

use crate::naming::{deformer_name, strip_org};
use crate::panel::ControlsPanel;
use rigforge_core::prelude::*;

/// `basic.copy`
#[derive(Debug)]
pub struct BasicCopy {
    org: UnitName,
    make_control: bool,
    make_deform: bool,
    panel: Option<String>,
    control: Option<UnitName>,
    deform: Option<UnitName>,
}

impl BasicCopy {
    /// Control unit, once generated
    #[must_use]
    pub fn control(&self) -> Option<&UnitName> {
        self.control.as_ref()
    }

    fn make_control(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        if self.make_control {
            let control = ctx.copy_unit(self.org.as_str(), strip_org(self.org.as_str()), true)?;
            ctx.units_mut()?.set("ctrl", control.clone())?;
            self.control = Some(control);
        }
        Ok(())
    }

    fn make_deform(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        if self.make_deform {
            let name = deformer_name(strip_org(self.org.as_str()));
            let deform = ctx.copy_unit(self.org.as_str(), &name, false)?;
            ctx.units_mut()?.set("deform", deform.clone())?;
            self.deform = Some(deform);
        }
        Ok(())
    }

    fn parent_deform(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        if let Some(deform) = &self.deform {
            ctx.set_unit_parent(deform.as_str(), Some(self.org.as_str()))?;
        }
        Ok(())
    }

    fn configure_control(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        let Some(control) = &self.control else {
            return Ok(());
        };
        ctx.set_unit_property(control.as_str(), "source", self.org.as_str())?;
        if let Some(panel) = &self.panel {
            let contributor = ctx.contributor();
            let panel = ControlsPanel::request(ctx, panel)?;
            panel
                .borrow_mut()
                .add_row(contributor, format!("layout.prop(bones[{:?}], 'location')", control.as_str()));
        }
        Ok(())
    }

    fn rig(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        if let Some(control) = &self.control {
            ctx.add_constraint(self.org.as_str(), "COPY_TRANSFORMS", Some(control.as_str()))?;
        }
        if let Some(deform) = &self.deform {
            ctx.add_constraint(deform.as_str(), "COPY_TRANSFORMS", Some(self.org.as_str()))?;
        }
        Ok(())
    }

    fn make_widget(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        if let Some(control) = &self.control {
            ctx.set_unit_property(control.as_str(), "widget", "circle")?;
        }
        Ok(())
    }
}

impl ComponentType for BasicCopy {
    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        Ok(Self {
            org: entry.unit().clone(),
            make_control: entry.param_or("make_control", true)?,
            make_deform: entry.param_or("make_deform", true)?,
            panel: entry.param("panel")?,
            control: None,
            deform: None,
        })
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("BasicCopy")
            .stage("generate_units", "make_control", Self::make_control)
            .stage("generate_units", "make_deform", Self::make_deform)
            .stage("parent_units", "parent_deform", Self::parent_deform)
            .stage("configure_units", "configure_control", Self::configure_control)
            .hook("rig_units", Self::rig)
            .stage("generate_visuals", "make_widget", Self::make_widget)
            .build()
    }
}
