//! Connected-chain components
//!
//! [`SimpleChain`] builds three parallel chains (original, control,
//! deform) from a connected run of units. [`TweakChain`] embeds it and adds
//! a tweak control at every joint, re-declaring the original chain's
//! rigging to follow the tweaks.

use crate::naming::{deformer_name, strip_org};
use crate::panel::ControlsPanel;
use rigforge_core::prelude::*;

/// `chain.simple`
#[derive(Debug)]
pub struct SimpleChain {
    base: UnitName,
    org: Vec<UnitName>,
    ctrl: Vec<UnitName>,
    deform: Vec<UnitName>,
    segments: Option<u32>,
    panel: Option<String>,
}

impl SimpleChain {
    /// Original chain
    #[inline]
    #[must_use]
    pub fn org(&self) -> &[UnitName] {
        &self.org
    }

    /// Control chain, once generated
    #[inline]
    #[must_use]
    pub fn ctrl(&self) -> &[UnitName] {
        &self.ctrl
    }

    /// Deform chain, once generated
    #[inline]
    #[must_use]
    pub fn deform(&self) -> &[UnitName] {
        &self.deform
    }

    fn initialize(&mut self, _ctx: &mut StageContext<'_, '_>) -> StageResult {
        if self.org.len() <= 1 {
            return Err(GenerateError::component(format!(
                "unit '{}': input to chain component must be a chain of 2 or more units",
                strip_org(self.base.as_str())
            )));
        }
        Ok(())
    }

    fn make_control_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        self.ctrl = self
            .org
            .iter()
            .map(|org| ctx.copy_unit(org.as_str(), strip_org(org.as_str()), true))
            .collect::<Result<_, _>>()?;
        ctx.units_mut()?.nested_mut("ctrl")?.set("main", self.ctrl.clone())?;
        Ok(())
    }

    fn make_deform_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        self.deform = self
            .org
            .iter()
            .map(|org| ctx.copy_unit(org.as_str(), &deformer_name(strip_org(org.as_str())), true))
            .collect::<Result<_, _>>()?;
        ctx.units_mut()?.set("deform", self.deform.clone())?;
        Ok(())
    }

    fn parent_control_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        ctx.parent_unit_chain(&self.ctrl)
    }

    fn parent_deform_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        ctx.parent_unit_chain(&self.deform)
    }

    fn configure_control_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        for (org, ctrl) in self.org.iter().zip(&self.ctrl) {
            ctx.set_unit_property(ctrl.as_str(), "source", org.as_str())?;
            if let Some(mode) = ctx.host().property(org.as_str(), "rotation_mode") {
                ctx.set_unit_property(ctrl.as_str(), "rotation_mode", mode)?;
            }
        }

        if let Some(panel) = &self.panel {
            let contributor = ctx.contributor();
            let names: Vec<String> = self.ctrl.iter().map(|c| format!("{:?}", c.as_str())).collect();
            let panel = ControlsPanel::request(ctx, panel)?;
            panel
                .borrow_mut()
                .add_row(contributor, format!("layout.label(text='chain: {}')", names.join(", ")));
        }
        Ok(())
    }

    fn configure_deform_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        if let Some(segments) = self.segments {
            for deform in &self.deform {
                ctx.set_unit_property(deform.as_str(), "bbone_segments", segments)?;
            }
        }
        Ok(())
    }

    fn rig_org_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        for (org, ctrl) in self.org.iter().zip(&self.ctrl) {
            ctx.add_constraint(org.as_str(), "COPY_TRANSFORMS", Some(ctrl.as_str()))?;
        }
        Ok(())
    }

    fn rig_deform_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        for (org, deform) in self.org.iter().zip(&self.deform) {
            ctx.add_constraint(deform.as_str(), "COPY_TRANSFORMS", Some(org.as_str()))?;
        }
        Ok(())
    }

    fn make_control_widgets(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        for ctrl in &self.ctrl {
            ctx.set_unit_property(ctrl.as_str(), "widget", "bone")?;
        }
        Ok(())
    }
}

impl ComponentType for SimpleChain {
    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        Ok(Self {
            base: entry.unit().clone(),
            org: entry.connected_chain(),
            ctrl: Vec::new(),
            deform: Vec::new(),
            segments: entry.param("bbone_segments")?,
            panel: entry.param("panel")?,
        })
    }

    fn resolve_controlled_units(&self, _entry: &EntryPoint<'_>) -> Vec<UnitName> {
        self.org.clone()
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("SimpleChain")
            .hook("initialize", Self::initialize)
            .stage("generate_units", "make_control_chain", Self::make_control_chain)
            .stage("generate_units", "make_deform_chain", Self::make_deform_chain)
            .stage("parent_units", "parent_control_chain", Self::parent_control_chain)
            .stage("parent_units", "parent_deform_chain", Self::parent_deform_chain)
            .stage("configure_units", "configure_control_chain", Self::configure_control_chain)
            .stage("configure_units", "configure_deform_chain", Self::configure_deform_chain)
            .stage("rig_units", "rig_org_chain", Self::rig_org_chain)
            .stage("rig_units", "rig_deform_chain", Self::rig_deform_chain)
            .stage("generate_visuals", "make_control_widgets", Self::make_control_widgets)
            .build()
    }
}

/// `chain.tweak`
#[derive(Debug)]
pub struct TweakChain {
    chain: SimpleChain,
    tweak: Vec<UnitName>,
}

fn simple(this: &mut TweakChain) -> &mut SimpleChain {
    &mut this.chain
}

impl TweakChain {
    /// Embedded simple chain
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &SimpleChain {
        &self.chain
    }

    /// Tweak controls, one per joint plus the tip
    #[inline]
    #[must_use]
    pub fn tweak(&self) -> &[UnitName] {
        &self.tweak
    }

    fn make_tweak_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        let org = &self.chain.org;
        self.tweak = org
            .iter()
            .chain(org.last())
            .map(|org| ctx.copy_unit(org.as_str(), &format!("tweak_{}", strip_org(org.as_str())), false))
            .collect::<Result<_, _>>()?;
        ctx.units_mut()?.nested_mut("ctrl")?.set("tweak", self.tweak.clone())?;
        Ok(())
    }

    fn parent_tweak_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        let ctrl = &self.chain.ctrl;
        for (tweak, parent) in self.tweak.iter().zip(ctrl.iter().chain(ctrl.last())) {
            ctx.set_unit_parent(tweak.as_str(), Some(parent.as_str()))?;
        }
        Ok(())
    }

    fn configure_tweak_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        let tip = self.chain.org.len();
        for (i, tweak) in self.tweak.iter().enumerate() {
            let lock = if i == tip {
                serde_json::json!([true, true, true])
            } else {
                serde_json::json!([true, false, true])
            };
            ctx.set_unit_property(tweak.as_str(), "lock_rotation", lock)?;
        }
        Ok(())
    }

    fn rig_org_chain(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        for (i, org) in self.chain.org.iter().enumerate() {
            let (Some(tweak), Some(next)) = (self.tweak.get(i), self.tweak.get(i + 1)) else {
                continue;
            };
            ctx.add_constraint(org.as_str(), "COPY_TRANSFORMS", Some(tweak.as_str()))?;
            ctx.add_constraint(org.as_str(), "DAMPED_TRACK", Some(next.as_str()))?;
            ctx.add_constraint(org.as_str(), "STRETCH_TO", Some(next.as_str()))?;
        }
        Ok(())
    }

    fn make_tweak_widgets(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        for tweak in &self.tweak {
            ctx.set_unit_property(tweak.as_str(), "widget", "sphere")?;
        }
        Ok(())
    }
}

impl ComponentType for TweakChain {
    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        Ok(Self {
            chain: SimpleChain::create(entry)?,
            tweak: Vec::new(),
        })
    }

    fn resolve_controlled_units(&self, entry: &EntryPoint<'_>) -> Vec<UnitName> {
        self.chain.resolve_controlled_units(entry)
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("TweakChain")
            .inherit(&SimpleChain::define_stages()?, simple)
            .stage("generate_units", "make_tweak_chain", Self::make_tweak_chain)
            .stage("parent_units", "parent_tweak_chain", Self::parent_tweak_chain)
            .stage("configure_units", "configure_tweak_chain", Self::configure_tweak_chain)
            .redeclare("rig_org_chain", Self::rig_org_chain)
            .stage("generate_visuals", "make_tweak_widgets", Self::make_tweak_widgets)
            .build()
    }
}
