//! Single-call finger generator, run through the legacy adapter

use crate::naming::{deformer_name, split_chain_name, strip_org};
use rigforge_core::prelude::*;
use rigforge_core::{LegacyGenerator, LegacyOutput};

/// `limbs.finger`: a master control driving a control chain
#[derive(Debug)]
pub struct FingerGenerator {
    org: Vec<UnitName>,
    curve_property: String,
    master: Option<UnitName>,
}

impl FingerGenerator {
    /// Master control, once generated
    #[must_use]
    pub fn master(&self) -> Option<&UnitName> {
        self.master.as_ref()
    }
}

impl LegacyGenerator for FingerGenerator {
    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        let org = entry.connected_chain();
        if org.len() <= 1 {
            return Err(GenerateError::component(format!(
                "unit '{}': finger needs a chain of 2 or more units",
                strip_org(entry.unit().as_str())
            )));
        }
        Ok(Self {
            org,
            curve_property: entry.param_or("curve_property", "finger_curve".to_string())?,
            master: None,
        })
    }

    fn org_units(&self) -> Option<Vec<UnitName>> {
        Some(self.org.clone())
    }

    fn generate(&mut self, host: &mut dyn HostStructure) -> Result<Option<LegacyOutput>, GenerateError> {
        let first = self.org[0].as_str();
        let (base, side) = split_chain_name(strip_org(first));
        let master = host.duplicate_unit(first, &format!("{base}_master{side}"))?;

        let mut controls = Vec::with_capacity(self.org.len());
        for org in &self.org {
            let ctrl = host.duplicate_unit(org.as_str(), strip_org(org.as_str()))?;
            let parent = controls.last().unwrap_or(&master);
            host.set_parent(ctrl.as_str(), Some(parent.as_str()))?;

            let deform = host.duplicate_unit(org.as_str(), &deformer_name(strip_org(org.as_str())))?;
            host.set_parent(deform.as_str(), Some(org.as_str()))?;
            controls.push(ctrl);
        }

        let listed: Vec<String> = controls
            .iter()
            .chain(std::iter::once(&master))
            .map(|c| format!("'{c}'"))
            .collect();
        let script = format!(
            "controls = [{}]\nif is_selected(controls):\n    layout.prop(pose_bones['{master}'], '[\"{}\"]', text='Curvature', slider=True)",
            listed.join(", "),
            self.curve_property
        );

        self.master = Some(master);
        Ok(Some(LegacyOutput::PanelCode(vec![script])))
    }

    fn glue(&mut self, host: &mut dyn HostStructure) -> StageResult {
        if let Some(master) = &self.master {
            host.set_property(master.as_str(), &self.curve_property, serde_json::json!(0.0))?;
        }
        Ok(())
    }
}
