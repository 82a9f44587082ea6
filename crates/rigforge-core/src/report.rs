//! Final run summary

use crate::context::RunState;
use crate::diagnostics::Diagnostic;
use crate::stage::RunPhase;
use crate::types::{ComponentId, UnitName};
use crate::units::UnitGroups;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

/// Summary of one component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSummary {
    /// Component id
    pub id: ComponentId,
    /// Registered type name
    pub type_name: String,
    /// Entry point unit
    pub base_unit: UnitName,
    /// Parent component
    pub parent: Option<ComponentId>,
    /// Child components
    pub children: Vec<ComponentId>,
    /// Claimed units
    pub org_units: Vec<UnitName>,
    /// Units created by the component
    pub new_units: Vec<UnitName>,
    /// Unclaimed descendant units directly under it
    pub child_units: Vec<UnitName>,
    /// Unit groups at the end of the run
    pub units: UnitGroups,
}

/// Serializable summary of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    /// Run identifier
    pub run_id: String,
    /// Where the run ended
    pub phase: RunPhase,
    /// Components in scan order
    pub components: Vec<ComponentSummary>,
    /// Forest roots
    pub roots: Vec<ComponentId>,
    /// Unit → owning component
    pub ownership: BTreeMap<UnitName, Option<ComponentId>>,
    /// Units exempt from auto-parenting
    pub noparent: BTreeSet<UnitName>,
    /// Plugins in scheduling order
    pub plugins: Vec<String>,
    /// Non-fatal conditions
    pub diagnostics: Vec<Diagnostic>,
}

impl GenerationReport {
    pub(crate) fn from_run(run: &RunState<'_>) -> Self {
        let components = run
            .components()
            .iter()
            .map(|record| ComponentSummary {
                id: record.id,
                type_name: record.type_name.clone(),
                base_unit: record.base_unit.clone(),
                parent: record.parent,
                children: record.children.clone(),
                org_units: record.org_units.clone(),
                new_units: record.new_units.keys().cloned().collect(),
                child_units: record.child_units.iter().cloned().collect(),
                units: record.units.clone(),
            })
            .collect();

        Self {
            run_id: run.run_id().to_string(),
            phase: run.phase(),
            components,
            roots: run.roots().to_vec(),
            ownership: run
                .ownership()
                .iter()
                .map(|(unit, owner)| (unit.clone(), owner))
                .collect(),
            noparent: run.noparent().clone(),
            plugins: run.plugins().labels(),
            diagnostics: run.diagnostics().entries().to_vec(),
        }
    }

    /// Owner of a unit, `None` when unowned or unknown
    #[must_use]
    pub fn owner_of(&self, unit: &str) -> Option<ComponentId> {
        self.ownership.get(unit).copied().flatten()
    }

    /// Summary of one component
    #[must_use]
    pub fn component(&self, id: ComponentId) -> Option<&ComponentSummary> {
        self.components.get(id.index())
    }

    /// Component whose entry point is `unit`
    #[must_use]
    pub fn component_at(&self, unit: &str) -> Option<&ComponentSummary> {
        self.components.iter().find(|c| c.base_unit == unit)
    }
}

impl Display for GenerationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {} ({})", self.run_id, self.phase)?;
        writeln!(f, "components: {}", self.components.len())?;
        for c in &self.components {
            let parent = c.parent.map_or_else(|| "-".to_string(), |p| p.to_string());
            writeln!(
                f,
                "  {} {} at {} (parent {}, {} claimed, {} created, {} absorbed)",
                c.id,
                c.type_name,
                c.base_unit,
                parent,
                c.org_units.len(),
                c.new_units.len(),
                c.child_units.len()
            )?;
        }
        if !self.plugins.is_empty() {
            writeln!(f, "plugins: {}", self.plugins.join(", "))?;
        }
        writeln!(f, "units: {}", self.ownership.len())?;
        for d in &self.diagnostics {
            writeln!(f, "warning: {d}")?;
        }
        Ok(())
    }
}
