//! Run state and the context handed to stage methods
//!
//! [`RunState`] holds everything one generation run owns apart from the
//! component instances themselves. [`StageContext`] is the view a component
//! or plugin gets while one of its stage methods runs: the run, plus the
//! identity of the caller (`None` for plugins).

use crate::catalog::ComponentCatalog;
use crate::component::ComponentRecord;
use crate::config::GeneratorConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{GenerateError, HostError};
use crate::host::{HostStructure, ScriptAssembly};
use crate::ownership::OwnershipMap;
use crate::plugin::{self, Plugin, PluginRef, PluginRegistry};
use crate::stage::{RunPhase, Stage};
use crate::types::{ComponentId, UnitName};
use crate::units::UnitGroups;
use std::collections::BTreeSet;

/// Random run identifier: 16 lowercase hex characters
#[must_use]
pub fn random_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..16].to_string()
}

/// State owned by one generation run
pub struct RunState<'h> {
    pub(crate) host: &'h mut dyn HostStructure,
    pub(crate) script: &'h mut dyn ScriptAssembly,
    pub(crate) catalog: &'h ComponentCatalog,
    pub(crate) config: GeneratorConfig,
    pub(crate) run_id: String,
    pub(crate) phase: RunPhase,
    pub(crate) stage: Option<Stage>,
    pub(crate) records: Vec<ComponentRecord>,
    pub(crate) roots: Vec<ComponentId>,
    pub(crate) ownership: OwnershipMap,
    pub(crate) plugins: PluginRegistry,
    pub(crate) noparent: BTreeSet<UnitName>,
    pub(crate) diagnostics: Diagnostics,
}

impl<'h> RunState<'h> {
    pub(crate) fn new(
        catalog: &'h ComponentCatalog,
        host: &'h mut dyn HostStructure,
        script: &'h mut dyn ScriptAssembly,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            host,
            script,
            catalog,
            config,
            run_id: random_run_id(),
            phase: RunPhase::Created,
            stage: None,
            records: Vec::new(),
            roots: Vec::new(),
            ownership: OwnershipMap::new(),
            plugins: PluginRegistry::new(),
            noparent: BTreeSet::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Host structure
    #[inline]
    #[must_use]
    pub fn host(&self) -> &dyn HostStructure {
        &*self.host
    }

    /// Run configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Run identifier
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Lifecycle phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Stage currently running, if any
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    /// Component records in scan order
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[ComponentRecord] {
        &self.records
    }

    /// Record of one component
    #[inline]
    #[must_use]
    pub fn component(&self, id: ComponentId) -> Option<&ComponentRecord> {
        self.records.get(id.index())
    }

    /// Components without a parent component
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[ComponentId] {
        &self.roots
    }

    /// Unit ownership
    #[inline]
    #[must_use]
    pub fn ownership(&self) -> &OwnershipMap {
        &self.ownership
    }

    /// Live plugins
    #[inline]
    #[must_use]
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Units exempt from auto-parenting
    #[inline]
    #[must_use]
    pub fn noparent(&self) -> &BTreeSet<UnitName> {
        &self.noparent
    }

    /// Recorded diagnostics
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Exempt a unit from auto-parenting
    pub fn disable_auto_parent(&mut self, unit: impl Into<UnitName>) {
        self.noparent.insert(unit.into());
    }

    /// Record `owner` for a unit the caller created
    pub(crate) fn register_new_unit(
        &mut self,
        owner: Option<ComponentId>,
        new: UnitName,
        old: Option<UnitName>,
    ) {
        if let Some(record) = owner.and_then(|id| self.records.get_mut(id.index())) {
            record.new_units.insert(new.clone(), old);
        }
        self.ownership.claim(new, owner);
    }
}

/// View of the run given to stage methods and plugin constructors
pub struct StageContext<'r, 'h> {
    pub(crate) run: &'r mut RunState<'h>,
    owner: Option<ComponentId>,
}

impl<'r, 'h> StageContext<'r, 'h> {
    pub(crate) fn new(run: &'r mut RunState<'h>, owner: Option<ComponentId>) -> Self {
        Self { run, owner }
    }

    /// Calling component, `None` for plugins
    #[inline]
    #[must_use]
    pub fn owner(&self) -> Option<ComponentId> {
        self.owner
    }

    /// Read access to the run
    #[inline]
    #[must_use]
    pub fn run(&self) -> &RunState<'h> {
        self.run
    }

    /// Stage currently running
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        self.run.stage
    }

    /// Fail unless `stage` is running
    ///
    /// # Errors
    /// [`GenerateError::WrongStage`]
    pub fn expect_stage(&self, stage: Stage) -> Result<(), GenerateError> {
        if self.run.stage == Some(stage) {
            Ok(())
        } else {
            Err(GenerateError::WrongStage {
                expected: stage,
                actual: self.run.stage,
            })
        }
    }

    /// Host structure
    #[inline]
    #[must_use]
    pub fn host(&self) -> &dyn HostStructure {
        &*self.run.host
    }

    /// Mutable host structure
    #[inline]
    pub fn host_mut(&mut self) -> &mut dyn HostStructure {
        &mut *self.run.host
    }

    /// Script assembly sink
    #[inline]
    pub fn script(&mut self) -> &mut dyn ScriptAssembly {
        &mut *self.run.script
    }

    /// Name contributions to the script sink are filed under
    #[must_use]
    pub fn contributor(&self) -> String {
        match self.record() {
            Ok(record) => record.base_unit.to_string(),
            Err(_) => "plugin".to_string(),
        }
    }

    /// Calling component's record
    ///
    /// # Errors
    /// [`GenerateError::NotAComponent`] from a plugin context.
    pub fn record(&self) -> Result<&ComponentRecord, GenerateError> {
        self.owner
            .and_then(|id| self.run.records.get(id.index()))
            .ok_or(GenerateError::NotAComponent)
    }

    /// Calling component's record, mutably
    ///
    /// # Errors
    /// [`GenerateError::NotAComponent`] from a plugin context.
    pub fn record_mut(&mut self) -> Result<&mut ComponentRecord, GenerateError> {
        self.owner
            .and_then(|id| self.run.records.get_mut(id.index()))
            .ok_or(GenerateError::NotAComponent)
    }

    /// Calling component's unit groups
    ///
    /// # Errors
    /// [`GenerateError::NotAComponent`] from a plugin context.
    pub fn units_mut(&mut self) -> Result<&mut UnitGroups, GenerateError> {
        Ok(&mut self.record_mut()?.units)
    }

    /// Another component's record
    #[inline]
    #[must_use]
    pub fn component(&self, id: ComponentId) -> Option<&ComponentRecord> {
        self.run.records.get(id.index())
    }

    /// Record a non-fatal condition
    pub fn diagnose(&mut self, kind: DiagnosticKind, message: impl Into<String>, unit: Option<UnitName>) {
        self.run.diagnostics.push(kind, message, unit, self.owner);
    }

    /// Claim a unit the caller created, remembering what it was copied from
    pub fn register_new_unit(&mut self, new: impl Into<UnitName>, old: Option<&str>) {
        let owner = self.owner;
        self.run
            .register_new_unit(owner, new.into(), old.map(UnitName::from));
    }

    /// Create and register a unit
    ///
    /// # Errors
    /// Called outside `generate_units`, or the host rejected the name.
    pub fn new_unit(&mut self, name: &str) -> Result<UnitName, GenerateError> {
        self.expect_stage(Stage::GenerateUnits)?;
        let created = self.run.host.create_unit(name)?;
        self.register_new_unit(created.clone(), None);
        Ok(created)
    }

    /// Duplicate `source` as `name` and register the copy
    ///
    /// With `parent`, the copy gets the source's parent.
    ///
    /// # Errors
    /// Called outside `generate_units`, or a host failure.
    pub fn copy_unit(&mut self, source: &str, name: &str, parent: bool) -> Result<UnitName, GenerateError> {
        self.expect_stage(Stage::GenerateUnits)?;
        let created = self.run.host.duplicate_unit(source, name)?;
        if parent {
            let source_parent = self.run.host.parent_of(source);
            self.run
                .host
                .set_parent(created.as_str(), source_parent.as_ref().map(UnitName::as_str))?;
        }
        self.register_new_unit(created.clone(), Some(source));
        Ok(created)
    }

    /// Rename a unit; the caller claims the new name
    ///
    /// A unit the caller created keeps its recorded source, any other
    /// unit is recorded as derived from `old`.
    ///
    /// # Errors
    /// Called outside `generate_units`, or a host failure.
    pub fn rename_unit(&mut self, old: &str, new: &str) -> Result<UnitName, GenerateError> {
        self.expect_stage(Stage::GenerateUnits)?;
        let renamed = self.run.host.rename_unit(old, new)?;

        let previous = self.run.ownership.forget(old).flatten();
        let mut source = Some(UnitName::from(old));
        if let Some(record) = previous.and_then(|id| self.run.records.get_mut(id.index())) {
            if let Some(original) = record.new_units.shift_remove(old) {
                if previous == self.owner {
                    source = original;
                }
            }
        }

        let owner = self.owner;
        self.run.register_new_unit(owner, renamed.clone(), source);
        Ok(renamed)
    }

    /// Set or clear a unit's parent
    ///
    /// # Errors
    /// Host failures (wrong mode, unknown unit, cycle).
    pub fn set_unit_parent(&mut self, unit: &str, parent: Option<&str>) -> Result<(), GenerateError> {
        Ok(self.run.host.set_parent(unit, parent)?)
    }

    /// Parent each unit of `chain` to the one before it
    ///
    /// # Errors
    /// Host failures.
    pub fn parent_unit_chain(&mut self, chain: &[UnitName]) -> Result<(), GenerateError> {
        for pair in chain.windows(2) {
            self.run
                .host
                .set_parent(pair[1].as_str(), Some(pair[0].as_str()))?;
        }
        Ok(())
    }

    /// Set a unit-level property
    ///
    /// # Errors
    /// Host failures.
    pub fn set_unit_property(
        &mut self,
        unit: &str,
        key: &str,
        value: impl Into<serde_json::Value>,
    ) -> Result<(), GenerateError> {
        Ok(self.run.host.set_property(unit, key, value.into())?)
    }

    /// Attach a constraint
    ///
    /// # Errors
    /// Host failures.
    pub fn add_constraint(
        &mut self,
        unit: &str,
        kind: &str,
        target: Option<&str>,
    ) -> Result<(), GenerateError> {
        Ok(self.run.host.add_constraint(unit, kind, target)?)
    }

    /// Fail with a host error for a unit that must exist
    ///
    /// # Errors
    /// [`HostError::UnknownUnit`] when absent.
    pub fn require_unit(&self, unit: &str) -> Result<(), GenerateError> {
        if self.run.host.contains(unit) {
            Ok(())
        } else {
            Err(HostError::UnknownUnit(unit.to_string()).into())
        }
    }

    /// Singleton plugin for `args`, created on first request
    ///
    /// # Errors
    /// Plugin table or constructor failures.
    pub fn plugin<P: Plugin>(&mut self, args: P::Args) -> Result<PluginRef<P>, GenerateError> {
        plugin::get_or_create::<P>(self, args)
    }

    /// Exempt a unit from auto-parenting
    pub fn disable_auto_parent(&mut self, unit: impl Into<UnitName>) {
        self.run.disable_auto_parent(unit);
    }
}
