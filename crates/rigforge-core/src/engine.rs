//! Stage execution engine
//!
//! [`Generator`] owns one run: it builds the component tree, then drives
//! every component and plugin through the stages in order. Execution is
//! stage-major: every call of stage N finishes before any call of stage N+1.
//!
//! Within a stage, components run in scan order, then plugins in priority
//! order. Around every call the host is checked against the stage's mode;
//! in frozen stages its unit count must not change either. A host operation
//! refused for the active mode is reported the same way.

use crate::auto_parent::AutoParentPlugin;
use crate::catalog::ComponentCatalog;
use crate::component::{downcast, ComponentBehavior, ComponentType};
use crate::config::{GeneratorConfig, UnregisteredUnitPolicy};
use crate::context::{RunState, StageContext};
use crate::diagnostics::DiagnosticKind;
use crate::error::{GenerateError, HostError, HostSnapshot, InvariantViolation};
use crate::host::{HostStructure, ScriptAssembly};
use crate::input::InputHierarchy;
use crate::report::GenerationReport;
use crate::stage::{remaining_stages, validate_transition, RunPhase, Stage};
use crate::tree;
use crate::types::{ComponentId, StructuralMode};

/// One generation run over a host structure
pub struct Generator<'h> {
    run: RunState<'h>,
    behaviors: Vec<Box<dyn ComponentBehavior>>,
}

impl<'h> Generator<'h> {
    /// Create a run
    #[must_use]
    pub fn new(
        catalog: &'h ComponentCatalog,
        host: &'h mut dyn HostStructure,
        script: &'h mut dyn ScriptAssembly,
        config: GeneratorConfig,
    ) -> Self {
        let run = RunState::new(catalog, host, script, config);
        tracing::info!(run_id = %run.run_id, "generator created");
        Self {
            run,
            behaviors: Vec::new(),
        }
    }

    /// Run state (records, ownership, plugins, diagnostics)
    #[inline]
    #[must_use]
    pub fn state(&self) -> &RunState<'h> {
        &self.run
    }

    /// Lifecycle phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.run.phase
    }

    /// Concrete component instance, if `id` holds a `T`
    #[must_use]
    pub fn component<T: ComponentType>(&self, id: ComponentId) -> Option<&T> {
        self.behaviors
            .get(id.index())
            .and_then(|behavior| downcast::<T>(behavior.as_ref()))
    }

    /// Build the component forest and ownership map
    ///
    /// Also requests the auto-parent plugin when a root unit is configured.
    ///
    /// # Errors
    /// Tree construction failures; calling this twice.
    pub fn instantiate_tree(&mut self, input: &InputHierarchy) -> Result<(), GenerateError> {
        if self.run.phase != RunPhase::Created {
            return Err(GenerateError::InvalidInput(
                "component tree already instantiated".to_string(),
            ));
        }

        tree::instantiate(&mut self.run, &mut self.behaviors, input)?;

        if let Some(root) = self.run.config.root_unit.clone() {
            StageContext::new(&mut self.run, None).plugin::<AutoParentPlugin>(root)?;
        }

        self.run.phase = RunPhase::Instantiated;
        Ok(())
    }

    /// Run one stage across all components, then all plugins
    ///
    /// # Errors
    /// - [`GenerateError::StageOrder`] when `stage` is not next
    /// - [`GenerateError::StructuralInvariantViolation`] when a call broke the stage contract
    /// - [`GenerateError::StageFailed`] wrapping a stage method's own error
    pub fn run_stage(&mut self, stage: Stage) -> Result<(), GenerateError> {
        validate_transition(self.run.phase, stage)?;

        let span = tracing::info_span!("stage", stage = stage.name());
        let _enter = span.enter();
        tracing::info!(
            components = self.behaviors.len(),
            plugins = self.run.plugins.len(),
            mode = %stage.mode(),
            "running stage"
        );

        self.run.stage = Some(stage);
        self.run.host.set_mode(stage.mode());
        let expected = self.run.host.snapshot();

        for index in 0..self.behaviors.len() {
            let id = ComponentId::new(index);
            let label = self.run.records[index].label();
            let legacy = self.behaviors[index].is_legacy();

            self.check(stage, &label, expected)?;
            tracing::debug!(component = %label, "stage call");
            let result = {
                let mut ctx = StageContext::new(&mut self.run, Some(id));
                self.behaviors[index].invoke_stage(stage, &mut ctx)
            };
            result.map_err(|source| self.call_failed(stage, &label, expected, source))?;
            self.check(stage, &label, expected)?;

            if stage == Stage::GenerateUnits {
                self.auto_attribute(Some(id), &label, legacy);
            }
        }

        // plugins created during this phase join from the next stage on
        for (label, plugin) in self.run.plugins.snapshot() {
            let label = format!("plugin {label}");

            self.check(stage, &label, expected)?;
            tracing::debug!(plugin = %label, "stage call");
            let result = {
                let mut behavior = plugin
                    .try_borrow_mut()
                    .map_err(|_| GenerateError::component(format!("{label} is already in use")))?;
                let mut ctx = StageContext::new(&mut self.run, None);
                behavior.invoke_stage(stage, &mut ctx)
            };
            result.map_err(|source| self.call_failed(stage, &label, expected, source))?;
            self.check(stage, &label, expected)?;

            if stage == Stage::GenerateUnits {
                self.auto_attribute(None, &label, false);
            }
        }

        self.run.phase = RunPhase::Completed(stage);
        Ok(())
    }

    /// Run every remaining stage in order
    ///
    /// # Errors
    /// The first stage failure.
    pub fn generate(&mut self) -> Result<(), GenerateError> {
        let stages = remaining_stages(self.run.phase);
        if stages.is_empty() {
            return validate_transition(self.run.phase, Stage::first());
        }
        for stage in stages {
            self.run_stage(stage)?;
        }
        tracing::info!(
            run_id = %self.run.run_id,
            diagnostics = self.run.diagnostics.len(),
            "generation finished"
        );
        Ok(())
    }

    /// Build the tree and run every stage
    ///
    /// # Errors
    /// Tree construction or stage failures.
    pub fn run(&mut self, input: &InputHierarchy) -> Result<(), GenerateError> {
        self.instantiate_tree(input)?;
        self.generate()
    }

    /// Summary of the run so far
    #[must_use]
    pub fn report(&self) -> GenerationReport {
        GenerationReport::from_run(&self.run)
    }

    /// End the run, releasing the host and script sink
    #[must_use]
    pub fn finish(self) -> GenerationReport {
        self.report()
    }

    fn check(&self, stage: Stage, entity: &str, expected: HostSnapshot) -> Result<(), GenerateError> {
        let actual = self.run.host.snapshot();
        let counted = stage.mode() == StructuralMode::Frozen;
        let broken = actual.mode != expected.mode || (counted && actual.unit_count != expected.unit_count);
        if broken {
            let violation = InvariantViolation {
                phase: stage.name().to_string(),
                entity: entity.to_string(),
                counted,
                expected,
                actual,
                rejected: None,
            };
            tracing::error!(%violation, "structural invariant violated");
            return Err(violation.into());
        }
        Ok(())
    }

    fn call_failed(
        &self,
        stage: Stage,
        entity: &str,
        expected: HostSnapshot,
        source: GenerateError,
    ) -> GenerateError {
        if let GenerateError::Host(HostError::WrongMode { operation, .. }) = source.root_cause() {
            let violation = InvariantViolation {
                phase: stage.name().to_string(),
                entity: entity.to_string(),
                counted: stage.mode() == StructuralMode::Frozen,
                expected,
                actual: self.run.host.snapshot(),
                rejected: Some(*operation),
            };
            tracing::error!(%violation, "structural invariant violated");
            return violation.into();
        }
        stage_failed(stage, entity, source)
    }

    fn auto_attribute(&mut self, owner: Option<ComponentId>, entity: &str, legacy: bool) {
        let warn = !legacy && self.run.config.unregistered_units == UnregisteredUnitPolicy::Warn;
        for unit in self.run.host.unit_names() {
            if self.run.ownership.contains(unit.as_str()) {
                continue;
            }
            self.run.register_new_unit(owner, unit.clone(), None);
            if warn {
                self.run.diagnostics.push(
                    DiagnosticKind::UnregisteredUnit,
                    format!("{entity} did not register unit '{unit}'"),
                    Some(unit),
                    owner,
                );
            }
        }
    }
}

fn stage_failed(stage: Stage, entity: &str, source: GenerateError) -> GenerateError {
    GenerateError::StageFailed {
        stage,
        entity: entity.to_string(),
        source: Box::new(source),
    }
}
