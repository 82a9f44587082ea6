//! Tree builder and ownership resolver
//!
//! Two depth-first passes over the input hierarchy, siblings sorted by name:
//!
//! 1. Instantiate one component per tagged entry point and claim the units
//!    it controls (conflicts are reported, last writer wins).
//! 2. Link components into a forest and hand every unclaimed unit to the
//!    nearest enclosing component.
//!
//! Components are linked only at their entry points, so the forest mirrors
//! the tagged nodes of the input and cannot contain a cycle.

use crate::component::{ComponentBehavior, ComponentRecord, EntryPoint};
use crate::context::RunState;
use crate::diagnostics::DiagnosticKind;
use crate::error::{GenerateError, HostSnapshot, InvariantViolation};
use crate::input::{InputHierarchy, InputUnit};
use crate::types::{ComponentId, StructuralMode, UnitName};
use std::collections::{HashMap, HashSet};

/// Phase name used in invariant violations raised while building the tree
pub const INSTANTIATE_PHASE: &str = "instantiate_tree";

/// Build the component forest for `input`
///
/// Appends component instances to `behaviors` and fills the run's records,
/// roots and ownership map.
///
/// # Errors
/// - [`GenerateError::InvalidInput`] for malformed hierarchies
/// - [`GenerateError::ComponentTypeNotFound`] under the strict policy
/// - constructor failures, and invariant violations if a constructor
///   changes the host
pub fn instantiate(
    run: &mut RunState<'_>,
    behaviors: &mut Vec<Box<dyn ComponentBehavior>>,
    input: &InputHierarchy,
) -> Result<(), GenerateError> {
    input.validate()?;

    run.host.set_mode(StructuralMode::Frozen);
    let expected = run.host.snapshot();

    let entry_points = create_components(run, behaviors, input, expected)?;

    let mut linked = HashSet::new();
    for root in input.sorted_roots() {
        link_tree(run, &entry_points, &mut linked, root, None);
    }

    tracing::info!(
        components = run.records.len(),
        roots = run.roots.len(),
        units = run.ownership.len(),
        "component tree built"
    );
    Ok(())
}

fn create_components(
    run: &mut RunState<'_>,
    behaviors: &mut Vec<Box<dyn ComponentBehavior>>,
    input: &InputHierarchy,
    expected: HostSnapshot,
) -> Result<HashMap<UnitName, ComponentId>, GenerateError> {
    let catalog = run.catalog;
    let mut entry_points = HashMap::new();

    for unit in input.walk() {
        let Some(tag) = unit.component_tag() else {
            continue;
        };

        let class = match catalog.find_component_class(&tag) {
            Ok(class) => class,
            Err(err) if run.config.halt_on_missing() => return Err(err.at_entry_point(&unit.name)),
            Err(err) => {
                let err = err.at_entry_point(&unit.name);
                run.diagnostics.push(
                    DiagnosticKind::MissingComponentType,
                    err.to_string(),
                    Some(unit.name.clone()),
                    None,
                );
                continue;
            }
        };

        let instance = {
            let entry = EntryPoint::new(&unit.name, class.name(), &unit.params, &*run.host, input);
            class.instantiate(&entry).map_err(|err| {
                GenerateError::component(format!(
                    "failed to create {} at '{}': {err}",
                    class.name(),
                    unit.name
                ))
            })?
        };

        let actual = run.host.snapshot();
        if actual != expected {
            return Err(InvariantViolation {
                phase: INSTANTIATE_PHASE.to_string(),
                entity: format!("{} ({})", class.name(), unit.name),
                counted: true,
                expected,
                actual,
                rejected: None,
            }
            .into());
        }

        let id = ComponentId::new(run.records.len());
        let record = ComponentRecord::new(
            id,
            class.name(),
            unit.name.clone(),
            instance.controlled_units,
            unit.params.clone(),
        );
        tracing::debug!(component = %record.label(), "component created");

        for claimed in &record.org_units {
            if let Some(Some(previous)) = run.ownership.claim(claimed.clone(), Some(id)) {
                if previous != id {
                    let message = format!(
                        "unit '{claimed}' already claimed by {}, now claimed by {}",
                        describe(run, previous),
                        record.label()
                    );
                    run.diagnostics.push(
                        DiagnosticKind::OwnershipConflict,
                        message,
                        Some(claimed.clone()),
                        Some(id),
                    );
                }
            }
        }

        run.records.push(record);
        behaviors.push(instance.behavior);
        entry_points.insert(unit.name.clone(), id);
    }

    Ok(entry_points)
}

fn describe(run: &RunState<'_>, id: ComponentId) -> String {
    run.records
        .get(id.index())
        .map_or_else(|| id.to_string(), ComponentRecord::label)
}

fn link_tree(
    run: &mut RunState<'_>,
    entry_points: &HashMap<UnitName, ComponentId>,
    linked: &mut HashSet<ComponentId>,
    unit: &InputUnit,
    mut current: Option<ComponentId>,
) {
    if let Some(&id) = entry_points.get(&unit.name) {
        match current {
            Some(parent) => run.records[parent.index()].children.push(id),
            None => run.roots.push(id),
        }
        run.records[id.index()].parent = current;
        if !run.ownership.contains(unit.name.as_str()) {
            run.ownership.claim(unit.name.clone(), Some(id));
        }
        linked.insert(id);
        current = Some(id);
    } else if let Some(entry) = run.ownership.entry(unit.name.as_str()) {
        // claimed unit inside an already linked component's subtree
        if let Some(owner) = entry.filter(|owner| linked.contains(owner)) {
            current = Some(owner);
        }
    } else {
        run.ownership.claim(unit.name.clone(), current);
        if let Some(owner) = current {
            run.records[owner.index()].child_units.insert(unit.name.clone());
        }
    }

    for child in unit.sorted_children() {
        link_tree(run, entry_points, linked, child, current);
    }
}
