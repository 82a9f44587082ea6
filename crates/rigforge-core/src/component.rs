//! Component capability contract
//!
//! A component type is any `T: ComponentType`. The catalog erases it behind
//! [`ComponentBehavior`] so the engine can hold a heterogeneous list; the
//! run-owned data every component carries (tree links, claimed units, unit
//! groups) lives in a [`ComponentRecord`] owned by the run.

use crate::context::StageContext;
use crate::error::{DefinitionError, GenerateError, StageResult};
use crate::host::HostStructure;
use crate::input::InputHierarchy;
use crate::registry::StageTable;
use crate::stage::Stage;
use crate::types::{ComponentId, Params, UnitName};
use crate::units::UnitGroups;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeSet;
use std::rc::Rc;

/// What a component constructor sees of its entry point
#[derive(Clone, Copy)]
pub struct EntryPoint<'a> {
    unit: &'a UnitName,
    type_name: &'a str,
    params: &'a Params,
    host: &'a dyn HostStructure,
    input: &'a InputHierarchy,
}

impl<'a> EntryPoint<'a> {
    /// Describe an entry point
    #[must_use]
    pub fn new(
        unit: &'a UnitName,
        type_name: &'a str,
        params: &'a Params,
        host: &'a dyn HostStructure,
        input: &'a InputHierarchy,
    ) -> Self {
        Self {
            unit,
            type_name,
            params,
            host,
            input,
        }
    }

    /// Entry unit name
    #[inline]
    #[must_use]
    pub fn unit(&self) -> &'a UnitName {
        self.unit
    }

    /// Declared (normalised) type name
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'a str {
        self.type_name
    }

    /// Raw parameter map
    #[inline]
    #[must_use]
    pub fn params(&self) -> &'a Params {
        self.params
    }

    /// Typed parameter, `None` when absent
    ///
    /// # Errors
    /// [`GenerateError::InvalidParameter`] when the value does not deserialize as `T`.
    pub fn param<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, GenerateError> {
        let Some(value) = self.params.get(key) else {
            return Ok(None);
        };
        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| GenerateError::InvalidParameter {
                unit: self.unit.clone(),
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    /// Typed parameter with a fallback
    ///
    /// # Errors
    /// Same as [`param`](Self::param).
    pub fn param_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, GenerateError> {
        Ok(self.param(key)?.unwrap_or(default))
    }

    /// Host structure, read-only
    #[inline]
    #[must_use]
    pub fn host(&self) -> &'a dyn HostStructure {
        self.host
    }

    /// Input hierarchy the run was built from
    #[inline]
    #[must_use]
    pub fn input(&self) -> &'a InputHierarchy {
        self.input
    }

    /// Entry unit followed by its connected chain
    #[must_use]
    pub fn connected_chain(&self) -> Vec<UnitName> {
        let mut chain = vec![self.unit.clone()];
        chain.extend(self.input.connected_chain(self.unit.as_str()));
        chain
    }
}

/// A component generator type
///
/// Implementors are instantiated once per tagged entry point and driven
/// through the stage sequence by their [`StageTable`].
pub trait ComponentType: Sized + 'static {
    /// Marks adapters around legacy generators (no unregistered-unit warnings)
    const LEGACY: bool = false;

    /// Construct at an entry point
    ///
    /// # Errors
    /// Construction failures abort tree building.
    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError>;

    /// Units this instance claims, called once after construction
    fn resolve_controlled_units(&self, entry: &EntryPoint<'_>) -> Vec<UnitName> {
        vec![entry.unit().clone()]
    }

    /// Stage table for this type, built once at registration
    ///
    /// # Errors
    /// Merge conflicts in the table definition.
    fn define_stages() -> Result<StageTable<Self>, DefinitionError>;
}

/// Type-erased component instance driven by the engine
pub trait ComponentBehavior {
    /// Registered type name
    fn type_name(&self) -> &str;

    /// Whether this wraps a legacy generator
    fn is_legacy(&self) -> bool;

    /// Run one stage
    ///
    /// # Errors
    /// Whatever the stage methods return.
    fn invoke_stage(&mut self, stage: Stage, ctx: &mut StageContext<'_, '_>) -> StageResult;

    /// Downcasting support
    fn as_any(&self) -> &dyn Any;
}

/// A [`ComponentType`] paired with its shared stage table
pub struct StagedComponent<T> {
    inner: T,
    table: Rc<StageTable<T>>,
    type_name: String,
}

impl<T: ComponentType> StagedComponent<T> {
    /// Wrap an instance
    #[must_use]
    pub fn new(inner: T, table: Rc<StageTable<T>>, type_name: impl Into<String>) -> Self {
        Self {
            inner,
            table,
            type_name: type_name.into(),
        }
    }

    /// Wrapped instance
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: ComponentType> ComponentBehavior for StagedComponent<T> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn is_legacy(&self) -> bool {
        T::LEGACY
    }

    fn invoke_stage(&mut self, stage: Stage, ctx: &mut StageContext<'_, '_>) -> StageResult {
        self.table.invoke(&mut self.inner, stage.name(), ctx)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Downcast a behavior to the concrete component type
#[must_use]
pub fn downcast<T: ComponentType>(behavior: &dyn ComponentBehavior) -> Option<&T> {
    behavior
        .as_any()
        .downcast_ref::<StagedComponent<T>>()
        .map(StagedComponent::inner)
}

/// Run-owned data for one component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentRecord {
    /// Position in the run's component list
    pub id: ComponentId,
    /// Registered type name
    pub type_name: String,
    /// Entry point unit
    pub base_unit: UnitName,
    /// Claimed units, in the order the component returned them
    pub org_units: Vec<UnitName>,
    /// Parent component
    pub parent: Option<ComponentId>,
    /// Child components in traversal order
    pub children: Vec<ComponentId>,
    /// Unclaimed descendant units directly under this component
    pub child_units: BTreeSet<UnitName>,
    /// Units created by this component, with the unit each was copied from
    pub new_units: IndexMap<UnitName, Option<UnitName>>,
    /// Stage-scoped output groupings
    pub units: UnitGroups,
    /// Entry point parameters
    #[serde(skip_serializing_if = "Params::is_empty")]
    pub params: Params,
}

impl ComponentRecord {
    /// Create a record with the `org` group seeded from the claimed units
    #[must_use]
    pub fn new(
        id: ComponentId,
        type_name: impl Into<String>,
        base_unit: UnitName,
        org_units: Vec<UnitName>,
        params: Params,
    ) -> Self {
        let mut units = UnitGroups::new();
        // "org" is a valid key
        let _ = units.set("org", org_units.clone());
        Self {
            id,
            type_name: type_name.into(),
            base_unit,
            org_units,
            parent: None,
            children: Vec::new(),
            child_units: BTreeSet::new(),
            new_units: IndexMap::new(),
            units,
            params,
        }
    }

    /// Display label used in logs and errors
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {} ({})", self.type_name, self.id, self.base_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_seeds_org_group() {
        let record = ComponentRecord::new(
            ComponentId::new(0),
            "chain.simple",
            UnitName::from("arm"),
            vec![UnitName::from("arm"), UnitName::from("forearm")],
            Params::new(),
        );
        assert_eq!(record.units.list("org").len(), 2);
        assert_eq!(record.label(), "chain.simple #0 (arm)");
        assert!(record.parent.is_none());
    }
}
