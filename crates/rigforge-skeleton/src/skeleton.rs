//! In-memory host structure
//!
//! Units are kept in insertion order. Names collide the way 3D hosts
//! resolve them: a taken name gets the next free `.NNN` suffix.

use indexmap::IndexMap;
use rigforge_core::{HostError, HostStructure, InputHierarchy, StructuralMode, UnitName};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Constraint attached to a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constraint {
    /// Constraint kind, e.g. `copy_transforms`
    pub kind: String,
    /// Target unit, if the constraint has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<UnitName>,
}

/// Data stored per unit
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnitData {
    /// Parent unit
    pub parent: Option<UnitName>,
    /// Unit-level properties
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    /// Attached constraints
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
}

/// Reference [`HostStructure`]
#[derive(Debug, Clone, Serialize)]
pub struct Skeleton {
    mode: StructuralMode,
    #[serde(skip)]
    enforce_modes: bool,
    units: IndexMap<UnitName, UnitData>,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new()
    }
}

impl Skeleton {
    /// Create an empty skeleton in editable mode
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: StructuralMode::Editable,
            enforce_modes: true,
            units: IndexMap::new(),
        }
    }

    /// Create units mirroring an input hierarchy (parents before children)
    #[must_use]
    pub fn from_hierarchy(input: &InputHierarchy) -> Self {
        let mut skeleton = Self::new();
        let parents = input.parents();
        for unit in input.walk() {
            skeleton.units.insert(
                unit.name.clone(),
                UnitData {
                    parent: parents.get(&unit.name).map(|p| (*p).clone()),
                    ..UnitData::default()
                },
            );
        }
        skeleton
    }

    /// Enable or disable mode checks on mutating operations
    #[inline]
    #[must_use]
    pub fn with_enforce_modes(mut self, enforce: bool) -> Self {
        self.enforce_modes = enforce;
        self
    }

    /// Check if mode checks are enabled
    #[inline]
    #[must_use]
    pub fn enforces_modes(&self) -> bool {
        self.enforce_modes
    }

    /// Data of one unit
    #[inline]
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&UnitData> {
        self.units.get(name)
    }

    /// Iterate units in insertion order
    pub fn units(&self) -> impl Iterator<Item = (&UnitName, &UnitData)> {
        self.units.iter()
    }

    /// Units without a parent
    #[must_use]
    pub fn roots(&self) -> Vec<UnitName> {
        self.units
            .iter()
            .filter(|(_, data)| data.parent.is_none())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Constraints on a unit
    #[must_use]
    pub fn constraints(&self, name: &str) -> &[Constraint] {
        self.units
            .get(name)
            .map(|data| data.constraints.as_slice())
            .unwrap_or(&[])
    }

    /// First free name for `name`
    #[must_use]
    pub fn unique_name(&self, name: &str) -> UnitName {
        if !self.units.contains_key(name) {
            return UnitName::from(name);
        }
        let base = strip_number_suffix(name);
        (1..)
            .map(|n| format!("{base}.{n:03}"))
            .find(|candidate| !self.units.contains_key(candidate.as_str()))
            .map(UnitName::from)
            .unwrap_or_else(|| UnitName::from(name))
    }

    fn require_mode(&self, operation: &'static str, mode: StructuralMode) -> Result<(), HostError> {
        if self.enforce_modes && self.mode != mode {
            return Err(HostError::WrongMode {
                operation,
                mode: self.mode,
            });
        }
        Ok(())
    }

    fn require_unit(&self, name: &str) -> Result<(), HostError> {
        if self.units.contains_key(name) {
            Ok(())
        } else {
            Err(HostError::UnknownUnit(name.to_string()))
        }
    }

    fn check_name(name: &str) -> Result<(), HostError> {
        if name.trim().is_empty() {
            return Err(HostError::InvalidName(name.to_string()));
        }
        Ok(())
    }
}

fn strip_number_suffix(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((base, digits))
            if !base.is_empty() && digits.len() == 3 && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    }
}

impl HostStructure for Skeleton {
    fn mode(&self) -> StructuralMode {
        self.mode
    }

    fn set_mode(&mut self, mode: StructuralMode) {
        if self.mode != mode {
            tracing::trace!(from = %self.mode, to = %mode, "mode switch");
        }
        self.mode = mode;
    }

    fn unit_count(&self) -> usize {
        self.units.len()
    }

    fn unit_names(&self) -> Vec<UnitName> {
        self.units.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    fn create_unit(&mut self, name: &str) -> Result<UnitName, HostError> {
        self.require_mode("create_unit", StructuralMode::Editable)?;
        Self::check_name(name)?;
        let actual = self.unique_name(name);
        self.units.insert(actual.clone(), UnitData::default());
        Ok(actual)
    }

    fn duplicate_unit(&mut self, source: &str, name: &str) -> Result<UnitName, HostError> {
        self.require_mode("duplicate_unit", StructuralMode::Editable)?;
        Self::check_name(name)?;
        let data = self
            .units
            .get(source)
            .ok_or_else(|| HostError::UnknownUnit(source.to_string()))?;
        let copy = UnitData {
            parent: None,
            ..data.clone()
        };
        let actual = self.unique_name(name);
        self.units.insert(actual.clone(), copy);
        Ok(actual)
    }

    fn remove_unit(&mut self, name: &str) -> Result<(), HostError> {
        self.require_mode("remove_unit", StructuralMode::Editable)?;
        if self.units.shift_remove(name).is_none() {
            return Err(HostError::UnknownUnit(name.to_string()));
        }
        for data in self.units.values_mut() {
            if data.parent.as_ref().is_some_and(|p| p == name) {
                data.parent = None;
            }
        }
        Ok(())
    }

    fn rename_unit(&mut self, old: &str, new: &str) -> Result<UnitName, HostError> {
        self.require_mode("rename_unit", StructuralMode::Editable)?;
        Self::check_name(new)?;
        self.require_unit(old)?;
        if old == new {
            return Ok(UnitName::from(old));
        }

        let actual = self.unique_name(new);
        self.units = std::mem::take(&mut self.units)
            .into_iter()
            .map(|(name, data)| {
                if name == old {
                    (actual.clone(), data)
                } else {
                    (name, data)
                }
            })
            .collect();

        for data in self.units.values_mut() {
            if data.parent.as_ref().is_some_and(|p| p == old) {
                data.parent = Some(actual.clone());
            }
            for constraint in &mut data.constraints {
                if constraint.target.as_ref().is_some_and(|t| t == old) {
                    constraint.target = Some(actual.clone());
                }
            }
        }
        Ok(actual)
    }

    fn parent_of(&self, name: &str) -> Option<UnitName> {
        self.units.get(name).and_then(|data| data.parent.clone())
    }

    fn children_of(&self, name: &str) -> Vec<UnitName> {
        self.units
            .iter()
            .filter(|(_, data)| data.parent.as_ref().is_some_and(|p| p == name))
            .map(|(child, _)| child.clone())
            .collect()
    }

    fn set_parent(&mut self, child: &str, parent: Option<&str>) -> Result<(), HostError> {
        self.require_mode("set_parent", StructuralMode::Editable)?;
        self.require_unit(child)?;

        if let Some(parent) = parent {
            self.require_unit(parent)?;
            let mut cursor = Some(UnitName::from(parent));
            while let Some(current) = cursor {
                if current == child {
                    return Err(HostError::ParentCycle {
                        child: child.to_string(),
                        parent: parent.to_string(),
                    });
                }
                cursor = self.parent_of(current.as_str());
            }
        }

        if let Some(data) = self.units.get_mut(child) {
            data.parent = parent.map(UnitName::from);
        }
        Ok(())
    }

    fn set_property(&mut self, unit: &str, key: &str, value: Value) -> Result<(), HostError> {
        self.require_mode("set_property", StructuralMode::Frozen)?;
        let data = self
            .units
            .get_mut(unit)
            .ok_or_else(|| HostError::UnknownUnit(unit.to_string()))?;
        data.properties.insert(key.to_string(), value);
        Ok(())
    }

    fn property(&self, unit: &str, key: &str) -> Option<Value> {
        self.units
            .get(unit)
            .and_then(|data| data.properties.get(key).cloned())
    }

    fn add_constraint(&mut self, unit: &str, kind: &str, target: Option<&str>) -> Result<(), HostError> {
        self.require_mode("add_constraint", StructuralMode::Frozen)?;
        if let Some(target) = target {
            self.require_unit(target)?;
        }
        let data = self
            .units
            .get_mut(unit)
            .ok_or_else(|| HostError::UnknownUnit(unit.to_string()))?;
        data.constraints.push(Constraint {
            kind: kind.to_string(),
            target: target.map(UnitName::from),
        });
        Ok(())
    }
}
