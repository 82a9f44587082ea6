//! Per-component unit groupings
//!
//! Provides [`UnitGroups`], the namespace each component fills in as stages
//! run (e.g. `org`, `ctrl.main`, `mch`, `deform`).

use crate::error::GenerateError;
use crate::types::UnitName;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Value stored under one key of [`UnitGroups`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitGroup {
    /// One unit
    Single(UnitName),
    /// Ordered list of units
    List(Vec<UnitName>),
    /// Nested grouping
    Nested(UnitGroups),
}

impl UnitGroup {
    fn collect_into(&self, out: &mut Vec<UnitName>) {
        match self {
            UnitGroup::Single(unit) => out.push(unit.clone()),
            UnitGroup::List(units) => out.extend(units.iter().cloned()),
            UnitGroup::Nested(groups) => {
                for group in groups.0.values() {
                    group.collect_into(out);
                }
            }
        }
    }
}

impl From<UnitName> for UnitGroup {
    fn from(value: UnitName) -> Self {
        Self::Single(value)
    }
}

impl From<&str> for UnitGroup {
    fn from(value: &str) -> Self {
        Self::Single(UnitName::from(value))
    }
}

impl From<Vec<UnitName>> for UnitGroup {
    fn from(value: Vec<UnitName>) -> Self {
        Self::List(value)
    }
}

impl From<UnitGroups> for UnitGroup {
    fn from(value: UnitGroups) -> Self {
        Self::Nested(value)
    }
}

/// Structured, insertion-ordered collection of unit names
///
/// Keys are plain identifiers; dotted paths address nested groups
/// (`"ctrl.main"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitGroups(IndexMap<String, UnitGroup>);

impl UnitGroups {
    /// Create empty groups
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    fn check_key(key: &str) -> Result<(), GenerateError> {
        if key.is_empty() || key.contains('.') {
            return Err(GenerateError::component(format!(
                "invalid unit group key: '{key}'"
            )));
        }
        Ok(())
    }

    /// Store a group under `key`, replacing any previous value
    ///
    /// # Errors
    /// Returns error if the key is empty or contains a dot
    pub fn set(&mut self, key: &str, value: impl Into<UnitGroup>) -> Result<(), GenerateError> {
        Self::check_key(key)?;
        self.0.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Get the group stored under `key`
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&UnitGroup> {
        self.0.get(key)
    }

    /// Follow a dotted path through nested groups
    #[must_use]
    pub fn path(&self, path: &str) -> Option<&UnitGroup> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            match current {
                UnitGroup::Nested(groups) => current = groups.0.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Single unit stored at `path`
    #[must_use]
    pub fn single(&self, path: &str) -> Option<&UnitName> {
        match self.path(path)? {
            UnitGroup::Single(unit) => Some(unit),
            _ => None,
        }
    }

    /// Unit list stored at `path`; empty if absent or not a list
    #[must_use]
    pub fn list(&self, path: &str) -> &[UnitName] {
        match self.path(path) {
            Some(UnitGroup::List(units)) => units,
            _ => &[],
        }
    }

    /// Nested groups under `key`, created when missing
    ///
    /// # Errors
    /// Returns error if the key is invalid or already holds a unit or list
    pub fn nested_mut(&mut self, key: &str) -> Result<&mut UnitGroups, GenerateError> {
        Self::check_key(key)?;
        let entry = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| UnitGroup::Nested(UnitGroups::new()));
        match entry {
            UnitGroup::Nested(groups) => Ok(groups),
            _ => Err(GenerateError::component(format!(
                "unit group '{key}' is not a nested group"
            ))),
        }
    }

    /// Remove and return the group under `key`
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<UnitGroup> {
        self.0.shift_remove(key)
    }

    /// All contained units, or those under one key, in insertion order
    #[must_use]
    pub fn flatten(&self, key: Option<&str>) -> Vec<UnitName> {
        let mut out = Vec::new();
        match key {
            Some(key) => {
                if let Some(group) = self.path(key) {
                    group.collect_into(&mut out);
                }
            }
            None => {
                for group in self.0.values() {
                    group.collect_into(&mut out);
                }
            }
        }
        out
    }

    /// Top-level keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of top-level keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no groups
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<UnitName> {
        list.iter().map(|s| UnitName::from(*s)).collect()
    }

    #[test]
    fn set_and_read_back() {
        let mut groups = UnitGroups::new();
        groups.set("org", names(&["ORG-a", "ORG-b"])).unwrap();
        groups.set("master", "ctrl").unwrap();

        assert_eq!(groups.list("org"), names(&["ORG-a", "ORG-b"]).as_slice());
        assert_eq!(groups.single("master"), Some(&UnitName::from("ctrl")));
        assert!(groups.list("master").is_empty());
    }

    #[test]
    fn rejects_bad_keys() {
        let mut groups = UnitGroups::new();
        assert!(groups.set("", "x").is_err());
        assert!(groups.set("ctrl.main", "x").is_err());
    }

    #[test]
    fn nested_groups_by_path() {
        let mut groups = UnitGroups::new();
        groups
            .nested_mut("ctrl")
            .unwrap()
            .set("main", names(&["a", "b"]))
            .unwrap();
        groups.nested_mut("ctrl").unwrap().set("tweak", names(&["t"])).unwrap();

        assert_eq!(groups.list("ctrl.main").len(), 2);
        assert_eq!(groups.flatten(Some("ctrl")), names(&["a", "b", "t"]));
        assert!(groups.path("ctrl.missing").is_none());
    }

    #[test]
    fn nested_mut_refuses_leaf() {
        let mut groups = UnitGroups::new();
        groups.set("deform", names(&["DEF-a"])).unwrap();
        assert!(groups.nested_mut("deform").is_err());
    }

    #[test]
    fn flatten_everything_in_order() {
        let mut groups = UnitGroups::new();
        groups.set("org", names(&["o1", "o2"])).unwrap();
        groups.nested_mut("ctrl").unwrap().set("main", "c1").unwrap();
        groups.set("deform", names(&["d1"])).unwrap();

        assert_eq!(groups.flatten(None), names(&["o1", "o2", "c1", "d1"]));
        assert!(groups.remove("deform").is_some());
        assert_eq!(groups.len(), 2);
    }
}
