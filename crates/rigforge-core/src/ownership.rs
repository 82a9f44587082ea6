//! Ownership map
//!
//! Maps each unit name to the component that created or claimed it. A unit
//! may be present with no owner (shared, plugin-created, or outside any
//! component). Last writer wins.

use crate::types::{ComponentId, UnitName};
use serde::Serialize;
use std::collections::BTreeMap;

/// Unit name → owning component (or none)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OwnershipMap {
    owners: BTreeMap<UnitName, Option<ComponentId>>,
}

impl OwnershipMap {
    /// Create empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `owner` for `unit`, returning the previous entry
    ///
    /// The outer `Option` tells whether the unit was present at all.
    pub fn claim(
        &mut self,
        unit: impl Into<UnitName>,
        owner: Option<ComponentId>,
    ) -> Option<Option<ComponentId>> {
        self.owners.insert(unit.into(), owner)
    }

    /// Check if the unit has an entry (owned or not)
    #[inline]
    #[must_use]
    pub fn contains(&self, unit: &str) -> bool {
        self.owners.contains_key(unit)
    }

    /// Owning component of `unit`, if any
    #[inline]
    #[must_use]
    pub fn owner_of(&self, unit: &str) -> Option<ComponentId> {
        self.owners.get(unit).copied().flatten()
    }

    /// Raw entry for `unit`
    #[inline]
    #[must_use]
    pub fn entry(&self, unit: &str) -> Option<Option<ComponentId>> {
        self.owners.get(unit).copied()
    }

    /// Units owned by `owner`, sorted by name
    #[must_use]
    pub fn units_of(&self, owner: ComponentId) -> Vec<UnitName> {
        self.owners
            .iter()
            .filter(|(_, o)| **o == Some(owner))
            .map(|(unit, _)| unit.clone())
            .collect()
    }

    /// Units present with no owner, sorted by name
    #[must_use]
    pub fn unowned(&self) -> Vec<UnitName> {
        self.owners
            .iter()
            .filter(|(_, o)| o.is_none())
            .map(|(unit, _)| unit.clone())
            .collect()
    }

    /// Forget a unit (used when a unit is removed or renamed)
    #[inline]
    pub fn forget(&mut self, unit: &str) -> Option<Option<ComponentId>> {
        self.owners.remove(unit)
    }

    /// Iterate entries sorted by unit name
    pub fn iter(&self) -> impl Iterator<Item = (&UnitName, Option<ComponentId>)> {
        self.owners.iter().map(|(unit, owner)| (unit, *owner))
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Check if the map is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_reports_previous() {
        let mut map = OwnershipMap::new();
        let a = ComponentId::new(0);
        let b = ComponentId::new(1);

        assert_eq!(map.claim("w", Some(a)), None);
        assert_eq!(map.claim("w", Some(b)), Some(Some(a)));
        assert_eq!(map.owner_of("w"), Some(b));
    }

    #[test]
    fn unowned_entries_are_present() {
        let mut map = OwnershipMap::new();
        map.claim("root", None);
        assert!(map.contains("root"));
        assert_eq!(map.owner_of("root"), None);
        assert_eq!(map.entry("root"), Some(None));
        assert_eq!(map.entry("missing"), None);
        assert_eq!(map.unowned(), vec![UnitName::from("root")]);
    }

    #[test]
    fn units_of_owner_sorted() {
        let mut map = OwnershipMap::new();
        let a = ComponentId::new(0);
        map.claim("y", Some(a));
        map.claim("x", Some(a));
        map.claim("z", None);
        assert_eq!(map.units_of(a), vec![UnitName::from("x"), UnitName::from("y")]);
        assert_eq!(map.forget("x"), Some(Some(a)));
        assert_eq!(map.len(), 2);
    }
}
