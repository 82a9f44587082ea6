//! Input hierarchy
//!
//! The tree of units a generation run starts from. Any unit may carry a
//! component type tag, which makes it an entry point.

use crate::error::GenerateError;
use crate::types::{Params, UnitName};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One node of the input hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputUnit {
    /// Unit name (unique across the hierarchy)
    pub name: UnitName,
    /// Component type tag, if this unit is an entry point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Parameters for the component instantiated here
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    /// Whether the unit is connected to its parent
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub connected: bool,
    /// Child units
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<InputUnit>,
}

impl InputUnit {
    /// Create an untagged unit
    #[must_use]
    pub fn new(name: impl Into<UnitName>) -> Self {
        Self {
            name: name.into(),
            component: None,
            params: Params::new(),
            connected: false,
            children: Vec::new(),
        }
    }

    /// Tag with a component type
    #[must_use]
    pub fn component(mut self, type_name: impl Into<String>) -> Self {
        self.component = Some(type_name.into());
        self
    }

    /// Set one parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Mark as connected to its parent
    #[must_use]
    pub fn connected(mut self) -> Self {
        self.connected = true;
        self
    }

    /// Append a child
    #[must_use]
    pub fn child(mut self, child: InputUnit) -> Self {
        self.children.push(child);
        self
    }

    /// Normalised component tag: spaces removed, empty treated as untagged
    #[must_use]
    pub fn component_tag(&self) -> Option<String> {
        let tag: String = self.component.as_deref()?.chars().filter(|c| *c != ' ').collect();
        (!tag.is_empty()).then_some(tag)
    }

    /// Children sorted by name
    #[must_use]
    pub fn sorted_children(&self) -> Vec<&InputUnit> {
        let mut children: Vec<&InputUnit> = self.children.iter().collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }
}

/// Input hierarchy: a forest of [`InputUnit`]s
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputHierarchy {
    /// Root units
    #[serde(default)]
    pub units: Vec<InputUnit>,
}

impl InputHierarchy {
    /// Create from root units
    #[must_use]
    pub fn new(units: Vec<InputUnit>) -> Self {
        Self { units }
    }

    /// Root units sorted by name
    #[must_use]
    pub fn sorted_roots(&self) -> Vec<&InputUnit> {
        let mut roots: Vec<&InputUnit> = self.units.iter().collect();
        roots.sort_by(|a, b| a.name.cmp(&b.name));
        roots
    }

    /// Check names are non-empty and unique
    ///
    /// # Errors
    /// Returns [`GenerateError::InvalidInput`] naming the offending unit
    pub fn validate(&self) -> Result<(), GenerateError> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&InputUnit> = self.units.iter().collect();
        while let Some(unit) = stack.pop() {
            if unit.name.is_empty() {
                return Err(GenerateError::InvalidInput("unit with empty name".to_string()));
            }
            if !seen.insert(&unit.name) {
                return Err(GenerateError::InvalidInput(format!(
                    "duplicate unit name '{}'",
                    unit.name
                )));
            }
            stack.extend(unit.children.iter());
        }
        Ok(())
    }

    /// Every unit, parents before children, siblings sorted by name
    #[must_use]
    pub fn walk(&self) -> Vec<&InputUnit> {
        fn visit<'a>(unit: &'a InputUnit, out: &mut Vec<&'a InputUnit>) {
            out.push(unit);
            for child in unit.sorted_children() {
                visit(child, out);
            }
        }

        let mut out = Vec::new();
        for root in self.sorted_roots() {
            visit(root, &mut out);
        }
        out
    }

    /// Find a unit by name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&InputUnit> {
        self.walk().into_iter().find(|unit| unit.name == name)
    }

    /// Map from unit name to parent name
    #[must_use]
    pub fn parents(&self) -> HashMap<&UnitName, &UnitName> {
        let mut parents = HashMap::new();
        for unit in self.walk() {
            for child in &unit.children {
                parents.insert(&child.name, &unit.name);
            }
        }
        parents
    }

    /// Number of units
    #[must_use]
    pub fn len(&self) -> usize {
        self.walk().len()
    }

    /// Check if there are no units
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Names of the connected chain below `start`, not including `start`
    ///
    /// Follows the single connected child at each level; stops at a unit with
    /// zero or several connected children.
    #[must_use]
    pub fn connected_chain(&self, start: &str) -> Vec<UnitName> {
        let mut names = Vec::new();
        let Some(mut unit) = self.find(start) else {
            return names;
        };

        loop {
            let mut connected = unit.children.iter().filter(|c| c.connected);
            match (connected.next(), connected.next()) {
                (Some(only), None) => {
                    names.push(only.name.clone());
                    unit = only;
                }
                _ => break,
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm() -> InputHierarchy {
        InputHierarchy::new(vec![InputUnit::new("torso").child(
            InputUnit::new("upper_arm")
                .component("chain.simple")
                .child(
                    InputUnit::new("forearm")
                        .connected()
                        .child(InputUnit::new("hand").connected())
                        .child(InputUnit::new("forearm_twist")),
                ),
        )])
    }

    #[test]
    fn walk_sorts_siblings() {
        let h = InputHierarchy::new(vec![
            InputUnit::new("b").child(InputUnit::new("z")).child(InputUnit::new("y")),
            InputUnit::new("a"),
        ]);
        let order: Vec<&str> = h.walk().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "y", "z"]);
    }

    #[test]
    fn validate_rejects_duplicates() {
        let h = InputHierarchy::new(vec![InputUnit::new("a").child(InputUnit::new("a"))]);
        let err = h.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate unit name 'a'"));
    }

    #[test]
    fn component_tag_strips_spaces() {
        let unit = InputUnit::new("x").component(" chain. simple ");
        assert_eq!(unit.component_tag().as_deref(), Some("chain.simple"));
        assert_eq!(InputUnit::new("y").component("  ").component_tag(), None);
    }

    #[test]
    fn connected_chain_follows_single_connection() {
        let h = arm();
        let chain = h.connected_chain("upper_arm");
        assert_eq!(chain, vec![UnitName::from("forearm"), UnitName::from("hand")]);
        assert!(h.connected_chain("hand").is_empty());
        assert!(h.connected_chain("missing").is_empty());
    }

    #[test]
    fn parents_map() {
        let h = arm();
        let parents = h.parents();
        assert_eq!(parents.get(&UnitName::from("hand")).map(|p| p.as_str()), Some("forearm"));
        assert!(!parents.contains_key(&UnitName::from("torso")));
        assert_eq!(h.len(), 5);
    }

    #[test]
    fn deserializes_from_yaml_shape() {
        let json = serde_json::json!({
            "units": [{
                "name": "spine",
                "component": "chain.tweak",
                "params": {"segments": 3},
                "children": [{"name": "chest", "connected": true}]
            }]
        });
        let h: InputHierarchy = serde_json::from_value(json).unwrap();
        assert_eq!(h.units[0].params.get("segments"), Some(&serde_json::json!(3)));
        assert!(h.units[0].children[0].connected);
    }
}
