//! Core identifiers shared across the engine
//!
//! Provides [`UnitName`], [`ComponentId`], [`StructuralMode`] and the parameter map type.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};

/// Parameters attached to an entry point in the input hierarchy
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Name of one structural unit in the host structure
///
/// Unit names are the keys of the ownership map and of the host structure.
/// They borrow as `str`, so maps keyed by `UnitName` can be queried with `&str`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitName(String);

impl UnitName {
    /// Create a unit name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the name is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the inner string
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for UnitName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for UnitName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for UnitName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UnitName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&UnitName> for UnitName {
    fn from(value: &UnitName) -> Self {
        value.clone()
    }
}

impl PartialEq<str> for UnitName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for UnitName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Index of a component within one run
///
/// Components are owned by the run; everything else refers to them by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(usize);

impl ComponentId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position in the run's component list
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for ComponentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two structural states of the host structure
///
/// `Editable` allows creating, removing and reparenting units.
/// `Frozen` fixes topology; only unit-level configuration may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralMode {
    /// Topology may change
    Editable,
    /// Topology is fixed
    Frozen,
}

impl Display for StructuralMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Editable => f.write_str("editable"),
            Self::Frozen => f.write_str("frozen"),
        }
    }
}
