//! External collaborators
//!
//! - [`HostStructure`]: the mutable skeleton being built
//! - [`ScriptAssembly`]: write-only sink for generated runtime glue

use crate::error::{HostError, HostSnapshot};
use crate::types::{StructuralMode, UnitName};

/// The structure a run mutates
///
/// Topology operations (`create_unit`, `duplicate_unit`, `remove_unit`,
/// `rename_unit`, `set_parent`) belong to [`StructuralMode::Editable`];
/// `set_property` and `add_constraint` belong to [`StructuralMode::Frozen`].
/// Implementations decide how strictly to enforce this; the engine checks
/// unit counts and modes around every stage call regardless.
pub trait HostStructure {
    /// Active structural mode
    fn mode(&self) -> StructuralMode;

    /// Switch structural mode
    fn set_mode(&mut self, mode: StructuralMode);

    /// Number of units
    fn unit_count(&self) -> usize;

    /// All unit names in host order
    fn unit_names(&self) -> Vec<UnitName>;

    /// Check if a unit exists
    fn contains(&self, name: &str) -> bool;

    /// Create a unit, returning its actual (possibly uniquified) name
    ///
    /// # Errors
    /// Wrong mode or invalid name
    fn create_unit(&mut self, name: &str) -> Result<UnitName, HostError>;

    /// Copy a unit's data into a new unit (parent is not copied)
    ///
    /// # Errors
    /// Wrong mode or unknown source
    fn duplicate_unit(&mut self, source: &str, name: &str) -> Result<UnitName, HostError>;

    /// Remove a unit; its children become parentless
    ///
    /// # Errors
    /// Wrong mode or unknown unit
    fn remove_unit(&mut self, name: &str) -> Result<(), HostError>;

    /// Rename a unit, returning the actual new name
    ///
    /// # Errors
    /// Wrong mode or unknown unit
    fn rename_unit(&mut self, old: &str, new: &str) -> Result<UnitName, HostError>;

    /// Parent of a unit
    fn parent_of(&self, name: &str) -> Option<UnitName>;

    /// Direct children of a unit
    fn children_of(&self, name: &str) -> Vec<UnitName>;

    /// Set or clear a unit's parent
    ///
    /// # Errors
    /// Wrong mode, unknown units, or a parent cycle
    fn set_parent(&mut self, child: &str, parent: Option<&str>) -> Result<(), HostError>;

    /// Set a unit-level property
    ///
    /// # Errors
    /// Wrong mode or unknown unit
    fn set_property(
        &mut self,
        unit: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), HostError>;

    /// Read a unit-level property
    fn property(&self, unit: &str, key: &str) -> Option<serde_json::Value>;

    /// Attach a constraint of `kind` to `unit`, optionally targeting another unit
    ///
    /// # Errors
    /// Wrong mode or unknown units
    fn add_constraint(
        &mut self,
        unit: &str,
        kind: &str,
        target: Option<&str>,
    ) -> Result<(), HostError>;

    /// Mode and unit count, used for invariant checks
    fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            mode: self.mode(),
            unit_count: self.unit_count(),
        }
    }
}

/// Sink collecting generated runtime glue
///
/// Every call names the contributing component or plugin. No ordering beyond
/// append order is implied.
pub trait ScriptAssembly {
    /// Append UI panel code lines
    fn add_panel_code(&mut self, contributor: &str, lines: Vec<String>);

    /// Append import statements
    fn add_imports(&mut self, contributor: &str, imports: Vec<String>);

    /// Append utility code fragments
    fn add_utilities(&mut self, contributor: &str, fragments: Vec<String>);

    /// Register classes by name
    fn register_classes(&mut self, contributor: &str, classes: Vec<String>);

    /// Register driver functions by name
    fn register_driver_functions(&mut self, contributor: &str, functions: Vec<String>);

    /// Register a custom property with its default value
    fn register_property(&mut self, contributor: &str, name: &str, value: serde_json::Value);
}
