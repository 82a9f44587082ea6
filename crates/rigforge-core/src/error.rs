//! Error types for the generation engine
//!
//! Provides error handling for:
//! - Component type resolution during tree construction
//! - Stage-table definition conflicts (raised at type registration)
//! - Structural invariant violations between stage calls
//! - Host structure operations
//! - Failures raised by component and plugin stage methods

use crate::stage::{RunPhase, Stage};
use crate::types::{StructuralMode, UnitName};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Result of a stage method
pub type StageResult = Result<(), GenerateError>;

/// Main generation error type
///
/// Every variant aborts the run. Non-fatal conditions (ownership conflicts,
/// unregistered units, skipped entry points) go to the diagnostics channel instead.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// An entry point's declared component type could not be resolved
    #[error("component type not found: '{type_name}'{}", entry_suffix(.entry_point.as_ref()))]
    ComponentTypeNotFound {
        /// Declared type name
        type_name: String,
        /// Entry point that declared it, once known
        entry_point: Option<UnitName>,
    },

    /// A stage method broke the execution contract
    #[error("structural invariant violation: {0}")]
    StructuralInvariantViolation(Box<InvariantViolation>),

    /// Stage table definition conflict
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Host structure rejected an operation
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// Stage requested out of order
    #[error("cannot run stage {requested} after {phase}{}", expected_suffix(.expected.as_ref()))]
    StageOrder {
        /// Where the run currently is
        phase: RunPhase,
        /// Stage that was requested
        requested: Stage,
        /// Stage that may run next, if any
        expected: Option<Stage>,
    },

    /// A component or plugin stage method failed
    #[error("stage {stage} failed in {entity}: {source}")]
    StageFailed {
        /// Stage being executed
        stage: Stage,
        /// Component or plugin that failed
        entity: String,
        /// Underlying failure
        source: Box<GenerateError>,
    },

    /// Failure raised by component code
    #[error("{0}")]
    ComponentFailed(String),

    /// An operation was used outside the stage it belongs to
    #[error("operation requires stage {expected}, current stage is {}", display_stage(.actual.as_ref()))]
    WrongStage {
        /// Stage the operation belongs to
        expected: Stage,
        /// Stage currently running
        actual: Option<Stage>,
    },

    /// A component-only operation was called from a plugin context
    #[error("operation requires a component context")]
    NotAComponent,

    /// Input hierarchy is malformed
    #[error("invalid input hierarchy: {0}")]
    InvalidInput(String),

    /// Entry-point parameter has the wrong shape
    #[error("invalid parameter '{key}' on '{unit}': {message}")]
    InvalidParameter {
        /// Entry point unit
        unit: UnitName,
        /// Parameter key
        key: String,
        /// Deserialization message
        message: String,
    },
}

fn entry_suffix(entry: Option<&UnitName>) -> String {
    entry.map(|unit| format!(" (unit: {unit})")).unwrap_or_default()
}

fn expected_suffix(expected: Option<&Stage>) -> String {
    match expected {
        Some(stage) => format!(", expected {stage}"),
        None => ", no stage may run".to_string(),
    }
}

fn display_stage(stage: Option<&Stage>) -> String {
    stage.map_or_else(|| "none".to_string(), |s| s.name().to_string())
}

impl GenerateError {
    /// Create a component failure
    #[inline]
    pub fn component(message: impl Into<String>) -> Self {
        Self::ComponentFailed(message.into())
    }

    /// Attach the entry point to a type resolution failure
    #[must_use]
    pub fn at_entry_point(self, unit: &UnitName) -> Self {
        match self {
            Self::ComponentTypeNotFound { type_name, .. } => Self::ComponentTypeNotFound {
                type_name,
                entry_point: Some(unit.clone()),
            },
            other => other,
        }
    }

    /// Innermost error, looking through stage failure wrappers
    #[must_use]
    pub fn root_cause(&self) -> &GenerateError {
        match self {
            Self::StageFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Check if this error reports a broken stage contract
    #[inline]
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self.root_cause(), Self::StructuralInvariantViolation(_))
    }

    /// Check if this error reports a missing component type
    #[inline]
    #[must_use]
    pub fn is_type_not_found(&self) -> bool {
        matches!(self.root_cause(), Self::ComponentTypeNotFound { .. })
    }

    /// Invariant violation details, if this is one
    #[must_use]
    pub fn violation(&self) -> Option<&InvariantViolation> {
        match self.root_cause() {
            Self::StructuralInvariantViolation(v) => Some(v),
            _ => None,
        }
    }
}

impl From<InvariantViolation> for GenerateError {
    fn from(value: InvariantViolation) -> Self {
        Self::StructuralInvariantViolation(Box::new(value))
    }
}

/// Mode and unit count of the host at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostSnapshot {
    /// Active structural mode
    pub mode: StructuralMode,
    /// Number of units
    pub unit_count: usize,
}

impl Display for HostSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} mode with {} units", self.mode, self.unit_count)
    }
}

/// Details of a broken stage contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantViolation {
    /// Stage name, or `instantiate_tree` during construction
    pub phase: String,
    /// Component or plugin whose call broke the contract
    pub entity: String,
    /// Whether the unit count was part of the check
    pub counted: bool,
    /// Expected host state
    pub expected: HostSnapshot,
    /// Observed host state
    pub actual: HostSnapshot,
    /// Host operation refused for breaking the stage's mode, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<&'static str>,
}

impl Display for InvariantViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.rejected {
            Some(operation) => write!(
                f,
                "{}: {} attempted {operation} with host in {}",
                self.phase, self.entity, self.actual
            ),
            None => write!(
                f,
                "{}: {} left host in {}, expected {}",
                self.phase, self.entity, self.actual, self.expected
            ),
        }
    }
}

/// Stage table conflicts detected when a type is registered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// A tagged method carries the name of a legal stage
    #[error("{type_name}: stage method '{method}' is also a stage name")]
    StageNamedMethod {
        /// Type being defined
        type_name: String,
        /// Offending method
        method: String,
    },

    /// A method was tagged with a stage that is not legal for the type
    #[error("{type_name}: invalid stage name '{stage}' for method '{method}'")]
    UnknownStage {
        /// Type being defined
        type_name: String,
        /// Tagged method
        method: String,
        /// Unknown stage
        stage: String,
    },

    /// A main hook was declared for a stage that is not legal for the type
    #[error("{type_name}: no stage named '{stage}' to hook")]
    UnknownHookStage {
        /// Type being defined
        type_name: String,
        /// Unknown stage
        stage: String,
    },

    /// Two inherited bases bind the same method to different stages
    #[error("{type_name}: method '{method}' is used in multiple stages: {first}, {second}")]
    AmbiguousStage {
        /// Type being defined
        type_name: String,
        /// Method bound twice
        method: String,
        /// Stage from the earlier base
        first: String,
        /// Stage from the later base
        second: String,
    },

    /// An untagged re-declaration names a method no base registered
    #[error("{type_name}: method '{method}' is not registered in any inherited stage")]
    NothingToRedeclare {
        /// Type being defined
        type_name: String,
        /// Re-declared method
        method: String,
    },

    /// Two types were registered under one name
    #[error("component type '{0}' is already registered")]
    DuplicateType(String),
}

/// Errors reported by a host structure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// Unit does not exist
    #[error("unit '{0}' not found")]
    UnknownUnit(String),

    /// Operation not allowed in the active mode
    #[error("{operation} is not allowed in {mode} mode")]
    WrongMode {
        /// Operation attempted
        operation: &'static str,
        /// Active mode
        mode: StructuralMode,
    },

    /// Reparenting would create a cycle
    #[error("cannot parent '{child}' to '{parent}': would create a cycle")]
    ParentCycle {
        /// Unit being reparented
        child: String,
        /// Requested parent
        parent: String,
    },

    /// Unit name is empty or otherwise unusable
    #[error("invalid unit name: '{0}'")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_not_found_names_entry_point() {
        let err = GenerateError::ComponentTypeNotFound {
            type_name: "limbs.arm".into(),
            entry_point: None,
        }
        .at_entry_point(&UnitName::new("upper_arm.L"));

        let message = err.to_string();
        assert!(message.contains("limbs.arm"));
        assert!(message.contains("upper_arm.L"));
    }

    #[test]
    fn root_cause_unwraps_stage_failure() {
        let inner = InvariantViolation {
            phase: "rig_units".into(),
            entity: "component #0".into(),
            counted: true,
            expected: HostSnapshot { mode: StructuralMode::Frozen, unit_count: 3 },
            actual: HostSnapshot { mode: StructuralMode::Frozen, unit_count: 4 },
            rejected: None,
        };
        let err = GenerateError::StageFailed {
            stage: Stage::RigUnits,
            entity: "component #0".into(),
            source: Box::new(inner.clone().into()),
        };

        assert!(err.is_invariant_violation());
        assert_eq!(err.violation(), Some(&inner));
    }

    #[test]
    fn stage_order_message() {
        let err = GenerateError::StageOrder {
            phase: RunPhase::Instantiated,
            requested: Stage::Finalize,
            expected: Some(Stage::Initialize),
        };
        assert_eq!(
            err.to_string(),
            "cannot run stage finalize after instantiated, expected initialize"
        );
    }

    #[test]
    fn violation_display_mentions_counts() {
        let v = InvariantViolation {
            phase: "configure_units".into(),
            entity: "plugin Panel".into(),
            counted: true,
            expected: HostSnapshot { mode: StructuralMode::Frozen, unit_count: 2 },
            actual: HostSnapshot { mode: StructuralMode::Frozen, unit_count: 3 },
            rejected: None,
        };
        let text = v.to_string();
        assert!(text.contains("3 units"));
        assert!(text.contains("expected frozen mode with 2 units"));
    }

    #[test]
    fn violation_display_names_rejected_operation() {
        let snapshot = HostSnapshot { mode: StructuralMode::Frozen, unit_count: 1 };
        let v = InvariantViolation {
            phase: "rig_units".into(),
            entity: "test.vandal #0 (V)".into(),
            counted: true,
            expected: snapshot,
            actual: snapshot,
            rejected: Some("create_unit"),
        };
        assert_eq!(
            v.to_string(),
            "rig_units: test.vandal #0 (V) attempted create_unit with host in frozen mode with 1 units"
        );
    }
}
