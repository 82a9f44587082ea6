//! Construction stages and the run lifecycle
//!
//! The eight stages run in a fixed order. Each stage runs with the host
//! structure in one [`StructuralMode`].

use crate::error::GenerateError;
use crate::types::StructuralMode;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One named phase of the global construction sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Validate input and compute derived data
    Initialize,
    /// Adjust existing units before new ones are created
    PrepareStructure,
    /// Create new units (the only stage that may add units)
    GenerateUnits,
    /// Link units into their final hierarchy
    ParentUnits,
    /// Set unit-level properties
    ConfigureUnits,
    /// Attach constraints and behavior
    RigUnits,
    /// Generate visual helpers for control units
    GenerateVisuals,
    /// Last stage; cross-component glue
    Finalize,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 8] = [
        Stage::Initialize,
        Stage::PrepareStructure,
        Stage::GenerateUnits,
        Stage::ParentUnits,
        Stage::ConfigureUnits,
        Stage::RigUnits,
        Stage::GenerateVisuals,
        Stage::Finalize,
    ];

    /// Names of all stages in execution order
    pub const NAMES: [&'static str; 8] = [
        "initialize",
        "prepare_structure",
        "generate_units",
        "parent_units",
        "configure_units",
        "rig_units",
        "generate_visuals",
        "finalize",
    ];

    /// Stage name as used in stage tables
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        Self::NAMES[self as usize]
    }

    /// Structural mode the host must be in while this stage runs
    #[must_use]
    pub const fn mode(self) -> StructuralMode {
        match self {
            Stage::PrepareStructure | Stage::GenerateUnits | Stage::ParentUnits => {
                StructuralMode::Editable
            }
            Stage::Initialize
            | Stage::ConfigureUnits
            | Stage::RigUnits
            | Stage::GenerateVisuals
            | Stage::Finalize => StructuralMode::Frozen,
        }
    }

    /// Following stage, or `None` after `Finalize`
    #[must_use]
    pub fn next(self) -> Option<Stage> {
        Self::ALL.get(self as usize + 1).copied()
    }

    /// First stage of a run
    #[inline]
    #[must_use]
    pub const fn first() -> Stage {
        Stage::Initialize
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error parsing a stage name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

/// Progress of one run through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "stage")]
pub enum RunPhase {
    /// Generator created, no components yet
    Created,
    /// Component tree built
    Instantiated,
    /// The given stage has completed
    Completed(Stage),
}

impl RunPhase {
    /// Stage that may run next, if any
    #[must_use]
    pub fn next_stage(self) -> Option<Stage> {
        match self {
            RunPhase::Created => None,
            RunPhase::Instantiated => Some(Stage::first()),
            RunPhase::Completed(stage) => stage.next(),
        }
    }

    /// Check if every stage has completed
    #[inline]
    #[must_use]
    pub fn is_finished(self) -> bool {
        self == RunPhase::Completed(Stage::Finalize)
    }
}

impl Display for RunPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Created => f.write_str("created"),
            RunPhase::Instantiated => f.write_str("instantiated"),
            RunPhase::Completed(stage) => write!(f, "completed {stage}"),
        }
    }
}

/// Validates that `stage` may run when the run is at `from`.
///
/// Stages run strictly in order, each exactly once, and only after the
/// component tree has been instantiated.
pub fn validate_transition(from: RunPhase, stage: Stage) -> Result<(), GenerateError> {
    match from.next_stage() {
        Some(expected) if expected == stage => Ok(()),
        expected => Err(GenerateError::StageOrder {
            phase: from,
            requested: stage,
            expected,
        }),
    }
}

/// Stages allowed to run after `from`, in order.
pub fn remaining_stages(from: RunPhase) -> Vec<Stage> {
    match from.next_stage() {
        Some(next) => Stage::ALL[next as usize..].to_vec(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(stage.name().parse::<Stage>().unwrap(), stage);
        }
        assert!("generate_bones".parse::<Stage>().is_err());
    }

    #[test]
    fn stage_modes() {
        let editable: Vec<Stage> = Stage::ALL
            .into_iter()
            .filter(|s| s.mode() == StructuralMode::Editable)
            .collect();
        assert_eq!(
            editable,
            vec![Stage::PrepareStructure, Stage::GenerateUnits, Stage::ParentUnits]
        );
    }

    #[test]
    fn stage_next_chain() {
        assert_eq!(Stage::Initialize.next(), Some(Stage::PrepareStructure));
        assert_eq!(Stage::GenerateVisuals.next(), Some(Stage::Finalize));
        assert_eq!(Stage::Finalize.next(), None);
    }

    #[test]
    fn transition_requires_instantiation() {
        let err = validate_transition(RunPhase::Created, Stage::Initialize).unwrap_err();
        assert!(matches!(err, GenerateError::StageOrder { expected: None, .. }));
    }

    #[test]
    fn transition_in_order() {
        assert!(validate_transition(RunPhase::Instantiated, Stage::Initialize).is_ok());
        assert!(
            validate_transition(RunPhase::Completed(Stage::Initialize), Stage::PrepareStructure)
                .is_ok()
        );
    }

    #[test]
    fn transition_rejects_skip_and_repeat() {
        assert!(validate_transition(RunPhase::Instantiated, Stage::GenerateUnits).is_err());
        assert!(
            validate_transition(RunPhase::Completed(Stage::RigUnits), Stage::RigUnits).is_err()
        );
        assert!(
            validate_transition(RunPhase::Completed(Stage::Finalize), Stage::Initialize).is_err()
        );
    }

    #[test]
    fn remaining_after_parent_units() {
        let rest = remaining_stages(RunPhase::Completed(Stage::ParentUnits));
        assert_eq!(rest.first(), Some(&Stage::ConfigureUnits));
        assert_eq!(rest.len(), 4);
        assert!(remaining_stages(RunPhase::Completed(Stage::Finalize)).is_empty());
    }
}
