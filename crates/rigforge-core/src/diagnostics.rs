//! Diagnostics channel for non-fatal conditions
//!
//! Every diagnostic is logged through `tracing` when recorded and kept on the
//! run for the final report.

use crate::types::{ComponentId, UnitName};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Kind of non-fatal condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A unit was claimed by more than one component
    OwnershipConflict,
    /// A native component created a unit without registering it
    UnregisteredUnit,
    /// An entry point's type could not be resolved and was skipped
    MissingComponentType,
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::OwnershipConflict => f.write_str("ownership conflict"),
            Self::UnregisteredUnit => f.write_str("unregistered unit"),
            Self::MissingComponentType => f.write_str("missing component type"),
        }
    }
}

/// One recorded condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Condition kind
    pub kind: DiagnosticKind,
    /// Human-readable message
    pub message: String,
    /// Unit concerned, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitName>,
    /// Component concerned, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentId>,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Ordered collection of diagnostics
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create empty collection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it
    pub fn push(
        &mut self,
        kind: DiagnosticKind,
        message: impl Into<String>,
        unit: Option<UnitName>,
        component: Option<ComponentId>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            message: message.into(),
            unit,
            component,
        };
        tracing::warn!("{}", diagnostic);
        self.entries.push(diagnostic);
    }

    /// All diagnostics in record order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Diagnostics of one kind
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    /// Number of diagnostics
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume into the recorded list
    #[inline]
    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_filter() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(
            DiagnosticKind::OwnershipConflict,
            "unit w already claimed",
            Some(UnitName::from("w")),
            None,
        );
        diagnostics.push(DiagnosticKind::UnregisteredUnit, "x", None, None);

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::OwnershipConflict).count(), 1);
        assert_eq!(
            diagnostics.entries()[0].to_string(),
            "ownership conflict: unit w already claimed"
        );
    }
}
