//! Rigforge Skeleton - reference collaborators
//!
//! - [`Skeleton`]: in-memory host structure enforcing the editable/frozen contract
//! - [`ScriptBuffer`]: script-assembly sink that renders a text script

#![warn(unreachable_pub)]

pub mod script;
pub mod skeleton;

pub use script::{Fragment, ScriptBuffer};
pub use skeleton::{Constraint, Skeleton, UnitData};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
