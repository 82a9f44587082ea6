//! Rigforge Core - staged orchestration engine
//!
//! Builds a control skeleton out of independently authored component
//! generators:
//! - Stage tables bind component methods to named build stages, merged
//!   across embedded base types at registration time
//! - The tree builder instantiates one component per tagged entry point and
//!   resolves unit ownership
//! - The engine runs every stage across all components, then all plugins,
//!   enforcing the editable/frozen contract between calls
//! - Run-scoped singleton plugins handle cross-cutting concerns
//! - Legacy single-call generators are wrapped as one-stage components
//!
//! # Example
//!
//! ```rust,ignore
//! use rigforge_core::prelude::*;
//!
//! let mut catalog = ComponentCatalog::new();
//! catalog.register::<MyChain>("chain.simple")?;
//!
//! let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());
//! generator.run(&input)?;
//! println!("{}", generator.finish());
//! ```

#![warn(unreachable_pub)]

pub mod auto_parent;
pub mod catalog;
pub mod component;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod host;
pub mod input;
pub mod legacy;
pub mod ownership;
pub mod plugin;
pub mod registry;
pub mod report;
pub mod stage;
pub mod tree;
pub mod types;
pub mod units;

// Re-exports for convenience
pub use auto_parent::AutoParentPlugin;
pub use catalog::{ComponentCatalog, ComponentClass, Instance};
pub use component::{ComponentBehavior, ComponentRecord, ComponentType, EntryPoint, StagedComponent};
pub use config::{GeneratorConfig, MissingTypePolicy, UnregisteredUnitPolicy};
pub use context::{RunState, StageContext};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use engine::Generator;
pub use error::{
    DefinitionError, GenerateError, HostError, HostSnapshot, InvariantViolation, StageResult,
};
pub use host::{HostStructure, ScriptAssembly};
pub use input::{InputHierarchy, InputUnit};
pub use legacy::{LegacyAdapter, LegacyGenerator, LegacyOutput, ScriptPayload};
pub use ownership::OwnershipMap;
pub use plugin::{Plugin, PluginRef, PluginRegistry};
pub use registry::{StageFn, StageTable, StageTableBuilder};
pub use report::{ComponentSummary, GenerationReport};
pub use stage::{RunPhase, Stage};
pub use types::{ComponentId, Params, StructuralMode, UnitName};
pub use units::{UnitGroup, UnitGroups};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for writing components and running generation
    pub use crate::{
        ComponentCatalog, ComponentType, DefinitionError, EntryPoint, GenerateError, Generator,
        GeneratorConfig, HostStructure, InputHierarchy, InputUnit, Plugin, ScriptAssembly, Stage,
        StageContext, StageResult, StageTable, StageTableBuilder, StructuralMode, UnitName,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
