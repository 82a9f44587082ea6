//! Testing utilities for rigforge workspace
//!
//! Call-recording components and plugins, misbehaving components, and
//! hierarchy builders shared by the integration tests.

#![allow(missing_docs)]

use rigforge_core::prelude::*;
use rigforge_core::{LegacyOutput, ScriptPayload};
use rigforge_skeleton::{ScriptBuffer, Skeleton};
use std::cell::RefCell;

/// One recorded stage call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub entity: String,
    pub stage: Stage,
}

thread_local! {
    static CALLS: RefCell<Vec<Call>> = const { RefCell::new(Vec::new()) };
}

/// Per-thread log of stage calls
///
/// Each test runs on its own thread, so logs do not leak between tests.
pub struct CallLog;

impl CallLog {
    pub fn record(entity: impl Into<String>, stage: Stage) {
        CALLS.with(|calls| {
            calls.borrow_mut().push(Call {
                entity: entity.into(),
                stage,
            });
        });
    }

    pub fn clear() {
        CALLS.with(|calls| calls.borrow_mut().clear());
    }

    pub fn take() -> Vec<Call> {
        CALLS.with(|calls| std::mem::take(&mut *calls.borrow_mut()))
    }

    pub fn stages_of(entity: &str) -> Vec<Stage> {
        CALLS.with(|calls| {
            calls
                .borrow()
                .iter()
                .filter(|call| call.entity == entity)
                .map(|call| call.stage)
                .collect()
        })
    }
}

fn record_all<T: 'static>(
    builder: StageTableBuilder<T>,
    label: fn(&T) -> String,
) -> StageTableBuilder<T> {
    Stage::ALL.into_iter().fold(builder, |builder, stage| {
        builder.hook(stage.name(), move |this: &mut T, _ctx| {
            CallLog::record(label(this), stage);
            Ok(())
        })
    })
}

/// Claims the units listed in its `claims` parameter (default: entry unit)
/// and records every stage call under its entry unit name
#[derive(Debug)]
pub struct Recorder {
    pub unit: UnitName,
    claims: Option<Vec<UnitName>>,
}

impl ComponentType for Recorder {
    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        Ok(Self {
            unit: entry.unit().clone(),
            claims: entry.param("claims")?,
        })
    }

    fn resolve_controlled_units(&self, entry: &EntryPoint<'_>) -> Vec<UnitName> {
        self.claims
            .clone()
            .unwrap_or_else(|| vec![entry.unit().clone()])
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        record_all(StageTableBuilder::standard("Recorder"), |r: &Recorder| {
            r.unit.to_string()
        })
        .build()
    }
}

/// Creates the units named in its `create` parameter during `generate_units`
///
/// With `register: false` it goes straight to the host, leaving the units
/// for auto-attribution. `rename` pairs are applied after creation.
/// `spawn` names a unit for a [`SpawnerPlugin`] to
/// create.
#[derive(Debug)]
pub struct UnitMaker {
    create: Vec<String>,
    register: bool,
    rename: Vec<(String, String)>,
    spawn: Option<String>,
}

impl UnitMaker {
    fn generate(&mut self, ctx: &mut StageContext<'_, '_>) -> StageResult {
        for name in &self.create {
            if self.register {
                ctx.new_unit(name)?;
            } else {
                ctx.host_mut().create_unit(name)?;
            }
        }
        for (old, new) in &self.rename {
            ctx.rename_unit(old, new)?;
        }
        Ok(())
    }
}

impl ComponentType for UnitMaker {
    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        Ok(Self {
            create: entry.param_or("create", Vec::new())?,
            register: entry.param_or("register", true)?,
            rename: entry.param_or("rename", Vec::new())?,
            spawn: entry.param("spawn")?,
        })
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("UnitMaker")
            .stage("initialize", "request_spawner", |this: &mut UnitMaker, ctx| {
                if let Some(name) = this.spawn.clone() {
                    ctx.plugin::<SpawnerPlugin>(name)?;
                }
                Ok(())
            })
            .stage("generate_units", "make_units", Self::generate)
            .build()
    }
}

/// Creates a unit during `rig_units`, a frozen stage
#[derive(Debug)]
pub struct FrozenVandal {
    unit: UnitName,
}

impl ComponentType for FrozenVandal {
    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        Ok(Self {
            unit: entry.unit().clone(),
        })
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("FrozenVandal")
            .hook("rig_units", |this: &mut FrozenVandal, ctx| {
                let name = format!("{}.extra", this.unit);
                ctx.host_mut().create_unit(&name)?;
                Ok(())
            })
            .build()
    }
}

/// Switches the host to editable mode during `configure_units`
#[derive(Debug)]
pub struct ModeFlipper;

impl ComponentType for ModeFlipper {
    fn create(_entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        Ok(Self)
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("ModeFlipper")
            .hook("configure_units", |_this: &mut ModeFlipper, ctx| {
                ctx.host_mut().set_mode(StructuralMode::Editable);
                Ok(())
            })
            .build()
    }
}

/// Fails in `parent_units`
#[derive(Debug)]
pub struct Failing;

impl ComponentType for Failing {
    fn create(_entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        Ok(Self)
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("Failing")
            .hook("parent_units", |_this: &mut Failing, _ctx| {
                Err(GenerateError::component("bone chain too short"))
            })
            .build()
    }
}

/// Records every stage call under `plugin<RANK>:<a>-<b>`; `RANK` is its priority
#[derive(Debug)]
pub struct RecordingPlugin<const RANK: i32> {
    pub args: (i32, i32),
    pub created_in: Option<Stage>,
}

impl<const RANK: i32> RecordingPlugin<RANK> {
    pub fn label(args: (i32, i32)) -> String {
        format!("plugin{RANK}:{}-{}", args.0, args.1)
    }
}

impl<const RANK: i32> Plugin for RecordingPlugin<RANK> {
    type Args = (i32, i32);

    const NAME: &'static str = "recording";
    const PRIORITY: i32 = RANK;

    fn create(args: &(i32, i32), ctx: &mut StageContext<'_, '_>) -> Result<Self, GenerateError> {
        Ok(Self {
            args: *args,
            created_in: ctx.stage(),
        })
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        record_all(StageTableBuilder::standard("RecordingPlugin"), |p: &Self| {
            Self::label(p.args)
        })
        .build()
    }
}

/// Creates one unit straight through the host during `generate_units`
#[derive(Debug)]
pub struct SpawnerPlugin {
    name: String,
}

impl Plugin for SpawnerPlugin {
    type Args = String;

    const NAME: &'static str = "spawner";

    fn create(args: &String, _ctx: &mut StageContext<'_, '_>) -> Result<Self, GenerateError> {
        Ok(Self { name: args.clone() })
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("SpawnerPlugin")
            .hook("generate_units", |this: &mut SpawnerPlugin, ctx| {
                ctx.host_mut().create_unit(&this.name)?;
                Ok(())
            })
            .build()
    }
}

/// Plugin whose constructor requests another plugin
#[derive(Debug)]
pub struct NestingPlugin {
    pub inner: rigforge_core::PluginRef<RecordingPlugin<5>>,
}

impl Plugin for NestingPlugin {
    type Args = ();

    const NAME: &'static str = "nesting";

    fn create(_args: &(), ctx: &mut StageContext<'_, '_>) -> Result<Self, GenerateError> {
        Ok(Self {
            inner: ctx.plugin::<RecordingPlugin<5>>((7, 7))?,
        })
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("NestingPlugin").build()
    }
}

/// Requests plugins during `initialize`, based on its `plugins` parameter
/// (list of `[priority, a, b]`; priority must be 0, 5 or 10) and its
/// `nesting` flag
#[derive(Debug)]
pub struct PluginRequester {
    requests: Vec<(i32, i32, i32)>,
    nesting: bool,
}

impl ComponentType for PluginRequester {
    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        Ok(Self {
            requests: entry.param_or("plugins", Vec::new())?,
            nesting: entry.param_or("nesting", false)?,
        })
    }

    fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
        StageTableBuilder::standard("PluginRequester")
            .hook("initialize", |this: &mut PluginRequester, ctx| {
                for &(priority, a, b) in &this.requests {
                    match priority {
                        10 => {
                            ctx.plugin::<RecordingPlugin<10>>((a, b))?;
                        }
                        5 => {
                            ctx.plugin::<RecordingPlugin<5>>((a, b))?;
                        }
                        _ => {
                            ctx.plugin::<RecordingPlugin<0>>((a, b))?;
                        }
                    }
                }
                if this.nesting {
                    ctx.plugin::<NestingPlugin>(())?;
                }
                Ok(())
            })
            .build()
    }
}

/// Legacy generator creating `LEG-<entry>` and returning a payload
#[derive(Debug)]
pub struct LegacyStub {
    unit: UnitName,
    leave_frozen: bool,
}

impl rigforge_core::LegacyGenerator for LegacyStub {
    fn create(entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
        Ok(Self {
            unit: entry.unit().clone(),
            leave_frozen: entry.param_or("leave_frozen", false)?,
        })
    }

    fn generate(&mut self, host: &mut dyn HostStructure) -> Result<Option<LegacyOutput>, GenerateError> {
        let created = host.create_unit(&format!("LEG-{}", self.unit))?;
        if self.leave_frozen {
            host.set_mode(StructuralMode::Frozen);
        }
        Ok(Some(LegacyOutput::Structured(ScriptPayload {
            imports: Some(vec!["import math".to_string()]),
            register_props: Some(vec![(format!("{}_fk", self.unit), serde_json::json!(0.0))]),
            noparent_units: Some(vec![created]),
            ..ScriptPayload::default()
        })))
    }
}

/// Catalog with every fixture type registered under `test.*`
pub fn test_catalog() -> ComponentCatalog {
    let mut catalog = ComponentCatalog::new();
    catalog.register::<Recorder>("test.recorder").unwrap();
    catalog.register::<UnitMaker>("test.maker").unwrap();
    catalog.register::<FrozenVandal>("test.vandal").unwrap();
    catalog.register::<ModeFlipper>("test.flipper").unwrap();
    catalog.register::<Failing>("test.failing").unwrap();
    catalog.register::<PluginRequester>("test.requester").unwrap();
    catalog.register_legacy::<LegacyStub>("test.legacy").unwrap();
    catalog
}

/// Unit tagged with `test.requester` asking for the given recording plugins
pub fn requester(name: &str, plugins: &[(i32, i32, i32)]) -> InputUnit {
    InputUnit::new(name)
        .component("test.requester")
        .param("plugins", serde_json::json!(plugins))
}

/// Unit tagged with `test.recorder` claiming `claims`
pub fn recorder(name: &str, claims: &[&str]) -> InputUnit {
    let unit = InputUnit::new(name).component("test.recorder");
    if claims.is_empty() {
        unit
    } else {
        unit.param("claims", serde_json::json!(claims))
    }
}

/// Two root entry points: `A` claims `x, y`, `B` claims `z`
pub fn two_roots() -> InputHierarchy {
    InputHierarchy::new(vec![
        recorder("A", &["x", "y"])
            .child(InputUnit::new("x"))
            .child(InputUnit::new("y")),
        recorder("B", &["z"]).child(InputUnit::new("z")),
    ])
}

/// Host and script sink for `input`
pub fn host_for(input: &InputHierarchy) -> (Skeleton, ScriptBuffer) {
    (Skeleton::from_hierarchy(input), ScriptBuffer::new())
}
