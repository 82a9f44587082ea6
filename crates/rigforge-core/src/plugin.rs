//! Singleton plugin registry
//!
//! Plugins are run-scoped singletons keyed by (type, constructor arguments).
//! They receive the same stage calls as components, always after every
//! component of the stage, in descending priority order with ties broken by
//! construction order.

use crate::context::{RunState, StageContext};
use crate::error::{DefinitionError, GenerateError, StageResult};
use crate::registry::StageTable;
use crate::stage::Stage;
use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::rc::Rc;

/// A run-scoped singleton participating in the stage sequence
pub trait Plugin: Sized + 'static {
    /// Constructor arguments; one instance exists per distinct value
    type Args: Clone + Eq + Hash + Debug + 'static;

    /// Name used in logs and reports
    const NAME: &'static str;

    /// Scheduling priority, higher runs first
    const PRIORITY: i32 = 0;

    /// Construct the instance
    ///
    /// The context has no owning component. Requesting other plugins from
    /// here is allowed.
    ///
    /// # Errors
    /// Construction failures propagate to the requester.
    fn create(args: &Self::Args, ctx: &mut StageContext<'_, '_>) -> Result<Self, GenerateError>;

    /// Stage table for this type
    ///
    /// # Errors
    /// Merge conflicts in the table definition.
    fn define_stages() -> Result<StageTable<Self>, DefinitionError>;
}

pub(crate) trait PluginBehavior {
    fn invoke_stage(&mut self, stage: Stage, ctx: &mut StageContext<'_, '_>) -> StageResult;
}

struct StagedPlugin<P: Plugin> {
    inner: P,
    args: P::Args,
    table: Rc<StageTable<P>>,
}

impl<P: Plugin> PluginBehavior for StagedPlugin<P> {
    fn invoke_stage(&mut self, stage: Stage, ctx: &mut StageContext<'_, '_>) -> StageResult {
        self.table.invoke(&mut self.inner, stage.name(), ctx)
    }
}

/// Shared handle to a plugin instance
pub struct PluginRef<P: Plugin> {
    cell: Rc<RefCell<StagedPlugin<P>>>,
}

impl<P: Plugin> Clone for PluginRef<P> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<P: Plugin> Debug for PluginRef<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRef")
            .field("plugin", &P::NAME)
            .field("args", &self.cell.try_borrow().map(|p| p.args.clone()).ok())
            .finish()
    }
}

impl<P: Plugin> PluginRef<P> {
    /// Borrow the instance
    ///
    /// # Panics
    /// If the instance is mutably borrowed, e.g. while its own stage method runs.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, P> {
        Ref::map(self.cell.borrow(), |p| &p.inner)
    }

    /// Mutably borrow the instance
    ///
    /// # Panics
    /// If the instance is already borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, P> {
        RefMut::map(self.cell.borrow_mut(), |p| &mut p.inner)
    }

    /// Mutably borrow the instance if it is not in use
    ///
    /// # Errors
    /// [`GenerateError::ComponentFailed`] if the instance is already borrowed.
    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, P>, GenerateError> {
        self.cell
            .try_borrow_mut()
            .map(|cell| RefMut::map(cell, |p| &mut p.inner))
            .map_err(|_| GenerateError::component(format!("plugin {} is in use", P::NAME)))
    }

    /// Check if two handles point at the same instance
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

type PluginMap<P> = HashMap<<P as Plugin>::Args, PluginRef<P>>;

struct PluginSlot {
    label: String,
    priority: i32,
    behavior: Rc<RefCell<dyn PluginBehavior>>,
}

/// Live plugin instances of one run
#[derive(Default)]
pub struct PluginRegistry {
    instances: HashMap<TypeId, Box<dyn Any>>,
    tables: HashMap<TypeId, Box<dyn Any>>,
    slots: Vec<PluginSlot>,
}

impl Debug for PluginRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.labels())
            .finish_non_exhaustive()
    }
}

impl PluginRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Live instance for `args`, if any
    #[must_use]
    pub fn get<P: Plugin>(&self, args: &P::Args) -> Option<PluginRef<P>> {
        self.instances
            .get(&TypeId::of::<P>())
            .and_then(|map| map.downcast_ref::<PluginMap<P>>())
            .and_then(|map| map.get(args))
            .cloned()
    }

    /// Plugin labels in scheduling order
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.label.clone()).collect()
    }

    /// Plugin priorities in scheduling order
    #[must_use]
    pub fn priorities(&self) -> Vec<i32> {
        self.slots.iter().map(|slot| slot.priority).collect()
    }

    /// Number of live instances
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no plugin was created
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn snapshot(&self) -> Vec<(String, Rc<RefCell<dyn PluginBehavior>>)> {
        self.slots
            .iter()
            .map(|slot| (slot.label.clone(), Rc::clone(&slot.behavior)))
            .collect()
    }

    fn cached_table<P: Plugin>(&self) -> Option<Rc<StageTable<P>>> {
        self.tables
            .get(&TypeId::of::<P>())
            .and_then(|table| table.downcast_ref::<Rc<StageTable<P>>>())
            .cloned()
    }

    fn insert<P: Plugin>(&mut self, args: P::Args, inner: P, table: Rc<StageTable<P>>) -> PluginRef<P> {
        let label = format!("{}({:?})", P::NAME, args);
        let handle = PluginRef {
            cell: Rc::new(RefCell::new(StagedPlugin {
                inner,
                args: args.clone(),
                table,
            })),
        };

        let map = self
            .instances
            .entry(TypeId::of::<P>())
            .or_insert_with(|| Box::new(PluginMap::<P>::new()));
        if let Some(map) = map.downcast_mut::<PluginMap<P>>() {
            map.insert(args, handle.clone());
        }

        let behavior: Rc<RefCell<dyn PluginBehavior>> = handle.cell.clone();
        self.slots.push(PluginSlot {
            label,
            priority: P::PRIORITY,
            behavior,
        });
        // stable: ties keep construction order
        self.slots.sort_by_key(|slot| Reverse(slot.priority));
        handle
    }
}

fn table_for<P: Plugin>(run: &mut RunState<'_>) -> Result<Rc<StageTable<P>>, GenerateError> {
    if let Some(table) = run.catalog.plugin_table::<P>() {
        return Ok(table);
    }
    if let Some(table) = run.plugins.cached_table::<P>() {
        return Ok(table);
    }
    let table = Rc::new(P::define_stages()?);
    run.plugins
        .tables
        .insert(TypeId::of::<P>(), Box::new(Rc::clone(&table)));
    Ok(table)
}

/// Return the run's instance of `P` for `args`, constructing it on first request
///
/// A constructor may request other plugins, including another instance of
/// `P`; if the same key was created in the meantime, the first instance is
/// kept and the new one is dropped.
///
/// # Errors
/// Stage table definition errors or constructor failures.
pub fn get_or_create<P: Plugin>(
    ctx: &mut StageContext<'_, '_>,
    args: P::Args,
) -> Result<PluginRef<P>, GenerateError> {
    if let Some(existing) = ctx.run.plugins.get::<P>(&args) {
        return Ok(existing);
    }

    let table = table_for::<P>(ctx.run)?;
    let instance = {
        let mut inner = StageContext::new(ctx.run, None);
        P::create(&args, &mut inner)?
    };

    if let Some(existing) = ctx.run.plugins.get::<P>(&args) {
        tracing::debug!(plugin = P::NAME, ?args, "plugin created during its own construction");
        return Ok(existing);
    }

    tracing::debug!(plugin = P::NAME, ?args, priority = P::PRIORITY, "plugin created");
    Ok(ctx.run.plugins.insert(args, instance, table))
}
