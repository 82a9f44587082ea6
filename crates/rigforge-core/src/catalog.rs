//! Component type resolution
//!
//! Provides [`ComponentCatalog`], which maps type names to component classes.
//! Stage tables are built when a type is registered, so definition errors
//! surface at load time rather than during a run.

use crate::component::{ComponentBehavior, ComponentType, EntryPoint, StagedComponent};
use crate::error::{DefinitionError, GenerateError};
use crate::legacy::{LegacyAdapter, LegacyGenerator};
use crate::plugin::Plugin;
use crate::registry::StageTable;
use crate::stage::Stage;
use crate::types::UnitName;
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

/// A freshly constructed component and the units it claims
pub struct Instance {
    /// Type-erased component
    pub behavior: Box<dyn ComponentBehavior>,
    /// Units returned by `resolve_controlled_units`
    pub controlled_units: Vec<UnitName>,
}

type Factory = Box<dyn Fn(&EntryPoint<'_>) -> Result<Instance, GenerateError>>;

fn factory<F>(func: F) -> Factory
where
    F: Fn(&EntryPoint<'_>) -> Result<Instance, GenerateError> + 'static,
{
    Box::new(func)
}

/// One registered component type
pub struct ComponentClass {
    name: String,
    legacy: bool,
    stages: Vec<Stage>,
    factory: Factory,
}

impl Debug for ComponentClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("legacy", &self.legacy)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

impl ComponentClass {
    /// Registered name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the class wraps a legacy generator
    #[inline]
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Engine stages the class has methods or hooks for
    #[inline]
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Construct an instance at an entry point
    ///
    /// # Errors
    /// Whatever the type's constructor returns.
    pub fn instantiate(&self, entry: &EntryPoint<'_>) -> Result<Instance, GenerateError> {
        (self.factory)(entry)
    }
}

/// Registry of component types, aliases and pre-built plugin tables
#[derive(Default)]
pub struct ComponentCatalog {
    classes: IndexMap<String, ComponentClass>,
    aliases: IndexMap<String, String>,
    plugin_tables: HashMap<TypeId, Box<dyn Any>>,
    plugin_names: Vec<&'static str>,
}

impl Debug for ComponentCatalog {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCatalog")
            .field("types", &self.classes.keys().collect::<Vec<_>>())
            .field("aliases", &self.aliases)
            .field("plugins", &self.plugin_names)
            .finish()
    }
}

impl ComponentCatalog {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type under `name`
    ///
    /// # Errors
    /// Stage table conflicts, or `name` already registered.
    pub fn register<T: ComponentType>(&mut self, name: &str) -> Result<(), DefinitionError> {
        if self.classes.contains_key(name) {
            return Err(DefinitionError::DuplicateType(name.to_string()));
        }

        let table = Rc::new(T::define_stages()?);
        let stages = Stage::ALL
            .into_iter()
            .filter(|stage| table.participates(stage.name()))
            .collect();
        let type_name = name.to_string();

        let factory = factory(move |entry| {
            let inner = T::create(entry)?;
            let controlled_units = inner.resolve_controlled_units(entry);
            Ok(Instance {
                behavior: Box::new(StagedComponent::new(inner, Rc::clone(&table), type_name.clone())),
                controlled_units,
            })
        });

        tracing::debug!(type_name = name, legacy = T::LEGACY, "registered component type");
        self.classes.insert(
            name.to_string(),
            ComponentClass {
                name: name.to_string(),
                legacy: T::LEGACY,
                stages,
                factory,
            },
        );
        Ok(())
    }

    /// Register a legacy generator wrapped in the adapter
    ///
    /// # Errors
    /// Same as [`register`](Self::register).
    #[inline]
    pub fn register_legacy<G: LegacyGenerator>(&mut self, name: &str) -> Result<(), DefinitionError> {
        self.register::<LegacyAdapter<G>>(name)
    }

    /// Build and keep a plugin type's stage table
    ///
    /// Unregistered plugin types still work; their table is built on first use.
    ///
    /// # Errors
    /// Stage table conflicts.
    pub fn register_plugin<P: Plugin>(&mut self) -> Result<(), DefinitionError> {
        let table: Rc<StageTable<P>> = Rc::new(P::define_stages()?);
        if self
            .plugin_tables
            .insert(TypeId::of::<P>(), Box::new(table))
            .is_none()
        {
            self.plugin_names.push(P::NAME);
        }
        Ok(())
    }

    /// Map an outdated type name to its replacement
    ///
    /// An empty `new` marks the old type as retired.
    pub fn alias(&mut self, old: &str, new: &str) {
        self.aliases.insert(old.to_string(), new.to_string());
    }

    /// Resolve a type name, following aliases
    ///
    /// # Errors
    /// [`GenerateError::ComponentTypeNotFound`] for unknown and retired names.
    pub fn find_component_class(&self, type_name: &str) -> Result<&ComponentClass, GenerateError> {
        let not_found = || GenerateError::ComponentTypeNotFound {
            type_name: type_name.to_string(),
            entry_point: None,
        };

        if let Some(class) = self.classes.get(type_name) {
            return Ok(class);
        }

        let mut name = type_name;
        // aliases may chain; bounded by the table size
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(name) {
                Some(target) if target.is_empty() => break,
                Some(target) => {
                    if let Some(class) = self.classes.get(target) {
                        tracing::debug!(from = type_name, to = %target, "resolved outdated type name");
                        return Ok(class);
                    }
                    name = target;
                }
                None => break,
            }
        }
        Err(not_found())
    }

    /// Registered type names in registration order
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Registered classes in registration order
    pub fn classes(&self) -> impl Iterator<Item = &ComponentClass> {
        self.classes.values()
    }

    /// Aliases as `(old, new)`
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(old, new)| (old.as_str(), new.as_str()))
    }

    /// Names of pre-registered plugin types
    #[inline]
    #[must_use]
    pub fn plugin_names(&self) -> &[&'static str] {
        &self.plugin_names
    }

    /// Number of component types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if no component type is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub(crate) fn plugin_table<P: Plugin>(&self) -> Option<Rc<StageTable<P>>> {
        self.plugin_tables
            .get(&TypeId::of::<P>())
            .and_then(|table| table.downcast_ref::<Rc<StageTable<P>>>())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StageTableBuilder;

    struct Marker;

    impl ComponentType for Marker {
        fn create(_entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
            Ok(Marker)
        }

        fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
            StageTableBuilder::standard("Marker")
                .hook("finalize", |_m: &mut Marker, _| Ok(()))
                .build()
        }
    }

    struct Broken;

    impl ComponentType for Broken {
        fn create(_entry: &EntryPoint<'_>) -> Result<Self, GenerateError> {
            Ok(Broken)
        }

        fn define_stages() -> Result<StageTable<Self>, DefinitionError> {
            StageTableBuilder::standard("Broken")
                .stage("finalize", "rig_units", |_b: &mut Broken, _| Ok(()))
                .build()
        }
    }

    #[test]
    fn catalog_new_empty() {
        let catalog = ComponentCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.find_component_class("basic.copy").is_err());
    }

    #[test]
    fn register_and_find() {
        let mut catalog = ComponentCatalog::new();
        catalog.register::<Marker>("basic.marker").unwrap();

        let class = catalog.find_component_class("basic.marker").unwrap();
        assert_eq!(class.name(), "basic.marker");
        assert_eq!(class.stages(), &[Stage::Finalize]);
        assert!(!class.is_legacy());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut catalog = ComponentCatalog::new();
        catalog.register::<Marker>("m").unwrap();
        assert_eq!(
            catalog.register::<Marker>("m").unwrap_err(),
            DefinitionError::DuplicateType("m".into())
        );
    }

    #[test]
    fn definition_errors_surface_at_registration() {
        let mut catalog = ComponentCatalog::new();
        let err = catalog.register::<Broken>("broken").unwrap_err();
        assert!(matches!(err, DefinitionError::StageNamedMethod { .. }));
        assert!(catalog.is_empty());
    }

    #[test]
    fn aliases_resolve_and_retire() {
        let mut catalog = ComponentCatalog::new();
        catalog.register::<Marker>("basic.marker").unwrap();
        catalog.alias("marker", "basic.marker");
        catalog.alias("old_marker", "marker");
        catalog.alias("gone", "");

        assert_eq!(catalog.find_component_class("marker").unwrap().name(), "basic.marker");
        assert_eq!(catalog.find_component_class("old_marker").unwrap().name(), "basic.marker");

        let err = catalog.find_component_class("gone").unwrap_err();
        assert!(err.is_type_not_found());
    }

    #[test]
    fn alias_cycle_terminates() {
        let mut catalog = ComponentCatalog::new();
        catalog.alias("a", "b");
        catalog.alias("b", "a");
        assert!(catalog.find_component_class("a").is_err());
    }
}
