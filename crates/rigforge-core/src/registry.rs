//! Stage registry and dispatch
//!
//! A [`StageTable`] records, for one component or plugin type, which methods
//! run in which stage. Tables are built once per type by a
//! [`StageTableBuilder`], which merges the tables of any base types the type
//! embeds and then applies the type's own declarations:
//!
//! ```text
//! base tables (in inherit order) ──▶ merged stage map ──▶ own declarations ──▶ StageTable
//!                                         │                      │
//!                                         └─ conflict check      └─ tag / redeclare / hook
//! ```
//!
//! Dispatch runs every registered method of a stage in map order (base
//! methods before the type's own, each in declaration order), then the
//! stage's main hook if one is present.

use crate::context::StageContext;
use crate::error::{DefinitionError, StageResult};
use crate::stage::Stage;
use indexmap::{IndexMap, IndexSet};
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

/// Stage method bound to a type
pub type StageFn<T> = Rc<dyn Fn(&mut T, &mut StageContext<'_, '_>) -> StageResult>;

struct Registered<T> {
    declared_by: String,
    func: StageFn<T>,
}

impl<T> Clone for Registered<T> {
    fn clone(&self) -> Self {
        Self {
            declared_by: self.declared_by.clone(),
            func: Rc::clone(&self.func),
        }
    }
}

/// Per-type stage map
pub struct StageTable<T> {
    type_name: String,
    stages: IndexSet<String>,
    methods: IndexMap<String, IndexMap<String, Registered<T>>>,
    hooks: IndexMap<String, StageFn<T>>,
    notes: Vec<String>,
}

impl<T> Clone for StageTable<T> {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name.clone(),
            stages: self.stages.clone(),
            methods: self.methods.clone(),
            hooks: self.hooks.clone(),
            notes: self.notes.clone(),
        }
    }
}

impl<T> Debug for StageTable<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let methods: Vec<(&str, Vec<&str>)> = self
            .methods
            .iter()
            .map(|(stage, methods)| (stage.as_str(), methods.keys().map(String::as_str).collect()))
            .collect();
        f.debug_struct("StageTable")
            .field("type_name", &self.type_name)
            .field("methods", &methods)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<T: 'static> StageTable<T> {
    /// Start building a table with no legal stages
    #[inline]
    #[must_use]
    pub fn builder(type_name: impl Into<String>) -> StageTableBuilder<T> {
        StageTableBuilder::new(type_name)
    }

    /// Table with the engine stages and no methods
    #[must_use]
    pub fn empty(type_name: impl Into<String>) -> Self {
        let mut stages = IndexSet::new();
        stages.extend(Stage::NAMES.iter().map(|s| (*s).to_string()));
        Self {
            type_name: type_name.into(),
            stages,
            methods: IndexMap::new(),
            hooks: IndexMap::new(),
            notes: Vec::new(),
        }
    }

    /// Name the table was defined under
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Legal stage names in definition order
    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(String::as_str)
    }

    /// Check if `stage` is a legal stage name for this type
    #[inline]
    #[must_use]
    pub fn is_stage(&self, stage: &str) -> bool {
        self.stages.contains(stage)
    }

    /// Registered methods of a stage as `(method, declaring type)`, in call order
    #[must_use]
    pub fn methods(&self, stage: &str) -> Vec<(&str, &str)> {
        self.methods
            .get(stage)
            .map(|methods| {
                methods
                    .iter()
                    .map(|(name, reg)| (name.as_str(), reg.declared_by.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stage a method is bound to, if any
    #[must_use]
    pub fn stage_of(&self, method: &str) -> Option<&str> {
        self.methods
            .iter()
            .find(|(_, methods)| methods.contains_key(method))
            .map(|(stage, _)| stage.as_str())
    }

    /// Check if the stage has a main hook
    #[inline]
    #[must_use]
    pub fn has_hook(&self, stage: &str) -> bool {
        self.hooks.contains_key(stage)
    }

    /// Definition notes (inherited tags, moved methods)
    #[inline]
    #[must_use]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Check if the stage has anything to run
    #[must_use]
    pub fn participates(&self, stage: &str) -> bool {
        self.has_hook(stage) || self.methods.get(stage).is_some_and(|m| !m.is_empty())
    }

    /// Run every registered method of `stage`, then its main hook
    ///
    /// # Errors
    /// The first error returned by a method; later methods do not run.
    pub fn invoke(&self, this: &mut T, stage: &str, ctx: &mut StageContext<'_, '_>) -> StageResult {
        if let Some(methods) = self.methods.get(stage) {
            for (name, reg) in methods {
                tracing::trace!(type_name = %self.type_name, stage, method = %name, "stage method");
                (reg.func)(this, ctx)?;
            }
        }
        if let Some(hook) = self.hooks.get(stage) {
            tracing::trace!(type_name = %self.type_name, stage, "stage hook");
            hook(this, ctx)?;
        }
        Ok(())
    }
}

fn stage_fn<T, F>(func: F) -> StageFn<T>
where
    F: Fn(&mut T, &mut StageContext<'_, '_>) -> StageResult + 'static,
{
    Rc::new(func)
}

fn lift<T: 'static, B: 'static>(func: StageFn<B>, lens: fn(&mut T) -> &mut B) -> StageFn<T> {
    stage_fn(move |this: &mut T, ctx| func(lens(this), ctx))
}

enum Declaration<T> {
    Tagged {
        stage: String,
        method: String,
        func: StageFn<T>,
    },
    Untagged {
        method: String,
        func: StageFn<T>,
    },
    Hook {
        stage: String,
        func: StageFn<T>,
    },
}

/// Builder for [`StageTable`]
///
/// Inheritance is merged eagerly in [`inherit`](Self::inherit); the type's
/// own declarations are applied in [`build`](Self::build), once every legal
/// stage name is known.
pub struct StageTableBuilder<T> {
    table: StageTable<T>,
    declarations: Vec<Declaration<T>>,
    error: Option<DefinitionError>,
}

impl<T: 'static> StageTableBuilder<T> {
    /// Start a table with no legal stages
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            table: StageTable {
                type_name: type_name.into(),
                stages: IndexSet::new(),
                methods: IndexMap::new(),
                hooks: IndexMap::new(),
                notes: Vec::new(),
            },
            declarations: Vec::new(),
            error: None,
        }
    }

    /// Start a table seeded with the eight engine stages
    #[must_use]
    pub fn standard(type_name: impl Into<String>) -> Self {
        Self::new(type_name).define_stages(Stage::NAMES)
    }

    /// Seed legal stage names
    #[must_use]
    pub fn define_stages<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.table.methods.entry(name.clone()).or_default();
            self.table.stages.insert(name);
        }
        self
    }

    /// Merge a base type's table
    ///
    /// The base's methods and hooks are lifted through `lens`, which
    /// projects this type onto the embedded base. When called more than once,
    /// earlier bases keep their positions and hooks.
    #[must_use]
    pub fn inherit<B: 'static>(mut self, base: &StageTable<B>, lens: fn(&mut T) -> &mut B) -> Self {
        if self.error.is_some() {
            return self;
        }

        for stage in &base.stages {
            self.table.stages.insert(stage.clone());
            self.table.methods.entry(stage.clone()).or_default();
        }

        for (stage, methods) in &base.methods {
            for (method, reg) in methods {
                match self.table.stage_of(method).map(str::to_string) {
                    Some(existing) if existing != *stage => {
                        self.error = Some(DefinitionError::AmbiguousStage {
                            type_name: self.table.type_name.clone(),
                            method: method.clone(),
                            first: existing,
                            second: stage.clone(),
                        });
                        return self;
                    }
                    Some(_) => {}
                    None => {
                        let lifted = lift(Rc::clone(&reg.func), lens);
                        self.table.methods.entry(stage.clone()).or_default().insert(
                            method.clone(),
                            Registered {
                                declared_by: reg.declared_by.clone(),
                                func: lifted,
                            },
                        );
                    }
                }
            }
        }

        for (stage, hook) in &base.hooks {
            if !self.table.hooks.contains_key(stage) {
                self.table.hooks.insert(stage.clone(), lift(Rc::clone(hook), lens));
            }
        }

        self
    }

    /// Tag a method with a stage
    #[must_use]
    pub fn stage<F>(mut self, stage: impl Into<String>, method: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut T, &mut StageContext<'_, '_>) -> StageResult + 'static,
    {
        self.declarations.push(Declaration::Tagged {
            stage: stage.into(),
            method: method.into(),
            func: stage_fn(func),
        });
        self
    }

    /// Re-declare an inherited method without a tag, keeping its stage
    #[must_use]
    pub fn redeclare<F>(mut self, method: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut T, &mut StageContext<'_, '_>) -> StageResult + 'static,
    {
        self.declarations.push(Declaration::Untagged {
            method: method.into(),
            func: stage_fn(func),
        });
        self
    }

    /// Declare the main hook of a stage, replacing any inherited one
    #[must_use]
    pub fn hook<F>(mut self, stage: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut T, &mut StageContext<'_, '_>) -> StageResult + 'static,
    {
        self.declarations.push(Declaration::Hook {
            stage: stage.into(),
            func: stage_fn(func),
        });
        self
    }

    /// Apply own declarations and produce the table
    ///
    /// # Errors
    /// Returns the first [`DefinitionError`] found while merging.
    pub fn build(mut self) -> Result<StageTable<T>, DefinitionError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        let declarations = std::mem::take(&mut self.declarations);
        for declaration in declarations {
            match declaration {
                Declaration::Tagged { stage, method, func } => self.apply_tagged(stage, method, func)?,
                Declaration::Untagged { method, func } => self.apply_untagged(method, func)?,
                Declaration::Hook { stage, func } => {
                    if !self.table.is_stage(&stage) {
                        return Err(DefinitionError::UnknownHookStage {
                            type_name: self.table.type_name.clone(),
                            stage,
                        });
                    }
                    self.table.hooks.insert(stage, func);
                }
            }
        }

        for note in &self.table.notes {
            tracing::warn!(type_name = %self.table.type_name, "{}", note);
        }
        Ok(self.table)
    }

    fn apply_tagged(
        &mut self,
        stage: String,
        method: String,
        func: StageFn<T>,
    ) -> Result<(), DefinitionError> {
        let type_name = self.table.type_name.clone();
        if self.table.is_stage(&method) {
            return Err(DefinitionError::StageNamedMethod { type_name, method });
        }
        if !self.table.is_stage(&stage) {
            return Err(DefinitionError::UnknownStage {
                type_name,
                method,
                stage,
            });
        }

        let registered = Registered {
            declared_by: type_name,
            func,
        };
        match self.table.stage_of(&method).map(str::to_string) {
            Some(existing) if existing == stage => {
                self.table
                    .notes
                    .push(format!("redundant stage tag '{stage}' on method '{method}'"));
                if let Some(slot) = self.table.methods.get_mut(&stage).and_then(|m| m.get_mut(&method)) {
                    *slot = registered;
                }
            }
            Some(existing) => {
                self.table.notes.push(format!(
                    "moving method '{method}' from stage '{existing}' to '{stage}'"
                ));
                if let Some(methods) = self.table.methods.get_mut(&existing) {
                    methods.shift_remove(&method);
                }
                self.table.methods.entry(stage).or_default().insert(method, registered);
            }
            None => {
                self.table.methods.entry(stage).or_default().insert(method, registered);
            }
        }
        Ok(())
    }

    fn apply_untagged(&mut self, method: String, func: StageFn<T>) -> Result<(), DefinitionError> {
        let type_name = self.table.type_name.clone();
        let Some(stage) = self.table.stage_of(&method).map(str::to_string) else {
            return Err(DefinitionError::NothingToRedeclare { type_name, method });
        };

        self.table
            .notes
            .push(format!("method '{method}' inherits stage '{stage}'"));
        if let Some(slot) = self.table.methods.get_mut(&stage).and_then(|m| m.get_mut(&method)) {
            *slot = Registered {
                declared_by: type_name,
                func,
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Base {
        calls: Vec<&'static str>,
    }

    #[derive(Default)]
    struct Derived {
        base: Base,
    }

    fn base_of(d: &mut Derived) -> &mut Base {
        &mut d.base
    }

    fn base_table() -> StageTable<Base> {
        StageTableBuilder::standard("Base")
            .stage("generate_units", "make_chain", |b: &mut Base, _| {
                b.calls.push("make_chain");
                Ok(())
            })
            .stage("generate_units", "make_tweaks", |b: &mut Base, _| {
                b.calls.push("make_tweaks");
                Ok(())
            })
            .stage("parent_units", "parent_chain", |b: &mut Base, _| {
                b.calls.push("parent_chain");
                Ok(())
            })
            .hook("generate_units", |b: &mut Base, _| {
                b.calls.push("base_hook");
                Ok(())
            })
            .build()
            .unwrap()
    }

    #[test]
    fn standard_table_has_engine_stages() {
        let table: StageTable<Base> = StageTableBuilder::standard("Empty").build().unwrap();
        assert_eq!(table.stages().collect::<Vec<_>>(), Stage::NAMES.to_vec());
        assert!(!table.participates("initialize"));
    }

    #[test]
    fn inherited_methods_keep_order() {
        let table = StageTableBuilder::<Derived>::standard("Derived")
            .inherit(&base_table(), base_of)
            .stage("generate_units", "make_extra", |_d: &mut Derived, _| Ok(()))
            .build()
            .unwrap();

        assert_eq!(
            table.methods("generate_units"),
            vec![
                ("make_chain", "Base"),
                ("make_tweaks", "Base"),
                ("make_extra", "Derived")
            ]
        );
        assert!(table.has_hook("generate_units"));
    }

    #[test]
    fn tagging_a_stage_name_is_rejected() {
        let err = StageTableBuilder::<Base>::standard("Bad")
            .stage("generate_units", "parent_units", |_b: &mut Base, _| Ok(()))
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::StageNamedMethod { .. }));
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let err = StageTableBuilder::<Base>::standard("Bad")
            .stage("generate_bones", "make", |_b: &mut Base, _| Ok(()))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::UnknownStage {
                type_name: "Bad".into(),
                method: "make".into(),
                stage: "generate_bones".into(),
            }
        );
    }

    #[test]
    fn unknown_hook_stage_is_rejected() {
        let err = StageTableBuilder::<Base>::standard("Bad")
            .hook("cleanup", |_b: &mut Base, _| Ok(()))
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownHookStage { .. }));
    }

    #[test]
    fn untagged_redeclare_inherits_stage() {
        let table = StageTableBuilder::<Derived>::standard("Derived")
            .inherit(&base_table(), base_of)
            .redeclare("make_chain", |_d: &mut Derived, _| Ok(()))
            .build()
            .unwrap();

        assert_eq!(table.stage_of("make_chain"), Some("generate_units"));
        assert_eq!(table.methods("generate_units")[0], ("make_chain", "Derived"));
        assert_eq!(table.notes().len(), 1);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn definition_notes_are_logged_as_warnings() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            StageTableBuilder::<Derived>::standard("Derived")
                .inherit(&base_table(), base_of)
                .redeclare("make_chain", |_d: &mut Derived, _| Ok(()))
                .stage("parent_units", "make_tweaks", |_d: &mut Derived, _| Ok(()))
                .build()
                .unwrap();
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let warnings: Vec<&str> = output.lines().filter(|line| line.contains("WARN")).collect();
        assert_eq!(warnings.len(), 2, "{output}");
        assert!(warnings.iter().any(|line| line.contains("make_chain")));
        assert!(warnings.iter().any(|line| line.contains("moving method 'make_tweaks'")));
    }

    #[test]
    fn redeclare_without_base_is_rejected() {
        let err = StageTableBuilder::<Base>::standard("Bad")
            .redeclare("anything", |_b: &mut Base, _| Ok(()))
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::NothingToRedeclare { .. }));
    }

    #[test]
    fn explicit_retag_moves_method() {
        let table = StageTableBuilder::<Derived>::standard("Derived")
            .inherit(&base_table(), base_of)
            .stage("parent_units", "make_tweaks", |_d: &mut Derived, _| Ok(()))
            .build()
            .unwrap();

        assert_eq!(table.stage_of("make_tweaks"), Some("parent_units"));
        assert_eq!(
            table.methods("parent_units"),
            vec![("parent_chain", "Base"), ("make_tweaks", "Derived")]
        );
        assert!(table.notes()[0].contains("moving method 'make_tweaks'"));
    }

    #[test]
    fn conflicting_bases_are_ambiguous() {
        struct Both {
            a: Base,
            b: Base,
        }
        let other = StageTableBuilder::<Base>::standard("Other")
            .stage("rig_units", "make_chain", |_b: &mut Base, _| Ok(()))
            .build()
            .unwrap();

        let err = StageTableBuilder::<Both>::standard("Both")
            .inherit(&base_table(), |t| &mut t.a)
            .inherit(&other, |t| &mut t.b)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::AmbiguousStage {
                type_name: "Both".into(),
                method: "make_chain".into(),
                first: "generate_units".into(),
                second: "rig_units".into(),
            }
        );
    }

    #[test]
    fn shared_base_registration_is_merged_once() {
        struct Diamond {
            left: Base,
            right: Base,
        }
        let table = StageTableBuilder::<Diamond>::standard("Diamond")
            .inherit(&base_table(), |t| &mut t.left)
            .inherit(&base_table(), |t| &mut t.right)
            .build()
            .unwrap();
        assert_eq!(table.methods("generate_units").len(), 2);
    }

    #[test]
    fn custom_stages_extend_standard_set() {
        let table = StageTableBuilder::<Base>::standard("Custom")
            .define_stages(["bake_weights"])
            .stage("bake_weights", "bake", |_b: &mut Base, _| Ok(()))
            .build()
            .unwrap();
        assert!(table.is_stage("bake_weights"));
        assert_eq!(table.methods("bake_weights"), vec![("bake", "Custom")]);
    }
}
