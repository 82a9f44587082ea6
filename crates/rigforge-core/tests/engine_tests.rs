use pretty_assertions::assert_eq;
use rigforge_core::prelude::*;
use rigforge_core::{DiagnosticKind, RunPhase, UnregisteredUnitPolicy};
use rigforge_skeleton::{ScriptBuffer, Skeleton};
use rigforge_test_utils::{host_for, recorder, test_catalog, two_roots, Call, CallLog};

fn maker(name: &str, create: &[&str], register: bool) -> InputUnit {
    InputUnit::new(name)
        .component("test.maker")
        .param("create", serde_json::json!(create))
        .param("register", register)
}

#[test]
fn test_stage_major_ordering() {
    CallLog::clear();
    let catalog = test_catalog();
    let input = two_roots();
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.run(&input).unwrap();

    let expected: Vec<Call> = Stage::ALL
        .into_iter()
        .flat_map(|stage| {
            ["A", "B"].into_iter().map(move |entity| Call {
                entity: entity.to_string(),
                stage,
            })
        })
        .collect();
    assert_eq!(CallLog::take(), expected);
    assert!(generator.phase().is_finished());
}

#[test]
fn test_stages_one_at_a_time() {
    CallLog::clear();
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![recorder("A", &[])]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.instantiate_tree(&input).unwrap();
    generator.run_stage(Stage::Initialize).unwrap();
    generator.run_stage(Stage::PrepareStructure).unwrap();
    assert_eq!(generator.phase(), RunPhase::Completed(Stage::PrepareStructure));
    assert_eq!(generator.state().stage(), Some(Stage::PrepareStructure));

    generator.generate().unwrap();
    assert_eq!(CallLog::stages_of("A"), Stage::ALL.to_vec());
}

#[test]
fn test_stage_before_tree_rejected() {
    let catalog = test_catalog();
    let input = two_roots();
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    let err = generator.run_stage(Stage::Initialize).unwrap_err();
    assert!(matches!(err, GenerateError::StageOrder { expected: None, .. }));
}

#[test]
fn test_skipped_stage_rejected() {
    let catalog = test_catalog();
    let input = two_roots();
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());
    generator.instantiate_tree(&input).unwrap();

    let err = generator.run_stage(Stage::GenerateUnits).unwrap_err();
    match err {
        GenerateError::StageOrder { requested, expected, .. } => {
            assert_eq!(requested, Stage::GenerateUnits);
            assert_eq!(expected, Some(Stage::Initialize));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(generator.phase(), RunPhase::Instantiated);
}

#[test]
fn test_finished_run_cannot_restart() {
    let catalog = test_catalog();
    let input = two_roots();
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());
    generator.run(&input).unwrap();

    assert!(generator.run_stage(Stage::Finalize).is_err());
    assert!(matches!(
        generator.generate().unwrap_err(),
        GenerateError::StageOrder { .. }
    ));
}

#[test]
fn test_frozen_stage_unit_creation_is_violation() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![InputUnit::new("V").component("test.vandal")]);
    let mut skeleton = Skeleton::from_hierarchy(&input).with_enforce_modes(false);
    let mut script = ScriptBuffer::new();
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    let err = generator.run(&input).unwrap_err();

    assert!(matches!(err, GenerateError::StructuralInvariantViolation(_)));
    let violation = err.violation().unwrap();
    assert_eq!(violation.phase, "rig_units");
    assert!(violation.entity.contains("(V)"));
    assert!(violation.counted);
    assert_eq!(violation.expected.unit_count, 1);
    assert_eq!(violation.actual.unit_count, 2);
    assert_eq!(generator.phase(), RunPhase::Completed(Stage::ConfigureUnits));
}

#[test]
fn test_enforcing_host_refusal_is_violation() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![InputUnit::new("V").component("test.vandal")]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    let err = generator.run(&input).unwrap_err();

    assert!(err.is_invariant_violation(), "{err}");
    assert!(matches!(err, GenerateError::StructuralInvariantViolation(_)));
    let violation = err.violation().unwrap();
    assert_eq!(violation.phase, "rig_units");
    assert!(violation.entity.contains("test.vandal"));
    assert_eq!(violation.rejected, Some("create_unit"));
    assert_eq!(violation.actual.unit_count, 1);
    assert_eq!(generator.phase(), RunPhase::Completed(Stage::ConfigureUnits));
    drop(generator);
    assert!(!skeleton.contains("V.extra"));
}

#[test]
fn test_mode_switch_is_violation() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![InputUnit::new("F").component("test.flipper")]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    let err = generator.run(&input).unwrap_err();

    let violation = err.violation().unwrap();
    assert_eq!(violation.phase, "configure_units");
    assert_eq!(violation.expected.mode, StructuralMode::Frozen);
    assert_eq!(violation.actual.mode, StructuralMode::Editable);
}

#[test]
fn test_stage_failure_names_stage_and_component() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![
        recorder("A", &[]),
        InputUnit::new("Z").component("test.failing"),
    ]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    let err = generator.run(&input).unwrap_err();

    match &err {
        GenerateError::StageFailed { stage, entity, .. } => {
            assert_eq!(*stage, Stage::ParentUnits);
            assert!(entity.contains("test.failing"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("bone chain too short"));
    assert_eq!(generator.phase(), RunPhase::Completed(Stage::GenerateUnits));
}

#[test]
fn test_registered_units_carry_no_warning() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![maker("M", &["ctrl", "mch"], true)]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.run(&input).unwrap();
    let report = generator.finish();

    let component = report.component_at("M").unwrap();
    assert_eq!(component.new_units, vec![UnitName::from("ctrl"), UnitName::from("mch")]);
    assert_eq!(report.owner_of("ctrl"), Some(component.id));
    assert!(report.diagnostics.is_empty());
    assert!(skeleton.contains("mch"));
}

#[test]
fn test_renamed_unit_belongs_to_renamer() {
    let catalog = test_catalog();
    let renamer = InputUnit::new("B")
        .component("test.maker")
        .param("rename", serde_json::json!([["ctrl", "ctrl_B"]]));
    let input = InputHierarchy::new(vec![maker("A", &["ctrl"], true), renamer]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.run(&input).unwrap();
    let report = generator.finish();

    let a = report.component_at("A").unwrap();
    let b = report.component_at("B").unwrap();
    assert!(a.new_units.is_empty());
    assert_eq!(b.new_units, vec![UnitName::from("ctrl_B")]);
    assert_eq!(report.owner_of("ctrl_B"), Some(b.id));
    assert!(!report.ownership.contains_key("ctrl"));
    assert!(report.diagnostics.is_empty());
    assert!(skeleton.contains("ctrl_B"));
}

#[test]
fn test_unregistered_units_are_attributed_with_warning() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![maker("M", &["ghost"], false)]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.run(&input).unwrap();

    let state = generator.state();
    let id = state.roots()[0];
    assert_eq!(state.ownership().owner_of("ghost"), Some(id));
    let warnings: Vec<_> = state.diagnostics().of_kind(DiagnosticKind::UnregisteredUnit).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].component, Some(id));
}

#[test]
fn test_silent_policy_suppresses_warning() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![maker("M", &["ghost"], false)]);
    let (mut skeleton, mut script) = host_for(&input);
    let config = GeneratorConfig::new().with_unregistered_units(UnregisteredUnitPolicy::Silent);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, config);

    generator.run(&input).unwrap();

    let state = generator.state();
    assert!(state.ownership().owner_of("ghost").is_some());
    assert!(state.diagnostics().is_empty());
}

#[test]
fn test_plugin_created_units_are_unowned() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![InputUnit::new("M")
        .component("test.maker")
        .param("spawn", "widget")]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.run(&input).unwrap();

    let state = generator.state();
    assert_eq!(state.ownership().entry("widget"), Some(None));
    let warnings: Vec<_> = state.diagnostics().of_kind(DiagnosticKind::UnregisteredUnit).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].component, None);
    assert!(warnings[0].message.contains("spawner"));
}

#[test]
fn test_legacy_adapter_forwards_payload() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![InputUnit::new("L")
        .component("test.legacy")
        .param("leave_frozen", true)]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.run(&input).unwrap();
    let report = generator.finish();

    // legacy units are attributed without a warning
    let legacy = report.component_at("L").unwrap();
    assert_eq!(report.owner_of("LEG-L"), Some(legacy.id));
    assert!(report.diagnostics.is_empty());
    assert!(report.noparent.contains("LEG-L"));

    assert!(skeleton.contains("LEG-L"));
    assert_eq!(script.imports().collect::<Vec<_>>(), vec!["import math"]);
    assert_eq!(script.properties()["L_fk"], serde_json::json!(0.0));
}

#[test]
fn test_auto_parent_to_configured_root() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![
        recorder("A", &[]).child(InputUnit::new("x")),
        maker("M", &["ctrl"], true),
        InputUnit::new("L").component("test.legacy"),
    ]);
    let (mut skeleton, mut script) = host_for(&input);
    let config = GeneratorConfig::new().with_root_unit("root");
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, config);

    generator.run(&input).unwrap();
    let report = generator.finish();

    assert_eq!(report.plugins, vec!["auto_parent(\"root\")".to_string()]);
    assert_eq!(report.ownership.get("root"), Some(&None));

    for unit in ["A", "M", "L", "ctrl"] {
        assert_eq!(skeleton.parent_of(unit).unwrap(), "root", "unit {unit}");
    }
    assert_eq!(skeleton.parent_of("x").unwrap(), "A");
    assert!(skeleton.parent_of("root").is_none());
    assert!(skeleton.parent_of("LEG-L").is_none());
}

#[test]
fn test_report_summarizes_run() {
    let catalog = test_catalog();
    let input = two_roots();
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());
    let run_id = generator.state().run_id().to_string();

    generator.run(&input).unwrap();
    let report = generator.finish();

    assert_eq!(report.run_id, run_id);
    assert!(report.phase.is_finished());
    assert_eq!(report.components.len(), 2);
    assert_eq!(report.roots.len(), 2);
    assert!(report.to_string().contains(&run_id));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["components"][0]["base_unit"], "A");
}
