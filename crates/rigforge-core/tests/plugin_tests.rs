use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rigforge_core::prelude::*;
use rigforge_test_utils::{
    host_for, recorder, requester, test_catalog, CallLog, NestingPlugin, RecordingPlugin,
};

#[test]
fn test_same_args_share_one_instance() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![
        requester("P1", &[(0, 1, 2), (0, 1, 2), (0, 1, 3)]),
        requester("P2", &[(0, 1, 2)]),
    ]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.run(&input).unwrap();

    let plugins = generator.state().plugins();
    assert_eq!(plugins.len(), 2);
    let first = plugins.get::<RecordingPlugin<0>>(&(1, 2)).unwrap();
    let again = plugins.get::<RecordingPlugin<0>>(&(1, 2)).unwrap();
    let other = plugins.get::<RecordingPlugin<0>>(&(1, 3)).unwrap();
    assert!(first.ptr_eq(&again));
    assert!(!first.ptr_eq(&other));
    assert_eq!(first.borrow().args, (1, 2));
    assert!(plugins.get::<RecordingPlugin<5>>(&(1, 2)).is_none());
}

#[test]
fn test_plugins_run_after_components_by_priority() {
    CallLog::clear();
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![
        recorder("A", &[]),
        requester("P", &[(0, 1, 1), (10, 2, 2), (5, 3, 3), (0, 4, 4)]),
    ]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.run(&input).unwrap();

    assert_eq!(generator.state().plugins().priorities(), vec![10, 5, 0, 0]);

    let finalize: Vec<String> = CallLog::take()
        .into_iter()
        .filter(|call| call.stage == Stage::Finalize)
        .map(|call| call.entity)
        .collect();
    assert_eq!(
        finalize,
        vec![
            "A".to_string(),
            RecordingPlugin::<10>::label((2, 2)),
            RecordingPlugin::<5>::label((3, 3)),
            RecordingPlugin::<0>::label((1, 1)),
            RecordingPlugin::<0>::label((4, 4)),
        ]
    );
}

#[test]
fn test_plugin_requested_in_stage_joins_that_stage() {
    CallLog::clear();
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![requester("P", &[(0, 1, 1)])]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.run(&input).unwrap();

    let label = RecordingPlugin::<0>::label((1, 1));
    assert_eq!(CallLog::stages_of(&label), Stage::ALL.to_vec());
    let plugin = generator
        .state()
        .plugins()
        .get::<RecordingPlugin<0>>(&(1, 1))
        .unwrap();
    assert_eq!(plugin.borrow().created_in, Some(Stage::Initialize));
}

#[test]
fn test_plugin_constructor_may_request_plugins() {
    let catalog = test_catalog();
    let input = InputHierarchy::new(vec![InputUnit::new("P")
        .component("test.requester")
        .param("nesting", true)]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.run(&input).unwrap();

    let plugins = generator.state().plugins();
    assert_eq!(plugins.len(), 2);
    let nesting = plugins.get::<NestingPlugin>(&()).unwrap();
    let inner = plugins.get::<RecordingPlugin<5>>(&(7, 7)).unwrap();
    assert!(nesting.borrow().inner.ptr_eq(&inner));
    assert_eq!(
        plugins.labels(),
        vec!["recording((7, 7))".to_string(), "nesting(())".to_string()]
    );
}

#[test]
fn test_registered_plugin_table_is_used() {
    let mut catalog = test_catalog();
    catalog.register_plugin::<RecordingPlugin<10>>().unwrap();
    assert_eq!(catalog.plugin_names(), &["recording"]);

    let input = InputHierarchy::new(vec![requester("P", &[(10, 1, 1)])]);
    let (mut skeleton, mut script) = host_for(&input);
    let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

    generator.run(&input).unwrap();
    assert_eq!(generator.state().plugins().len(), 1);
}

fn expected_schedule(requests: &[(i32, i32, i32)]) -> Vec<(i32, String)> {
    let mut seen = Vec::new();
    for &(priority, a, b) in requests {
        let rank = if priority == 10 || priority == 5 { priority } else { 0 };
        if !seen.contains(&(rank, a, b)) {
            seen.push((rank, a, b));
        }
    }
    // stable: equal priorities stay in first-request order
    seen.sort_by_key(|&(rank, _, _)| std::cmp::Reverse(rank));
    seen.into_iter()
        .map(|(rank, a, b)| {
            let label = match rank {
                10 => RecordingPlugin::<10>::label((a, b)),
                5 => RecordingPlugin::<5>::label((a, b)),
                _ => RecordingPlugin::<0>::label((a, b)),
            };
            (rank, label)
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_plugins_ordered_by_priority_then_construction(
        requests in proptest::collection::vec(
            (proptest::sample::select(vec![0, 5, 10]), 0..3i32, 0..3i32),
            1..16,
        )
    ) {
        CallLog::clear();
        let catalog = test_catalog();
        let input = InputHierarchy::new(vec![requester("P", &requests)]);
        let (mut skeleton, mut script) = host_for(&input);
        let mut generator = Generator::new(&catalog, &mut skeleton, &mut script, GeneratorConfig::new());

        generator.run(&input).unwrap();

        let priorities = generator.state().plugins().priorities();
        prop_assert!(priorities.windows(2).all(|pair| pair[0] >= pair[1]));

        let expected = expected_schedule(&requests);
        let expected_priorities: Vec<i32> = expected.iter().map(|(rank, _)| *rank).collect();
        prop_assert_eq!(priorities, expected_priorities);

        let finalize: Vec<String> = CallLog::take()
            .into_iter()
            .filter(|call| call.stage == Stage::Finalize)
            .map(|call| call.entity)
            .collect();
        let expected_labels: Vec<String> = expected.into_iter().map(|(_, label)| label).collect();
        prop_assert_eq!(finalize, expected_labels);
    }
}
