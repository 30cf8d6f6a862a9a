use crate::fixtures;
use std::sync::Arc;
use thicket_core::cfg_ir::{Attribute, Module, verify};
use thicket_transform::observer::EventLog;
use thicket_transform::opaque_predicate::ParityPredicate;
use thicket_transform::{BogusControlFlow, BogusFlowConfig, Transform, pass};
use thicket_utils::seed::Seed;
use thicket_verification::DifferentialTester;

fn module() -> Module {
    let mut procedures = fixtures::all();
    procedures.push(fixtures::with_invoke());
    procedures.push(thicket_core::Procedure::new("external", 2));
    Module { procedures }
}

fn passes(config: BogusFlowConfig, log: Arc<EventLog>) -> Vec<Box<dyn Transform>> {
    let transform = BogusControlFlow::new(config, Box::new(ParityPredicate))
        .unwrap()
        .with_observer(log);
    vec![Box::new(transform)]
}

fn always() -> BogusFlowConfig {
    BogusFlowConfig {
        probability: 1.0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_module_pass_preserves_behaviour() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();
    let original = module();
    let mut transformed = original.clone();
    let log = Arc::new(EventLog::new());
    let report = pass::run(&mut transformed, &passes(always(), log.clone()), Seed::new(21)).unwrap();

    assert_eq!(report.seed, 21);
    assert_eq!(report.procedures.len(), original.procedures.len());
    assert_eq!(report.modified_count(), fixtures::all().len());
    for entry in &report.procedures {
        let grew = match (&entry.before, &entry.after) {
            (Some(b), Some(a)) => a.block_cnt > b.block_cnt,
            _ => false,
        };
        assert_eq!(entry.modified, grew, "{}", entry.name);
    }
    assert!(!log.is_empty());

    for proc in &transformed.procedures {
        verify::verify_procedure(proc).unwrap();
    }
    let results = DifferentialTester::new(24)
        .test_modules(&original, &transformed)
        .unwrap();
    assert!(results.iter().all(|r| r.overall_passed));
}

#[tokio::test]
async fn test_disqualified_and_declared_procedures_untouched() {
    let original = module();
    let mut transformed = original.clone();
    pass::run(
        &mut transformed,
        &passes(always(), Arc::new(EventLog::new())),
        Seed::new(1),
    )
    .unwrap();

    for name in ["with_invoke", "external"] {
        let before = original.procedure(name).unwrap();
        let after = transformed.procedure(name).unwrap();
        assert_eq!(after.to_string(), before.to_string());
        assert!(!after.has_attribute(Attribute::BogusFlowApplied));
    }
}

#[tokio::test]
async fn test_outcome_independent_of_module_order() {
    let config = BogusFlowConfig {
        probability: 0.5,
        ..Default::default()
    };
    let mut forward = module();
    let mut reversed = module();
    reversed.procedures.reverse();
    pass::run(
        &mut forward,
        &passes(config.clone(), Arc::new(EventLog::new())),
        Seed::new(77),
    )
    .unwrap();
    pass::run(
        &mut reversed,
        &passes(config, Arc::new(EventLog::new())),
        Seed::new(77),
    )
    .unwrap();

    for proc in &forward.procedures {
        let other = reversed.procedure(&proc.name).unwrap();
        assert_eq!(proc.to_string(), other.to_string(), "{}", proc.name);
    }
}

#[tokio::test]
async fn test_allow_list_limits_the_pass() {
    let config = BogusFlowConfig {
        allow_list: vec!["classify".into()],
        ..always()
    };
    let mut transformed = module();
    let report = pass::run(
        &mut transformed,
        &passes(config, Arc::new(EventLog::new())),
        Seed::new(3),
    )
    .unwrap();

    let modified: Vec<_> = report
        .procedures
        .iter()
        .filter(|p| p.modified)
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(modified, vec!["classify"]);
}
