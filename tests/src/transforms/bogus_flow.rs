use crate::fixtures;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value as Json;
use thicket_core::cfg_ir::{
    Attribute, BinOp, BlockId, CmpPred, InstKind, Module, Procedure, ProcedureBuilder, Value, verify,
};
use thicket_transform::bogus_flow::split_and_clone;
use thicket_transform::driver::run;
use thicket_transform::observer::{EventLog, NoopObserver, TraceEvent};
use thicket_transform::opaque_predicate::{ConstantPredicate, OpaquePredicate, ParityPredicate};
use thicket_transform::{BogusFlowConfig, Outcome};
use thicket_utils::errors::TransformError;
use thicket_verification::{DifferentialTester, execute, interp::DEFAULT_FUEL};

fn config(probability: f64) -> BogusFlowConfig {
    BogusFlowConfig {
        probability,
        ..Default::default()
    }
}

fn obfuscate(original: &Procedure, probability: f64, seed: u64) -> (Procedure, Outcome) {
    let mut proc = original.clone();
    let mut rng = StdRng::seed_from_u64(seed);
    let outcome = run(
        &mut proc,
        &config(probability),
        &mut rng,
        &ConstantPredicate,
        &NoopObserver,
    )
    .unwrap();
    (proc, outcome)
}

fn names(proc: &Procedure) -> Vec<String> {
    proc.layout.iter().map(|b| proc.block_name(*b)).collect()
}

#[tokio::test]
async fn test_straight_line_scenario() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
    let original = fixtures::straight_line();
    let (proc, outcome) = obfuscate(&original, 1.0, 3);
    assert_eq!(outcome, Outcome::Modified);
    verify::verify_procedure(&proc).unwrap();

    let names = names(&proc);
    assert!(names.contains(&"A_original".to_string()));
    assert!(names.contains(&"A_clone".to_string()));
    assert_eq!(proc.block_count(), 5);

    let out = execute(&proc, &[], DEFAULT_FUEL).unwrap();
    assert_eq!(out.ret, Some(2));
    // both copies call `tick`; only the one taken at runtime shows up
    assert_eq!(out.effects.len(), 1);
    assert_eq!(out.effects[0].args, vec![2]);
}

#[tokio::test]
async fn test_behaviour_preserved_across_seeds() {
    let tester = DifferentialTester::new(24);
    let predicates: [&dyn OpaquePredicate; 2] = [&ConstantPredicate, &ParityPredicate];
    for original in fixtures::all() {
        for predicate in predicates {
            for seed in 0..8u64 {
                for probability in [0.5, 1.0] {
                    let mut proc = original.clone();
                    let mut rng = StdRng::seed_from_u64(seed);
                    run(
                        &mut proc,
                        &config(probability),
                        &mut rng,
                        predicate,
                        &NoopObserver,
                    )
                    .unwrap();
                    verify::verify_procedure(&proc).unwrap_or_else(|e| {
                        panic!("{} ({}, seed {seed}): {e}\n{proc}", original.name, predicate.name())
                    });
                    let results = tester.test_equivalence(&original, &proc).unwrap();
                    assert!(
                        results.overall_passed,
                        "{} ({}, seed {seed}) diverged: {:?}",
                        original.name,
                        predicate.name(),
                        results.mismatches
                    );
                }
            }
        }
    }
}

#[tokio::test]
async fn test_full_probability_block_counts() {
    // (procedure, blocks before, eligible blocks, eligible blocks with several successors)
    let cases = [
        (fixtures::straight_line(), 3, 1, 0),
        (fixtures::sum_to(), 4, 3, 1),
        (fixtures::classify(), 6, 4, 1),
        (fixtures::cross_block(), 5, 4, 1),
        (fixtures::guarded_entry(), 3, 1, 0),
    ];
    for (original, before, eligible, joins) in cases {
        assert_eq!(original.block_count(), before);
        let (proc, outcome) = obfuscate(&original, 1.0, 11);
        assert_eq!(outcome, Outcome::Modified);
        assert_eq!(
            proc.block_count(),
            before + 2 * eligible + joins,
            "{}",
            original.name
        );
    }
}

#[tokio::test]
async fn test_zero_probability_is_identity() {
    for original in fixtures::all() {
        let (proc, outcome) = obfuscate(&original, 0.0, 5);
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(proc.to_string(), original.to_string());
    }
}

#[tokio::test]
async fn test_entry_and_landing_pad_never_split() {
    let original = fixtures::guarded_entry();
    let (proc, _) = obfuscate(&original, 1.0, 2);
    let names = names(&proc);
    for forbidden in ["entry_original", "entry_clone", "pad_original", "pad_clone"] {
        assert!(!names.iter().any(|n| n == forbidden), "{forbidden} exists");
    }
    assert!(names.iter().any(|n| n == "work_clone"));

    let entry = proc.entry().unwrap();
    assert_eq!(
        proc.block(entry).unwrap().insts,
        original.block(original.entry().unwrap()).unwrap().insts
    );
}

#[tokio::test]
async fn test_unsupported_control_flow_disqualifies() {
    let original = fixtures::with_invoke();
    let mut proc = original.clone();
    let mut rng = StdRng::seed_from_u64(1);
    let log = EventLog::new();
    let outcome = run(&mut proc, &config(1.0), &mut rng, &ConstantPredicate, &log).unwrap();

    assert_eq!(outcome, Outcome::Unchanged);
    assert_eq!(proc.to_string(), original.to_string());
    assert!(matches!(
        log.events().as_slice(),
        [TraceEvent::ProcedureDisqualified { block, .. }] if block == "work"
    ));
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let (mut proc, outcome) = obfuscate(&fixtures::cross_block(), 1.0, 9);
    assert_eq!(outcome, Outcome::Modified);
    assert!(proc.has_attribute(Attribute::BogusFlowApplied));
    let snapshot = proc.to_string();

    let mut rng = StdRng::seed_from_u64(10);
    let again = run(
        &mut proc,
        &config(1.0),
        &mut rng,
        &ConstantPredicate,
        &NoopObserver,
    )
    .unwrap();
    assert_eq!(again, Outcome::Unchanged);
    assert_eq!(proc.to_string(), snapshot);
}

#[tokio::test]
async fn test_events_describe_each_split() {
    let mut proc = fixtures::sum_to();
    let mut rng = StdRng::seed_from_u64(4);
    let log = EventLog::new();
    run(&mut proc, &config(1.0), &mut rng, &ParityPredicate, &log).unwrap();

    let events = log.events();
    let transformed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TraceEvent::BlockTransformed { block, join, .. } => Some((block.clone(), join.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(transformed.len(), 3);
    assert!(transformed.contains(&("head".to_string(), Some("head_join".to_string()))));
    assert!(transformed.contains(&("exit".to_string(), None)));
    let guards = events
        .iter()
        .filter(|e| matches!(e, TraceEvent::GuardInstalled { predicate, .. } if predicate == "parity"))
        .count();
    assert_eq!(guards, 3);
    assert!(events.iter().any(|e| matches!(
        e,
        TraceEvent::BlockSkipped { block, .. } if block == "entry"
    )));
}

/// Sends every guard to the clone, so the clone's body is the one that runs.
struct CloneBranch;

impl OpaquePredicate for CloneBranch {
    fn name(&self) -> &'static str {
        "clone_branch"
    }

    fn create_guard(
        &self,
        proc: &mut Procedure,
        header: BlockId,
        true_target: BlockId,
        false_target: BlockId,
        _rng: &mut StdRng,
    ) -> Result<(), TransformError> {
        proc.append_inst(
            header,
            InstKind::CondBr {
                cond: Value::Const(0),
                then_dest: true_target,
                else_dest: false_target,
            },
        )?;
        Ok(())
    }
}

/// `B` feeds the merge in `J` only through the back edge from `P`.
fn back_edge_merge() -> Procedure {
    let mut b = ProcedureBuilder::new("back_edge_merge", 1);
    let entry = b.block("entry");
    let body = b.block("B");
    let join = b.block("J");
    let back = b.block("P");
    let exit = b.block("exit");
    b.br(entry, body);
    let i = b.binary(body, BinOp::Add, Value::Arg(0), Value::Const(1));
    b.br(body, join);
    let k = b.phi(join, vec![(body, Value::Const(0))]);
    b.call(join, "tick", vec![k]);
    let c = b.cmp(join, CmpPred::Eq, k, Value::Const(0));
    b.cond_br(join, c, back, exit);
    b.br(back, join);
    b.add_incoming(k, back, i);
    b.ret(exit, Some(k));
    b.finish().unwrap()
}

#[tokio::test]
async fn test_clone_path_through_back_edge_merge() {
    let original = back_edge_merge();
    let body = original.layout[1];
    let mut proc = original.clone();
    let mut rng = StdRng::seed_from_u64(0);
    split_and_clone(&mut proc, body, &CloneBranch, &mut rng, &NoopObserver)
        .unwrap()
        .unwrap();
    verify::verify_procedure(&proc).unwrap();

    for arg in [4, 0, 100] {
        let expected = execute(&original, &[arg], DEFAULT_FUEL).unwrap();
        let actual = execute(&proc, &[arg], DEFAULT_FUEL).unwrap();
        assert_eq!(actual.ret, Some(arg + 1));
        assert_eq!(actual.ret, expected.ret);
        assert_eq!(actual.effects, expected.effects);
    }
}

#[tokio::test]
async fn test_transformed_module_survives_json() {
    let (proc, _) = obfuscate(&fixtures::sum_to(), 1.0, 6);
    let text = Module {
        procedures: vec![proc.clone()],
    }
    .to_json()
    .unwrap();

    let raw: Json = serde_json::from_str(&text).unwrap();
    let encoded = &raw["procedures"][0];
    assert_eq!(encoded["name"], "sum_to");
    assert!(
        encoded["attributes"]
            .as_array()
            .unwrap()
            .contains(&Json::from("BogusFlowApplied"))
    );
    assert!(encoded.get("uses").is_none(), "use-lists are derived");

    let decoded = Module::from_json(&text).unwrap();
    let back = decoded.procedure("sum_to").unwrap();
    verify::verify_procedure(back).unwrap();
    assert_eq!(back.to_string(), proc.to_string());
    for n in [0, 1, 5] {
        assert_eq!(
            execute(back, &[n], DEFAULT_FUEL).unwrap(),
            execute(&proc, &[n], DEFAULT_FUEL).unwrap()
        );
    }
}
