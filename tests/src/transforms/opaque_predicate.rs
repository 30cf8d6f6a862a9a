use rand::SeedableRng;
use rand::rngs::StdRng;
use thicket_core::cfg_ir::{InstKind, Procedure, Value};
use thicket_transform::opaque_predicate::{ConstantPredicate, OpaquePredicate, ParityPredicate};
use thicket_verification::{DifferentialTester, execute, interp::DEFAULT_FUEL};

/// `header` guards `taken: ret 1` against `never: ret 0`.
fn guarded(predicate: &dyn OpaquePredicate, arity: u32, seed: u64) -> Procedure {
    let mut proc = Procedure::new("guarded", arity);
    let header = proc.create_block(Some("header".into()), None);
    let taken = proc.create_block(Some("taken".into()), None);
    let never = proc.create_block(Some("never".into()), None);
    proc.append_inst(taken, InstKind::Ret { value: Some(Value::Const(1)) })
        .unwrap();
    proc.append_inst(never, InstKind::Ret { value: Some(Value::Const(0)) })
        .unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    predicate
        .create_guard(&mut proc, header, taken, never, &mut rng)
        .unwrap();
    proc
}

#[tokio::test]
async fn test_constant_guard_always_takes_true_target() {
    for seed in 0..32 {
        let proc = guarded(&ConstantPredicate, 0, seed);
        let out = execute(&proc, &[], DEFAULT_FUEL).unwrap();
        assert_eq!(out.ret, Some(1), "seed {seed}");
    }
}

#[tokio::test]
async fn test_parity_guard_holds_for_sampled_arguments() {
    let tester = DifferentialTester::new(64).with_seed(99);
    for seed in 0..8 {
        let proc = guarded(&ParityPredicate, 2, seed);
        for args in tester.argument_sets(2) {
            let out = execute(&proc, &args, DEFAULT_FUEL).unwrap();
            assert_eq!(out.ret, Some(1), "seed {seed}, args {args:?}");
        }
    }
    let constant_operand = guarded(&ParityPredicate, 0, 5);
    assert_eq!(
        execute(&constant_operand, &[], DEFAULT_FUEL).unwrap().ret,
        Some(1)
    );
}
