use crate::fixtures;
use thicket_core::cfg_ir::{InstKind, ProcedureBuilder, Value, demote, verify};
use thicket_utils::errors::IrError;
use thicket_verification::{DifferentialTester, execute, interp::DEFAULT_FUEL};

#[tokio::test]
async fn test_bulk_demotion_preserves_behaviour() {
    for original in fixtures::all() {
        let mut demoted = original.clone();
        let phis = demote::collect_phis(&demoted).unwrap();
        let count = demote::demote_phis(&mut demoted, &phis).unwrap();
        assert_eq!(count, phis.len());
        assert!(demote::collect_phis(&demoted).unwrap().is_empty());
        verify::verify_procedure(&demoted).unwrap();

        let results = DifferentialTester::new(24)
            .test_equivalence(&original, &demoted)
            .unwrap();
        assert!(results.overall_passed, "{} diverged", original.name);
    }
}

#[tokio::test]
async fn test_slots_live_in_entry_block() {
    let mut proc = fixtures::sum_to();
    let phis = demote::collect_phis(&proc).unwrap();
    demote::demote_phis(&mut proc, &phis).unwrap();

    let entry = proc.entry().unwrap();
    let allocas = proc
        .insts()
        .filter(|(_, data)| matches!(data.kind, InstKind::Alloca))
        .map(|(_, data)| data.block)
        .collect::<Vec<_>>();
    assert_eq!(allocas.len(), 2);
    assert!(allocas.iter().all(|b| *b == entry));
    assert_eq!(execute(&proc, &[4], DEFAULT_FUEL).unwrap().ret, Some(18));
}

#[tokio::test]
async fn test_phi_naming_stranger_is_rejected() {
    let mut b = ProcedureBuilder::new("bad", 0);
    let entry = b.block("entry");
    let exit = b.block("exit");
    b.br(entry, exit);
    b.ret(exit, None);
    let mut proc = b.finish().unwrap();

    let orphan = proc.create_block(Some("orphan".into()), None);
    let phi = proc
        .insert_phi(exit, vec![(entry, Value::Const(1)), (orphan, Value::Const(2))])
        .unwrap();
    assert!(matches!(
        demote::demote_phi(&mut proc, phi),
        Err(IrError::PhiPredecessorMismatch { .. })
    ));
}
