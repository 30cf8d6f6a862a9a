use crate::fixtures;
use thicket_core::cfg_ir::{Module, Value, verify};
use thicket_utils::errors::IrError;

fn module() -> Module {
    Module {
        procedures: fixtures::all(),
    }
}

#[tokio::test]
async fn test_decoded_module_has_derived_state() {
    let text = module().to_json().unwrap();
    let decoded = Module::from_json(&text).unwrap();
    assert_eq!(decoded.procedures.len(), fixtures::all().len());

    let proc = decoded.procedure("cross_block").unwrap();
    verify::verify_procedure(proc).unwrap();
    let top = proc.layout[1];
    let t = proc.block(top).unwrap().insts[0];
    // read by the compare, the subtraction, the call, the merge and the final add
    assert_eq!(proc.users(Value::Inst(t)).len(), 5);
    assert_eq!(proc.successors(top).unwrap().len(), 2);
    assert_eq!(proc.cfg.edge_count(), 5);
}

#[tokio::test]
async fn test_malformed_module_is_rejected() {
    assert!(matches!(
        Module::from_json("{\"procedures\": 3}"),
        Err(IrError::Decode(_))
    ));
}

#[tokio::test]
async fn test_printer_lists_every_block() {
    let proc = fixtures::classify();
    let text = proc.to_string();
    assert!(text.starts_with("proc @classify(1)"));
    for name in ["entry:", "dispatch:", "zero:", "one:", "other:", "merge:"] {
        assert!(text.contains(name), "missing {name}");
    }
    assert!(text.contains("switch"));
    assert!(text.contains("phi"));
}
