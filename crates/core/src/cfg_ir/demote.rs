//! PHI demotion: rewriting SSA merges into stack-slot traffic.
//!
//! A PHI `p = phi [v0, b0], [v1, b1], ...` in block `B` becomes
//!
//! ```text
//! entry:  %slot = alloca
//! b0:     store %slot, v0      ; before the terminator
//! b1:     store %slot, v1
//! B:      %l = load %slot      ; at the PHI's position
//! ```
//!
//! and every use of `p` reads `%l`. Predecessors of `B` that the PHI does not list store
//! nothing, so the slot keeps the value written on the most recent listed edge.

use thicket_utils::errors::IrError;

use super::{BlockId, InstId, InstKind, Procedure, Value};

/// Every PHI currently in the procedure, in layout order.
pub fn collect_phis(proc: &Procedure) -> Result<Vec<InstId>, IrError> {
    let mut phis = Vec::new();
    for &block in &proc.layout {
        phis.extend(proc.phis(block)?);
    }
    Ok(phis)
}

/// Demotes one PHI to a stack slot, returning the slot.
///
/// Fails when the PHI names a block that is not one of its block's predecessors.
pub fn demote_phi(proc: &mut Procedure, phi: InstId) -> Result<Value, IrError> {
    let InstKind::Phi { incoming } = proc.kind(phi)?.clone() else {
        return Err(IrError::NotAPhi(phi.index()));
    };
    let block = proc.parent(phi)?;
    let preds = proc.predecessors(block);
    if let Some((bad, _)) = incoming.iter().find(|(b, _)| !preds.contains(b)) {
        return Err(IrError::PhiPredecessorMismatch {
            phi: phi.index(),
            block: bad.index(),
        });
    }

    let entry = proc
        .entry()
        .ok_or_else(|| IrError::NoEntryBlock(proc.name.clone()))?;
    let slot_index = proc.phi_count(entry)?;
    let slot = Value::Inst(proc.insert_inst(entry, slot_index, InstKind::Alloca)?);

    for (pred, value) in incoming {
        store_on_edge(proc, pred, slot, value)?;
    }

    // the slot must precede the load when the PHI lives in the entry block itself
    let load_index = if block == entry {
        slot_index + 1
    } else {
        proc.phi_count(block)?
    };
    let load = Value::Inst(proc.insert_inst(block, load_index, InstKind::Load { slot })?);
    proc.replace_all_uses(Value::Inst(phi), load)?;
    proc.remove_inst(phi)?;

    tracing::debug!(
        "Demoted phi %{} in {} to slot {}",
        phi.0,
        proc.block_name(block),
        slot
    );
    Ok(slot)
}

fn store_on_edge(
    proc: &mut Procedure,
    pred: BlockId,
    slot: Value,
    value: Value,
) -> Result<(), IrError> {
    if proc.terminator(pred)?.is_none() {
        return Err(IrError::MissingTerminator(pred.index()));
    }
    proc.insert_before_terminator(pred, InstKind::Store { slot, value })?;
    Ok(())
}

/// Demotes each listed PHI in order.
pub fn demote_phis(proc: &mut Procedure, phis: &[InstId]) -> Result<usize, IrError> {
    for &phi in phis {
        demote_phi(proc, phi)?;
    }
    Ok(phis.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg_ir::{BinOp, CmpPred, ProcedureBuilder, verify};

    #[test]
    fn test_demote_loop_phi() {
        // sum = 0; i = 0; while i < n { sum += i; i += 1 }; return sum
        let mut b = ProcedureBuilder::new("sum", 1);
        let entry = b.block("entry");
        let head = b.block("head");
        let body = b.block("body");
        let exit = b.block("exit");
        b.br(entry, head);
        let i = b.phi(head, vec![(entry, Value::Const(0))]);
        let sum = b.phi(head, vec![(entry, Value::Const(0))]);
        let c = b.cmp(head, CmpPred::Slt, i, Value::Arg(0));
        b.cond_br(head, c, body, exit);
        let sum2 = b.binary(body, BinOp::Add, sum, i);
        let i2 = b.binary(body, BinOp::Add, i, Value::Const(1));
        b.br(body, head);
        b.add_incoming(i, body, i2);
        b.add_incoming(sum, body, sum2);
        b.ret(exit, Some(sum));
        let mut proc = b.finish().unwrap();

        let phis = collect_phis(&proc).unwrap();
        assert_eq!(phis.len(), 2);
        demote_phis(&mut proc, &phis).unwrap();

        assert!(collect_phis(&proc).unwrap().is_empty());
        let allocas = proc
            .insts()
            .filter(|(_, d)| matches!(d.kind, InstKind::Alloca))
            .count();
        let stores = proc
            .insts()
            .filter(|(_, d)| matches!(d.kind, InstKind::Store { .. }))
            .count();
        assert_eq!(allocas, 2);
        assert_eq!(stores, 4);
        verify::verify_procedure(&proc).unwrap();
    }

    #[test]
    fn test_demote_rejects_foreign_predecessor() {
        let mut b = ProcedureBuilder::new("f", 0);
        let entry = b.block("entry");
        let other = b.block("other");
        let exit = b.block("exit");
        b.br(entry, exit);
        b.ret(other, None);
        let phi = b.phi(exit, vec![(entry, Value::Const(1)), (other, Value::Const(2))]);
        b.ret(exit, Some(phi));
        let mut proc = b.finish().unwrap();

        let err = demote_phi(&mut proc, phi.as_inst().unwrap()).unwrap_err();
        assert!(matches!(err, IrError::PhiPredecessorMismatch { .. }));
    }

    #[test]
    fn test_demote_non_phi_fails() {
        let mut b = ProcedureBuilder::new("f", 0);
        let entry = b.block("entry");
        let x = b.binary(entry, BinOp::Add, Value::Const(1), Value::Const(1));
        b.ret(entry, Some(x));
        let mut proc = b.finish().unwrap();
        assert!(matches!(
            demote_phi(&mut proc, x.as_inst().unwrap()),
            Err(IrError::NotAPhi(_))
        ));
    }
}
