//! Structural verification of a procedure.
//!
//! Checks the invariants every transform must preserve: block shape, PHI completeness against
//! the real predecessor set, operand liveness, def-use index consistency, edge/terminator
//! agreement and SSA dominance. Unreachable blocks are exempt from the dominance check.

use petgraph::algo::dominators::{Dominators, simple_fast};
use std::collections::HashSet;
use thicket_utils::errors::IrError;

use super::uses::UseMap;
use super::{BlockId, InstId, InstKind, Procedure, Value};

macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(IrError::Verify(format!($($arg)+)));
        }
    };
}

/// Verifies every structural invariant of `proc`.
pub fn verify_procedure(proc: &Procedure) -> Result<(), IrError> {
    let Some(entry) = proc.entry() else {
        ensure!(proc.cfg.node_count() == 0, "declaration `{}` owns blocks", proc.name);
        return Ok(());
    };

    verify_layout(proc)?;
    for &block in &proc.layout {
        verify_block_shape(proc, block)?;
        verify_edges(proc, block)?;
        verify_phis(proc, block)?;
    }
    verify_operands(proc)?;
    verify_use_index(proc)?;

    let doms = simple_fast(&proc.cfg, entry);
    verify_dominance(proc, &doms)
}

fn verify_layout(proc: &Procedure) -> Result<(), IrError> {
    let unique: HashSet<BlockId> = proc.layout.iter().copied().collect();
    ensure!(
        unique.len() == proc.layout.len() && unique.len() == proc.cfg.node_count(),
        "layout of `{}` does not list every block exactly once",
        proc.name
    );
    Ok(())
}

fn verify_block_shape(proc: &Procedure, block: BlockId) -> Result<(), IrError> {
    let name = proc.block_name(block);
    let insts = &proc.block(block)?.insts;
    ensure!(!insts.is_empty(), "block {name} is empty");

    let mut seen_non_phi = false;
    for (i, &id) in insts.iter().enumerate() {
        let data = proc.inst(id)?;
        ensure!(
            data.block == block,
            "%{} sits in {name} but records block {}",
            id.0,
            data.block.index()
        );
        let last = i + 1 == insts.len();
        ensure!(
            data.kind.is_terminator() == last,
            "block {name} must end in exactly one terminator"
        );
        if data.kind.is_phi() {
            ensure!(!seen_non_phi, "phi %{} in {name} follows a non-phi", id.0);
        } else {
            seen_non_phi = true;
        }
    }
    Ok(())
}

fn verify_edges(proc: &Procedure, block: BlockId) -> Result<(), IrError> {
    let name = proc.block_name(block);
    let term = proc
        .terminator(block)?
        .ok_or(IrError::MissingTerminator(block.index()))?;
    let mut expected: Vec<usize> = proc
        .kind(term)?
        .successor_edges()
        .into_iter()
        .map(|(b, _)| b.index())
        .collect();
    let mut actual: Vec<usize> = proc
        .cfg
        .neighbors_directed(block, petgraph::Direction::Outgoing)
        .map(|b| b.index())
        .collect();
    expected.sort_unstable();
    actual.sort_unstable();
    ensure!(
        expected == actual,
        "edges of {name} do not match its terminator"
    );
    Ok(())
}

fn verify_phis(proc: &Procedure, block: BlockId) -> Result<(), IrError> {
    let name = proc.block_name(block);
    let preds: HashSet<BlockId> = proc.predecessors(block).into_iter().collect();
    for phi in proc.phis(block)? {
        let InstKind::Phi { incoming } = proc.kind(phi)? else {
            continue;
        };
        let listed: HashSet<BlockId> = incoming.iter().map(|(b, _)| *b).collect();
        ensure!(
            listed.len() == incoming.len(),
            "phi %{} in {name} lists a predecessor twice",
            phi.0
        );
        ensure!(
            listed == preds,
            "phi %{} in {name} does not cover exactly the predecessors",
            phi.0
        );
    }
    Ok(())
}

fn verify_operands(proc: &Procedure) -> Result<(), IrError> {
    for (id, data) in proc.insts() {
        for op in data.kind.operands() {
            match op {
                Value::Inst(def) => {
                    let def_data = proc.inst(def).map_err(|_| {
                        IrError::Verify(format!("%{} reads dangling value %{}", id.0, def.0))
                    })?;
                    ensure!(
                        def_data.kind.has_result(),
                        "%{} reads %{} which defines no value",
                        id.0,
                        def.0
                    );
                }
                Value::Arg(n) => {
                    ensure!(n < proc.arity, "%{} reads missing argument {n}", id.0);
                }
                Value::Const(_) => {}
            }
        }
    }
    Ok(())
}

fn verify_use_index(proc: &Procedure) -> Result<(), IrError> {
    let mut expected = UseMap::default();
    for (id, data) in proc.insts() {
        for op in data.kind.operands() {
            expected.add(op, id);
        }
    }
    ensure!(
        expected.normalized() == proc.uses().normalized(),
        "use-lists of `{}` are out of sync with operands",
        proc.name
    );
    Ok(())
}

fn dominates(doms: &Dominators<BlockId>, a: BlockId, b: BlockId) -> Option<bool> {
    doms.dominators(b).map(|mut it| it.any(|d| d == a))
}

fn position(proc: &Procedure, id: InstId) -> Result<usize, IrError> {
    let block = proc.parent(id)?;
    proc.block(block)?
        .insts
        .iter()
        .position(|i| *i == id)
        .ok_or(IrError::UnknownInst(id.index()))
}

fn verify_dominance(proc: &Procedure, doms: &Dominators<BlockId>) -> Result<(), IrError> {
    for (user, data) in proc.insts() {
        let use_block = data.block;
        if let InstKind::Phi { incoming } = &data.kind {
            for (pred, value) in incoming {
                let Some(def) = value.as_inst() else { continue };
                let def_block = proc.parent(def)?;
                if let Some(ok) = dominates(doms, def_block, *pred) {
                    ensure!(
                        ok,
                        "phi %{} reads %{} on an edge it does not dominate",
                        user.0,
                        def.0
                    );
                }
            }
            continue;
        }

        for def in data.kind.operands().into_iter().filter_map(Value::as_inst) {
            let def_block = proc.parent(def)?;
            if def_block == use_block {
                ensure!(
                    position(proc, def)? < position(proc, user)?,
                    "%{} is used by %{} before its definition",
                    def.0,
                    user.0
                );
            } else if let Some(ok) = dominates(doms, def_block, use_block) {
                ensure!(ok, "%{} does not dominate its use in %{}", def.0, user.0);
            }
        }
    }
    Ok(())
}
