//! Block splitting, cloning and PHI reconciliation.
//!
//! For a selected block `B` the transform produces
//!
//! ```text
//!            B (header) --guard--> B_original ---+
//!                    \                           +--> J
//!                     `----------> B_clone ------+
//! ```
//!
//! where `J` is `B`'s single successor, or a fresh `B_join` holding `B`'s terminator when that
//! terminator has several outgoing edges. Return blocks have no `J`. Values computed in the body
//! and read past `J` are merged with a PHI in `J` that is immediately demoted to a stack slot.

use indexmap::IndexSet;
use rand::rngs::StdRng;
use std::collections::HashMap;
use thicket_core::cfg_ir::{
    BlockId, InstId, InstKind, Procedure, TerminatorKind, Value, demote::demote_phis,
};
use thicket_utils::errors::{IrError, TransformError};

use crate::Outcome;
use crate::observer::{Observer, TraceEvent};
use crate::opaque_predicate::OpaquePredicate;

/// Blocks produced by one transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitBlocks {
    pub header: BlockId,
    pub original: BlockId,
    pub clone: BlockId,
    pub join: Option<BlockId>,
}

/// Splits `block` into a guarded original/clone pair.
///
/// The header's terminator is only replaced once every merge in the join block has been
/// demoted; an error before that point leaves the header branching to the original body. The
/// clone and any merge entries added for it are not removed on that path, so the procedure is
/// only guaranteed to keep its behaviour, not its shape. [`crate::pass::run`] works on a
/// snapshot and discards it on error.
pub fn transform_block(
    proc: &mut Procedure,
    block: BlockId,
    predicate: &dyn OpaquePredicate,
    rng: &mut StdRng,
    observer: &dyn Observer,
) -> Result<Outcome, TransformError> {
    Ok(match split_and_clone(proc, block, predicate, rng, observer)? {
        Some(_) => Outcome::Modified,
        None => Outcome::Unchanged,
    })
}

/// Like [`transform_block`], returning the blocks it created.
pub fn split_and_clone(
    proc: &mut Procedure,
    block: BlockId,
    predicate: &dyn OpaquePredicate,
    rng: &mut StdRng,
    observer: &dyn Observer,
) -> Result<Option<SplitBlocks>, TransformError> {
    let term = proc
        .terminator(block)?
        .ok_or(IrError::MissingTerminator(block.index()))?;
    if proc.terminator_kind(block)? == TerminatorKind::Unsupported {
        return Err(TransformError::UnsupportedControlFlow {
            procedure: proc.name.clone(),
            block: block.index(),
        });
    }
    let first = proc.first_non_phi_or_marker(block)?;
    let insts = &proc.block(block)?.insts;
    if insts.get(first) == Some(&term) {
        return Ok(None);
    }

    let name = proc.block_name(block);
    let edges = proc.kind(term)?.successor_edges();

    let join = match edges.len() {
        0 => None,
        1 => Some(edges[0].0),
        _ => {
            let at = proc.block(block)?.insts.len() - 1;
            Some(proc.split_block(block, at, Some(format!("{name}_join")))?)
        }
    };

    let original = proc.split_block(block, first, Some(format!("{name}_original")))?;
    let (clone, vmap) = proc.clone_block(original, Some(format!("{name}_clone")))?;

    if let Some(join) = join {
        reconcile(proc, join, original, clone, &vmap, observer)?;
    }

    let stale = proc
        .terminator(block)?
        .ok_or(IrError::MissingTerminator(block.index()))?;
    proc.remove_inst(stale)?;
    predicate.create_guard(proc, block, original, clone, rng)?;
    observer.record(TraceEvent::GuardInstalled {
        procedure: proc.name.clone(),
        block: name.clone(),
        predicate: predicate.name().to_string(),
    });

    observer.record(TraceEvent::BlockTransformed {
        procedure: proc.name.clone(),
        block: name,
        original: proc.block_name(original),
        clone: proc.block_name(clone),
        join: join.map(|j| proc.block_name(j)),
    });
    Ok(Some(SplitBlocks {
        header: block,
        original,
        clone,
        join,
    }))
}

/// Routes values defined in `original` and read outside the pair through merges in `join`.
fn reconcile(
    proc: &mut Procedure,
    join: BlockId,
    original: BlockId,
    clone: BlockId,
    vmap: &HashMap<Value, Value>,
    observer: &dyn Observer,
) -> Result<(), TransformError> {
    let mut touched: IndexSet<InstId> = IndexSet::new();

    for inst in proc.block(original)?.insts.clone() {
        let value = Value::Inst(inst);
        let Some(&copy) = vmap.get(&value) else {
            continue;
        };

        let mut others = Vec::new();
        // join PHIs reading `value` on edges other than the original one, with those edges
        let mut phi_edges = Vec::new();
        for user in proc.users(value) {
            let at = proc.parent(user)?;
            if at == original || at == clone {
                continue;
            }
            match proc.kind(user)? {
                InstKind::Phi { incoming } if at == join => {
                    let edges: Vec<BlockId> = incoming
                        .iter()
                        .filter(|(b, v)| *v == value && *b != original)
                        .map(|(b, _)| *b)
                        .collect();
                    if !edges.is_empty() {
                        phi_edges.push((user, edges));
                    }
                }
                _ => others.push(user),
            }
        }

        if !others.is_empty() || !phi_edges.is_empty() {
            let phi = proc.insert_phi(join, vec![(original, value), (clone, copy)])?;
            let merged = Value::Inst(phi);
            for user in others {
                proc.replace_uses_in(user, value, merged)?;
            }
            for (user, edges) in phi_edges {
                for pred in edges {
                    proc.set_phi_incoming(user, pred, merged)?;
                }
            }
            observer.record(TraceEvent::PhiSynthesized {
                procedure: proc.name.clone(),
                block: proc.block_name(join),
                value: value.to_string(),
            });
            touched.insert(phi);
        }
    }

    // Existing merges get the clone edge, carrying the clone's copy of what the original sends.
    for phi in proc.phis(join)? {
        let kind = proc.kind(phi)?;
        let from_original = kind.phi_incoming_for(original);
        if let (Some(v), None) = (from_original, kind.phi_incoming_for(clone)) {
            let mapped = vmap.get(&v).copied().unwrap_or(v);
            proc.add_phi_incoming(phi, clone, mapped)?;
            touched.insert(phi);
        }
    }

    let touched: Vec<InstId> = touched.into_iter().collect();
    demote_phis(proc, &touched)?;
    Ok(())
}
