//! Split-point selection.
//!
//! A block is a candidate when there is something to split before its terminator, it is not an
//! exception landing pad and it is not the entry block. A single block ending in exception-raising
//! control flow disqualifies the whole procedure.

use serde::Serialize;
use thicket_core::cfg_ir::{BlockId, Procedure, TerminatorKind};
use thicket_utils::errors::IrError;

/// Per-block verdict, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    /// Only PHIs, debug markers and the terminator.
    SkipPhiTerminatorOnly,
    SkipLandingPad,
    SkipEntry,
}

/// Outcome of scanning a whole procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    /// Candidates in layout order, plus the blocks left out and why.
    AllEligible {
        blocks: Vec<BlockId>,
        skipped: Vec<(BlockId, Eligibility)>,
    },
    /// The named block ends in unsupported control flow.
    Disqualified(BlockId),
}

/// Classifies one block.
pub fn classify(proc: &Procedure, block: BlockId, is_entry: bool) -> Result<Eligibility, IrError> {
    let data = proc.block(block)?;
    let first = proc.first_non_phi_or_marker(block)?;
    let terminator_only = match data.insts.get(first) {
        Some(&id) => proc.kind(id)?.is_terminator(),
        None => true,
    };
    if terminator_only {
        return Ok(Eligibility::SkipPhiTerminatorOnly);
    }
    if data.landing_pad {
        return Ok(Eligibility::SkipLandingPad);
    }
    if is_entry {
        return Ok(Eligibility::SkipEntry);
    }
    Ok(Eligibility::Eligible)
}

/// Collects split candidates, or reports the first block that disqualifies the procedure.
///
/// Pure: the procedure is only read.
pub fn scan_procedure(proc: &Procedure) -> Result<ScanResult, IrError> {
    for &block in &proc.layout {
        if proc.terminator_kind(block)? == TerminatorKind::Unsupported {
            return Ok(ScanResult::Disqualified(block));
        }
    }

    let entry = proc.entry();
    let mut blocks = Vec::new();
    let mut skipped = Vec::new();
    for &block in &proc.layout {
        match classify(proc, block, Some(block) == entry)? {
            Eligibility::Eligible => blocks.push(block),
            reason => skipped.push((block, reason)),
        }
    }
    Ok(ScanResult::AllEligible { blocks, skipped })
}
