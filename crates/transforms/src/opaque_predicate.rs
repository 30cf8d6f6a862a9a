//! Opaque predicates guarding the original/clone pair.
//!
//! A predicate installs the terminator of an unterminated header block. Every family here
//! always reaches `true_target` at runtime; the condition is built so that proving this takes
//! more than reading the branch.

use rand::{Rng, rngs::StdRng};
use sha3::{Digest, Keccak256};
use thicket_core::cfg_ir::{BinOp, BlockId, CmpPred, InstKind, Procedure, Value};
use thicket_utils::errors::TransformError;
use tracing::debug;

/// Installs a conditional branch whose outcome is fixed at runtime.
pub trait OpaquePredicate: Send + Sync {
    fn name(&self) -> &'static str;

    /// Terminates `header` with a branch that always reaches `true_target`.
    fn create_guard(
        &self,
        proc: &mut Procedure,
        header: BlockId,
        true_target: BlockId,
        false_target: BlockId,
        rng: &mut StdRng,
    ) -> Result<(), TransformError>;
}

/// Derives a 64-bit constant from a Keccak-256 digest of `seed`.
fn generate_constant(seed: u64) -> i64 {
    let mut hasher = Keccak256::new();
    hasher.update(seed.to_le_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    i64::from_le_bytes(word)
}

/// Compares a hashed constant with itself, `eq` or `ne` with the targets swapped to match.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstantPredicate;

impl OpaquePredicate for ConstantPredicate {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn create_guard(
        &self,
        proc: &mut Procedure,
        header: BlockId,
        true_target: BlockId,
        false_target: BlockId,
        rng: &mut StdRng,
    ) -> Result<(), TransformError> {
        let k = Value::Const(generate_constant(rng.random::<u64>()));
        let inverted = rng.random_bool(0.5);
        let pred = if inverted { CmpPred::Ne } else { CmpPred::Eq };

        let cond = proc.append_inst(
            header,
            InstKind::Cmp {
                pred,
                lhs: k,
                rhs: k,
            },
        )?;
        let (then_dest, else_dest) = if inverted {
            (false_target, true_target)
        } else {
            (true_target, false_target)
        };
        proc.append_inst(
            header,
            InstKind::CondBr {
                cond: Value::Inst(cond),
                then_dest,
                else_dest,
            },
        )?;
        debug!(
            "Installed constant guard in {} ({:?} {})",
            proc.block_name(header),
            pred,
            k
        );
        Ok(())
    }
}

/// `(v * v + v) & 1 == 0`: a product of consecutive integers is even, wrapping included.
///
/// `v` is a random argument when the procedure has one, otherwise a hashed constant.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParityPredicate;

impl OpaquePredicate for ParityPredicate {
    fn name(&self) -> &'static str {
        "parity"
    }

    fn create_guard(
        &self,
        proc: &mut Procedure,
        header: BlockId,
        true_target: BlockId,
        false_target: BlockId,
        rng: &mut StdRng,
    ) -> Result<(), TransformError> {
        let v = if proc.arity > 0 {
            Value::Arg(rng.random_range(0..proc.arity))
        } else {
            Value::Const(generate_constant(rng.random::<u64>()))
        };

        let mut emit = |kind: InstKind| -> Result<Value, TransformError> {
            Ok(Value::Inst(proc.append_inst(header, kind)?))
        };
        let square = emit(InstKind::Binary {
            op: BinOp::Mul,
            lhs: v,
            rhs: v,
        })?;
        let sum = emit(InstKind::Binary {
            op: BinOp::Add,
            lhs: square,
            rhs: v,
        })?;
        let low = emit(InstKind::Binary {
            op: BinOp::And,
            lhs: sum,
            rhs: Value::Const(1),
        })?;
        let cond = emit(InstKind::Cmp {
            pred: CmpPred::Eq,
            lhs: low,
            rhs: Value::Const(0),
        })?;
        emit(InstKind::CondBr {
            cond,
            then_dest: true_target,
            else_dest: false_target,
        })?;
        debug!(
            "Installed parity guard in {} over {}",
            proc.block_name(header),
            v
        );
        Ok(())
    }
}

/// Looks up a predicate family by its CLI name.
pub fn predicate_by_name(name: &str) -> Option<Box<dyn OpaquePredicate>> {
    match name {
        "constant" => Some(Box::new(ConstantPredicate)),
        "parity" => Some(Box::new(ParityPredicate)),
        _ => None,
    }
}
