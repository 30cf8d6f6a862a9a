//! Instruction set of the CFG IR.
//!
//! Instructions form a closed set of variants. Terminators are ordinary instructions that must
//! appear last in their block, so operand and use bookkeeping is uniform across the whole IR.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a block: a stable node index in the procedure's CFG.
pub type BlockId = NodeIndex;

/// Handle to an instruction in the procedure's instruction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstId(pub u32);

impl InstId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// An SSA value: an instruction result, a procedure argument, or an integer constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Inst(InstId),
    Arg(u32),
    Const(i64),
}

impl Value {
    /// Returns the defining instruction, if this value is an instruction result.
    pub const fn as_inst(self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(id),
            _ => None,
        }
    }

    /// Constants have no def-use bookkeeping.
    pub const fn is_tracked(self) -> bool {
        !matches!(self, Value::Const(_))
    }
}

/// Binary arithmetic on 64-bit integers with wrapping semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// Signed integer comparison producing `1` or `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl CmpPred {
    /// Return the inverse comparison (e.g. Slt ↔ Sge, Eq ↔ Ne).
    pub const fn inverse(self) -> Self {
        match self {
            CmpPred::Eq => CmpPred::Ne,
            CmpPred::Ne => CmpPred::Eq,
            CmpPred::Slt => CmpPred::Sge,
            CmpPred::Sge => CmpPred::Slt,
            CmpPred::Sgt => CmpPred::Sle,
            CmpPred::Sle => CmpPred::Sgt,
        }
    }
}

/// Classification of a block terminator by the shape of its outgoing control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminatorKind {
    /// No successors (`ret`, `unreachable`).
    Return,
    /// Exactly one successor (`br`).
    Unconditional,
    /// Two successors selected by a condition (`condbr`).
    Conditional,
    /// Any number of successors selected by a scrutinee (`switch`).
    Switch,
    /// Exception-raising control flow (`invoke`, `resume`).
    Unsupported,
}

/// Label attached to a CFG edge, mirroring the terminator slot it comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeType {
    /// Unconditional branch.
    Jump,
    /// Conditional branch taken when the condition is non-zero.
    BranchTrue,
    /// Conditional branch taken when the condition is zero.
    BranchFalse,
    /// Switch case or default edge.
    Case,
    /// Normal return edge of an `invoke`.
    Normal,
    /// Exceptional edge of an `invoke`.
    Unwind,
}

/// IR operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstKind {
    Binary {
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    Cmp {
        pred: CmpPred,
        lhs: Value,
        rhs: Value,
    },
    /// SSA merge; only valid in the leading run of a block.
    Phi {
        incoming: Vec<(BlockId, Value)>,
    },
    /// Allocates a fresh stack slot and yields its address.
    Alloca,
    Load {
        slot: Value,
    },
    Store {
        slot: Value,
        value: Value,
    },
    /// Call with an externally visible effect.
    Call {
        callee: String,
        args: Vec<Value>,
    },
    /// Debug bookkeeping with no runtime effect.
    DebugMarker {
        label: String,
    },

    // -- Terminators --
    Br {
        target: BlockId,
    },
    CondBr {
        cond: Value,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    Switch {
        value: Value,
        default: BlockId,
        cases: Vec<(i64, BlockId)>,
    },
    Ret {
        value: Option<Value>,
    },
    Unreachable,
    /// Call that may unwind into `unwind`.
    Invoke {
        callee: String,
        args: Vec<Value>,
        normal: BlockId,
        unwind: BlockId,
    },
    /// Re-raises an in-flight exception.
    Resume {
        value: Value,
    },
}

impl InstKind {
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Br { .. }
                | InstKind::CondBr { .. }
                | InstKind::Switch { .. }
                | InstKind::Ret { .. }
                | InstKind::Unreachable
                | InstKind::Invoke { .. }
                | InstKind::Resume { .. }
        )
    }

    pub const fn is_phi(&self) -> bool {
        matches!(self, InstKind::Phi { .. })
    }

    pub const fn is_debug_marker(&self) -> bool {
        matches!(self, InstKind::DebugMarker { .. })
    }

    /// Whether the instruction defines an SSA value.
    pub const fn has_result(&self) -> bool {
        matches!(
            self,
            InstKind::Binary { .. }
                | InstKind::Cmp { .. }
                | InstKind::Phi { .. }
                | InstKind::Alloca
                | InstKind::Load { .. }
                | InstKind::Call { .. }
                | InstKind::Invoke { .. }
        )
    }

    /// Operands in a fixed order, including PHI incoming values.
    pub fn operands(&self) -> Vec<Value> {
        match self {
            InstKind::Binary { lhs, rhs, .. } | InstKind::Cmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            InstKind::Phi { incoming } => incoming.iter().map(|(_, v)| *v).collect(),
            InstKind::Alloca
            | InstKind::DebugMarker { .. }
            | InstKind::Br { .. }
            | InstKind::Unreachable => Vec::new(),
            InstKind::Load { slot } => vec![*slot],
            InstKind::Store { slot, value } => vec![*slot, *value],
            InstKind::Call { args, .. } | InstKind::Invoke { args, .. } => args.clone(),
            InstKind::CondBr { cond, .. } => vec![*cond],
            InstKind::Switch { value, .. } => vec![*value],
            InstKind::Ret { value } => value.iter().copied().collect(),
            InstKind::Resume { value } => vec![*value],
        }
    }

    /// Mutable access to the operands, in the same order as [`InstKind::operands`].
    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            InstKind::Binary { lhs, rhs, .. } | InstKind::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Phi { incoming } => incoming.iter_mut().map(|(_, v)| v).collect(),
            InstKind::Alloca
            | InstKind::DebugMarker { .. }
            | InstKind::Br { .. }
            | InstKind::Unreachable => Vec::new(),
            InstKind::Load { slot } => vec![slot],
            InstKind::Store { slot, value } => vec![slot, value],
            InstKind::Call { args, .. } | InstKind::Invoke { args, .. } => args.iter_mut().collect(),
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Switch { value, .. } => vec![value],
            InstKind::Ret { value } => value.iter_mut().collect(),
            InstKind::Resume { value } => vec![value],
        }
    }

    /// Outgoing edges of a terminator, one entry per edge (targets may repeat).
    pub fn successor_edges(&self) -> Vec<(BlockId, EdgeType)> {
        match self {
            InstKind::Br { target } => vec![(*target, EdgeType::Jump)],
            InstKind::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![
                (*then_dest, EdgeType::BranchTrue),
                (*else_dest, EdgeType::BranchFalse),
            ],
            InstKind::Switch { default, cases, .. } => std::iter::once(*default)
                .chain(cases.iter().map(|(_, b)| *b))
                .map(|b| (b, EdgeType::Case))
                .collect(),
            InstKind::Invoke { normal, unwind, .. } => {
                vec![(*normal, EdgeType::Normal), (*unwind, EdgeType::Unwind)]
            }
            _ => Vec::new(),
        }
    }

    /// Mutable access to every block reference held by the instruction, PHI incoming blocks
    /// included.
    pub fn blocks_mut(&mut self) -> Vec<&mut BlockId> {
        match self {
            InstKind::Phi { incoming } => incoming.iter_mut().map(|(b, _)| b).collect(),
            InstKind::Br { target } => vec![target],
            InstKind::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![then_dest, else_dest],
            InstKind::Switch { default, cases, .. } => std::iter::once(default)
                .chain(cases.iter_mut().map(|(_, b)| b))
                .collect(),
            InstKind::Invoke { normal, unwind, .. } => vec![normal, unwind],
            _ => Vec::new(),
        }
    }

    /// Classifies a terminator; `None` for non-terminators.
    pub const fn terminator_kind(&self) -> Option<TerminatorKind> {
        match self {
            InstKind::Ret { .. } | InstKind::Unreachable => Some(TerminatorKind::Return),
            InstKind::Br { .. } => Some(TerminatorKind::Unconditional),
            InstKind::CondBr { .. } => Some(TerminatorKind::Conditional),
            InstKind::Switch { .. } => Some(TerminatorKind::Switch),
            InstKind::Invoke { .. } | InstKind::Resume { .. } => {
                Some(TerminatorKind::Unsupported)
            }
            _ => None,
        }
    }

    /// Incoming value of a PHI for `block`.
    pub fn phi_incoming_for(&self, block: BlockId) -> Option<Value> {
        match self {
            InstKind::Phi { incoming } => incoming
                .iter()
                .find_map(|(b, v)| (*b == block).then_some(*v)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Inst(id) => write!(f, "%{}", id.0),
            Value::Arg(n) => write!(f, "%arg{n}"),
            Value::Const(c) => write!(f, "{c}"),
        }
    }
}
