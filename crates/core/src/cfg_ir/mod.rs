/// Module for the Control Flow Graph (CFG) Intermediate Representation (IR) in Static Single
/// Assignment (SSA) form.
///
/// A [`Procedure`] stores its basic blocks as nodes of a petgraph `StableDiGraph`, so block
/// handles stay valid while transforms add blocks, and its instructions in an arena addressed
/// by [`InstId`]. Edges are derived from each block's terminator and rebuilt whenever a
/// terminator changes; the def-use index is derived from operand lists and updated on every
/// mutation.
use indexmap::IndexSet;
use petgraph::Direction;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thicket_utils::errors::IrError;

pub use self::builder::ProcedureBuilder;
pub use self::inst::{
    BinOp, BlockId, CmpPred, EdgeType, InstId, InstKind, TerminatorKind, Value,
};
pub use self::uses::UseMap;

mod builder;
pub mod demote;
mod inst;
mod printer;
mod updates;
mod uses;
pub mod verify;

/// A basic block: an ordered list of instructions ending in one terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Optional debug name.
    pub name: Option<String>,
    /// Instructions in execution order; the last one is the terminator.
    pub insts: Vec<InstId>,
    /// Marks the entry point of exception handling.
    pub landing_pad: bool,
}

/// An instruction together with its parent block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstData {
    pub kind: InstKind,
    pub block: BlockId,
}

/// Per-procedure tags consumed by transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Attribute {
    /// Include in bogus control-flow insertion regardless of the allow-list.
    ForceBogusFlow,
    /// Bogus control flow has already been inserted.
    BogusFlowApplied,
}

/// A procedure: a CFG of blocks over an instruction arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    /// Number of arguments, addressed as `Value::Arg(0..arity)`.
    pub arity: u32,
    /// Blocks as nodes, control-flow edges labelled by the terminator slot.
    pub cfg: StableDiGraph<Block, EdgeType>,
    /// Block order; the first block is the entry.
    pub layout: Vec<BlockId>,
    #[serde(default)]
    pub attributes: BTreeSet<Attribute>,
    insts: Vec<Option<InstData>>,
    #[serde(skip)]
    uses: UseMap,
}

impl Procedure {
    /// Creates a procedure without a body.
    pub fn new(name: impl Into<String>, arity: u32) -> Self {
        Self {
            name: name.into(),
            arity,
            cfg: StableDiGraph::new(),
            layout: Vec::new(),
            attributes: BTreeSet::new(),
            insts: Vec::new(),
            uses: UseMap::default(),
        }
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    /// A procedure without blocks is only declared here and defined elsewhere.
    pub fn is_declaration(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn has_attribute(&self, attr: Attribute) -> bool {
        self.attributes.contains(&attr)
    }

    pub fn block(&self, block: BlockId) -> Result<&Block, IrError> {
        self.cfg
            .node_weight(block)
            .ok_or(IrError::UnknownBlock(block.index()))
    }

    pub(crate) fn block_mut(&mut self, block: BlockId) -> Result<&mut Block, IrError> {
        self.cfg
            .node_weight_mut(block)
            .ok_or(IrError::UnknownBlock(block.index()))
    }

    /// Debug name of a block, falling back to its index.
    pub fn block_name(&self, block: BlockId) -> String {
        self.cfg
            .node_weight(block)
            .and_then(|b| b.name.clone())
            .unwrap_or_else(|| format!("bb{}", block.index()))
    }

    pub fn block_count(&self) -> usize {
        self.layout.len()
    }

    pub fn inst(&self, id: InstId) -> Result<&InstData, IrError> {
        self.insts
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(IrError::UnknownInst(id.index()))
    }

    pub(crate) fn inst_mut(&mut self, id: InstId) -> Result<&mut InstData, IrError> {
        self.insts
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(IrError::UnknownInst(id.index()))
    }

    pub fn kind(&self, id: InstId) -> Result<&InstKind, IrError> {
        Ok(&self.inst(id)?.kind)
    }

    pub fn parent(&self, id: InstId) -> Result<BlockId, IrError> {
        Ok(self.inst(id)?.block)
    }

    /// Live instructions in arena order.
    pub fn insts(&self) -> impl Iterator<Item = (InstId, &InstData)> {
        self.insts
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.as_ref().map(|d| (InstId(i as u32), d)))
    }

    pub fn inst_count(&self) -> usize {
        self.insts.iter().filter(|d| d.is_some()).count()
    }

    /// The block's terminator, if its last instruction is one.
    pub fn terminator(&self, block: BlockId) -> Result<Option<InstId>, IrError> {
        let Some(&last) = self.block(block)?.insts.last() else {
            return Ok(None);
        };
        Ok(self.kind(last)?.is_terminator().then_some(last))
    }

    pub fn terminator_kind(&self, block: BlockId) -> Result<TerminatorKind, IrError> {
        let term = self
            .terminator(block)?
            .ok_or(IrError::MissingTerminator(block.index()))?;
        self.kind(term)?
            .terminator_kind()
            .ok_or(IrError::MissingTerminator(block.index()))
    }

    /// Distinct successors in terminator order.
    pub fn successors(&self, block: BlockId) -> Result<Vec<BlockId>, IrError> {
        let Some(term) = self.terminator(block)? else {
            return Ok(Vec::new());
        };
        let unique: IndexSet<BlockId> = self
            .kind(term)?
            .successor_edges()
            .into_iter()
            .map(|(b, _)| b)
            .collect();
        Ok(unique.into_iter().collect())
    }

    /// Distinct predecessors in layout order.
    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        let unique: IndexSet<BlockId> = self
            .cfg
            .edges_directed(block, Direction::Incoming)
            .map(|e| e.source())
            .collect();
        let mut preds: Vec<BlockId> = unique.into_iter().collect();
        preds.sort_by_key(|b| self.layout_position(*b));
        preds
    }

    pub fn layout_position(&self, block: BlockId) -> Option<usize> {
        self.layout.iter().position(|b| *b == block)
    }

    /// The leading PHI nodes of a block.
    pub fn phis(&self, block: BlockId) -> Result<Vec<InstId>, IrError> {
        let mut out = Vec::new();
        for &id in &self.block(block)?.insts {
            if !self.kind(id)?.is_phi() {
                break;
            }
            out.push(id);
        }
        Ok(out)
    }

    pub fn phi_count(&self, block: BlockId) -> Result<usize, IrError> {
        Ok(self.phis(block)?.len())
    }

    /// Index of the first instruction that is neither a PHI nor a debug marker.
    ///
    /// Equals the instruction count when the block holds nothing else.
    pub fn first_non_phi_or_marker(&self, block: BlockId) -> Result<usize, IrError> {
        let insts = &self.block(block)?.insts;
        for (i, &id) in insts.iter().enumerate() {
            let kind = self.kind(id)?;
            if !kind.is_phi() && !kind.is_debug_marker() {
                return Ok(i);
            }
        }
        Ok(insts.len())
    }

    /// Distinct instructions reading `value`.
    pub fn users(&self, value: Value) -> Vec<InstId> {
        self.uses.users(value)
    }

    pub fn has_uses(&self, value: Value) -> bool {
        self.uses.has_uses(value)
    }

    pub fn uses(&self) -> &UseMap {
        &self.uses
    }

    /// Recomputes the def-use index from the operand lists.
    pub fn rebuild_uses(&mut self) {
        self.uses.clear();
        for (i, data) in self.insts.iter().enumerate() {
            if let Some(data) = data {
                for op in data.kind.operands() {
                    self.uses.add(op, InstId(i as u32));
                }
            }
        }
    }

    /// Recomputes every CFG edge from the block terminators.
    pub fn rebuild_all_edges(&mut self) -> Result<(), IrError> {
        self.cfg.clear_edges();
        for block in self.layout.clone() {
            self.rebuild_edges_for_block(block)?;
        }
        Ok(())
    }
}

/// A collection of procedures, the unit read and written by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub procedures: Vec<Procedure>,
}

impl Module {
    /// Decodes a module and rebuilds the derived use-lists and edges.
    pub fn from_json(input: &str) -> Result<Self, IrError> {
        let mut module: Self =
            serde_json::from_str(input).map_err(|e| IrError::Decode(e.to_string()))?;
        for proc in &mut module.procedures {
            proc.rebuild_uses();
            proc.rebuild_all_edges()?;
        }
        Ok(module)
    }

    pub fn to_json(&self) -> Result<String, IrError> {
        serde_json::to_string_pretty(self).map_err(|e| IrError::Decode(e.to_string()))
    }

    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }

    pub fn procedure_mut(&mut self, name: &str) -> Option<&mut Procedure> {
        self.procedures.iter_mut().find(|p| p.name == name)
    }
}
