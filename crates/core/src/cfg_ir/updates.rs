//! CFG update operations

use petgraph::Direction;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use thicket_utils::errors::IrError;

use super::{Block, BlockId, InstData, InstId, InstKind, Procedure, Value};

impl Procedure {
    /// Adds an empty block, placed right after `after` in the layout or at the end.
    pub fn create_block(&mut self, name: Option<String>, after: Option<BlockId>) -> BlockId {
        let id = self.cfg.add_node(Block {
            name,
            ..Block::default()
        });
        match after.and_then(|b| self.layout_position(b)) {
            Some(pos) => self.layout.insert(pos + 1, id),
            None => self.layout.push(id),
        }
        id
    }

    /// Allocates an arena slot without touching the use-lists or the block.
    fn alloc_inst(&mut self, kind: InstKind, block: BlockId) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(Some(InstData { kind, block }));
        id
    }

    fn register_uses(&mut self, id: InstId) -> Result<(), IrError> {
        for op in self.kind(id)?.operands() {
            self.uses.add(op, id);
        }
        Ok(())
    }

    fn unregister_uses(&mut self, id: InstId) -> Result<(), IrError> {
        for op in self.kind(id)?.operands() {
            self.uses.remove(op, id);
        }
        Ok(())
    }

    /// Appends an instruction to an unterminated block.
    pub fn append_inst(&mut self, block: BlockId, kind: InstKind) -> Result<InstId, IrError> {
        let len = self.block(block)?.insts.len();
        self.insert_inst(block, len, kind)
    }

    /// Inserts an instruction at `index` within `block`.
    ///
    /// Nothing may follow a terminator, and a terminator may only be added at the end of an
    /// unterminated block.
    pub fn insert_inst(
        &mut self,
        block: BlockId,
        index: usize,
        kind: InstKind,
    ) -> Result<InstId, IrError> {
        let len = self.block(block)?.insts.len();
        if index > len {
            return Err(IrError::InvalidSplitPoint {
                block: block.index(),
                index,
            });
        }
        if self.terminator(block)?.is_some() && index == len {
            return Err(IrError::AlreadyTerminated(block.index()));
        }
        if kind.is_terminator() && index != len {
            return Err(IrError::AlreadyTerminated(block.index()));
        }

        let is_terminator = kind.is_terminator();
        let id = self.alloc_inst(kind, block);
        self.register_uses(id)?;
        self.block_mut(block)?.insts.insert(index, id);
        if is_terminator {
            self.rebuild_edges_for_block(block)?;
        }
        Ok(id)
    }

    /// Inserts an instruction immediately before the block's terminator.
    pub fn insert_before_terminator(
        &mut self,
        block: BlockId,
        kind: InstKind,
    ) -> Result<InstId, IrError> {
        let len = self.block(block)?.insts.len();
        let index = match self.terminator(block)? {
            Some(_) => len - 1,
            None => len,
        };
        self.insert_inst(block, index, kind)
    }

    /// Inserts a PHI after the block's existing PHIs.
    pub fn insert_phi(
        &mut self,
        block: BlockId,
        incoming: Vec<(BlockId, Value)>,
    ) -> Result<InstId, IrError> {
        let index = self.phi_count(block)?;
        self.insert_inst(block, index, InstKind::Phi { incoming })
    }

    /// Erases an instruction whose result is unused.
    pub fn remove_inst(&mut self, id: InstId) -> Result<InstKind, IrError> {
        if self.has_uses(Value::Inst(id)) {
            return Err(IrError::HasUsers(id.index()));
        }
        self.unregister_uses(id)?;
        let block = self.parent(id)?;
        self.block_mut(block)?.insts.retain(|i| *i != id);
        let data = self.insts[id.index()]
            .take()
            .ok_or(IrError::UnknownInst(id.index()))?;
        if data.kind.is_terminator() {
            self.rebuild_edges_for_block(block)?;
        }
        Ok(data.kind)
    }

    /// Rewrites every operand of `user` equal to `old` into `new`; returns the number rewritten.
    pub fn replace_uses_in(
        &mut self,
        user: InstId,
        old: Value,
        new: Value,
    ) -> Result<usize, IrError> {
        let mut replaced = 0;
        for op in self.inst_mut(user)?.kind.operands_mut() {
            if *op == old {
                *op = new;
                replaced += 1;
            }
        }
        for _ in 0..replaced {
            self.uses.remove(old, user);
            self.uses.add(new, user);
        }
        Ok(replaced)
    }

    /// Redirects every use of `old` to `new`.
    pub fn replace_all_uses(&mut self, old: Value, new: Value) -> Result<(), IrError> {
        for user in self.users(old) {
            self.replace_uses_in(user, old, new)?;
        }
        Ok(())
    }

    /// Adds an incoming entry to a PHI unless one already exists for `block`.
    ///
    /// Returns whether an entry was added.
    pub fn add_phi_incoming(
        &mut self,
        phi: InstId,
        block: BlockId,
        value: Value,
    ) -> Result<bool, IrError> {
        let InstKind::Phi { incoming } = &mut self.inst_mut(phi)?.kind else {
            return Err(IrError::NotAPhi(phi.index()));
        };
        if incoming.iter().any(|(b, _)| *b == block) {
            return Ok(false);
        }
        incoming.push((block, value));
        self.uses.add(value, phi);
        Ok(true)
    }

    /// Replaces the value a PHI takes on the edge from `block`, returning the old one.
    pub fn set_phi_incoming(
        &mut self,
        phi: InstId,
        block: BlockId,
        value: Value,
    ) -> Result<Value, IrError> {
        let InstKind::Phi { incoming } = &mut self.inst_mut(phi)?.kind else {
            return Err(IrError::NotAPhi(phi.index()));
        };
        let Some(entry) = incoming.iter_mut().find(|(b, _)| *b == block) else {
            return Err(IrError::PhiPredecessorMismatch {
                phi: phi.index(),
                block: block.index(),
            });
        };
        let old = std::mem::replace(&mut entry.1, value);
        self.uses.remove(old, phi);
        self.uses.add(value, phi);
        Ok(old)
    }

    /// Rebuilds edges for a specific block after its terminator changed.
    ///
    /// Removes all outgoing edges and re-adds one per terminator successor slot.
    pub fn rebuild_edges_for_block(&mut self, block: BlockId) -> Result<(), IrError> {
        let outgoing: Vec<_> = self
            .cfg
            .edges_directed(block, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge_id in outgoing {
            self.cfg.remove_edge(edge_id);
        }

        let Some(term) = self.terminator(block)? else {
            return Ok(());
        };
        for (target, edge_type) in self.kind(term)?.successor_edges() {
            if !self.cfg.contains_node(target) {
                return Err(IrError::UnknownBlock(target.index()));
            }
            self.cfg.add_edge(block, target, edge_type);
        }
        Ok(())
    }

    /// Splits `block` before the instruction at `index`.
    ///
    /// The tail moves into a new block placed after `block` in the layout, `block` is closed
    /// with a branch to it, and PHIs in the tail's successors are retargeted from `block` to the
    /// new block.
    pub fn split_block(
        &mut self,
        block: BlockId,
        index: usize,
        name: Option<String>,
    ) -> Result<BlockId, IrError> {
        let len = self.block(block)?.insts.len();
        if index >= len {
            return Err(IrError::InvalidSplitPoint {
                block: block.index(),
                index,
            });
        }

        let tail = self.block_mut(block)?.insts.split_off(index);
        let new_block = self.create_block(name, Some(block));
        for &id in &tail {
            self.inst_mut(id)?.block = new_block;
        }
        self.block_mut(new_block)?.insts = tail;

        for succ in self.successors(new_block)? {
            for phi in self.phis(succ)? {
                for incoming in self.inst_mut(phi)?.kind.blocks_mut() {
                    if *incoming == block {
                        *incoming = new_block;
                    }
                }
            }
        }

        self.rebuild_edges_for_block(new_block)?;
        self.append_inst(block, InstKind::Br { target: new_block })?;
        tracing::debug!(
            "Split block {} at {}: tail moved to {}",
            block.index(),
            index,
            new_block.index()
        );
        Ok(new_block)
    }

    /// Clones every instruction of `block` into a new block placed right after it.
    ///
    /// Operands that name values defined inside `block` are remapped to their clones; all other
    /// operands stay shared. Returns the new block and the substitution table used.
    pub fn clone_block(
        &mut self,
        block: BlockId,
        name: Option<String>,
    ) -> Result<(BlockId, HashMap<Value, Value>), IrError> {
        let source = self.block(block)?.insts.clone();
        let landing_pad = self.block(block)?.landing_pad;
        let new_block = self.create_block(name, Some(block));
        self.block_mut(new_block)?.landing_pad = landing_pad;

        let mut vmap = HashMap::new();
        let mut cloned = Vec::with_capacity(source.len());
        for &id in &source {
            let kind = self.kind(id)?.clone();
            let has_result = kind.has_result();
            let new_id = self.alloc_inst(kind, new_block);
            if has_result {
                vmap.insert(Value::Inst(id), Value::Inst(new_id));
            }
            cloned.push(new_id);
        }

        for &new_id in &cloned {
            for op in self.inst_mut(new_id)?.kind.operands_mut() {
                if let Some(mapped) = vmap.get(op) {
                    *op = *mapped;
                }
            }
            self.register_uses(new_id)?;
        }
        self.block_mut(new_block)?.insts = cloned;
        self.rebuild_edges_for_block(new_block)?;

        tracing::debug!(
            "Cloned block {} into {} ({} instructions)",
            block.index(),
            new_block.index(),
            source.len()
        );
        Ok((new_block, vmap))
    }
}
