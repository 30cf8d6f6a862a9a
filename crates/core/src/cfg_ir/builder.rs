//! Incremental construction of procedures.
//!
//! The builder records the first graph error and reports it from [`ProcedureBuilder::finish`],
//! so construction code reads as straight-line IR without a `?` on every instruction.

use thicket_utils::errors::IrError;

use super::{Attribute, BinOp, BlockId, CmpPred, InstKind, Procedure, Value};

#[derive(Debug)]
pub struct ProcedureBuilder {
    proc: Procedure,
    error: Option<IrError>,
}

impl ProcedureBuilder {
    pub fn new(name: impl Into<String>, arity: u32) -> Self {
        Self {
            proc: Procedure::new(name, arity),
            error: None,
        }
    }

    /// Appends a named block to the layout; the first block becomes the entry.
    pub fn block(&mut self, name: &str) -> BlockId {
        self.proc.create_block(Some(name.to_string()), None)
    }

    /// Flags a block as an exception landing pad.
    pub fn landing_pad(&mut self, block: BlockId) {
        match self.proc.block_mut(block) {
            Ok(b) => b.landing_pad = true,
            Err(e) => self.record(e),
        }
    }

    pub fn attribute(&mut self, attr: Attribute) {
        self.proc.attributes.insert(attr);
    }

    fn record(&mut self, err: IrError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn push(&mut self, block: BlockId, kind: InstKind) -> Value {
        match self.proc.append_inst(block, kind) {
            Ok(id) => Value::Inst(id),
            Err(e) => {
                self.record(e);
                Value::Const(0)
            }
        }
    }

    pub fn binary(&mut self, block: BlockId, op: BinOp, lhs: Value, rhs: Value) -> Value {
        self.push(block, InstKind::Binary { op, lhs, rhs })
    }

    pub fn cmp(&mut self, block: BlockId, pred: CmpPred, lhs: Value, rhs: Value) -> Value {
        self.push(block, InstKind::Cmp { pred, lhs, rhs })
    }

    pub fn phi(&mut self, block: BlockId, incoming: Vec<(BlockId, Value)>) -> Value {
        self.push(block, InstKind::Phi { incoming })
    }

    /// Adds an incoming entry to a PHI created earlier, for back-edges.
    pub fn add_incoming(&mut self, phi: Value, block: BlockId, value: Value) {
        let Some(id) = phi.as_inst() else {
            self.record(IrError::NotAPhi(usize::MAX));
            return;
        };
        if let Err(e) = self.proc.add_phi_incoming(id, block, value) {
            self.record(e);
        }
    }

    pub fn alloca(&mut self, block: BlockId) -> Value {
        self.push(block, InstKind::Alloca)
    }

    pub fn load(&mut self, block: BlockId, slot: Value) -> Value {
        self.push(block, InstKind::Load { slot })
    }

    pub fn store(&mut self, block: BlockId, slot: Value, value: Value) {
        self.push(block, InstKind::Store { slot, value });
    }

    pub fn call(&mut self, block: BlockId, callee: &str, args: Vec<Value>) -> Value {
        self.push(
            block,
            InstKind::Call {
                callee: callee.to_string(),
                args,
            },
        )
    }

    pub fn marker(&mut self, block: BlockId, label: &str) {
        self.push(
            block,
            InstKind::DebugMarker {
                label: label.to_string(),
            },
        );
    }

    pub fn br(&mut self, block: BlockId, target: BlockId) {
        self.push(block, InstKind::Br { target });
    }

    pub fn cond_br(&mut self, block: BlockId, cond: Value, then_dest: BlockId, else_dest: BlockId) {
        self.push(
            block,
            InstKind::CondBr {
                cond,
                then_dest,
                else_dest,
            },
        );
    }

    pub fn switch(
        &mut self,
        block: BlockId,
        value: Value,
        default: BlockId,
        cases: Vec<(i64, BlockId)>,
    ) {
        self.push(
            block,
            InstKind::Switch {
                value,
                default,
                cases,
            },
        );
    }

    pub fn ret(&mut self, block: BlockId, value: Option<Value>) {
        self.push(block, InstKind::Ret { value });
    }

    pub fn unreachable(&mut self, block: BlockId) {
        self.push(block, InstKind::Unreachable);
    }

    pub fn invoke(
        &mut self,
        block: BlockId,
        callee: &str,
        args: Vec<Value>,
        normal: BlockId,
        unwind: BlockId,
    ) -> Value {
        self.push(
            block,
            InstKind::Invoke {
                callee: callee.to_string(),
                args,
                normal,
                unwind,
            },
        )
    }

    pub fn resume(&mut self, block: BlockId, value: Value) {
        self.push(block, InstKind::Resume { value });
    }

    /// Returns the procedure, or the first error hit while building it.
    pub fn finish(self) -> Result<Procedure, IrError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.proc),
        }
    }
}
