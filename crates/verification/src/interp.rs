//! Reference interpreter for the CFG IR.
//!
//! Executes one procedure on concrete `i64` arguments. Arithmetic wraps, comparisons yield `1`
//! or `0`, a stack slot reads `0` until first written, and every call is recorded as an
//! observable effect whose result is a fixed function of its callee and arguments. `invoke`
//! never unwinds. Execution is bounded by a step budget.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thicket_core::cfg_ir::{BinOp, BlockId, CmpPred, InstId, InstKind, Procedure, Value};

use crate::{VerificationError, VerificationResult};

/// Default number of instructions a single execution may run.
pub const DEFAULT_FUEL: u64 = 100_000;

/// An externally visible call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub callee: String,
    pub args: Vec<i64>,
}

/// Everything an outside observer sees from one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub ret: Option<i64>,
    pub effects: Vec<Effect>,
    /// Instructions executed; not part of the observable behaviour.
    #[serde(skip)]
    pub steps: u64,
}

impl ExecutionOutcome {
    /// Compares return value and effects, ignoring the step count.
    pub fn observably_equal(&self, other: &Self) -> bool {
        self.ret == other.ret && self.effects == other.effects
    }
}

/// Result of a call to an external procedure.
fn call_result(callee: &str, args: &[i64]) -> i64 {
    let seed = callee
        .bytes()
        .fold(0x9e37_79b9_i64, |acc, b| acc.wrapping_mul(31).wrapping_add(i64::from(b)));
    args.iter()
        .fold(seed, |acc, a| acc.wrapping_mul(1_000_003).wrapping_add(*a))
}

fn binary(op: BinOp, lhs: i64, rhs: i64) -> i64 {
    match op {
        BinOp::Add => lhs.wrapping_add(rhs),
        BinOp::Sub => lhs.wrapping_sub(rhs),
        BinOp::Mul => lhs.wrapping_mul(rhs),
        BinOp::And => lhs & rhs,
        BinOp::Or => lhs | rhs,
        BinOp::Xor => lhs ^ rhs,
        BinOp::Shl => lhs.wrapping_shl((rhs & 63) as u32),
        BinOp::Shr => lhs.wrapping_shr((rhs & 63) as u32),
    }
}

fn compare(pred: CmpPred, lhs: i64, rhs: i64) -> i64 {
    let holds = match pred {
        CmpPred::Eq => lhs == rhs,
        CmpPred::Ne => lhs != rhs,
        CmpPred::Slt => lhs < rhs,
        CmpPred::Sle => lhs <= rhs,
        CmpPred::Sgt => lhs > rhs,
        CmpPred::Sge => lhs >= rhs,
    };
    i64::from(holds)
}

/// Interpreter state for one execution.
#[derive(Debug)]
pub struct Interpreter<'a> {
    proc: &'a Procedure,
    args: &'a [i64],
    values: HashMap<InstId, i64>,
    memory: HashMap<i64, i64>,
    next_slot: i64,
    effects: Vec<Effect>,
    fuel: u64,
    steps: u64,
}

impl<'a> Interpreter<'a> {
    pub fn new(proc: &'a Procedure, args: &'a [i64], fuel: u64) -> VerificationResult<Self> {
        if args.len() != proc.arity as usize {
            return Err(VerificationError::ArityMismatch {
                procedure: proc.name.clone(),
                expected: proc.arity as usize,
                got: args.len(),
            });
        }
        Ok(Self {
            proc,
            args,
            values: HashMap::new(),
            memory: HashMap::new(),
            next_slot: 1,
            effects: Vec::new(),
            fuel,
            steps: 0,
        })
    }

    fn read(&self, value: Value) -> VerificationResult<i64> {
        match value {
            Value::Const(c) => Ok(c),
            Value::Arg(n) => self.args.get(n as usize).copied().ok_or_else(|| {
                VerificationError::Execution(format!("argument {n} out of range"))
            }),
            Value::Inst(id) => self.values.get(&id).copied().ok_or_else(|| {
                VerificationError::Execution(format!("%{} read before definition", id.0))
            }),
        }
    }

    fn tick(&mut self) -> VerificationResult<()> {
        if self.steps >= self.fuel {
            return Err(VerificationError::FuelExhausted { steps: self.steps });
        }
        self.steps += 1;
        Ok(())
    }

    /// Runs the procedure to its return.
    pub fn run(mut self) -> VerificationResult<ExecutionOutcome> {
        let proc = self.proc;
        let mut block = proc
            .entry()
            .ok_or_else(|| VerificationError::Execution(format!("`{}` has no body", proc.name)))?;
        let mut prev: Option<BlockId> = None;

        loop {
            let insts = &proc.block(block)?.insts;

            // PHIs read their inputs simultaneously on block entry.
            let mut merged = Vec::new();
            for &id in insts {
                let InstKind::Phi { incoming } = proc.kind(id)? else {
                    break;
                };
                let from = prev.ok_or_else(|| {
                    VerificationError::Execution("phi in the entry block".to_string())
                })?;
                let value = incoming
                    .iter()
                    .find_map(|(b, v)| (*b == from).then_some(*v))
                    .ok_or_else(|| {
                        VerificationError::Execution(format!("%{} has no entry for the edge", id.0))
                    })?;
                merged.push((id, self.read(value)?));
            }
            let skip = merged.len();
            for (id, v) in merged {
                self.tick()?;
                self.values.insert(id, v);
            }

            let mut next = None;
            for &id in &insts[skip..] {
                self.tick()?;
                match proc.kind(id)? {
                    InstKind::Binary { op, lhs, rhs } => {
                        let v = binary(*op, self.read(*lhs)?, self.read(*rhs)?);
                        self.values.insert(id, v);
                    }
                    InstKind::Cmp { pred, lhs, rhs } => {
                        let v = compare(*pred, self.read(*lhs)?, self.read(*rhs)?);
                        self.values.insert(id, v);
                    }
                    InstKind::Phi { .. } => {
                        return Err(VerificationError::Execution(format!(
                            "phi %{} after a non-phi",
                            id.0
                        )));
                    }
                    InstKind::Alloca => {
                        let slot = self.next_slot;
                        self.next_slot += 1;
                        self.values.insert(id, slot);
                    }
                    InstKind::Load { slot } => {
                        let addr = self.read(*slot)?;
                        let v = self.memory.get(&addr).copied().unwrap_or(0);
                        self.values.insert(id, v);
                    }
                    InstKind::Store { slot, value } => {
                        let addr = self.read(*slot)?;
                        let v = self.read(*value)?;
                        self.memory.insert(addr, v);
                    }
                    InstKind::Call { callee, args } | InstKind::Invoke { callee, args, .. } => {
                        let args = args
                            .iter()
                            .map(|a| self.read(*a))
                            .collect::<VerificationResult<Vec<_>>>()?;
                        let result = call_result(callee, &args);
                        self.effects.push(Effect {
                            callee: callee.clone(),
                            args,
                        });
                        self.values.insert(id, result);
                        if let InstKind::Invoke { normal, .. } = proc.kind(id)? {
                            next = Some(*normal);
                        }
                    }
                    InstKind::DebugMarker { .. } => {}
                    InstKind::Br { target } => next = Some(*target),
                    InstKind::CondBr {
                        cond,
                        then_dest,
                        else_dest,
                    } => {
                        next = Some(if self.read(*cond)? != 0 {
                            *then_dest
                        } else {
                            *else_dest
                        });
                    }
                    InstKind::Switch {
                        value,
                        default,
                        cases,
                    } => {
                        let v = self.read(*value)?;
                        next = Some(
                            cases
                                .iter()
                                .find_map(|(k, b)| (*k == v).then_some(*b))
                                .unwrap_or(*default),
                        );
                    }
                    InstKind::Ret { value } => {
                        let ret = value.map(|v| self.read(v)).transpose()?;
                        return Ok(ExecutionOutcome {
                            ret,
                            effects: self.effects,
                            steps: self.steps,
                        });
                    }
                    InstKind::Unreachable => {
                        return Err(VerificationError::Execution(format!(
                            "reached unreachable in {}",
                            proc.block_name(block)
                        )));
                    }
                    InstKind::Resume { .. } => {
                        return Err(VerificationError::Execution(
                            "resume without an exception in flight".to_string(),
                        ));
                    }
                }
            }

            let Some(target) = next else {
                return Err(VerificationError::Execution(format!(
                    "block {} fell off its end",
                    proc.block_name(block)
                )));
            };
            prev = Some(block);
            block = target;
        }
    }
}

/// Executes `proc` on `args` with the given step budget.
pub fn execute(proc: &Procedure, args: &[i64], fuel: u64) -> VerificationResult<ExecutionOutcome> {
    Interpreter::new(proc, args, fuel)?.run()
}
