//! Human-readable rendering of the IR.

use std::fmt;

use super::{BinOp, BlockId, CmpPred, InstKind, Module, Procedure, Value};

fn join(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::Shr => "shr",
        };
        f.write_str(s)
    }
}

impl fmt::Display for CmpPred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpPred::Eq => "eq",
            CmpPred::Ne => "ne",
            CmpPred::Slt => "slt",
            CmpPred::Sle => "sle",
            CmpPred::Sgt => "sgt",
            CmpPred::Sge => "sge",
        };
        f.write_str(s)
    }
}

impl Procedure {
    /// Renders one instruction, block references resolved to names.
    pub fn render_inst(&self, kind: &InstKind) -> String {
        let label = |b: &BlockId| self.block_name(*b);
        match kind {
            InstKind::Binary { op, lhs, rhs } => format!("{op} {lhs}, {rhs}"),
            InstKind::Cmp { pred, lhs, rhs } => format!("cmp {pred} {lhs}, {rhs}"),
            InstKind::Phi { incoming } => {
                let parts: Vec<String> = incoming
                    .iter()
                    .map(|(b, v)| format!("[{v}, {}]", label(b)))
                    .collect();
                format!("phi {}", parts.join(", "))
            }
            InstKind::Alloca => "alloca".to_string(),
            InstKind::Load { slot } => format!("load {slot}"),
            InstKind::Store { slot, value } => format!("store {slot}, {value}"),
            InstKind::Call { callee, args } => format!("call @{callee}({})", join(args)),
            InstKind::DebugMarker { label } => format!("marker \"{label}\""),
            InstKind::Br { target } => format!("br {}", label(target)),
            InstKind::CondBr {
                cond,
                then_dest,
                else_dest,
            } => format!("condbr {cond}, {}, {}", label(then_dest), label(else_dest)),
            InstKind::Switch {
                value,
                default,
                cases,
            } => {
                let arms: Vec<String> = cases
                    .iter()
                    .map(|(k, b)| format!("{k} => {}", label(b)))
                    .collect();
                format!("switch {value}, {} [{}]", label(default), arms.join(", "))
            }
            InstKind::Ret { value: Some(v) } => format!("ret {v}"),
            InstKind::Ret { value: None } => "ret".to_string(),
            InstKind::Unreachable => "unreachable".to_string(),
            InstKind::Invoke {
                callee,
                args,
                normal,
                unwind,
            } => format!(
                "invoke @{callee}({}) to {} unwind {}",
                join(args),
                label(normal),
                label(unwind)
            ),
            InstKind::Resume { value } => format!("resume {value}"),
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_declaration() {
            return writeln!(f, "declare @{}({})", self.name, self.arity);
        }
        write!(f, "proc @{}({})", self.name, self.arity)?;
        if !self.attributes.is_empty() {
            write!(f, " {:?}", self.attributes)?;
        }
        writeln!(f, " {{")?;
        for &block in &self.layout {
            let preds: Vec<String> = self
                .predecessors(block)
                .iter()
                .map(|b| self.block_name(*b))
                .collect();
            let pad = match self.cfg.node_weight(block) {
                Some(b) if b.landing_pad => " landingpad",
                _ => "",
            };
            writeln!(
                f,
                "{}:{pad}    ; preds: [{}]",
                self.block_name(block),
                preds.join(", ")
            )?;
            let Some(data) = self.cfg.node_weight(block) else {
                continue;
            };
            for &id in &data.insts {
                let Ok(inst) = self.inst(id) else {
                    writeln!(f, "  <dangling %{}>", id.0)?;
                    continue;
                };
                if inst.kind.has_result() {
                    writeln!(f, "  %{} = {}", id.0, self.render_inst(&inst.kind))?;
                } else {
                    writeln!(f, "  {}", self.render_inst(&inst.kind))?;
                }
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, proc) in self.procedures.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{proc}")?;
        }
        Ok(())
    }
}
