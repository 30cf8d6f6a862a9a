use async_trait::async_trait;
use clap::Args;
use std::error::Error;
use std::fs;
use thicket_core::cfg_ir::{EdgeType, Procedure};
use thicket_utils::errors::ObfuscateError;

use super::load_module;

#[derive(Args)]
pub struct CfgArgs {
    /// Module to render (JSON)
    pub input: String,
    /// Render only this procedure
    #[arg(short, long)]
    function: Option<String>,
    /// Output file for Graphviz .dot (default: stdout)
    #[arg(short, long)]
    output: Option<String>,
}

#[async_trait]
impl super::Command for CfgArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let module = load_module(&self.input)?;
        let procs: Vec<&Procedure> = match &self.function {
            Some(name) => vec![
                module
                    .procedure(name)
                    .ok_or_else(|| ObfuscateError::UnknownProcedure(name.clone()))?,
            ],
            None => module.procedures.iter().collect(),
        };

        let dot = generate_dot(&procs);
        if let Some(out_path) = self.output {
            fs::write(out_path, &dot)?;
        } else {
            println!("{dot}");
        }
        Ok(())
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders each procedure as a cluster of blocks labelled with their instructions.
pub fn generate_dot(procs: &[&Procedure]) -> String {
    let mut dot = String::from("digraph CFG {\n    node [shape=box];\n");

    for (p, proc) in procs.iter().enumerate() {
        dot.push_str(&format!(
            "    subgraph cluster_{p} {{\n        label=\"{}\";\n",
            escape(&proc.name)
        ));

        // Add nodes
        for &block in &proc.layout {
            let mut lines = vec![proc.block_name(block)];
            if let Ok(data) = proc.block(block) {
                for &id in &data.insts {
                    if let Ok(inst) = proc.inst(id) {
                        let text = proc.render_inst(&inst.kind);
                        if inst.kind.has_result() {
                            lines.push(format!("%{} = {text}", id.0));
                        } else {
                            lines.push(text);
                        }
                    }
                }
            }
            let label: Vec<String> = lines.iter().map(|l| escape(l)).collect();
            dot.push_str(&format!(
                "        p{p}_b{} [label=\"{}\\l\"];\n",
                block.index(),
                label.join("\\l")
            ));
        }

        // Add edges
        for edge in proc.cfg.edge_indices() {
            let (Some((src, dst)), Some(edge_type)) =
                (proc.cfg.edge_endpoints(edge), proc.cfg.edge_weight(edge))
            else {
                continue;
            };
            let label = match edge_type {
                EdgeType::Jump => "Jump",
                EdgeType::BranchTrue => "BranchTrue",
                EdgeType::BranchFalse => "BranchFalse",
                EdgeType::Case => "Case",
                EdgeType::Normal => "Normal",
                EdgeType::Unwind => "Unwind",
            };
            dot.push_str(&format!(
                "        p{p}_b{} -> p{p}_b{} [label=\"{}\"];\n",
                src.index(),
                dst.index(),
                label
            ));
        }
        dot.push_str("    }\n");
    }

    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use thicket_core::cfg_ir::{ProcedureBuilder, Value};

    #[test]
    fn test_generate_dot_lists_blocks_and_edges() {
        let mut b = ProcedureBuilder::new("f", 1);
        let entry = b.block("entry");
        let yes = b.block("yes");
        let no = b.block("no");
        b.cond_br(entry, Value::Arg(0), yes, no);
        b.ret(yes, Some(Value::Const(1)));
        b.ret(no, Some(Value::Const(0)));
        let proc = b.finish().unwrap();

        let dot = generate_dot(&[&proc]);
        assert!(dot.starts_with("digraph CFG {"));
        assert!(dot.contains("label=\"f\""));
        assert!(dot.contains("p0_b0 -> p0_b1 [label=\"BranchTrue\"]"));
        assert!(dot.contains("p0_b0 -> p0_b2 [label=\"BranchFalse\"]"));
        assert!(dot.contains("ret 1"));
    }
}
