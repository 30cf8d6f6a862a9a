//! Module-level pass runner with per-procedure snapshots and metrics.

use serde::Serialize;
use thicket_analysis::{Metrics, collect_metrics, compare};
use thicket_core::cfg_ir::Module;
use thicket_utils::errors::TransformError;
use thicket_utils::seed::Seed;
use tracing::{info, warn};

use crate::Transform;

/// What happened to one procedure during a pass.
#[derive(Debug, Clone, Serialize)]
pub struct ProcedureReport {
    pub name: String,
    pub modified: bool,
    /// Set when the procedure was rolled back because of unsupported control flow.
    pub rejected: Option<String>,
    pub before: Option<Metrics>,
    pub after: Option<Metrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub seed: u64,
    pub procedures: Vec<ProcedureReport>,
}

impl PassReport {
    pub fn modified_count(&self) -> usize {
        self.procedures.iter().filter(|p| p.modified).count()
    }
}

/// Trait for running a sequence of transforms over every procedure of a module.
pub trait Pass {
    fn run(
        &self,
        module: &mut Module,
        passes: &[Box<dyn Transform>],
        seed: Seed,
    ) -> Result<PassReport, TransformError>;
}

/// Default implementation of the Pass trait.
///
/// Each procedure gets a generator derived from the seed and its name, and is transformed on a
/// snapshot that is committed only if every transform succeeds. Unsupported control flow rolls
/// the procedure back and the pass moves on; any other error aborts the run.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPass;

impl Pass for DefaultPass {
    fn run(
        &self,
        module: &mut Module,
        passes: &[Box<dyn Transform>],
        seed: Seed,
    ) -> Result<PassReport, TransformError> {
        let mut procedures = Vec::with_capacity(module.procedures.len());

        for proc in &mut module.procedures {
            let mut rng = seed.rng_for(&proc.name);
            let before = collect_metrics(proc).ok();
            let mut snapshot = proc.clone();
            let mut modified = false;
            let mut rejected = None;

            for pass in passes {
                match pass.apply(&mut snapshot, &mut rng) {
                    Ok(changed) => modified |= changed,
                    Err(e @ TransformError::UnsupportedControlFlow { .. }) => {
                        warn!("{:>16} `{}` left untouched: {}", pass.name(), proc.name, e);
                        rejected = Some(e.to_string());
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }

            if rejected.is_some() || !modified {
                procedures.push(ProcedureReport {
                    name: proc.name.clone(),
                    modified: false,
                    rejected,
                    after: before.clone(),
                    before,
                });
                continue;
            }

            let after = collect_metrics(&snapshot).ok();
            if let (Some(b), Some(a)) = (&before, &after) {
                info!(
                    "{:>16} blocks {} -> {} Δ{:+.2}",
                    proc.name,
                    b.block_cnt,
                    a.block_cnt,
                    compare(b, a)
                );
            }
            *proc = snapshot;
            procedures.push(ProcedureReport {
                name: proc.name.clone(),
                modified: true,
                rejected: None,
                before,
                after,
            });
        }

        Ok(PassReport {
            seed: seed.value(),
            procedures,
        })
    }
}

/// Convenience function to run the default pass.
pub fn run(
    module: &mut Module,
    passes: &[Box<dyn Transform>],
    seed: Seed,
) -> Result<PassReport, TransformError> {
    DefaultPass.run(module, passes, seed)
}
