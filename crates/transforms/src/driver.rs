//! Per-procedure driver: marker and allow-list checks, candidate scan, trials, demotion and
//! the split of every selected block.

use rand::{Rng, rngs::StdRng, seq::SliceRandom};
use std::sync::Arc;
use thicket_core::cfg_ir::{Attribute, Procedure, demote};
use thicket_utils::errors::{ConfigError, TransformError};
use tracing::debug;

use crate::bogus_flow::transform_block;
use crate::config::BogusFlowConfig;
use crate::eligibility::{ScanResult, scan_procedure};
use crate::observer::{NoopObserver, Observer, SkipReason, TraceEvent};
use crate::opaque_predicate::{ConstantPredicate, OpaquePredicate};
use crate::{Outcome, Transform};

/// Inserts bogus control flow into one procedure.
///
/// `rng` should be freshly derived for this procedure so its trials do not depend on earlier
/// procedures. Candidates and trials are drawn before the graph is touched: a procedure in
/// which no block wins its trial comes back byte-identical.
pub fn run(
    proc: &mut Procedure,
    config: &BogusFlowConfig,
    rng: &mut StdRng,
    predicate: &dyn OpaquePredicate,
    observer: &dyn Observer,
) -> Result<Outcome, TransformError> {
    config.validate()?;

    let skip = |reason: SkipReason| {
        observer.record(TraceEvent::ProcedureSkipped {
            procedure: proc.name.clone(),
            reason,
        });
        Ok(Outcome::Unchanged)
    };
    if proc.is_declaration() {
        return skip(SkipReason::Declaration);
    }
    if config.disabled {
        return skip(SkipReason::Disabled);
    }
    if proc.has_attribute(Attribute::BogusFlowApplied) && !config.reforce {
        return skip(SkipReason::AlreadyApplied);
    }
    if !config.allows(&proc.name) && !proc.has_attribute(Attribute::ForceBogusFlow) {
        return skip(SkipReason::NotRequested);
    }

    let mut candidates = match scan_procedure(proc)? {
        ScanResult::Disqualified(block) => {
            observer.record(TraceEvent::ProcedureDisqualified {
                procedure: proc.name.clone(),
                block: proc.block_name(block),
            });
            return Ok(Outcome::Unchanged);
        }
        ScanResult::AllEligible { blocks, skipped } => {
            for (block, reason) in skipped {
                observer.record(TraceEvent::BlockSkipped {
                    procedure: proc.name.clone(),
                    block: proc.block_name(block),
                    reason,
                });
            }
            blocks
        }
    };

    candidates.shuffle(rng);
    let selected: Vec<_> = candidates
        .into_iter()
        .filter(|_| rng.random_bool(config.probability))
        .collect();
    if selected.is_empty() {
        debug!("bcf: no block of `{}` selected", proc.name);
        return Ok(Outcome::Unchanged);
    }

    let phis = demote::collect_phis(proc)?;
    let demoted = demote::demote_phis(proc, &phis)?;
    debug!("bcf: `{}` demoted {} phi nodes", proc.name, demoted);

    let mut modified = false;
    for block in selected {
        if transform_block(proc, block, predicate, rng, observer)? == Outcome::Modified {
            modified = true;
        }
    }

    if modified {
        proc.attributes.insert(Attribute::BogusFlowApplied);
        Ok(Outcome::Modified)
    } else {
        Ok(Outcome::Unchanged)
    }
}

/// [`run`] packaged as a [`Transform`] for the pass runner.
pub struct BogusControlFlow {
    config: BogusFlowConfig,
    predicate: Box<dyn OpaquePredicate>,
    observer: Arc<dyn Observer>,
}

impl BogusControlFlow {
    /// Validates `config` up front so a bad probability fails before any procedure is touched.
    pub fn new(
        config: BogusFlowConfig,
        predicate: Box<dyn OpaquePredicate>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            predicate,
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &BogusFlowConfig {
        &self.config
    }
}

impl Default for BogusControlFlow {
    fn default() -> Self {
        Self {
            config: BogusFlowConfig::default(),
            predicate: Box::new(ConstantPredicate),
            observer: Arc::new(NoopObserver),
        }
    }
}

impl std::fmt::Debug for BogusControlFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BogusControlFlow")
            .field("config", &self.config)
            .field("predicate", &self.predicate.name())
            .finish()
    }
}

impl Transform for BogusControlFlow {
    fn name(&self) -> &'static str {
        "BogusControlFlow"
    }

    fn apply(&self, proc: &mut Procedure, rng: &mut StdRng) -> Result<bool, TransformError> {
        let outcome = run(
            proc,
            &self.config,
            rng,
            self.predicate.as_ref(),
            self.observer.as_ref(),
        )?;
        Ok(outcome == Outcome::Modified)
    }
}
