/// Module for the `obfuscate` subcommand, which inserts bogus control flow into a module.
///
/// This module loads a JSON module, runs the bogus control-flow transform over its procedures
/// with the requested opaque predicate, checks the result structurally (and optionally by
/// differential execution), and writes the transformed module. It also emits a JSON report of
/// metrics and per-block events if requested.
use async_trait::async_trait;
use clap::Args;
use serde_json::json;
use std::error::Error;
use std::fs;
use std::sync::Arc;
use thicket_core::cfg_ir::verify::verify_procedure;
use thicket_transform::{
    BogusControlFlow, BogusFlowConfig, Transform, observer::EventLog, opaque_predicate, pass,
};
use thicket_utils::{errors::ObfuscateError, seed::Seed};
use thicket_verification::DifferentialTester;

use super::load_module;

/// Arguments for the `obfuscate` subcommand.
#[derive(Args)]
pub struct ObfuscateArgs {
    /// Module to transform (JSON).
    pub input: String,
    /// Random seed; a fresh one is drawn when omitted.
    #[arg(long)]
    seed: Option<u64>,
    /// Probability that an eligible block is split and cloned.
    #[arg(long, default_value_t = 0.3)]
    probability: f64,
    /// Comma-separated procedure names to transform (default: all).
    #[arg(long, value_delimiter = ',')]
    functions: Vec<String>,
    /// Leave every procedure untouched.
    #[arg(long)]
    disable: bool,
    /// Transform procedures that were already processed.
    #[arg(long)]
    reforce: bool,
    /// Opaque predicate family: constant or parity.
    #[arg(long, default_value = "constant")]
    predicate: String,
    /// Output file for the transformed module (default: stdout).
    #[arg(short, long)]
    output: Option<String>,
    /// Path to emit a JSON report (optional).
    #[arg(long)]
    emit: Option<String>,
    /// Differentially test each procedure on this many argument vectors.
    #[arg(long)]
    verify: Option<usize>,
}

impl ObfuscateArgs {
    fn config(&self) -> BogusFlowConfig {
        BogusFlowConfig {
            allow_list: self.functions.clone(),
            probability: self.probability,
            seed: self.seed,
            disabled: self.disable,
            reforce: self.reforce,
        }
    }
}

/// Executes the `obfuscate` subcommand to transform a module and write it out.
#[async_trait]
impl super::Command for ObfuscateArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let mut module = load_module(&self.input)?;
        let config = self.config();
        tracing::debug!(
            "Loaded {} procedures from {}",
            module.procedures.len(),
            self.input
        );

        for name in &config.allow_list {
            if module.procedure(name).is_none() {
                return Err(ObfuscateError::UnknownProcedure(name.clone()).into());
            }
        }
        let predicate = opaque_predicate::predicate_by_name(&self.predicate)
            .ok_or_else(|| ObfuscateError::InvalidPredicate(self.predicate.clone()))?;

        let log = Arc::new(EventLog::new());
        let transform = BogusControlFlow::new(config.clone(), predicate)
            .map_err(|e| ObfuscateError::Transform(e.into()))?
            .with_observer(log.clone());
        let passes: Vec<Box<dyn Transform>> = vec![Box::new(transform)];

        let seed = Seed::from_config(config.seed);
        let original = module.clone();
        let report = pass::run(&mut module, &passes, seed).map_err(ObfuscateError::from)?;

        for proc in &module.procedures {
            verify_procedure(proc).map_err(ObfuscateError::Module)?;
        }

        let equivalence = match self.verify {
            Some(samples) => {
                let results = DifferentialTester::new(samples)
                    .with_seed(seed.value())
                    .test_modules(&original, &module)?;
                if let Some(failed) = results.iter().find(|r| !r.overall_passed) {
                    return Err(ObfuscateError::Diverged {
                        procedure: failed.procedure.clone(),
                        mismatches: failed.mismatches.len(),
                        cases: failed.cases_executed,
                    }
                    .into());
                }
                tracing::info!("Differential testing passed for {} procedures", results.len());
                Some(results)
            }
            None => None,
        };

        let out = module.to_json().map_err(ObfuscateError::Module)?;
        match &self.output {
            Some(path) => fs::write(path, &out)?,
            None => println!("{out}"),
        }

        if let Some(path) = &self.emit {
            let doc = json!({
                "seed": report.seed,
                "predicate": self.predicate,
                "probability": config.probability,
                "procedures": report.procedures,
                "events": log.events(),
                "equivalence": equivalence,
            });
            let text = serde_json::to_string_pretty(&doc).map_err(ObfuscateError::Serialize)?;
            fs::write(path, text)?;
            eprintln!("Wrote report to {path}");
        }

        eprintln!(
            "Obfuscation complete: {} of {} procedures modified (seed {})",
            report.modified_count(),
            module.procedures.len(),
            report.seed
        );
        Ok(())
    }
}
