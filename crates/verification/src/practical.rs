//! Differential testing of transformed procedures.
//!
//! Both versions of a procedure are interpreted on the same argument vectors: boundary values
//! first, then pseudo-random ones from a fixed seed. Two executions agree when they return the
//! same value and perform the same calls in the same order, or when both trap.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use std::time::{Duration, Instant};
use thicket_core::cfg_ir::{Module, Procedure};

use crate::interp::{DEFAULT_FUEL, ExecutionOutcome, execute};
use crate::{VerificationError, VerificationResult};

const BOUNDARY: [i64; 7] = [0, 1, -1, 2, 10, i64::MAX, i64::MIN];

/// What one execution looked like from outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Observed {
    Returned(ExecutionOutcome),
    Trapped(String),
}

impl Observed {
    fn agrees_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Returned(a), Self::Returned(b)) => a.observably_equal(b),
            (Self::Trapped(_), Self::Trapped(_)) => true,
            _ => false,
        }
    }
}

/// An input on which the two versions disagree.
#[derive(Debug, Clone, Serialize)]
pub struct Mismatch {
    pub args: Vec<i64>,
    pub original: Observed,
    pub transformed: Observed,
}

/// Results of equivalence testing
#[derive(Debug, Clone, Serialize)]
pub struct EquivalenceResults {
    pub procedure: String,
    /// Overall testing result
    pub overall_passed: bool,
    /// Number of argument vectors executed
    pub cases_executed: usize,
    pub mismatches: Vec<Mismatch>,
    /// Total testing time
    pub testing_time: Duration,
}

/// Differential tester over the reference interpreter.
#[derive(Debug, Clone)]
pub struct DifferentialTester {
    samples: usize,
    fuel: u64,
    seed: u64,
}

impl Default for DifferentialTester {
    fn default() -> Self {
        Self::new(32)
    }
}

impl DifferentialTester {
    /// `samples` argument vectors per procedure, boundary cases included.
    pub fn new(samples: usize) -> Self {
        Self {
            samples,
            fuel: DEFAULT_FUEL,
            seed: 0x7468_6963_6b65_74,
        }
    }

    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = fuel;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Argument vectors for a procedure of the given arity.
    pub fn argument_sets(&self, arity: u32) -> Vec<Vec<i64>> {
        let arity = arity as usize;
        if arity == 0 {
            return vec![Vec::new()];
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.samples)
            .map(|i| {
                (0..arity)
                    .map(|j| match BOUNDARY.get(i + j) {
                        Some(v) if i < BOUNDARY.len() => *v,
                        _ => rng.random_range(-1_000..=1_000),
                    })
                    .collect()
            })
            .collect()
    }

    fn observe(&self, proc: &Procedure, args: &[i64]) -> VerificationResult<Observed> {
        match execute(proc, args, self.fuel) {
            Ok(outcome) => Ok(Observed::Returned(outcome)),
            Err(e @ VerificationError::ArityMismatch { .. }) => Err(e),
            Err(e) => Ok(Observed::Trapped(e.to_string())),
        }
    }

    /// Tests equivalence between two versions of a procedure.
    pub fn test_equivalence(
        &self,
        original: &Procedure,
        transformed: &Procedure,
    ) -> VerificationResult<EquivalenceResults> {
        let start_time = Instant::now();
        if original.arity != transformed.arity {
            return Err(VerificationError::ArityMismatch {
                procedure: transformed.name.clone(),
                expected: original.arity as usize,
                got: transformed.arity as usize,
            });
        }

        let inputs = self.argument_sets(original.arity);
        let mut mismatches = Vec::new();
        for args in &inputs {
            let a = self.observe(original, args)?;
            let b = self.observe(transformed, args)?;
            if !a.agrees_with(&b) {
                tracing::debug!("`{}` diverges on {:?}", original.name, args);
                mismatches.push(Mismatch {
                    args: args.clone(),
                    original: a,
                    transformed: b,
                });
            }
        }

        let testing_time = start_time.elapsed();
        let overall_passed = mismatches.is_empty();
        tracing::info!(
            "Differential testing of `{}`: {} cases in {:.2}ms - {}",
            original.name,
            inputs.len(),
            testing_time.as_secs_f64() * 1000.0,
            if overall_passed { "PASSED" } else { "FAILED" }
        );

        Ok(EquivalenceResults {
            procedure: original.name.clone(),
            overall_passed,
            cases_executed: inputs.len(),
            mismatches,
            testing_time,
        })
    }

    /// Tests every defined procedure of `original` against its namesake in `transformed`.
    pub fn test_modules(
        &self,
        original: &Module,
        transformed: &Module,
    ) -> VerificationResult<Vec<EquivalenceResults>> {
        original
            .procedures
            .iter()
            .filter(|p| !p.is_declaration())
            .map(|p| {
                let other = transformed
                    .procedure(&p.name)
                    .ok_or_else(|| VerificationError::MissingProcedure(p.name.clone()))?;
                self.test_equivalence(p, other)
            })
            .collect()
    }
}
