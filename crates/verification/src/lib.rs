//! Thicket Verification
//!
//! Empirical checks that an obfuscated procedure behaves like its original:
//!
//! 1. **Interpretation**: a reference interpreter executes procedures on concrete arguments
//! 2. **Differential Testing**: original and transformed procedures run on the same sampled
//!    inputs and must agree on return value and call effects

pub mod interp;
pub mod practical;

pub use interp::{Effect, ExecutionOutcome, execute};
pub use practical::{DifferentialTester, EquivalenceResults, Mismatch};
use thicket_utils::errors::IrError;

/// Main error type for verification operations
#[derive(thiserror::Error, Debug)]
pub enum VerificationError {
    #[error("execution error: {0}")]
    Execution(String),

    #[error("step budget exhausted after {steps} instructions")]
    FuelExhausted { steps: u64 },

    #[error("`{procedure}` takes {expected} arguments, got {got}")]
    ArityMismatch {
        procedure: String,
        expected: usize,
        got: usize,
    },

    #[error("no procedure named `{0}` in the transformed module")]
    MissingProcedure(String),

    #[error("graph error: {0}")]
    Ir(#[from] IrError),
}

/// Result type for verification operations
pub type VerificationResult<T> = Result<T, VerificationError>;
