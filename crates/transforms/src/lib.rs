pub mod bogus_flow;
pub mod config;
pub mod driver;
pub mod eligibility;
pub mod observer;
pub mod opaque_predicate;
pub mod pass;

use rand::rngs::StdRng;
use serde::Serialize;
use thicket_core::cfg_ir::Procedure;
use thicket_utils::errors::TransformError;

pub use config::BogusFlowConfig;
pub use driver::BogusControlFlow;

/// Trait for control-flow obfuscation transforms.
pub trait Transform: Send + Sync {
    /// Returns the transform's name for logging and identification.
    fn name(&self) -> &'static str;
    /// Applies the transform to one procedure, returning whether changes were made.
    fn apply(&self, proc: &mut Procedure, rng: &mut StdRng) -> Result<bool, TransformError>;
}

/// Whether a transform changed the procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Modified,
    Unchanged,
}
