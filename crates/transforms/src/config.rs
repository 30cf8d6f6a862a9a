//! User-facing knobs for bogus control-flow insertion.

use serde::{Deserialize, Serialize};
use thicket_utils::errors::ConfigError;

/// Configuration for bogus control-flow insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BogusFlowConfig {
    /// Procedures to transform by exact name; empty means every procedure.
    pub allow_list: Vec<String>,
    /// Probability that an eligible block is split and cloned.
    pub probability: f64,
    /// Base seed; a random one is drawn when absent.
    pub seed: Option<u64>,
    /// Turns the transform into a no-op.
    pub disabled: bool,
    /// Transforms procedures that already carry the applied marker.
    pub reforce: bool,
}

impl Default for BogusFlowConfig {
    fn default() -> Self {
        Self {
            allow_list: Vec::new(),
            probability: 0.3,
            seed: None,
            disabled: false,
            reforce: false,
        }
    }
}

impl BogusFlowConfig {
    /// Rejects a probability outside `[0, 1]` (NaN included).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ConfigError::ProbabilityOutOfRange(self.probability));
        }
        Ok(())
    }

    /// Whether the allow-list admits `name`.
    pub fn allows(&self, name: &str) -> bool {
        self.allow_list.is_empty() || self.allow_list.iter().any(|n| n == name)
    }
}
