//! Scheduler settings

use serde::{Deserialize, Serialize};

use crate::error::{Result, SymposiumError};
use crate::scheduler::pacing::ResponsePacing;

/// Tunables of the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Maximum concurrently in-flight requests (>= 1)
    pub max_concurrent: usize,

    pub response_pacing: ResponsePacing,

    /// Softmax temperature; clamped to a small floor when sampling
    pub selection_temperature: f64,

    /// Extra damping applied to decayed politeness each message, in [0, 1]
    pub politeness_decay_multiplier: f64,

    /// Run a scheduling pass automatically on every event
    pub auto_start: bool,

    /// Wait before calling the provider for an admitted request
    pub response_delay_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            response_pacing: ResponsePacing::Steady,
            selection_temperature: 1.0,
            politeness_decay_multiplier: 0.8,
            auto_start: false,
            response_delay_ms: 1200,
        }
    }
}

impl SchedulerSettings {
    /// Reject settings the scheduler cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(SymposiumError::Config("max_concurrent must be at least 1".to_string()));
        }
        if !self.selection_temperature.is_finite() || self.selection_temperature <= 0.0 {
            return Err(SymposiumError::Config(format!(
                "selection_temperature must be positive, got {}",
                self.selection_temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.politeness_decay_multiplier) {
            return Err(SymposiumError::Config(format!(
                "politeness_decay_multiplier must be within [0, 1], got {}",
                self.politeness_decay_multiplier
            )));
        }
        Ok(())
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_pacing(mut self, pacing: ResponsePacing) -> Self {
        self.response_pacing = pacing;
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn with_response_delay_ms(mut self, delay: u64) -> Self {
        self.response_delay_ms = delay;
        self
    }
}
