use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Default block size: 1 MiB.
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Worker count used when the hardware concurrency cannot be determined.
pub const FALLBACK_WORKERS: usize = 4;

/// What to do when the codec rejects a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run and report the failing block. No output is written.
    #[default]
    Abort,
    /// Drop the failing block, keep going, and list it in the run report.
    /// The reconstructed output is then shorter than the input.
    Skip,
}

/// Tunables for one [`Pipeline`](crate::Pipeline). Fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw bytes per block (the last block may be smaller).
    pub block_size: usize,
    /// Number of compression worker threads.
    pub workers: usize,
    pub policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            workers: default_worker_count(),
            policy: FailurePolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.block_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "block size must be at least 1 byte".into(),
            ));
        }
        if self.workers == 0 {
            return Err(PipelineError::InvalidConfig(
                "worker count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Hardware concurrency, or [`FALLBACK_WORKERS`] when it is unknown.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.block_size, 1_048_576);
        assert!(cfg.workers >= 1);
        assert_eq!(cfg.policy, FailurePolicy::Abort);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_zero_block_size_and_workers() {
        let err = PipelineConfig::default().with_block_size(0).validate();
        assert!(matches!(err, Err(PipelineError::InvalidConfig(_))));
        let err = PipelineConfig::default().with_workers(0).validate();
        assert!(matches!(err, Err(PipelineError::InvalidConfig(_))));
    }
}
