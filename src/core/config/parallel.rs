//! Parallel processing configuration for batch runs.

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigValidator};
use crate::core::constants::DEFAULT_PARALLEL_THRESHOLD;

/// Controls how a batch of images is spread across worker threads.
///
/// Every image is an independent pipeline run, so the batch runner only has
/// to decide between a sequential loop and a rayon parallel iterator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelPolicy {
    /// Maximum number of threads to use for parallel processing.
    /// If None, rayon's global pool is used.
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Batches with at most this many images run sequentially.
    #[serde(default = "ParallelPolicy::default_image_threshold")]
    pub image_threshold: usize,
}

impl ParallelPolicy {
    /// Create a new ParallelPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of threads.
    pub fn with_max_threads(mut self, max_threads: Option<usize>) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the sequential image threshold.
    pub fn with_image_threshold(mut self, threshold: usize) -> Self {
        self.image_threshold = threshold;
        self
    }

    /// Whether a batch of `count` images should be processed in parallel.
    pub fn should_parallelize(&self, count: usize) -> bool {
        count > self.image_threshold
    }

    fn default_image_threshold() -> usize {
        DEFAULT_PARALLEL_THRESHOLD
    }
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            max_threads: None,
            image_threshold: Self::default_image_threshold(),
        }
    }
}

impl ConfigValidator for ParallelPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threads) = self.max_threads {
            self.validate_positive_count("max_threads", threads)?;
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_threshold() {
        let policy = ParallelPolicy::new().with_image_threshold(2);
        assert!(!policy.should_parallelize(2));
        assert!(policy.should_parallelize(3));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let policy = ParallelPolicy::new().with_max_threads(Some(0));
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let policy: ParallelPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.image_threshold, DEFAULT_PARALLEL_THRESHOLD);
        assert!(policy.max_threads.is_none());
    }
}
