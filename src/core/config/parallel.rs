//! Parallel processing configuration for batch runs.

use serde::{Deserialize, Serialize};

/// Controls whether and how a batch run spreads images across threads.
///
/// Alignment of one image is always single-threaded. Images are independent,
/// so a batch may optionally run them on a dedicated rayon pool; results are
/// still reported in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelPolicy {
    /// Maximum number of worker threads for a parallel batch.
    /// If None, rayon picks its default pool size (typically number of CPU cores).
    /// Default: None
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Batches with at most this many images always run sequentially.
    /// Default: 4
    #[serde(default = "ParallelPolicy::default_sequential_threshold")]
    pub sequential_threshold: usize,
}

impl ParallelPolicy {
    /// Create a new ParallelPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never uses the thread pool.
    pub fn sequential() -> Self {
        Self::default().with_max_threads(Some(1))
    }

    /// Set the maximum number of threads.
    pub fn with_max_threads(mut self, max_threads: Option<usize>) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the sequential threshold.
    pub fn with_sequential_threshold(mut self, threshold: usize) -> Self {
        self.sequential_threshold = threshold;
        self
    }

    /// Returns true when a batch of `items` images should use the thread pool.
    pub fn should_parallelize(&self, items: usize) -> bool {
        items > self.sequential_threshold && self.max_threads != Some(1)
    }

    /// Build a local rayon pool sized by `max_threads`.
    ///
    /// A local pool is used instead of the global one so that several batch
    /// runs in the same process (e.g. the HTTP server) can pick different sizes.
    pub fn build_thread_pool(&self) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(num_threads) = self.max_threads {
            builder = builder.num_threads(num_threads);
        }
        builder.build()
    }

    fn default_sequential_threshold() -> usize {
        4
    }
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            max_threads: None,
            sequential_threshold: Self::default_sequential_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_batches_stay_sequential() {
        let policy = ParallelPolicy::new();
        assert!(!policy.should_parallelize(3));
        assert!(policy.should_parallelize(5));
    }

    #[test]
    fn test_single_thread_never_parallelizes() {
        let policy = ParallelPolicy::new()
            .with_max_threads(Some(1))
            .with_sequential_threshold(0);
        assert!(!policy.should_parallelize(100));
    }

    #[test]
    fn test_sequential_policy() {
        assert!(!ParallelPolicy::sequential().should_parallelize(1000));
    }

    #[test]
    fn test_deserialize_uses_defaults() {
        let policy: ParallelPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, ParallelPolicy::default());
    }
}
