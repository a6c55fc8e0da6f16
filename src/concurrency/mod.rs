//! Bounded-concurrency batch processor
//!
//! Fans independent evaluations out in batches of at most the configured
//! concurrency, races every item against a per-item timeout, and isolates
//! failures so one bad item never takes its batch down. Used by multi-symbol
//! strategies and by any caller needing bounded fan-out.

use futures_util::future::join_all;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_CONCURRENCY: usize = 10;
const MIN_CONCURRENCY: usize = 1;
const MAX_CONCURRENCY: usize = 50;
const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Error)]
pub enum ItemError {
    #[error("item {index} timed out after {timeout:?}")]
    Timeout { index: usize, timeout: Duration },
    #[error("item {index} failed: {message}")]
    Failed { index: usize, message: String },
}

impl ItemError {
    pub fn index(&self) -> usize {
        match self {
            ItemError::Timeout { index, .. } => *index,
            ItemError::Failed { index, .. } => *index,
        }
    }
}

/// Successes and structured failures from one processing run
#[derive(Debug)]
pub struct BatchReport<R> {
    pub successes: Vec<R>,
    pub errors: Vec<ItemError>,
    pub batches: usize,
}

impl<R> BatchReport<R> {
    pub fn total(&self) -> usize {
        self.successes.len() + self.errors.len()
    }
}

#[derive(Debug, Clone)]
pub struct ParallelEvaluator {
    concurrency: usize,
    item_timeout: Duration,
}

impl Default for ParallelEvaluator {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
        }
    }
}

impl ParallelEvaluator {
    /// Concurrency is clamped to the supported 1..=50 range
    pub fn new(concurrency: usize, item_timeout: Duration) -> Self {
        Self {
            concurrency: concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
            item_timeout,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of batches a work list of `len` items splits into
    pub fn batch_count(&self, len: usize) -> usize {
        len.div_ceil(self.concurrency)
    }

    /// Run `op` over every item with bounded concurrency. A timed-out item is
    /// reported as failed; the underlying future is dropped, not cancelled at
    /// the source.
    pub async fn process<T, R, F, Fut>(&self, items: Vec<T>, op: F) -> BatchReport<R>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, String>>,
    {
        let total = items.len();
        let batches = self.batch_count(total);
        debug!(
            total,
            batches,
            concurrency = self.concurrency,
            "processing work list"
        );

        let mut successes = Vec::with_capacity(total);
        let mut errors = Vec::new();

        let mut items = items.into_iter().enumerate();
        loop {
            let batch: Vec<(usize, T)> = items.by_ref().take(self.concurrency).collect();
            if batch.is_empty() {
                break;
            }

            let futures = batch.into_iter().map(|(index, item)| {
                let fut = op(item);
                async move {
                    match tokio::time::timeout(self.item_timeout, fut).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(message)) => Err(ItemError::Failed { index, message }),
                        Err(_) => Err(ItemError::Timeout {
                            index,
                            timeout: self.item_timeout,
                        }),
                    }
                }
            });

            for outcome in join_all(futures).await {
                match outcome {
                    Ok(value) => successes.push(value),
                    Err(e) => {
                        warn!(error = %e, "batch item failed");
                        errors.push(e);
                    }
                }
            }
        }

        BatchReport {
            successes,
            errors,
            batches,
        }
    }
}
