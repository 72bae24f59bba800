//! Per-run context shared by both jobs.

use crate::error::{PipelineError, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, Instrument};
use uuid::Uuid;

/// Identity and wall-clock bound of one scheduled run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub job: &'static str,
    pub timeout: Duration,
}

impl RunContext {
    pub fn new(job: &'static str, timeout: Duration) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job,
            timeout,
        }
    }

    /// Drive `fut` inside a run span; exceeding the timeout fails the run and
    /// drops whatever was in flight.
    pub async fn execute<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let span = tracing::info_span!("run", job = self.job, run_id = %self.run_id);
        let started = Instant::now();

        let outcome = tokio::time::timeout(self.timeout, fut.instrument(span.clone())).await;

        match outcome {
            Ok(result) => {
                info!(
                    parent: &span,
                    "Run finished in {:.1}s ({})",
                    started.elapsed().as_secs_f64(),
                    if result.is_ok() { "ok" } else { "failed" }
                );
                result
            }
            Err(_) => Err(PipelineError::Timeout(self.timeout)),
        }
    }
}
