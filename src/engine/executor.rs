use crate::engine::scenario::{IterationResult, Scenario};
use crate::error::{IterationError, panic_message};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::time::Instant;

/// Runs one iteration of the workload and times it. A panicking workload is
/// caught here and turned into a failed iteration.
pub async fn execute_iteration<S: Scenario>(
    scenario: &S,
    ctx: &S::Context,
    worker_id: u32,
    iteration: u64,
) -> IterationResult<S::Output> {
    let started_at = Instant::now();

    // The call sits inside the async block so a panic before the first
    // poll is caught too.
    let outcome = match AssertUnwindSafe(async { scenario.iteration(ctx).await })
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(payload) => Err(IterationError::Panicked(panic_message(payload.as_ref()))),
    };

    IterationResult {
        worker_id,
        iteration,
        started_at,
        elapsed: started_at.elapsed(),
        outcome,
    }
}
