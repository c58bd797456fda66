use crate::engine::scenario::Scenario;
use crate::error::{SetupError, TeardownError, panic_message};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Owns the one-time bootstrap and cleanup around the load phase.
pub struct Lifecycle<S: Scenario> {
    scenario: Arc<S>,
}

impl<S: Scenario> Lifecycle<S> {
    pub fn new(scenario: Arc<S>) -> Self {
        Self { scenario }
    }

    /// Runs setup exactly once. The returned context is read-only from here on.
    pub async fn setup(&self) -> Result<Arc<S::Context>, SetupError> {
        tracing::info!("Running setup for scenario '{}'", self.scenario.name());

        let scenario = self.scenario.as_ref();
        let ctx = AssertUnwindSafe(async { scenario.setup().await })
            .catch_unwind()
            .await
            .map_err(|payload| {
                SetupError::new(format!("setup panicked: {}", panic_message(payload.as_ref())))
            })??;

        tracing::info!("Setup complete");
        Ok(Arc::new(ctx))
    }

    /// Runs teardown exactly once. Failures are logged and handed back for the
    /// report; they never change the verdict.
    pub async fn teardown(&self, ctx: &S::Context) -> Option<TeardownError> {
        tracing::info!("Running teardown for scenario '{}'", self.scenario.name());

        let scenario = self.scenario.as_ref();
        let result = AssertUnwindSafe(async { scenario.teardown(ctx).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(TeardownError::new(format!(
                    "teardown panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        match result {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("{}", e);
                Some(e)
            }
        }
    }
}
