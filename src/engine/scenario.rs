use crate::error::{IterationError, SetupError, TeardownError};
use crate::types::ErrorKind;
use futures_util::future::BoxFuture;
use std::time::Duration;
use tokio::time::Instant;

/// The typed payload an iteration hands back to the engine.
pub trait Outcome: Send + Sync + 'static {
    /// Whether the underlying operation succeeded (e.g. a 2xx response).
    fn is_success(&self) -> bool;

    fn status(&self) -> Option<u16> {
        None
    }
}

impl Outcome for () {
    fn is_success(&self) -> bool {
        true
    }
}

/// A workload the engine can drive: one-time setup producing a shared,
/// read-only context, a repeatable iteration, and optional teardown.
pub trait Scenario: Send + Sync + 'static {
    type Context: Send + Sync + 'static;
    type Output: Outcome;

    fn name(&self) -> &str {
        "default"
    }

    fn setup(&self) -> BoxFuture<'_, Result<Self::Context, SetupError>>;

    fn iteration<'a>(
        &'a self,
        ctx: &'a Self::Context,
    ) -> BoxFuture<'a, Result<Self::Output, IterationError>>;

    fn teardown<'a>(&'a self, _ctx: &'a Self::Context) -> BoxFuture<'a, Result<(), TeardownError>> {
        Box::pin(async { Ok(()) })
    }
}

/// One finished pass through the workload.
#[derive(Debug)]
pub struct IterationResult<O> {
    pub worker_id: u32,
    pub iteration: u64,
    pub started_at: Instant,
    pub elapsed: Duration,
    pub outcome: Result<O, IterationError>,
}

impl<O: Outcome> IterationResult<O> {
    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, Ok(output) if output.is_success())
    }

    pub fn output(&self) -> Option<&O> {
        self.outcome.as_ref().ok()
    }

    pub fn status(&self) -> Option<u16> {
        match &self.outcome {
            Ok(output) => output.status(),
            Err(IterationError::Status(code)) => Some(*code),
            Err(_) => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            Ok(output) if output.is_success() => None,
            Ok(_) => Some(ErrorKind::Status),
            Err(e) => Some(e.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reply(u16);

    impl Outcome for Reply {
        fn is_success(&self) -> bool {
            (200..300).contains(&self.0)
        }

        fn status(&self) -> Option<u16> {
            Some(self.0)
        }
    }

    fn result(outcome: Result<Reply, IterationError>) -> IterationResult<Reply> {
        IterationResult {
            worker_id: 0,
            iteration: 0,
            started_at: Instant::now(),
            elapsed: Duration::from_millis(3),
            outcome,
        }
    }

    #[test]
    fn test_non_2xx_counts_as_failure() {
        let r = result(Ok(Reply(500)));
        assert!(!r.is_success());
        assert_eq!(r.status(), Some(500));
        assert_eq!(r.error_kind(), Some(ErrorKind::Status));

        let r = result(Ok(Reply(201)));
        assert!(r.is_success());
        assert_eq!(r.error_kind(), None);
    }

    #[test]
    fn test_transport_error_kind() {
        let r = result(Err(IterationError::Transport {
            kind: ErrorKind::Refused,
            message: "connection refused".to_string(),
        }));
        assert!(!r.is_success());
        assert_eq!(r.status(), None);
        assert_eq!(r.error_kind(), Some(ErrorKind::Refused));
    }
}
