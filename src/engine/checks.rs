use crate::engine::scenario::IterationResult;
use crate::error::{CheckError, panic_message};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

type Predicate<O> = dyn Fn(&IterationResult<O>) -> Result<bool, CheckError> + Send + Sync;

/// A named, observational assertion over an iteration's result.
pub struct Check<O> {
    name: String,
    predicate: Arc<Predicate<O>>,
}

impl<O> Clone for Check<O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

impl<O> std::fmt::Debug for Check<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Check").field("name", &self.name).finish()
    }
}

impl<O> Check<O> {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&IterationResult<O>) -> Result<bool, CheckError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// A predicate that cannot error.
    pub fn infallible<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&IterationResult<O>) -> bool + Send + Sync + 'static,
    {
        Self::new(name, move |result| Ok(predicate(result)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the predicate. Panics are caught and reported as errors.
    pub fn evaluate(&self, result: &IterationResult<O>) -> Result<bool, CheckError> {
        match catch_unwind(AssertUnwindSafe(|| (self.predicate)(result))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(CheckError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

/// Result of one check for one iteration, indexed by registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub index: usize,
    pub passed: bool,
}

/// The registered checks of a run, shared by every worker.
pub struct CheckSet<O> {
    checks: Arc<[Check<O>]>,
}

impl<O> Clone for CheckSet<O> {
    fn clone(&self) -> Self {
        Self {
            checks: self.checks.clone(),
        }
    }
}

impl<O> CheckSet<O> {
    pub fn new(checks: Vec<Check<O>>) -> Self {
        Self {
            checks: checks.into(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.checks.iter().map(|c| c.name.clone()).collect()
    }

    /// Evaluates every check independently. An erroring check is a failed
    /// check; it never affects the others or the iteration's own status.
    pub fn evaluate(&self, result: &IterationResult<O>) -> Vec<CheckOutcome> {
        self.checks
            .iter()
            .enumerate()
            .map(|(index, check)| {
                let passed = match check.evaluate(result) {
                    Ok(passed) => passed,
                    Err(e) => {
                        tracing::debug!("Check '{}' errored: {}", check.name, e);
                        false
                    }
                };
                CheckOutcome { index, passed }
            })
            .collect()
    }
}
