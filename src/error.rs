use crate::types::ErrorKind;
use thiserror::Error;

/// Bootstrap failed before any load was generated. The only fatal error.
#[derive(Debug, Error)]
#[error("setup failed: {message}")]
pub struct SetupError {
    pub message: String,
}

impl SetupError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Why a single iteration counts as failed. Recorded, never propagated.
#[derive(Debug, Clone, Error)]
pub enum IterationError {
    #[error("{} error: {message}", .kind.as_str())]
    Transport { kind: ErrorKind, message: String },

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("workload panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

impl IterationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IterationError::Transport { kind, .. } => *kind,
            IterationError::Status(_) => ErrorKind::Status,
            IterationError::Panicked(_) => ErrorKind::Panic,
            IterationError::Other(_) => ErrorKind::Other,
        }
    }
}

/// A check predicate could not produce a boolean. Counted as a failed check.
#[derive(Debug, Clone, Error)]
pub enum CheckError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("check panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
#[error("teardown failed: {message}")]
pub struct TeardownError {
    pub message: String,
}

impl TeardownError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one stage is required")]
    NoStages,

    #[error("tick must be greater than zero")]
    ZeroTick,

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("invalid run configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create latency histogram: {0}")]
    Metrics(String),
}

/// Renders a panic payload caught with `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
