//! Error types for the coro-rt runtime

use thiserror::Error;

/// Result type alias using coro-rt's [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// The runtime's error taxonomy (see spec §7).
#[derive(Debug, Error)]
pub enum Error {
    // ============ Step errors ============
    /// User code inside a step's `execute` raised a failure.
    #[error("step failed: {0}")]
    StepFailed(#[source] anyhow::Error),

    // ============ Channel errors ============
    /// Send/receive on a channel whose producers have all closed it.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    // ============ Cancellation ============
    /// Continuation or scope was cancelled before the step completed.
    #[error("cancelled")]
    Cancelled,

    // ============ Composition errors ============
    /// Invalid composition: null step, appending past a terminal step, or
    /// attempting to reset a chain's end. Reported eagerly at build time.
    #[error("invalid step composition: {0}")]
    BuilderError(String),

    // ============ System errors ============
    /// Executor-level failure (rejected execution, shutdown).
    #[error("internal executor error: {0}")]
    Internal(String),
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Self::StepFailed(e) => Self::StepFailed(anyhow::anyhow!(e.to_string())),
            Self::ChannelClosed(s) => Self::ChannelClosed(s.clone()),
            Self::Cancelled => Self::Cancelled,
            Self::BuilderError(s) => Self::BuilderError(s.clone()),
            Self::Internal(s) => Self::Internal(s.clone()),
        }
    }
}

impl Error {
    /// Wrap a user `execute` failure as [`Error::StepFailed`], preserving the cause chain.
    pub fn step_failed(cause: impl Into<anyhow::Error>) -> Self {
        Self::StepFailed(cause.into())
    }

    /// Build a [`Error::ChannelClosed`] naming the channel.
    pub fn channel_closed(label: impl Into<String>) -> Self {
        Self::ChannelClosed(label.into())
    }

    /// Build a [`Error::BuilderError`] with a human-readable reason.
    pub fn builder(reason: impl Into<String>) -> Self {
        Self::BuilderError(reason.into())
    }

    /// Build an [`Error::Internal`] with a human-readable reason.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// True if this is (or wraps) a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Surface a bare channel error as a step failure when it escapes a coroutine's
    /// chain (spec §7: a channel step's `ChannelClosed` propagates as `StepFailed`,
    /// preserving the cause chain). Other variants pass through unchanged.
    pub fn into_propagated(self) -> Self {
        match self {
            Self::ChannelClosed(label) => Self::step_failed(Self::ChannelClosed(label)),
            other => other,
        }
    }
}
