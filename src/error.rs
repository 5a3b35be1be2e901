//! Error types used by the modvisor runtime, its handlers and its tasks.
//!
//! This module defines three enums:
//!
//! - [`TaskError`] — errors returned by scheduled run actions.
//! - [`HandlerError`] — errors returned by (or attributed to) bus handlers.
//! - [`RuntimeError`] — errors raised by the [`Runtime`](crate::Runtime) wrapper itself.
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! None of them is ever propagated across component boundaries: the bus and the
//! scheduler record them in counters and health snapshots instead.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by scheduled task execution.
///
/// A `Fail` is retryable (subject to `TaskSpec::restart` / `max_restarts`);
/// a `Fatal` ends supervision for that name immediately; `Canceled` is how a
/// cooperative task reports that it observed its cancellation token.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Non-recoverable error (never restarted).
    #[error("fatal error (no restart): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Run action failed but may succeed if restarted.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Run action exited because its cancellation token fired.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`TaskError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        TaskError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use modvisor::TaskError;
    ///
    /// let err = TaskError::fail("sensor offline");
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fatal { error } => format!("fatal: {error}"),
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Indicates whether the restart path may re-admit the task.
    ///
    /// # Example
    /// ```
    /// use modvisor::TaskError;
    ///
    /// assert!(TaskError::fail("boom").is_retryable());
    /// assert!(!TaskError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Fail { .. })
    }
}

/// # Errors attributed to a single handler invocation.
///
/// Handlers only ever construct [`HandlerError::Fail`]; the bus produces
/// `Panicked` and `Timeout` when it classifies an invocation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Handler returned an error.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Handler panicked while processing.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Handler outlived its deadline; the bus stopped waiting on it.
    #[error("handler timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Panicked { .. } => "handler_panicked",
            HandlerError::Timeout { .. } => "handler_timeout",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Fail { error } => format!("error: {error}"),
            HandlerError::Panicked { info } => format!("panic: {info}"),
            HandlerError::Timeout { timeout } => format!("timeout: {timeout:?}"),
        }
    }

    /// Wraps a panic payload caught from a handler future.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        HandlerError::Panicked {
            info: panic_message(payload),
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// # Errors produced by the runtime wrapper.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Registering OS signal listeners failed.
    #[error("failed to listen for shutdown signals: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Signal { .. } => "runtime_signal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_error_labels_are_stable() {
        assert_eq!(TaskError::fail("x").as_label(), "task_failed");
        assert_eq!(TaskError::fatal("x").as_label(), "task_fatal");
        assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    }

    #[test]
    fn only_fail_is_retryable() {
        assert!(TaskError::fail("x").is_retryable());
        assert!(!TaskError::fatal("x").is_retryable());
        assert!(!TaskError::Canceled.is_retryable());
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let boxed: Box<dyn Any + Send> = Box::new("static boom");
        assert_eq!(
            HandlerError::from_panic(boxed.as_ref()),
            HandlerError::Panicked {
                info: "static boom".into()
            }
        );

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(HandlerError::from_panic(boxed.as_ref()).as_message(), "panic: owned boom");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(
            HandlerError::from_panic(boxed.as_ref()).as_label(),
            "handler_panicked"
        );
    }
}
