//! Error types used by the appvisor runtime and app handles.
//!
//! This module defines two main error enums:
//!
//! - [`AppError`]: errors returned by the app control surface
//!   (`create`/`start`/`stop`/`pause`/`resume`).
//! - [`RuntimeError`]: errors raised by the lifecycle manager itself.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::apps::AppState;

/// # Errors produced by the app control surface.
///
/// None of the control calls panic on these conditions; the caller decides
/// whether a failure is recoverable (retry later) or fatal (escalate to
/// [`Supervisor::restart_device`](crate::Supervisor::restart_device)).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Invalid input to a control call (empty name, priority out of range, ...).
    #[error("bad arguments: {reason}")]
    BadArguments {
        /// What was wrong with the input.
        reason: String,
    },

    /// Resource exhaustion while creating a handle.
    #[error("allocation failed: {reason}")]
    AllocationFailure {
        /// Which budget was exhausted.
        reason: String,
    },

    /// The runtime refused to spawn the app task.
    #[error("spawn failed: {reason}")]
    SpawnFailure {
        /// Underlying runtime error message.
        reason: String,
    },

    /// A blocking control call did not observe its acknowledgement in time.
    #[error("{op} timed out after {timeout:?}")]
    Timeout {
        /// Control operation that timed out (`start`, `stop`, `pause`, `resume`).
        op: &'static str,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The control call is not valid in the handle's current lifecycle state.
    #[error("{op} is not allowed while app is {state:?}")]
    InvalidState {
        /// Control operation that was rejected.
        op: &'static str,
        /// State observed when the call was made.
        state: AppState,
    },
}

impl AppError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use appvisor::AppError;
    /// use std::time::Duration;
    ///
    /// let err = AppError::Timeout { op: "stop", timeout: Duration::from_secs(3) };
    /// assert_eq!(err.as_label(), "app_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            AppError::BadArguments { .. } => "app_bad_arguments",
            AppError::AllocationFailure { .. } => "app_allocation_failure",
            AppError::SpawnFailure { .. } => "app_spawn_failure",
            AppError::Timeout { .. } => "app_timeout",
            AppError::InvalidState { .. } => "app_invalid_state",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            AppError::BadArguments { reason } => format!("bad arguments: {reason}"),
            AppError::AllocationFailure { reason } => format!("allocation: {reason}"),
            AppError::SpawnFailure { reason } => format!("spawn: {reason}"),
            AppError::Timeout { op, timeout } => format!("{op} timeout: {timeout:?}"),
            AppError::InvalidState { op, state } => format!("{op} rejected in state {state:?}"),
        }
    }

    /// Indicates whether the error came from an elapsed deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Timeout { .. })
    }

    pub(crate) fn bad_args(reason: impl Into<String>) -> Self {
        AppError::BadArguments {
            reason: reason.into(),
        }
    }
}

/// # Errors produced by the lifecycle manager.
///
/// These represent failures of the supervisor itself rather than of one app.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some apps had to be force-terminated.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of apps that did not stop in time.
        stuck: Vec<String>,
    },

    /// A device restart was requested and the restarter returned control.
    ///
    /// Production restarters never return; this surfaces only with test doubles
    /// or restarters that defer the actual reboot to the caller.
    #[error("device restart requested: {reason}")]
    DeviceRestart {
        /// Human-readable reason passed to the restarter.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use appvisor::RuntimeError;
    ///
    /// let err = RuntimeError::DeviceRestart { reason: "watchdog".into() };
    /// assert_eq!(err.as_label(), "runtime_device_restart");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::DeviceRestart { .. } => "runtime_device_restart",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck apps={stuck:?}")
            }
            RuntimeError::DeviceRestart { reason } => format!("device restart: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(AppError::bad_args("x").as_label(), "app_bad_arguments");
        assert_eq!(
            AppError::InvalidState {
                op: "start",
                state: AppState::Running
            }
            .as_label(),
            "app_invalid_state"
        );
        assert_eq!(
            RuntimeError::GraceExceeded {
                grace: Duration::from_secs(1),
                stuck: vec![]
            }
            .as_label(),
            "runtime_grace_exceeded"
        );
    }

    #[test]
    fn test_timeout_message_names_operation() {
        let err = AppError::Timeout {
            op: "pause",
            timeout: Duration::from_millis(1400),
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "pause timed out after 1.4s");
    }
}
