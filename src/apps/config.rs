//! # App configuration.
//!
//! [`AppConfig`] is the immutable description of one managed app: name,
//! scheduler priority, stack budget, loop interval, the user parameter handed
//! to every callback, and the [`ExitAction`] the lifecycle manager applies when
//! the app terminates.
//!
//! The supervisor snapshots the config at `create`; the caller's value can be
//! dropped or reused immediately afterwards.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use appvisor::{AppConfig, ExitAction, Priority};
//!
//! let cfg = AppConfig::new("sensor")
//!     .with_priority(Priority::HIGH.raised(2))
//!     .with_stack_size(8 * 1024)
//!     .with_loop_interval(Duration::from_millis(250))
//!     .with_param(Arc::new(42u32))
//!     .with_exit_action(ExitAction::RestartUnlessStopped);
//!
//! assert_eq!(cfg.priority.level(), 17);
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::Config;
use crate::error::AppError;
use crate::policies::ExitAction;

/// Opaque user parameter shared with every callback of an app.
pub type Param = Arc<dyn Any + Send + Sync>;

/// Scheduler priority level.
///
/// Levels are grouped in fives, from idle (`0..=4`) to realtime (`20..=24`).
/// The valid range is `0..Config::priority_levels`; it is checked at `create`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    /// Lowest level (the scheduler's idle priority).
    pub const IDLE: Priority = Priority(0);
    /// Background work.
    pub const LOW: Priority = Priority(5);
    /// Ordinary services.
    pub const MODERATE: Priority = Priority(10);
    /// Latency-sensitive services.
    pub const HIGH: Priority = Priority(15);
    /// Time-critical work.
    pub const REALTIME: Priority = Priority(20);

    /// Levels per group.
    pub const GROUP_WIDTH: u8 = 5;

    /// Priority from a raw level.
    pub const fn new(level: u8) -> Self {
        Priority(level)
    }

    /// Raw level.
    pub const fn level(self) -> u8 {
        self.0
    }

    /// Moves `steps` levels up inside the group (clamped to the group's top).
    pub const fn raised(self, steps: u8) -> Self {
        let base = self.0 - self.0 % Self::GROUP_WIDTH;
        let sub = self.0 % Self::GROUP_WIDTH;
        let target = sub.saturating_add(steps);
        let sub = if target >= Self::GROUP_WIDTH {
            Self::GROUP_WIDTH - 1
        } else {
            target
        };
        Priority(base.saturating_add(sub))
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::MODERATE
    }
}

/// Immutable configuration of one managed app.
#[derive(Clone)]
pub struct AppConfig {
    /// App name (used in events and logs).
    pub name: String,
    /// Scheduler priority.
    pub priority: Priority,
    /// Stack/resource budget in bytes.
    pub stack_size: usize,
    /// Idle delay between loop iterations.
    pub loop_interval: Duration,
    /// User parameter passed to every callback.
    pub param: Option<Param>,
    /// Policy applied by the lifecycle manager when the app terminates.
    pub exit_action: ExitAction,
}

impl AppConfig {
    /// Config with defaults: moderate priority, 4 KiB stack, 1 s interval,
    /// no parameter, [`ExitAction::Free`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: Priority::default(),
            stack_size: 4096,
            loop_interval: Duration::from_millis(1000),
            param: None,
            exit_action: ExitAction::default(),
        }
    }

    /// Returns a new config with updated priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Returns a new config with updated stack budget.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Returns a new config with updated loop interval.
    pub fn with_loop_interval(mut self, interval: Duration) -> Self {
        self.loop_interval = interval;
        self
    }

    /// Returns a new config with a user parameter.
    pub fn with_param(mut self, param: Param) -> Self {
        self.param = Some(param);
        self
    }

    /// Returns a new config with updated exit action.
    pub fn with_exit_action(mut self, action: ExitAction) -> Self {
        self.exit_action = action;
        self
    }

    /// Checks the config against the runtime limits.
    pub(crate) fn validate(&self, rt: &Config) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::bad_args("app name is empty"));
        }
        if self.priority.level() >= rt.priority_levels {
            return Err(AppError::bad_args(format!(
                "priority {} outside 0..{}",
                self.priority.level(),
                rt.priority_levels
            )));
        }
        if self.stack_size < rt.min_stack_size {
            return Err(AppError::bad_args(format!(
                "stack size {} below minimum {}",
                self.stack_size, rt.min_stack_size
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("stack_size", &self.stack_size)
            .field("loop_interval", &self.loop_interval)
            .field("param", &self.param.is_some())
            .field("exit_action", &self.exit_action)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raised_stays_inside_group() {
        assert_eq!(Priority::IDLE.raised(4).level(), 4);
        assert_eq!(Priority::LOW.raised(9).level(), 9);
        assert_eq!(Priority::REALTIME.raised(u8::MAX).level(), 24);
        assert_eq!(Priority::new(12).raised(1).level(), 13);
        // top partial group saturates at u8::MAX
        assert_eq!(Priority::new(255).raised(4).level(), u8::MAX);
        assert_eq!(Priority::new(250).raised(9).level(), 254);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let rt = Config::default();
        assert!(AppConfig::new("ok").validate(&rt).is_ok());

        let err = AppConfig::new("  ").validate(&rt).unwrap_err();
        assert_eq!(err.as_label(), "app_bad_arguments");

        let err = AppConfig::new("p")
            .with_priority(Priority::new(25))
            .validate(&rt)
            .unwrap_err();
        assert!(err.to_string().contains("priority 25"));

        let err = AppConfig::new("s")
            .with_stack_size(512)
            .validate(&rt)
            .unwrap_err();
        assert!(err.to_string().contains("stack size 512"));
    }

    #[test]
    fn test_clone_is_a_deep_copy_of_the_name() {
        let mut name = String::from("blinky");
        let cfg = AppConfig::new(name.clone());
        name.clear();
        assert_eq!(cfg.clone().name, "blinky");
    }
}
