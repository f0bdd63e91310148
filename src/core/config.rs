//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the supervisor runtime.
//!
//! Config is read in two places:
//! 1. **Supervisor creation**: `Supervisor::builder(config)` sizes the event bus,
//!    the termination channel and the app budget.
//! 2. **App handles**: every handle keeps a copy of the protocol timings
//!    (start timeout, settle delay, acknowledgement tolerance).
//!
//! ## Sentinel values
//! - `max_apps = 0` → unlimited (no app budget semaphore created)
//! - `grace = 0s` → `stop_all` does not wait, stuck apps are reported immediately

use std::time::Duration;

/// What a stopping app does when the termination channel is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExitOverflow {
    /// Drop the notification (the handle is never freed or restarted).
    ///
    /// An [`EventKind::ExitDropped`](crate::EventKind::ExitDropped) event is published.
    #[default]
    Drop,
    /// Wait until the lifecycle manager drains the channel.
    ///
    /// A slow manager then delays `stop` and may turn it into a timeout.
    Wait,
}

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `grace`: Maximum wait for [`Supervisor::stop_all`](crate::Supervisor::stop_all)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `exit_queue_capacity`: Termination channel capacity (min 1)
/// - `exit_overflow`: Full termination channel behavior
/// - `start_timeout`: How long `start` waits for the running confirmation
/// - `settle_delay`: Pause between `on_setup` and the first `on_loop`
/// - `ack_tolerance`: Added to `2 × loop interval` for stop/pause/resume deadlines
/// - `restart_grace`: Wait between a device restart request and the restart itself
/// - `priority_levels`: Number of scheduler priority levels (valid: `0..levels`)
/// - `min_stack_size`: Smallest accepted per-app stack budget in bytes
/// - `max_apps`: Live handle budget (`0` = unlimited)
/// - `handle_signals`: Whether `run` listens for OS termination signals
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for all apps to stop during shutdown.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Capacity of the termination channel.
    ///
    /// Defaults to 2. With [`ExitOverflow::Drop`] a burst of more than
    /// `exit_queue_capacity` terminations before the manager drains the channel
    /// loses the later notifications.
    pub exit_queue_capacity: usize,

    /// Behavior of a stopping app when the termination channel is full.
    pub exit_overflow: ExitOverflow,

    /// Deadline for an app to confirm it is running after spawn.
    pub start_timeout: Duration,

    /// Delay after `on_setup` before the loop starts.
    pub settle_delay: Duration,

    /// Fixed tolerance added to control-call deadlines.
    pub ack_tolerance: Duration,

    /// Grace period before a device restart.
    pub restart_grace: Duration,

    /// Number of scheduler priority levels.
    pub priority_levels: u8,

    /// Minimum stack/resource budget per app, in bytes.
    pub min_stack_size: usize,

    /// Maximum number of live app handles (`0` = unlimited).
    pub max_apps: usize,

    /// Listen for SIGINT/SIGTERM/SIGQUIT (Ctrl-C on non-unix) in `run`.
    pub handle_signals: bool,
}

impl Config {
    /// Returns the live-handle budget as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` handles between create and dispose
    #[inline]
    pub fn app_limit(&self) -> Option<usize> {
        if self.max_apps == 0 {
            None
        } else {
            Some(self.max_apps)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a termination channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn exit_queue_capacity_clamped(&self) -> usize {
        self.exit_queue_capacity.max(1)
    }

    /// Deadline for stop/pause/resume acknowledgements of an app looping every `interval`.
    #[inline]
    pub fn ack_timeout(&self, interval: Duration) -> Duration {
        ack_deadline(interval, self.ack_tolerance)
    }
}

/// `2 × interval + tolerance`, saturating.
pub(crate) fn ack_deadline(interval: Duration, tolerance: Duration) -> Duration {
    interval.saturating_mul(2).saturating_add(tolerance)
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    /// - `exit_queue_capacity = 2`, `exit_overflow = Drop`
    /// - `start_timeout = 1s`, `settle_delay = 300ms`, `ack_tolerance = 1s`
    /// - `restart_grace = 3s`
    /// - `priority_levels = 25`, `min_stack_size = 1024`
    /// - `max_apps = 0` (unlimited)
    /// - `handle_signals = true`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            exit_queue_capacity: 2,
            exit_overflow: ExitOverflow::Drop,
            start_timeout: Duration::from_millis(1000),
            settle_delay: Duration::from_millis(300),
            ack_tolerance: Duration::from_millis(1000),
            restart_grace: Duration::from_millis(3000),
            priority_levels: 25,
            min_stack_size: 1024,
            max_apps: 0,
            handle_signals: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_timeout_is_twice_interval_plus_tolerance() {
        let cfg = Config::default();
        assert_eq!(
            cfg.ack_timeout(Duration::from_millis(200)),
            Duration::from_millis(1400)
        );
        assert_eq!(cfg.ack_timeout(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn test_sentinels() {
        let mut cfg = Config::default();
        assert_eq!(cfg.app_limit(), None);
        cfg.max_apps = 3;
        assert_eq!(cfg.app_limit(), Some(3));

        cfg.exit_queue_capacity = 0;
        cfg.bus_capacity = 0;
        assert_eq!(cfg.exit_queue_capacity_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
