//! # Runtime events emitted by app handles, workers and the lifecycle manager.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: app state machine flow (starting, running, paused, stopped)
//! - **Control events**: owner requests and their failures (start timeout, forced kill)
//! - **Manager events**: exit-policy outcomes (freed, restarted, device restart)
//! - **Runtime events**: subscriber health and shutdown
//!
//! The [`Event`] struct carries metadata such as timestamps, app name,
//! exit codes and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use appvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::AppExited)
//!     .with_app("sensor")
//!     .with_exit_code(12);
//!
//! assert_eq!(ev.kind, EventKind::AppExited);
//! assert_eq!(ev.app.as_deref(), Some("sensor"));
//! assert_eq!(ev.exit_code, Some(12));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `app`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `app`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed or `Supervisor::shutdown`).
    ShutdownRequested,

    /// All apps stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some apps did not stop in time.
    ///
    /// Sets:
    /// - `timeout_ms`: configured grace (ms)
    /// - `reason`: comma-separated names of the apps that did not stop
    GraceExceeded,

    // === App lifecycle events ===
    /// Handle created and registered.
    ///
    /// Sets:
    /// - `app`: app name
    AppCreated,

    /// Start requested; the worker is being spawned.
    ///
    /// Sets:
    /// - `app`: app name
    AppStarting,

    /// Worker confirmed it is running (`RUNNING` bit set).
    ///
    /// Sets:
    /// - `app`: app name
    AppRunning,

    /// Worker entered the paused state (`PAUSED` bit set, `on_paused` about to run).
    ///
    /// Sets:
    /// - `app`: app name
    AppPaused,

    /// Worker left the paused state (`RESUMED` bit set, `on_resumed` about to run).
    ///
    /// Sets:
    /// - `app`: app name
    AppResumed,

    /// Owner cleared the run flag.
    ///
    /// Sets:
    /// - `app`: app name
    /// - `timeout_ms`: stop deadline (ms)
    AppStopRequested,

    /// A callback returned an exit code; the app is stopping on its own.
    ///
    /// Sets:
    /// - `app`: app name
    /// - `exit_code`: the returned code
    AppExited,

    /// Worker finished its stop sequence and posted itself to the termination channel.
    ///
    /// Sets:
    /// - `app`: app name
    /// - `exit_code`: recorded code, if any
    AppStopped,

    /// The termination channel was full; the notification was dropped.
    ///
    /// Sets:
    /// - `app`: app name
    /// - `exit_code`: recorded code, if any
    ExitDropped,

    /// A control call's deadline elapsed without acknowledgement.
    ///
    /// Sets:
    /// - `app`: app name
    /// - `reason`: the control operation (`start`, `stop`, `pause`, `resume`)
    /// - `timeout_ms`: the deadline (ms)
    AppTimeout,

    /// The worker was forcibly cancelled (Start/Stop timeout fallback).
    ///
    /// `on_stopped` did not run and the handle was not posted.
    ///
    /// Sets:
    /// - `app`: app name
    /// - `reason`: the control operation that forced it
    AppKilled,

    /// A callback panicked. The worker still runs its stop sequence and posts
    /// the handle.
    ///
    /// Sets:
    /// - `app`: app name
    /// - `exit_code`: the run's code; `PANIC_EXIT_CODE` unless only `on_stopped` panicked
    /// - `reason`: panic message
    AppPanicked,

    // === Manager events ===
    /// Manager disposed of a terminated handle.
    ///
    /// Sets:
    /// - `app`: app name
    /// - `exit_code`: recorded code, if any
    AppFreed,

    /// Manager is restarting a terminated handle.
    ///
    /// Sets:
    /// - `app`: app name
    /// - `exit_code`: code that caused the restart, if any
    AppRestarting,

    /// Restarted app confirmed running.
    ///
    /// Sets:
    /// - `app`: app name
    AppRestarted,

    /// Restart failed; the manager escalates to a device restart.
    ///
    /// Sets:
    /// - `app`: app name
    /// - `reason`: start error
    AppRestartFailed,

    /// A full device restart was requested.
    ///
    /// Sets:
    /// - `reason`: human-readable reason
    /// - `delay_ms`: grace period before the restart (ms)
    DeviceRestartRequested,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the app, if applicable.
    pub app: Option<Arc<str>>,
    /// Exit code recorded by a callback.
    pub exit_code: Option<i32>,
    /// Deadline in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            app: None,
            exit_code: None,
            timeout_ms: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an app name.
    #[inline]
    pub fn with_app(mut self, app: impl Into<Arc<str>>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Attaches an exit code (no-op for `None`).
    #[inline]
    pub fn with_exit_code(mut self, code: impl Into<Option<i32>>) -> Self {
        self.exit_code = code.into();
        self
    }

    /// Attaches a deadline (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_app(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_app(subscriber)
            .with_reason(info)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::AppRunning);
        let b = Event::new(EventKind::AppStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_durations_saturate_to_u32_ms() {
        let ev = Event::new(EventKind::AppTimeout)
            .with_timeout(Duration::MAX)
            .with_delay(Duration::from_millis(3000));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
        assert_eq!(ev.delay_ms, Some(3000));
    }

    #[test]
    fn test_exit_code_none_keeps_field_empty() {
        let ev = Event::new(EventKind::AppFreed).with_exit_code(None::<i32>);
        assert_eq!(ev.exit_code, None);
        let ev = ev.with_exit_code(0);
        assert_eq!(ev.exit_code, Some(0));
    }
}
