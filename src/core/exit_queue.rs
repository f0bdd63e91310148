//! # Termination channel.
//!
//! A bounded FIFO of [`AppHandle`]s. A stopping app worker posts its own handle
//! here as the last step of its stop sequence; the lifecycle manager
//! ([`Supervisor::run`](crate::Supervisor::run)) receives it and applies the
//! app's [`ExitAction`](crate::ExitAction).
//!
//! ```text
//! worker A ──┐
//! worker B ──┼──► [ cap = Config::exit_queue_capacity ] ──► Supervisor::run
//! worker C ──┘            (mpsc, FIFO)
//! ```
//!
//! ## Overflow
//! - [`ExitOverflow::Drop`]: `try_send`; a full channel loses the notification,
//!   publishes `ExitDropped` and prints a warning. The dropped handle is never
//!   freed or restarted by the manager.
//! - [`ExitOverflow::Wait`]: `send().await`; the worker parks until there is room.

use tokio::sync::mpsc;

use crate::apps::AppHandle;
use crate::core::config::ExitOverflow;
use crate::events::{Bus, Event, EventKind};

/// Sending side of the termination channel, shared by every app handle.
#[derive(Clone, Debug)]
pub(crate) struct ExitQueue {
    tx: mpsc::Sender<AppHandle>,
    overflow: ExitOverflow,
    bus: Bus,
}

impl ExitQueue {
    /// Creates the channel; the receiver belongs to the lifecycle manager.
    pub(crate) fn channel(
        capacity: usize,
        overflow: ExitOverflow,
        bus: Bus,
    ) -> (Self, mpsc::Receiver<AppHandle>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, overflow, bus }, rx)
    }

    /// Posts a terminated handle. Returns `false` if the notification was dropped.
    pub(crate) async fn post(&self, app: AppHandle) -> bool {
        let rejected = match self.overflow {
            ExitOverflow::Drop => match self.tx.try_send(app) {
                Ok(()) => return true,
                Err(mpsc::error::TrySendError::Full(app)) => (app, "full"),
                Err(mpsc::error::TrySendError::Closed(app)) => (app, "closed"),
            },
            ExitOverflow::Wait => match self.tx.send(app).await {
                Ok(()) => return true,
                Err(mpsc::error::SendError(app)) => (app, "closed"),
            },
        };

        let (app, why) = rejected;
        eprintln!(
            "[appvisor] termination channel {why}: dropped exit of '{}'",
            app.name()
        );
        self.bus.publish(
            Event::new(EventKind::ExitDropped)
                .with_app(app.name())
                .with_exit_code(app.exit_code())
                .with_reason(why),
        );
        false
    }
}
