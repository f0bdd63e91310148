//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests, demos and bring-up on a serial console.
//!
//! ## Example output
//! ```text
//! [starting] app="hello_world"
//! [running] app="hello_world"
//! [exited] app="hello_world" code=0
//! [stopped] app="hello_world" code=Some(0)
//! [freed] app="hello_world" code=Some(0)
//! [device-restart] reason="sensor app requested a device restart" in=3000ms
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let app = e.app.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::AppCreated => println!("[created] app={app:?}"),
            EventKind::AppStarting => println!("[starting] app={app:?}"),
            EventKind::AppRunning => println!("[running] app={app:?}"),
            EventKind::AppPaused => println!("[paused] app={app:?}"),
            EventKind::AppResumed => println!("[resumed] app={app:?}"),
            EventKind::AppStopRequested => {
                println!("[stop-requested] app={app:?} timeout={:?}ms", e.timeout_ms)
            }
            EventKind::AppExited => println!("[exited] app={app:?} code={:?}", e.exit_code),
            EventKind::AppStopped => println!("[stopped] app={app:?} code={:?}", e.exit_code),
            EventKind::ExitDropped => {
                println!("[exit-dropped] app={app:?} code={:?}", e.exit_code)
            }
            EventKind::AppTimeout => println!(
                "[timeout] app={app:?} op={:?} timeout={:?}ms",
                e.reason, e.timeout_ms
            ),
            EventKind::AppKilled => println!("[killed] app={app:?} op={:?}", e.reason),
            EventKind::AppPanicked => println!(
                "[panicked] app={app:?} code={:?} info={}",
                e.exit_code,
                e.reason.as_deref().unwrap_or("unknown"),
            ),
            EventKind::AppFreed => println!("[freed] app={app:?} code={:?}", e.exit_code),
            EventKind::AppRestarting => {
                println!("[restarting] app={app:?} code={:?}", e.exit_code)
            }
            EventKind::AppRestarted => println!("[restarted] app={app:?}"),
            EventKind::AppRestartFailed => {
                println!("[restart-failed] app={app:?} err={:?}", e.reason)
            }
            EventKind::DeviceRestartRequested => println!(
                "[device-restart] reason={:?} in={:?}ms",
                e.reason, e.delay_ms
            ),
            EventKind::ShutdownRequested => println!("[shutdown-requested]"),
            EventKind::AllStoppedWithin => println!("[all-stopped-within-grace]"),
            EventKind::GraceExceeded => println!(
                "[grace-exceeded] grace={:?}ms stuck={:?}",
                e.timeout_ms, e.reason
            ),
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] subscriber={app} reason={:?}", e.reason)
            }
            EventKind::SubscriberPanicked => println!(
                "[subscriber-panicked] subscriber={app} info={}",
                e.reason.as_deref().unwrap_or("unknown"),
            ),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
