//! # appvisor
//!
//! **Appvisor** is a lifecycle supervisor for long-running async "apps".
//!
//! Every app gets the same state machine (setup → loop → optional
//! pause/resume → stop), a blocking control surface for its owner, and a
//! central lifecycle manager that reacts to termination by freeing the app,
//! restarting it, or escalating to a device restart.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  AppConfig   │   │  AppConfig   │   │  AppConfig   │
//!     │ + Callbacks  │   │ + Callbacks  │   │ + Callbacks  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (explicit runtime context)                            │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - AppRegistry (weak index of live handles)                       │
//! │  - termination channel (bounded, Config::exit_queue_capacity)     │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼ create()         ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  AppHandle   │   │  AppHandle   │   │  AppHandle   │  ◄── owner: start/stop/
//!     │  EventFlags  │   │  EventFlags  │   │  EventFlags  │      pause/resume
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ spawn            │                  │
//!     ┌──────▼───────┐   ┌──────▼───────┐   ┌──────▼───────┐
//!     │  app worker  │   │  app worker  │   │  app worker  │
//!     │ setup, loop, │   │     ...      │   │     ...      │
//!     │ pause, stop  │   │              │   │              │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ post(self) on stop                  │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │           termination channel ──► Supervisor::run()               │
//! │   ExitAction: Free | Restart | RestartUnlessStopped | RestartDevice│
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Control protocol
//! ```text
//! owner                                 worker
//! start()  ── spawn ────────────────►   set RUNNING
//!          ◄── wait RUNNING ─────────   on_setup, settle, loop { on_loop; sleep }
//! pause()  ── suspend=true ─────────►   set PAUSED, on_paused
//!          ◄── wait PAUSED ──────────   poll RESUME_CMD every interval
//! resume() ── set RESUME_CMD ───────►   clear PAUSED, set RESUMED, on_resumed
//!          ◄── wait+clear RESUMED ───
//! stop()   ── run=false, cancel ────►   on_stopped, post(self), set STOPPED
//!          ◄── wait STOPPED ─────────
//! ```
//! Start and stop deadlines end in forced cancellation of the worker;
//! pause and resume deadlines only report [`AppError::Timeout`].
//! A panicking callback ends the run with [`PANIC_EXIT_CODE`] and is reported as
//! [`EventKind::AppPanicked`]; the stop sequence and the exit policy still apply.
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **Apps**          | Describe an app and plug callbacks into its lifecycle.        | [`AppConfig`], [`CallbackGroup`], [`Flow`] |
//! | **Control**       | Start/stop/pause/resume with bounded waits.                   | [`AppHandle`], [`EventFlags`]              |
//! | **Policies**      | What the lifecycle manager does after an app terminates.      | [`ExitAction`]                             |
//! | **Supervision**   | Create apps, run the lifecycle manager, shut down.             | [`Supervisor`], [`DeviceRestart`]          |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).        | [`Subscribe`], [`Event`]                   |
//! | **Errors**        | Typed errors for control calls and the manager.               | [`AppError`], [`RuntimeError`]             |
//! | **Configuration** | Centralize runtime settings and protocol timings.             | [`Config`]                                 |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use appvisor::{AppConfig, AppContext, CallbackGroup, Config, Flow, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         handle_signals: false,
//!         ..Config::default()
//!     };
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn appvisor::Subscribe>> = vec![Arc::new(appvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn appvisor::Subscribe>> = Vec::new();
//!
//!     let sup = Supervisor::builder(cfg).with_subscribers(subs).build();
//!
//!     let app = sup
//!         .create(
//!             AppConfig::new("once").with_loop_interval(Duration::from_millis(10)),
//!             CallbackGroup::new().on_loop(|ctx: AppContext| async move {
//!                 println!("hello from {}", ctx.name());
//!                 Flow::Exit(0)
//!             }),
//!         )
//!         .await?;
//!     app.start().await?;
//!
//!     let done = sup.recv_exit().await.expect("termination channel open");
//!     assert_eq!(done.exit_code(), Some(0));
//!     sup.dispatch(done).await?;
//!     Ok(())
//! }
//! ```

mod apps;
mod core;
mod error;
mod events;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use apps::{
    AppConfig, AppContext, AppHandle, AppState, BoxFlowFuture, BoxHookFuture, CallbackGroup,
    EventFlags, Flow, PANIC_EXIT_CODE, Param, Priority, flags,
};
pub use core::{Config, DeviceRestart, ExitOverflow, ProcessRestart, Supervisor, SupervisorBuilder};
pub use error::{AppError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use policies::{Disposition, ExitAction};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
