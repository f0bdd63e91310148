//! Managed apps: configuration, callbacks, the control handle and its worker.
//!
//! - [`AppConfig`]/[`Priority`]: immutable app description;
//! - [`CallbackGroup`]/[`AppContext`]/[`Flow`]: user code plugged into the lifecycle;
//! - [`AppHandle`]/[`AppState`]: the start/stop/pause/resume control surface;
//! - [`flags`]: the per-handle bit-flag synchronization object.

mod callbacks;
mod config;
pub mod flags;
mod handle;
mod worker;

pub use callbacks::{
    AppContext, BoxFlowFuture, BoxHookFuture, CallbackGroup, Flow, PANIC_EXIT_CODE,
};
pub use config::{AppConfig, Param, Priority};
pub use flags::EventFlags;
pub use handle::{AppHandle, AppState};

pub(crate) use handle::{AppRuntime, WeakAppHandle};
