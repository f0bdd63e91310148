//! # App callbacks.
//!
//! An app is described by up to five optional async callbacks, grouped in a
//! [`CallbackGroup`]:
//!
//! | slot         | runs                             | may stop the app |
//! |--------------|----------------------------------|------------------|
//! | `on_setup`   | once, before the loop            | yes ([`Flow::Exit`]) |
//! | `on_loop`    | every loop iteration             | yes ([`Flow::Exit`]) |
//! | `on_paused`  | once per pause                   | no               |
//! | `on_resumed` | once per resume                  | no               |
//! | `on_stopped` | once, in the stop sequence       | no               |
//!
//! Each callback receives an [`AppContext`] with the app name, the user
//! parameter from [`AppConfig`](crate::AppConfig) and a cancellation token that
//! is cancelled when the owner calls `stop`.
//!
//! Each closure call creates a fresh future; shared state goes through the
//! parameter or an explicit `Arc` captured by the closure.
//!
//! ## Example
//! ```rust
//! use appvisor::{AppContext, CallbackGroup, Flow};
//!
//! let cbs = CallbackGroup::new()
//!     .on_setup(|_ctx: AppContext| async { Flow::Pass })
//!     .on_loop(|ctx: AppContext| async move {
//!         match ctx.param::<u32>() {
//!             Some(&limit) if limit > 0 => Flow::Pass,
//!             _ => Flow::Exit(3),
//!         }
//!     })
//!     .on_stopped(|ctx: AppContext| async move {
//!         let _ = ctx.name();
//!     });
//! assert!(cbs.has_loop());
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::apps::config::Param;

/// Exit code recorded when a callback panics.
///
/// Lies outside the range of codes apps usually return, so exit policies and
/// owners can tell a crash from a deliberate [`Flow::Exit`].
pub const PANIC_EXIT_CODE: i32 = i32::MIN;

/// Return value of `on_setup`/`on_loop`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep running.
    Pass,
    /// Stop the app, recording this exit code. `0` is a valid code.
    Exit(i32),
}

impl Flow {
    /// Exit code carried by this value, if any.
    pub fn exit_code(self) -> Option<i32> {
        match self {
            Flow::Pass => None,
            Flow::Exit(code) => Some(code),
        }
    }
}

/// Per-run view handed to every callback.
#[derive(Clone)]
pub struct AppContext {
    name: Arc<str>,
    param: Option<Param>,
    token: CancellationToken,
}

impl AppContext {
    pub(crate) fn new(name: Arc<str>, param: Option<Param>, token: CancellationToken) -> Self {
        Self { name, param, token }
    }

    /// App name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The user parameter, if one was configured and it has type `T`.
    pub fn param<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.param.as_deref()?.downcast_ref::<T>()
    }

    /// The user parameter as a shared handle.
    pub fn param_arc(&self) -> Option<Param> {
        self.param.clone()
    }

    /// Token cancelled when the owner requests a stop.
    ///
    /// Long-running callbacks can `select!` on it to finish their iteration early.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once the owner has requested a stop for this run.
    pub fn stop_requested(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("name", &self.name)
            .field("param", &self.param.is_some())
            .field("stop_requested", &self.stop_requested())
            .finish()
    }
}

/// Boxed future returned by `on_setup`/`on_loop`.
pub type BoxFlowFuture = Pin<Box<dyn Future<Output = Flow> + Send + 'static>>;
/// Boxed future returned by the notification callbacks.
pub type BoxHookFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type FlowFn = Arc<dyn Fn(AppContext) -> BoxFlowFuture + Send + Sync>;
type HookFn = Arc<dyn Fn(AppContext) -> BoxHookFuture + Send + Sync>;

/// Set of optional lifecycle callbacks.
///
/// Cloning is cheap (each slot is an `Arc`).
#[derive(Clone, Default)]
pub struct CallbackGroup {
    on_setup: Option<FlowFn>,
    on_loop: Option<FlowFn>,
    on_paused: Option<HookFn>,
    on_resumed: Option<HookFn>,
    on_stopped: Option<HookFn>,
}

fn flow_fn<F, Fut>(f: F) -> FlowFn
where
    F: Fn(AppContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Flow> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

fn hook_fn<F, Fut>(f: F) -> HookFn
where
    F: Fn(AppContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

impl CallbackGroup {
    /// Empty group: the app loops doing nothing until stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `on_setup`.
    pub fn on_setup<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(AppContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Flow> + Send + 'static,
    {
        self.on_setup = Some(flow_fn(f));
        self
    }

    /// Sets `on_loop`.
    pub fn on_loop<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(AppContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Flow> + Send + 'static,
    {
        self.on_loop = Some(flow_fn(f));
        self
    }

    /// Sets `on_paused`.
    pub fn on_paused<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(AppContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_paused = Some(hook_fn(f));
        self
    }

    /// Sets `on_resumed`.
    pub fn on_resumed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(AppContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_resumed = Some(hook_fn(f));
        self
    }

    /// Sets `on_stopped`.
    pub fn on_stopped<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(AppContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_stopped = Some(hook_fn(f));
        self
    }

    /// True if `on_loop` is set.
    pub fn has_loop(&self) -> bool {
        self.on_loop.is_some()
    }

    pub(crate) async fn setup(&self, ctx: AppContext) -> Flow {
        match &self.on_setup {
            Some(f) => f(ctx).await,
            None => Flow::Pass,
        }
    }

    pub(crate) async fn run_loop(&self, ctx: AppContext) -> Flow {
        match &self.on_loop {
            Some(f) => f(ctx).await,
            None => Flow::Pass,
        }
    }

    pub(crate) async fn paused(&self, ctx: AppContext) {
        if let Some(f) = &self.on_paused {
            f(ctx).await;
        }
    }

    pub(crate) async fn resumed(&self, ctx: AppContext) {
        if let Some(f) = &self.on_resumed {
            f(ctx).await;
        }
    }

    pub(crate) async fn stopped(&self, ctx: AppContext) {
        if let Some(f) = &self.on_stopped {
            f(ctx).await;
        }
    }
}

impl fmt::Debug for CallbackGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackGroup")
            .field("on_setup", &self.on_setup.is_some())
            .field("on_loop", &self.on_loop.is_some())
            .field("on_paused", &self.on_paused.is_some())
            .field("on_resumed", &self.on_resumed.is_some())
            .field("on_stopped", &self.on_stopped.is_some())
            .finish()
    }
}
