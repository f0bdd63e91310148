//! # App handle and control surface.
//!
//! [`AppHandle`] is the owner's view of one managed app. It bundles the frozen
//! [`AppConfig`], the [`CallbackGroup`], a private [`EventFlags`] word and the
//! run state, and implements the blocking control protocol:
//!
//! ```text
//!            start()                    (worker sets RUNNING)
//! Created ──────────► Starting ─────────────────────────────► Running
//!    ▲                   │ timeout: abort worker                │  ▲
//!    └───────────────────┘                       pause() ──────►│  │◄────── resume()
//!                                                (PAUSED)   Paused  (RESUMED)
//!                                                               │
//!                          stop() / Flow::Exit                  ▼
//!                                                           Stopping
//!                                                               │ on_stopped, post, STOPPED
//!                                                               ▼
//!              Restarting ◄──── manager (Restart) ──────── Stopped ────► Disposed
//!                  │                                                (manager: Free)
//!                  └──────────► Running
//! ```
//!
//! ## Ownership
//! The handle is a cheap `Arc` clone. The owner, the app's worker task and the
//! lifecycle manager each hold one. Flags written by only one side (`run`,
//! `suspend` by the owner; `exit_code` by the worker) are single atomics; every
//! handoff between the two sides is published through [`EventFlags`], and the
//! owner reads `exit_code` only after observing `STOPPED`.
//!
//! ## Timeouts
//! - `start`: `Config::start_timeout`; on expiry the worker is aborted.
//! - `stop`: `2 × loop_interval + Config::ack_tolerance`; on expiry the worker is
//!   aborted, `on_stopped` does not run and the handle is not posted.
//! - `pause`/`resume`: same deadline as `stop`, but expiry only reports `Timeout`.
//!
//! Forced cancellation lands at the worker's next `.await`. A callback that
//! blocks its thread without yielding cannot be cancelled at all.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::runtime;
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::apps::callbacks::{AppContext, CallbackGroup};
use crate::apps::config::AppConfig;
use crate::apps::flags::{self, EventFlags};
use crate::apps::worker;
use crate::core::{ExitQueue, ack_deadline};
use crate::error::AppError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::ExitAction;

/// Stored in place of "no exit code".
const NO_CODE: i64 = i64::MIN;

/// Lifecycle state of an app handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AppState {
    /// Handle allocated, never started.
    Created = 0,
    /// Worker spawned, awaiting its running confirmation.
    Starting = 1,
    /// Worker is looping.
    Running = 2,
    /// Worker is parked until resumed.
    Paused = 3,
    /// Run flag cleared; worker is finishing its stop sequence.
    Stopping = 4,
    /// Worker finished (posted to the termination channel, or forcibly cancelled).
    Stopped = 5,
    /// Manager released the handle; every control call is rejected.
    Disposed = 6,
    /// Manager is starting the handle again.
    Restarting = 7,
}

impl AppState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => AppState::Created,
            1 => AppState::Starting,
            2 => AppState::Running,
            3 => AppState::Paused,
            4 => AppState::Stopping,
            5 => AppState::Stopped,
            6 => AppState::Disposed,
            _ => AppState::Restarting,
        }
    }

    /// True while a worker task exists or is being spawned.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            AppState::Starting
                | AppState::Running
                | AppState::Paused
                | AppState::Stopping
                | AppState::Restarting
        )
    }
}

/// Runtime pieces every handle shares with its supervisor.
#[derive(Clone, Debug)]
pub(crate) struct AppRuntime {
    pub(crate) bus: Bus,
    pub(crate) exits: ExitQueue,
    pub(crate) start_timeout: Duration,
    pub(crate) settle_delay: Duration,
    pub(crate) ack_tolerance: Duration,
}

pub(crate) struct AppInner {
    id: u64,
    name: Arc<str>,
    cfg: AppConfig,
    rt: AppRuntime,
    callbacks: RwLock<CallbackGroup>,
    flags: EventFlags,
    run: AtomicBool,
    suspend: AtomicBool,
    exit_code: AtomicI64,
    state: AtomicU8,
    token: Mutex<CancellationToken>,
    worker: Mutex<Option<JoinHandle<()>>>,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
}

/// Shared handle to one managed app.
#[derive(Clone)]
pub struct AppHandle {
    inner: Arc<AppInner>,
}

/// Non-owning reference used by the supervisor's registry.
#[derive(Clone)]
pub(crate) struct WeakAppHandle(Weak<AppInner>);

impl WeakAppHandle {
    pub(crate) fn upgrade(&self) -> Option<AppHandle> {
        self.0.upgrade().map(|inner| AppHandle { inner })
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AppHandle {
    pub(crate) fn new(
        id: u64,
        cfg: AppConfig,
        callbacks: CallbackGroup,
        rt: AppRuntime,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            inner: Arc::new(AppInner {
                id,
                name: Arc::from(cfg.name.as_str()),
                cfg,
                rt,
                callbacks: RwLock::new(callbacks),
                flags: EventFlags::new(),
                run: AtomicBool::new(false),
                suspend: AtomicBool::new(false),
                exit_code: AtomicI64::new(NO_CODE),
                state: AtomicU8::new(AppState::Created as u8),
                token: Mutex::new(CancellationToken::new()),
                worker: Mutex::new(None),
                permit: Mutex::new(permit),
            }),
        }
    }

    // ---------------------------
    // Accessors
    // ---------------------------

    /// Supervisor-unique id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// App name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Frozen configuration snapshot.
    pub fn config(&self) -> &AppConfig {
        &self.inner.cfg
    }

    /// Exit policy.
    pub fn exit_action(&self) -> ExitAction {
        self.inner.cfg.exit_action
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AppState {
        AppState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// The handle's synchronization object.
    pub fn flags(&self) -> &EventFlags {
        &self.inner.flags
    }

    /// Last exit code returned by a callback, or `None` if the app stopped
    /// cleanly (via `stop`) or has not stopped yet.
    pub fn exit_code(&self) -> Option<i32> {
        match self.inner.exit_code.load(Ordering::Acquire) {
            NO_CODE => None,
            code => Some(code as i32),
        }
    }

    /// True while the worker task exists and has not finished.
    pub fn is_alive(&self) -> bool {
        lock(&self.inner.worker)
            .as_ref()
            .is_some_and(|join| !join.is_finished())
    }

    /// Deadline for stop/pause/resume acknowledgements.
    pub fn ack_timeout(&self) -> Duration {
        ack_deadline(self.inner.cfg.loop_interval, self.inner.rt.ack_tolerance)
    }

    // ---------------------------
    // Control surface
    // ---------------------------

    /// Replaces the callback group.
    ///
    /// Only allowed while the app is not looping: `Created`, `Paused` or `Stopped`.
    pub fn set_callbacks(&self, callbacks: CallbackGroup) -> Result<(), AppError> {
        let state = self.state();
        if !matches!(
            state,
            AppState::Created | AppState::Paused | AppState::Stopped
        ) {
            return Err(AppError::InvalidState {
                op: "set_callbacks",
                state,
            });
        }
        *self
            .inner
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner) = callbacks;
        Ok(())
    }

    /// Spawns the app worker and waits until it confirms it is running.
    ///
    /// A `stop` that lands before the worker begins wins: the worker skips
    /// straight to its stop sequence and `start` returns `Ok`.
    ///
    /// ### Errors
    /// - `InvalidState` unless the handle is `Created`
    /// - `SpawnFailure` outside a tokio runtime
    /// - `Timeout` if the worker does not confirm within `Config::start_timeout`;
    ///   the worker is aborted and the handle returns to `Created`
    pub async fn start(&self) -> Result<(), AppError> {
        self.transition("start", &[AppState::Created], AppState::Starting)?;
        self.launch("start", AppState::Created).await
    }

    /// Manager path: reset a stopped handle and start it again.
    pub(crate) async fn restart(&self) -> Result<(), AppError> {
        self.transition("restart", &[AppState::Stopped], AppState::Restarting)?;
        self.store_exit_code(None);
        self.inner.flags.clear(flags::STOPPED);
        self.launch("restart", AppState::Stopped).await
    }

    async fn launch(&self, op: &'static str, fallback: AppState) -> Result<(), AppError> {
        let rt = match runtime::Handle::try_current() {
            Ok(rt) => rt,
            Err(e) => {
                self.set_state(fallback);
                return Err(AppError::SpawnFailure {
                    reason: e.to_string(),
                });
            }
        };

        let inner = &self.inner;
        inner.flags.clear(flags::ALL);
        inner.suspend.store(false, Ordering::Release);
        inner.run.store(true, Ordering::Release);
        *lock(&inner.token) = CancellationToken::new();
        self.publish(EventKind::AppStarting);

        let join = rt.spawn(worker::run(self.clone()));
        *lock(&inner.worker) = Some(join);

        // STOPPED alone means a concurrent stop() claimed the run before it began
        let timeout = inner.rt.start_timeout;
        if inner
            .flags
            .wait_any(flags::RUNNING | flags::STOPPED, false, timeout)
            .await
            .is_some()
        {
            return Ok(());
        }

        self.kill(op).await;
        self.set_state(fallback);
        self.publish_timeout(op, timeout);
        Err(AppError::Timeout { op, timeout })
    }

    /// Asks the app to finish its current iteration and stop.
    ///
    /// Returns `Ok` once `on_stopped` has run and the handle has been handed
    /// to the termination channel. Already-stopped apps return `Ok` at once.
    ///
    /// ### Errors
    /// - `InvalidState` for `Created`/`Disposed` handles
    /// - `Timeout` if the worker does not confirm within [`ack_timeout`](Self::ack_timeout);
    ///   the worker is aborted, `on_stopped` does not run and the handle is not posted
    pub async fn stop(&self) -> Result<(), AppError> {
        if self.inner.flags.contains(flags::STOPPED) {
            return Ok(());
        }
        match self.transition(
            "stop",
            &[
                AppState::Starting,
                AppState::Running,
                AppState::Paused,
                AppState::Stopping,
                AppState::Restarting,
            ],
            AppState::Stopping,
        ) {
            Ok(_) => {}
            Err(_) if self.state() == AppState::Stopped => return Ok(()),
            Err(e) => return Err(e),
        }

        let timeout = self.ack_timeout();
        self.inner.run.store(false, Ordering::Release);
        lock(&self.inner.token).cancel();
        self.inner.bus().publish(
            Event::new(EventKind::AppStopRequested)
                .with_app(self.name())
                .with_timeout(timeout),
        );

        if self
            .inner
            .flags
            .wait_any(flags::STOPPED, false, timeout)
            .await
            .is_some()
        {
            return Ok(());
        }

        self.kill("stop").await;
        if self.inner.flags.contains(flags::STOPPED) {
            // finished on its own between the deadline and the abort
            return Ok(());
        }
        self.set_state(AppState::Stopped);
        self.publish_timeout("stop", timeout);
        Err(AppError::Timeout { op: "stop", timeout })
    }

    /// Asks the app to park after its current iteration.
    ///
    /// Idempotent: an already-paused app returns `Ok` immediately.
    /// A `Timeout` leaves the worker running (and the pause request pending).
    pub async fn pause(&self) -> Result<(), AppError> {
        if self.inner.flags.contains(flags::PAUSED) {
            return Ok(());
        }
        let state = self.state();
        if !matches!(state, AppState::Running | AppState::Paused) {
            return Err(AppError::InvalidState { op: "pause", state });
        }

        self.inner.suspend.store(true, Ordering::Release);

        let timeout = self.ack_timeout();
        if self
            .inner
            .flags
            .wait_any(flags::PAUSED, false, timeout)
            .await
            .is_some()
        {
            return Ok(());
        }
        self.publish_timeout("pause", timeout);
        Err(AppError::Timeout { op: "pause", timeout })
    }

    /// Asks a paused app to continue looping.
    ///
    /// Idempotent: an app that is not paused returns `Ok` immediately.
    /// A `Timeout` leaves the worker untouched.
    pub async fn resume(&self) -> Result<(), AppError> {
        if !self.inner.flags.contains(flags::PAUSED) {
            return Ok(());
        }

        self.inner.flags.set(flags::RESUME_CMD);

        let timeout = self.ack_timeout();
        if self
            .inner
            .flags
            .wait_any(flags::RESUMED, true, timeout)
            .await
            .is_some()
        {
            return Ok(());
        }
        self.publish_timeout("resume", timeout);
        Err(AppError::Timeout {
            op: "resume",
            timeout,
        })
    }

    // ---------------------------
    // Worker side
    // ---------------------------

    pub(crate) fn runtime(&self) -> &AppRuntime {
        &self.inner.rt
    }

    pub(crate) fn callbacks(&self) -> CallbackGroup {
        self.inner
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn context(&self) -> AppContext {
        AppContext::new(
            Arc::clone(&self.inner.name),
            self.inner.cfg.param.clone(),
            lock(&self.inner.token).clone(),
        )
    }

    pub(crate) fn should_run(&self) -> bool {
        self.inner.run.load(Ordering::Acquire)
    }

    pub(crate) fn clear_run(&self) {
        self.inner.run.store(false, Ordering::Release);
    }

    pub(crate) fn suspend_requested(&self) -> bool {
        self.inner.suspend.load(Ordering::Acquire)
    }

    pub(crate) fn clear_suspend(&self) {
        self.inner.suspend.store(false, Ordering::Release);
    }

    pub(crate) fn store_exit_code(&self, code: Option<i32>) {
        let raw = code.map_or(NO_CODE, i64::from);
        self.inner.exit_code.store(raw, Ordering::Release);
    }

    pub(crate) fn set_state(&self, state: AppState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }

    /// Moves to `to` only from one of `from`; returns the previous state.
    pub(crate) fn transition(
        &self,
        op: &'static str,
        from: &[AppState],
        to: AppState,
    ) -> Result<AppState, AppError> {
        self.inner
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                from.contains(&AppState::from_u8(raw)).then_some(to as u8)
            })
            .map(AppState::from_u8)
            .map_err(|raw| AppError::InvalidState {
                op,
                state: AppState::from_u8(raw),
            })
    }

    pub(crate) fn publish(&self, kind: EventKind) {
        self.inner
            .bus()
            .publish(Event::new(kind).with_app(self.name()));
    }

    fn publish_timeout(&self, op: &'static str, timeout: Duration) {
        self.inner.bus().publish(
            Event::new(EventKind::AppTimeout)
                .with_app(self.name())
                .with_reason(op)
                .with_timeout(timeout),
        );
    }

    // ---------------------------
    // Manager side
    // ---------------------------

    pub(crate) fn downgrade(&self) -> WeakAppHandle {
        WeakAppHandle(Arc::downgrade(&self.inner))
    }

    /// Waits for the worker task of the last run to finish.
    pub(crate) async fn join_worker(&self) {
        let join = lock(&self.inner.worker).take();
        if let Some(join) = join {
            let _ = join.await;
        }
    }

    /// Releases the handle: no further control calls, budget slot returned.
    pub(crate) fn dispose(&self) {
        self.set_state(AppState::Disposed);
        lock(&self.inner.permit).take();
        *self
            .inner
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner) = CallbackGroup::new();
    }

    /// Last-resort cancellation of the worker task.
    ///
    /// Nothing acquired inside the callbacks is guaranteed to be released:
    /// `on_stopped` does not run and the handle is not posted.
    async fn kill(&self, op: &'static str) {
        let join = lock(&self.inner.worker).take();
        if let Some(mut join) = join {
            join.abort();
            if time::timeout(self.inner.rt.ack_tolerance, &mut join)
                .await
                .is_err()
            {
                // still blocked inside a callback; keep it observable via is_alive()
                *lock(&self.inner.worker) = Some(join);
            }
        }
        let inner = &self.inner;
        inner.run.store(false, Ordering::Release);
        inner.suspend.store(false, Ordering::Release);
        inner
            .flags
            .clear(flags::RUNNING | flags::PAUSED | flags::RESUMED | flags::RESUME_CMD);
        inner.bus().publish(
            Event::new(EventKind::AppKilled)
                .with_app(self.name())
                .with_reason(op),
        );
    }
}

impl AppInner {
    fn bus(&self) -> &Bus {
        &self.rt.bus
    }
}

impl std::fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .field("flags", &format_args!("{:#07b}", self.inner.flags.get()))
            .field("exit_code", &self.exit_code())
            .finish()
    }
}
