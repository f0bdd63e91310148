//! # Supervisor: app creation, the lifecycle manager loop and shutdown.
//!
//! The [`Supervisor`] is the explicit runtime context every app belongs to. It
//! owns the event bus, the [`SubscriberSet`], the termination channel and the
//! app registry. Several supervisors can coexist (each test builds its own).
//!
//! ## Key responsibilities
//! - validate and create app handles (optional live-handle budget)
//! - subscribe to the [`Bus`] and **fan-out** events via [`SubscriberSet`]
//! - run the lifecycle manager: receive terminated handles and apply their
//!   [`ExitAction`](crate::ExitAction)
//! - escalate unrecoverable failures to a device restart
//! - stop every live app within [`Config::grace`] on shutdown
//!
//! ## Lifecycle manager
//! ```text
//! worker ── post(handle) ──► termination channel ──► run() / recv_exit()
//!                                                        │
//!                                            join worker task
//!                                                        │
//!                         ExitAction::resolve(exit_code) ┤
//!          ┌─────────────────────────┬───────────────────┴──────────────┐
//!          ▼                         ▼                                  ▼
//!        Free                     Restart                         RestartDevice
//!   dispose + AppFreed   reset code, clear STOPPED, start     dispose, restart_device()
//!                              │ Err                                    │
//!                              └──► dispose, restart_device() ◄─────────┘
//! ```
//!
//! ## Shutdown path
//! ```text
//! signal / shutdown() ─► ShutdownRequested ─► stop_all() (bounded by Config::grace)
//!                                               ├─ all stopped → AllStoppedWithin
//!                                               └─ overrun     → GraceExceeded { stuck }
//! ```
//! Handles reaching the manager while it drains are freed, never restarted.
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use appvisor::{AppConfig, AppContext, CallbackGroup, Config, ExitAction, Flow, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sup = Supervisor::builder(Config::default()).build();
//!
//!     let app = sup
//!         .create(
//!             AppConfig::new("ticker")
//!                 .with_loop_interval(Duration::from_millis(250))
//!                 .with_exit_action(ExitAction::RestartUnlessStopped),
//!             CallbackGroup::new().on_loop(|_ctx: AppContext| async { Flow::Pass }),
//!         )
//!         .await?;
//!     app.start().await?;
//!
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore, broadcast, mpsc};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::apps::{AppConfig, AppHandle, AppRuntime, AppState, CallbackGroup, flags};
use crate::core::builder::SupervisorBuilder;
use crate::core::{
    config::Config, exit_queue::ExitQueue, registry::AppRegistry, restart::DeviceRestart,
    shutdown,
};
use crate::error::{AppError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::Disposition;
use crate::subscribers::SubscriberSet;

/// Runtime context for a group of managed apps.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    exits: ExitQueue,
    exit_rx: Mutex<mpsc::Receiver<AppHandle>>,
    registry: AppRegistry,
    budget: Option<Arc<Semaphore>>,
    restarter: Arc<dyn DeviceRestart>,
    token: CancellationToken,
    draining: AtomicBool,
    next_id: AtomicU64,
}

impl Supervisor {
    /// Returns a builder for a supervisor with the given configuration.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        restarter: Arc<dyn DeviceRestart>,
    ) -> Self {
        let (exits, exit_rx) =
            ExitQueue::channel(cfg.exit_queue_capacity_clamped(), cfg.exit_overflow, bus.clone());
        let budget = cfg.app_limit().map(Semaphore::new).map(Arc::new);

        Self {
            cfg,
            bus,
            subs,
            exits,
            exit_rx: Mutex::new(exit_rx),
            registry: AppRegistry::new(),
            budget,
            restarter,
            token: CancellationToken::new(),
            draining: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Subscribes to the runtime event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subs.len()
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    pub(crate) fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    // ---------------------------
    // Apps
    // ---------------------------

    /// Creates a managed app in the `Created` state.
    ///
    /// The config is snapshotted; the callbacks can be replaced later with
    /// [`AppHandle::set_callbacks`] while the app is not looping.
    ///
    /// ### Errors
    /// - `BadArguments`: empty name, priority outside `0..Config::priority_levels`,
    ///   stack below `Config::min_stack_size`
    /// - `AllocationFailure`: `Config::max_apps` live handles already exist
    pub async fn create(
        &self,
        cfg: AppConfig,
        callbacks: CallbackGroup,
    ) -> Result<AppHandle, AppError> {
        cfg.validate(&self.cfg)?;

        let permit = match &self.budget {
            Some(sem) => Some(Arc::clone(sem).try_acquire_owned().map_err(|_| {
                AppError::AllocationFailure {
                    reason: format!("app budget of {} exhausted", self.cfg.max_apps),
                }
            })?),
            None => None,
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let app = AppHandle::new(id, cfg, callbacks, self.app_runtime(), permit);
        self.registry.insert(&app).await;
        app.publish(EventKind::AppCreated);
        Ok(app)
    }

    fn app_runtime(&self) -> AppRuntime {
        AppRuntime {
            bus: self.bus.clone(),
            exits: self.exits.clone(),
            start_timeout: self.cfg.start_timeout,
            settle_delay: self.cfg.settle_delay,
            ack_tolerance: self.cfg.ack_tolerance,
        }
    }

    /// Names of live (not yet freed) apps, in creation order.
    pub async fn list_apps(&self) -> Vec<String> {
        self.registry
            .live()
            .await
            .iter()
            .map(|app| app.name().to_string())
            .collect()
    }

    /// First live app with the given name.
    pub async fn app(&self, name: &str) -> Option<AppHandle> {
        self.registry.find(name).await
    }

    // ---------------------------
    // Lifecycle manager
    // ---------------------------

    /// Receives the next terminated handle from the termination channel.
    ///
    /// Waits while [`run`](Self::run) is active, since both consume the same channel.
    pub async fn recv_exit(&self) -> Option<AppHandle> {
        self.exit_rx.lock().await.recv().await
    }

    /// Runs the lifecycle manager until a termination signal, [`shutdown`](Self::shutdown)
    /// or an escalation.
    ///
    /// On signal or shutdown every live app is stopped (see [`stop_all`](Self::stop_all)).
    /// A device restart whose [`DeviceRestart`] returns ends the loop with
    /// [`RuntimeError::DeviceRestart`].
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let mut rx = self.exit_rx.lock().await;
        let signal = shutdown::shutdown_requested(self.cfg.handle_signals);
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = &mut signal => break,
                msg = rx.recv() => match msg {
                    Some(app) => self.dispatch(app).await?,
                    None => return Ok(()),
                },
            }
        }

        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        let stop = self.stop_all();
        tokio::pin!(stop);
        let res = loop {
            tokio::select! {
                res = &mut stop => break res,
                Some(app) = rx.recv() => self.dispatch(app).await?,
            }
        };
        while let Ok(app) = rx.try_recv() {
            self.dispatch(app).await?;
        }
        res
    }

    /// Asks [`run`](Self::run) to stop every app and return.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Applies the handle's exit action.
    ///
    /// Waits for the app's worker task to exit first, so the handle is only
    /// freed or restarted once nothing else runs on it.
    pub async fn dispatch(&self, app: AppHandle) -> Result<(), RuntimeError> {
        app.join_worker().await;

        if app.state() == AppState::Disposed {
            return Ok(());
        }
        if self.draining.load(Ordering::Acquire) {
            self.free(&app).await;
            return Ok(());
        }

        match app.exit_action().resolve(app.exit_code()) {
            Disposition::Free => {
                self.free(&app).await;
                Ok(())
            }
            Disposition::Restart => {
                self.bus.publish(
                    Event::new(EventKind::AppRestarting)
                        .with_app(app.name())
                        .with_exit_code(app.exit_code()),
                );
                match app.restart().await {
                    Ok(()) => {
                        app.publish(EventKind::AppRestarted);
                        Ok(())
                    }
                    Err(e) => {
                        self.bus.publish(
                            Event::new(EventKind::AppRestartFailed)
                                .with_app(app.name())
                                .with_reason(e.as_message()),
                        );
                        self.free(&app).await;
                        let reason = format!("failed to restart {} app: {e}", app.name());
                        Err(self.restart_device(reason).await)
                    }
                }
            }
            Disposition::RestartDevice => {
                self.free(&app).await;
                let reason = format!("{} app requested a device restart", app.name());
                Err(self.restart_device(reason).await)
            }
        }
    }

    async fn free(&self, app: &AppHandle) {
        if self.registry.remove(app.id()).await {
            app.dispose();
            self.bus.publish(
                Event::new(EventKind::AppFreed)
                    .with_app(app.name())
                    .with_exit_code(app.exit_code()),
            );
        }
    }

    /// Requests a full device restart.
    ///
    /// Logs the reason, waits `Config::restart_grace`, then calls the configured
    /// [`DeviceRestart`]. The default restarter exits the process; when a
    /// restarter returns, the error describing the restart is handed back.
    pub async fn restart_device(&self, reason: impl Into<String>) -> RuntimeError {
        let reason = reason.into();
        let grace = self.cfg.restart_grace;

        eprintln!("[appvisor] device restart in {grace:?}: {reason}");
        self.bus.publish(
            Event::new(EventKind::DeviceRestartRequested)
                .with_reason(reason.as_str())
                .with_delay(grace),
        );

        time::sleep(grace).await;
        self.restarter.restart(&reason);
        RuntimeError::DeviceRestart { reason }
    }

    // ---------------------------
    // Shutdown
    // ---------------------------

    /// Stops every live app concurrently, bounded by [`Config::grace`], and frees
    /// the stopped handles.
    ///
    /// Handles terminating meanwhile are freed instead of restarted.
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] and returns [`RuntimeError::GraceExceeded`]
    /// listing apps that timed out or did not stop within the grace period.
    pub async fn stop_all(&self) -> Result<(), RuntimeError> {
        self.draining.store(true, Ordering::Release);

        let apps: Vec<AppHandle> = self
            .registry
            .live()
            .await
            .into_iter()
            .filter(|app| app.state().is_active())
            .collect();

        let grace = self.cfg.grace;
        let stops = join_all(apps.iter().map(|app| async move { (app, app.stop().await) }));

        let stuck: Vec<String> = match time::timeout(grace, stops).await {
            Ok(results) => results
                .into_iter()
                .filter(|(_, res)| res.is_err())
                .map(|(app, _)| app.name().to_string())
                .collect(),
            Err(_) => apps
                .iter()
                .filter(|app| app.state().is_active())
                .map(|app| app.name().to_string())
                .collect(),
        };

        for app in self.registry.live().await {
            let finished = app.flags().contains(flags::STOPPED) || !app.is_alive();
            if app.state() == AppState::Stopped && finished {
                app.join_worker().await;
                self.free(&app).await;
            }
        }
        self.draining.store(false, Ordering::Release);

        if stuck.is_empty() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            Ok(())
        } else {
            self.bus.publish(
                Event::new(EventKind::GraceExceeded)
                    .with_timeout(grace)
                    .with_reason(stuck.join(",")),
            );
            Err(RuntimeError::GraceExceeded { grace, stuck })
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("cfg", &self.cfg)
            .field("subscribers", &self.subs.len())
            .field("shutdown", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use crate::apps::{AppContext, Flow, PANIC_EXIT_CODE};
    use crate::core::ExitOverflow;
    use crate::policies::ExitAction;

    #[derive(Default)]
    struct RecordingRestart {
        reasons: StdMutex<Vec<String>>,
    }

    impl DeviceRestart for RecordingRestart {
        fn restart(&self, reason: &str) {
            self.reasons.lock().unwrap().push(reason.to_string());
        }
    }

    fn quiet() -> Config {
        Config {
            handle_signals: false,
            ..Config::default()
        }
    }

    fn build(cfg: Config) -> (Arc<Supervisor>, Arc<RecordingRestart>) {
        let restarter = Arc::new(RecordingRestart::default());
        let sup = Supervisor::builder(cfg)
            .with_restarter(restarter.clone())
            .build();
        (sup, restarter)
    }

    fn fast(name: &str, action: ExitAction) -> AppConfig {
        AppConfig::new(name)
            .with_loop_interval(Duration::from_millis(200))
            .with_exit_action(action)
    }

    async fn wait_for(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
        let found = time::timeout(Duration::from_secs(30), async {
            loop {
                match rx.recv().await {
                    Ok(ev) if ev.kind == kind => return ev,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
                }
            }
        })
        .await;
        found.unwrap_or_else(|_| panic!("no {kind:?} event"))
    }

    fn counting_setup(cbs: CallbackGroup, hits: &Arc<AtomicU32>) -> CallbackGroup {
        let hits = Arc::clone(hits);
        cbs.on_setup(move |_ctx: AppContext| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Flow::Pass
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifth_loop_exit_arrives_on_termination_channel() {
        let (sup, _) = build(quiet());
        let loops = Arc::new(AtomicU32::new(0));
        let l = Arc::clone(&loops);
        let cbs = CallbackGroup::new().on_loop(move |_ctx: AppContext| {
            let l = Arc::clone(&l);
            async move {
                if l.fetch_add(1, Ordering::SeqCst) + 1 == 5 {
                    Flow::Exit(0)
                } else {
                    Flow::Pass
                }
            }
        });
        let app = sup
            .create(AppConfig::new("five").with_loop_interval(Duration::from_millis(1000)), cbs)
            .await
            .unwrap();
        app.start().await.unwrap();

        let posted = time::timeout(Duration::from_millis(5500), sup.recv_exit())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(posted.id(), app.id());
        assert_eq!(posted.exit_code(), Some(0));
        assert_eq!(loops.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_exit_code_and_runs_again() {
        let (sup, restarter) = build(quiet());
        let mut events = sup.subscribe();
        let setups = Arc::new(AtomicU32::new(0));
        let cbs = counting_setup(
            CallbackGroup::new().on_loop(|_ctx: AppContext| async { Flow::Exit(7) }),
            &setups,
        );
        let app = sup.create(fast("seven", ExitAction::Restart), cbs).await.unwrap();
        app.start().await.unwrap();

        let runner = Arc::clone(&sup);
        let manager = tokio::spawn(async move { runner.run().await });

        let ev = wait_for(&mut events, EventKind::AppRestarting).await;
        assert_eq!(ev.exit_code, Some(7));
        wait_for(&mut events, EventKind::AppRestarted).await;
        assert_eq!(app.exit_code(), None);
        assert!(app.flags().contains(flags::RUNNING));
        assert!(!app.flags().contains(flags::STOPPED));

        wait_for(&mut events, EventKind::AppRestarted).await;
        assert!(setups.load(Ordering::SeqCst) >= 2);
        assert!(restarter.reasons.lock().unwrap().is_empty());

        sup.shutdown();
        manager.await.unwrap().unwrap();
        assert_eq!(app.state(), AppState::Disposed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_unless_stopped_frees_on_stop() {
        let (sup, _) = build(quiet());
        let mut events = sup.subscribe();
        let setups = Arc::new(AtomicU32::new(0));
        let cbs = counting_setup(CallbackGroup::new(), &setups);
        let app = sup
            .create(fast("polite", ExitAction::RestartUnlessStopped), cbs)
            .await
            .unwrap();
        app.start().await.unwrap();

        let runner = Arc::clone(&sup);
        let manager = tokio::spawn(async move { runner.run().await });

        app.stop().await.unwrap();
        wait_for(&mut events, EventKind::AppFreed).await;
        assert_eq!(app.state(), AppState::Disposed);
        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert!(sup.list_apps().await.is_empty());

        sup.shutdown();
        manager.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_unless_stopped_respawns_on_error_code() {
        let (sup, _) = build(quiet());
        let mut events = sup.subscribe();
        let setups = Arc::new(AtomicU32::new(0));
        let first = Arc::new(AtomicBool::new(true));
        let cbs = counting_setup(
            CallbackGroup::new().on_loop(move |_ctx: AppContext| {
                let first = Arc::clone(&first);
                async move {
                    if first.swap(false, Ordering::SeqCst) {
                        Flow::Exit(3)
                    } else {
                        Flow::Pass
                    }
                }
            }),
            &setups,
        );
        let app = sup
            .create(fast("flaky", ExitAction::RestartUnlessStopped), cbs)
            .await
            .unwrap();
        app.start().await.unwrap();

        let runner = Arc::clone(&sup);
        let manager = tokio::spawn(async move { runner.run().await });

        wait_for(&mut events, EventKind::AppRestarted).await;
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(setups.load(Ordering::SeqCst), 2);
        assert_eq!(app.exit_code(), None);
        assert_eq!(app.state(), AppState::Running);

        sup.shutdown();
        manager.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_loop_is_reported_and_restarted() {
        let (sup, restarter) = build(quiet());
        let mut events = sup.subscribe();
        let first = Arc::new(AtomicBool::new(true));
        let cbs = CallbackGroup::new().on_loop(move |_ctx: AppContext| {
            let first = Arc::clone(&first);
            async move {
                if first.swap(false, Ordering::SeqCst) {
                    panic!("boom");
                }
                Flow::Pass
            }
        });
        let app = sup.create(fast("shaky", ExitAction::Restart), cbs).await.unwrap();
        app.start().await.unwrap();

        let ev = wait_for(&mut events, EventKind::AppPanicked).await;
        assert_eq!(ev.reason.as_deref(), Some("boom"));
        assert_eq!(ev.exit_code, Some(PANIC_EXIT_CODE));

        let posted = time::timeout(Duration::from_secs(5), sup.recv_exit())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(posted.id(), app.id());
        assert_eq!(posted.exit_code(), Some(PANIC_EXIT_CODE));

        sup.dispatch(posted).await.unwrap();
        assert_eq!(app.state(), AppState::Running);
        assert!(app.flags().contains(flags::RUNNING));

        app.stop().await.unwrap();
        assert_eq!(app.state(), AppState::Stopped);
        assert_eq!(app.exit_code(), None);
        assert!(restarter.reasons.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_restart_escalates_to_device_restart() {
        let (sup, restarter) = build(quiet());
        let mut events = sup.subscribe();
        let cbs = CallbackGroup::new().on_setup(|_ctx: AppContext| async { Flow::Exit(4) });
        let app = sup.create(fast("doomed", ExitAction::Restart), cbs).await.unwrap();
        app.start().await.unwrap();

        let posted = time::timeout(Duration::from_secs(5), sup.recv_exit())
            .await
            .unwrap()
            .unwrap();
        posted.join_worker().await;
        // leaves Stopped behind the manager's back, so the restart is rejected
        posted.set_state(AppState::Created);

        let err = sup.dispatch(posted).await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_device_restart");

        let ev = wait_for(&mut events, EventKind::AppRestartFailed).await;
        assert_eq!(ev.app.as_deref(), Some("doomed"));
        assert!(ev.reason.is_some());
        wait_for(&mut events, EventKind::AppFreed).await;
        let ev = wait_for(&mut events, EventKind::DeviceRestartRequested).await;
        assert!(ev.reason.as_deref().is_some_and(|r| r.contains("doomed")));

        assert_eq!(app.state(), AppState::Disposed);
        assert!(sup.list_apps().await.is_empty());
        let reasons = restarter.reasons.lock().unwrap();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("failed to restart doomed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_device_action_escalates() {
        let (sup, restarter) = build(quiet());
        let mut events = sup.subscribe();
        let cbs = CallbackGroup::new().on_setup(|_ctx: AppContext| async { Flow::Exit(1) });
        let app = sup
            .create(fast("fatal", ExitAction::RestartDevice), cbs)
            .await
            .unwrap();
        app.start().await.unwrap();

        let err = sup.run().await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_device_restart");
        assert_eq!(app.state(), AppState::Disposed);

        let ev = wait_for(&mut events, EventKind::DeviceRestartRequested).await;
        assert_eq!(ev.delay_ms, Some(3000));
        let reasons = restarter.reasons.lock().unwrap();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("fatal"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_validates_and_enforces_budget() {
        let (sup, _) = build(Config {
            max_apps: 1,
            ..quiet()
        });

        let err = sup.create(AppConfig::new(""), CallbackGroup::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "app_bad_arguments");

        let a = sup.create(AppConfig::new("a"), CallbackGroup::new()).await.unwrap();
        let err = sup.create(AppConfig::new("b"), CallbackGroup::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "app_allocation_failure");

        drop(a);
        let c = sup.create(AppConfig::new("c"), CallbackGroup::new()).await.unwrap();
        assert_eq!(sup.list_apps().await, vec!["c".to_string()]);
        assert_eq!(sup.app("c").await.map(|h| h.id()), Some(c.id()));
        assert!(sup.app("a").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_termination_channel_drops_notification() {
        let (sup, _) = build(Config {
            exit_queue_capacity: 1,
            exit_overflow: ExitOverflow::Drop,
            ..quiet()
        });
        let mut events = sup.subscribe();

        let mut apps = Vec::new();
        for name in ["one", "two"] {
            let cbs = CallbackGroup::new().on_setup(|_ctx: AppContext| async { Flow::Exit(2) });
            let app = sup.create(AppConfig::new(name), cbs).await.unwrap();
            app.start().await.unwrap();
            apps.push(app);
        }

        let ev = wait_for(&mut events, EventKind::ExitDropped).await;
        assert_eq!(ev.reason.as_deref(), Some("full"));
        assert_eq!(ev.exit_code, Some(2));

        let kept = sup.recv_exit().await.unwrap();
        assert_ne!(Some(kept.name()), ev.app.as_deref());
        for app in &apps {
            app.join_worker().await;
            assert_eq!(app.state(), AppState::Stopped);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_termination_channel_blocks_instead_of_dropping() {
        let (sup, _) = build(Config {
            exit_queue_capacity: 1,
            exit_overflow: ExitOverflow::Wait,
            ..quiet()
        });
        let mut events = sup.subscribe();

        let mut apps = Vec::new();
        for name in ["one", "two"] {
            let cbs = CallbackGroup::new().on_setup(|_ctx: AppContext| async { Flow::Exit(2) });
            let app = sup.create(AppConfig::new(name), cbs).await.unwrap();
            app.start().await.unwrap();
            apps.push(app);
        }
        time::sleep(Duration::from_secs(1)).await;

        // one notification fills the channel, the other worker parks in post
        let parked: Vec<&AppHandle> = apps
            .iter()
            .filter(|a| a.state() == AppState::Stopping)
            .collect();
        assert_eq!(parked.len(), 1);
        assert!(!parked[0].flags().contains(flags::STOPPED));
        assert!(parked[0].is_alive());

        let mut names = Vec::new();
        for _ in 0..2 {
            let posted = time::timeout(Duration::from_secs(5), sup.recv_exit())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(posted.exit_code(), Some(2));
            names.push(posted.name().to_string());
        }
        names.sort();
        assert_eq!(names, vec!["one".to_string(), "two".to_string()]);

        for app in &apps {
            app.join_worker().await;
            assert_eq!(app.state(), AppState::Stopped);
            assert!(app.flags().contains(flags::STOPPED));
        }
        while let Ok(ev) = events.try_recv() {
            assert_ne!(ev.kind, EventKind::ExitDropped);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_stops_and_frees_every_app() {
        let (sup, _) = build(quiet());
        let mut apps = Vec::new();
        for name in ["a", "b", "c"] {
            let app = sup
                .create(fast(name, ExitAction::Restart), CallbackGroup::new())
                .await
                .unwrap();
            app.start().await.unwrap();
            apps.push(app);
        }
        let mut events = sup.subscribe();

        sup.stop_all().await.unwrap();
        wait_for(&mut events, EventKind::AllStoppedWithin).await;
        assert!(apps.iter().all(|a| a.state() == AppState::Disposed));
        assert!(sup.list_apps().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_reports_hung_apps() {
        let (sup, _) = build(quiet());
        let hung = CallbackGroup::new().on_loop(|_ctx: AppContext| std::future::pending::<Flow>());
        let stuck = sup.create(fast("hung", ExitAction::Free), hung).await.unwrap();
        let fine = sup
            .create(fast("fine", ExitAction::Free), CallbackGroup::new())
            .await
            .unwrap();
        stuck.start().await.unwrap();
        fine.start().await.unwrap();
        time::sleep(Duration::from_millis(400)).await;
        let mut events = sup.subscribe();

        match sup.stop_all().await {
            Err(RuntimeError::GraceExceeded { stuck: names, .. }) => {
                assert_eq!(names, vec!["hung".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        let ev = wait_for(&mut events, EventKind::GraceExceeded).await;
        assert_eq!(ev.timeout_ms, Some(10_000));
        assert_eq!(ev.reason.as_deref(), Some("hung"));
        assert!(!stuck.is_alive());
        assert_eq!(fine.state(), AppState::Disposed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_run_and_stops_apps() {
        let (sup, _) = build(quiet());
        let app = sup
            .create(fast("svc", ExitAction::Restart), CallbackGroup::new())
            .await
            .unwrap();
        app.start().await.unwrap();

        let runner = Arc::clone(&sup);
        let manager = tokio::spawn(async move { runner.run().await });
        time::sleep(Duration::from_millis(500)).await;

        sup.shutdown();
        manager.await.unwrap().unwrap();
        assert_eq!(app.state(), AppState::Disposed);
        assert_eq!(app.exit_code(), None);
    }
}
