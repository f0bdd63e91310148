//! # App worker task.
//!
//! The body spawned by [`AppHandle::start`]. One worker runs per start (or
//! restart) of a handle:
//!
//! 1. mark the handle running (`RUNNING`), publish `AppRunning`
//! 2. `on_setup`; [`Flow::Exit`] skips the loop
//! 3. settle delay
//! 4. loop while the run flag holds:
//!    - pause requested: park (`PAUSED`, `on_paused`), poll for `RESUME_CMD`
//!      once per interval, then unpark (`RESUMED`, `on_resumed`)
//!    - otherwise `on_loop`, then sleep one interval
//! 5. stop sequence: clear `RUNNING|PAUSED`, `on_stopped`, post the handle to
//!    the termination channel, set `STOPPED`
//!
//! Sleeps race the run's cancellation token, so `stop` does not have to wait
//! out a long interval.
//!
//! A panic in any callback is caught and reported as `AppPanicked`. A panic in
//! steps 2-4 ends the run with [`PANIC_EXIT_CODE`]; the stop sequence still
//! runs, so the manager applies the app's exit policy as for any other exit.
//! If `stop` claims the handle before the worker reaches step 1, steps 1-4
//! are skipped.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::apps::callbacks::{Flow, PANIC_EXIT_CODE};
use crate::apps::flags;
use crate::apps::handle::{AppHandle, AppState};
use crate::events::{Event, EventKind};
use crate::subscribers::panic_message;

/// Lower bound for the paused poll period.
const MIN_PARK_POLL: Duration = Duration::from_millis(10);

pub(crate) async fn run(app: AppHandle) {
    let claimed = app.transition(
        "run",
        &[AppState::Starting, AppState::Restarting],
        AppState::Running,
    );

    let code = match claimed {
        Ok(_) => {
            app.flags().set(flags::RUNNING);
            app.publish(EventKind::AppRunning);
            match AssertUnwindSafe(drive(&app)).catch_unwind().await {
                Ok(code) => code,
                Err(payload) => {
                    app.clear_run();
                    app.clear_suspend();
                    report_panic(&app, payload.as_ref(), Some(PANIC_EXIT_CODE));
                    Some(PANIC_EXIT_CODE)
                }
            }
        }
        // stop() won the race against this run; go straight to the stop sequence
        Err(_) => {
            app.clear_run();
            None
        }
    };
    app.store_exit_code(code);

    finish(&app).await;
}

async fn drive(app: &AppHandle) -> Option<i32> {
    let ctx = app.context();
    let token = ctx.token().clone();

    if let Flow::Exit(code) = app.callbacks().setup(ctx.clone()).await {
        return Some(exited(app, code));
    }

    idle(&token, app.runtime().settle_delay).await;

    let interval = app.config().loop_interval;
    let mut parked = false;

    while app.should_run() {
        if app.suspend_requested() {
            if !parked {
                parked = true;
                let _ = app.transition("pause", &[AppState::Running], AppState::Paused);
                app.flags().set(flags::PAUSED);
                app.publish(EventKind::AppPaused);
                app.callbacks().paused(ctx.clone()).await;
            }

            let poll = interval.max(MIN_PARK_POLL);
            let resumed = tokio::select! {
                hit = app.flags().wait_any(flags::RESUME_CMD, true, poll) => hit.is_some(),
                _ = token.cancelled() => false,
            };
            if resumed {
                parked = false;
                app.clear_suspend();
                let _ = app.transition("resume", &[AppState::Paused], AppState::Running);
                app.flags().clear(flags::PAUSED);
                app.flags().set(flags::RESUMED);
                app.publish(EventKind::AppResumed);
                app.callbacks().resumed(ctx.clone()).await;
            }
            continue;
        }

        if let Flow::Exit(code) = app.callbacks().run_loop(ctx.clone()).await {
            return Some(exited(app, code));
        }

        idle(&token, interval).await;
    }

    None
}

fn exited(app: &AppHandle, code: i32) -> i32 {
    app.clear_run();
    app.runtime().bus.publish(
        Event::new(EventKind::AppExited)
            .with_app(app.name())
            .with_exit_code(code),
    );
    code
}

fn report_panic(app: &AppHandle, payload: &(dyn Any + Send), code: Option<i32>) {
    let info = panic_message(payload);
    eprintln!("[appvisor] app '{}' panicked: {info}", app.name());
    app.runtime().bus.publish(
        Event::new(EventKind::AppPanicked)
            .with_app(app.name())
            .with_exit_code(code)
            .with_reason(info),
    );
}

async fn idle(token: &CancellationToken, period: Duration) {
    tokio::select! {
        _ = time::sleep(period) => {}
        _ = token.cancelled() => {}
    }
}

async fn finish(app: &AppHandle) {
    app.flags().clear(flags::RUNNING | flags::PAUSED);
    app.set_state(AppState::Stopping);

    let callbacks = app.callbacks();
    let stopped = callbacks.stopped(app.context());
    if let Err(payload) = AssertUnwindSafe(stopped).catch_unwind().await {
        report_panic(app, payload.as_ref(), app.exit_code());
    }

    app.runtime().bus.publish(
        Event::new(EventKind::AppStopped)
            .with_app(app.name())
            .with_exit_code(app.exit_code()),
    );
    app.runtime().exits.post(app.clone()).await;

    app.set_state(AppState::Stopped);
    app.flags().set(flags::STOPPED);
}
