//! # Demo: hello_world
//!
//! A periodic app that greets five times a second apart, then exits with code 0.
//! Its exit action is `RestartUnlessStopped`, so the lifecycle manager treats
//! the code as "ran to completion, start again" and the cycle repeats until
//! Ctrl-C. `on_stopped` resets the counter for the next run.
//!
//! Bring-up failures (create or start) escalate to a device restart, which by
//! default exits the process.
//!
//! ## Flow
//! ```text
//! create ─► start ─► on_setup ─► on_loop ×5 ─► Exit(0) ─► on_stopped
//!                                                             │
//!                        Supervisor::run ◄── termination channel
//!                               │
//!                        RestartUnlessStopped + Some(0) ─► restart
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example hello_world --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context;
use appvisor::{
    AppConfig, AppContext, AppHandle, CallbackGroup, Config, ExitAction, Flow, LogWriter,
    Priority, Subscribe, Supervisor,
};

const GREETINGS: u32 = 5;

fn callbacks() -> CallbackGroup {
    CallbackGroup::new()
        .on_setup(|ctx: AppContext| async move {
            println!("[{}] setup", ctx.name());
            Flow::Pass
        })
        .on_loop(|ctx: AppContext| async move {
            let Some(count) = ctx.param::<AtomicU32>() else {
                return Flow::Exit(-1);
            };
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            println!("[{}] hello world #{n}", ctx.name());
            if n >= GREETINGS {
                Flow::Exit(0)
            } else {
                Flow::Pass
            }
        })
        .on_stopped(|ctx: AppContext| async move {
            if let Some(count) = ctx.param::<AtomicU32>() {
                count.store(0, Ordering::SeqCst);
            }
            println!("[{}] stopped", ctx.name());
        })
}

async fn bring_up(sup: &Supervisor) -> anyhow::Result<AppHandle> {
    let cfg = AppConfig::new("hello_world")
        .with_priority(Priority::LOW)
        .with_stack_size(4 * 1024)
        .with_loop_interval(Duration::from_secs(1))
        .with_param(Arc::new(AtomicU32::new(0)))
        .with_exit_action(ExitAction::RestartUnlessStopped);

    let app = sup
        .create(cfg, callbacks())
        .await
        .context("failed to create hello_world app")?;
    app.start()
        .await
        .context("failed to start hello_world app")?;
    Ok(app)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(Config::default())
        .with_subscribers(subs)
        .build();

    let _app = match bring_up(&sup).await {
        Ok(app) => app,
        Err(e) => return Err(sup.restart_device(format!("{e:#}")).await.into()),
    };

    sup.run().await?;
    Ok(())
}
