//! # Device restart hook.
//!
//! [`ExitAction::RestartDevice`](crate::ExitAction::RestartDevice) and failed
//! bring-up end in a request to restart the whole device. The supervisor
//! publishes `DeviceRestartRequested`, waits `Config::restart_grace` so logs and
//! subscribers can flush, then calls the configured [`DeviceRestart`].
//!
//! The default, [`ProcessRestart`], exits the process and leaves the actual
//! restart to whatever manages it (systemd, a container runtime, a watchdog).

/// Performs the device restart.
pub trait DeviceRestart: Send + Sync + 'static {
    /// Called once per restart request, after the grace period.
    ///
    /// Implementations that return (instead of diverging) let the supervisor
    /// report [`RuntimeError::DeviceRestart`](crate::RuntimeError::DeviceRestart)
    /// to its caller.
    fn restart(&self, reason: &str);
}

/// Restart by exiting the process with a fixed status.
#[derive(Clone, Copy, Debug)]
pub struct ProcessRestart {
    /// Process exit status.
    pub exit_code: i32,
}

impl Default for ProcessRestart {
    fn default() -> Self {
        Self { exit_code: 1 }
    }
}

impl DeviceRestart for ProcessRestart {
    fn restart(&self, reason: &str) {
        eprintln!("[appvisor] restarting device: {reason}");
        std::process::exit(self.exit_code);
    }
}
