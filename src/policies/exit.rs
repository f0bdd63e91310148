//! # Exit policies for terminated apps.
//!
//! [`ExitAction`] determines what the lifecycle manager does with an app handle
//! after its worker has stopped and posted itself to the termination channel.
//!
//! - [`ExitAction::Free`] dispose of the handle, never restart.
//! - [`ExitAction::Restart`] restart unconditionally.
//! - [`ExitAction::RestartUnlessStopped`] restart only if a callback returned an exit code.
//! - [`ExitAction::RestartDevice`] dispose of the handle and restart the whole device.
//!
//! The policy is decoupled from *why* the app stopped (its exit code):
//! ```text
//! exit_code  │ Free  Restart  RestartUnlessStopped  RestartDevice
//! ───────────┼──────────────────────────────────────────────────────
//! None       │ free  restart  free                  free + device
//! Some(n)    │ free  restart  restart               free + device
//! ```

/// Policy consulted by the lifecycle manager when an app terminates.
///
/// Fixed at handle creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExitAction {
    /// Dispose only.
    #[default]
    Free,
    /// Always respawn.
    Restart,
    /// Respawn only if termination was caused by an exit code, not by `stop`.
    RestartUnlessStopped,
    /// Dispose and trigger a full device restart.
    RestartDevice,
}

/// Concrete step the lifecycle manager takes for one terminated handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Release the handle.
    Free,
    /// Reset the handle and start it again.
    Restart,
    /// Release the handle, then restart the device.
    RestartDevice,
}

impl ExitAction {
    /// Resolves the policy against the exit code the app stopped with.
    ///
    /// # Example
    /// ```
    /// use appvisor::{Disposition, ExitAction};
    ///
    /// let policy = ExitAction::RestartUnlessStopped;
    /// assert_eq!(policy.resolve(None), Disposition::Free);
    /// assert_eq!(policy.resolve(Some(0)), Disposition::Restart);
    /// ```
    pub fn resolve(self, exit_code: Option<i32>) -> Disposition {
        match self {
            ExitAction::Free => Disposition::Free,
            ExitAction::Restart => Disposition::Restart,
            ExitAction::RestartUnlessStopped => match exit_code {
                None => Disposition::Free,
                Some(_) => Disposition::Restart,
            },
            ExitAction::RestartDevice => Disposition::RestartDevice,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_and_device_ignore_exit_code() {
        for code in [None, Some(0), Some(-1)] {
            assert_eq!(ExitAction::Free.resolve(code), Disposition::Free);
            assert_eq!(ExitAction::Restart.resolve(code), Disposition::Restart);
            assert_eq!(
                ExitAction::RestartDevice.resolve(code),
                Disposition::RestartDevice
            );
        }
    }

    #[test]
    fn test_restart_unless_stopped_treats_zero_as_a_code() {
        let p = ExitAction::RestartUnlessStopped;
        assert_eq!(p.resolve(None), Disposition::Free);
        assert_eq!(p.resolve(Some(0)), Disposition::Restart);
        assert_eq!(p.resolve(Some(7)), Disposition::Restart);
    }
}
