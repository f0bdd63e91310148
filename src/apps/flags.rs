//! # Bit-flag synchronization object.
//!
//! [`EventFlags`] is a shared word of named boolean flags used to hand control
//! between an app's owner and the app's worker task. It supports atomic set,
//! atomic clear, and "wait until any bit of a mask is set, with timeout,
//! optionally consuming the matched bits".
//!
//! The word lives in a [`tokio::sync::watch`] channel: every modification happens
//! under the channel's lock and bumps its version, and a waiter subscribes
//! *before* checking the word, so a bit set between the check and the await
//! still wakes it (no lost wake-ups).
//!
//! ## Bits
//! ```text
//! bit │ name        │ set by          │ cleared by
//! ────┼─────────────┼─────────────────┼───────────────────────────────
//!  0  │ RUNNING     │ worker (entry)  │ worker (exit), kill path
//!  1  │ STOPPED     │ worker (exit)   │ manager before restart, start
//!  2  │ PAUSED      │ worker          │ worker on resume
//!  3  │ RESUMED     │ worker          │ `resume` (consumed on wake)
//!  4  │ RESUME_CMD  │ `resume`        │ worker (consumed on wake)
//! ```

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

/// Worker is alive and executing its state machine.
pub const RUNNING: u32 = 1 << 0;
/// Worker finished its stop sequence.
pub const STOPPED: u32 = 1 << 1;
/// Worker is parked in the paused state.
pub const PAUSED: u32 = 1 << 2;
/// Worker left the paused state (one-shot acknowledgement).
pub const RESUMED: u32 = 1 << 3;
/// Owner asked a paused worker to resume (one-shot command).
pub const RESUME_CMD: u32 = 1 << 4;

/// All protocol bits.
pub const ALL: u32 = RUNNING | STOPPED | PAUSED | RESUMED | RESUME_CMD;

/// Shared, thread-safe set of protocol flags for one app handle.
#[derive(Debug)]
pub struct EventFlags {
    tx: watch::Sender<u32>,
}

impl EventFlags {
    /// Creates a flag word with every bit clear.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Returns the current bits.
    pub fn get(&self) -> u32 {
        *self.tx.borrow()
    }

    /// True if every bit of `mask` is set.
    pub fn contains(&self, mask: u32) -> bool {
        self.get() & mask == mask
    }

    /// Atomically sets `mask`; returns the bits after the update.
    pub fn set(&self, mask: u32) -> u32 {
        let mut after = 0;
        self.tx.send_if_modified(|bits| {
            let before = *bits;
            *bits |= mask;
            after = *bits;
            after != before
        });
        after
    }

    /// Atomically clears `mask`; returns the bits before the update.
    pub fn clear(&self, mask: u32) -> u32 {
        let mut before = 0;
        self.tx.send_if_modified(|bits| {
            before = *bits;
            *bits &= !mask;
            *bits != before
        });
        before
    }

    /// Waits until any bit of `mask` is set, for at most `timeout`.
    ///
    /// Returns the matched bits, or `None` if the deadline elapsed first.
    /// With `clear_on_exit`, the matched bits are cleared in the same critical
    /// section that observed them, so only one waiter consumes a one-shot bit.
    pub async fn wait_any(&self, mask: u32, clear_on_exit: bool, timeout: Duration) -> Option<u32> {
        let mut rx = self.tx.subscribe();
        let wait = async {
            loop {
                let mut matched = 0;
                self.tx.send_if_modified(|bits| {
                    matched = *bits & mask;
                    if matched != 0 && clear_on_exit {
                        *bits &= !matched;
                        true
                    } else {
                        false
                    }
                });
                if matched != 0 {
                    return Some(matched);
                }
                if rx.changed().await.is_err() {
                    return None;
                }
            }
        };
        time::timeout(timeout, wait).await.ok().flatten()
    }
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_and_clear_are_independent_per_bit() {
        let f = EventFlags::new();
        assert_eq!(f.set(RUNNING | PAUSED), RUNNING | PAUSED);
        assert_eq!(f.clear(PAUSED), RUNNING | PAUSED);
        assert!(f.contains(RUNNING));
        assert!(!f.contains(RUNNING | PAUSED));
        assert_eq!(f.get(), RUNNING);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_immediately_when_bit_already_set() {
        let f = EventFlags::new();
        f.set(STOPPED);
        let got = f.wait_any(STOPPED, false, Duration::from_secs(1)).await;
        assert_eq!(got, Some(STOPPED));
        assert!(f.contains(STOPPED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_with_clear_consumes_matched_bits_only() {
        let f = EventFlags::new();
        f.set(RESUMED | RUNNING);
        let got = f.wait_any(RESUMED | STOPPED, true, Duration::from_secs(1)).await;
        assert_eq!(got, Some(RESUMED));
        assert_eq!(f.get(), RUNNING);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let f = EventFlags::new();
        let started = time::Instant::now();
        let got = f.wait_any(RUNNING, false, Duration::from_millis(1000)).await;
        assert_eq!(got, None);
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_wakes_on_set_from_other_task() {
        let f = Arc::new(EventFlags::new());
        let setter = Arc::clone(&f);
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(50)).await;
            setter.set(RESUME_CMD);
        });

        let got = f.wait_any(RESUME_CMD, true, Duration::from_secs(5)).await;
        assert_eq!(got, Some(RESUME_CMD));
        assert_eq!(f.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_bit_is_consumed_by_a_single_waiter() {
        let f = Arc::new(EventFlags::new());
        let a = {
            let f = Arc::clone(&f);
            tokio::spawn(async move { f.wait_any(RESUME_CMD, true, Duration::from_millis(200)).await })
        };
        let b = {
            let f = Arc::clone(&f);
            tokio::spawn(async move { f.wait_any(RESUME_CMD, true, Duration::from_millis(200)).await })
        };
        tokio::task::yield_now().await;
        f.set(RESUME_CMD);

        let hits = [a.await.unwrap(), b.await.unwrap()]
            .iter()
            .filter(|r| r.is_some())
            .count();
        assert_eq!(hits, 1);
    }
}
