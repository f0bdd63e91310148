//! # Event subscribers for the appvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and (behind the `logging` feature) the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! AppWorker / AppHandle / Supervisor ── publish(Event) ──► Bus
//!                                                           │
//!                                           Supervisor::subscriber_listener
//!                                                           │
//!                                                     SubscriberSet::emit
//!                                          ┌────────────────┼────────────────┐
//!                                          ▼                ▼                ▼
//!                                      LogWriter         Metrics          Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;

pub(crate) use set::panic_message;
