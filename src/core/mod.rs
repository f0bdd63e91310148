//! Runtime core: configuration, the supervisor and its lifecycle manager.
//!
//! The public API from this module is [`Supervisor`] (with its builder),
//! [`Config`] and the [`DeviceRestart`] hook.
//!
//! Internal modules:
//! - [`supervisor`]: app creation, the lifecycle manager loop, shutdown;
//! - [`exit_queue`]: the bounded termination channel;
//! - [`registry`]: weak index of live handles;
//! - [`restart`]: device restart hook;
//! - [`shutdown`]: cross-platform termination signals.

mod builder;
mod config;
mod exit_queue;
mod registry;
mod restart;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::{Config, ExitOverflow};
pub use restart::{DeviceRestart, ProcessRestart};
pub use supervisor::Supervisor;

pub(crate) use config::ack_deadline;
pub(crate) use exit_queue::ExitQueue;
