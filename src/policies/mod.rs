//! # Policies applied by the lifecycle manager.
//!
//! - [`ExitAction`] what to do with an app after it terminates
//! - [`Disposition`] the concrete step an `ExitAction` resolves to

mod exit;

pub use exit::{Disposition, ExitAction};
