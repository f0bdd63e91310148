use std::sync::Arc;

use crate::{
    core::{Config, DeviceRestart, ProcessRestart},
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};
use super::supervisor::Supervisor;

/// Builder for constructing a Supervisor with optional features.
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    restarter: Arc<dyn DeviceRestart>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            restarter: Arc::new(ProcessRestart::default()),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (app lifecycle, timeouts, restarts)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the device restart hook (default: [`ProcessRestart`]).
    pub fn with_restarter(mut self, restarter: Arc<dyn DeviceRestart>) -> Self {
        self.restarter = restarter;
        self
    }

    /// Builds and returns the Supervisor instance.
    ///
    /// Must be called from within a tokio runtime: subscriber workers and the
    /// bus listener are spawned here.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));

        let sup = Arc::new(Supervisor::new_internal(self.cfg, bus, subs, self.restarter));
        sup.subscriber_listener();
        sup
    }
}
