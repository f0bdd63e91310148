//! # App registry.
//!
//! Tracks every handle created by a supervisor until the lifecycle manager
//! frees it. Entries are weak: the registry never keeps a handle alive on its
//! own, so a handle the owner dropped (and whose worker finished) simply
//! disappears from [`live`](AppRegistry::live).
//!
//! ## Rules
//! - `create` inserts, `Free`/`RestartDevice` dispositions remove
//! - reads upgrade and prune dead entries lazily
//! - ids are supervisor-unique and never reused; names may repeat

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::apps::{AppHandle, WeakAppHandle};

/// Weak index of live app handles, keyed by id.
#[derive(Default)]
pub(crate) struct AppRegistry {
    apps: RwLock<HashMap<u64, WeakAppHandle>>,
}

impl AppRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn insert(&self, app: &AppHandle) {
        self.apps.write().await.insert(app.id(), app.downgrade());
    }

    /// Returns true if the handle was registered.
    pub(crate) async fn remove(&self, id: u64) -> bool {
        self.apps.write().await.remove(&id).is_some()
    }

    /// Live handles, ordered by id (creation order).
    pub(crate) async fn live(&self) -> Vec<AppHandle> {
        let mut apps = self.apps.write().await;
        apps.retain(|_, weak| weak.upgrade().is_some());

        let mut live: Vec<AppHandle> = apps.values().filter_map(WeakAppHandle::upgrade).collect();
        live.sort_unstable_by_key(AppHandle::id);
        live
    }

    /// First live handle with the given name.
    pub(crate) async fn find(&self, name: &str) -> Option<AppHandle> {
        self.live().await.into_iter().find(|app| app.name() == name)
    }
}
