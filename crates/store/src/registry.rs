//! Process-wide map from a node key to its [`ConnectionManager`].

use std::sync::Arc;

use {dashmap::DashMap, syntagma_common::Result, tracing::debug};

#[cfg(feature = "metrics")]
use syntagma_metrics::{gauge, store as store_metrics};

use crate::{
    manager::{ConnectionManager, ConnectionManagerFactory},
    resolver::EffectiveConnectionConfig,
};

/// Holds at most one manager per key.
///
/// Keys identify the owning configuration (a store node id), not the URL, so
/// two nodes pointing at the same database still get separate managers. The
/// host creates one registry at startup and passes it to whatever needs it.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    managers: DashMap<String, Arc<ConnectionManager>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The manager for `key`, created through `factory` if absent.
    ///
    /// On a hit the supplied config and factory are ignored. Lookup and insert
    /// happen under the same shard lock, so racing callers get the same manager.
    pub fn get_or_create_manager(
        &self,
        key: &str,
        config: &EffectiveConnectionConfig,
        factory: &dyn ConnectionManagerFactory,
    ) -> Arc<ConnectionManager> {
        let manager = Arc::clone(
            self.managers
                .entry(key.to_string())
                .or_insert_with(|| {
                    debug!(key, db_name = %config.db_name, "creating connection manager");
                    factory.create(config.clone())
                })
                .value(),
        );

        #[cfg(feature = "metrics")]
        gauge!(store_metrics::MANAGERS_ACTIVE).set(self.managers.len() as f64);

        manager
    }

    pub fn get_manager(&self, key: &str) -> Option<Arc<ConnectionManager>> {
        self.managers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove the manager for `key` and close it. Unknown keys are a no-op.
    ///
    /// The entry is gone before the close is awaited, so a manager that fails
    /// to close is never handed out again.
    pub async fn destroy_manager(&self, key: &str) -> Result<()> {
        let Some((_, manager)) = self.managers.remove(key) else {
            return Ok(());
        };

        #[cfg(feature = "metrics")]
        gauge!(store_metrics::MANAGERS_ACTIVE).set(self.managers.len() as f64);

        debug!(key, "destroying connection manager");
        manager.close().await
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}
