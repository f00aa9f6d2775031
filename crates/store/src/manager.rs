//! Lazily-connected, reusable handle to one logical database target.

use std::sync::Arc;

use {
    async_trait::async_trait,
    syntagma_common::{Error, Result},
    tokio::sync::Mutex,
    tracing::{info, warn},
};

#[cfg(feature = "metrics")]
use syntagma_metrics::{counter, store as store_metrics};

use crate::{
    document::{Connector, Database, DocumentClient},
    resolver::EffectiveConnectionConfig,
};

/// Anything that can hand out the database the memory engines operate on.
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    async fn database(&self) -> Result<Arc<dyn Database>>;
}

/// Owns at most one live client for an [`EffectiveConnectionConfig`].
///
/// The client slot is locked for the whole connect step, so callers racing on
/// first use wait for the in-flight attempt and then share its client instead
/// of opening their own.
pub struct ConnectionManager {
    config: EffectiveConnectionConfig,
    connector: Arc<dyn Connector>,
    client: Mutex<Option<Arc<dyn DocumentClient>>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("db_name", &self.config.db_name)
            .field("source", &self.config.source)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    pub fn new(config: EffectiveConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            client: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EffectiveConnectionConfig {
        &self.config
    }

    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    /// The cached client, connecting first if there is none.
    ///
    /// A failed attempt is not cached; the next caller tries again.
    pub async fn get_client(&self) -> Result<Arc<dyn DocumentClient>> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }
        if self.config.url.is_empty() {
            return Err(Error::configuration(format!(
                "store URL is empty (set it on the node or via {})",
                self.config.env_var_name
            )));
        }

        info!(
            db_name = %self.config.db_name,
            source = ?self.config.source,
            "connecting to document store"
        );
        let client = self.connector.connect(&self.config.url).await?;

        #[cfg(feature = "metrics")]
        counter!(store_metrics::CONNECTIONS_OPENED_TOTAL).increment(1);

        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    pub async fn get_db(&self) -> Result<Arc<dyn Database>> {
        let client = self.get_client().await?;
        Ok(client.database(&self.config.db_name))
    }

    /// Disconnect and clear the cache. No-op when never connected.
    pub async fn close(&self) -> Result<()> {
        let Some(client) = self.client.lock().await.take() else {
            return Ok(());
        };
        info!(db_name = %self.config.db_name, "closing document store connection");
        client.close().await.inspect_err(|e| {
            warn!(db_name = %self.config.db_name, error = %e, "store client failed to close");
        })
    }
}

#[async_trait]
impl DatabaseProvider for ConnectionManager {
    async fn database(&self) -> Result<Arc<dyn Database>> {
        self.get_db().await
    }
}

/// Builds managers for the registry.
pub trait ConnectionManagerFactory: Send + Sync {
    fn create(&self, config: EffectiveConnectionConfig) -> Arc<ConnectionManager>;
}

/// Factory producing managers that connect through one shared [`Connector`].
#[derive(Clone)]
pub struct DefaultManagerFactory {
    connector: Arc<dyn Connector>,
}

impl DefaultManagerFactory {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }
}

impl ConnectionManagerFactory for DefaultManagerFactory {
    fn create(&self, config: EffectiveConnectionConfig) -> Arc<ConnectionManager> {
        Arc::new(ConnectionManager::new(config, Arc::clone(&self.connector)))
    }
}
