//! Store node bootstrap: wires env resolution, config resolution and the
//! registry together, and exposes the teardown and health-check hooks.

use std::sync::Arc;

use {
    chrono::{SecondsFormat, Utc},
    serde::Serialize,
    serde_json::Value,
    syntagma_config::StoreNodeDef,
    tracing::{error, info, warn},
};

use crate::{
    env::EnvResolver,
    manager::{ConnectionManager, ConnectionManagerFactory, DefaultManagerFactory},
    registry::ConnectionRegistry,
    resolver::{EffectiveConnectionConfig, resolve_effective_config},
    sqlite::SqliteConnector,
};

/// Shared state created once by the host and handed to every store node.
#[derive(Clone)]
pub struct StoreRuntime {
    env: EnvResolver,
    factory: Arc<dyn ConnectionManagerFactory>,
    registry: Arc<ConnectionRegistry>,
}

impl StoreRuntime {
    pub fn new(
        env: EnvResolver,
        factory: Arc<dyn ConnectionManagerFactory>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            env,
            factory,
            registry,
        }
    }

    /// Runtime backed by SQLite, reading URLs from the process environment.
    pub fn sqlite(registry: Arc<ConnectionRegistry>) -> Self {
        Self::new(
            EnvResolver::default(),
            Arc::new(DefaultManagerFactory::new(Arc::new(SqliteConnector))),
            registry,
        )
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Resolve the node's connection target and attach it to the registry.
    ///
    /// The node id is the registry key: opening the same id twice yields the
    /// same manager, whatever the second definition says.
    pub fn open_node(&self, def: &StoreNodeDef) -> StoreNode {
        let env = self.env.resolve(def.env_var_name.as_deref());
        let effective = resolve_effective_config(def, &env);
        if effective.url.is_empty() {
            warn!(
                node = %def.id,
                env_var = %effective.env_var_name,
                "store node has no URL; connections will fail"
            );
        }
        let manager = self
            .registry
            .get_or_create_manager(&def.id, &effective, self.factory.as_ref());
        info!(
            node = %def.id,
            source = ?effective.source,
            db_name = %effective.db_name,
            "store node ready"
        );

        StoreNode {
            id: def.id.clone(),
            name: def.name.clone(),
            effective,
            manager,
            registry: Arc::clone(&self.registry),
        }
    }

    /// The manager previously attached for `node_id`, if any.
    pub fn manager(&self, node_id: &str) -> Option<Arc<ConnectionManager>> {
        self.registry.get_manager(node_id)
    }
}

/// One configured store connection, as seen by the host.
pub struct StoreNode {
    id: String,
    name: Option<String>,
    effective: EffectiveConnectionConfig,
    manager: Arc<ConnectionManager>,
    registry: Arc<ConnectionRegistry>,
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub config: EffectiveConnectionConfig,
    pub at: String,
}

impl StoreNode {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn effective_config(&self) -> &EffectiveConnectionConfig {
        &self.effective
    }

    pub fn manager(&self) -> Arc<ConnectionManager> {
        Arc::clone(&self.manager)
    }

    /// Connect if needed and run the store's ping. Never fails; errors are reported in the result.
    pub async fn ping(&self) -> PingReport {
        let outcome = match self.manager.get_db().await {
            Ok(db) => db.ping().await,
            Err(e) => Err(e),
        };
        let at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        match outcome {
            Ok(reply) => PingReport {
                ok: true,
                ping: Some(reply),
                error: None,
                config: self.effective.clone(),
                at,
            },
            Err(e) => {
                error!(node = %self.id, error = %e, "store ping failed");
                PingReport {
                    ok: false,
                    ping: None,
                    error: Some(e.to_string()),
                    config: self.effective.clone(),
                    at,
                }
            },
        }
    }

    /// Teardown hook: drop the node's manager from the registry and close it.
    /// A failed close is logged, never propagated.
    pub async fn close(&self) {
        if let Err(e) = self.registry.destroy_manager(&self.id).await {
            error!(node = %self.id, error = %e, "failed to close store connection");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, crate::resolver::ConfigSource, serde_json::json};

    fn runtime(env_url: Option<&'static str>) -> StoreRuntime {
        let env = EnvResolver::with_lookup(move |name| {
            (name == "SYNTAGMA_STORE_URL")
                .then_some(env_url)
                .flatten()
                .map(str::to_string)
        });
        StoreRuntime::new(
            env,
            Arc::new(DefaultManagerFactory::new(Arc::new(SqliteConnector))),
            Arc::new(ConnectionRegistry::new()),
        )
    }

    fn def(id: &str, url: Option<&str>) -> StoreNodeDef {
        StoreNodeDef {
            id: id.into(),
            url: url.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn open_node_uses_env_when_node_has_no_url() {
        let rt = runtime(Some("sqlite::memory:"));
        let node = rt.open_node(&def("n1", None));
        assert_eq!(node.effective_config().source, ConfigSource::Env);
        assert_eq!(node.effective_config().url, "sqlite::memory:");
        assert!(Arc::ptr_eq(&rt.manager("n1").unwrap(), &node.manager()));
    }

    #[tokio::test]
    async fn reopening_same_id_reuses_manager() {
        let rt = runtime(None);
        let first = rt.open_node(&def("n1", Some("sqlite::memory:")));
        let second = rt.open_node(&def("n1", Some("sqlite://other.db")));
        assert!(Arc::ptr_eq(&first.manager(), &second.manager()));
        assert_eq!(second.manager().config().url, "sqlite::memory:");
    }

    #[tokio::test]
    async fn ping_ok_reports_config() {
        let rt = runtime(None);
        let node = rt.open_node(&def("n1", Some("sqlite::memory:")));
        let report = node.ping().await;
        assert!(report.ok);
        assert_eq!(report.ping, Some(json!({"ok": 1})));
        let rendered = serde_json::to_value(&report).unwrap();
        assert_eq!(rendered["config"]["source"], json!("node"));
        assert_eq!(rendered["config"]["dbName"], json!("syntagma"));
        assert!(rendered.get("error").is_none());
    }

    #[tokio::test]
    async fn ping_without_url_reports_error() {
        let rt = runtime(None);
        let node = rt.open_node(&def("n1", None));
        let report = node.ping().await;
        assert!(!report.ok);
        assert!(report.error.unwrap().contains("store URL is empty"));
    }

    #[tokio::test]
    async fn close_removes_manager_from_registry() {
        let rt = runtime(None);
        let node = rt.open_node(&def("n1", Some("sqlite::memory:")));
        node.ping().await;
        node.close().await;
        assert!(rt.manager("n1").is_none());
        assert!(!node.manager().is_connected().await);
        // Second close is harmless.
        node.close().await;
    }
}
