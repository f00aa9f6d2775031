//! Scoped memory entries: batch writes with per-item validation, and queries
//! ranked by embedding similarity.

pub mod envelope;
pub mod filter;
pub mod query;
pub mod schema;
pub mod search;
pub mod write;

pub use {
    envelope::{
        QueryRequest, QueryResponse, RequestContext, RequestMeta, WriteRequest, WriteResponse,
        malformed_request,
    },
    filter::{FALLBACK_SCOPE, MemQueryFilter, build_store_filter, resolve_scopes},
    query::{MemQuery, MemQueryEngine, MemQueryResult, VectorConfig},
    schema::{BatchItem, Embedding, MemoryEntry},
    search::{MemQueryResultItem, best_similarity, cosine_similarity},
    write::{MemWriter, WriteResult, WriteResultItem, normalize_item},
};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod testing {
    use std::sync::Arc;

    use {
        async_trait::async_trait,
        serde_json::Value,
        syntagma_common::{Error, Result},
        syntagma_config::{DEFAULT_COLLECTION, StoreNodeDef},
        syntagma_store::{
            ConnectionManager, ConnectionRegistry, Database, DatabaseProvider,
            DefaultManagerFactory, EnvResolver, SqliteConnector, StoreRuntime,
        },
    };

    /// A fresh manager over a private in-memory SQLite store.
    pub(crate) fn memory_manager() -> Arc<ConnectionManager> {
        let runtime = StoreRuntime::new(
            EnvResolver::with_lookup(|_| None),
            Arc::new(DefaultManagerFactory::new(Arc::new(SqliteConnector))),
            Arc::new(ConnectionRegistry::new()),
        );
        runtime
            .open_node(&StoreNodeDef {
                url: Some("sqlite::memory:".into()),
                ..Default::default()
            })
            .manager()
    }

    /// Insert raw documents into the default collection.
    pub(crate) async fn seed(manager: &ConnectionManager, docs: Vec<Value>) {
        let docs = docs
            .into_iter()
            .map(|doc| doc.as_object().cloned().unwrap())
            .collect();
        manager
            .get_db()
            .await
            .unwrap()
            .collection(DEFAULT_COLLECTION)
            .insert_many(docs)
            .await
            .unwrap();
    }

    /// Provider whose store is always unreachable.
    pub(crate) struct FailingProvider(pub(crate) &'static str);

    #[async_trait]
    impl DatabaseProvider for FailingProvider {
        async fn database(&self) -> Result<Arc<dyn Database>> {
            Err(Error::store(self.0))
        }
    }
}
