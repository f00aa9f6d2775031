//! Chat transcript persistence: incoming transport messages are normalized
//! and stored with the chat they belong to.

pub mod message;
pub mod recorder;

pub use {
    message::{
        AuthorRef, ChatAuthor, ChatMessageMeta, ChatMessageRecord, ChatRecord, Mention,
        MessageDirection, MessagePart, MessageRole, MessageTransportBinding, text_from_parts,
    },
    recorder::{ChatRecordResult, ChatRecorder, ChatRequest, ChatResponse, IncomingChatMessage},
};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod testing {
    use std::sync::Arc;

    use {
        async_trait::async_trait,
        syntagma_common::{Error, Result},
        syntagma_config::StoreNodeDef,
        syntagma_store::{
            ConnectionManager, ConnectionRegistry, Database, DatabaseProvider,
            DefaultManagerFactory, EnvResolver, SqliteConnector, StoreRuntime,
        },
    };

    /// A fresh manager over a private in-memory SQLite store.
    pub(crate) fn memory_manager() -> Arc<ConnectionManager> {
        StoreRuntime::new(
            EnvResolver::with_lookup(|_| None),
            Arc::new(DefaultManagerFactory::new(Arc::new(SqliteConnector))),
            Arc::new(ConnectionRegistry::new()),
        )
        .open_node(&StoreNodeDef {
            url: Some("sqlite::memory:".into()),
            ..Default::default()
        })
        .manager()
    }

    pub(crate) struct FailingProvider(pub(crate) &'static str);

    #[async_trait]
    impl DatabaseProvider for FailingProvider {
        async fn database(&self) -> Result<Arc<dyn Database>> {
            Err(Error::store(self.0))
        }
    }
}
