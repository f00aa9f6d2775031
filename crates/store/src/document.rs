//! Capability traits of a document store.
//!
//! A [`Connector`] opens a [`DocumentClient`]; the client hands out logical
//! [`Database`]s, which hand out [`Collection`]s of JSON documents.

use std::sync::Arc;

use {async_trait::async_trait, serde::Serialize, serde_json::Value, syntagma_common::Result};

use crate::filter::StoreFilter;

/// A schemaless JSON document.
pub type Document = serde_json::Map<String, Value>;

/// Field carrying the store-assigned document identifier.
pub const ID_FIELD: &str = "_id";

/// Outcome of a bulk insert. `inserted_ids[i]` belongs to the i-th submitted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertManyResult {
    pub inserted_count: usize,
    pub inserted_ids: Vec<String>,
}

#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Insert all documents or none. Documents without an `_id` get a generated one.
    async fn insert_many(&self, docs: Vec<Document>) -> Result<InsertManyResult>;

    /// All documents matching `filter`, in insertion order, each carrying its `_id`.
    async fn find(&self, filter: &StoreFilter) -> Result<Vec<Document>>;
}

#[async_trait]
pub trait Database: Send + Sync {
    fn name(&self) -> &str;

    fn collection(&self, name: &str) -> Arc<dyn Collection>;

    /// Round-trip to the server; returns the store's ping reply.
    async fn ping(&self) -> Result<Value>;
}

#[async_trait]
pub trait DocumentClient: Send + Sync {
    fn database(&self, name: &str) -> Arc<dyn Database>;

    async fn close(&self) -> Result<()>;
}

/// Opens clients for a connection URL.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn DocumentClient>>;
}
