//! Metric names and label keys.
//!
//! Crates record through the re-exported `metrics` macros so that the host
//! decides which recorder (if any) is installed.

pub use metrics::{counter, gauge, histogram};

/// Label keys shared across metric families.
pub mod labels {
    pub const STATUS: &str = "status";
    pub const COLLECTION: &str = "collection";
}

/// Memory write/query engine metrics.
pub mod memory {
    /// Batches received by the write engine, labelled by `collection`.
    pub const WRITE_BATCHES_TOTAL: &str = "syntagma_memory_write_batches_total";
    /// Individual batch items, labelled by `collection` and `status` = ok|failed.
    pub const WRITE_ITEMS_TOTAL: &str = "syntagma_memory_write_items_total";
    /// Queries handled, labelled by `collection` and `status` = ok|failed|rejected.
    pub const QUERIES_TOTAL: &str = "syntagma_memory_queries_total";
    pub const QUERY_DURATION_SECONDS: &str = "syntagma_memory_query_duration_seconds";
}

/// Chat transcript recorder metrics.
pub mod chat {
    /// Chat messages handled, labelled by `collection` and `status` = ok|failed|rejected.
    pub const MESSAGES_TOTAL: &str = "syntagma_chat_messages_total";
    /// Chats created because no existing chat matched.
    pub const CHATS_CREATED_TOTAL: &str = "syntagma_chat_chats_created_total";
}

/// Connection lifecycle metrics.
pub mod store {
    pub const CONNECTIONS_OPENED_TOTAL: &str = "syntagma_store_connections_opened_total";
    pub const MANAGERS_ACTIVE: &str = "syntagma_store_managers_active";
}
