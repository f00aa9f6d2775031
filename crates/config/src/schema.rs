//! Configuration schema for the store node, the memory engines and the chat recorder.

use std::path::PathBuf;

use {
    serde::{Deserialize, Serialize},
    syntagma_common::{Error, Result, Scope, SortField, SortOrder, SortRule},
};

pub const DEFAULT_STORE_ID: &str = "default";
pub const DEFAULT_DB_NAME: &str = "syntagma";
pub const DEFAULT_COLLECTION: &str = "syntagma_mem_entries";
pub const DEFAULT_LIMIT: usize = 20;
pub const DEFAULT_MAX_LIMIT: usize = 100;
pub const DEFAULT_CHATS_COLLECTION: &str = "syntagma_chats";
pub const DEFAULT_CHAT_MESSAGES_COLLECTION: &str = "syntagma_chat_messages";

/// Root configuration, usually read from `syntagma.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntagmaConfig {
    pub store: StoreNodeDef,
    pub memory: MemoryConfig,
    pub chat: ChatNodeConfig,
    pub project: ProjectNodeDef,
}

impl SyntagmaConfig {
    /// Reject configurations that cannot produce a working node.
    pub fn validate(&self) -> Result<()> {
        if self.store.id.trim().is_empty() {
            return Err(Error::configuration("store id must be non-empty"));
        }
        if self.memory.write.collection_name.trim().is_empty() {
            return Err(Error::configuration(
                "memory.write collection_name must be non-empty",
            ));
        }
        let query = &self.memory.query;
        if query.collection_name.trim().is_empty() {
            return Err(Error::configuration(
                "memory.query collection_name must be non-empty",
            ));
        }
        if query.effective_default_limit() > query.effective_max_limit() {
            return Err(Error::configuration(format!(
                "memory.query default_limit ({}) exceeds max_limit ({})",
                query.effective_default_limit(),
                query.effective_max_limit()
            )));
        }
        if self.chat.chats_collection.trim().is_empty()
            || self.chat.messages_collection.trim().is_empty()
        {
            return Err(Error::configuration("chat collection names must be non-empty"));
        }
        Ok(())
    }
}

/// Definition of one store connection node.
///
/// `id` is the identity the connection registry keys managers by; two nodes
/// with the same URL but different ids get independent connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreNodeDef {
    pub id: String,
    pub name: Option<String>,
    /// Environment variable to read the URL from instead of the default candidates.
    pub env_var_name: Option<String>,
    /// Use the environment URL even when `url` is set.
    pub prefer_env_url: bool,
    pub url: Option<String>,
    pub db_name: Option<String>,
}

impl Default for StoreNodeDef {
    fn default() -> Self {
        Self {
            id: DEFAULT_STORE_ID.into(),
            name: None,
            env_var_name: None,
            prefer_env_url: false,
            url: None,
            db_name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub write: MemWriteNodeConfig,
    pub query: MemQueryNodeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemWriteNodeConfig {
    pub collection_name: String,
}

impl Default for MemWriteNodeConfig {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION.into(),
        }
    }
}

/// Per-instance settings of the query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemQueryNodeConfig {
    pub collection_name: String,
    /// Scopes searched when the request names none.
    pub default_scopes: Vec<Scope>,
    /// Page size used when the request gives none (or a non-positive one).
    pub default_limit: i64,
    /// Upper bound for any requested page size.
    pub max_limit: i64,
    pub enable_vector_search: bool,
    pub default_top_k: Option<i64>,
    pub default_similarity_threshold: Option<f64>,
    pub default_sort_field: Option<SortField>,
    pub default_sort_order: Option<SortOrder>,
}

impl Default for MemQueryNodeConfig {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION.into(),
            default_scopes: Vec::new(),
            default_limit: DEFAULT_LIMIT as i64,
            max_limit: DEFAULT_MAX_LIMIT as i64,
            enable_vector_search: false,
            default_top_k: None,
            default_similarity_threshold: None,
            default_sort_field: None,
            default_sort_order: None,
        }
    }
}

impl MemQueryNodeConfig {
    pub fn effective_max_limit(&self) -> usize {
        positive(self.max_limit).unwrap_or(DEFAULT_MAX_LIMIT)
    }

    pub fn effective_default_limit(&self) -> usize {
        positive(self.default_limit).unwrap_or(DEFAULT_LIMIT)
    }

    /// Node-level sort; only present when both field and order are configured.
    pub fn default_sort(&self) -> Option<SortRule> {
        match (self.default_sort_field, self.default_sort_order) {
            (Some(field), Some(order)) => Some(SortRule::new(field, order)),
            _ => None,
        }
    }
}

/// Settings of the chat transcript recorder.
///
/// The defaults apply when an incoming message leaves the field blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatNodeConfig {
    pub default_project_id: Option<String>,
    pub default_chat_kind: Option<String>,
    pub default_chat_key: Option<String>,
    pub chats_collection: String,
    pub messages_collection: String,
}

impl Default for ChatNodeConfig {
    fn default() -> Self {
        Self {
            default_project_id: None,
            default_chat_kind: None,
            default_chat_key: None,
            chats_collection: DEFAULT_CHATS_COLLECTION.into(),
            messages_collection: DEFAULT_CHAT_MESSAGES_COLLECTION.into(),
        }
    }
}

/// Where the project definition lives, and an optional id override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectNodeDef {
    /// Takes precedence over the `projectId` inside the definition.
    pub project_id: Option<String>,
    /// JSON project definition, validated on load.
    pub config_file: Option<PathBuf>,
}

fn positive(value: i64) -> Option<usize> {
    usize::try_from(value).ok().filter(|v| *v > 0)
}
