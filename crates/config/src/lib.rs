//! Typed node configuration, project definitions and TOML loading.

pub mod loader;
pub mod project;
pub mod schema;

pub use {
    loader::{CONFIG_FILE_NAME, discover_config, load_config, load_project},
    project::{
        AgentInstanceConfig, OperatorBinding, ProjectChatIds, ProjectConfig, ResolvedProject,
        SquadConfig, SquadRoleConfig, StageBinding, TelegramBinding,
    },
    schema::{
        ChatNodeConfig, DEFAULT_CHAT_MESSAGES_COLLECTION, DEFAULT_CHATS_COLLECTION,
        DEFAULT_COLLECTION, DEFAULT_DB_NAME, DEFAULT_LIMIT, DEFAULT_MAX_LIMIT, DEFAULT_STORE_ID,
        MemQueryNodeConfig, MemWriteNodeConfig, MemoryConfig, ProjectNodeDef, StoreNodeDef,
        SyntagmaConfig,
    },
};
