//! Document store access: capability traits, a SQLite-backed document store,
//! connection config resolution, and the per-node connection registry.

pub mod document;
pub mod env;
pub mod filter;
pub mod manager;
pub mod node;
pub mod registry;
pub mod resolver;
pub mod sqlite;

pub use {
    document::{
        Collection, Connector, Database, Document, DocumentClient, ID_FIELD, InsertManyResult,
    },
    env::{DEFAULT_ENV_VAR_NAMES, EnvConfig, EnvResolver},
    filter::{FieldCondition, StoreFilter},
    manager::{
        ConnectionManager, ConnectionManagerFactory, DatabaseProvider, DefaultManagerFactory,
    },
    node::{PingReport, StoreNode, StoreRuntime},
    registry::ConnectionRegistry,
    resolver::{ConfigSource, EffectiveConnectionConfig, resolve_effective_config},
    sqlite::SqliteConnector,
};
