//! Merge node-supplied and environment-supplied connection settings.

use {
    serde::Serialize,
    syntagma_config::{DEFAULT_DB_NAME, StoreNodeDef},
};

use crate::env::EnvConfig;

/// Where the effective URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Env,
    Node,
}

/// Fully resolved connection target. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConnectionConfig {
    pub url: String,
    pub db_name: String,
    pub source: ConfigSource,
    pub env_var_name: String,
    /// Raw candidates, kept for diagnostics whichever one was chosen.
    pub raw_from_env: Option<String>,
    pub raw_from_node: Option<String>,
}

/// Apply the URL precedence rules:
///
/// 1. `prefer_env_url` and an environment URL → environment.
/// 2. a non-empty node URL → node.
/// 3. an environment URL → environment.
/// 4. otherwise an empty URL, sourced per `prefer_env_url`.
pub fn resolve_effective_config(def: &StoreNodeDef, env: &EnvConfig) -> EffectiveConnectionConfig {
    let env_url = env.url_from_env.as_deref().unwrap_or("");
    let node_url = def.url.as_deref().map(str::trim).unwrap_or("");
    let db_name = non_blank(def.db_name.as_deref()).unwrap_or(DEFAULT_DB_NAME);
    let env_var_name = non_blank(def.env_var_name.as_deref()).unwrap_or(env.env_var_name.as_str());

    let (url, source) = if def.prefer_env_url && !env_url.is_empty() {
        (env_url, ConfigSource::Env)
    } else if !node_url.is_empty() {
        (node_url, ConfigSource::Node)
    } else if !env_url.is_empty() {
        (env_url, ConfigSource::Env)
    } else if def.prefer_env_url {
        ("", ConfigSource::Env)
    } else {
        ("", ConfigSource::Node)
    };

    EffectiveConnectionConfig {
        url: url.to_string(),
        db_name: db_name.to_string(),
        source,
        env_var_name: env_var_name.to_string(),
        raw_from_env: (!env_url.is_empty()).then(|| env_url.to_string()),
        raw_from_node: (!node_url.is_empty()).then(|| node_url.to_string()),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
