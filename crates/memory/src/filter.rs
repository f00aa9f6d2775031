//! Translation of a [`MemQueryFilter`] into a [`StoreFilter`].

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
    syntagma_common::{Audience, Scope},
    syntagma_config::MemQueryNodeConfig,
    syntagma_store::StoreFilter,
};

use crate::envelope::RequestContext;

/// Scope used when neither the request nor the node names any.
pub const FALLBACK_SCOPE: Scope = Scope::Task;

/// Field constraints of a memory query. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemQueryFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_role_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_role_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags_include_any: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags_include_all: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_importance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_importance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_to: Option<String>,
}

/// Explicit scopes win, then the node defaults, then [`FALLBACK_SCOPE`].
pub fn resolve_scopes(config: &MemQueryNodeConfig, filter: &MemQueryFilter) -> Vec<Scope> {
    if !filter.scopes.is_empty() {
        filter.scopes.clone()
    } else if !config.default_scopes.is_empty() {
        config.default_scopes.clone()
    } else {
        vec![FALLBACK_SCOPE]
    }
}

/// Fill identity fields the filter left unset (or blank) from the request context.
///
/// The context agent and role constrain the owner, not the author.
pub fn with_context_defaults(filter: &MemQueryFilter, context: &RequestContext) -> MemQueryFilter {
    let pick = |explicit: &Option<String>, fallback: &Option<String>| {
        non_blank(explicit).or_else(|| non_blank(fallback))
    };
    MemQueryFilter {
        project_id: pick(&filter.project_id, &context.project_id),
        task_id: pick(&filter.task_id, &context.task_id),
        owner_agent_id: pick(&filter.owner_agent_id, &context.agent_id),
        owner_role_key: pick(&filter.owner_role_key, &context.role_key),
        author_agent_id: non_blank(&filter.author_agent_id),
        author_role_key: non_blank(&filter.author_role_key),
        ..filter.clone()
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Build the store filter for `scopes`, `filter` and an optional text term.
pub fn build_store_filter(
    scopes: &[Scope],
    filter: &MemQueryFilter,
    text_search: Option<&str>,
) -> StoreFilter {
    let mut out = match scopes {
        [single] => StoreFilter::new().eq("scope", single.as_str()),
        many => StoreFilter::new().any_of(
            "scope",
            many.iter().map(|s| Value::from(s.as_str())).collect(),
        ),
    };

    let identity = [
        ("projectId", &filter.project_id),
        ("taskId", &filter.task_id),
        ("ownerAgentId", &filter.owner_agent_id),
        ("ownerRoleKey", &filter.owner_role_key),
        ("authorAgentId", &filter.author_agent_id),
        ("authorRoleKey", &filter.author_role_key),
    ];
    for (field, value) in identity {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            out = out.eq(field, value);
        }
    }
    if let Some(audience) = filter.audience {
        out = out.eq("audience", audience.as_str());
    }

    if let Some(min) = filter.min_importance {
        out = out.gte("importance", min);
    }
    if let Some(max) = filter.max_importance {
        out = out.lte("importance", max);
    }
    if let Some(from) = filter.created_at_from.as_deref().filter(|v| !v.is_empty()) {
        out = out.gte("createdAt", from);
    }
    if let Some(to) = filter.created_at_to.as_deref().filter(|v| !v.is_empty()) {
        out = out.lte("createdAt", to);
    }

    if !filter.tags_include_any.is_empty() {
        out = out.any_of("tags", tag_values(&filter.tags_include_any));
    }
    if !filter.tags_include_all.is_empty() {
        out = out.all_of("tags", tag_values(&filter.tags_include_all));
    }

    if let Some(term) = text_search {
        out = out.text(term);
    }
    out
}

fn tag_values(tags: &[String]) -> Vec<Value> {
    tags.iter().map(|t| Value::String(t.clone())).collect()
}
