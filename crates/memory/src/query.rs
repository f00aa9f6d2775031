//! Memory query engine: filter, score, truncate, sort, page.

use std::{sync::Arc, time::Instant};

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
    syntagma_common::{Error, Result, SortField, SortOrder, SortRule},
    syntagma_config::MemQueryNodeConfig,
    syntagma_store::{ConnectionRegistry, DatabaseProvider},
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use syntagma_metrics::{counter, histogram, labels, memory as memory_metrics};

use crate::{
    envelope::{QueryRequest, QueryResponse, RequestContext, malformed_request},
    filter::{MemQueryFilter, build_store_filter, resolve_scopes, with_context_defaults},
    schema::{Embedding, MemoryEntry},
    search::{MemQueryResultItem, best_similarity, sort_results, truncate_top_k},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MemQueryFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_embedding: Option<Embedding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_config: Option<VectorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortRule>,
    #[serde(default)]
    pub include_embeddings: bool,
    #[serde(default)]
    pub include_extra: bool,
}

/// A page of ranked entries. `total` counts every candidate before paging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemQueryResult {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub items: Vec<MemQueryResultItem>,
}

/// Page size for a requested limit: clamped to the node maximum, with the
/// node default standing in for absent or non-positive requests.
pub fn effective_limit(config: &MemQueryNodeConfig, requested: Option<i64>) -> usize {
    let max = config.effective_max_limit();
    match requested.and_then(|l| usize::try_from(l).ok()).filter(|l| *l > 0) {
        Some(limit) => limit.min(max),
        None => config.effective_default_limit().min(max),
    }
}

pub fn effective_offset(requested: Option<i64>) -> usize {
    requested
        .and_then(|o| usize::try_from(o).ok())
        .unwrap_or_default()
}

/// Request rules, then the node default, then similarity or recency.
pub fn effective_sort(
    config: &MemQueryNodeConfig,
    requested: &[SortRule],
    scored: bool,
) -> Vec<SortRule> {
    if !requested.is_empty() {
        return requested.to_vec();
    }
    if let Some(rule) = config.default_sort() {
        return vec![rule];
    }
    let field = if scored {
        SortField::Similarity
    } else {
        SortField::CreatedAt
    };
    vec![SortRule::new(field, SortOrder::Desc)]
}

/// Runs memory queries against one collection of the node's store.
pub struct MemQueryEngine {
    config: MemQueryNodeConfig,
    provider: Option<Arc<dyn DatabaseProvider>>,
}

impl MemQueryEngine {
    pub fn new(config: MemQueryNodeConfig, provider: Arc<dyn DatabaseProvider>) -> Self {
        Self {
            config,
            provider: Some(provider),
        }
    }

    /// Engine bound to whatever manager the registry holds for `store_id`.
    pub fn from_registry(
        config: MemQueryNodeConfig,
        registry: &ConnectionRegistry,
        store_id: &str,
    ) -> Self {
        let provider = registry
            .get_manager(store_id)
            .map(|manager| manager as Arc<dyn DatabaseProvider>);
        if provider.is_none() {
            warn!(store_id, "no store connection registered for mem query");
        }
        Self { config, provider }
    }

    pub fn config(&self) -> &MemQueryNodeConfig {
        &self.config
    }

    pub async fn handle_query(
        &self,
        query: &MemQuery,
        context: &RequestContext,
    ) -> Result<MemQueryResult> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::configuration("mem query has no store connection configured"))?;

        let explicit = query.filter.clone().unwrap_or_default();
        let scopes = resolve_scopes(&self.config, &explicit);
        let filter = with_context_defaults(&explicit, context);

        let limit = effective_limit(&self.config, query.limit);
        let offset = effective_offset(query.offset);

        let query_embedding = query
            .query_embedding
            .as_ref()
            .filter(|_| self.config.enable_vector_search);
        let vector = query.vector_config.clone().unwrap_or_default();
        let top_k = vector
            .top_k
            .or(self.config.default_top_k)
            .and_then(|k| usize::try_from(k).ok())
            .filter(|k| *k > 0);
        let threshold = vector
            .similarity_threshold
            .or(self.config.default_similarity_threshold);
        let sort = effective_sort(&self.config, &query.sort, query_embedding.is_some());

        let store_filter = build_store_filter(&scopes, &filter, query.text_search.as_deref());
        debug!(
            collection = %self.config.collection_name,
            filter = %store_filter.to_document(),
            limit,
            offset,
            "running mem query"
        );

        let db = provider.database().await?;
        let docs = db
            .collection(&self.config.collection_name)
            .find(&store_filter)
            .await?;
        let fetched = docs.len();

        let mut candidates = Vec::with_capacity(fetched);
        for doc in docs {
            let entry = match MemoryEntry::from_document(doc) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping malformed stored mem entry");
                    continue;
                },
            };
            let similarity_score = match query_embedding {
                Some(embedding) => {
                    let Some(score) = best_similarity(&entry, embedding) else {
                        continue;
                    };
                    if threshold.is_some_and(|t| score < t) {
                        continue;
                    }
                    Some(score)
                },
                None => None,
            };
            candidates.push(MemQueryResultItem {
                entry,
                similarity_score,
            });
        }

        if query_embedding.is_some()
            && let Some(k) = top_k
        {
            truncate_top_k(&mut candidates, k);
        }
        sort_results(&mut candidates, &sort);

        let total = candidates.len();
        let offset = offset.min(total);
        let items: Vec<MemQueryResultItem> = candidates
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|mut item| {
                if !query.include_embeddings {
                    item.entry.embeddings.clear();
                }
                if !query.include_extra {
                    item.entry.extra = None;
                }
                item
            })
            .collect();

        debug!(fetched, total, returned = items.len(), "mem query ranked");
        Ok(MemQueryResult {
            total,
            limit,
            offset,
            items,
        })
    }

    /// Decode and handle a raw host message. A message that is not a valid
    /// query request is answered with a validation `errorMessage`.
    pub async fn handle_value(&self, raw: Value) -> QueryResponse {
        match serde_json::from_value::<QueryRequest>(raw.clone()) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                let err = malformed_request(&e);
                warn!(error = %err, "query request rejected");
                #[cfg(feature = "metrics")]
                counter!(
                    memory_metrics::QUERIES_TOTAL,
                    labels::COLLECTION => self.config.collection_name.clone(),
                    labels::STATUS => "rejected"
                )
                .increment(1);
                QueryResponse::rejected(raw, &err)
            },
        }
    }

    /// Handle a host request. Failures come back as `errorMessage` with an empty result.
    pub async fn handle(&self, request: QueryRequest) -> QueryResponse {
        let started = Instant::now();
        let query = request.mem_query.clone().unwrap_or_default();
        let outcome = self.handle_query(&query, &request.context).await;
        let elapsed = started.elapsed();

        #[cfg(feature = "metrics")]
        {
            let status = if outcome.is_ok() { "ok" } else { "failed" };
            counter!(
                memory_metrics::QUERIES_TOTAL,
                labels::COLLECTION => self.config.collection_name.clone(),
                labels::STATUS => status
            )
            .increment(1);
            histogram!(memory_metrics::QUERY_DURATION_SECONDS).record(elapsed.as_secs_f64());
        }

        match outcome {
            Ok(result) => {
                info!(
                    collection = %self.config.collection_name,
                    total = result.total,
                    returned = result.items.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "mem query completed"
                );
                QueryResponse {
                    request,
                    mem_query_result: result,
                    error_message: None,
                }
            },
            Err(e) => {
                error!(
                    collection = %self.config.collection_name,
                    kind = e.kind(),
                    error = %e,
                    "mem query failed"
                );
                QueryResponse {
                    request,
                    mem_query_result: MemQueryResult::default(),
                    error_message: Some(e.to_string()),
                }
            },
        }
    }
}
