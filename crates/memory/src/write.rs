//! Batch writer: per-item normalization followed by one best-effort bulk insert.

use std::{collections::HashSet, sync::Arc};

use {
    chrono::{SecondsFormat, Utc},
    serde::Serialize,
    serde_json::Value,
    syntagma_common::{Error, Result, Scope},
    syntagma_config::MemWriteNodeConfig,
    syntagma_store::{ConnectionRegistry, DatabaseProvider, InsertManyResult},
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use syntagma_metrics::{counter, labels, memory as memory_metrics};

use crate::{
    envelope::{RequestContext, WriteRequest, WriteResponse, malformed_request},
    schema::{BatchItem, MemoryEntry},
};

/// Outcome of one batch; `items` has one record per batch element, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub inserted_count: usize,
    pub items: Vec<WriteResultItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResultItem {
    pub ok: bool,
    pub original_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WriteResultItem {
    fn accepted(original_index: usize) -> Self {
        Self {
            ok: true,
            original_index,
            entry_id: None,
            error_message: None,
        }
    }

    fn rejected(original_index: usize, reason: &Error) -> Self {
        Self {
            ok: false,
            original_index,
            entry_id: None,
            error_message: Some(reason.to_string()),
        }
    }
}

/// Apply context inheritance and scope rules to one batch item.
pub fn normalize_item(
    item: BatchItem,
    context: &RequestContext,
    created_by: Option<&str>,
) -> Result<MemoryEntry> {
    let project_id = item.project_id.or_else(|| context.project_id.clone());
    let task_id = item.task_id.or_else(|| context.task_id.clone());
    let owner_agent_id = item.owner_agent_id.or_else(|| context.agent_id.clone());
    let owner_role_key = item.owner_role_key.or_else(|| context.role_key.clone());
    let author_agent_id = item.author_agent_id.or_else(|| context.agent_id.clone());
    let author_role_key = item.author_role_key.or_else(|| context.role_key.clone());

    let Some(scope) = item.scope else {
        return Err(Error::validation("mem entry scope is missing"));
    };
    match scope {
        Scope::Personal
            if !present(owner_agent_id.as_deref()) && !present(owner_role_key.as_deref()) =>
        {
            return Err(Error::scope_violation(
                "personal scope requires ownerAgentId or ownerRoleKey",
            ));
        },
        Scope::Project if !present(project_id.as_deref()) => {
            return Err(Error::scope_violation("project scope requires projectId"));
        },
        Scope::Task if !present(project_id.as_deref()) || !present(task_id.as_deref()) => {
            return Err(Error::scope_violation(
                "task scope requires projectId and taskId",
            ));
        },
        _ => {},
    }
    if item.text.is_empty() {
        return Err(Error::validation("mem entry text is empty"));
    }

    let mut seen = HashSet::new();
    let tags = item
        .tags
        .into_iter()
        .filter(|tag| seen.insert(tag.clone()))
        .collect();

    Ok(MemoryEntry {
        id: None,
        scope,
        project_id,
        task_id,
        owner_agent_id,
        owner_role_key,
        author_agent_id,
        author_role_key,
        audience: item.audience,
        text: item.text,
        summary: item.summary,
        tags,
        importance: item.importance,
        embeddings: item.embeddings,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        created_by: created_by.map(str::to_string),
        extra: item.extra,
    })
}

/// Decode one raw batch element.
pub fn parse_batch_item(raw: &Value) -> Result<BatchItem> {
    serde_json::from_value(raw.clone())
        .map_err(|e| Error::validation(format!("invalid mem entry: {e}")))
}

fn present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Writes memory entries into one collection of the node's store.
pub struct MemWriter {
    config: MemWriteNodeConfig,
    provider: Option<Arc<dyn DatabaseProvider>>,
}

impl MemWriter {
    pub fn new(config: MemWriteNodeConfig, provider: Arc<dyn DatabaseProvider>) -> Self {
        Self {
            config,
            provider: Some(provider),
        }
    }

    /// Writer bound to whatever manager the registry holds for `store_id`.
    ///
    /// Without one, every request is refused with a configuration error.
    pub fn from_registry(
        config: MemWriteNodeConfig,
        registry: &ConnectionRegistry,
        store_id: &str,
    ) -> Self {
        let provider = registry
            .get_manager(store_id)
            .map(|manager| manager as Arc<dyn DatabaseProvider>);
        if provider.is_none() {
            warn!(store_id, "no store connection registered for mem writer");
        }
        Self { config, provider }
    }

    pub fn config(&self) -> &MemWriteNodeConfig {
        &self.config
    }

    /// Normalize and insert `batch`. Never fails as a whole; see [`WriteResult`].
    pub async fn handle_batch(
        &self,
        batch: Vec<BatchItem>,
        context: &RequestContext,
        created_by: Option<&str>,
    ) -> WriteResult {
        let normalized = batch
            .into_iter()
            .map(|item| normalize_item(item, context, created_by))
            .collect();
        self.write_normalized(normalized).await
    }

    /// Decode and handle a raw host message. A message that is not a valid
    /// write request (for example a `memBatch` that is not an array) is
    /// answered with a validation `errorMessage`.
    pub async fn handle_value(&self, raw: Value) -> WriteResponse {
        match serde_json::from_value::<WriteRequest>(raw.clone()) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                let err = malformed_request(&e);
                warn!(error = %err, "write request rejected");
                WriteResponse::rejected(raw, &err)
            },
        }
    }

    /// Handle a host request. The response always echoes the request.
    pub async fn handle(&self, request: WriteRequest) -> WriteResponse {
        if self.provider.is_none() {
            let err = Error::configuration("mem writer has no store connection configured");
            error!(error = %err, "write request refused");
            return WriteResponse {
                request,
                mem_write_result: WriteResult::default(),
                error_message: Some(err.to_string()),
            };
        }

        let created_by = request.created_by();
        let normalized = request
            .mem_batch
            .iter()
            .flatten()
            .map(|raw| {
                parse_batch_item(raw)
                    .and_then(|item| normalize_item(item, &request.context, created_by))
            })
            .collect();
        let result = self.write_normalized(normalized).await;

        WriteResponse {
            request,
            mem_write_result: result,
            error_message: None,
        }
    }

    async fn write_normalized(&self, normalized: Vec<Result<MemoryEntry>>) -> WriteResult {
        if normalized.is_empty() {
            debug!("empty mem batch");
            return WriteResult::default();
        }

        let mut items = Vec::with_capacity(normalized.len());
        let mut entries = Vec::new();
        // Position in `entries` of each accepted item, by original index.
        let mut insert_pos = Vec::with_capacity(normalized.len());
        for (index, outcome) in normalized.into_iter().enumerate() {
            match outcome {
                Ok(entry) => {
                    insert_pos.push(Some(entries.len()));
                    entries.push(entry);
                    items.push(WriteResultItem::accepted(index));
                },
                Err(e) => {
                    warn!(index, kind = e.kind(), error = %e, "mem entry rejected");
                    insert_pos.push(None);
                    items.push(WriteResultItem::rejected(index, &e));
                },
            }
        }

        #[cfg(feature = "metrics")]
        counter!(
            memory_metrics::WRITE_BATCHES_TOTAL,
            labels::COLLECTION => self.config.collection_name.clone()
        )
        .increment(1);

        if entries.is_empty() {
            info!(
                collection = %self.config.collection_name,
                rejected = items.len(),
                "mem batch had no valid entries"
            );
            record_items(&self.config.collection_name, &items);
            return WriteResult {
                inserted_count: 0,
                items,
            };
        }

        let inserted_count = match self.insert(entries).await {
            Ok(inserted) => {
                for (item, pos) in items.iter_mut().zip(&insert_pos) {
                    if let Some(pos) = pos {
                        item.entry_id = inserted.inserted_ids.get(*pos).cloned();
                    }
                }
                inserted.inserted_count
            },
            Err(e) => {
                error!(
                    collection = %self.config.collection_name,
                    error = %e,
                    "mem batch insert failed"
                );
                for item in items.iter_mut().filter(|item| item.ok) {
                    *item = WriteResultItem::rejected(item.original_index, &e);
                }
                0
            },
        };

        info!(
            collection = %self.config.collection_name,
            total = items.len(),
            inserted = inserted_count,
            "mem batch written"
        );
        record_items(&self.config.collection_name, &items);
        WriteResult {
            inserted_count,
            items,
        }
    }

    async fn insert(&self, entries: Vec<MemoryEntry>) -> Result<InsertManyResult> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::configuration("mem writer has no store connection configured"))?;
        let docs = entries
            .iter()
            .map(MemoryEntry::to_document)
            .collect::<Result<Vec<_>>>()?;
        let db = provider.database().await?;
        db.collection(&self.config.collection_name)
            .insert_many(docs)
            .await
    }
}

#[cfg(feature = "metrics")]
fn record_items(collection: &str, items: &[WriteResultItem]) {
    let ok = items.iter().filter(|item| item.ok).count() as u64;
    counter!(
        memory_metrics::WRITE_ITEMS_TOTAL,
        labels::COLLECTION => collection.to_owned(),
        labels::STATUS => "ok"
    )
    .increment(ok);
    counter!(
        memory_metrics::WRITE_ITEMS_TOTAL,
        labels::COLLECTION => collection.to_owned(),
        labels::STATUS => "failed"
    )
    .increment(items.len() as u64 - ok);
}

#[cfg(not(feature = "metrics"))]
fn record_items(_collection: &str, _items: &[WriteResultItem]) {}
