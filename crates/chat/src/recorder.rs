//! Persist incoming chat messages, creating their chat on first use.

use std::sync::Arc;

use {
    chrono::{SecondsFormat, Utc},
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    syntagma_common::{Error, Result},
    syntagma_config::ChatNodeConfig,
    syntagma_store::{
        Collection, ConnectionRegistry, DatabaseProvider, Document, ID_FIELD, StoreFilter,
    },
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use syntagma_metrics::{chat as chat_metrics, counter, labels};

use crate::message::{
    ChatMessageMeta, ChatMessageRecord, ChatRecord, MessagePart, text_from_parts, to_document,
};

/// Message content: plain text, structured parts, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomingChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<MessagePart>>,
}

impl IncomingChatMessage {
    fn has_content(&self) -> bool {
        self.parts.is_some() || self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// A chat message from a transport, addressed by chat id or chat key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Existing chat to append to; skips the chat lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_message: Option<IncomingChatMessage>,
    /// Raw transport metadata; filtered by [`ChatMessageMeta::from_value`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecordResult {
    pub chat_id: String,
    pub message_id: String,
    pub project_id: String,
    pub at: String,
}

/// The request echoed back, with `chatId` filled in on success.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(flatten)]
    pub request: ChatRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_record_result: Option<ChatRecordResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ChatResponse {
    /// Response to a message that could not be decoded as a chat request.
    pub fn rejected(raw: Value, error: &Error) -> Self {
        let extensions = match raw {
            Value::Object(mut fields) => {
                fields.remove("chatRecordResult");
                fields.remove("errorMessage");
                fields
            },
            _ => Map::new(),
        };
        Self {
            request: ChatRequest {
                extensions,
                ..Default::default()
            },
            chat_record_result: None,
            error_message: Some(error.to_string()),
        }
    }
}

/// Records chat transcripts into the node's store.
pub struct ChatRecorder {
    config: ChatNodeConfig,
    provider: Option<Arc<dyn DatabaseProvider>>,
}

impl ChatRecorder {
    pub fn new(config: ChatNodeConfig, provider: Arc<dyn DatabaseProvider>) -> Self {
        Self {
            config,
            provider: Some(provider),
        }
    }

    /// Recorder bound to whatever manager the registry holds for `store_id`.
    pub fn from_registry(
        config: ChatNodeConfig,
        registry: &ConnectionRegistry,
        store_id: &str,
    ) -> Self {
        let provider = registry
            .get_manager(store_id)
            .map(|manager| manager as Arc<dyn DatabaseProvider>);
        if provider.is_none() {
            warn!(store_id, "no store connection registered for chat recorder");
        }
        Self { config, provider }
    }

    pub fn config(&self) -> &ChatNodeConfig {
        &self.config
    }

    /// Store one message, resolving its chat first.
    ///
    /// The chat is `chat_id` when given. Otherwise it is looked up by project
    /// and chat key, and created when missing; without a chat key a new chat
    /// is created for every message.
    pub async fn record(&self, request: &ChatRequest) -> Result<ChatRecordResult> {
        let Some(message) = request.chat_message.as_ref().filter(|m| m.has_content()) else {
            return Err(Error::validation("incoming msg is not a valid chat message"));
        };
        let Some(provider) = self.provider.as_ref() else {
            return Err(Error::configuration(
                "chat recorder has no store connection configured",
            ));
        };

        let project_id = non_blank(request.project_id.as_deref())
            .or_else(|| non_blank(self.config.default_project_id.as_deref()))
            .ok_or_else(|| Error::validation("projectId is required for chat messages"))?;
        let chat_kind = non_blank(request.chat_kind.as_deref())
            .or_else(|| non_blank(self.config.default_chat_kind.as_deref()));
        let chat_key = non_blank(request.chat_key.as_deref())
            .or_else(|| non_blank(self.config.default_chat_key.as_deref()));

        let parts = message.parts.clone().unwrap_or_default();
        let mut text = message.text.clone().unwrap_or_default();
        if parts.is_empty() && text.trim().is_empty() {
            return Err(Error::validation("chat message has no text and no parts"));
        }
        if text.is_empty()
            && let Some(joined) = text_from_parts(&parts)
        {
            text = joined;
        }
        let meta = request.meta.as_ref().and_then(ChatMessageMeta::from_value);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let db = provider.database().await?;
        let chat_id = match non_blank(request.chat_id.as_deref()) {
            Some(chat_id) => chat_id,
            None => {
                let chats = db.collection(&self.config.chats_collection);
                self.find_or_create_chat(chats.as_ref(), &project_id, chat_key, chat_kind, &now)
                    .await?
            },
        };

        let meta = meta.unwrap_or_default();
        let record = ChatMessageRecord {
            id: None,
            chat_id: chat_id.clone(),
            project_id: project_id.clone(),
            author: meta.author.as_ref().map(|a| a.to_ref()),
            role: meta.role,
            direction: meta.direction,
            text: (!text.trim().is_empty()).then_some(text),
            parts,
            mentions: meta.mentions,
            transport_bindings: meta.transport_bindings,
            created_at: now.clone(),
        };
        let messages = db.collection(&self.config.messages_collection);
        let message_id = insert_one(messages.as_ref(), to_document(&record)?).await?;

        Ok(ChatRecordResult {
            chat_id,
            message_id,
            project_id,
            at: now,
        })
    }

    async fn find_or_create_chat(
        &self,
        chats: &dyn Collection,
        project_id: &str,
        chat_key: Option<String>,
        kind: Option<String>,
        now: &str,
    ) -> Result<String> {
        if let Some(key) = chat_key.as_deref() {
            let filter = StoreFilter::new()
                .eq("projectId", project_id)
                .eq("chatKey", key);
            if let Some(id) = chats.find(&filter).await?.first().and_then(document_id) {
                debug!(project_id, chat_key = key, chat_id = %id, "chat found");
                return Ok(id);
            }
        }

        let record = ChatRecord {
            id: None,
            project_id: project_id.to_owned(),
            chat_key,
            kind,
            title: None,
            created_at: now.to_owned(),
            updated_at: now.to_owned(),
        };
        let id = insert_one(chats, to_document(&record)?).await?;
        info!(project_id, chat_id = %id, chat_key = ?record.chat_key, "chat created");
        #[cfg(feature = "metrics")]
        counter!(chat_metrics::CHATS_CREATED_TOTAL).increment(1);
        Ok(id)
    }

    /// Decode and handle a raw host message.
    pub async fn handle_value(&self, raw: Value) -> ChatResponse {
        match serde_json::from_value::<ChatRequest>(raw.clone()) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                let err = Error::validation(format!("malformed request: {e}"));
                warn!(error = %err, "chat request rejected");
                #[cfg(feature = "metrics")]
                self.record_status("rejected");
                ChatResponse::rejected(raw, &err)
            },
        }
    }

    /// Handle a host request; failures come back as `errorMessage`.
    pub async fn handle(&self, mut request: ChatRequest) -> ChatResponse {
        match self.record(&request).await {
            Ok(result) => {
                info!(
                    project_id = %result.project_id,
                    chat_id = %result.chat_id,
                    message_id = %result.message_id,
                    "chat message saved"
                );
                #[cfg(feature = "metrics")]
                self.record_status("ok");
                request.chat_id = Some(result.chat_id.clone());
                ChatResponse {
                    request,
                    chat_record_result: Some(result),
                    error_message: None,
                }
            },
            Err(e) => {
                error!(kind = e.kind(), error = %e, "chat message not saved");
                #[cfg(feature = "metrics")]
                self.record_status("failed");
                ChatResponse {
                    request,
                    chat_record_result: None,
                    error_message: Some(e.to_string()),
                }
            },
        }
    }

    #[cfg(feature = "metrics")]
    fn record_status(&self, status: &'static str) {
        counter!(
            chat_metrics::MESSAGES_TOTAL,
            labels::COLLECTION => self.config.messages_collection.clone(),
            labels::STATUS => status
        )
        .increment(1);
    }
}

async fn insert_one(collection: &dyn Collection, doc: Document) -> Result<String> {
    collection
        .insert_many(vec![doc])
        .await?
        .inserted_ids
        .into_iter()
        .next()
        .ok_or_else(|| Error::store(format!("insert into {} returned no id", collection.name())))
}

fn document_id(doc: &Document) -> Option<String> {
    doc.get(ID_FIELD).and_then(Value::as_str).map(str::to_owned)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
