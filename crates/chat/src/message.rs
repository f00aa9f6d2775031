//! Chat messages as they arrive from transports and as they are stored.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    syntagma_common::{Error, Result},
    syntagma_store::Document,
};

pub const CHAT_KIND_PROJECT_GENERAL: &str = "project_general";
pub const CHAT_KIND_PROJECT_MUMBLE: &str = "project_mumble";
pub const CHAT_KIND_PROJECT_OPERATOR: &str = "project_operator";
pub const CHAT_KIND_DIRECT: &str = "direct";
pub const CHAT_KIND_GROUP: &str = "group";
pub const CHAT_KIND_SYSTEM: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Human,
    Agent,
    System,
}

impl MessageRole {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "human" => Some(Self::Human),
            "agent" => Some(Self::Agent),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

impl MessageDirection {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "incoming" => Some(Self::Incoming),
            "outgoing" => Some(Self::Outgoing),
            _ => None,
        }
    }
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessagePart {
    Text {
        text: String,
    },
    Markdown {
        text: String,
    },
    Html {
        html: String,
    },
    #[serde(rename_all = "camelCase")]
    Attachment {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size_bytes: Option<u64>,
    },
}

/// Plain text of the non-blank `text` parts, trimmed and joined by newlines.
pub fn text_from_parts(parts: &[MessagePart]) -> Option<String> {
    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|part| match part {
            MessagePart::Text { text } => Some(text.trim()),
            _ => None,
        })
        .filter(|text| !text.is_empty())
        .collect();
    (!texts.is_empty()).then(|| texts.join("\n"))
}

/// An `@call-sign` reference inside the message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    pub raw: String,
    pub call_sign: String,
    pub offset: u64,
    pub length: u64,
}

/// Where a message lives on an external transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTransportBinding {
    pub transport_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_external_id: Option<String>,
    pub message_external_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAuthor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_username: Option<String>,
}

impl ChatAuthor {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The part of the author stored with each message.
    pub fn to_ref(&self) -> AuthorRef {
        AuthorRef {
            participant_id: self.participant_id.clone(),
            display_name: self.display_name.clone(),
            kind: self.kind.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Transport metadata of a message, reduced to the fields that passed checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageMeta {
    pub project_id: Option<String>,
    pub chat_kind: Option<String>,
    pub direction: Option<MessageDirection>,
    pub role: Option<MessageRole>,
    pub reply_to_message_id: Option<String>,
    pub correlation_id: Option<String>,
    pub mentions: Vec<Mention>,
    pub transport_bindings: Vec<MessageTransportBinding>,
    pub raw_transport_payload: Option<Value>,
    pub author: Option<ChatAuthor>,
    pub created_at: Option<String>,
}

impl ChatMessageMeta {
    /// Keep only well-formed fields of a raw `meta` object.
    ///
    /// Strings are trimmed and blank ones dropped; unknown roles and
    /// directions are dropped; bindings without `transportKey` and
    /// `messageExternalId` are skipped. `None` when nothing survives.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let meta = Self {
            project_id: trimmed(obj, "projectId"),
            chat_kind: trimmed(obj, "chatKind"),
            direction: obj
                .get("direction")
                .and_then(Value::as_str)
                .and_then(MessageDirection::parse),
            role: obj
                .get("role")
                .and_then(Value::as_str)
                .and_then(MessageRole::parse),
            reply_to_message_id: trimmed(obj, "replyToMessageId"),
            correlation_id: trimmed(obj, "correlationId"),
            mentions: objects(obj, "mentions").filter_map(mention).collect(),
            transport_bindings: objects(obj, "transportBindings")
                .filter_map(transport_binding)
                .collect(),
            raw_transport_payload: obj.get("rawTransportPayload").cloned(),
            author: obj
                .get("author")
                .and_then(Value::as_object)
                .map(author)
                .filter(|a| !a.is_empty()),
            created_at: trimmed(obj, "createdAt"),
        };
        (meta != Self::default()).then_some(meta)
    }
}

fn trimmed(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn objects<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> {
    obj.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn mention(obj: &Map<String, Value>) -> Option<Mention> {
    Some(Mention {
        raw: trimmed(obj, "raw")?,
        call_sign: trimmed(obj, "callSign")?,
        offset: obj.get("offset").and_then(Value::as_u64)?,
        length: obj.get("length").and_then(Value::as_u64)?,
    })
}

fn transport_binding(obj: &Map<String, Value>) -> Option<MessageTransportBinding> {
    Some(MessageTransportBinding {
        transport_key: trimmed(obj, "transportKey")?,
        chat_external_id: trimmed(obj, "chatExternalId"),
        message_external_id: trimmed(obj, "messageExternalId")?,
    })
}

fn author(obj: &Map<String, Value>) -> ChatAuthor {
    ChatAuthor {
        participant_id: trimmed(obj, "participantId"),
        display_name: trimmed(obj, "displayName"),
        // Kind is kept verbatim; only blank values are dropped.
        kind: obj
            .get("kind")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_owned),
        role_key: trimmed(obj, "roleKey"),
        agent_id: trimmed(obj, "agentId"),
        operator_key: trimmed(obj, "operatorKey"),
        transport_key: trimmed(obj, "transportKey"),
        transport_user_id: trimmed(obj, "transportUserId"),
        transport_chat_id: trimmed(obj, "transportChatId"),
        transport_username: trimmed(obj, "transportUsername"),
    }
}

/// A stored chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub chat_id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<MessageDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<MessagePart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<Mention>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transport_bindings: Vec<MessageTransportBinding>,
    pub created_at: String,
}

/// Serialize a record into a store document.
pub fn to_document<T: Serialize>(record: &T) -> Result<Document> {
    match serde_json::to_value(record)? {
        Value::Object(doc) => Ok(doc),
        other => Err(Error::store(format!(
            "chat record serialized to a non-object: {other}"
        ))),
    }
}
