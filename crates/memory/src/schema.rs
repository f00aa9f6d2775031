//! Stored shape of a memory entry and the batch items it is built from.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    syntagma_common::{Audience, Error, Result, Scope},
    syntagma_store::Document,
};

/// A vector produced by one embedding model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Embedding {
    pub provider_key: String,
    pub model_key: String,
    pub vector: Vec<f32>,
    pub dim: usize,
}

impl Embedding {
    /// Whether both embeddings come from the same provider and model.
    pub fn same_model(&self, other: &Embedding) -> bool {
        self.provider_key == other.provider_key && self.model_key == other.model_key
    }
}

/// A persisted memory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub scope: Scope,
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
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeddings: Vec<Embedding>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Map<String, Value>>,
}

impl MemoryEntry {
    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(doc) => Ok(doc),
            other => Err(Error::store(format!(
                "memory entry serialized to a non-object: {other}"
            ))),
        }
    }

    pub fn from_document(doc: Document) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(doc))?)
    }
}

/// One element of a write batch, before inheritance and validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub scope: Option<Scope>,
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
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeddings: Vec<Embedding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Map<String, Value>>,
}

impl BatchItem {
    pub fn new(scope: Scope, text: impl Into<String>) -> Self {
        Self {
            scope: Some(scope),
            text: text.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn entry_round_trips_through_document() {
        let doc = json!({
            "_id": "e1",
            "scope": "task",
            "projectId": "p1",
            "taskId": "t1",
            "audience": "non_technical",
            "text": "ship it",
            "tags": ["release"],
            "importance": 0.7,
            "embeddings": [{
                "providerKey": "openai",
                "modelKey": "small",
                "vector": [1.0, 0.0],
                "dim": 2,
            }],
            "createdAt": "2024-01-01T00:00:00.000Z",
        });
        let entry = MemoryEntry::from_document(doc.as_object().cloned().unwrap()).unwrap();
        assert_eq!(entry.id.as_deref(), Some("e1"));
        assert_eq!(entry.scope, Scope::Task);
        assert_eq!(entry.audience, Some(Audience::NonTechnical));
        assert_eq!(entry.embeddings[0].dim, 2);
        assert_eq!(Value::Object(entry.to_document().unwrap()), doc);
    }

    #[test]
    fn unset_fields_are_not_written() {
        let entry = MemoryEntry {
            id: None,
            scope: Scope::Project,
            project_id: Some("p1".into()),
            task_id: None,
            owner_agent_id: None,
            owner_role_key: None,
            author_agent_id: None,
            author_role_key: None,
            audience: None,
            text: "note".into(),
            summary: None,
            tags: Vec::new(),
            importance: None,
            embeddings: Vec::new(),
            created_at: "2024-01-01T00:00:00.000Z".into(),
            created_by: None,
            extra: None,
        };
        let doc = entry.to_document().unwrap();
        let mut keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["createdAt", "projectId", "scope", "text"]);
    }

    #[test]
    fn batch_item_tolerates_missing_text_and_scope() {
        let item: BatchItem = serde_json::from_value(json!({"projectId": "p1"})).unwrap();
        assert!(item.scope.is_none());
        assert!(item.text.is_empty());
    }
}
