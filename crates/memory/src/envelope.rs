//! Request and response messages exchanged with the host.
//!
//! Fields the engines do not know about are kept in `extensions` and echoed
//! back unchanged on the response.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    syntagma_common::Error,
};

use crate::{query::MemQuery, query::MemQueryResult, write::WriteResult};

/// Identity fields a request carries for its items and filters to inherit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    /// Raw batch items; each is decoded on its own so one malformed item
    /// fails alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_batch: Option<Vec<Value>>,
    #[serde(flatten)]
    pub context: RequestContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestMeta>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl WriteRequest {
    pub fn created_by(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.created_by.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    #[serde(flatten)]
    pub request: WriteRequest,
    pub mem_write_result: WriteResult,
    /// Set only when the whole request was refused before reaching storage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WriteResponse {
    /// Response to a message that could not be decoded as a write request.
    pub fn rejected(raw: Value, error: &Error) -> Self {
        Self {
            request: WriteRequest {
                extensions: echo_fields(raw, &["memWriteResult", "errorMessage"]),
                ..Default::default()
            },
            mem_write_result: WriteResult::default(),
            error_message: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_query: Option<MemQuery>,
    #[serde(flatten)]
    pub context: RequestContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestMeta>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(flatten)]
    pub request: QueryRequest,
    pub mem_query_result: MemQueryResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl QueryResponse {
    /// Response to a message that could not be decoded as a query request.
    pub fn rejected(raw: Value, error: &Error) -> Self {
        Self {
            request: QueryRequest {
                extensions: echo_fields(raw, &["memQueryResult", "errorMessage"]),
                ..Default::default()
            },
            mem_query_result: MemQueryResult::default(),
            error_message: Some(error.to_string()),
        }
    }
}

/// Validation error for a message that does not decode into a request.
pub fn malformed_request(err: &serde_json::Error) -> Error {
    Error::validation(format!("malformed request: {err}"))
}

/// Top-level fields of `raw`, minus the ones the response sets itself.
fn echo_fields(raw: Value, reserved: &[&str]) -> Map<String, Value> {
    let Value::Object(mut fields) = raw else {
        return Map::new();
    };
    for key in reserved {
        fields.remove(*key);
    }
    fields
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn unknown_fields_are_kept_and_echoed() {
        let request: WriteRequest = serde_json::from_value(json!({
            "memBatch": [{"scope": "project", "text": "x"}],
            "projectId": "p1",
            "agentId": "a1",
            "meta": {"createdBy": "planner", "traceId": "t-9"},
            "_msgid": "abc",
            "topic": "memory",
        }))
        .unwrap();

        assert_eq!(request.context.project_id.as_deref(), Some("p1"));
        assert_eq!(request.context.agent_id.as_deref(), Some("a1"));
        assert_eq!(request.created_by(), Some("planner"));
        assert_eq!(request.extensions.len(), 2);
        assert_eq!(request.extensions["_msgid"], json!("abc"));

        let response = WriteResponse {
            request,
            mem_write_result: WriteResult::default(),
            error_message: None,
        };
        let rendered = serde_json::to_value(&response).unwrap();
        assert_eq!(rendered["topic"], json!("memory"));
        assert_eq!(rendered["projectId"], json!("p1"));
        assert_eq!(rendered["meta"]["traceId"], json!("t-9"));
        assert_eq!(
            rendered["memWriteResult"],
            json!({"insertedCount": 0, "items": []})
        );
        assert!(rendered.get("errorMessage").is_none());
    }

    #[test]
    fn rejected_query_echoes_raw_fields() {
        let raw = json!({
            "_msgid": "m1",
            "projectId": 7,
            "memQuery": {"limit": "ten"},
            "errorMessage": "stale",
        });
        let err = serde_json::from_value::<QueryRequest>(raw.clone()).unwrap_err();
        let response = QueryResponse::rejected(raw, &malformed_request(&err));

        let rendered = serde_json::to_value(&response).unwrap();
        assert_eq!(rendered["_msgid"], json!("m1"));
        assert_eq!(rendered["projectId"], json!(7));
        assert_eq!(rendered["memQuery"], json!({"limit": "ten"}));
        assert!(
            rendered["errorMessage"]
                .as_str()
                .unwrap()
                .starts_with("malformed request: ")
        );
        assert_eq!(
            rendered["memQueryResult"],
            json!({"total": 0, "limit": 0, "offset": 0, "items": []})
        );
    }

    #[test]
    fn rejected_write_from_non_object_message() {
        let response = WriteResponse::rejected(json!([1, 2]), &Error::validation("bad"));
        let rendered = serde_json::to_value(&response).unwrap();
        assert_eq!(
            rendered,
            json!({
                "memWriteResult": {"insertedCount": 0, "items": []},
                "errorMessage": "bad",
            })
        );
    }

    #[test]
    fn query_request_without_mem_query() {
        let request: QueryRequest = serde_json::from_value(json!({"roleKey": "reviewer"})).unwrap();
        assert!(request.mem_query.is_none());
        assert_eq!(request.context.role_key.as_deref(), Some("reviewer"));
        assert!(request.extensions.is_empty());
    }
}
