//! Domain enums shared between configuration and the memory engines.

use serde::{Deserialize, Serialize};

/// Sharing boundary of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Project,
    Task,
    Personal,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Task => "task",
            Self::Personal => "personal",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intended readership of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Technical,
    NonTechnical,
    Mixed,
    Any,
}

impl Audience {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::NonTechnical => "non_technical",
            Self::Mixed => "mixed",
            Self::Any => "any",
        }
    }
}

/// Field a query result can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Similarity,
    CreatedAt,
    Importance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One ordering rule; rules are applied in sequence, each breaking ties left by the previous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortRule {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortRule {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn wire_names() {
        assert_eq!(serde_json::to_value(Scope::Personal).unwrap(), json!("personal"));
        assert_eq!(
            serde_json::to_value(Audience::NonTechnical).unwrap(),
            json!("non_technical")
        );
        let rule: SortRule =
            serde_json::from_value(json!({"field": "createdAt", "order": "asc"})).unwrap();
        assert_eq!(rule, SortRule::new(SortField::CreatedAt, SortOrder::Asc));
    }

    #[test]
    fn scope_display_matches_wire_name() {
        for scope in [Scope::Project, Scope::Task, Scope::Personal] {
            assert_eq!(
                serde_json::to_value(scope).unwrap(),
                json!(scope.to_string())
            );
        }
    }
}
