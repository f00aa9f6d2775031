//! Document filters with per-field operator sets.
//!
//! The operators follow the usual document-store conventions: equality and
//! `$in` match array fields by membership, `$all` needs every value present,
//! `$gte`/`$lte` compare numbers numerically and strings lexicographically.
//! A missing field never matches.

use std::{cmp::Ordering, collections::BTreeMap};

use {
    serde::Serialize,
    serde_json::{Map, Value, json},
};

use crate::document::Document;

/// Operators applied to one field. Every present operator must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldCondition {
    #[serde(rename = "$eq", skip_serializing_if = "Option::is_none")]
    pub eq: Option<Value>,
    #[serde(rename = "$in", skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Value>>,
    #[serde(rename = "$all", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Value>>,
    #[serde(rename = "$gte", skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(rename = "$lte", skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

impl FieldCondition {
    fn is_plain_eq(&self) -> bool {
        self.eq.is_some()
            && self.any_of.is_none()
            && self.all_of.is_none()
            && self.gte.is_none()
            && self.lte.is_none()
    }

    fn matches(&self, value: &Value) -> bool {
        if let Some(expected) = &self.eq
            && !contains_or_equals(value, expected)
        {
            return false;
        }
        if let Some(candidates) = &self.any_of
            && !candidates.iter().any(|c| contains_or_equals(value, c))
        {
            return false;
        }
        if let Some(required) = &self.all_of
            && !required.iter().all(|r| contains_or_equals(value, r))
        {
            return false;
        }
        if let Some(bound) = &self.gte
            && !matches!(compare(value, bound), Some(Ordering::Greater | Ordering::Equal))
        {
            return false;
        }
        if let Some(bound) = &self.lte
            && !matches!(compare(value, bound), Some(Ordering::Less | Ordering::Equal))
        {
            return false;
        }
        true
    }
}

/// A conjunction of field conditions plus an optional full-text term.
///
/// The text term is not evaluated by [`StoreFilter::matches`]; backends
/// resolve it with their own text index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreFilter {
    fields: BTreeMap<String, FieldCondition>,
    text_search: Option<String>,
}

impl StoreFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn field(&mut self, name: &str) -> &mut FieldCondition {
        self.fields.entry(name.to_string()).or_default()
    }

    pub fn eq(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.field(name).eq = Some(value.into());
        self
    }

    pub fn any_of(mut self, name: &str, values: Vec<Value>) -> Self {
        self.field(name).any_of = Some(values);
        self
    }

    pub fn all_of(mut self, name: &str, values: Vec<Value>) -> Self {
        self.field(name).all_of = Some(values);
        self
    }

    pub fn gte(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.field(name).gte = Some(value.into());
        self
    }

    pub fn lte(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.field(name).lte = Some(value.into());
        self
    }

    /// Set the full-text term. Blank terms are ignored.
    pub fn text(mut self, term: &str) -> Self {
        let trimmed = term.trim();
        self.text_search = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn text_search(&self) -> Option<&str> {
        self.text_search.as_deref()
    }

    pub fn condition(&self, name: &str) -> Option<&FieldCondition> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.text_search.is_none()
    }

    /// Whether `doc` satisfies every field condition.
    pub fn matches(&self, doc: &Document) -> bool {
        self.fields.iter().all(|(name, condition)| match doc.get(name) {
            None | Some(Value::Null) => false,
            Some(value) => condition.matches(value),
        })
    }

    /// Render as a Mongo-style filter document, e.g. for logging.
    pub fn to_document(&self) -> Value {
        let mut out = Map::new();
        for (name, condition) in &self.fields {
            let rendered = match (&condition.eq, condition.is_plain_eq()) {
                (Some(value), true) => value.clone(),
                _ => serde_json::to_value(condition).unwrap_or(Value::Null),
            };
            out.insert(name.clone(), rendered);
        }
        if let Some(term) = &self.text_search {
            out.insert("$text".into(), json!({ "$search": term }));
        }
        Value::Object(out)
    }
}

fn contains_or_equals(value: &Value, expected: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        other => values_equal(other, expected),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(value: &Value, bound: &Value) -> Option<Ordering> {
    match (value, bound) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.as_str().cmp(y.as_str())),
        _ => None,
    }
}
