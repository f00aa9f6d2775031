//! Similarity scoring and result ordering.

use std::cmp::Ordering;

use {
    serde::{Deserialize, Serialize},
    syntagma_common::{SortField, SortOrder, SortRule},
};

use crate::schema::{Embedding, MemoryEntry};

/// Cosine similarity, or 0.0 when the vectors are empty, differ in length or
/// either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Best score of `query` against the entry's embeddings from the same model.
///
/// `None` when the entry has no embedding from that provider and model.
pub fn best_similarity(entry: &MemoryEntry, query: &Embedding) -> Option<f64> {
    entry
        .embeddings
        .iter()
        .filter(|e| e.same_model(query))
        .map(|e| cosine_similarity(&e.vector, &query.vector))
        .max_by(f64::total_cmp)
}

/// One ranked query hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemQueryResultItem {
    pub entry: MemoryEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

/// Keep the `k` most similar hits, most similar first.
pub fn truncate_top_k(items: &mut Vec<MemQueryResultItem>, k: usize) {
    if items.len() <= k {
        return;
    }
    items.sort_by(|a, b| {
        compare_optional(
            a.similarity_score,
            b.similarity_score,
            SortOrder::Desc,
            f64::total_cmp,
        )
    });
    items.truncate(k);
}

/// Stable multi-rule sort; each rule breaks the ties left by the previous ones.
pub fn sort_results(items: &mut [MemQueryResultItem], rules: &[SortRule]) {
    if rules.is_empty() {
        return;
    }
    items.sort_by(|a, b| {
        rules
            .iter()
            .map(|rule| compare_by(a, b, *rule))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

fn compare_by(a: &MemQueryResultItem, b: &MemQueryResultItem, rule: SortRule) -> Ordering {
    match rule.field {
        SortField::Similarity => compare_optional(
            a.similarity_score,
            b.similarity_score,
            rule.order,
            f64::total_cmp,
        ),
        SortField::Importance => compare_optional(
            a.entry.importance,
            b.entry.importance,
            rule.order,
            f64::total_cmp,
        ),
        SortField::CreatedAt => compare_optional(
            created_at(a),
            created_at(b),
            rule.order,
            |x: &&str, y: &&str| x.cmp(y),
        ),
    }
}

fn created_at(item: &MemQueryResultItem) -> Option<&str> {
    Some(item.entry.created_at.as_str()).filter(|s| !s.is_empty())
}

/// Missing values go last in ascending order and first in descending order.
fn compare_optional<T>(
    left: Option<T>,
    right: Option<T>,
    order: SortOrder,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    let ascending = match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(l), Some(r)) => cmp(&l, &r),
    };
    match order {
        SortOrder::Asc => ascending,
        SortOrder::Desc => ascending.reverse(),
    }
}
