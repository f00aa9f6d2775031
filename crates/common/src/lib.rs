//! Shared error taxonomy and domain enums used across the syntagma crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, Result},
    types::{Audience, Scope, SortField, SortOrder, SortRule},
};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use crate::{Audience, Error, Scope, SortField, SortOrder, SortRule};

    #[test]
    fn domain_types_are_reachable_from_crate_root() {
        let rule = SortRule::new(SortField::Importance, SortOrder::Desc);
        assert_eq!(rule.field, SortField::Importance);
        assert_eq!(Scope::Task.as_str(), "task");
        assert_eq!(Audience::Mixed.as_str(), "mixed");
        assert_eq!(Error::validation("bad").kind(), "validation");
    }
}
