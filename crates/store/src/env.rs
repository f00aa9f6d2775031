//! Resolve the store URL from environment variables.

use std::sync::Arc;

/// Variables read, in order, when the node names no variable of its own.
pub const DEFAULT_ENV_VAR_NAMES: [&str; 4] = [
    "SYNTAGMA_STORE_URL",
    "SYNTAGMA_DATABASE_URL",
    "STORE_URL",
    "DATABASE_URL",
];

/// Result of probing the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    /// The variable the URL came from, or the first candidate when none was set.
    pub env_var_name: String,
    pub url_from_env: Option<String>,
}

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub struct EnvResolver {
    candidates: Vec<String>,
    lookup: Lookup,
}

impl Default for EnvResolver {
    fn default() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }
}

impl std::fmt::Debug for EnvResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvResolver")
            .field("candidates", &self.candidates)
            .finish_non_exhaustive()
    }
}

impl EnvResolver {
    /// Resolver reading variables through `lookup` instead of the process environment.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            candidates: DEFAULT_ENV_VAR_NAMES.iter().map(|s| (*s).to_string()).collect(),
            lookup: Arc::new(lookup),
        }
    }

    pub fn default_candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Read `custom_var_name` alone if it is non-blank, otherwise the default
    /// candidates in order. The first non-blank value wins.
    pub fn resolve(&self, custom_var_name: Option<&str>) -> EnvConfig {
        let custom = custom_var_name.map(str::trim).filter(|s| !s.is_empty());
        let candidates: Vec<&str> = match custom {
            Some(name) => vec![name],
            None => self.candidates.iter().map(String::as_str).collect(),
        };

        for name in &candidates {
            if let Some(value) = (self.lookup)(name) {
                let url = value.trim();
                if !url.is_empty() {
                    return EnvConfig {
                        env_var_name: (*name).to_string(),
                        url_from_env: Some(url.to_string()),
                    };
                }
            }
        }

        EnvConfig {
            env_var_name: candidates
                .first()
                .copied()
                .unwrap_or(DEFAULT_ENV_VAR_NAMES[0])
                .to_string(),
            url_from_env: None,
        }
    }
}
