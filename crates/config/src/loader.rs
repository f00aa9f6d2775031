//! Locate and parse `syntagma.toml`.

use std::path::{Path, PathBuf};

use {anyhow::Context, tracing::debug};

use crate::{
    project::{ProjectConfig, ResolvedProject},
    schema::{ProjectNodeDef, SyntagmaConfig},
};

pub const CONFIG_FILE_NAME: &str = "syntagma.toml";

/// Parse and validate a configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<SyntagmaConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: SyntagmaConfig =
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Candidate locations, in lookup order.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dirs) = directories::ProjectDirs::from("", "", "syntagma") {
        paths.push(dirs.config_dir().join(CONFIG_FILE_NAME));
    }
    paths
}

/// Load the first config file found, or defaults when there is none.
///
/// Returns the path the config was read from, if any.
pub fn discover_config() -> anyhow::Result<(SyntagmaConfig, Option<PathBuf>)> {
    for path in candidate_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config");
            return Ok((load_config(&path)?, Some(path)));
        }
    }
    debug!("no config file found, using defaults");
    Ok((SyntagmaConfig::default(), None))
}

/// Read and check the project definition a node points at.
///
/// `file` overrides the node's `config_file`; `Ok(None)` when neither is set.
pub fn load_project(
    node: &ProjectNodeDef,
    file: Option<&Path>,
) -> anyhow::Result<Option<ResolvedProject>> {
    let Some(path) = file.or(node.config_file.as_deref()) else {
        return Ok(None);
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read project config {}", path.display()))?;
    let config = ProjectConfig::parse(&raw)
        .with_context(|| format!("invalid project config {}", path.display()))?;
    let project = ResolvedProject::new(config, node.project_id.as_deref());
    debug!(project_id = %project.project_id, path = %path.display(), "project config loaded");
    Ok(Some(project))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        syntagma_common::{Scope, SortField, SortOrder},
    };

    #[test]
    fn loads_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
[store]
id = "mongo-1"
url = "sqlite::memory:"
db_name = "agents"
prefer_env_url = true

[memory.write]
collection_name = "notes"

[memory.query]
collection_name = "notes"
default_scopes = ["project", "personal"]
default_limit = 10
max_limit = 50
enable_vector_search = true
default_top_k = 5
default_similarity_threshold = 0.4
default_sort_field = "createdAt"
default_sort_order = "asc"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.store.id, "mongo-1");
        assert!(config.store.prefer_env_url);
        assert_eq!(config.store.db_name.as_deref(), Some("agents"));
        assert_eq!(config.memory.write.collection_name, "notes");
        let query = &config.memory.query;
        assert_eq!(query.default_scopes, vec![Scope::Project, Scope::Personal]);
        assert_eq!(query.effective_max_limit(), 50);
        assert_eq!(query.default_top_k, Some(5));
        assert_eq!(query.default_sort_field, Some(SortField::CreatedAt));
        assert_eq!(query.default_sort_order, Some(SortOrder::Asc));
    }

    #[test]
    fn empty_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "").unwrap();
        assert_eq!(load_config(&path).unwrap(), SyntagmaConfig::default());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[memory.query]\ncollection_name = \"\"\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("collection_name"));
    }

    #[test]
    fn project_file_from_config_section() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project.json");
        std::fs::write(
            &project,
            r#"{
                "projectId": "apollo",
                "name": "Apollo",
                "chats": {"general": "g", "mumble": "m", "operator": "o"},
                "squads": [{"squadKey": "core", "roles": [{"roleKey": "dev"}]}],
                "stages": {"defaultStageSchemaId": "s1"}
            }"#,
        )
        .unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let body = format!(
            r#"
[project]
project_id = "hermes"
config_file = {file:?}

[chat]
default_chat_kind = "project_general"
"#,
            file = project.display().to_string()
        );
        std::fs::write(&path, body).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.chat.default_chat_kind.as_deref(), Some("project_general"));
        let resolved = load_project(&config.project, None).unwrap().unwrap();
        assert_eq!(resolved.project_id, "hermes");
        assert_eq!(resolved.config.project_id, "apollo");

        assert!(load_project(&ProjectNodeDef::default(), None).unwrap().is_none());
    }

    #[test]
    fn invalid_project_file_reports_reason() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project.json");
        std::fs::write(&project, r#"{"projectId": "apollo"}"#).unwrap();
        let err = load_project(&ProjectNodeDef::default(), Some(&project)).unwrap_err();
        assert!(err.to_string().starts_with("invalid project config"));
        assert_eq!(err.root_cause().to_string(), "name must be a non-empty string");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/syntagma.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/syntagma.toml"));
    }
}
