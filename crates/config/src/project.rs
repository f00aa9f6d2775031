//! Project definitions: chats, squads, stage bindings and operators.
//!
//! A definition is checked structurally before it is decoded, so a broken
//! file is reported by the first offending path (`chats.general`,
//! `squad.roles`, ...) instead of a generic decode error.

use std::collections::BTreeMap;

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    syntagma_common::{Error, Result},
};

pub const PROJECT_TYPE_PRODUCT_DEV: &str = "product_dev";
pub const PROJECT_TYPE_TREND_RESEARCH: &str = "trend_research";
pub const PROJECT_TYPE_CONTENT_PRODUCTION: &str = "content_production";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub project_id: String,
    pub name: String,
    /// One of the `PROJECT_TYPE_*` values, or a custom type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    pub chats: ProjectChatIds,
    pub squads: Vec<SquadConfig>,
    pub stages: StageBinding,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operators: Vec<OperatorBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

/// Chat ids of the three standing project chats, plus optional per-squad chats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectChatIds {
    pub general: String,
    pub mumble: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub squads: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadConfig {
    pub squad_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub roles: Vec<SquadRoleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_schema_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_chat_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadRoleConfig {
    pub role_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_call_sign: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentInstanceConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInstanceConfig {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_sign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageBinding {
    pub default_stage_schema_id: String,
    /// Stage schema per squad key, overriding the default.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub per_squad: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorBinding {
    pub operator_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl ProjectConfig {
    /// Parse and check a JSON project definition.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::validation("project config JSON is empty"));
        }
        let value: Value =
            serde_json::from_str(raw).map_err(|e| Error::validation(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        check_project(&value)?;
        serde_json::from_value(value)
            .map_err(|e| Error::validation(format!("invalid project config: {e}")))
    }

    /// Stage schema for `squad_key`, falling back to the project default.
    pub fn stage_schema_for(&self, squad_key: &str) -> &str {
        self.stages
            .per_squad
            .get(squad_key)
            .map_or(self.stages.default_stage_schema_id.as_str(), String::as_str)
    }
}

/// A checked definition together with the id the project is known by.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedProject {
    pub project_id: String,
    pub config: ProjectConfig,
}

impl ResolvedProject {
    /// A non-blank `project_id` override wins over the definition's own id.
    pub fn new(config: ProjectConfig, project_id: Option<&str>) -> Self {
        let project_id = project_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| config.project_id.clone(), str::to_owned);
        Self { project_id, config }
    }
}

fn non_empty_str(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn require_str(obj: &Map<String, Value>, key: &str, message: &str) -> Result<()> {
    if non_empty_str(obj.get(key)) {
        Ok(())
    } else {
        Err(Error::validation(message))
    }
}

fn object<'a>(value: &'a Value, message: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| Error::validation(message))
}

fn field_object<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    message: &str,
) -> Result<&'a Map<String, Value>> {
    obj.get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| Error::validation(message))
}

fn non_empty_array<'a>(value: Option<&'a Value>, message: &str) -> Result<&'a Vec<Value>> {
    value
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| Error::validation(message))
}

fn check_project(value: &Value) -> Result<()> {
    let obj = object(value, "project config must be an object")?;
    require_str(obj, "projectId", "projectId must be a non-empty string")?;
    require_str(obj, "name", "name must be a non-empty string")?;

    let chats = field_object(obj, "chats", "chats must be an object")?;
    require_str(chats, "general", "chats.general must be a non-empty string")?;
    require_str(chats, "mumble", "chats.mumble must be a non-empty string")?;
    require_str(chats, "operator", "chats.operator must be a non-empty string")?;

    for squad in non_empty_array(obj.get("squads"), "squads must be a non-empty array")? {
        check_squad(squad)?;
    }

    let stages = field_object(obj, "stages", "stages must be an object")?;
    require_str(
        stages,
        "defaultStageSchemaId",
        "stages.defaultStageSchemaId must be a non-empty string",
    )?;

    if let Some(operators) = obj.get("operators").and_then(Value::as_array) {
        for operator in operators {
            let operator = object(operator, "operator must be an object")?;
            require_str(
                operator,
                "operatorKey",
                "operator.operatorKey must be a non-empty string",
            )?;
        }
    }
    Ok(())
}

fn check_squad(value: &Value) -> Result<()> {
    let squad = object(value, "squad must be an object")?;
    require_str(squad, "squadKey", "squad.squadKey must be a non-empty string")?;
    for role in non_empty_array(squad.get("roles"), "squad.roles must be a non-empty array")? {
        let role = object(role, "squad role must be an object")?;
        require_str(role, "roleKey", "squad roleKey must be a non-empty string")?;
        if let Some(agents) = role.get("agents").and_then(Value::as_array) {
            for agent in agents {
                let agent = object(agent, "agent must be an object")?;
                require_str(agent, "agentId", "agent.agentId must be a non-empty string")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, serde_json::json};

    fn definition() -> Value {
        json!({
            "projectId": "apollo",
            "name": "Apollo",
            "projectType": PROJECT_TYPE_PRODUCT_DEV,
            "chats": {"general": "c-gen", "mumble": "c-mum", "operator": "c-op"},
            "squads": [{
                "squadKey": "core",
                "roles": [{
                    "roleKey": "dev",
                    "agents": [{"agentId": "a1", "callSign": "@dev1"}],
                }],
            }],
            "stages": {"defaultStageSchemaId": "s-default", "perSquad": {"core": "s-core"}},
            "operators": [{"operatorKey": "op", "telegram": {"userId": "42"}}],
        })
    }

    fn rejection(mutate: impl FnOnce(&mut Value)) -> String {
        let mut value = definition();
        mutate(&mut value);
        let err = ProjectConfig::from_value(value).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        err.to_string()
    }

    #[test]
    fn valid_definition_decodes() {
        let config = ProjectConfig::parse(&definition().to_string()).unwrap();
        assert_eq!(config.project_type.as_deref(), Some(PROJECT_TYPE_PRODUCT_DEV));
        assert_eq!(config.squads[0].roles[0].agents[0].call_sign.as_deref(), Some("@dev1"));
        assert_eq!(config.operators[0].telegram.as_ref().unwrap().user_id.as_deref(), Some("42"));
        assert_eq!(config.stage_schema_for("core"), "s-core");
        assert_eq!(config.stage_schema_for("ops"), "s-default");
    }

    #[test]
    fn empty_or_broken_json_is_rejected() {
        let err = ProjectConfig::parse("   ").unwrap_err();
        assert_eq!(err.to_string(), "project config JSON is empty");
        assert!(matches!(
            ProjectConfig::parse("{\"projectId\":"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn first_offending_path_is_reported() {
        assert_eq!(
            rejection(|v| v["name"] = json!("  ")),
            "name must be a non-empty string"
        );
        assert_eq!(
            rejection(|v| v["chats"] = json!("c-gen")),
            "chats must be an object"
        );
        assert_eq!(
            rejection(|v| v["chats"]["mumble"] = json!(3)),
            "chats.mumble must be a non-empty string"
        );
        assert_eq!(
            rejection(|v| v["squads"] = json!([])),
            "squads must be a non-empty array"
        );
        assert_eq!(
            rejection(|v| v["squads"][0]["roles"] = json!([])),
            "squad.roles must be a non-empty array"
        );
        assert_eq!(
            rejection(|v| v["squads"][0]["roles"][0]["agents"][0] = json!({"callSign": "x"})),
            "agent.agentId must be a non-empty string"
        );
        assert_eq!(
            rejection(|v| v["stages"] = json!({})),
            "stages.defaultStageSchemaId must be a non-empty string"
        );
        assert_eq!(
            rejection(|v| v["operators"] = json!([{"displayName": "Op"}])),
            "operator.operatorKey must be a non-empty string"
        );
    }

    #[test]
    fn checks_run_in_field_order() {
        assert_eq!(
            rejection(|v| {
                v["projectId"] = json!("");
                v["chats"] = json!(null);
            }),
            "projectId must be a non-empty string"
        );
    }

    #[test]
    fn override_wins_when_not_blank() {
        let config = ProjectConfig::from_value(definition()).unwrap();
        assert_eq!(ResolvedProject::new(config.clone(), Some(" ")).project_id, "apollo");
        assert_eq!(ResolvedProject::new(config.clone(), None).project_id, "apollo");
        assert_eq!(ResolvedProject::new(config, Some("hermes")).project_id, "hermes");
    }
}
