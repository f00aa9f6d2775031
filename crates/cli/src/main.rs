//! `syntagma` command-line host: runs one write, query, chat record or ping
//! against the configured store node, or checks a project definition, and
//! prints the response as JSON on stdout.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use {
    anyhow::{Context, Result, anyhow},
    clap::{Args, Parser, Subcommand},
    serde_json::Value,
    syntagma_chat::{ChatRecorder, ChatResponse},
    syntagma_config::{SyntagmaConfig, discover_config, load_config, load_project},
    syntagma_memory::{MemQueryEngine, MemWriter, QueryResponse, WriteResponse, malformed_request},
    syntagma_store::{ConnectionRegistry, StoreNode, StoreRuntime},
    tokio::io::AsyncReadExt,
    tracing::{debug, info},
    tracing_subscriber::EnvFilter,
};

#[derive(Parser, Debug)]
#[command(name = "syntagma", version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./syntagma.toml, then the user config dir)
    #[arg(short, long, global = true, env = "SYNTAGMA_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a batch of memory entries
    Write(RequestArgs),
    /// Query memory entries
    Query(RequestArgs),
    /// Record a chat transcript message
    Chat(RequestArgs),
    /// Check connectivity to the store
    Ping,
    /// Validate the project definition and print it with its resolved id
    Project(ProjectArgs),
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// Request JSON file; reads stdin when omitted
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ProjectArgs {
    /// Project JSON file; defaults to `project.config_file` from the config
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let dotenv = dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json)?;
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "loaded .env");
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let (config, source) = discover_config()?;
            match source {
                Some(path) => info!(path = %path.display(), "using discovered config"),
                None => info!("no config file found, using defaults"),
            }
            config
        },
    };

    let registry = Arc::new(ConnectionRegistry::new());
    let runtime = StoreRuntime::sqlite(Arc::clone(&registry));
    let node = runtime.open_node(&config.store);

    let outcome = execute(&cli.command, &config, &node, &registry).await;
    node.close().await;

    let (output, ok) = outcome?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log filter")?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    }
    .map_err(|e| anyhow!(e))
}

/// Run one command; returns the JSON to print and whether it succeeded.
async fn execute(
    command: &Command,
    config: &SyntagmaConfig,
    node: &StoreNode,
    registry: &ConnectionRegistry,
) -> Result<(Value, bool)> {
    match command {
        Command::Write(args) => {
            let raw = read_input(args.input.as_deref()).await?;
            let writer =
                MemWriter::from_registry(config.memory.write.clone(), registry, node.id());
            let response = match serde_json::from_str::<Value>(&raw) {
                Ok(message) => writer.handle_value(message).await,
                Err(e) => WriteResponse::rejected(Value::Null, &malformed_request(&e)),
            };
            let ok = response.error_message.is_none();
            Ok((serde_json::to_value(&response)?, ok))
        },
        Command::Query(args) => {
            let raw = read_input(args.input.as_deref()).await?;
            let engine =
                MemQueryEngine::from_registry(config.memory.query.clone(), registry, node.id());
            let response = match serde_json::from_str::<Value>(&raw) {
                Ok(message) => engine.handle_value(message).await,
                Err(e) => QueryResponse::rejected(Value::Null, &malformed_request(&e)),
            };
            let ok = response.error_message.is_none();
            Ok((serde_json::to_value(&response)?, ok))
        },
        Command::Chat(args) => {
            let raw = read_input(args.input.as_deref()).await?;
            let recorder = ChatRecorder::from_registry(config.chat.clone(), registry, node.id());
            let response = match serde_json::from_str::<Value>(&raw) {
                Ok(message) => recorder.handle_value(message).await,
                Err(e) => ChatResponse::rejected(Value::Null, &malformed_request(&e)),
            };
            let ok = response.error_message.is_none();
            Ok((serde_json::to_value(&response)?, ok))
        },
        Command::Ping => {
            let report = node.ping().await;
            Ok((serde_json::to_value(&report)?, report.ok))
        },
        Command::Project(args) => {
            let project = load_project(&config.project, args.file.as_deref())?
                .context("no project config file given")?;
            Ok((serde_json::to_value(&project)?, true))
        },
    }
}

/// Raw request text from `input`, or stdin when no file is given.
async fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read stdin")?;
            Ok(buf)
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        serde_json::json,
        syntagma_config::StoreNodeDef,
        syntagma_store::{DefaultManagerFactory, EnvResolver, SqliteConnector},
    };

    fn memory_node(registry: &Arc<ConnectionRegistry>) -> StoreNode {
        let runtime = StoreRuntime::new(
            EnvResolver::with_lookup(|_| None),
            Arc::new(DefaultManagerFactory::new(Arc::new(SqliteConnector))),
            Arc::clone(registry),
        );
        runtime.open_node(&StoreNodeDef {
            url: Some("sqlite::memory:".into()),
            ..Default::default()
        })
    }

    fn request_file(dir: &tempfile::TempDir, name: &str, body: Value) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body.to_string()).unwrap();
        path
    }

    #[test]
    fn parses_subcommands_and_global_flags() {
        let cli =
            Cli::try_parse_from(["syntagma", "query", "--input", "q.json", "--log-json"]).unwrap();
        assert!(cli.log_json);
        let Command::Query(args) = &cli.command else {
            panic!("expected query, got {:?}", cli.command);
        };
        assert_eq!(args.input.as_deref(), Some(Path::new("q.json")));

        let cli = Cli::try_parse_from(["syntagma", "--config", "c.toml", "ping"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("c.toml")));
        assert!(matches!(cli.command, Command::Ping));
    }

    #[tokio::test]
    async fn write_then_query_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ConnectionRegistry::new());
        let node = memory_node(&registry);
        let config = SyntagmaConfig::default();

        let write = request_file(&dir, "write.json", json!({
            "projectId": "p1",
            "memBatch": [
                {"scope": "project", "text": "use blue-green deploys"},
                {"scope": "task", "text": "missing task id"},
            ],
        }));
        let (output, ok) = execute(
            &Command::Write(RequestArgs { input: Some(write) }),
            &config,
            &node,
            &registry,
        )
        .await
        .unwrap();
        assert!(ok);
        assert_eq!(output["memWriteResult"]["insertedCount"], json!(1));
        assert_eq!(output["memWriteResult"]["items"][1]["ok"], json!(false));

        let query = request_file(&dir, "query.json", json!({
            "projectId": "p1",
            "memQuery": {"filter": {"scopes": ["project"]}},
        }));
        let (output, ok) = execute(
            &Command::Query(RequestArgs { input: Some(query) }),
            &config,
            &node,
            &registry,
        )
        .await
        .unwrap();
        assert!(ok);
        assert_eq!(output["memQueryResult"]["total"], json!(1));
        assert_eq!(
            output["memQueryResult"]["items"][0]["entry"]["text"],
            json!("use blue-green deploys")
        );

        node.close().await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn ping_reports_node_config() {
        let registry = Arc::new(ConnectionRegistry::new());
        let node = memory_node(&registry);
        let (output, ok) = execute(&Command::Ping, &SyntagmaConfig::default(), &node, &registry)
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(output["config"]["source"], json!("node"));
    }

    #[tokio::test]
    async fn malformed_requests_still_get_an_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ConnectionRegistry::new());
        let node = memory_node(&registry);
        let config = SyntagmaConfig::default();

        let query = request_file(&dir, "query.json", json!({
            "_msgid": "m1",
            "memQuery": {"limit": "ten"},
        }));
        let (output, ok) = execute(
            &Command::Query(RequestArgs { input: Some(query) }),
            &config,
            &node,
            &registry,
        )
        .await
        .unwrap();
        assert!(!ok);
        assert_eq!(output["_msgid"], json!("m1"));
        assert!(
            output["errorMessage"]
                .as_str()
                .unwrap()
                .starts_with("malformed request")
        );
        assert_eq!(output["memQueryResult"]["items"], json!([]));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let (output, ok) = execute(
            &Command::Write(RequestArgs { input: Some(path) }),
            &config,
            &node,
            &registry,
        )
        .await
        .unwrap();
        assert!(!ok);
        assert!(
            output["errorMessage"]
                .as_str()
                .unwrap()
                .starts_with("malformed request")
        );
        assert_eq!(
            output["memWriteResult"],
            json!({"insertedCount": 0, "items": []})
        );

        node.close().await;
    }

    #[tokio::test]
    async fn chat_message_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ConnectionRegistry::new());
        let node = memory_node(&registry);
        let chat = request_file(&dir, "chat.json", json!({
            "projectId": "p1",
            "chatKey": "general",
            "chatMessage": {"text": "standup at ten"},
        }));
        let (output, ok) = execute(
            &Command::Chat(RequestArgs { input: Some(chat) }),
            &SyntagmaConfig::default(),
            &node,
            &registry,
        )
        .await
        .unwrap();
        assert!(ok);
        assert_eq!(output["chatId"], output["chatRecordResult"]["chatId"]);
        node.close().await;
    }

    #[tokio::test]
    async fn project_definition_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ConnectionRegistry::new());
        let node = memory_node(&registry);
        let file = request_file(&dir, "project.json", json!({
            "projectId": "apollo",
            "name": "Apollo",
            "chats": {"general": "g", "mumble": "m", "operator": "o"},
            "squads": [{"squadKey": "core", "roles": [{"roleKey": "dev"}]}],
            "stages": {"defaultStageSchemaId": "s1"},
        }));
        let (output, ok) = execute(
            &Command::Project(ProjectArgs { file: Some(file) }),
            &SyntagmaConfig::default(),
            &node,
            &registry,
        )
        .await
        .unwrap();
        assert!(ok);
        assert_eq!(output["projectId"], json!("apollo"));

        let err = execute(
            &Command::Project(ProjectArgs { file: None }),
            &SyntagmaConfig::default(),
            &node,
            &registry,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "no project config file given");
    }

    #[tokio::test]
    async fn unreadable_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_input(Some(&dir.path().join("missing.json")))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to read"));
    }
}
