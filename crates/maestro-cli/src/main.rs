mod demo;

use clap::{Parser, Subcommand};
use maestro_agent::{AgentDescriptor, AgentRegistry, InferenceClient, ModelConfig};
use maestro_core::{TaskRequest, TaskStatus};
use maestro_orchestrator::{Orchestrator, PlatformConfig};
use maestro_store::{FileStore, TaskStore};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maestro", about = "Maestro: Multi-Agent Orchestration Engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "maestro.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sample workload and collaboration scenarios
    Demo,
    /// Submit one task and wait for it to finish
    Submit {
        /// Task title
        title: String,
        /// Task description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Required capability (repeatable)
        #[arg(short = 'C', long = "capability")]
        capabilities: Vec<String>,
        /// Task category, e.g. research_task
        #[arg(short, long, default_value = "general")]
        task_type: String,
        /// Stored priority
        #[arg(short, long, default_value_t = 1)]
        priority: i32,
    },
    /// List agents
    Agents,
    /// List tasks, newest first
    Tasks {
        /// Only tasks in this status (pending, assigned, in_progress, completed, failed)
        #[arg(short, long)]
        status: Option<String>,
        /// Maximum number of tasks
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Print the system status
    Status,
}

#[derive(Deserialize)]
struct MaestroConfig {
    #[serde(default = "ModelConfig::echo")]
    model: ModelConfig,
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default)]
    platform: PlatformConfig,
    #[serde(default)]
    store: StoreConfig,
    /// Replaces the default agent types when non-empty.
    #[serde(default)]
    agents: Vec<AgentDescriptor>,
    /// Extra or overriding task categories.
    #[serde(default)]
    task_categories: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Deserialize, Default)]
struct StoreConfig {
    #[serde(default)]
    kind: StoreKind,
    /// Defaults to a location under `data_dir`.
    #[serde(default)]
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
enum StoreKind {
    #[default]
    Memory,
    File,
    Sqlite,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn parse_config(raw: &str) -> anyhow::Result<MaestroConfig> {
    Ok(toml::from_str(raw)?)
}

async fn load_config(path: &Path) -> anyhow::Result<MaestroConfig> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => parse_config(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Config file not found, using defaults");
            parse_config("")
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to read config file '{}': {e}",
            path.display()
        )),
    }
}

/// Fill empty API keys from `MAESTRO_API_KEY`.
fn apply_api_key(model: &mut ModelConfig, key: Option<&str>) {
    let Some(key) = key else {
        return;
    };
    if model.api_key.is_empty() && model.requires_api_key() {
        model.api_key = key.to_string();
    }
    for fallback in &mut model.fallback_models {
        apply_api_key(fallback, Some(key));
    }
}

fn build_registry(config: &MaestroConfig) -> anyhow::Result<AgentRegistry> {
    let mut registry = if config.agents.is_empty() {
        AgentRegistry::default()
    } else {
        AgentRegistry::new(config.agents.clone())?
    };
    for (task_type, capabilities) in &config.task_categories {
        registry = registry.with_task_category(task_type, capabilities.iter().cloned());
    }
    Ok(registry)
}

async fn open_store(config: &MaestroConfig) -> anyhow::Result<Option<Arc<dyn TaskStore>>> {
    match config.store.kind {
        StoreKind::Memory => Ok(None),
        StoreKind::File => {
            let dir = config
                .store
                .path
                .clone()
                .unwrap_or_else(|| config.data_dir.join("store"));
            info!(path = %dir.display(), "Using file store");
            Ok(Some(Arc::new(FileStore::new(dir).await?)))
        }
        StoreKind::Sqlite => open_sqlite(config),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &MaestroConfig) -> anyhow::Result<Option<Arc<dyn TaskStore>>> {
    let path = config
        .store
        .path
        .clone()
        .unwrap_or_else(|| config.data_dir.join("maestro.db"));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!(path = %path.display(), "Using SQLite store");
    Ok(Some(Arc::new(maestro_store::SqliteStore::open(&path)?)))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &MaestroConfig) -> anyhow::Result<Option<Arc<dyn TaskStore>>> {
    anyhow::bail!("store kind 'sqlite' requires building with the 'sqlite' feature")
}

async fn build_engine(config: MaestroConfig) -> anyhow::Result<Orchestrator> {
    let registry = build_registry(&config)?;
    let store = open_store(&config).await?;
    let MaestroConfig {
        mut model,
        platform,
        ..
    } = config;

    apply_api_key(&mut model, std::env::var("MAESTRO_API_KEY").ok().as_deref());
    info!(provider = ?model.provider, model = %model.model_id, "Inference backend configured");
    let inference = Arc::new(InferenceClient::new(model)?);

    let mut builder = Orchestrator::builder(inference)
        .config(platform)
        .registry(registry);
    if let Some(store) = store {
        builder = builder.store(store);
    }
    Ok(builder.build().await?)
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = load_config(&cli.config).await?;
    let engine = build_engine(config).await?;

    match cli.command {
        Commands::Demo => demo::run(&engine).await?,
        Commands::Submit {
            title,
            description,
            capabilities,
            task_type,
            priority,
        } => {
            let request = TaskRequest::new(title, description)
                .with_capabilities(capabilities)
                .with_type(task_type)
                .with_priority(priority);
            let id = engine.submit_task(request).await?;
            engine.wait_idle().await;
            print_json(&engine.get_task(id).await?)?;
        }
        Commands::Agents => {
            let agents = engine.list_agents();
            println!("Registered agents:");
            for agent in &agents {
                let caps: Vec<&str> = agent.capabilities.iter().map(String::as_str).collect();
                println!(
                    "  {} [{}] {:?} load {}/{} success {:.2}",
                    agent.name,
                    agent.agent_type,
                    agent.status,
                    agent.current_load,
                    agent.max_concurrent_tasks,
                    agent.metrics.success_rate
                );
                println!("    Capabilities: {}", caps.join(", "));
            }
            println!("\nTotal: {} agent(s)", agents.len());
        }
        Commands::Tasks { status, limit } => {
            let status = match status.as_deref() {
                Some(name) => Some(
                    TaskStatus::parse(name)
                        .ok_or_else(|| anyhow::anyhow!("Unknown task status '{name}'"))?,
                ),
                None => None,
            };
            let tasks = engine.list_tasks(status, limit).await;
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for task in &tasks {
                println!(
                    "  {} {:<11} retries {} {}",
                    task.id,
                    task.status.as_str(),
                    task.retry_count,
                    task.title
                );
            }
        }
        Commands::Status => print_json(&engine.system_status().await)?,
    }

    engine.shutdown().await;
    Ok(())
}
