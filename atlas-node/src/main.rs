//! # Atlas CLI
//!
//! Runs a scheduler or worker node, and talks to a running scheduler as a
//! client (submissions, stats, service control).

use anyhow::{bail, Context};
use atlas_proto::RpcClient;
use atlas_scheduler::{Scheduler, SchedulerConfig};
use atlas_traits::Lifecycle;
use atlas_worker::{WorkerConfig, WorkerNode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "atlas")]
#[command(about = "Atlas - distributed job orchestrator")]
#[command(version)]
struct Cli {
    /// Scheduler address for client commands
    #[arg(long, global = true, default_value = "127.0.0.1:9090")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scheduler
    Scheduler {
        /// Listen port (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
        /// Staging directory for RUN/DEPLOY files (overrides the config file)
        #[arg(long)]
        staging_dir: Option<PathBuf>,
        /// Optional TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run a worker node
    Worker {
        /// Listen port (0 for ephemeral)
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Scheduler address to register with
        #[arg(long, default_value = "127.0.0.1:9090")]
        scheduler: String,
        /// Capability this worker advertises (repeatable)
        #[arg(long = "capability", default_values_t = [String::from("GENERAL")])]
        capabilities: Vec<String>,
    },
    /// Submit a single ad-hoc job
    Submit {
        /// Skill the job requires
        skill: String,
        /// Handler-specific data
        data: String,
        #[arg(long, default_value_t = atlas_types::PRIORITY_NORMAL)]
        priority: i32,
        #[arg(long, default_value_t = 0)]
        delay_ms: i64,
    },
    /// Submit a DAG batch (`ID|SKILL|DATA|PRIO|DELAY|[DEPS]` defs joined by `;`)
    SubmitDag {
        /// Inline definitions
        defs: Option<String>,
        /// Read the definitions from a file instead
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Query scheduler state
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Stop a deployed background service by job id
    Stop { id: String },
    /// Queue a staged script for execution
    Run { file: String },
    /// Queue a staged service for deployment
    Deploy {
        file: String,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Liveness check against the scheduler
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scheduler {
            port,
            staging_dir,
            config,
        } => run_scheduler(port, staging_dir, config).await,
        Commands::Worker {
            port,
            scheduler,
            capabilities,
        } => run_worker(port, &scheduler, capabilities).await,
        Commands::Submit {
            skill,
            data,
            priority,
            delay_ms,
        } => {
            request(&cli.addr, &format!("SUBMIT {skill}|{data}|{priority}|{delay_ms}")).await
        }
        Commands::SubmitDag { defs, file } => {
            let defs = match (defs, file) {
                (Some(d), None) => d,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ; "),
                _ => bail!("provide DAG definitions inline or via --file, not both"),
            };
            request(&cli.addr, &format!("SUBMIT_DAG {defs}")).await
        }
        Commands::Stats { json } => {
            request(&cli.addr, if json { "STATS_JSON" } else { "STATS" }).await
        }
        Commands::Stop { id } => request(&cli.addr, &format!("STOP|{id}")).await,
        Commands::Run { file } => request(&cli.addr, &format!("RUN|{file}")).await,
        Commands::Deploy { file, port } => {
            let port = port.map(|p| p.to_string()).unwrap_or_default();
            request(&cli.addr, &format!("DEPLOY|{file}|{port}")).await
        }
        Commands::Ping => request(&cli.addr, "PING").await,
    }
}

async fn run_scheduler(
    port: Option<u16>,
    staging_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = SchedulerConfig::load_or_default(config_path.as_deref())?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(dir) = staging_dir {
        config.staging_dir = dir;
    }

    let mut scheduler = Scheduler::new(config, Arc::new(atlas_storage::MemoryStore::new()));
    scheduler
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("scheduler failed to start: {e}"))?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    scheduler
        .stop()
        .await
        .map_err(|e| anyhow::anyhow!("scheduler failed to stop: {e}"))?;
    Ok(())
}

async fn run_worker(port: u16, scheduler: &str, capabilities: Vec<String>) -> anyhow::Result<()> {
    let (host, scheduler_port) = split_addr(scheduler)?;
    let mut node = WorkerNode::new(WorkerConfig {
        port,
        scheduler_host: host,
        scheduler_port,
        capabilities,
    });
    node.start().await.context("worker failed to start")?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    node.stop();
    Ok(())
}

async fn request(addr: &str, payload: &str) -> anyhow::Result<()> {
    let (host, port) = split_addr(addr)?;
    let response = RpcClient::new()
        .request(&host, port, payload)
        .await
        .with_context(|| format!("request to {addr} failed"))?;
    println!("{response}");
    Ok(())
}

fn split_addr(addr: &str) -> anyhow::Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("invalid address {addr:?}, expected host:port"))?;
    Ok((host.to_string(), port.parse().context("invalid port")?))
}
