use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use orchestrator_core::{Config, OrchestratorEngine};
use orchestrator_api::{build_router, AppState};
use serde_json::json;
use tokio::net::TcpListener;

/// Client + embedded-server CLI for the orchestrator (§6).
#[derive(Debug, Parser)]
#[command(name = "orchestrator")]
struct Cli {
    /// Base URL of a running orchestrator, for every command but `serve`.
    #[arg(long, env = "ORCHESTRATOR_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Tenant id sent as `x-tenant-id` on every request.
    #[arg(long, env = "ORCHESTRATOR_TENANT", default_value = "default")]
    tenant: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the orchestrator in this process.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Robot-facing commands.
    Robot {
        #[command(subcommand)]
        command: RobotCommand,
    },
    /// Submitter-facing commands.
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
}

#[derive(Debug, Subcommand)]
enum RobotCommand {
    /// Register, then poll for and execute claimed jobs (skeleton: this
    /// only covers the registration + claim loop, not an executor).
    Start {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "default")]
        env: String,
    },
    /// Register a robot without entering the claim loop.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "default")]
        env: String,
        #[arg(long, value_delimiter = ',', default_value = "")]
        capabilities: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
enum JobsCommand {
    /// Submit a workflow invocation described by a JSON file.
    Submit { path: PathBuf },
    /// Request cancellation of a job.
    Cancel { id: String },
    /// List jobs, optionally filtered by status.
    List {
        #[arg(long)]
        status: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CliError>() {
        Some(CliError::InvalidArgument(_)) => 2,
        Some(CliError::NotFound(_)) => 3,
        Some(CliError::Conflict(_)) => 4,
        Some(CliError::Transient(_)) => 5,
        None => 1,
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Transient(String),
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { port } => serve(port).await,
        Command::Robot { command } => robot(&cli.url, &cli.tenant, command).await,
        Command::Jobs { command } => jobs(&cli.url, &cli.tenant, command).await,
    }
}

async fn serve(port: Option<u16>) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(port) = port {
        let host = config
            .orchestrator_addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        config.orchestrator_addr = format!("{host}:{port}");
    }
    let addr = config.orchestrator_addr.clone();
    let engine = Arc::new(OrchestratorEngine::new(config));
    let router = build_router(AppState::new(engine));
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on {addr}");
    axum::serve(listener, router).await?;
    Ok(())
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn map_status(status: reqwest::StatusCode, body: &serde_json::Value) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let message = body
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("request failed")
        .to_string();
    Err(match status.as_u16() {
        400 => CliError::InvalidArgument(message).into(),
        404 => CliError::NotFound(message).into(),
        409 | 412 => CliError::Conflict(message).into(),
        503 => CliError::Transient(message).into(),
        _ => anyhow!(message),
    })
}

async fn robot(url: &str, tenant: &str, command: RobotCommand) -> Result<()> {
    match command {
        RobotCommand::Start { name, env } => register_robot(url, tenant, &name, &env, &[]).await,
        RobotCommand::Register { name, env, capabilities } => {
            register_robot(url, tenant, &name, &env, &capabilities).await
        }
    }
}

async fn register_robot(url: &str, tenant: &str, name: &str, env: &str, capabilities: &[String]) -> Result<()> {
    let machine_id = format!("{name}-{}", uuid::Uuid::new_v4());
    let response = client()
        .post(format!("{url}/robots"))
        .header("x-tenant-id", tenant)
        .json(&json!({
            "machine_id": machine_id,
            "name": name,
            "environment": env,
            "capabilities": capabilities,
        }))
        .send()
        .await
        .context("registering robot")?;
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    map_status(status, &body)?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn jobs(url: &str, tenant: &str, command: JobsCommand) -> Result<()> {
    match command {
        JobsCommand::Submit { path } => submit_job(url, tenant, &path).await,
        JobsCommand::Cancel { id } => cancel_job(url, tenant, &id).await,
        JobsCommand::List { status } => list_jobs(url, tenant, status).await,
    }
}

async fn submit_job(url: &str, tenant: &str, path: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let body: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| CliError::InvalidArgument(format!("malformed job file: {e}")))?;
    let response = client()
        .post(format!("{url}/jobs"))
        .header("x-tenant-id", tenant)
        .json(&body)
        .send()
        .await
        .context("submitting job")?;
    let status = response.status();
    let resp_body: serde_json::Value = response.json().await.unwrap_or_default();
    map_status(status, &resp_body)?;
    println!("{}", serde_json::to_string_pretty(&resp_body)?);
    Ok(())
}

async fn cancel_job(url: &str, tenant: &str, id: &str) -> Result<()> {
    let response = client()
        .post(format!("{url}/jobs/{id}/cancel"))
        .header("x-tenant-id", tenant)
        .send()
        .await
        .context("cancelling job")?;
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    map_status(status, &body)?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn list_jobs(url: &str, tenant: &str, status_filter: Option<String>) -> Result<()> {
    let mut request = client().get(format!("{url}/jobs")).header("x-tenant-id", tenant);
    if let Some(status) = status_filter {
        request = request.query(&[("status", status)]);
    }
    let response = request.send().await.context("listing jobs")?;
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    map_status(status, &body)?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
