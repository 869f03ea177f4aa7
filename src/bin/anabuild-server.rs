#![allow(clippy::result_large_err)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use tokio::sync::RwLock;

use anabuild::model::{ContentEntry, ItemType, Repository};

#[path = "anabuild_server/http_error.rs"]
mod http_error;
use self::http_error::*;
#[path = "anabuild_server/persistence.rs"]
mod persistence;
use self::persistence::*;
#[path = "anabuild_server/sources.rs"]
mod sources;
use self::sources::*;
#[path = "anabuild_server/builder.rs"]
mod builder;
use self::builder::*;
#[path = "anabuild_server/tenant.rs"]
mod tenant;
#[path = "anabuild_server/handlers_repository.rs"]
mod handlers_repository;
use self::handlers_repository::*;
#[path = "anabuild_server/handlers_extension.rs"]
mod handlers_extension;
use self::handlers_extension::*;
#[path = "anabuild_server/handlers_cep.rs"]
mod handlers_cep;
use self::handlers_cep::*;
#[path = "anabuild_server/routes.rs"]
mod routes;
use self::routes::*;

const DEFAULT_BUILDER: &str = "/apama_work/apama-analytics-builder-block-sdk/analytics_builder";

struct AppState {
    data_dir: PathBuf,

    /// Block SDK executable invoked as `{builder} build extension ...`.
    builder: PathBuf,

    /// Tenant the archives are uploaded to; `None` disables upload, deploy and the cep proxy.
    platform_url: Option<String>,

    github_api: String,

    /// Directory `file://` sources must live under; `None` refuses every local source.
    local_root: Option<PathBuf>,

    http: reqwest::Client,

    repositories: RwLock<Vec<Repository>>,
}

#[derive(Parser)]
#[command(name = "anabuild-server")]
#[command(about = "Packaging service for analytics extensions", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Write bound address to this file (dev/test convenience)
    #[arg(long)]
    addr_file: Option<PathBuf>,

    /// Data directory holding the repository configuration
    #[arg(long, default_value = "./anabuild-data")]
    data_dir: PathBuf,

    /// Extension builder executable from the block SDK
    #[arg(long, default_value = DEFAULT_BUILDER)]
    builder: PathBuf,

    /// Platform tenant url used for binary upload, engine restart and status
    #[arg(long)]
    platform_url: Option<String>,

    /// GitHub API base url
    #[arg(long, default_value = anabuild::github::GITHUB_API)]
    github_api: String,

    /// Serve `file://` repositories found below this directory
    #[arg(long)]
    local_root: Option<PathBuf>,

    /// Timeout in seconds for upstream requests
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    init_logging();

    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("create data dir {}", args.data_dir.display()))?;
    let data_dir = std::path::absolute(&args.data_dir)
        .with_context(|| format!("resolve data dir {}", args.data_dir.display()))?;
    let local_root = match &args.local_root {
        Some(root) => Some(
            std::path::absolute(root)
                .with_context(|| format!("resolve local root {}", root.display()))?,
        ),
        None => None,
    };

    let repositories = load_repositories(&data_dir).context("load repositories")?;
    tracing::info!(count = repositories.len(), "loaded repository configuration");

    let http = reqwest::Client::builder()
        .user_agent(concat!("anabuild-server/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()
        .context("build http client")?;

    let state = Arc::new(AppState {
        data_dir,
        builder: args.builder,
        platform_url: args
            .platform_url
            .map(|u| u.trim_end_matches('/').to_string()),
        github_api: args.github_api.trim_end_matches('/').to_string(),
        local_root,
        http,
        repositories: RwLock::new(repositories),
    });

    let app = Router::new()
        .route("/health", get(health))
        .merge(service_router())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("bind {}", args.addr))?;

    let local_addr = listener.local_addr().context("read listener local addr")?;
    eprintln!("anabuild-server listening on {}", local_addr);

    if let Some(addr_file) = &args.addr_file {
        std::fs::write(addr_file, local_addr.to_string())
            .with_context(|| format!("write addr file {}", addr_file.display()))?;
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "UP"}))
}
