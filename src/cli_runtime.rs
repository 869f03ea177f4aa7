use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use anabuild::alerts::{Alert, AlertLevel, AlertSink, AssumeYes, Confirm};
use anabuild::assembler::Assembler;
use anabuild::cache::Cache;
use anabuild::catalog::Catalog;
use anabuild::config::ClientConfig;
use anabuild::engine::Engine;
use anabuild::extensions::ExtensionManager;
use anabuild::monitoring::Monitoring;
use anabuild::platform::PlatformClient;
use anabuild::registry::RepositoryRegistry;

pub(crate) fn init_logging(verbose: bool) {
    let default = if verbose { "anabuild=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints alerts to stderr as they are raised.
pub(crate) struct PrintAlerts;

impl AlertSink for PrintAlerts {
    fn alert(&self, alert: Alert) {
        let level = match alert.level {
            AlertLevel::Success => "ok",
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Danger => "error",
        };
        eprintln!("{}: {}", level, alert.message);
        if let Some(detail) = alert.detail {
            eprintln!("  {}", detail);
        }
    }
}

/// Asks on the terminal; anything but `y`/`yes` declines.
pub(crate) struct PromptConfirm;

impl Confirm for PromptConfirm {
    fn confirm(&self, title: &str, message: &str) -> bool {
        eprint!("{}: {} [y/N] ", title, message);
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

pub(crate) fn confirmer(yes: bool) -> Box<dyn Confirm> {
    if yes {
        Box::new(AssumeYes)
    } else {
        Box::new(PromptConfirm)
    }
}

/// Services wired against the configured tenant.
pub(crate) struct Runtime {
    pub client: Arc<PlatformClient>,
    pub registry: Arc<RepositoryRegistry>,
    pub engine: Arc<Engine>,
    pub catalog: Catalog,
    pub assembler: Assembler,
    pub extensions: ExtensionManager,
    pub monitoring: Monitoring,
    pub alerts: Arc<dyn AlertSink>,
}

impl Runtime {
    pub(crate) fn open(config_path: &Path) -> Result<Self> {
        let config = ClientConfig::load(config_path)?;
        tracing::debug!(url = %config.base_url, backend = %config.backend_url(), "loaded config");
        let client = Arc::new(PlatformClient::new(config)?);
        let alerts: Arc<dyn AlertSink> = Arc::new(PrintAlerts);
        let cache = Arc::new(Cache::new());

        let registry = Arc::new(RepositoryRegistry::new(client.clone(), alerts.clone()));
        let engine = Arc::new(Engine::new(client.clone(), client.clone(), cache.clone()));
        let catalog = Catalog::new(
            client.clone(),
            registry.clone(),
            engine.clone(),
            alerts.clone(),
        );
        let assembler = Assembler::new(client.clone(), client.clone(), cache.clone(), alerts.clone());
        let extensions =
            ExtensionManager::new(client.clone(), client.clone(), cache, alerts.clone());
        let monitoring = Monitoring::new(client.clone(), engine.clone());

        Ok(Self {
            client,
            registry,
            engine,
            catalog,
            assembler,
            extensions,
            monitoring,
            alerts,
        })
    }
}
