//! HTTP client for the platform tenant and the packaging microservice it hosts.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{Auth, ClientConfig};

mod http_client;
use self::http_client::with_retries;

mod backend;
mod engine;
mod inventory;

pub struct PlatformClient {
    config: ClientConfig,
    client: reqwest::blocking::Client,
}

impl PlatformClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("anabuild/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build reqwest client")?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Raw http client, shared with the GitHub reachability check.
    pub fn http(&self) -> &reqwest::blocking::Client {
        &self.client
    }
}
