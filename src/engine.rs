//! Cached reads of the running engine and its realtime status.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::api::{BackendApi, EngineApi};
use crate::cache::{Cache, CacheKey};
use crate::model::{DeployedBlock, EngineStatus, is_custom_block, remove_file_extension};

pub struct Engine {
    api: Arc<dyn EngineApi>,
    backend: Arc<dyn BackendApi>,
    cache: Arc<Cache>,
}

impl Engine {
    pub fn new(api: Arc<dyn EngineApi>, backend: Arc<dyn BackendApi>, cache: Arc<Cache>) -> Self {
        Self {
            api,
            backend,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// Every block loaded into the engine, tagged with its extension.
    pub fn deployed_blocks(&self) -> Result<Arc<Vec<DeployedBlock>>> {
        self.cache
            .deployed_blocks
            .get_or_try_populate(|| self.fetch_deployed_blocks())
    }

    fn fetch_deployed_blocks(&self) -> Result<Vec<DeployedBlock>> {
        let meta = self.api.block_metadata().context("read block metadata")?;
        let mut blocks = Vec::new();
        for file in &meta.metadatas {
            let extension = remove_file_extension(file);
            let Some(detail) = self
                .api
                .extension_detail(extension)
                .with_context(|| format!("read extension {}", extension))?
            else {
                tracing::warn!(extension, "extension listed in metadata has no detail");
                continue;
            };
            blocks.extend(detail.analytics.into_iter().map(|mut block| {
                block.custom = is_custom_block(&block.id);
                block.extension = extension.to_string();
                block
            }));
        }
        tracing::debug!(count = blocks.len(), "loaded deployed blocks");
        Ok(blocks)
    }

    /// Managed object id of the engine, `None` while it is not running.
    pub fn engine_id(&self) -> Result<Option<String>> {
        let id = self
            .cache
            .engine_id
            .get_or_try_populate(|| self.backend.engine_id())?;
        Ok(id.as_ref().clone())
    }

    pub fn engine_status(&self) -> Result<Arc<EngineStatus>> {
        self.cache
            .engine_status
            .get_or_try_populate(|| self.backend.engine_status())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Up,
    Down,
    Unknown,
}

/// Tracks restart progress from realtime updates of the engine managed object.
pub struct EngineMonitor {
    cache: Arc<Cache>,
    restarting: AtomicBool,
    last: Mutex<Option<Value>>,
}

impl EngineMonitor {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self {
            cache,
            restarting: AtomicBool::new(false),
            last: Mutex::new(None),
        }
    }

    /// Marks a restart as started; cleared by the next `Up` update.
    pub fn restart_requested(&self) {
        self.restarting.store(true, Ordering::SeqCst);
    }

    pub fn is_restarting(&self) -> bool {
        self.restarting.load(Ordering::SeqCst)
    }

    pub fn last_update(&self) -> Option<Value> {
        self.last
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Accepts the managed object itself or a realtime envelope (`data.data`).
    pub fn apply(&self, payload: &Value) -> EngineState {
        let mo = payload
            .pointer("/data/data")
            .unwrap_or(payload);
        let state = match mo.pointer("/c8y_Status/status").and_then(Value::as_str) {
            Some("Up") => EngineState::Up,
            Some("Down") => EngineState::Down,
            _ => EngineState::Unknown,
        };
        *self.last.lock().unwrap_or_else(|p| p.into_inner()) = Some(mo.clone());

        match state {
            EngineState::Up => {
                self.restarting.store(false, Ordering::SeqCst);
                self.cache.invalidate(CacheKey::EngineStatus);
            }
            EngineState::Down => self.restarting.store(true, Ordering::SeqCst),
            EngineState::Unknown => {}
        }
        tracing::debug!(?state, "engine status update");
        state
    }
}
