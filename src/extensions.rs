//! Extension binaries stored in the platform inventory.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::alerts::{AlertSink, Confirm};
use crate::api::{EngineApi, InventoryApi};
use crate::cache::{Cache, CacheKey};
use crate::model::{CEP_METADATA_FILE_EXTENSION, Extension, remove_file_extension};
use crate::paging::ListFilter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadMode {
    #[default]
    Create,
    /// Replaces a binary with the same name.
    Update,
}

pub struct ExtensionManager {
    inventory: Arc<dyn InventoryApi>,
    engine: Arc<dyn EngineApi>,
    cache: Arc<Cache>,
    alerts: Arc<dyn AlertSink>,
}

impl ExtensionManager {
    pub fn new(
        inventory: Arc<dyn InventoryApi>,
        engine: Arc<dyn EngineApi>,
        cache: Arc<Cache>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            inventory,
            engine,
            cache,
            alerts,
        }
    }

    pub fn list(&self, filter: &ListFilter) -> Result<Vec<Extension>> {
        self.inventory.list_extensions(filter)
    }

    /// Stored extensions with their engine state: `loaded`, blocks and block count.
    pub fn enriched(&self) -> Result<Arc<Vec<Extension>>> {
        self.cache
            .extensions
            .get_or_try_populate(|| self.fetch_enriched())
    }

    fn fetch_enriched(&self) -> Result<Vec<Extension>> {
        let mut extensions = self.list(&ListFilter::default())?;
        let meta = self.engine.block_metadata().context("read block metadata")?;
        for ext in &mut extensions {
            ext.name = remove_file_extension(&ext.name).to_string();
            let key = format!("{}{}", ext.name, CEP_METADATA_FILE_EXTENSION);
            ext.loaded = meta.metadatas.iter().any(|m| *m == key);
            if !ext.loaded {
                continue;
            }
            if let Some(detail) = self
                .engine
                .extension_detail(&ext.name)
                .with_context(|| format!("read extension {}", ext.name))?
            {
                ext.blocks_count = Some(detail.analytics.len());
                ext.version = detail.version;
                ext.analytics = detail.analytics;
            }
        }
        Ok(extensions)
    }

    /// Deletes after confirmation; returns whether anything was deleted.
    pub fn delete(&self, extension: &Extension, confirm: &dyn Confirm) -> Result<bool> {
        let name = remove_file_extension(&extension.name);
        let message = format!(
            "You are about to delete extension {}. Do you want to proceed?",
            name
        );
        if !confirm.confirm("Delete extension", &message) {
            tracing::debug!(extension = %name, "delete cancelled");
            return Ok(false);
        }
        self.inventory
            .delete_extension(&extension.id)
            .with_context(|| format!("delete extension {}", name))?;
        self.alerts.success("Extension deleted.");
        self.cache.invalidate(CacheKey::Extensions);
        Ok(true)
    }

    /// Stores `archive` as `{name}.zip` and returns the new binary id.
    pub fn upload(&self, name: &str, archive: Vec<u8>, mode: UploadMode) -> Result<String> {
        let name = remove_file_extension(name);
        if mode == UploadMode::Update {
            let existing = self.list(&ListFilter::default())?;
            for ext in existing
                .iter()
                .filter(|e| remove_file_extension(&e.name) == name)
            {
                tracing::info!(extension = %name, id = %ext.id, "replacing extension binary");
                self.inventory
                    .delete_extension(&ext.id)
                    .with_context(|| format!("delete previous {}", ext.name))?;
            }
        }
        let id = match self.inventory.upload_extension(name, archive) {
            Ok(id) => id,
            Err(err) => {
                self.alerts.danger(
                    &format!("Uploaded extension {}.zip was not successful", name),
                    Some(format!("{:#}", err)),
                );
                return Err(err);
            }
        };
        self.alerts.success(&format!("Extension {}.zip uploaded.", name));
        self.cache.invalidate(CacheKey::Extensions);
        Ok(id)
    }

    /// Drops a partially created binary. Failures are only logged.
    pub fn cancel_upload(&self, id: &str) {
        if let Err(err) = self.inventory.delete_extension(id) {
            tracing::warn!(id, error = %format!("{:#}", err), "failed to remove cancelled upload");
        }
        self.cache.invalidate(CacheKey::Extensions);
    }

    pub fn download(&self, extension: &Extension) -> Result<Vec<u8>> {
        self.inventory
            .download_extension(&extension.id)
            .with_context(|| format!("download extension {}", extension.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::RecordingAlerts;
    use crate::testing::{Answer, FakeEngine, FakeInventory, block};

    fn stored(id: &str, name: &str) -> Extension {
        Extension {
            id: id.to_string(),
            name: name.to_string(),
            ..Extension::default()
        }
    }

    fn manager(inventory: Arc<FakeInventory>) -> ExtensionManager {
        let engine = FakeEngine::default()
            .with_extension("loaded", vec![block("pkg.A", ""), block("pkg.B", "")]);
        ExtensionManager::new(
            inventory,
            Arc::new(engine),
            Arc::new(Cache::new()),
            Arc::new(RecordingAlerts::default()),
        )
    }

    #[test]
    fn enrichment_marks_loaded_extensions() {
        let inventory = Arc::new(FakeInventory::default());
        *inventory.extensions.lock().unwrap() =
            vec![stored("1", "loaded.zip"), stored("2", "idle.zip")];
        let exts = manager(inventory).enriched().expect("enriched");

        assert_eq!(exts[0].name, "loaded");
        assert!(exts[0].loaded);
        assert_eq!(exts[0].blocks_count, Some(2));
        assert_eq!(exts[0].analytics.len(), 2);
        assert!(!exts[1].loaded);
        assert_eq!(exts[1].blocks_count, None);
        assert!(exts[1].analytics.is_empty());
    }

    #[test]
    fn declined_delete_is_a_no_op() {
        let inventory = Arc::new(FakeInventory::default());
        *inventory.extensions.lock().unwrap() = vec![stored("1", "a.zip")];
        let m = manager(inventory.clone());

        assert!(!m.delete(&stored("1", "a.zip"), &Answer(false)).expect("delete"));
        assert!(inventory.deleted.lock().unwrap().is_empty());

        assert!(m.delete(&stored("1", "a.zip"), &Answer(true)).expect("delete"));
        assert_eq!(*inventory.deleted.lock().unwrap(), ["1"]);
    }

    #[test]
    fn update_replaces_existing_binary() {
        let inventory = Arc::new(FakeInventory::default());
        *inventory.extensions.lock().unwrap() = vec![stored("old", "demo.zip"), stored("x", "other.zip")];
        let m = manager(inventory.clone());

        let id = m
            .upload("demo.zip", b"PK".to_vec(), UploadMode::Update)
            .expect("upload");
        assert_eq!(*inventory.deleted.lock().unwrap(), ["old"]);
        let names: Vec<_> = inventory
            .extensions
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.id.clone(), e.name.clone()))
            .collect();
        assert_eq!(
            names,
            [
                ("x".to_string(), "other.zip".to_string()),
                (id, "demo.zip".to_string())
            ]
        );
    }

    #[test]
    fn create_keeps_existing_and_cancel_deletes() {
        let inventory = Arc::new(FakeInventory::default());
        *inventory.extensions.lock().unwrap() = vec![stored("old", "demo.zip")];
        let m = manager(inventory.clone());

        let id = m.upload("demo", Vec::new(), UploadMode::Create).expect("upload");
        assert!(inventory.deleted.lock().unwrap().is_empty());
        m.cancel_upload(&id);
        assert_eq!(*inventory.deleted.lock().unwrap(), [id]);
    }
}
