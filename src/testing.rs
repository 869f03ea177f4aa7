//! In-memory service fakes for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;

use crate::alerts::Confirm;
use crate::api::{BackendApi, BuildRequest, BuildResponse, EngineApi, InventoryApi};
use crate::model::{
    DeployedBlock, EngineExtension, EngineMetadata, EngineStatus, Extension, Repository,
    RepositoryItem,
};
use crate::paging::{Alarm, Event, ListFilter, Page};

pub(crate) fn repo(id: &str, url: &str, enabled: bool) -> Repository {
    Repository {
        id: id.to_string(),
        name: format!("repo {}", id),
        url: url.to_string(),
        access_token: None,
        enabled,
    }
}

pub(crate) fn block(id: &str, extension: &str) -> DeployedBlock {
    DeployedBlock {
        id: id.to_string(),
        name: id.rsplit('.').next().unwrap_or(id).to_string(),
        category: None,
        description: String::new(),
        custom: crate::model::is_custom_block(id),
        extension: extension.to_string(),
        produces_output: None,
    }
}

pub(crate) fn entry(name: &str, kind: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "type": kind,
        "url": format!("https://api.example/contents/blocks/{}", name),
        "download_url": format!("https://raw.example/blocks/{}", name),
    })
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub stored: Mutex<Option<Vec<Repository>>>,
    pub saves: Mutex<Vec<Vec<Repository>>>,
    pub fail_load: AtomicBool,
    pub fail_save: AtomicBool,
    /// Listing payload per repository id; missing ids answer with an error.
    pub listings: Mutex<HashMap<String, serde_json::Value>>,
    /// Raw content per file name; missing files answer with an error.
    pub contents: Mutex<HashMap<String, String>>,
    pub list_calls: AtomicUsize,
    pub content_calls: AtomicUsize,
    pub build_status: Mutex<Option<u16>>,
    pub builds: Mutex<Vec<(String, String)>>,
}

impl FakeBackend {
    pub fn with_listing(self, repository_id: &str, payload: serde_json::Value) -> Self {
        self.listings
            .lock()
            .unwrap()
            .insert(repository_id.to_string(), payload);
        self
    }

    pub fn with_content(self, file: &str, content: &str) -> Self {
        self.contents
            .lock()
            .unwrap()
            .insert(file.to_string(), content.to_string());
        self
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }
}

impl BackendApi for FakeBackend {
    fn load_configuration(&self) -> Result<Option<Vec<Repository>>> {
        if self.fail_load.load(Ordering::SeqCst) {
            anyhow::bail!("backend unavailable");
        }
        Ok(self
            .stored
            .lock()
            .unwrap()
            .clone()
            .filter(|r| !r.is_empty()))
    }

    fn save_configuration(&self, repositories: &[Repository]) -> Result<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            anyhow::bail!("backend returned code 500");
        }
        self.saves.lock().unwrap().push(repositories.to_vec());
        *self.stored.lock().unwrap() = Some(repositories.to_vec());
        Ok(())
    }

    fn content_list(&self, repository: &Repository) -> Result<serde_json::Value> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.listings
            .lock()
            .unwrap()
            .get(&repository.id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("backend returned code 404: {}", repository.url))
    }

    fn content(&self, item: &RepositoryItem, _extract_fqn: bool) -> Result<String> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        self.contents
            .lock()
            .unwrap()
            .get(&item.file)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("backend returned code 404: {}", item.file))
    }

    fn build_extension(&self, request: &BuildRequest) -> Result<BuildResponse> {
        self.builds.lock().unwrap().push((
            request.endpoint().to_string(),
            request.extension_name().to_string(),
        ));
        let status = self.build_status.lock().unwrap().unwrap_or(200);
        let body = if status < 400 {
            b"PK\x03\x04archive".to_vec()
        } else {
            br#"{"message":"Error: build failed"}"#.to_vec()
        };
        let digest = (status < 400).then(|| blake3::hash(&body).to_hex().to_string());
        Ok(BuildResponse {
            status,
            body,
            digest,
        })
    }

    fn engine_id(&self) -> Result<Option<String>> {
        Ok(Some("4711".to_string()))
    }

    fn engine_status(&self) -> Result<EngineStatus> {
        Ok(EngineStatus {
            microservice_name: Some("apama-ctrl-1c-4g".to_string()),
            ..EngineStatus::default()
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeEngine {
    pub metadata: Mutex<EngineMetadata>,
    pub extensions: Mutex<HashMap<String, Vec<DeployedBlock>>>,
    pub metadata_calls: AtomicUsize,
    pub restarts: AtomicUsize,
    pub fail_restart: AtomicBool,
}

impl FakeEngine {
    pub fn with_extension(self, name: &str, blocks: Vec<DeployedBlock>) -> Self {
        self.metadata
            .lock()
            .unwrap()
            .metadatas
            .push(format!("{}.json", name));
        self.extensions
            .lock()
            .unwrap()
            .insert(name.to_string(), blocks);
        self
    }
}

impl EngineApi for FakeEngine {
    fn block_metadata(&self) -> Result<EngineMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.metadata.lock().unwrap().clone())
    }

    fn extension_detail(&self, name: &str) -> Result<Option<EngineExtension>> {
        Ok(self
            .extensions
            .lock()
            .unwrap()
            .get(name)
            .map(|blocks| EngineExtension {
                name: name.to_string(),
                analytics: blocks.clone(),
                version: "1.0".to_string(),
            }))
    }

    fn restart(&self) -> Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        if self.fail_restart.load(Ordering::SeqCst) {
            anyhow::bail!("restart rejected");
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeInventory {
    pub extensions: Mutex<Vec<Extension>>,
    pub deleted: Mutex<Vec<String>>,
    pub uploaded: Mutex<Vec<(String, usize)>>,
    pub alarms: Mutex<Vec<Alarm>>,
    pub filters: Mutex<Vec<ListFilter>>,
}

impl InventoryApi for FakeInventory {
    fn list_extensions(&self, _filter: &ListFilter) -> Result<Vec<Extension>> {
        Ok(self.extensions.lock().unwrap().clone())
    }

    fn upload_extension(&self, name: &str, archive: Vec<u8>) -> Result<String> {
        let mut uploaded = self.uploaded.lock().unwrap();
        uploaded.push((name.to_string(), archive.len()));
        let id = format!("bin-{}", uploaded.len());
        self.extensions.lock().unwrap().push(Extension {
            id: id.clone(),
            name: format!("{}.zip", name),
            ..Extension::default()
        });
        Ok(id)
    }

    fn delete_extension(&self, id: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(id.to_string());
        self.extensions.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    fn download_extension(&self, id: &str) -> Result<Vec<u8>> {
        Ok(id.as_bytes().to_vec())
    }

    fn list_alarms(&self, filter: &ListFilter) -> Result<Page<Alarm>> {
        self.filters.lock().unwrap().push(filter.clone());
        Ok(Page {
            items: self.alarms.lock().unwrap().clone(),
            current_page: filter.page.unwrap_or(1),
            total_pages: Some(1),
        })
    }

    fn list_events(&self, filter: &ListFilter) -> Result<Page<Event>> {
        self.filters.lock().unwrap().push(filter.clone());
        Ok(Page {
            items: Vec::new(),
            current_page: filter.page.unwrap_or(1),
            total_pages: Some(1),
        })
    }
}

pub(crate) struct Answer(pub bool);

impl Confirm for Answer {
    fn confirm(&self, _title: &str, _message: &str) -> bool {
        self.0
    }
}
