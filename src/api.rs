//! Seams between the pipeline and the services it talks to.
//!
//! `PlatformClient` implements all of them over HTTP; tests substitute in-memory fakes.

use anyhow::Result;

use crate::model::{
    EngineExtension, EngineMetadata, EngineStatus, Extension, ExtensionFromRepository,
    ExtensionFromSelection, ExtensionFromYaml, Repository, RepositoryItem,
};
use crate::paging::{Alarm, Event, ListFilter, Page};

pub enum BuildRequest {
    Selection(ExtensionFromSelection),
    Yaml(ExtensionFromYaml),
    Repository(ExtensionFromRepository),
}

impl BuildRequest {
    pub fn extension_name(&self) -> &str {
        match self {
            BuildRequest::Selection(r) => &r.extension_name,
            BuildRequest::Yaml(r) => &r.extension_name,
            BuildRequest::Repository(r) => &r.extension_name,
        }
    }

    pub fn deploy(&self) -> bool {
        match self {
            BuildRequest::Selection(r) => r.deploy,
            BuildRequest::Yaml(r) => r.deploy,
            BuildRequest::Repository(r) => r.deploy,
        }
    }

    /// Endpoint below `{backend}/extension`.
    pub fn endpoint(&self) -> &'static str {
        match self {
            BuildRequest::Selection(_) => "extension",
            BuildRequest::Yaml(_) => "extension/yaml",
            BuildRequest::Repository(_) => "extension/repository",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BuildResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// blake3 hex digest announced by the server, if any.
    pub digest: Option<String>,
}

/// Endpoints of the packaging microservice.
pub trait BackendApi: Send + Sync {
    /// `None` when nothing usable is stored (missing, empty or malformed).
    fn load_configuration(&self) -> Result<Option<Vec<Repository>>>;
    fn save_configuration(&self, repositories: &[Repository]) -> Result<()>;
    /// Raw directory listing payload for one repository.
    fn content_list(&self, repository: &Repository) -> Result<serde_json::Value>;
    fn content(&self, item: &RepositoryItem, extract_fqn: bool) -> Result<String>;
    fn build_extension(&self, request: &BuildRequest) -> Result<BuildResponse>;
    fn engine_id(&self) -> Result<Option<String>>;
    fn engine_status(&self) -> Result<EngineStatus>;
}

/// Read and control surface of the streaming analytics engine.
pub trait EngineApi: Send + Sync {
    fn block_metadata(&self) -> Result<EngineMetadata>;
    fn extension_detail(&self, name: &str) -> Result<Option<EngineExtension>>;
    fn restart(&self) -> Result<()>;
}

/// Platform inventory, binary storage and monitoring lists.
pub trait InventoryApi: Send + Sync {
    fn list_extensions(&self, filter: &ListFilter) -> Result<Vec<Extension>>;
    fn upload_extension(&self, name: &str, archive: Vec<u8>) -> Result<String>;
    fn delete_extension(&self, id: &str) -> Result<()>;
    fn download_extension(&self, id: &str) -> Result<Vec<u8>>;
    fn list_alarms(&self, filter: &ListFilter) -> Result<Page<Alarm>>;
    fn list_events(&self, filter: &ListFilter) -> Result<Page<Event>>;
}

/// Best-effort message from an error body: `message`, then `error`, then the raw text.
pub fn error_detail(body: &str) -> String {
    let detail = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(v) => v
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| v.get("error").and_then(|m| m.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| v.to_string()),
        Err(_) => body.to_string(),
    };
    detail.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_prefers_message_then_error() {
        assert_eq!(error_detail(r#"{"message":"m","error":"e"}"#), "m");
        assert_eq!(error_detail(r#"{"error":"e"}"#), "e");
        assert_eq!(error_detail(r#"{"code":1}"#), r#"{"code":1}"#);
        assert_eq!(error_detail(" plain text \n"), "plain text");
    }
}
