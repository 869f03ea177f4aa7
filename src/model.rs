use serde::{Deserialize, Serialize};

/// Name of the manifest file that groups member files into named sections.
pub const DESCRIPTOR_YAML: &str = "extensions.yaml";

/// Inventory fragment that marks a managed object as an analytics extension binary.
pub const EXTENSION_FRAGMENT: &str = "pas_extension";

pub const CEP_PATH_EN: &str = "service/cep/apamacorrelator/EN";
pub const CEP_PATH_METADATA_EN: &str = "service/cep/apamacorrelator/EN/block-metadata.json";
pub const CEP_PATH_STATUS: &str = "service/cep/diagnostics/apamaCtrlStatus";
pub const CEP_PATH_RESTART: &str = "service/cep/restart";
pub const CEP_METADATA_FILE_EXTENSION: &str = ".json";

pub const DEFAULT_BACKEND_PATH: &str = "service/analytics-ext-service";

/// Response header carrying the blake3 hex digest of a built archive.
pub const ARCHIVE_DIGEST_HEADER: &str = "x-archive-blake3";

const BUILTIN_BLOCK_PREFIXES: [&str; 3] = [
    "apama.analyticsbuilder.blocks",
    "apama.analyticskit.blocks.core",
    "apama.analyticskit.blocks.cumulocity",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default)]
    pub enabled: bool,
}

impl Repository {
    pub fn new(name: &str, url: &str, enabled: bool) -> anyhow::Result<Self> {
        Ok(Self {
            id: generate_id()?,
            name: name.to_string(),
            url: url.to_string(),
            access_token: None,
            enabled,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    #[default]
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryItem {
    /// Fully-qualified block name for `.mon` files, the file name otherwise.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub file: String,

    #[serde(rename = "type", default)]
    pub item_type: ItemType,

    #[serde(default)]
    pub installed: bool,

    pub repository_name: String,
    pub repository_id: String,
    pub url: String,

    #[serde(default)]
    pub download_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions_yaml_item: Option<Box<RepositoryItem>>,
}

impl RepositoryItem {
    pub fn is_descriptor(&self) -> bool {
        self.item_type != ItemType::Dir && self.file.eq_ignore_ascii_case(DESCRIPTOR_YAML)
    }

    pub fn is_monitor(&self) -> bool {
        self.item_type == ItemType::File && self.file.to_ascii_lowercase().ends_with(".mon")
    }

    /// Url the raw content is read from; listings without a download url fall back to `url`.
    pub fn content_url(&self) -> &str {
        self.download_url.as_deref().unwrap_or(&self.url)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Input,
    Output,
    Logic,
    Calculation,
    Aggregate,
    FlowManipulation,
    Utility,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedBlock {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub category: Option<Category>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub custom: bool,

    #[serde(default)]
    pub extension: String,

    #[serde(default)]
    pub produces_output: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineMetadata {
    #[serde(default)]
    pub metadatas: Vec<String>,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// Extension as described by the engine (`EN/{name}.json`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineExtension {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub analytics: Vec<DeployedBlock>,
    #[serde(default)]
    pub version: String,
}

/// Extension binary stored in the platform inventory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub analytics: Vec<DeployedBlock>,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub loaded: bool,

    #[serde(default)]
    pub blocks_count: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    #[serde(default)]
    pub microservice_name: Option<String>,
    #[serde(default)]
    pub microservice_application_id: Option<String>,
    #[serde(default)]
    pub is_safe_mode: Option<bool>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryTestResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
}

/// Entry of a backend directory listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "type", default)]
    pub entry_type: ItemType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtensionFromSelection {
    pub extension_name: String,
    pub upload: bool,
    pub deploy: bool,
    pub monitors: Vec<RepositoryItem>,
    #[serde(default)]
    pub repository: Option<Repository>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtensionFromYaml {
    pub extension_name: String,
    pub yaml: RepositoryItem,
    pub sections: Vec<String>,
    pub repository: Repository,
    pub upload: bool,
    pub deploy: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtensionFromRepository {
    pub extension_name: String,
    pub upload: bool,
    pub deploy: bool,
    pub repository: Repository,
}

pub fn is_custom_block(id: &str) -> bool {
    !BUILTIN_BLOCK_PREFIXES.iter().any(|p| id.starts_with(p))
}

/// Strips the last `.ext` from a file name (`Foo.mon` -> `Foo`).
pub fn remove_file_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if !name[idx + 1..].contains('/') => &name[..idx],
        _ => name,
    }
}

/// Returns the lowercase extension including the dot, ignoring any query or fragment.
pub fn file_extension(name: &str) -> Option<String> {
    let name = name.split(['?', '#']).next().unwrap_or(name);
    let idx = name.rfind('.')?;
    let ext = &name[idx + 1..];
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

/// Short opaque id: 6 lowercase base36 characters.
pub fn generate_id() -> anyhow::Result<String> {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut bytes = [0u8; 6];
    getrandom::getrandom(&mut bytes).map_err(|e| anyhow::anyhow!("getrandom: {:?}", e))?;
    Ok(bytes
        .iter()
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_prefixes_are_not_custom() {
        assert!(!is_custom_block("apama.analyticsbuilder.blocks.Average"));
        assert!(!is_custom_block("apama.analyticskit.blocks.core.Expression"));
        assert!(!is_custom_block("apama.analyticskit.blocks.cumulocity.MeasurementInput"));
        assert!(is_custom_block("pkg.Foo"));
    }

    #[test]
    fn file_extension_ignores_query_and_case() {
        assert_eq!(file_extension("meta.JSON").as_deref(), Some(".json"));
        assert_eq!(file_extension("Foo.mon?ref=main").as_deref(), Some(".mon"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(remove_file_extension("Foo.mon"), "Foo");
        assert_eq!(remove_file_extension("blocks"), "blocks");
    }

    #[test]
    fn generated_ids_are_short_base36() {
        let id = generate_id().expect("generate id");
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn repository_uses_camel_case_access_token() {
        let json = r#"{"id":"r1","name":"n","url":"u","accessToken":"t","enabled":true}"#;
        let repo: Repository = serde_json::from_str(json).expect("parse repository");
        assert_eq!(repo.access_token.as_deref(), Some("t"));
        let back = serde_json::to_value(&repo).expect("serialize repository");
        assert_eq!(back["accessToken"], "t");
    }

    #[test]
    fn unknown_item_types_map_to_other() {
        let e: ContentEntry =
            serde_json::from_str(r#"{"name":"x","type":"weird"}"#).expect("parse entry");
        assert_eq!(e.entry_type, ItemType::Other);
    }
}
