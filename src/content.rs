//! Repository directory listings, normalized into candidate items.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::api::BackendApi;
use crate::model::{ContentEntry, ItemType, Repository, RepositoryItem};
use crate::model::{file_extension, remove_file_extension};

/// Extensions treated as metadata rather than candidate blocks.
const EXCLUDED_EXTENSIONS: [&str; 1] = [".json"];

pub struct ContentFetcher {
    backend: Arc<dyn BackendApi>,
}

impl ContentFetcher {
    pub fn new(backend: Arc<dyn BackendApi>) -> Self {
        Self { backend }
    }

    /// Fresh listing of one repository; every call hits the backend.
    pub fn list_items(&self, repository: &Repository) -> Result<Vec<RepositoryItem>> {
        let payload = self
            .backend
            .content_list(repository)
            .with_context(|| format!("list content of {}", repository.name))?;
        let items = normalize(&payload, repository);
        tracing::debug!(
            repository = %repository.id,
            count = items.len(),
            "listed repository content"
        );
        Ok(items)
    }
}

/// Flattens any supported listing shape into candidate items.
///
/// Accepts an array of entries, an object keyed by file name, a single entry,
/// or directory trees with `children`.
pub fn normalize(payload: &Value, repository: &Repository) -> Vec<RepositoryItem> {
    let mut entries = Vec::new();
    collect_entries(payload, &mut entries);
    entries
        .into_iter()
        .filter_map(|e| to_item(e, repository))
        .collect()
}

fn looks_like_entry(map: &serde_json::Map<String, Value>) -> bool {
    ["name", "path", "url", "type", "download_url"]
        .iter()
        .any(|k| map.contains_key(*k))
}

fn collect_entries(value: &Value, out: &mut Vec<ContentEntry>) {
    match value {
        Value::Array(values) => {
            for v in values {
                collect_entries(v, out);
            }
        }
        Value::Object(map) if looks_like_entry(map) => {
            match serde_json::from_value::<ContentEntry>(value.clone()) {
                Ok(entry) => flatten(entry, out),
                Err(err) => tracing::warn!(error = %err, "skipping malformed listing entry"),
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_entries(v, out);
            }
        }
        Value::Null => {}
        other => tracing::warn!(value = %other, "skipping unexpected listing value"),
    }
}

fn flatten(mut entry: ContentEntry, out: &mut Vec<ContentEntry>) {
    let children = std::mem::take(&mut entry.children);
    out.push(entry);
    for child in children {
        flatten(child, out);
    }
}

fn to_item(entry: ContentEntry, repository: &Repository) -> Option<RepositoryItem> {
    let file = entry
        .name
        .clone()
        .or_else(|| {
            entry
                .path
                .as_deref()
                .and_then(|p| p.trim_end_matches('/').rsplit('/').next())
                .map(str::to_string)
        })
        .filter(|n| !n.is_empty());
    let url = entry.url.clone().or_else(|| entry.download_url.clone());
    let (Some(file), Some(url)) = (file, url) else {
        tracing::warn!(
            repository = %repository.id,
            name = ?entry.name,
            "skipping listing entry without name or url"
        );
        return None;
    };

    if entry.entry_type != ItemType::Dir && is_excluded(&file) {
        return None;
    }

    let name = match entry.entry_type {
        ItemType::Dir => file.clone(),
        _ => remove_file_extension(&file).to_string(),
    };
    Some(RepositoryItem {
        id: None,
        name,
        file,
        item_type: entry.entry_type,
        installed: false,
        repository_name: repository.name.clone(),
        repository_id: repository.id.clone(),
        url,
        download_url: entry.download_url,
        section: None,
        extensions_yaml_item: None,
    })
}

pub fn is_excluded(file: &str) -> bool {
    file_extension(file).is_some_and(|ext| EXCLUDED_EXTENSIONS.contains(&ext.as_str()))
}
