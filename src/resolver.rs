//! Resolves candidate items to fully-qualified block names and installed state.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use regex::Regex;

use crate::api::BackendApi;
use crate::descriptor::{Manifest, section_items};
use crate::model::{DeployedBlock, ItemType, Repository, RepositoryItem, remove_file_extension};

/// Upper bound on content fetches running at once for one repository.
pub const MAX_CONCURRENT_FETCHES: usize = 8;

static PACKAGE_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^package[ \t]+([^;\n]+);").expect("valid regex"));

/// `package a.b;` + `Foo.mon` -> `a.b.Foo`. `None` without a package declaration.
pub fn extract_fqn(content: &str, file: &str) -> Option<String> {
    let package = PACKAGE_DECLARATION
        .captures(content)?
        .get(1)?
        .as_str()
        .trim();
    if package.is_empty() {
        return None;
    }
    Some(format!("{}.{}", package, remove_file_extension(file)))
}

#[derive(Debug)]
pub struct ResolveFailure {
    pub file: String,
    pub error: anyhow::Error,
    /// The content could not be fetched; a later attempt may succeed.
    pub fetch: bool,
}

impl ResolveFailure {
    fn fetch(item: &RepositoryItem, error: anyhow::Error) -> Self {
        Self {
            file: item.file.clone(),
            error: error.context(format!("fetch {}", item.file)),
            fetch: true,
        }
    }

    fn content(item: &RepositoryItem, error: anyhow::Error) -> Self {
        Self {
            file: item.file.clone(),
            error,
            fetch: false,
        }
    }
}

/// Items that resolved, plus the ones that did not.
#[derive(Debug, Default)]
pub struct Resolution {
    pub items: Vec<RepositoryItem>,
    pub failures: Vec<ResolveFailure>,
}

impl Resolution {
    pub fn has_fetch_failures(&self) -> bool {
        self.failures.iter().any(|f| f.fetch)
    }
}

pub struct Resolver {
    backend: Arc<dyn BackendApi>,
}

impl Resolver {
    pub fn new(backend: Arc<dyn BackendApi>) -> Self {
        Self { backend }
    }

    /// Assigns ids to `items`. A failing item never affects its siblings.
    ///
    /// `.mon` files are identified by their package-qualified name, a descriptor
    /// is expanded into one item per manifest section, everything else keeps its
    /// file name as id.
    pub fn resolve(&self, items: Vec<RepositoryItem>, repository: &Repository) -> Resolution {
        let mut resolution = Resolution::default();
        for batch in items.chunks(MAX_CONCURRENT_FETCHES) {
            let results: Vec<_> = std::thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|item| scope.spawn(move || self.resolve_one(item)))
                    .collect();
                handles
                    .into_iter()
                    .zip(batch)
                    .map(|(h, item)| {
                        h.join().unwrap_or_else(|_| {
                            Err(ResolveFailure::fetch(
                                item,
                                anyhow::anyhow!("resolver thread panicked"),
                            ))
                        })
                    })
                    .collect()
            });

            for result in results {
                match result {
                    Ok(resolved) => resolution.items.extend(resolved),
                    Err(failure) => {
                        tracing::warn!(
                            repository = %repository.id,
                            file = %failure.file,
                            fetch = failure.fetch,
                            error = %format!("{:#}", failure.error),
                            "failed to resolve item"
                        );
                        resolution.failures.push(failure);
                    }
                }
            }
        }
        resolution
    }

    fn resolve_one(&self, item: &RepositoryItem) -> Result<Vec<RepositoryItem>, ResolveFailure> {
        if item.is_descriptor() {
            let text = self
                .backend
                .content(item, false)
                .map_err(|e| ResolveFailure::fetch(item, e))?;
            let manifest = Manifest::parse(&text)
                .with_context(|| format!("parse {}", item.file))
                .map_err(|e| ResolveFailure::content(item, e))?;
            let mut descriptor = item.clone();
            descriptor.id = Some(item.file.clone());
            return Ok(section_items(&descriptor, &manifest));
        }

        let mut resolved = item.clone();
        if item.is_monitor() {
            let content = self
                .backend
                .content(item, false)
                .map_err(|e| ResolveFailure::fetch(item, e))?;
            let fqn = extract_fqn(&content, &item.file)
                .with_context(|| format!("no package declaration in {}", item.file))
                .map_err(|e| ResolveFailure::content(item, e))?;
            resolved.id = Some(fqn);
        } else {
            resolved.id = Some(item.file.clone());
        }
        Ok(vec![resolved])
    }
}

/// Flags items whose id is deployed, or drops them when `hide_installed` is set.
pub fn mark_installed(
    items: Vec<RepositoryItem>,
    deployed: &[DeployedBlock],
    hide_installed: bool,
) -> Vec<RepositoryItem> {
    let ids: HashSet<&str> = deployed.iter().map(|b| b.id.as_str()).collect();
    items
        .into_iter()
        .map(|mut item| {
            item.installed = item.id.as_deref().is_some_and(|id| ids.contains(id));
            item
        })
        .filter(|item| !(hide_installed && item.installed))
        .collect()
}

/// Items offered for selection.
///
/// When a descriptor was expanded only its sections are offered; otherwise
/// visible directories and `.mon` files.
pub fn selectable(items: &[RepositoryItem]) -> Vec<RepositoryItem> {
    if items.iter().any(|i| i.section.is_some()) {
        return items
            .iter()
            .filter(|i| i.section.is_some())
            .cloned()
            .collect();
    }
    items
        .iter()
        .filter(|i| {
            (i.item_type == ItemType::Dir && !i.file.starts_with('.')) || i.is_monitor()
        })
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "tests/resolver_tests.rs"]
mod tests;
