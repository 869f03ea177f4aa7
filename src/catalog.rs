//! Candidate blocks across all enabled repositories.

use std::sync::Arc;

use anyhow::Result;

use crate::alerts::AlertSink;
use crate::api::BackendApi;
use crate::cache::{Cache, CacheKey};
use crate::content::ContentFetcher;
use crate::engine::Engine;
use crate::model::{DeployedBlock, Repository, RepositoryItem};
use crate::registry::RepositoryRegistry;
use crate::resolver::{Resolver, mark_installed, selectable};

pub struct Catalog {
    registry: Arc<RepositoryRegistry>,
    engine: Arc<Engine>,
    fetcher: ContentFetcher,
    resolver: Resolver,
    cache: Arc<Cache>,
    alerts: Arc<dyn AlertSink>,
}

impl Catalog {
    pub fn new(
        backend: Arc<dyn BackendApi>,
        registry: Arc<RepositoryRegistry>,
        engine: Arc<Engine>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let cache = engine.cache().clone();
        Self {
            registry,
            engine,
            fetcher: ContentFetcher::new(backend.clone()),
            resolver: Resolver::new(backend),
            cache,
            alerts,
        }
    }

    /// Resolved items of one repository, memoized until [`Catalog::reload`].
    ///
    /// A failed listing is not memoized, nor is one where some block content
    /// could not be fetched.
    pub fn repository_items(&self, repository: &Repository) -> Result<Arc<Vec<RepositoryItem>>> {
        let slot = self.cache.listing(&repository.id);
        if let Some(items) = slot.peek() {
            return Ok(items);
        }
        let items = self.fetcher.list_items(repository)?;
        let resolution = self.resolver.resolve(items, repository);
        if resolution.has_fetch_failures() {
            tracing::warn!(
                repository = %repository.id,
                unresolved = resolution.failures.len(),
                "partial listing, not cached"
            );
            return Ok(Arc::new(resolution.items));
        }
        Ok(slot.set(resolution.items))
    }

    /// Items of every enabled repository with `installed` applied.
    ///
    /// A repository whose listing fails contributes nothing; only when every
    /// repository fails is the user alerted.
    pub fn items(&self, hide_installed: bool) -> Result<Vec<RepositoryItem>> {
        let repositories: Vec<Repository> = self
            .registry
            .load()?
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect();

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = repositories
                .iter()
                .map(|repo| scope.spawn(move || self.repository_items(repo)))
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(anyhow::anyhow!("listing thread panicked")))
                })
                .collect()
        });

        let mut items = Vec::new();
        let mut failed = Vec::new();
        for (repo, result) in repositories.iter().zip(results) {
            match result {
                Ok(listing) => items.extend(listing.iter().cloned()),
                Err(err) => {
                    tracing::warn!(
                        repository = %repo.id,
                        error = %format!("{:#}", err),
                        "repository listing failed"
                    );
                    failed.push(repo.name.clone());
                }
            }
        }
        if !repositories.is_empty() && failed.len() == repositories.len() {
            self.alerts.danger(
                "Failed to load content of repositories",
                Some(failed.join(", ")),
            );
        }

        Ok(mark_installed(items, &self.deployed(), hide_installed))
    }

    /// Items of one repository as offered for selection.
    pub fn selectable(
        &self,
        repository: &Repository,
        hide_installed: bool,
    ) -> Result<Vec<RepositoryItem>> {
        let items = self.repository_items(repository)?;
        let items = mark_installed(items.to_vec(), &self.deployed(), hide_installed);
        Ok(selectable(&items))
    }

    /// Deployed-block snapshot; an unreachable engine counts as nothing deployed.
    fn deployed(&self) -> Arc<Vec<DeployedBlock>> {
        self.engine.deployed_blocks().unwrap_or_else(|err| {
            tracing::warn!(error = %format!("{:#}", err), "deployed blocks unavailable");
            Arc::default()
        })
    }

    /// Forgets every memoized listing; the next read fetches again.
    pub fn reload(&self) {
        self.cache.invalidate(CacheKey::AllListings);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::alerts::{AlertLevel, RecordingAlerts};
    use crate::testing::{FakeBackend, FakeEngine, block, entry, repo};
    use serde_json::json;

    fn catalog(
        backend: FakeBackend,
        repos: Vec<Repository>,
    ) -> (Catalog, Arc<FakeBackend>, Arc<RecordingAlerts>) {
        let backend = Arc::new(backend);
        *backend.stored.lock().unwrap() = Some(repos);
        let alerts = Arc::new(RecordingAlerts::default());
        let registry = Arc::new(RepositoryRegistry::new(backend.clone(), alerts.clone()));
        let engine = Arc::new(Engine::new(
            Arc::new(FakeEngine::default().with_extension("ext", vec![block("pkg.Foo", "")])),
            backend.clone(),
            Arc::new(Cache::new()),
        ));
        (
            Catalog::new(backend.clone(), registry, engine, alerts.clone()),
            backend,
            alerts,
        )
    }

    fn populated() -> FakeBackend {
        FakeBackend::default()
            .with_listing(
                "r1",
                json!([
                    entry("Foo.mon", "file"),
                    entry("Bar.mon", "file"),
                    entry("meta.json", "file"),
                ]),
            )
            .with_listing("r2", json!([entry("Baz.mon", "file")]))
            .with_content("Foo.mon", "package pkg;")
            .with_content("Bar.mon", "package pkg;")
            .with_content("Baz.mon", "package other;")
    }

    #[test]
    fn merges_enabled_repositories_and_flags_installed() {
        let (catalog, _, _) = catalog(
            populated(),
            vec![
                repo("r1", "https://x/1", true),
                repo("r2", "https://x/2", true),
                repo("r3", "https://x/3", false),
            ],
        );
        let mut items = catalog.items(false).expect("items");
        items.sort_by(|a, b| a.id.cmp(&b.id));

        let ids: Vec<_> = items.iter().filter_map(|i| i.id.as_deref()).collect();
        assert_eq!(ids, ["other.Baz", "pkg.Bar", "pkg.Foo"]);
        assert!(items[2].installed);
        assert!(!items[0].installed);

        let hidden = catalog.items(true).expect("items");
        assert_eq!(hidden.len(), 2);
    }

    #[test]
    fn listings_are_memoized_until_reload() {
        let (catalog, backend, _) = catalog(populated(), vec![repo("r1", "https://x/1", true)]);
        catalog.items(false).expect("items");
        catalog.items(false).expect("items");
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.content_calls.load(Ordering::SeqCst), 2);

        catalog.reload();
        catalog.items(false).expect("items");
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn partial_listings_are_fetched_again() {
        let backend = FakeBackend::default()
            .with_listing(
                "r1",
                json!([entry("Foo.mon", "file"), entry("Late.mon", "file")]),
            )
            .with_content("Foo.mon", "package pkg;");
        let (catalog, backend, _) = catalog(backend, vec![repo("r1", "https://x/1", true)]);

        let first = catalog.items(false).expect("items");
        assert_eq!(first.len(), 1);

        backend
            .contents
            .lock()
            .unwrap()
            .insert("Late.mon".to_string(), "package pkg;".to_string());
        let second = catalog.items(false).expect("items");
        assert_eq!(second.len(), 2);
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 2);

        catalog.items(false).expect("items");
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn blocks_without_package_are_still_memoized() {
        let backend = FakeBackend::default()
            .with_listing("r1", json!([entry("Foo.mon", "file"), entry("Bad.mon", "file")]))
            .with_content("Foo.mon", "package pkg;")
            .with_content("Bad.mon", "monitor Bad {}");
        let (catalog, backend, _) = catalog(backend, vec![repo("r1", "https://x/1", true)]);

        assert_eq!(catalog.items(false).expect("items").len(), 1);
        assert_eq!(catalog.items(false).expect("items").len(), 1);
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn one_failing_repository_degrades_to_empty() {
        let (catalog, _, alerts) = catalog(
            populated(),
            vec![repo("r1", "https://x/1", true), repo("gone", "https://x/g", true)],
        );
        assert_eq!(catalog.items(false).expect("items").len(), 2);
        assert!(alerts.take().is_empty());
    }

    #[test]
    fn all_repositories_failing_alerts_once() {
        let (catalog, _, alerts) = catalog(
            FakeBackend::default(),
            vec![repo("a", "https://x/a", true), repo("b", "https://x/b", true)],
        );
        assert!(catalog.items(false).expect("items").is_empty());
        let alerts = alerts.take();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Danger);
    }

    #[test]
    fn selectable_hides_installed_blocks() {
        let r1 = repo("r1", "https://x/1", true);
        let (catalog, _, _) = catalog(populated(), vec![r1.clone()]);
        let offered = catalog.selectable(&r1, true).expect("selectable");
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].name, "Bar");
    }
}
