//! Configured source repositories, persisted as one replace-all list by the backend.

use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;

use crate::alerts::AlertSink;
use crate::api::BackendApi;
use crate::model::Repository;

const GITHUB_CONTENTS: &str = "https://api.github.com/repos/SoftwareAG";

/// Well-known sample sources used when nothing is stored yet.
pub fn default_repositories() -> Result<Vec<Repository>> {
    Ok(vec![
        Repository::new(
            "Block SDK Samples",
            &format!(
                "{}/apama-analytics-builder-block-sdk/contents/samples/blocks",
                GITHUB_CONTENTS
            ),
            true,
        )?,
        Repository::new(
            "Contrib Samples Block",
            &format!(
                "{}/analytics-builder-blocks-contrib/contents/blocks",
                GITHUB_CONTENTS
            ),
            false,
        )?,
        Repository::new(
            "Contrib Samples Simulation-Block",
            &format!(
                "{}/analytics-builder-blocks-contrib/contents/simulation-blocks",
                GITHUB_CONTENTS
            ),
            false,
        )?,
        Repository::new(
            "Contrib Samples Cumulocity-Block",
            &format!(
                "{}/analytics-builder-blocks-contrib/contents/cumulocity-blocks",
                GITHUB_CONTENTS
            ),
            false,
        )?,
    ])
}

type Snapshot = Arc<Vec<Repository>>;

#[derive(Default)]
struct RegistryState {
    current: Snapshot,
    saved: Snapshot,
    dirty: bool,
    loaded: bool,
    subscribers: Vec<Sender<Snapshot>>,
}

impl RegistryState {
    fn replace(&mut self, repos: Vec<Repository>, dirty: bool) -> Snapshot {
        self.current = Arc::new(repos);
        self.dirty |= dirty;
        let snapshot = self.current.clone();
        self.subscribers
            .retain(|tx| tx.send(snapshot.clone()).is_ok());
        snapshot
    }
}

pub struct RepositoryRegistry {
    backend: Arc<dyn BackendApi>,
    alerts: Arc<dyn AlertSink>,
    state: Mutex<RegistryState>,
}

impl RepositoryRegistry {
    pub fn new(backend: Arc<dyn BackendApi>, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            backend,
            alerts,
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn list(&self) -> Snapshot {
        self.state().current.clone()
    }

    /// Receives the full list after every change, starting with the current one.
    pub fn subscribe(&self) -> Receiver<Snapshot> {
        let (tx, rx) = channel();
        let mut st = self.state();
        if tx.send(st.current.clone()).is_ok() {
            st.subscribers.push(tx);
        }
        rx
    }

    pub fn add(&self, repository: Repository) {
        let mut st = self.state();
        let mut repos = st.current.as_ref().clone();
        repos.push(repository);
        st.replace(repos, true);
    }

    /// Replaces the repository with the same id; unknown ids are ignored.
    pub fn update(&self, repository: Repository) -> bool {
        let mut st = self.state();
        let Some(idx) = st.current.iter().position(|r| r.id == repository.id) else {
            return false;
        };
        let mut repos = st.current.as_ref().clone();
        repos[idx] = repository;
        st.replace(repos, true);
        true
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let Some(mut repo) = self.get(id) else {
            return false;
        };
        repo.enabled = enabled;
        self.update(repo)
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut st = self.state();
        if !st.current.iter().any(|r| r.id == id) {
            return false;
        }
        let repos = st
            .current
            .iter()
            .filter(|r| r.id != id)
            .cloned()
            .collect();
        st.replace(repos, true);
        true
    }

    pub fn get(&self, id: &str) -> Option<Repository> {
        self.state().current.iter().find(|r| r.id == id).cloned()
    }

    pub fn enabled(&self) -> Vec<Repository> {
        self.state()
            .current
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.state().dirty
    }

    pub fn has_unsaved_changes(&self) -> bool {
        let st = self.state();
        st.current != st.saved
    }

    /// Reverts local edits to the last saved list.
    pub fn cancel_changes(&self) {
        let mut st = self.state();
        let saved = st.saved.as_ref().clone();
        st.replace(saved, false);
        st.dirty = false;
    }

    /// Sends the full list to the backend when there are local edits.
    ///
    /// Local edits survive a failed save.
    pub fn persist(&self) -> Result<bool> {
        let mut st = self.state();
        if !st.dirty {
            return Ok(false);
        }
        match self.backend.save_configuration(&st.current) {
            Ok(()) => {
                st.dirty = false;
                st.saved = st.current.clone();
                tracing::info!(count = st.current.len(), "saved repository configuration");
                self.alerts.success("Updated repositories successfully");
                Ok(true)
            }
            Err(err) => {
                self.alerts
                    .danger("Failed to save repositories", Some(format!("{:#}", err)));
                Err(err)
            }
        }
    }

    /// Loads the stored list once; an empty store is seeded with the default samples.
    pub fn load(&self) -> Result<Snapshot> {
        let mut st = self.state();
        if st.loaded {
            return Ok(st.current.clone());
        }

        let repos = match self.backend.load_configuration() {
            Ok(Some(repos)) => repos,
            Ok(None) => {
                let seed = default_repositories()?;
                tracing::info!(count = seed.len(), "seeding default repositories");
                if let Err(err) = self.backend.save_configuration(&seed) {
                    self.alerts
                        .danger("Failed to save repositories", Some(format!("{:#}", err)));
                    st.loaded = true;
                    st.saved = Arc::new(Vec::new());
                    return Ok(st.replace(seed, true));
                }
                seed
            }
            Err(err) => {
                self.alerts
                    .danger("Failed to load repositories", Some(format!("{:#}", err)));
                return Ok(st.current.clone());
            }
        };

        st.loaded = true;
        st.dirty = false;
        let snapshot = st.replace(repos, false);
        st.saved = snapshot.clone();
        Ok(snapshot)
    }

    /// Forgets the memoized load; the next `load` refetches.
    pub fn invalidate(&self) {
        self.state().loaded = false;
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
