//! Server-side packaging of selected blocks into extension archives.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::alerts::{Alert, AlertLevel, AlertSink};
use crate::api::{BackendApi, BuildRequest, BuildResponse, EngineApi, error_detail};
use crate::cache::{Cache, CacheKey};
use crate::model::{
    ExtensionFromRepository, ExtensionFromSelection, ExtensionFromYaml, Repository,
    RepositoryItem,
};

mod flow;
pub use self::flow::{ExtensionFlow, FlowState};

/// Archive returned by a successful build.
#[derive(Clone, Debug)]
pub struct PackageResult {
    pub name: String,
    pub archive: Vec<u8>,
    pub digest: Option<String>,
}

impl PackageResult {
    pub fn file_name(&self) -> String {
        format!("{}.zip", self.name)
    }
}

pub struct Assembler {
    backend: Arc<dyn BackendApi>,
    engine: Arc<dyn EngineApi>,
    cache: Arc<Cache>,
    alerts: Arc<dyn AlertSink>,
}

impl Assembler {
    pub fn new(
        backend: Arc<dyn BackendApi>,
        engine: Arc<dyn EngineApi>,
        cache: Arc<Cache>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            backend,
            engine,
            cache,
            alerts,
        }
    }

    pub fn build_from_selection(
        &self,
        name: &str,
        items: &[RepositoryItem],
        repository: Option<&Repository>,
        upload: bool,
        deploy: bool,
    ) -> Result<PackageResult> {
        validate_name(name)?;
        if items.is_empty() {
            anyhow::bail!("no blocks selected for extension {}", name);
        }
        self.submit(BuildRequest::Selection(ExtensionFromSelection {
            extension_name: name.to_string(),
            upload,
            deploy,
            monitors: items.to_vec(),
            repository: repository.cloned(),
        }))
    }

    /// Builds every member of the manifest section `section_item` stands for.
    pub fn build_from_manifest_section(
        &self,
        name: &str,
        section_item: &RepositoryItem,
        repository: &Repository,
        upload: bool,
        deploy: bool,
    ) -> Result<PackageResult> {
        validate_name(name)?;
        let section = section_item
            .section
            .clone()
            .with_context(|| format!("{} is not a manifest section", section_item.name))?;
        let yaml = section_item
            .extensions_yaml_item
            .as_deref()
            .cloned()
            .with_context(|| format!("section {} has no manifest", section))?;
        self.submit(BuildRequest::Yaml(ExtensionFromYaml {
            extension_name: name.to_string(),
            yaml,
            sections: vec![section],
            repository: repository.clone(),
            upload,
            deploy,
        }))
    }

    /// Builds every block file of a repository.
    pub fn build_from_repository(
        &self,
        name: &str,
        repository: &Repository,
        upload: bool,
        deploy: bool,
    ) -> Result<PackageResult> {
        validate_name(name)?;
        self.submit(BuildRequest::Repository(ExtensionFromRepository {
            extension_name: name.to_string(),
            upload,
            deploy,
            repository: repository.clone(),
        }))
    }

    fn submit(&self, request: BuildRequest) -> Result<PackageResult> {
        let name = request.extension_name().to_string();
        let deploy = request.deploy();
        tracing::info!(extension = %name, endpoint = request.endpoint(), "requesting build");

        let result = self
            .backend
            .build_extension(&request)
            .with_context(|| format!("build extension {}", name))
            .and_then(|resp| accept(&name, resp));
        let package = match result {
            Ok(p) => p,
            Err(err) => {
                self.alerts.alert(Alert {
                    level: AlertLevel::Warning,
                    message: format!("Uploaded extension {}.zip was not successful", name),
                    detail: Some(format!("{:#}", err)),
                });
                return Err(err);
            }
        };

        if deploy {
            self.alerts.success(&format!(
                "Created extension {}.zip has been uploaded and Streaming Analytics Engine is restarting ...",
                name
            ));
        } else {
            self.alerts.success(
                "The selected blocks have been uploaded. They will be available in Analytics Builder after the next Apama restart.",
            );
        }
        self.cache.invalidate(CacheKey::Extensions);
        self.cache.invalidate(CacheKey::DeployedBlocks);
        Ok(package)
    }

    /// Asks the engine to restart; failures are logged, caches are dropped either way.
    pub fn restart_engine(&self) {
        match self.engine.restart() {
            Ok(()) => tracing::info!("engine restart requested"),
            Err(err) => tracing::warn!(error = %format!("{:#}", err), "engine restart failed"),
        }
        self.cache.invalidate_engine();
    }
}

/// Archive names become file names on both ends.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("extension name must not be empty");
    }
    if name.contains(['/', '\\']) || name.starts_with('.') {
        anyhow::bail!("invalid extension name {:?}", name);
    }
    Ok(())
}

fn accept(name: &str, resp: BuildResponse) -> Result<PackageResult> {
    if resp.status >= 400 {
        let detail = error_detail(&String::from_utf8_lossy(&resp.body));
        anyhow::bail!("build of {}.zip returned code {}: {}", name, resp.status, detail);
    }
    if let Some(expected) = resp.digest.as_deref() {
        let actual = blake3::hash(&resp.body).to_hex();
        if !actual.as_str().eq_ignore_ascii_case(expected.trim()) {
            anyhow::bail!(
                "archive digest mismatch for {}.zip: expected {}, got {}",
                name,
                expected,
                actual
            );
        }
    }
    Ok(PackageResult {
        name: name.to_string(),
        archive: resp.body,
        digest: resp.digest,
    })
}

#[cfg(test)]
#[path = "tests/assembler_tests.rs"]
mod tests;
