//! Work directory population and the block SDK invocation.

use super::*;

pub(super) struct BuiltArchive {
    pub archive: Vec<u8>,
    pub digest: String,
}

/// `rel` below `root`, refusing absolute paths and `..`.
pub(super) fn contained_path(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel_path = Path::new(rel);
    let escapes = rel_path.components().any(|c| {
        !matches!(
            c,
            std::path::Component::Normal(_) | std::path::Component::CurDir
        )
    });
    if rel.is_empty() || escapes {
        anyhow::bail!("invalid file path {}", rel);
    }
    Ok(root.join(rel_path))
}

impl AppState {
    /// Downloads each `(relative path, url)` into `dir`.
    pub(super) async fn materialize(
        &self,
        dir: &Path,
        files: &[(String, String)],
        token: Option<&str>,
    ) -> Result<()> {
        for (rel, url) in files {
            let target = contained_path(dir, rel)?;
            let bytes = self
                .read(url, token)
                .await
                .with_context(|| format!("download {}", rel))?;
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            tokio::fs::write(&target, bytes)
                .await
                .with_context(|| format!("write {}", target.display()))?;
            tracing::debug!(file = %rel, "materialized");
        }
        Ok(())
    }

    /// Runs `{builder} build extension --input {dir} --output {dir}/{name}.zip`.
    pub(super) async fn build_archive(&self, dir: &Path, name: &str) -> Result<BuiltArchive> {
        let output = dir.join(format!("{}.zip", name));
        let out = tokio::process::Command::new(&self.builder)
            .arg("build")
            .arg("extension")
            .arg("--input")
            .arg(dir)
            .arg("--output")
            .arg(&output)
            .output()
            .await
            .with_context(|| format!("run {}", self.builder.display()))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            anyhow::bail!("extension build failed ({}): {}", out.status, stderr.trim());
        }
        let archive = tokio::fs::read(&output)
            .await
            .with_context(|| format!("read {}", output.display()))?;
        let digest = blake3::hash(&archive).to_hex().to_string();
        tracing::info!(extension = %name, bytes = archive.len(), "built extension");
        Ok(BuiltArchive { archive, digest })
    }
}

pub(super) fn archive_response(name: &str, built: BuiltArchive) -> Response {
    let mut resp = (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.zip\"", name),
            ),
        ],
        axum::body::Bytes::from(built.archive),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&built.digest) {
        resp.headers_mut()
            .insert(anabuild::model::ARCHIVE_DIGEST_HEADER, value);
    }
    resp
}
