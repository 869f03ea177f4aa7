use super::*;

pub(super) fn repositories_path(data_dir: &Path) -> PathBuf {
    data_dir.join("repositories.json")
}

/// Missing, blank or malformed configuration all load as no repositories.
pub(super) fn load_repositories(data_dir: &Path) -> Result<Vec<Repository>> {
    let path = repositories_path(data_dir);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    match serde_json::from_slice(&bytes) {
        Ok(repositories) => Ok(repositories),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "ignoring malformed repository configuration"
            );
            Ok(Vec::new())
        }
    }
}

pub(super) fn persist_repositories(data_dir: &Path, repositories: &[Repository]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(repositories).context("serialize repositories")?;
    anabuild::config::write_atomic(&repositories_path(data_dir), &bytes)
        .context("write repositories.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_configuration_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_repositories(dir.path()).expect("missing").is_empty());

        std::fs::write(repositories_path(dir.path()), "{not json").expect("write");
        assert!(load_repositories(dir.path()).expect("malformed").is_empty());

        std::fs::write(
            repositories_path(dir.path()),
            r#"[{"id":"a1","name":"A","url":"https://github.com/u/r","enabled":true}]"#,
        )
        .expect("write");
        let loaded = load_repositories(dir.path()).expect("valid");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "a1");
    }
}
