use std::collections::BTreeMap;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use anabuild::descriptor::Manifest;
use anabuild::model::{ExtensionFromRepository, ExtensionFromSelection, ExtensionFromYaml};

use super::*;

/// Which files of a repository tree go into a whole-repository build.
pub(super) struct BlockFileFilter {
    include: GlobSet,
    hidden: GlobSet,
}

impl BlockFileFilter {
    pub(super) fn new() -> Result<Self> {
        let include = GlobSetBuilder::new()
            .add(
                GlobBuilder::new("**/*.mon")
                    .case_insensitive(true)
                    .build()
                    .context("block glob")?,
            )
            .build()
            .context("build block globs")?;
        let mut hidden = GlobSetBuilder::new();
        for pattern in ["**/.*", "**/.*/**"] {
            hidden.add(
                GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .context("hidden glob")?,
            );
        }
        let hidden = hidden.build().context("build hidden globs")?;
        Ok(Self { include, hidden })
    }

    pub(super) fn matches(&self, rel: &str) -> bool {
        self.include.is_match(rel) && !self.hidden.is_match(rel)
    }
}

async fn repository_token(state: &AppState, repository: &Repository) -> Option<String> {
    match state.token_for(Some(&repository.id)).await {
        Some(token) => Some(token),
        None => repository.access_token.clone().filter(|t| !t.is_empty()),
    }
}

pub(super) async fn build_from_selection(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ExtensionFromSelection>,
) -> Result<Response, Response> {
    tracing::info!(extension = %req.extension_name, monitors = req.monitors.len(), "build from selection");
    let token = match &req.repository {
        Some(repository) => repository_token(&state, repository).await,
        None => {
            state
                .token_for(req.monitors.first().map(|m| m.repository_id.as_str()))
                .await
        }
    };

    let mut files = BTreeMap::new();
    for item in &req.monitors {
        match item.item_type {
            ItemType::Dir => {
                let nested = state
                    .walk(&item.url, token.as_deref())
                    .await
                    .map_err(|e| build_error(fetch_status(&e), e))?;
                for (rel, url) in nested {
                    files.insert(format!("{}/{}", item.file, rel), url);
                }
            }
            _ => {
                files.insert(item.file.clone(), item.url.clone());
            }
        }
    }

    package(&state, &headers, &req.extension_name, files, token.as_deref(), req.upload, req.deploy)
        .await
}

pub(super) async fn build_from_yaml(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ExtensionFromYaml>,
) -> Result<Response, Response> {
    tracing::info!(extension = %req.extension_name, sections = ?req.sections, "build from manifest");
    if req.sections.is_empty() {
        return Err(build_error(
            StatusCode::BAD_REQUEST,
            anyhow::anyhow!("no manifest section selected"),
        ));
    }
    let token = repository_token(&state, &req.repository).await;

    let text = state
        .read(&req.yaml.url, token.as_deref())
        .await
        .map_err(|e| build_error(fetch_status(&e), e))?;
    let manifest = Manifest::parse(&String::from_utf8_lossy(&text))
        .with_context(|| format!("parse {}", req.yaml.file))
        .map_err(|e| build_error(StatusCode::BAD_REQUEST, e))?;

    let mut files = BTreeMap::new();
    for name in &req.sections {
        let section = manifest.section(name).ok_or_else(|| {
            build_error(
                StatusCode::NOT_FOUND,
                anyhow::anyhow!("section {} not found in {}", name, req.yaml.file),
            )
        })?;
        for member in &section.members {
            let rel = member.trim_start_matches("./").to_string();
            files.insert(rel, sibling_url(&req.yaml.url, member));
        }
    }

    package(&state, &headers, &req.extension_name, files, token.as_deref(), req.upload, req.deploy)
        .await
}

pub(super) async fn build_from_repository(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ExtensionFromRepository>,
) -> Result<Response, Response> {
    tracing::info!(extension = %req.extension_name, repository = %req.repository.id, "build from repository");
    let token = repository_token(&state, &req.repository).await;
    let filter = BlockFileFilter::new().map_err(|e| build_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    let files: BTreeMap<String, String> = state
        .walk(&req.repository.url, token.as_deref())
        .await
        .map_err(|e| build_error(fetch_status(&e), e))?
        .into_iter()
        .filter(|(rel, _)| filter.matches(rel))
        .collect();

    package(&state, &headers, &req.extension_name, files, token.as_deref(), req.upload, req.deploy)
        .await
}

async fn package(
    state: &AppState,
    headers: &HeaderMap,
    name: &str,
    files: BTreeMap<String, String>,
    token: Option<&str>,
    upload: bool,
    deploy: bool,
) -> Result<Response, Response> {
    anabuild::assembler::validate_name(name).map_err(|e| build_error(StatusCode::BAD_REQUEST, e))?;
    if files.is_empty() {
        return Err(build_error(
            StatusCode::BAD_REQUEST,
            anyhow::anyhow!("nothing to package for {}", name),
        ));
    }
    let tenant = if upload || deploy {
        Some(state.platform()?)
    } else {
        None
    };

    let work = tempfile::tempdir()
        .context("create work dir")
        .map_err(|e| build_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    let files: Vec<(String, String)> = files.into_iter().collect();
    state
        .materialize(work.path(), &files, token)
        .await
        .map_err(|e| build_error(fetch_status(&e), e))?;
    let built = state
        .build_archive(work.path(), name)
        .await
        .map_err(|e| build_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    if let Some(base) = tenant {
        let auth = headers.get(header::AUTHORIZATION);
        if upload {
            state
                .upload_binary(base, auth, name, built.archive.clone())
                .await
                .map_err(|e| build_error(StatusCode::BAD_GATEWAY, e))?;
        }
        if deploy {
            state.restart_engine(base, auth).await;
        }
    }

    Ok(archive_response(name, built))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_filter_takes_visible_monitors_only() {
        let filter = BlockFileFilter::new().expect("build filter");
        assert!(filter.matches("Foo.mon"));
        assert!(filter.matches("math/Add.MON"));
        assert!(!filter.matches("math/meta.json"));
        assert!(!filter.matches(".github/Foo.mon"));
        assert!(!filter.matches("math/.Hidden.mon"));
    }
}
