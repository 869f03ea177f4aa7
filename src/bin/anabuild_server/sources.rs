//! Repository content: local `file://` trees, the GitHub content API and plain http(s) files.

use super::*;

const FILE_SCHEME: &str = "file://";
const ACCEPT_JSON: &str = "application/vnd.github.v3+json";
const MAX_WALK_DEPTH: usize = 16;

/// A `file://` url outside the served local root.
#[derive(Debug)]
pub(super) struct LocalAccessDenied(pub(super) PathBuf);

impl std::fmt::Display for LocalAccessDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "local path {} is not served", self.0.display())
    }
}

impl std::error::Error for LocalAccessDenied {}

pub(super) enum Source {
    Local(PathBuf),
    /// GitHub web urls are converted to the content API; other http(s) urls are fetched as is.
    Remote(String),
}

impl AppState {
    pub(super) fn source(&self, url: &str) -> Result<Source> {
        if let Some(path) = url.strip_prefix(FILE_SCHEME) {
            return self.local_path(Path::new(path)).map(Source::Local);
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("unsupported source url {}", url);
        }
        if url.contains("://github.com/") || url.starts_with(anabuild::github::GITHUB_API) {
            let api = anabuild::github::web_url_to_content_api(url)?;
            return Ok(Source::Remote(rebase_api(&self.github_api, &api)));
        }
        Ok(Source::Remote(url.to_string()))
    }

    /// `path` if it lies below the local root and outside the data dir.
    /// `..` components are refused outright.
    fn local_path(&self, path: &Path) -> Result<PathBuf> {
        let denied = || anyhow::Error::new(LocalAccessDenied(path.to_path_buf()));
        let Some(root) = &self.local_root else {
            return Err(denied());
        };
        let plain = path.is_absolute()
            && !path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));
        if !plain || !path.starts_with(root) || path.starts_with(&self.data_dir) {
            return Err(denied());
        }
        Ok(path.to_path_buf())
    }

    /// Access token stored for repository `id`.
    pub(super) async fn token_for(&self, id: Option<&str>) -> Option<String> {
        let id = id?;
        let repositories = self.repositories.read().await;
        repositories
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.access_token.clone())
            .filter(|t| !t.is_empty())
    }

    /// Directory listing as the upstream returns it: an array for directories, an object for files.
    pub(super) async fn list(&self, url: &str, token: Option<&str>) -> Result<serde_json::Value> {
        match self.source(url)? {
            Source::Local(path) => tokio::task::spawn_blocking(move || list_local(&path))
                .await
                .context("join listing task")?,
            Source::Remote(remote) => {
                let resp = self
                    .remote_get(&remote, ACCEPT_JSON, token)
                    .await
                    .with_context(|| format!("list {}", remote))?;
                resp.json().await.context("parse listing")
            }
        }
    }

    pub(super) async fn read(&self, url: &str, token: Option<&str>) -> Result<Vec<u8>> {
        match self.source(url)? {
            Source::Local(path) => tokio::fs::read(&path)
                .await
                .with_context(|| format!("read {}", path.display())),
            Source::Remote(remote) => {
                let resp = self
                    .remote_get(&remote, anabuild::github::ACCEPT_RAW, token)
                    .await
                    .with_context(|| format!("fetch {}", remote))?;
                Ok(resp.bytes().await.context("read content")?.to_vec())
            }
        }
    }

    /// Every file below `url` as `(relative path, content url)`, sorted by path.
    pub(super) async fn walk(&self, url: &str, token: Option<&str>) -> Result<Vec<(String, String)>> {
        let mut files = Vec::new();
        let mut pending = vec![(url.to_string(), String::new(), 0usize)];
        while let Some((dir_url, prefix, depth)) = pending.pop() {
            if depth > MAX_WALK_DEPTH {
                anyhow::bail!("directory nesting below {} exceeds {} levels", url, MAX_WALK_DEPTH);
            }
            let listing = self.list(&dir_url, token).await?;
            for entry in entries(listing) {
                let (Some(name), Some(entry_url)) = (entry.name, entry.url) else {
                    continue;
                };
                let rel = if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                };
                match entry.entry_type {
                    ItemType::Dir => pending.push((entry_url, rel, depth + 1)),
                    ItemType::File => files.push((rel, entry_url)),
                    _ => tracing::debug!(path = %rel, "skipping non-file entry"),
                }
            }
        }
        files.sort();
        Ok(files)
    }

    async fn remote_get(
        &self,
        url: &str,
        accept: &str,
        token: Option<&str>,
    ) -> Result<reqwest::Response> {
        let mut rb = self.http.get(url).header(header::ACCEPT, accept);
        if let Some(token) = token {
            rb = rb.bearer_auth(token);
        }
        let resp = rb.send().await.context("send")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "{} returned {}: {}",
                url,
                status.as_u16(),
                anabuild::api::error_detail(&body)
            );
        }
        Ok(resp)
    }
}

fn rebase_api(base: &str, url: &str) -> String {
    match url.strip_prefix(anabuild::github::GITHUB_API) {
        Some(rest) => format!("{}{}", base, rest),
        None => url.to_string(),
    }
}

pub(super) fn file_url(path: &Path) -> String {
    format!("{}{}", FILE_SCHEME, path.display())
}

/// Resolves `relative` against the directory of `url`, keeping any query.
pub(super) fn sibling_url(url: &str, relative: &str) -> String {
    let (path, query) = match url.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (url, None),
    };
    let base = path.rsplit_once('/').map(|(b, _)| b).unwrap_or(path);
    let mut out = format!("{}/{}", base, relative.trim_start_matches("./"));
    if let Some(query) = query {
        out.push('?');
        out.push_str(query);
    }
    out
}

pub(super) fn entries(listing: serde_json::Value) -> Vec<ContentEntry> {
    let values = match listing {
        serde_json::Value::Array(values) => values,
        other => vec![other],
    };
    values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<ContentEntry>(v).ok())
        .collect()
}

fn local_entry(path: &Path) -> Result<ContentEntry> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("no file name in {}", path.display()))?;
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    let url = file_url(path);
    let entry_type = if meta.is_dir() {
        ItemType::Dir
    } else if meta.is_file() {
        ItemType::File
    } else {
        ItemType::Other
    };
    Ok(ContentEntry {
        name: Some(name.clone()),
        path: Some(name),
        download_url: (entry_type == ItemType::File).then(|| url.clone()),
        url: Some(url),
        entry_type,
        children: Vec::new(),
    })
}

fn list_local(path: &Path) -> Result<serde_json::Value> {
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if !meta.is_dir() {
        return serde_json::to_value(local_entry(path)?).context("serialize entry");
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(path).with_context(|| format!("read dir {}", path.display()))? {
        let entry = entry.context("read dir entry")?;
        out.push(local_entry(&entry.path())?);
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    serde_json::to_value(out).context("serialize listing")
}
