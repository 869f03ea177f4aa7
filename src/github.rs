//! GitHub url helpers shared by the repository reachability check and the server-side content proxy.

use anyhow::{Context, Result};

use crate::model::{Repository, RepositoryTestResult};

pub const DEFAULT_BRANCH: &str = "main";
pub const GITHUB_API: &str = "https://api.github.com";
pub const ACCEPT_RAW: &str = "application/vnd.github.v3.raw";

fn split_url(url: &str) -> Result<(&str, &str, Option<&str>)> {
    let (scheme, rest) = url.split_once("://").context("missing url scheme")?;
    if scheme != "http" && scheme != "https" {
        anyhow::bail!("unsupported url scheme {}", scheme);
    }
    let (rest, query) = match rest.split_once('?') {
        Some((r, q)) => (r, Some(q)),
        None => (rest, None),
    };
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    Ok((host, path, query))
}

fn path_parts(path: &str) -> Vec<&str> {
    path.split('/').filter(|p| !p.is_empty()).collect()
}

/// `https://github.com/user/repo/tree/branch/path` -> content API url with `?ref=branch`.
///
/// Urls that already point at the content API are returned unchanged.
pub fn web_url_to_content_api(url: &str) -> Result<String> {
    let (host, path, _) =
        split_url(url).with_context(|| format!("failed to convert GitHub url {}", url))?;
    if host.contains("api.github.com") {
        return Ok(url.to_string());
    }
    if !host.contains("github.com") {
        anyhow::bail!("failed to convert GitHub url {}: not a GitHub url", url);
    }
    let parts = path_parts(path);
    if parts.len() < 2 {
        anyhow::bail!(
            "failed to convert GitHub url {}: missing user or repository",
            url
        );
    }
    let (user, repo) = (parts[0], parts[1]);
    let (branch, in_repo) = if parts.len() > 3 && parts[2] == "tree" {
        (parts[3], parts[4..].join("/"))
    } else {
        (DEFAULT_BRANCH, parts[2..].join("/"))
    };

    let mut out = format!("{}/repos/{}/{}/contents", GITHUB_API, user, repo);
    if !in_repo.is_empty() {
        out.push('/');
        out.push_str(&in_repo);
    }
    out.push_str("?ref=");
    out.push_str(branch);
    Ok(out)
}

/// Inverse of [`web_url_to_content_api`].
pub fn content_api_to_web_url(url: &str) -> Result<String> {
    let (host, path, query) =
        split_url(url).with_context(|| format!("failed to convert GitHub API url {}", url))?;
    if !host.contains("api.github.com") {
        anyhow::bail!("failed to convert GitHub API url {}: not a GitHub API url", url);
    }
    let parts = path_parts(path);
    if parts.len() < 4 || parts[0] != "repos" || parts[3] != "contents" {
        anyhow::bail!(
            "failed to convert GitHub API url {}: invalid content API format",
            url
        );
    }
    let branch = query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .find_map(|kv| kv.strip_prefix("ref="))
        .unwrap_or(DEFAULT_BRANCH);
    let in_repo = parts[4..].join("/");

    let mut out = format!("https://github.com/{}/{}/tree/{}", parts[1], parts[2], branch);
    if !in_repo.is_empty() {
        out.push('/');
        out.push_str(&in_repo);
    }
    Ok(out)
}

/// Path of `file_url` relative to `repository_url`, or its last segment when unrelated.
pub fn relative_path(file_url: &str, repository_url: &str) -> String {
    let file_url = file_url.trim_end_matches('/');
    let repository_url = repository_url.trim_end_matches('/');
    match file_url.strip_prefix(repository_url) {
        Some(rest) => rest.trim_start_matches('/').to_string(),
        None => file_url.rsplit('/').next().unwrap_or(file_url).to_string(),
    }
}

/// Last path segment with any query removed.
pub fn raw_file_name(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or(path);
    path.rsplit('/').next().unwrap_or(path)
}

/// Probes the repository url with its access token.
pub fn test_repository(
    http: &reqwest::blocking::Client,
    repository: &Repository,
) -> RepositoryTestResult {
    let url = match web_url_to_content_api(&repository.url) {
        Ok(u) => u,
        Err(err) => {
            return RepositoryTestResult {
                success: false,
                message: format!("{:#}", err),
                status: None,
            };
        }
    };

    let mut rb = http.get(&url).header(reqwest::header::ACCEPT, ACCEPT_RAW);
    if let Some(token) = repository.access_token.as_deref().filter(|t| !t.is_empty()) {
        rb = rb.bearer_auth(token);
    }

    match rb.send() {
        Ok(resp) => classify_status(resp.status().as_u16()),
        Err(err) => {
            tracing::debug!(url = %url, error = %err, "repository reachability check failed");
            RepositoryTestResult {
                success: false,
                message:
                    "Failed to connect to repository. Please check your connection and try again."
                        .to_string(),
                status: None,
            }
        }
    }
}

pub fn classify_status(status: u16) -> RepositoryTestResult {
    let message = match status {
        s if s < 400 => "Successfully connected to repository".to_string(),
        401 => "Authentication failed. Please check your access token.".to_string(),
        404 => "Repository not found. Please check the URL.".to_string(),
        s => format!("Failed to connect to repository. Status: {}", s),
    };
    RepositoryTestResult {
        success: status < 400,
        message,
        status: Some(status),
    }
}
