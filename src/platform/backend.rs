//! Packaging microservice endpoints.

use super::*;

use crate::api::{BackendApi, BuildRequest, BuildResponse};
use crate::model::{ARCHIVE_DIGEST_HEADER, EngineStatus, Repository, RepositoryItem};

#[derive(serde::Deserialize)]
struct EngineIdResponse {
    #[serde(default)]
    id: Option<String>,
}

impl BackendApi for PlatformClient {
    fn load_configuration(&self) -> Result<Option<Vec<Repository>>> {
        let body = with_retries("load repository configuration", || {
            let resp = self
                .authed(self.client.get(self.backend("repository/configuration")))
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .context("send")?;
            self.ensure_ok(resp, "load repository configuration")?
                .text()
                .context("read body")
        })?;
        Ok(parse_configuration(&body))
    }

    fn save_configuration(&self, repositories: &[Repository]) -> Result<()> {
        let resp = self
            .authed(self.client.post(self.backend("repository/configuration")))
            .json(repositories)
            .send()
            .context("save repository configuration request")?;
        self.ensure_ok(resp, "save repository configuration")?;
        Ok(())
    }

    fn content_list(&self, repository: &Repository) -> Result<serde_json::Value> {
        let resp = self
            .authed(self.client.get(self.backend("repository/contentList")))
            .query(&[("url", repository.url.as_str()), ("id", repository.id.as_str())])
            .send()
            .with_context(|| format!("list content of {}", repository.name))?;
        self.ensure_ok(resp, "list repository content")?
            .json()
            .context("parse content listing")
    }

    fn content(&self, item: &RepositoryItem, extract_fqn: bool) -> Result<String> {
        let label = format!("fetch content of {}", item.file);
        with_retries(&label, || {
            let resp = self
                .authed(self.client.get(self.backend("repository/content")))
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .query(&[
                    ("url", item.content_url()),
                    ("id", item.repository_id.as_str()),
                    ("cep_block_name", item.file.as_str()),
                    (
                        "extract_fqn_cep_block",
                        if extract_fqn { "true" } else { "false" },
                    ),
                ])
                .send()
                .context("send")?;
            self.ensure_ok(resp, "fetch content")?
                .text()
                .context("read content")
        })
    }

    fn build_extension(&self, request: &BuildRequest) -> Result<BuildResponse> {
        let rb = self
            .authed(self.client.post(self.backend(request.endpoint())))
            .header(reqwest::header::ACCEPT, "application/zip, application/json");
        let rb = match request {
            BuildRequest::Selection(body) => rb.json(body),
            BuildRequest::Yaml(body) => rb.json(body),
            BuildRequest::Repository(body) => rb.json(body),
        };
        let resp = rb
            .send()
            .with_context(|| format!("build extension {}", request.extension_name()))?;

        let status = resp.status().as_u16();
        let digest = resp
            .headers()
            .get(ARCHIVE_DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().context("read extension archive")?.to_vec();
        Ok(BuildResponse {
            status,
            body,
            digest,
        })
    }

    fn engine_id(&self) -> Result<Option<String>> {
        let resp = self
            .authed(self.client.get(self.backend("cep/id")))
            .send()
            .context("get engine id")?;
        let id: EngineIdResponse = self
            .ensure_ok(resp, "get engine id")?
            .json()
            .context("parse engine id")?;
        Ok(id.id.filter(|s| !s.is_empty()))
    }

    fn engine_status(&self) -> Result<EngineStatus> {
        let resp = self
            .authed(self.client.get(self.backend("cep/status")))
            .send()
            .context("get engine status")?;
        self.ensure_ok(resp, "get engine status")?
            .json()
            .context("parse engine status")
    }
}

/// Empty, `null` and unparsable bodies all count as "nothing stored".
pub(crate) fn parse_configuration(body: &str) -> Option<Vec<Repository>> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Option<Vec<Repository>>>(body) {
        Ok(Some(repos)) if !repos.is_empty() => Some(repos),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring malformed repository configuration");
            None
        }
    }
}
