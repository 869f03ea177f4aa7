use super::*;

use crate::api::error_detail;

pub(super) fn with_retries<T>(label: &str, mut f: impl FnMut() -> Result<T>) -> Result<T> {
    const ATTEMPTS: usize = 3;
    let mut last: Option<anyhow::Error> = None;
    for i in 0..ATTEMPTS {
        match f() {
            Ok(v) => return Ok(v),
            Err(err) => {
                tracing::debug!(attempt = i + 1, error = %format!("{:#}", err), "{} failed", label);
                last = Some(err);
                if i + 1 < ATTEMPTS {
                    std::thread::sleep(Duration::from_millis(200 * (1 << i)));
                }
            }
        }
    }
    Err(last
        .unwrap_or_else(|| anyhow::anyhow!("unknown error"))
        .context(label.to_string()))
}

pub(super) fn error_message(resp: reqwest::blocking::Response) -> String {
    let status = resp.status().as_u16();
    let body = resp.text().unwrap_or_default();
    let detail = error_detail(&body);
    if detail.is_empty() {
        format!("backend returned code {}", status)
    } else {
        format!("backend returned code {}: {}", status, detail)
    }
}

impl PlatformClient {
    pub(super) fn ensure_ok(
        &self,
        resp: reqwest::blocking::Response,
        label: &str,
    ) -> Result<reqwest::blocking::Response> {
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            anyhow::bail!(
                "{}: unauthorized (check credentials with `anabuild config show`)",
                label
            );
        }
        if resp.status() == reqwest::StatusCode::FORBIDDEN {
            anyhow::bail!("{}: forbidden (missing role for this tenant)", label);
        }
        if !resp.status().is_success() {
            anyhow::bail!("{}: {}", label, error_message(resp));
        }
        Ok(resp)
    }

    pub(super) fn authed(
        &self,
        rb: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.config.auth {
            Some(Auth::Token { token }) => rb.bearer_auth(token),
            Some(Auth::Basic { user, password }) => rb.basic_auth(user, Some(password)),
            None => rb,
        }
    }

    /// Url below the tenant root.
    pub(super) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Url below the packaging microservice.
    pub(super) fn backend(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.backend_url(),
            path.trim_start_matches('/')
        )
    }
}
