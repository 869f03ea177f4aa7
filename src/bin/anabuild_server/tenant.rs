//! Calls into the platform tenant on behalf of the caller.

use super::*;

const NO_PLATFORM: &str = "no platform configured (start with --platform-url)";

#[derive(serde::Deserialize)]
struct CreatedBinary {
    id: String,
}

#[derive(serde::Deserialize)]
struct ManagedObjectRef {
    id: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedObjectRefs {
    #[serde(default)]
    managed_objects: Vec<ManagedObjectRef>,
}

impl AppState {
    pub(super) fn platform(&self) -> Result<&str, Response> {
        self.platform_url
            .as_deref()
            .ok_or_else(|| service_unavailable(NO_PLATFORM))
    }

    fn tenant_request(
        &self,
        method: reqwest::Method,
        base: &str,
        path: &str,
        auth: Option<&HeaderValue>,
    ) -> reqwest::RequestBuilder {
        let rb = self.http.request(method, format!("{}/{}", base, path));
        match auth {
            Some(value) => rb.header(header::AUTHORIZATION, value.clone()),
            None => rb,
        }
    }

    pub(super) async fn upload_binary(
        &self,
        base: &str,
        auth: Option<&HeaderValue>,
        name: &str,
        archive: Vec<u8>,
    ) -> Result<String> {
        let mut object = serde_json::json!({
            "name": format!("{}.zip", name),
            "type": "application/zip",
        });
        object[anabuild::model::EXTENSION_FRAGMENT] = serde_json::Value::String(name.to_string());
        let file = reqwest::multipart::Part::bytes(archive)
            .file_name(format!("{}.zip", name))
            .mime_str("application/zip")
            .context("archive mime type")?;
        let form = reqwest::multipart::Form::new()
            .text("object", object.to_string())
            .part("file", file);
        let resp = self
            .tenant_request(reqwest::Method::POST, base, "inventory/binaries", auth)
            .header(header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("upload {}.zip", name))?;
        let created: CreatedBinary = ensure_ok(resp, "upload binary")
            .await?
            .json()
            .await
            .context("parse created binary")?;
        tracing::info!(extension = %name, id = %created.id, "uploaded extension");
        Ok(created.id)
    }

    /// Failures are logged; the archive is already stored at this point.
    pub(super) async fn restart_engine(&self, base: &str, auth: Option<&HeaderValue>) {
        let result = match self
            .tenant_request(
                reqwest::Method::PUT,
                base,
                anabuild::model::CEP_PATH_RESTART,
                auth,
            )
            .json(&serde_json::json!({}))
            .send()
            .await
        {
            Ok(resp) => ensure_ok(resp, "restart engine").await.map(|_| ()),
            Err(err) => Err(anyhow::Error::new(err).context("restart engine")),
        };
        match result {
            Ok(()) => tracing::info!("engine restart requested"),
            Err(err) => tracing::warn!(error = %format!("{:#}", err), "ignoring failed engine restart"),
        }
    }

    pub(super) async fn engine_status(
        &self,
        base: &str,
        auth: Option<&HeaderValue>,
    ) -> Result<serde_json::Value> {
        let resp = self
            .tenant_request(
                reqwest::Method::GET,
                base,
                anabuild::model::CEP_PATH_STATUS,
                auth,
            )
            .send()
            .await
            .context("get engine status")?;
        ensure_ok(resp, "get engine status")
            .await?
            .json()
            .await
            .context("parse engine status")
    }

    /// Inventory id of the managed object named after the engine microservice.
    pub(super) async fn engine_id(
        &self,
        base: &str,
        auth: Option<&HeaderValue>,
    ) -> Result<Option<String>> {
        let status = self.engine_status(base, auth).await?;
        let Some(name) = status
            .get("microservice_name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
        else {
            return Ok(None);
        };
        let query = format!("name eq '{}'", name);
        let resp = self
            .tenant_request(reqwest::Method::GET, base, "inventory/managedObjects", auth)
            .query(&[("query", query.as_str()), ("pageSize", "1")])
            .send()
            .await
            .context("look up engine managed object")?;
        let refs: ManagedObjectRefs = ensure_ok(resp, "look up engine managed object")
            .await?
            .json()
            .await
            .context("parse managed objects")?;
        Ok(refs.managed_objects.into_iter().next().map(|mo| mo.id))
    }
}

async fn ensure_ok(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!(
        "{}: platform returned {}: {}",
        what,
        status.as_u16(),
        anabuild::api::error_detail(&body)
    )
}
