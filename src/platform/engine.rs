//! Engine (CEP) reads and the restart trigger.

use super::*;

use crate::api::EngineApi;
use crate::model::{
    CEP_PATH_EN, CEP_PATH_METADATA_EN, CEP_PATH_RESTART, EngineExtension, EngineMetadata,
};

impl EngineApi for PlatformClient {
    fn block_metadata(&self) -> Result<EngineMetadata> {
        with_retries("read engine block metadata", || {
            let resp = self
                .authed(self.client.get(self.url(CEP_PATH_METADATA_EN)))
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .context("send")?;
            self.ensure_ok(resp, "read engine block metadata")?
                .json()
                .context("parse engine block metadata")
        })
    }

    fn extension_detail(&self, name: &str) -> Result<Option<EngineExtension>> {
        let resp = self
            .authed(
                self.client
                    .get(self.url(&format!("{}/{}.json", CEP_PATH_EN, name))),
            )
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .with_context(|| format!("read engine extension {}", name))?;
        if resp.status().as_u16() >= 400 {
            tracing::debug!(extension = name, status = resp.status().as_u16(), "extension detail unavailable");
            return Ok(None);
        }
        let mut ext: EngineExtension = resp
            .json()
            .with_context(|| format!("parse engine extension {}", name))?;
        ext.name = name.to_string();
        Ok(Some(ext))
    }

    fn restart(&self) -> Result<()> {
        let resp = self
            .authed(self.client.put(self.url(CEP_PATH_RESTART)))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&serde_json::json!({}))
            .send()
            .context("restart engine request")?;
        self.ensure_ok(resp, "restart engine")?;
        Ok(())
    }
}
