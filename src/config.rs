use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_BACKEND_PATH;

pub const DEFAULT_CONFIG_FILE: &str = "anabuild.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Auth {
    Token { token: String },
    Basic { user: String, password: String },
}

const MASK: &str = "********";

impl Auth {
    /// Same credentials with the secret blanked out, for display.
    pub fn masked(&self) -> Self {
        match self {
            Auth::Token { .. } => Auth::Token {
                token: MASK.to_string(),
            },
            Auth::Basic { user, .. } => Auth::Basic {
                user: user.clone(),
                password: MASK.to_string(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub version: u32,

    /// Platform tenant url, e.g. `https://tenant.example.com`.
    pub base_url: String,

    /// Path of the packaging microservice relative to `base_url`.
    #[serde(default = "default_backend_path")]
    pub backend_path: String,

    #[serde(default)]
    pub auth: Option<Auth>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend_path() -> String {
    DEFAULT_BACKEND_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            version: 1,
            base_url: base_url.trim_end_matches('/').to_string(),
            backend_path: default_backend_path(),
            auth: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| {
            format!(
                "read {} (run `anabuild config set --url ...`)",
                path.display()
            )
        })?;
        let cfg: ClientConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse {}", path.display()))?;
        if cfg.version != 1 {
            anyhow::bail!("unsupported config version {}", cfg.version);
        }
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).context("serialize config")?;
        write_atomic(path, &bytes).with_context(|| format!("write {}", path.display()))
    }

    /// Copy safe to print: credentials masked.
    pub fn redacted(&self) -> Self {
        Self {
            auth: self.auth.as_ref().map(Auth::masked),
            ..self.clone()
        }
    }

    /// Base url of the packaging microservice, without trailing slash.
    pub fn backend_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.backend_path.trim_matches('/') {
            "" => base.to_string(),
            path => format!("{}/{}", base, path),
        }
    }
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context("create parent directories")?;
    }
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp, bytes).with_context(|| format!("write temp file {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_config_hides_secrets() {
        let mut cfg = ClientConfig::new("https://tenant.example.com");
        cfg.auth = Some(Auth::Token {
            token: "t0k3n".to_string(),
        });
        let shown = serde_json::to_string(&cfg.redacted()).expect("serialize");
        assert!(!shown.contains("t0k3n"));
        assert!(shown.contains("tenant.example.com"));

        cfg.auth = Some(Auth::Basic {
            user: "admin".to_string(),
            password: "secret".to_string(),
        });
        let shown = serde_json::to_string(&cfg.redacted()).expect("serialize");
        assert!(!shown.contains("secret"));
        assert!(shown.contains("admin"));
        assert!(matches!(cfg.auth, Some(Auth::Basic { ref password, .. }) if password == "secret"));
    }

    #[test]
    fn config_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested/anabuild.json");
        let mut cfg = ClientConfig::new("https://tenant.example.com/");
        cfg.auth = Some(Auth::Basic {
            user: "admin".to_string(),
            password: "secret".to_string(),
        });
        cfg.save(&path).expect("save config");

        let loaded = ClientConfig::load(&path).expect("load config");
        assert_eq!(loaded, cfg);
        assert_eq!(
            loaded.backend_url(),
            "https://tenant.example.com/service/analytics-ext-service"
        );
    }

    #[test]
    fn token_auth_parses_untagged() {
        let cfg: ClientConfig = serde_json::from_str(
            r#"{"version":1,"base_url":"http://x","auth":{"token":"abc"}}"#,
        )
        .expect("parse config");
        assert_eq!(
            cfg.auth,
            Some(Auth::Token {
                token: "abc".to_string()
            })
        );
        assert_eq!(cfg.backend_path, DEFAULT_BACKEND_PATH);
    }

    #[test]
    fn empty_backend_path_targets_tenant_root() {
        let mut cfg = ClientConfig::new("http://127.0.0.1:8080/");
        cfg.backend_path = "/".to_string();
        assert_eq!(cfg.backend_url(), "http://127.0.0.1:8080");
    }
}
