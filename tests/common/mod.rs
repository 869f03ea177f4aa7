use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use anabuild::config::ClientConfig;
use anabuild::model::Repository;
use anabuild::platform::PlatformClient;

pub struct ServerGuard {
    pub base_url: String,
    pub data_dir: PathBuf,
    _data_dir: Option<tempfile::TempDir>,
    child: Child,
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[derive(Default)]
pub struct ServerOptions {
    /// Reuse this data dir instead of a fresh temp dir.
    pub data_dir: Option<PathBuf>,
    pub builder: Option<PathBuf>,
    pub platform_url: Option<String>,
    /// Directory `file://` repositories may be served from.
    pub local_root: Option<PathBuf>,
}

impl ServerOptions {
    #[allow(dead_code)]
    pub fn serving(root: &Path) -> Self {
        Self {
            local_root: Some(root.to_path_buf()),
            ..Self::default()
        }
    }
}

#[allow(dead_code)]
pub fn spawn_server() -> Result<ServerGuard> {
    spawn_server_with(ServerOptions::default())
}

pub fn spawn_server_with(opts: ServerOptions) -> Result<ServerGuard> {
    let (owned, data_dir) = match opts.data_dir {
        Some(dir) => (None, dir),
        None => {
            let tmp = tempfile::tempdir().context("create server tempdir")?;
            let path = tmp.path().to_path_buf();
            (Some(tmp), path)
        }
    };

    let addr_file = data_dir.join("addr.txt");
    let _ = std::fs::remove_file(&addr_file);

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_anabuild-server"));
    cmd.arg("--addr")
        .arg("127.0.0.1:0")
        .arg("--addr-file")
        .arg(&addr_file)
        .arg("--data-dir")
        .arg(&data_dir);
    if let Some(builder) = &opts.builder {
        cmd.arg("--builder").arg(builder);
    }
    if let Some(url) = &opts.platform_url {
        cmd.arg("--platform-url").arg(url);
    }
    if let Some(root) = &opts.local_root {
        cmd.arg("--local-root").arg(root);
    }
    let child = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("spawn anabuild-server")?;

    let base_url = read_addr_file(&addr_file)?;
    wait_for_health(&base_url)?;

    Ok(ServerGuard {
        base_url,
        data_dir,
        _data_dir: owned,
        child,
    })
}

fn read_addr_file(addr_file: &Path) -> Result<String> {
    let start = Instant::now();
    loop {
        if start.elapsed() > Duration::from_secs(5) {
            anyhow::bail!("addr file not written at {}", addr_file.display());
        }

        if let Ok(s) = std::fs::read_to_string(addr_file) {
            let s = s.trim();
            if !s.is_empty() {
                return Ok(format!("http://{}", s));
            }
        }
        thread::sleep(Duration::from_millis(10));
    }
}

pub fn wait_for_health(base_url: &str) -> Result<()> {
    let client = reqwest::blocking::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > Duration::from_secs(5) {
            anyhow::bail!("server did not become healthy at {}/health", base_url);
        }
        match client.get(format!("{}/health", base_url)).send() {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => {
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

/// Client whose packaging service is the spawned server itself.
#[allow(dead_code)]
pub fn client_for(server: &ServerGuard) -> Result<PlatformClient> {
    let mut config = ClientConfig::new(&server.base_url);
    config.backend_path = String::new();
    config.timeout_secs = 10;
    PlatformClient::new(config)
}

#[allow(dead_code)]
pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[allow(dead_code)]
pub fn local_repository(id: &str, dir: &Path) -> Repository {
    Repository {
        id: id.to_string(),
        name: format!("Local {}", id),
        url: file_url(dir),
        access_token: None,
        enabled: true,
    }
}

/// Sample block tree: two monitors, block metadata, a manifest and a hidden dir.
#[allow(dead_code)]
pub fn write_block_tree(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root.join("math")).context("create math dir")?;
    std::fs::create_dir_all(root.join(".github")).context("create hidden dir")?;
    std::fs::write(
        root.join("Foo.mon"),
        "package com.example.blocks;\n\nevent Foo {}\n",
    )?;
    std::fs::write(root.join("meta.json"), "{\"name\":\"Foo\"}")?;
    std::fs::write(
        root.join("math/Add.mon"),
        "/* adder */\npackage com.example.math;\nevent Add {}\n",
    )?;
    std::fs::write(root.join(".github/Ci.mon"), "package ci;\n")?;
    std::fs::write(
        root.join("extensions.yaml"),
        "math:\n  - math/Add.mon\nall:\n  files:\n    - Foo.mon\n    - math/Add.mon\n",
    )?;
    Ok(())
}

/// Stand-in for the block SDK: writes `PK` followed by the sorted `.mon` paths of the input.
#[cfg(unix)]
#[allow(dead_code)]
pub fn fake_builder(dir: &Path, fail: bool) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let script = if fail {
        "#!/bin/sh\necho \"compile error in Foo.mon\" >&2\nexit 3\n".to_string()
    } else {
        [
            "#!/bin/sh",
            "# build extension --input DIR --output FILE",
            "in=\"$4\"",
            "out=\"$6\"",
            "printf 'PK' > \"$out.part\"",
            "(cd \"$in\" && find . -type f -name '*.mon' | sort) >> \"$out.part\"",
            "mv \"$out.part\" \"$out\"",
            "",
        ]
        .join("\n")
    };
    let path = dir.join(if fail { "failing_builder.sh" } else { "builder.sh" });
    std::fs::write(&path, script).context("write builder script")?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .context("chmod builder script")?;
    Ok(path)
}

#[derive(Clone, Debug)]
#[allow(dead_code)]
pub struct RecordedRequest {
    pub method: String,
    /// Path and query, e.g. `/inventory/binaries`.
    pub target: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

/// In-process tenant that records every request and answers with canned platform payloads.
pub struct PlatformStub {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

#[allow(dead_code)]
impl PlatformStub {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

async fn record_platform_request(
    axum::extract::State(requests): axum::extract::State<Arc<Mutex<Vec<RecordedRequest>>>>,
    method: axum::http::Method,
    uri: axum::http::Uri,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> axum::Json<serde_json::Value> {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let reply = if target.starts_with("/service/cep/diagnostics/apamaCtrlStatus") {
        serde_json::json!({"microservice_name": "apama-ctrl-1c", "is_safe_mode": false})
    } else if target.starts_with("/inventory/managedObjects") {
        serde_json::json!({"managedObjects": [{"id": "4711"}]})
    } else {
        serde_json::json!({"id": "bin-1"})
    };
    if let Ok(mut log) = requests.lock() {
        log.push(RecordedRequest {
            method: method.to_string(),
            target,
            authorization: headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: body.to_vec(),
        });
    }
    axum::Json(reply)
}

#[allow(dead_code)]
pub fn spawn_platform() -> Result<PlatformStub> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").context("bind platform stub")?;
    listener
        .set_nonblocking(true)
        .context("platform stub nonblocking")?;
    let addr = listener.local_addr().context("platform stub addr")?;
    let requests = Arc::new(Mutex::new(Vec::new()));
    let app = axum::Router::new()
        .fallback(record_platform_request)
        .with_state(requests.clone());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("platform stub runtime")?;
    thread::spawn(move || {
        runtime.block_on(async move {
            if let Ok(listener) = tokio::net::TcpListener::from_std(listener) {
                let _ = axum::serve(listener, app).await;
            }
        });
    });
    Ok(PlatformStub {
        url: format!("http://{}", addr),
        requests,
    })
}
