use std::path::Path;

use anyhow::{Context, Result};

use anabuild::alerts::Confirm;
use anabuild::assembler::{ExtensionFlow, PackageResult};
use anabuild::config::{Auth, ClientConfig, write_atomic};
use anabuild::extensions::UploadMode;
use anabuild::model::{Extension, Repository, RepositoryItem, remove_file_extension};
use anabuild::paging::{ListFilter, PageState, next_page};

use crate::cli_runtime::{Runtime, confirmer};
use crate::cli_subcommands::{ConfigCommands, ExtensionCommands, RepoCommands};
use crate::cli_time::fmt_ts_list;
use crate::{Cli, Commands};

pub(crate) fn handle_command(cli: Cli) -> Result<()> {
    let confirm = confirmer(cli.yes);
    let config = cli.config;
    let open = || Runtime::open(&config);

    match cli.command {
        Commands::Config { command } => handle_config_command(&config, command),
        Commands::Repos { command } => handle_repo_command(&open()?, command, confirm.as_ref()),
        Commands::Items {
            repo,
            hide_installed,
            json,
        } => handle_items(&open()?, repo.as_deref(), hide_installed, json),
        Commands::Build {
            name,
            repo,
            items,
            section,
            all,
            no_upload,
            no_deploy,
            out,
        } => {
            let target = if all {
                BuildTarget::All
            } else if let Some(section) = section {
                BuildTarget::Section(section)
            } else {
                BuildTarget::Items(items)
            };
            let package = handle_build(&open()?, &name, &repo, target, !no_upload, !no_deploy)?;
            if let Some(out) = out {
                write_atomic(&out, &package.archive)
                    .with_context(|| format!("write {}", out.display()))?;
                println!("Wrote {}", out.display());
            }
            Ok(())
        }
        Commands::Restart => {
            open()?.assembler.restart_engine();
            println!("Restart requested");
            Ok(())
        }
        Commands::Blocks { json } => handle_blocks(&open()?, json),
        Commands::Extensions { command } => {
            handle_extension_command(&open()?, command, confirm.as_ref())
        }
        Commands::Status { json } => handle_status(&open()?, json),
        Commands::Alarms {
            page,
            page_size,
            status,
            json,
        } => {
            let alarms = open()?
                .monitoring
                .alarms(&page_state(page, page_size, status))?;
            if json {
                return print_json(&alarms);
            }
            print_page_header(alarms.current_page, alarms.total_pages);
            let now = time::OffsetDateTime::now_utc();
            for a in &alarms.items {
                println!(
                    "{} {} {} {} {}",
                    fmt_ts_list(&a.time, now),
                    a.severity,
                    a.status,
                    a.alarm_type,
                    a.text
                );
            }
            Ok(())
        }
        Commands::Events {
            page,
            page_size,
            json,
        } => {
            let events = open()?
                .monitoring
                .events(&page_state(page, page_size, None))?;
            if json {
                return print_json(&events);
            }
            print_page_header(events.current_page, events.total_pages);
            let now = time::OffsetDateTime::now_utc();
            for e in &events.items {
                println!("{} {} {}", fmt_ts_list(&e.time, now), e.event_type, e.text);
            }
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serialize json")?
    );
    Ok(())
}

fn page_state(page: u32, page_size: u32, status: Option<String>) -> PageState {
    let state = PageState::new(
        page_size,
        ListFilter {
            status,
            ..ListFilter::default()
        },
    );
    next_page(&state, i64::from(page) - 1)
}

fn print_page_header(current: u32, total: Option<u32>) {
    match total {
        Some(total) => println!("page {}/{}", current, total),
        None => println!("page {}", current),
    }
}

fn handle_config_command(path: &Path, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show { json } => {
            let cfg = ClientConfig::load(path)?;
            if json {
                return print_json(&cfg.redacted());
            }
            println!("url: {}", cfg.base_url);
            println!("backend: {}", cfg.backend_url());
            let auth = match &cfg.auth {
                Some(Auth::Token { .. }) => "token".to_string(),
                Some(Auth::Basic { user, .. }) => format!("basic ({})", user),
                None => "none".to_string(),
            };
            println!("auth: {}", auth);
            println!("timeout: {}s", cfg.timeout_secs);
        }
        ConfigCommands::Set {
            url,
            token,
            user,
            password,
            backend_path,
            timeout_secs,
        } => {
            let mut cfg = match (ClientConfig::load(path), url.as_deref()) {
                (Ok(cfg), _) => cfg,
                (Err(_), Some(url)) => ClientConfig::new(url),
                (Err(err), None) => return Err(err),
            };
            if let Some(url) = url {
                cfg.base_url = url.trim_end_matches('/').to_string();
            }
            if let Some(token) = token {
                cfg.auth = Some(Auth::Token { token });
            }
            if let (Some(user), Some(password)) = (user, password) {
                cfg.auth = Some(Auth::Basic { user, password });
            }
            if let Some(p) = backend_path {
                cfg.backend_path = p;
            }
            if let Some(t) = timeout_secs {
                cfg.timeout_secs = t;
            }
            cfg.save(path)?;
            println!("Saved {}", path.display());
        }
    }
    Ok(())
}

fn find_repository(rt: &Runtime, id: &str) -> Result<Repository> {
    rt.registry.load()?;
    rt.registry
        .get(id)
        .with_context(|| format!("unknown repository {} (see `anabuild repos list`)", id))
}

fn handle_repo_command(rt: &Runtime, command: RepoCommands, confirm: &dyn Confirm) -> Result<()> {
    let repos = rt.registry.load()?;
    match command {
        RepoCommands::List { json } => {
            if json {
                return print_json(repos.as_ref());
            }
            for r in repos.iter() {
                let state = if r.enabled { "enabled" } else { "disabled" };
                let token = if r.access_token.is_some() { " (token)" } else { "" };
                println!("{} {} [{}]{} {}", r.id, r.name, state, token, r.url);
            }
            return Ok(());
        }
        RepoCommands::Add {
            name,
            url,
            token,
            disabled,
        } => {
            let mut repo = Repository::new(&name, &url, !disabled)?;
            repo.access_token = token.filter(|t| !t.is_empty());
            println!("Added {}", repo.id);
            rt.registry.add(repo);
        }
        RepoCommands::Update {
            id,
            name,
            url,
            token,
        } => {
            let mut repo = find_repository(rt, &id)?;
            if let Some(name) = name {
                repo.name = name;
            }
            if let Some(url) = url {
                repo.url = url;
            }
            if let Some(token) = token {
                repo.access_token = Some(token).filter(|t| !t.is_empty());
            }
            rt.registry.update(repo);
        }
        RepoCommands::Remove { id } => {
            let repo = find_repository(rt, &id)?;
            let message = format!(
                "You are about to delete repository {}. Do you want to proceed?",
                repo.name
            );
            if !confirm.confirm("Delete repository", &message) {
                println!("Cancelled");
                return Ok(());
            }
            rt.registry.remove(&id);
        }
        RepoCommands::Enable { id } => set_enabled(rt, &id, true)?,
        RepoCommands::Disable { id } => set_enabled(rt, &id, false)?,
        RepoCommands::Test { id } => {
            let repo = find_repository(rt, &id)?;
            let result = anabuild::github::test_repository(rt.client.http(), &repo);
            println!("{}", result.message);
            if !result.success {
                anyhow::bail!("repository {} is not reachable", repo.name);
            }
            return Ok(());
        }
    }

    rt.registry.persist()?;
    rt.catalog.reload();
    Ok(())
}

fn set_enabled(rt: &Runtime, id: &str, enabled: bool) -> Result<()> {
    if !rt.registry.set_enabled(id, enabled) {
        anyhow::bail!("unknown repository {} (see `anabuild repos list`)", id);
    }
    Ok(())
}

fn print_items(items: &[RepositoryItem], json: bool) -> Result<()> {
    if json {
        return print_json(&items);
    }
    for i in items {
        let mark = if i.installed { "*" } else { " " };
        let id = i.id.as_deref().unwrap_or("-");
        match &i.section {
            Some(section) => println!(
                "{} [{}] section {} ({})",
                mark, i.repository_name, section, i.file
            ),
            None => println!("{} [{}] {} {}", mark, i.repository_name, i.file, id),
        }
    }
    Ok(())
}

fn handle_items(rt: &Runtime, repo: Option<&str>, hide_installed: bool, json: bool) -> Result<()> {
    let items = match repo {
        Some(id) => {
            let repo = find_repository(rt, id)?;
            rt.catalog.selectable(&repo, hide_installed)?
        }
        None => rt.catalog.items(hide_installed)?,
    };
    print_items(&items, json)
}

enum BuildTarget {
    Items(Vec<String>),
    Section(String),
    All,
}

fn handle_build(
    rt: &Runtime,
    name: &str,
    repo_id: &str,
    target: BuildTarget,
    upload: bool,
    deploy: bool,
) -> Result<PackageResult> {
    let repo = find_repository(rt, repo_id)?;
    let mut flow = ExtensionFlow::new();
    flow.start()?;

    let result = match target {
        BuildTarget::All => {
            flow.submit()?;
            rt.assembler.build_from_repository(name, &repo, upload, deploy)
        }
        BuildTarget::Section(section) => {
            flow.resolving()?;
            let offered = rt.catalog.selectable(&repo, false)?;
            let item = offered
                .iter()
                .find(|i| i.section.as_deref() == Some(section.as_str()))
                .with_context(|| {
                    format!("repository {} has no manifest section {}", repo.name, section)
                })?;
            flow.submit()?;
            rt.assembler
                .build_from_manifest_section(name, item, &repo, upload, deploy)
        }
        BuildTarget::Items(wanted) => {
            if wanted.is_empty() {
                anyhow::bail!("nothing to build: pass --item, --section or --all");
            }
            flow.resolving()?;
            let offered = rt.catalog.selectable(&repo, false)?;
            let mut selected = Vec::new();
            for w in &wanted {
                let item = offered
                    .iter()
                    .find(|i| i.file == *w || i.name == *w || i.id.as_deref() == Some(w.as_str()))
                    .with_context(|| format!("no block {} in repository {}", w, repo.name))?;
                selected.push(item.clone());
            }
            flow.submit()?;
            rt.assembler
                .build_from_selection(name, &selected, Some(&repo), upload, deploy)
        }
    };
    flow.finish(&result)?;
    let package = result?;
    println!(
        "Built {} ({} bytes)",
        package.file_name(),
        package.archive.len()
    );
    flow.dismiss()?;
    Ok(package)
}

fn handle_blocks(rt: &Runtime, json: bool) -> Result<()> {
    let blocks = rt.engine.deployed_blocks()?;
    if json {
        return print_json(blocks.as_ref());
    }
    for b in blocks.iter() {
        let custom = if b.custom { " (custom)" } else { "" };
        println!("{} [{}]{}", b.id, b.extension, custom);
    }
    Ok(())
}

fn find_extension(rt: &Runtime, key: &str) -> Result<Extension> {
    let all = rt.extensions.list(&ListFilter::default())?;
    all.into_iter()
        .find(|e| e.id == key || e.name == key || remove_file_extension(&e.name) == key)
        .with_context(|| format!("unknown extension {}", key))
}

fn handle_extension_command(
    rt: &Runtime,
    command: ExtensionCommands,
    confirm: &dyn Confirm,
) -> Result<()> {
    match command {
        ExtensionCommands::List { json } => {
            let exts = rt.extensions.enriched()?;
            if json {
                return print_json(exts.as_ref());
            }
            for e in exts.iter() {
                let state = if e.loaded { "loaded" } else { "not loaded" };
                let blocks = e
                    .blocks_count
                    .map(|n| format!(", {} blocks", n))
                    .unwrap_or_default();
                println!("{} {} ({}{})", e.id, e.name, state, blocks);
            }
        }
        ExtensionCommands::Delete { extension } => {
            let ext = find_extension(rt, &extension)?;
            if !rt.extensions.delete(&ext, confirm)? {
                println!("Cancelled");
            }
        }
        ExtensionCommands::Upload { file, name, update } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("read {}", file.display()))?;
            let name = match name {
                Some(n) => n,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| remove_file_extension(n).to_string())
                    .context("cannot derive extension name from file; pass --name")?,
            };
            let mode = if update {
                UploadMode::Update
            } else {
                UploadMode::Create
            };
            let id = rt.extensions.upload(&name, bytes, mode)?;
            println!("Uploaded {} as {}", name, id);
        }
        ExtensionCommands::Download { extension, out } => {
            let ext = find_extension(rt, &extension)?;
            let bytes = rt.extensions.download(&ext)?;
            let out = out.unwrap_or_else(|| {
                format!("{}.zip", remove_file_extension(&ext.name)).into()
            });
            write_atomic(&out, &bytes).with_context(|| format!("write {}", out.display()))?;
            println!("Wrote {}", out.display());
        }
    }
    Ok(())
}

fn handle_status(rt: &Runtime, json: bool) -> Result<()> {
    let id = rt.engine.engine_id()?;
    if id.is_none() {
        rt.alerts
            .warning("Analytics Engine is currently not started. Try again later ...");
    }
    let status = rt.engine.engine_status()?;
    if json {
        return print_json(&serde_json::json!({
            "id": id,
            "status": status.as_ref(),
        }));
    }
    println!("engine: {}", id.as_deref().unwrap_or("-"));
    if let Some(name) = &status.microservice_name {
        println!("microservice: {}", name);
    }
    if let Some(safe) = status.is_safe_mode {
        println!("safe mode: {}", safe);
    }
    Ok(())
}
