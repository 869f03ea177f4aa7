use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli_exec;
mod cli_runtime;
mod cli_subcommands;
mod cli_time;

use self::cli_subcommands::{ConfigCommands, ExtensionCommands, RepoCommands};

#[derive(Parser)]
#[command(name = "anabuild")]
#[command(about = "Build and deploy analytics extensions from block repositories", long_about = None)]
pub(crate) struct Cli {
    /// Client configuration file
    #[arg(long, global = true, default_value = anabuild::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Answer yes to every confirmation
    #[arg(long, global = true)]
    yes: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Show or change the client configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Manage block repositories
    Repos {
        #[command(subcommand)]
        command: RepoCommands,
    },

    /// List candidate blocks of the enabled repositories
    Items {
        /// Only offer the selectable items of this repository
        #[arg(long)]
        repo: Option<String>,
        /// Leave out blocks already loaded into the engine
        #[arg(long)]
        hide_installed: bool,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Package blocks into an extension
    Build {
        /// Extension name (archive is `{name}.zip`)
        #[arg(long)]
        name: String,
        /// Repository id the blocks come from
        #[arg(long)]
        repo: String,
        /// Block file, name or id; repeatable
        #[arg(long = "item", conflicts_with_all = ["section", "all"])]
        items: Vec<String>,
        /// Manifest section to package
        #[arg(long, conflicts_with = "all")]
        section: Option<String>,
        /// Package every block of the repository
        #[arg(long)]
        all: bool,
        /// Keep the archive out of the platform binary store
        #[arg(long)]
        no_upload: bool,
        /// Do not restart the engine afterwards
        #[arg(long)]
        no_deploy: bool,
        /// Also write the archive here
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Restart the streaming analytics engine
    Restart,

    /// List blocks loaded into the engine
    Blocks {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage stored extension archives
    Extensions {
        #[command(subcommand)]
        command: ExtensionCommands,
    },

    /// Show engine identity and status
    Status {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// List alarms raised by the engine
    Alarms {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = anabuild::paging::DEFAULT_PAGE_SIZE)]
        page_size: u32,
        /// e.g. ACTIVE, ACKNOWLEDGED, CLEARED
        #[arg(long)]
        status: Option<String>,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// List events raised by the engine
    Events {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = anabuild::paging::DEFAULT_PAGE_SIZE)]
        page_size: u32,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    cli_runtime::init_logging(cli.verbose);
    cli_exec::handle_command(cli)
}
