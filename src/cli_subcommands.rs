use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum ConfigCommands {
    /// Show the configuration
    Show {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Create or update the configuration
    Set {
        /// Platform tenant url
        #[arg(long)]
        url: Option<String>,
        /// Bearer token
        #[arg(long, conflicts_with_all = ["user", "password"])]
        token: Option<String>,
        /// Basic auth user (`tenant/user`)
        #[arg(long, requires = "password")]
        user: Option<String>,
        #[arg(long, requires = "user")]
        password: Option<String>,
        /// Path of the packaging service below the tenant url
        #[arg(long)]
        backend_path: Option<String>,
        /// Request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[derive(Subcommand)]
pub(crate) enum RepoCommands {
    /// List configured repositories
    List {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a repository
    Add {
        #[arg(long)]
        name: String,
        /// GitHub web or content API url
        #[arg(long)]
        url: String,
        /// Access token for private repositories
        #[arg(long)]
        token: Option<String>,
        /// Add without enabling it
        #[arg(long)]
        disabled: bool,
    },

    /// Change a repository
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },

    /// Remove a repository
    Remove { id: String },

    /// Enable a repository
    Enable { id: String },

    /// Disable a repository
    Disable { id: String },

    /// Check that a repository url is reachable
    Test { id: String },
}

#[derive(Subcommand)]
pub(crate) enum ExtensionCommands {
    /// List stored extensions and whether the engine loaded them
    List {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored extension
    Delete {
        /// Extension id or name
        extension: String,
    },

    /// Upload an extension archive
    Upload {
        file: PathBuf,
        /// Defaults to the file name without `.zip`
        #[arg(long)]
        name: Option<String>,
        /// Replace an extension with the same name
        #[arg(long)]
        update: bool,
    },

    /// Download a stored extension archive
    Download {
        /// Extension id or name
        extension: String,
        /// Defaults to `{name}.zip`
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
