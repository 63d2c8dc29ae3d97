use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Index comic archive libraries and read them page by page.
#[derive(Debug, Parser)]
#[command(name = "comicback", version)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON), layered over the defaults
    #[arg(long, short, global = true, env = "COMICBACK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage libraries
    #[command(subcommand)]
    Library(LibraryCommand),
    /// Reconcile a library (or one of its directories) with storage
    Scan {
        library: String,
        /// Directory inside the library; defaults to the root
        #[arg(default_value = "")]
        path: String,
        /// Remove records of deleted files afterwards
        #[arg(long, conflicts_with = "no_purge")]
        purge: bool,
        /// Don't purge, whatever the configuration says
        #[arg(long)]
        no_purge: bool,
    },
    /// List one directory of a library, reconciling it on the way
    Ls {
        library: String,
        #[arg(default_value = "")]
        path: String,
    },
    /// Write one page of a file
    Page {
        library: String,
        file_id: i64,
        index: usize,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Write the cover thumbnail of a file
    Cover {
        library: String,
        file_id: i64,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Read a file interactively: one command per stdin line (`+`, `-` or a
    /// page number); each response prints the file state as JSON and writes
    /// the current page to OUT
    Read {
        library: String,
        file_id: i64,
        #[arg(long, short)]
        out: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum LibraryCommand {
    /// Register a library
    Add {
        name: String,
        /// Absolute directory, or the directory inside the share for SMB
        root: String,
        #[arg(long)]
        hidden: bool,
        #[command(flatten)]
        smb: SmbArgs,
    },
    /// List registered libraries
    List,
    /// Show one library and how many files it has catalogued
    Show { name: String },
    /// Move a library's root or change whether it is hidden
    Update {
        name: String,
        #[arg(long)]
        root: Option<String>,
        #[arg(long)]
        hidden: Option<bool>,
    },
    /// Forget a library and all of its records
    Remove { name: String },
}

/// Any of these makes the library an SMB library.
#[derive(Debug, Clone, Args)]
pub struct SmbArgs {
    #[arg(long)]
    pub smb_server: Option<String>,
    #[arg(long)]
    pub smb_share: Option<String>,
    #[arg(long)]
    pub smb_user: Option<String>,
    #[arg(long, env = "COMICBACK_SMB_PASSWORD", hide_env_values = true)]
    pub smb_password: Option<String>,
}

impl SmbArgs {
    pub fn is_empty(&self) -> bool {
        self.smb_server.is_none() && self.smb_share.is_none() && self.smb_user.is_none() && self.smb_password.is_none()
    }
}
