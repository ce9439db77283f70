// src/cli.rs

use clap::{Parser, Subcommand};
use gitfs_fixture::Author;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log filter, e.g. `info` or `gitfs_fixture=debug`
    #[arg(long, global = true, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a git repository from a schema
    Build {
        /// Schema JSON file
        schema: PathBuf,

        /// Directory to create the repository in; must be missing or empty
        repo: PathBuf,

        /// Write the schema back with the created commit hashes filled in
        #[arg(long)]
        write_schema: Option<PathBuf>,

        #[command(flatten)]
        author: AuthorArgs,
    },

    /// Print the order in which commits get created
    Order {
        schema: PathBuf,
    },

    /// Print the commits reachable from a branch, newest first
    Log {
        schema: PathBuf,

        branch: String,

        /// Start from this commit index instead of the branch tip
        #[arg(long)]
        up_to: Option<usize>,

        /// Print every commit only once
        #[arg(long)]
        unique: bool,
    },

    /// Build a repository, mount it with the filesystem under test and
    /// compare the mount against the schema
    Verify {
        schema: PathBuf,

        repo: PathBuf,

        mount: PathBuf,

        /// Filesystem executable
        #[arg(long, env = "GITFS_BINARY")]
        binary: PathBuf,

        #[arg(long)]
        uid: Option<u32>,

        #[arg(long)]
        gid: Option<u32>,

        #[arg(long)]
        allow_nonempty: bool,

        /// Skip comparing modification times with commit times
        #[arg(long)]
        no_times: bool,

        #[command(flatten)]
        author: AuthorArgs,
    },
}

/// Identity used for every created commit
#[derive(clap::Args, Debug, Clone)]
pub struct AuthorArgs {
    #[arg(long)]
    pub author_name: Option<String>,

    #[arg(long)]
    pub author_email: Option<String>,
}

impl AuthorArgs {
    pub fn to_author(&self) -> Author {
        let default = Author::default();
        Author {
            name: self.author_name.clone().unwrap_or(default.name),
            email: self.author_email.clone().unwrap_or(default.email),
        }
    }
}
