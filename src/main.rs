// src/main.rs

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Command};
use gitfs_fixture::harness::{FsBinary, MountFlags};
use gitfs_fixture::oracle::{verify_mount, VerifyOptions};
use gitfs_fixture::{build_graph, materialize, resolve_graph, MaterializeOptions, Repo};
use std::collections::HashSet;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();

    let start_time = Instant::now();
    match run(args.command) {
        Ok(()) => {
            tracing::debug!(elapsed = ?start_time.elapsed(), "finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load(path: &Path) -> Result<Repo> {
    Repo::load(path).with_context(|| format!("cannot load schema {}", path.display()))
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Build { schema: schema_path, repo, write_schema, author } => {
            let mut schema = load(&schema_path)?;
            let options = MaterializeOptions { author: author.to_author(), progress: true };
            let start_time = Instant::now();
            let built = materialize(&mut schema, &repo, &options)
                .with_context(|| format!("cannot build repository at {}", repo.display()))?;
            println!(
                "Built {} commits on {} branches in {:.2?}.",
                built.created.len(),
                schema.branches.len(),
                start_time.elapsed()
            );
            if let Some(out) = write_schema {
                schema.save(&out)?;
                println!("Schema with hashes written to {}.", out.display());
            }
        }
        Command::Order { schema } => {
            let schema = load(&schema)?;
            for id in resolve_graph(&build_graph(&schema)?)? {
                println!("{id}");
            }
        }
        Command::Log { schema, branch, up_to, unique } => {
            let schema = load(&schema)?;
            let mut seen = HashSet::new();
            for (id, commit) in schema.iter_branch_commits(&branch, up_to)? {
                if unique && !seen.insert(id.clone()) {
                    continue;
                }
                let kind = if commit.is_merge() { "merge" } else { "commit" };
                println!("{id}\t{kind}\t{}\t{}", commit.time().to_rfc3339(), commit.message());
            }
        }
        Command::Verify { schema, repo, mount, binary, uid, gid, allow_nonempty, no_times, author } => {
            let mut schema = load(&schema)?;
            let options = MaterializeOptions { author: author.to_author(), progress: true };
            materialize(&mut schema, &repo, &options)
                .with_context(|| format!("cannot build repository at {}", repo.display()))?;

            let binary = FsBinary::new(binary);
            let flags = MountFlags { uid, gid, allow_nonempty, ..MountFlags::default() };
            let process = binary
                .mount(Some(repo.as_path()), Some(mount.as_path()), &flags)
                .with_context(|| format!("cannot run {}", binary.path().display()))?;
            if !process.success() {
                bail!("filesystem exited with {:?}: {}", process.code, process.stderr.trim());
            }

            let mismatches = verify_mount(&schema, &mount, &VerifyOptions { check_times: !no_times })?;
            process.unmount().context("cannot unmount filesystem")?;
            for mismatch in &mismatches {
                println!("{mismatch}");
            }
            if !mismatches.is_empty() {
                bail!("{} mismatches between mount and schema", mismatches.len());
            }
            println!("Mount matches schema: {} commits, {} branches.", schema.commit_count(), schema.branches.len());
        }
    }
    Ok(())
}
