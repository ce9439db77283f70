// src/materializer.rs

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use git2::build::CheckoutBuilder;
use git2::{BranchType, Commit, ErrorCode, Oid, Repository, RepositoryInitOptions, Signature, Time};
use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::error::{Error, Result, SchemaError};
use crate::graph::build_graph;
use crate::model::{self, CommitId, MergeCommit, Repo, SchemaCommit};
use crate::resolve::resolve_graph;

/// Identity recorded as both author and committer of every commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Default for Author {
    fn default() -> Self {
        Author {
            name: "gitfs-fixture".to_string(),
            email: "fixture@localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaterializeOptions {
    pub author: Author,
    /// Draw a progress bar on stderr while commits are created
    pub progress: bool,
}

/// A freshly built repository
pub struct Materialized {
    pub repository: Repository,
    /// Commits in the order their hashes were assigned
    pub created: Vec<(CommitId, Oid)>,
}

/// Builds a real repository at `path` from `schema` and writes every
/// resulting commit hash back into the schema.
///
/// `path` must be missing or an empty directory; an existing repository is
/// never reopened.
///
/// The schema is validated and ordered before anything is written to disk,
/// so a bad schema never leaves a half-built repository behind.
pub fn materialize(schema: &mut Repo, path: &Path, options: &MaterializeOptions) -> Result<Materialized> {
    // 1. Resolve a creation order that respects every parent edge
    let graph = build_graph(schema)?;
    let order = resolve_graph(&graph)?;

    // 2. Start an empty repository whose HEAD is the main branch
    if !is_empty_target(path)? {
        return Err(Error::TargetNotEmpty(path.to_path_buf()));
    }
    let mut init = RepositoryInitOptions::new();
    init.initial_head(&schema.main_branch);
    let repository = Repository::init_opts(path, &init)?;
    schema.clear_hashes();
    let workdir = repository
        .workdir()
        .ok_or_else(|| Error::NoWorkdir(path.to_path_buf()))?
        .to_path_buf();
    info!(path = %path.display(), commits = order.len(), "materializing repository");

    let bar = if options.progress {
        ProgressBar::new(order.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    bar.set_message("Creating commits");

    let created = {
        let current = schema.main_branch.clone();
        let mut builder = Builder {
            repo: &repository,
            schema,
            workdir,
            author: &options.author,
            current,
            created: Vec::with_capacity(order.len()),
        };

        // 3. Create the commits, switching branches only when the order demands it
        for id in &order {
            builder.create(id)?;
            bar.inc(1);
        }

        // 4. Branches without commits of their own still get a ref
        builder.create_empty_branches()?;

        let active = builder.schema.active_branch.clone();
        builder.switch_branch(&active)?;
        builder.created
    };
    bar.finish_with_message("Repository complete");
    info!(commits = created.len(), "repository materialized");

    Ok(Materialized { repository, created })
}

struct Builder<'r> {
    repo: &'r Repository,
    schema: &'r mut Repo,
    workdir: PathBuf,
    author: &'r Author,
    /// Branch HEAD currently points to
    current: String,
    created: Vec<(CommitId, Oid)>,
}

impl<'r> Builder<'r> {
    fn create(&mut self, id: &str) -> Result<Oid> {
        let (branch, _) = self.schema.locate(id)?;
        let branch = branch.to_string();
        self.switch_branch(&branch)?;

        let oid = match self.schema.commit(id)? {
            SchemaCommit::Plain(commit) => {
                self.commit_files(&commit.files, &commit.message, commit.time)?
            }
            SchemaCommit::Merge(merge) => self.merge(id, merge)?,
        };

        self.schema.commit_mut(id)?.set_hash(Some(oid.to_string()));
        self.created.push((id.to_string(), oid));
        debug!(commit = id, hash = %oid, "created commit");
        Ok(oid)
    }

    fn switch_branch(&mut self, name: &str) -> Result<()> {
        if self.current == name {
            return Ok(());
        }

        let exists = match self.repo.find_branch(name, BranchType::Local) {
            Ok(_) => true,
            Err(e) if e.code() == ErrorCode::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if !exists {
            if let Some(from) = self.schema.branch(name)?.from_commit.clone() {
                let target = self.resolved_commit(&from)?;
                self.repo.branch(name, &target, false)?;
                debug!(branch = name, from = %from, "created branch");
            }
        }

        let refname = format!("refs/heads/{name}");
        match self.repo.revparse_single(&refname) {
            Ok(target) => self.repo.checkout_tree(&target, Some(CheckoutBuilder::new().force()))?,
            // Unborn main branch, nothing to check out yet
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.repo.set_head(&refname)?;
        debug!(from = %self.current, to = name, "switched branch");
        self.current = name.to_string();
        Ok(())
    }

    fn create_empty_branches(&mut self) -> Result<()> {
        let empty: Vec<(String, CommitId)> = self
            .schema
            .branches
            .iter()
            .filter(|(_, branch)| branch.commits.is_empty())
            .filter_map(|(name, branch)| Some((name.clone(), branch.from_commit.clone()?)))
            .collect();
        for (name, from) in empty {
            let target = self.resolved_commit(&from)?;
            self.repo.branch(&name, &target, false)?;
            debug!(branch = %name, from = %from, "created empty branch");
        }
        Ok(())
    }

    fn commit_files(
        &self,
        files: &[model::CommitFile],
        message: &str,
        time: DateTime<FixedOffset>,
    ) -> Result<Oid> {
        let mut index = self.repo.index()?;
        for file in files {
            let relative = relative_path(&file.path);
            let target = self.workdir.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &file.contents)?;
            index.add_path(&relative)?;
        }
        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let parents: Vec<Commit<'r>> = self.head_commit()?.into_iter().collect();
        let parents: Vec<&Commit<'r>> = parents.iter().collect();
        let signature = self.signature(time)?;
        Ok(self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?)
    }

    fn merge(&self, id: &str, merge: &MergeCommit) -> Result<Oid> {
        let other = self.resolved_commit(&merge.other_commit)?;
        let head = self
            .head_commit()?
            .ok_or_else(|| SchemaError::InitialMerge(id.to_string()))?;

        let base = self.repo.find_commit(self.repo.merge_base(head.id(), other.id())?)?;
        let mut index = self
            .repo
            .merge_trees(&base.tree()?, &head.tree()?, &other.tree()?, None)?;
        if index.has_conflicts() {
            return Err(Error::MergeConflict(id.to_string()));
        }
        let tree = self.repo.find_tree(index.write_tree_to(self.repo)?)?;

        let signature = self.signature(merge.time)?;
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &merge.message,
            &tree,
            &[&head, &other],
        )?;
        // Bring index and working tree in line with the merged tree
        self.repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        Ok(oid)
    }

    /// The repository commit for an already created schema commit.
    fn resolved_commit(&self, id: &str) -> Result<Commit<'r>> {
        let repo: &'r Repository = self.repo;
        let hash = self
            .schema
            .commit(id)?
            .hash()
            .ok_or_else(|| Error::UnresolvedReference(id.to_string()))?;
        Ok(repo.find_commit(Oid::from_str(hash)?)?)
    }

    fn head_commit(&self) -> Result<Option<Commit<'r>>> {
        let repo: &'r Repository = self.repo;
        match repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn signature(&self, time: DateTime<FixedOffset>) -> Result<Signature<'static>> {
        let offset_minutes = time.offset().local_minus_utc() / 60;
        let when = Time::new(time.timestamp(), offset_minutes);
        Ok(Signature::new(&self.author.name, &self.author.email, &when)?)
    }
}

fn relative_path(path: &str) -> PathBuf {
    Path::new(path)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Missing or an empty directory
fn is_empty_target(path: &Path) -> Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}
