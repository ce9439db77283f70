// src/oracle.rs

//! What a mounted view of a materialized schema should look like, and a
//! checker comparing an actual mount against it.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::{Error, Result};
use crate::model::{CommitId, Repo, SchemaCommit};

/// Entry listed next to the commit hashes in `commits/`
pub const HEAD_ENTRY: &str = "HEAD";

fn hash_of(repo: &Repo, id: &str) -> Result<String> {
    repo.commit(id)?
        .hash()
        .map(str::to_string)
        .ok_or_else(|| Error::UnresolvedReference(id.to_string()))
}

/// Names expected in `commits/`: every commit hash plus `HEAD`.
pub fn expected_commit_entries(repo: &Repo) -> Result<Vec<String>> {
    let mut entries = BTreeSet::new();
    for (id, _) in repo.iter_commits() {
        entries.insert(hash_of(repo, &id)?);
    }
    entries.insert(HEAD_ENTRY.to_string());
    Ok(entries.into_iter().collect())
}

/// Names expected in `branches/`.
pub fn expected_branch_entries(repo: &Repo) -> Vec<String> {
    repo.branches.keys().cloned().collect()
}

/// Commit the mounted `HEAD` entry resolves to: the tip of the active
/// branch, or its origin when the branch has no commits of its own.
pub fn expected_head(repo: &Repo) -> Result<Option<CommitId>> {
    if let Some(tip) = repo.branch_tip(&repo.active_branch)? {
        return Ok(Some(tip));
    }
    match repo.branch(&repo.active_branch)?.from_commit.as_deref() {
        Some(origin) => Ok(Some(repo.canonical_id(origin)?)),
        None => Ok(None),
    }
}

/// Hashes of a commit's parents, first parent first.
pub fn expected_parent_hashes(repo: &Repo, id: &str) -> Result<Vec<String>> {
    repo.parent_ids(id)?
        .iter()
        .map(|parent| hash_of(repo, parent))
        .collect()
}

/// Hashes reachable from the tip of `branch`, each once, in the order the
/// ancestry walk first reaches them.
pub fn expected_branch_history(repo: &Repo, branch: &str) -> Result<Vec<String>> {
    let mut seen = BTreeSet::new();
    let mut history = Vec::new();
    for (id, _) in repo.iter_branch_commits(branch, None)? {
        let hash = hash_of(repo, &id)?;
        if seen.insert(hash.clone()) {
            history.push(hash);
        }
    }
    Ok(history)
}

/// One disagreement between the mount and the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub path: PathBuf,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, found {}",
            self.path.display(),
            self.expected,
            self.actual
        )
    }
}

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Compare modification times of commit entries with the commit time
    pub check_times: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        VerifyOptions { check_times: true }
    }
}

const MISSING: &str = "<missing>";

/// Compares the tree mounted at `mount` with a materialized schema.
/// An empty result means the mount agrees with the schema.
pub fn verify_mount(repo: &Repo, mount: &Path, options: &VerifyOptions) -> Result<Vec<Mismatch>> {
    let mut checker = Checker {
        repo,
        options,
        mismatches: Vec::new(),
    };

    let commits_dir = mount.join("commits");
    checker.expect_listing(&commits_dir, expected_commit_entries(repo)?)?;
    for (id, commit) in repo.iter_commits() {
        let dir = commits_dir.join(hash_of(repo, &id)?);
        checker.check_commit(&dir, &id, commit)?;
    }
    if let Some(head) = expected_head(repo)? {
        checker.check_commit(&commits_dir.join(HEAD_ENTRY), &head, repo.commit(&head)?)?;
    }

    checker.expect_listing(&mount.join("branches"), expected_branch_entries(repo))?;
    Ok(checker.mismatches)
}

struct Checker<'a> {
    repo: &'a Repo,
    options: &'a VerifyOptions,
    mismatches: Vec<Mismatch>,
}

impl Checker<'_> {
    fn mismatch(&mut self, path: &Path, expected: impl Into<String>, actual: impl Into<String>) {
        self.mismatches.push(Mismatch {
            path: path.to_path_buf(),
            expected: expected.into(),
            actual: actual.into(),
        });
    }

    fn expect_listing(&mut self, dir: &Path, mut expected: Vec<String>) -> Result<()> {
        expected.sort();
        match list_dir(dir)? {
            Some(actual) if actual == expected => {}
            Some(actual) => self.mismatch(dir, expected.join(", "), actual.join(", ")),
            None => self.mismatch(dir, expected.join(", "), MISSING),
        }
        Ok(())
    }

    fn expect_contents(&mut self, path: &Path, expected: &str) -> Result<()> {
        match read_file(path)? {
            Some(actual) if actual == expected => {}
            Some(actual) => self.mismatch(path, expected, actual),
            None => self.mismatch(path, expected, MISSING),
        }
        Ok(())
    }

    fn check_commit(&mut self, dir: &Path, id: &CommitId, commit: &SchemaCommit) -> Result<()> {
        let hash = hash_of(self.repo, id)?;
        self.expect_contents(&dir.join("hash"), &hash)?;
        self.expect_contents(&dir.join("message"), commit.message())?;

        let parents = expected_parent_hashes(self.repo, id)?;
        let parent_hash = dir.join("parent").join("hash");
        match (parents.is_empty(), read_file(&parent_hash)?) {
            (true, None) => {}
            (true, Some(actual)) => self.mismatch(&parent_hash, MISSING, actual),
            (false, None) => self.mismatch(&parent_hash, parents.join(" or "), MISSING),
            (false, Some(actual)) if parents.contains(&actual) => {}
            (false, Some(actual)) => self.mismatch(&parent_hash, parents.join(" or "), actual),
        }
        self.expect_listing(&dir.join("parents"), parents)?;

        if self.options.check_times {
            let expected = commit.time().timestamp();
            for path in [dir.to_path_buf(), dir.join("hash"), dir.join("message")] {
                match mtime(&path)? {
                    Some(actual) if actual == expected => {}
                    Some(actual) => self.mismatch(&path, expected.to_string(), actual.to_string()),
                    None => self.mismatch(&path, expected.to_string(), MISSING),
                }
            }
        }
        Ok(())
    }
}

fn not_found_as_none<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn list_dir(dir: &Path) -> Result<Option<Vec<String>>> {
    let Some(entries) = not_found_as_none(fs::read_dir(dir))? else {
        return Ok(None);
    };
    let mut names = Vec::new();
    for entry in entries {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(Some(names))
}

fn read_file(path: &Path) -> Result<Option<String>> {
    Ok(not_found_as_none(fs::read_to_string(path))?)
}

/// Modification time in whole seconds since the epoch.
fn mtime(path: &Path) -> Result<Option<i64>> {
    let Some(metadata) = not_found_as_none(fs::metadata(path))? else {
        return Ok(None);
    };
    let modified = metadata.modified()?;
    let secs = match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    };
    Ok(Some(secs))
}
