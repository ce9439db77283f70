// src/ancestry.rs

use crate::error::SchemaError;
use crate::model::{commit_id, CommitId, Repo, SchemaCommit};

/// Position of the walk within one branch
#[derive(Debug, Clone)]
struct Frame<'a> {
    branch: &'a str,
    /// Next index to yield, walking towards 0; `None` once exhausted
    next: Option<usize>,
}

/// Commits reachable from a branch position, newest first.
///
/// Merge commits are followed into `other_commit`'s branch right after the
/// merge itself is yielded; the branch origin is followed once the branch's
/// own commits run out. Nothing is deduplicated: a commit reachable through
/// several merges is yielded once per path, so the output can grow
/// exponentially with densely merged histories. Callers that want a set
/// must dedupe by CommitId or hash.
#[derive(Debug, Clone)]
pub struct BranchCommits<'a> {
    repo: &'a Repo,
    stack: Vec<Frame<'a>>,
}

impl<'a> BranchCommits<'a> {
    fn frame(&self, id: &str) -> Option<Frame<'a>> {
        let repo: &'a Repo = self.repo;
        let (branch, index) = repo.locate(id).ok()?;
        Some(Frame { branch, next: Some(index) })
    }
}

impl<'a> Iterator for BranchCommits<'a> {
    type Item = (CommitId, &'a SchemaCommit);

    fn next(&mut self) -> Option<Self::Item> {
        let repo: &'a Repo = self.repo;
        loop {
            let top = self.stack.last_mut()?;
            let branch_name = top.branch;
            let branch = repo.branches.get(branch_name)?;

            let Some(index) = top.next else {
                self.stack.pop();
                if let Some(origin) = branch.from_commit.as_deref() {
                    let frame = self.frame(origin)?;
                    self.stack.push(frame);
                }
                continue;
            };
            top.next = index.checked_sub(1);

            let commit = branch.commits.get(index)?;
            if let Some(other) = commit.other_commit() {
                let frame = self.frame(other)?;
                self.stack.push(frame);
            }
            return Some((commit_id(branch_name, index), commit));
        }
    }
}

/// Walks the ancestry of `branch` starting at `up_to` (default: the tip).
///
/// The schema is validated up front, so every reference followed during
/// the walk is known to resolve.
pub fn iter_branch_commits<'a>(
    repo: &'a Repo,
    branch: &str,
    up_to: Option<usize>,
) -> Result<BranchCommits<'a>, SchemaError> {
    repo.validate()?;
    let (name, start) = repo
        .branches
        .get_key_value(branch)
        .ok_or_else(|| SchemaError::UnknownBranch(branch.to_string()))?;

    let next = match up_to {
        Some(i) if i >= start.commits.len() => {
            return Err(SchemaError::UnknownCommit(commit_id(branch, i)))
        }
        Some(i) => Some(i),
        None => start.commits.len().checked_sub(1),
    };

    Ok(BranchCommits {
        repo,
        stack: vec![Frame { branch: name, next }],
    })
}

impl Repo {
    pub fn iter_branch_commits(
        &self,
        branch: &str,
        up_to: Option<usize>,
    ) -> Result<BranchCommits<'_>, SchemaError> {
        iter_branch_commits(self, branch, up_to)
    }
}
