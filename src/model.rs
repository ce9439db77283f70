// src/model.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Addresses a commit inside the schema as `"<branch>:<index>"`
pub type CommitId = String;

pub fn commit_id(branch: &str, index: usize) -> CommitId {
    format!("{branch}:{index}")
}

/// Splits a CommitId into its branch name and index. The index may be
/// negative, counting back from the branch tip (`main:-1` is the tip).
pub fn split_commit_id(id: &str) -> Result<(&str, i64), SchemaError> {
    let invalid = || SchemaError::InvalidCommitId(id.to_string());
    let (branch, index) = id.rsplit_once(':').ok_or_else(invalid)?;
    if branch.is_empty() {
        return Err(invalid());
    }
    let index = index.parse::<i64>().map_err(|_| invalid())?;
    Ok((branch, index))
}

/// A file written verbatim into the working tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFile {
    /// Path relative to the repository root
    pub path: String,
    pub contents: String,
}

/// A regular commit staging and committing all of its files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub message: String,
    #[serde(with = "iso8601")]
    pub time: DateTime<FixedOffset>,
    pub files: Vec<CommitFile>,
    /// Filled in once the commit exists in the repository
    #[serde(default)]
    pub hash: Option<String>,
}

/// A commit with two parents: its branch predecessor and `other_commit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeCommit {
    pub message: String,
    #[serde(with = "iso8601")]
    pub time: DateTime<FixedOffset>,
    pub other_commit: CommitId,
    #[serde(default)]
    pub hash: Option<String>,
}

/// Either kind of schema commit. Merge commits are recognized by their
/// `other_commit` field, plain commits by `files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaCommit {
    Merge(MergeCommit),
    Plain(Commit),
}

impl SchemaCommit {
    pub fn message(&self) -> &str {
        match self {
            SchemaCommit::Merge(c) => &c.message,
            SchemaCommit::Plain(c) => &c.message,
        }
    }

    pub fn time(&self) -> DateTime<FixedOffset> {
        match self {
            SchemaCommit::Merge(c) => c.time,
            SchemaCommit::Plain(c) => c.time,
        }
    }

    pub fn hash(&self) -> Option<&str> {
        match self {
            SchemaCommit::Merge(c) => c.hash.as_deref(),
            SchemaCommit::Plain(c) => c.hash.as_deref(),
        }
    }

    pub fn set_hash(&mut self, hash: Option<String>) {
        match self {
            SchemaCommit::Merge(c) => c.hash = hash,
            SchemaCommit::Plain(c) => c.hash = hash,
        }
    }

    /// Files of a plain commit; merge commits carry none.
    pub fn files(&self) -> &[CommitFile] {
        match self {
            SchemaCommit::Merge(_) => &[],
            SchemaCommit::Plain(c) => &c.files,
        }
    }

    pub fn other_commit(&self) -> Option<&str> {
        match self {
            SchemaCommit::Merge(c) => Some(&c.other_commit),
            SchemaCommit::Plain(_) => None,
        }
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, SchemaCommit::Merge(_))
    }
}

/// A line of history, optionally forked from another branch's commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Commit this branch starts from; only the main branch has none
    #[serde(default)]
    pub from_commit: Option<CommitId>,
    #[serde(default)]
    pub commits: Vec<SchemaCommit>,
}

/// Declarative description of a whole repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub branches: BTreeMap<String, Branch>,
    #[serde(default = "default_branch")]
    pub main_branch: String,
    /// Branch checked out once the repository is built
    #[serde(default = "default_branch")]
    pub active_branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

impl Repo {
    pub fn from_json(json: &str) -> Result<Repo, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Repo, SchemaError> {
        let json = fs::read_to_string(path)?;
        Repo::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SchemaError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Checks every structural rule of the schema without touching git.
    pub fn validate(&self) -> Result<(), SchemaError> {
        crate::graph::build_graph(self).map(|_| ())
    }

    pub fn branch(&self, name: &str) -> Result<&Branch, SchemaError> {
        self.branches
            .get(name)
            .ok_or_else(|| SchemaError::UnknownBranch(name.to_string()))
    }

    /// Resolves a CommitId to the owning branch name and a non-negative index.
    pub fn locate(&self, id: &str) -> Result<(&str, usize), SchemaError> {
        let (branch, index) = split_commit_id(id)?;
        let (name, branch) = self
            .branches
            .get_key_value(branch)
            .ok_or_else(|| SchemaError::UnknownBranch(branch.to_string()))?;
        let len = branch.commits.len() as i64;
        let index = if index < 0 { len + index } else { index };
        if index < 0 || index >= len {
            return Err(SchemaError::UnknownCommit(id.to_string()));
        }
        Ok((name.as_str(), index as usize))
    }

    pub fn canonical_id(&self, id: &str) -> Result<CommitId, SchemaError> {
        let (branch, index) = self.locate(id)?;
        Ok(commit_id(branch, index))
    }

    pub fn commit(&self, id: &str) -> Result<&SchemaCommit, SchemaError> {
        let (branch, index) = self.locate(id)?;
        Ok(&self.branches[branch].commits[index])
    }

    pub fn commit_mut(&mut self, id: &str) -> Result<&mut SchemaCommit, SchemaError> {
        let (branch, index) = self.locate(id)?;
        let branch = branch.to_string();
        self.branches
            .get_mut(&branch)
            .and_then(|b| b.commits.get_mut(index))
            .ok_or_else(|| SchemaError::UnknownCommit(id.to_string()))
    }

    /// The commit preceding `id` on its own line of history: the previous
    /// commit of the branch, or the branch origin for a branch-initial
    /// commit. `None` for the first commit of the repository.
    pub fn parent_commit_id(&self, id: &str) -> Result<Option<CommitId>, SchemaError> {
        let (branch, index) = self.locate(id)?;
        if index > 0 {
            return Ok(Some(commit_id(branch, index - 1)));
        }
        match &self.branches[branch].from_commit {
            Some(from) => Ok(Some(self.canonical_id(from)?)),
            None => Ok(None),
        }
    }

    /// All logical parents, first parent first.
    pub fn parent_ids(&self, id: &str) -> Result<Vec<CommitId>, SchemaError> {
        let mut parents: Vec<CommitId> = self.parent_commit_id(id)?.into_iter().collect();
        if let Some(other) = self.commit(id)?.other_commit() {
            parents.push(self.canonical_id(other)?);
        }
        Ok(parents)
    }

    pub fn branch_tip(&self, name: &str) -> Result<Option<CommitId>, SchemaError> {
        let branch = self.branch(name)?;
        Ok(branch.commits.len().checked_sub(1).map(|i| commit_id(name, i)))
    }

    /// Every commit of every branch, in branch order.
    pub fn iter_commits(&self) -> impl Iterator<Item = (CommitId, &SchemaCommit)> + '_ {
        self.branches.iter().flat_map(|(name, branch)| {
            branch
                .commits
                .iter()
                .enumerate()
                .map(move |(i, commit)| (commit_id(name, i), commit))
        })
    }

    pub fn commit_count(&self) -> usize {
        self.branches.values().map(|b| b.commits.len()).sum()
    }

    pub fn clear_hashes(&mut self) {
        for branch in self.branches.values_mut() {
            for commit in &mut branch.commits {
                commit.set_hash(None);
            }
        }
    }
}

/// Parses an ISO-8601 timestamp. Timestamps without an offset are taken as UTC.
pub fn parse_time(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).or_else(|err| {
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| Utc.from_utc_datetime(&naive).into())
            .ok_or(err)
    })
}

mod iso8601 {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &DateTime<FixedOffset>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}
