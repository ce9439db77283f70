// src/error.rs

use std::path::PathBuf;

use crate::model::CommitId;

/// Failures of the generic topological sort.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("graph contains cycles")]
    Cyclic,

    /// A dependency names a node that has no entry of its own.
    #[error("node {0} is not a key of the graph")]
    UnknownNode(String),
}

/// The schema is malformed. Always reported before the repository is touched.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid commit id `{0}`: expected `<branch>:<index>`")]
    InvalidCommitId(String),

    #[error("unknown branch `{0}`")]
    UnknownBranch(String),

    #[error("commit `{0}` does not exist")]
    UnknownCommit(String),

    #[error("branch `{0}` is not the main branch but has no `from_commit`")]
    MissingOrigin(String),

    #[error("main branch `{0}` must not have a `from_commit`")]
    MainHasOrigin(String),

    #[error("merge commit `{0}` cannot be the initial commit of the repository")]
    InitialMerge(CommitId),

    #[error("file `{path}` in commit `{commit}` must be a relative path inside the repository")]
    InvalidFilePath { commit: CommitId, path: String },

    #[error("cannot parse schema: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("commit graph contains cycles")]
    Cyclic,

    #[error("commit graph references unknown commit {0}")]
    UnknownNode(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A hash was read before the commit it belongs to was created.
    #[error("commit `{0}` is referenced before its hash was resolved")]
    UnresolvedReference(CommitId),

    #[error("merging into `{0}` produced conflicts")]
    MergeConflict(CommitId),

    #[error("{0} already exists and is not empty")]
    TargetNotEmpty(PathBuf),

    #[error("repository at {0} has no working directory")]
    NoWorkdir(PathBuf),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ResolveError> for Error {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Cyclic => Error::Cyclic,
            ResolveError::UnknownNode(node) => Error::UnknownNode(node),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
