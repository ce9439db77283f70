// src/lib.rs

//! Builds real git repositories from declarative branch/commit schemas and
//! computes what a filesystem exposing those repositories should show.

pub mod ancestry;
pub mod error;
pub mod graph;
pub mod harness;
pub mod materializer;
pub mod model;
pub mod oracle;
pub mod resolve;

pub use ancestry::{iter_branch_commits, BranchCommits};
pub use error::{Error, ResolveError, Result, SchemaError};
pub use graph::build_graph;
pub use materializer::{materialize, Author, MaterializeOptions, Materialized};
pub use model::{commit_id, Branch, Commit, CommitFile, CommitId, MergeCommit, Repo, SchemaCommit};
pub use resolve::{resolve_graph, Graph};
