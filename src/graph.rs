// src/graph.rs

use std::path::{Component, Path};

use crate::error::SchemaError;
use crate::model::{commit_id, CommitId, Repo, SchemaCommit};
use crate::resolve::Graph;

/// Turns a schema into a commit dependency graph, following git's parent
/// rules: each commit depends on its predecessor on the branch (or on the
/// branch origin for the first commit), and a merge commit additionally
/// depends on `other_commit`. Every reference is canonicalized so it
/// matches a key of the result.
///
/// This is also the schema validator. Nothing here touches a repository.
pub fn build_graph(repo: &Repo) -> Result<Graph<CommitId>, SchemaError> {
    repo.branch(&repo.main_branch)?;
    repo.branch(&repo.active_branch)?;

    let mut graph = Graph::new();
    for (name, branch) in &repo.branches {
        let is_main = *name == repo.main_branch;
        let origin = match &branch.from_commit {
            Some(_) if is_main => return Err(SchemaError::MainHasOrigin(name.clone())),
            Some(from) => Some(repo.canonical_id(from)?),
            None if !is_main => return Err(SchemaError::MissingOrigin(name.clone())),
            None => None,
        };

        for (i, commit) in branch.commits.iter().enumerate() {
            let id = commit_id(name, i);
            let mut deps = Vec::with_capacity(2);
            if i == 0 {
                deps.extend(origin.clone());
            } else {
                deps.push(commit_id(name, i - 1));
            }

            match commit {
                SchemaCommit::Merge(merge) => {
                    deps.push(repo.canonical_id(&merge.other_commit)?);
                    if deps.len() < 2 {
                        return Err(SchemaError::InitialMerge(id));
                    }
                }
                SchemaCommit::Plain(plain) => {
                    for file in &plain.files {
                        check_file_path(&id, &file.path)?;
                    }
                }
            }
            graph.insert(id, deps);
        }
    }
    Ok(graph)
}

fn check_file_path(commit: &str, path: &str) -> Result<(), SchemaError> {
    let components: Vec<_> = Path::new(path).components().collect();
    let valid = components.iter().any(|c| matches!(c, Component::Normal(_)))
        && components
            .iter()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidFilePath {
            commit: commit.to_string(),
            path: path.to_string(),
        })
    }
}
