//! Dependency graph construction and schema validation.

use std::path::PathBuf;

use gitfs_fixture::{build_graph, resolve_graph, Graph, Repo, SchemaError};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn graph_of(entries: &[(&str, Vec<&str>)]) -> Graph {
    entries
        .iter()
        .map(|(node, deps)| (node.to_string(), deps.iter().map(|d| d.to_string()).collect()))
        .collect()
}

fn repo(json: &str) -> Repo {
    Repo::from_json(json).unwrap()
}

const MERGE_REPO: &str = r#"{
    "main_branch": "main",
    "active_branch": "main",
    "branches": {
        "main": {"from_commit": null, "commits": [
            {"message": "c0", "time": "2023-01-01T00:00:00+00:00", "files": []},
            {"message": "c1", "time": "2023-01-02T00:00:00+00:00", "files": []},
            {"message": "merge", "time": "2023-01-04T00:00:00+00:00", "other_commit": "bar:0"}
        ]},
        "bar": {"from_commit": "main:0", "commits": [
            {"message": "b0", "time": "2023-01-03T00:00:00+00:00", "files": []}
        ]}
    }
}"#;

#[test]
fn merge_commit_depends_on_both_parents() {
    let graph = build_graph(&repo(MERGE_REPO)).unwrap();
    let expected = graph_of(&[
        ("main:0", vec![]),
        ("main:1", vec!["main:0"]),
        ("main:2", vec!["main:1", "bar:0"]),
        ("bar:0", vec!["main:0"]),
    ]);
    assert_eq!(graph, expected);
}

#[test]
fn fixture_graph() {
    let schema = Repo::load(fixture("small_repo.json")).unwrap();
    let graph = build_graph(&schema).unwrap();
    let expected = graph_of(&[
        ("main:0", vec![]),
        ("main:1", vec!["main:0"]),
        ("main:2", vec!["main:1", "bar:0"]),
        ("bar:0", vec!["main:0"]),
        ("baz:0", vec!["main:1"]),
        ("baz:1", vec!["baz:0"]),
    ]);
    assert_eq!(graph, expected);

    let order = resolve_graph(&graph).unwrap();
    assert_eq!(order.len(), 6);
    assert_eq!(order[0], "main:0");
}

#[test]
fn references_are_canonicalized() {
    let schema = repo(
        r#"{
        "branches": {
            "main": {"from_commit": null, "commits": [
                {"message": "c0", "time": "2023-01-01T00:00:00+00:00", "files": []},
                {"message": "c1", "time": "2023-01-02T00:00:00+00:00", "files": []}
            ]},
            "dev": {"from_commit": "main:-1", "commits": [
                {"message": "d0", "time": "2023-01-03T00:00:00+00:00", "files": []},
                {"message": "m", "time": "2023-01-04T00:00:00+00:00", "other_commit": "main:-2"}
            ]}
        }
    }"#,
    );
    let graph = build_graph(&schema).unwrap();
    assert_eq!(graph["dev:0"], vec!["main:1".to_string()]);
    assert_eq!(graph["dev:1"], vec!["dev:0".to_string(), "main:0".to_string()]);
}

#[test]
fn non_main_branch_needs_an_origin() {
    let schema = repo(
        r#"{
        "main_branch": "main",
        "active_branch": "main",
        "branches": {
            "main": {"from_commit": null, "commits": [
                {"message": "c0", "time": "2023-01-01T00:00:00+00:00", "files": []}
            ]},
            "orphan": {"from_commit": null, "commits": [
                {"message": "o0", "time": "2023-01-02T00:00:00+00:00", "files": []}
            ]}
        }
    }"#,
    );
    match build_graph(&schema) {
        Err(SchemaError::MissingOrigin(branch)) => assert_eq!(branch, "orphan"),
        other => panic!("expected missing origin, got {other:?}"),
    }
    assert!(schema.validate().is_err());
}

#[test]
fn main_branch_must_not_have_an_origin() {
    let schema = repo(
        r#"{
        "main_branch": "main",
        "active_branch": "main",
        "branches": {
            "main": {"from_commit": "main:0", "commits": [
                {"message": "c0", "time": "2023-01-01T00:00:00+00:00", "files": []}
            ]}
        }
    }"#,
    );
    match build_graph(&schema) {
        Err(SchemaError::MainHasOrigin(branch)) => assert_eq!(branch, "main"),
        other => panic!("expected main branch origin failure, got {other:?}"),
    }
}

#[test]
fn merge_cannot_start_the_repository() {
    let schema = repo(
        r#"{
        "branches": {
            "main": {"from_commit": null, "commits": [
                {"message": "m", "time": "2023-01-01T00:00:00+00:00", "other_commit": "main:0"}
            ]}
        }
    }"#,
    );
    match build_graph(&schema) {
        Err(SchemaError::InitialMerge(id)) => assert_eq!(id, "main:0"),
        other => panic!("expected initial merge failure, got {other:?}"),
    }
}

#[test]
fn merge_may_start_a_forked_branch() {
    let schema = repo(
        r#"{
        "branches": {
            "main": {"from_commit": null, "commits": [
                {"message": "c0", "time": "2023-01-01T00:00:00+00:00", "files": []},
                {"message": "c1", "time": "2023-01-02T00:00:00+00:00", "files": []}
            ]},
            "dev": {"from_commit": "main:0", "commits": [
                {"message": "m", "time": "2023-01-03T00:00:00+00:00", "other_commit": "main:1"}
            ]}
        }
    }"#,
    );
    let graph = build_graph(&schema).unwrap();
    assert_eq!(graph["dev:0"], vec!["main:0".to_string(), "main:1".to_string()]);
}

#[test]
fn unknown_references_fail() {
    let dangling_origin = repo(
        r#"{
        "branches": {
            "main": {"from_commit": null, "commits": []},
            "dev": {"from_commit": "main:3", "commits": []}
        }
    }"#,
    );
    assert!(matches!(build_graph(&dangling_origin), Err(SchemaError::UnknownCommit(_))));

    let unknown_active = repo(
        r#"{
        "main_branch": "main",
        "active_branch": "nope",
        "branches": {"main": {"from_commit": null, "commits": []}}
    }"#,
    );
    assert!(matches!(build_graph(&unknown_active), Err(SchemaError::UnknownBranch(_))));

    let bad_id = repo(
        r#"{
        "branches": {
            "main": {"from_commit": null, "commits": [
                {"message": "c0", "time": "2023-01-01T00:00:00+00:00", "files": []},
                {"message": "m", "time": "2023-01-02T00:00:00+00:00", "other_commit": "main"}
            ]}
        }
    }"#,
    );
    assert!(matches!(build_graph(&bad_id), Err(SchemaError::InvalidCommitId(_))));
}

#[test]
fn escaping_file_paths_are_rejected() {
    let schema = repo(
        r#"{
        "branches": {
            "main": {"from_commit": null, "commits": [
                {"message": "c0", "time": "2023-01-01T00:00:00+00:00",
                 "files": [{"path": "../outside.txt", "contents": "x"}]}
            ]}
        }
    }"#,
    );
    assert!(matches!(build_graph(&schema), Err(SchemaError::InvalidFilePath { .. })));
}

#[test]
fn commit_kind_needs_files_or_other_commit() {
    let err = Repo::from_json(
        r#"{"branches": {"main": {"from_commit": null, "commits": [
            {"message": "c0", "time": "2023-01-01T00:00:00+00:00"}
        ]}}}"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::Parse(_)));
}
