//! Ancestry walks over schemas, without building repositories.

use std::path::PathBuf;

use gitfs_fixture::{iter_branch_commits, Repo, SchemaError};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn walk(repo: &Repo, branch: &str, up_to: Option<usize>) -> Vec<String> {
    repo.iter_branch_commits(branch, up_to)
        .unwrap()
        .map(|(id, _)| id)
        .collect()
}

#[test]
fn linear_history_is_newest_first() {
    let repo = Repo::load(fixture("small_repo.json")).unwrap();
    assert_eq!(walk(&repo, "baz", None), ["baz:1", "baz:0", "main:1", "main:0"]);
    assert_eq!(walk(&repo, "baz", Some(0)), ["baz:0", "main:1", "main:0"]);
    assert_eq!(walk(&repo, "bar", None), ["bar:0", "main:0"]);
}

#[test]
fn merge_walks_other_branch_first() {
    let repo = Repo::load(fixture("small_repo.json")).unwrap();
    assert_eq!(
        walk(&repo, "main", None),
        ["main:2", "bar:0", "main:0", "main:1", "main:0"]
    );
    assert_eq!(walk(&repo, "main", Some(1)), ["main:1", "main:0"]);
}

/// `left` and `right` both fork from main:0; main merges right, then left.
const DIAMOND: &str = r#"{
    "branches": {
        "main": {"from_commit": null, "commits": [
            {"message": "root", "time": "2023-01-01T00:00:00+00:00", "files": []},
            {"message": "merge right", "time": "2023-01-04T00:00:00+00:00", "other_commit": "right:0"},
            {"message": "merge left", "time": "2023-01-05T00:00:00+00:00", "other_commit": "left:0"}
        ]},
        "left": {"from_commit": "main:0", "commits": [
            {"message": "l", "time": "2023-01-02T00:00:00+00:00", "files": []}
        ]},
        "right": {"from_commit": "main:0", "commits": [
            {"message": "r", "time": "2023-01-03T00:00:00+00:00", "files": []}
        ]}
    }
}"#;

#[test]
fn shared_ancestor_is_not_deduplicated() {
    let repo = Repo::from_json(DIAMOND).unwrap();
    let ids = walk(&repo, "main", None);
    assert_eq!(
        ids,
        ["main:2", "left:0", "main:0", "main:1", "right:0", "main:0", "main:0"]
    );
    assert_eq!(ids.iter().filter(|id| *id == "main:0").count(), 3);

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 5);
}

#[test]
fn repeated_merges_multiply_paths() {
    // Every commit on main after the first merges the previous commit of `side`
    let mut json = String::from(
        r#"{"branches": {"main": {"from_commit": null, "commits": [
        {"message": "root", "time": "2023-01-01T00:00:00+00:00", "files": []}"#,
    );
    for i in 0..4 {
        json.push_str(&format!(
            r#", {{"message": "m{i}", "time": "2023-02-0{}T00:00:00+00:00", "other_commit": "side:{i}"}}"#,
            i + 1
        ));
    }
    json.push_str(r#"]}, "side": {"from_commit": "main:0", "commits": ["#);
    for i in 0..4 {
        let sep = if i == 0 { "" } else { "," };
        json.push_str(&format!(
            r#"{sep}{{"message": "s{i}", "time": "2023-01-1{i}T00:00:00+00:00", "files": []}}"#
        ));
    }
    json.push_str("]}}}");

    let repo = Repo::from_json(&json).unwrap();
    let ids = walk(&repo, "main", None);
    let roots = ids.iter().filter(|id| *id == "main:0").count();
    assert_eq!(roots, 5);
    // main:1..=4, side walks of length 1 to 4, and every main:0
    assert_eq!(ids.len(), 4 + 10 + 5);
}

#[test]
fn walk_is_lazy_and_restartable() {
    let repo = Repo::from_json(DIAMOND).unwrap();
    let first: Vec<String> = iter_branch_commits(&repo, "main", None)
        .unwrap()
        .take(2)
        .map(|(id, _)| id)
        .collect();
    assert_eq!(first, ["main:2", "left:0"]);
    assert_eq!(walk(&repo, "main", None).len(), 7);
}

#[test]
fn empty_branch_walks_its_origin() {
    let repo = Repo::from_json(
        r#"{"branches": {
            "main": {"from_commit": null, "commits": [
                {"message": "c0", "time": "2023-01-01T00:00:00+00:00", "files": []}
            ]},
            "idle": {"from_commit": "main:0", "commits": []}
        }}"#,
    )
    .unwrap();
    assert_eq!(walk(&repo, "idle", None), ["main:0"]);
}

#[test]
fn bad_start_is_rejected() {
    let repo = Repo::from_json(DIAMOND).unwrap();
    assert!(matches!(
        repo.iter_branch_commits("nope", None),
        Err(SchemaError::UnknownBranch(_))
    ));
    assert!(matches!(
        repo.iter_branch_commits("main", Some(3)),
        Err(SchemaError::UnknownCommit(_))
    ));
}
