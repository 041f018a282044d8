use std::process::Command;

use lanekeeper_git::{EntryMode, GitRepo, GixRepo};
use tempfile::TempDir;

/// Build a tiny repo with one commit via the `git` CLI, since this crate no
/// longer writes objects itself — only the CLI's own fixtures create history.
fn setup_repo_with_commit() -> (TempDir, GixRepo, String) {
    let dir = TempDir::new().unwrap();
    let run = |args: &[&str]| {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir.path())
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    };
    run(&["init", "-q", "-b", "main"]);
    run(&["config", "user.email", "test@test.com"]);
    run(&["config", "user.name", "Test User"]);
    std::fs::write(dir.path().join("hello.txt"), "hello world\n").unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
    run(&["add", "."]);
    run(&["commit", "-q", "-m", "initial commit"]);

    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    let head_sha = String::from_utf8(output.stdout).unwrap().trim().to_string();

    let repo = GixRepo::open(dir.path()).unwrap();
    (dir, repo, head_sha)
}

#[test]
fn open_repo() {
    let (_dir, _repo, _head) = setup_repo_with_commit();
}

#[test]
fn rev_parse_head_matches_cli() {
    let (_dir, repo, head_sha) = setup_repo_with_commit();
    let resolved = repo.rev_parse("HEAD").unwrap();
    assert_eq!(resolved.to_string(), head_sha);
}

#[test]
fn rev_parse_opt_missing_branch_is_none() {
    let (_dir, repo, _head) = setup_repo_with_commit();
    let result = repo.rev_parse_opt("refs/heads/does-not-exist").unwrap();
    assert!(result.is_none());
}

#[test]
fn rev_parse_opt_fresh_repo_has_no_head() {
    let dir = TempDir::new().unwrap();
    Command::new("git")
        .args(["init", "-q"])
        .current_dir(dir.path())
        .status()
        .unwrap();
    let repo = GixRepo::open(dir.path()).unwrap();
    assert!(repo.rev_parse_opt("HEAD").unwrap().is_none());
}

#[test]
fn read_commit_exposes_metadata() {
    let (_dir, repo, head_sha) = setup_repo_with_commit();
    let oid = head_sha.parse().unwrap();
    let info = repo.read_commit(oid).unwrap();
    assert!(info.parents.is_empty());
    assert_eq!(info.message.trim(), "initial commit");
    assert!(info.author.contains("Test User"));
    assert!(info.committer_time > 0);
}

#[test]
fn read_tree_lists_top_level_entries() {
    let (_dir, repo, head_sha) = setup_repo_with_commit();
    let oid = head_sha.parse().unwrap();
    let commit = repo.read_commit(oid).unwrap();
    let entries = repo.read_tree(commit.tree_oid).unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"hello.txt"));
    assert!(names.contains(&"src"));
    let src_entry = entries.iter().find(|e| e.name == "src").unwrap();
    assert_eq!(src_entry.mode, EntryMode::Tree);
}

#[test]
fn read_tree_recurses_into_subtrees() {
    let (_dir, repo, head_sha) = setup_repo_with_commit();
    let oid = head_sha.parse().unwrap();
    let commit = repo.read_commit(oid).unwrap();
    let top = repo.read_tree(commit.tree_oid).unwrap();
    let src_entry = top.iter().find(|e| e.name == "src").unwrap();
    let nested = repo.read_tree(src_entry.oid).unwrap();
    assert_eq!(nested.len(), 1);
    assert_eq!(nested[0].name, "main.rs");
    assert_eq!(nested[0].mode, EntryMode::Blob);
}

#[test]
fn read_blob_returns_exact_bytes() {
    let (_dir, repo, head_sha) = setup_repo_with_commit();
    let oid = head_sha.parse().unwrap();
    let commit = repo.read_commit(oid).unwrap();
    let entries = repo.read_tree(commit.tree_oid).unwrap();
    let hello = entries.iter().find(|e| e.name == "hello.txt").unwrap();
    let data = repo.read_blob(hello.oid).unwrap();
    assert_eq!(data, b"hello world\n");
}
