use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, ensure, Context, Result};
use gitcache_core::RevisionId;

use crate::types::StateTracker;

/// Shared tracker contract suite. Runs against a fresh repo created with
/// [`init_git_repo`]; the tracker must be rooted at `repo`.
pub fn run_tracker_contract_suite(tracker: &dyn StateTracker, repo: &Path) -> Result<()> {
    let head = tracker.current_revision()?;
    ensure!(head.as_str() == git(repo, &["rev-parse", "HEAD"])?, "current revision must match HEAD");
    ensure!(!tracker.is_dirty(), "fresh repo must be clean");
    ensure!(tracker.stable_revision_with_fallback()? == head, "clean tree must report HEAD");

    let root = Path::new(".");
    ensure!(tracker.has_changed_since_path(root, None)?, "no baseline must count as changed");
    ensure!(!tracker.has_changed_since_path(root, Some(&head))?, "nothing changed since HEAD");
    ensure!(tracker.triggering_revision(root, Some(&head))? == head, "no new commits keeps baseline");

    let c1 = commit_file(repo, "src/lib.rs", "pub fn a() {}\n")?;
    let c2 = commit_file(repo, "docs/guide.md", "# guide\n")?;
    let c3 = commit_file(repo, "src/main.rs", "fn main() {}\n")?;
    ensure!(tracker.current_revision()? == c3, "head must advance");

    let src = Path::new("src");
    let docs = Path::new("docs");
    ensure!(tracker.has_changed_since_path(src, Some(&head))?, "src changed since baseline");
    ensure!(!tracker.has_changed_since_path(docs, Some(&c2))?, "docs untouched after c2");
    ensure!(tracker.triggering_revision(src, Some(&head))? == c1, "oldest src change triggers");
    ensure!(tracker.triggering_revision(docs, Some(&c2))? == c2, "docs baseline unchanged");
    ensure!(tracker.triggering_revision(docs, None)? == c2, "no baseline reports last docs change");
    ensure!(tracker.revision_for_path(docs)? == c2, "last docs change");
    ensure!(tracker.revision_for_path(src)? == c3, "last src change");

    std::fs::write(repo.join("src/lib.rs"), "pub fn a() { /* wip */ }\n")?;
    ensure!(tracker.is_dirty(), "modified tree is dirty");
    ensure!(tracker.is_dirty_for_path(src), "src is dirty");
    ensure!(!tracker.is_dirty_for_path(docs), "docs is clean");
    ensure!(
        tracker.modified_paths(src)? == vec![Path::new("src/lib.rs").to_path_buf()],
        "only src/lib.rs is modified"
    );

    let dirty_a = tracker.stable_revision_with_fallback()?;
    ensure!(dirty_a != c3, "dirty tree must not report HEAD");
    ensure!(RevisionId::parse(dirty_a.as_str()).is_ok(), "fallback must look like a revision");
    ensure!(tracker.stable_revision_with_fallback()? == dirty_a, "fallback must be deterministic");

    std::fs::write(repo.join("src/lib.rs"), "pub fn a() { /* other */ }\n")?;
    let dirty_b = tracker.stable_revision_with_fallback()?;
    ensure!(dirty_a != dirty_b, "fallback must follow modified content");
    ensure!(tracker.stable_revision_with_fallback_for_path(docs)? == c2, "clean path reports its revision");
    ensure!(tracker.stable_revision_with_fallback_for_path(src)? != c3, "dirty path reports a fallback");

    git(repo, &["checkout", "--", "."])?;
    ensure!(!tracker.is_dirty(), "restored tree is clean");
    ensure!(tracker.stable_revision_with_fallback()? == c3, "restored tree reports HEAD");
    Ok(())
}

/// Initialize a minimal git repo fixture with one commit.
pub fn init_git_repo(dir: &Path) -> Result<RevisionId> {
    git(dir, &["init"])?;
    git(dir, &["config", "user.email", "gitcache@example.com"])?;
    git(dir, &["config", "user.name", "gitcache"])?;
    git(dir, &["config", "commit.gpgsign", "false"])?;
    commit_file(dir, "README.md", "fixture")
}

/// Write `rel` under `dir`, commit it, and return the new HEAD.
pub fn commit_file(dir: &Path, rel: &str, content: &str) -> Result<RevisionId> {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content)?;
    git(dir, &["add", rel])?;
    git(dir, &["commit", "-m", &format!("update {rel}")])?;
    Ok(RevisionId::parse(git(dir, &["rev-parse", "HEAD"])?)?)
}

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("run git {:?}", args))?;
    if !out.status.success() {
        return Err(anyhow!(
            "command failed: git {:?}\nstdout:{}\nstderr:{}",
            args,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}
