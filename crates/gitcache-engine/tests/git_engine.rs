use std::path::Path;

use gitcache_core::{BuildTarget, DecisionReason, ReportedRevision};
use gitcache_engine::{BuildDecisionEngine, Config};
use gitcache_vcs::contract::{commit_file, init_git_repo};
use tempfile::tempdir;

fn build(engine: &BuildDecisionEngine, target: &BuildTarget, bytes: &[u8]) -> ReportedRevision {
    std::fs::create_dir_all(target.artifact_path.parent().unwrap()).unwrap();
    std::fs::write(&target.artifact_path, bytes).unwrap();
    engine.record_build(target, bytes).reported_revision
}

#[test]
fn test_decide_and_record_against_git() {
    let repo = tempdir().unwrap();
    let out = tempdir().unwrap();
    init_git_repo(repo.path()).unwrap();
    let base = commit_file(repo.path(), "cmd/app/main.go", "package main\n").unwrap();

    let engine = BuildDecisionEngine::open(repo.path(), &Config::default());
    let target = BuildTarget::new(out.path().join("app"), "cmd");

    let d = engine.decide(&target);
    assert!(d.should_rebuild);
    assert_eq!(d.reason, DecisionReason::NoPriorBuild);
    assert_eq!(build(&engine, &target, b"v1"), ReportedRevision::Known(base.clone()));
    assert_eq!(
        std::fs::read_to_string(out.path().join("app.meta")).unwrap(),
        base.as_str()
    );

    // Commits outside the trigger path keep the artifact.
    commit_file(repo.path(), "docs/notes.md", "notes\n").unwrap();
    let d = engine.decide(&target);
    assert!(!d.should_rebuild);
    assert_eq!(d.reason, DecisionReason::UpToDate);
    assert_eq!(d.reported_revision, ReportedRevision::Known(base.clone()));

    let change = commit_file(repo.path(), "cmd/app/util.go", "package main\n").unwrap();
    commit_file(repo.path(), "cmd/app/more.go", "package main\n").unwrap();
    let d = engine.decide(&target);
    assert_eq!(d.reason, DecisionReason::StaleNeedsRebuild);

    assert_eq!(build(&engine, &target, b"v2"), ReportedRevision::Known(change));
    let head = engine.tracker().current_revision().unwrap();
    assert_eq!(
        engine.metadata().last_compilation_revision(&target.artifact_path).unwrap(),
        Some(head)
    );
}

#[test]
fn test_legacy_sidecar_extension() {
    let repo = tempdir().unwrap();
    let head = init_git_repo(repo.path()).unwrap();
    let mut cfg = Config::default();
    cfg.metadata.extension = "gopackager".into();

    let engine = BuildDecisionEngine::open(repo.path(), &cfg);
    let artifact = repo.path().join("bin/app");
    std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
    std::fs::write(&artifact, b"bin").unwrap();
    std::fs::write(repo.path().join("bin/app.gopackager"), head.as_str()).unwrap();

    let d = engine.decide(&BuildTarget::new(&artifact, Path::new(".")));
    assert_eq!(d.reason, DecisionReason::UpToDate);
}

#[test]
fn test_not_a_repository_still_decides() {
    let dir = tempdir().unwrap();
    let engine = BuildDecisionEngine::open(dir.path(), &Config::default());
    let target = BuildTarget::new(dir.path().join("app"), ".");

    let d = engine.decide(&target);
    assert!(d.should_rebuild);
    assert_eq!(d.reported_revision, ReportedRevision::Unknown);
    assert_eq!(build(&engine, &target, b"bin"), ReportedRevision::Unknown);
    assert!(!dir.path().join("app.meta").exists());
}
