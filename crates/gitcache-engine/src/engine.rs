use std::path::Path;
use std::sync::Arc;

use gitcache_core::{
    BuildRecord, BuildTarget, Decision, DecisionReason, RealFileSystem, ReportedRevision, RevisionId,
};
use gitcache_hash::{ContentHasher, Hasher};
use gitcache_vcs::{SidecarMetadata, StateTracker};
use gitcache_vcs_git::GitStateTracker;
use tracing::{debug, trace, warn};

use crate::Config;

/// Decides whether an artifact can be reused and records successful builds.
///
/// Holds no state of its own between calls; everything comes from the
/// tracker, the artifact on disk and its sidecar.
#[derive(Clone)]
pub struct BuildDecisionEngine {
    tracker: Arc<dyn StateTracker>,
    hasher: Arc<dyn ContentHasher>,
    metadata: SidecarMetadata,
}

impl BuildDecisionEngine {
    pub fn new(tracker: Arc<dyn StateTracker>, hasher: Arc<dyn ContentHasher>, metadata: SidecarMetadata) -> Self {
        Self {
            tracker,
            hasher,
            metadata,
        }
    }

    /// Engine over the git working tree at `repo_root`, configured from `cfg`.
    pub fn open(repo_root: &Path, cfg: &Config) -> Self {
        let tracker = GitStateTracker::new(repo_root).with_program(cfg.git_program());
        let metadata = SidecarMetadata::new(Arc::new(RealFileSystem), cfg.metadata.extension.clone());
        Self::new(Arc::new(tracker), Arc::new(Hasher::new()), metadata)
    }

    pub fn tracker(&self) -> &dyn StateTracker {
        self.tracker.as_ref()
    }

    pub fn hasher(&self) -> &dyn ContentHasher {
        self.hasher.as_ref()
    }

    pub fn metadata(&self) -> &SidecarMetadata {
        &self.metadata
    }

    pub fn decide(&self, target: &BuildTarget) -> Decision {
        let artifact = target.artifact_path();
        if !target.trigger_mode {
            trace!(artifact = %artifact.display(), "trigger mode off; rebuilding");
            return Decision::rebuild(DecisionReason::StaleNeedsRebuild, self.current_reported(), None);
        }

        let Some(last) = self.last_revision(artifact) else {
            debug!(artifact = %artifact.display(), "no prior build recorded");
            return Decision::rebuild(DecisionReason::NoPriorBuild, self.current_reported(), None);
        };

        let changed = match self.tracker.has_changed_since_path(&target.trigger_path, Some(&last)) {
            Ok(changed) => changed,
            Err(e) => {
                warn!(
                    trigger = %target.trigger_path.display(),
                    since = %last,
                    error = %e,
                    "change query failed; rebuilding"
                );
                true
            }
        };
        if changed {
            debug!(trigger = %target.trigger_path.display(), since = %last, "trigger path changed");
            return Decision::rebuild(DecisionReason::StaleNeedsRebuild, self.current_reported(), Some(last));
        }

        match self.hasher.read_file(artifact) {
            Ok(bytes) => {
                debug!(artifact = %artifact.display(), revision = %last, "artifact up to date");
                Decision::up_to_date(last, self.hasher.combined_hash(&bytes))
            }
            Err(e) => {
                debug!(artifact = %artifact.display(), error = %e, "artifact missing despite no changes");
                Decision::rebuild(DecisionReason::StaleNeedsRebuild, self.current_reported(), Some(last))
            }
        }
    }

    /// Record a successful rebuild of `target` that produced `artifact`.
    ///
    /// Reports the revision that triggered the build and moves the sidecar
    /// baseline to the current revision. Never fails: reporting degrades to
    /// `unknown` and a failed sidecar write is only logged.
    pub fn record_build(&self, target: &BuildTarget, artifact: &[u8]) -> BuildRecord {
        let fingerprint = self.hasher.combined_hash(artifact);
        let path = target.artifact_path();

        if !target.trigger_mode {
            return BuildRecord {
                reported_revision: self.current_reported(),
                fingerprint,
                saved_baseline: None,
            };
        }

        let last = self.last_revision(path);
        let triggering = match self.tracker.triggering_revision(&target.trigger_path, last.as_ref()) {
            Ok(rev) => rev,
            Err(e) => {
                warn!(trigger = %target.trigger_path.display(), error = %e, "triggering revision unavailable");
                return BuildRecord {
                    reported_revision: ReportedRevision::Unknown,
                    fingerprint,
                    saved_baseline: None,
                };
            }
        };
        trace!(trigger = %target.trigger_path.display(), revision = %triggering, "triggering revision");

        let saved_baseline = match self.tracker.current_revision() {
            Ok(head) => self.save_baseline(path, head),
            Err(e) => {
                warn!(error = %e, "current revision unavailable; baseline not saved");
                None
            }
        };

        BuildRecord {
            reported_revision: ReportedRevision::Known(triggering),
            fingerprint,
            saved_baseline,
        }
    }

    fn save_baseline(&self, artifact: &Path, head: RevisionId) -> Option<RevisionId> {
        match self.metadata.save_last_compilation_revision(artifact, &head) {
            Ok(()) => Some(head),
            Err(e) => {
                warn!(artifact = %artifact.display(), error = %e, "failed to save build baseline");
                None
            }
        }
    }

    /// Sidecar revision; an unreadable sidecar counts as no prior build.
    fn last_revision(&self, artifact: &Path) -> Option<RevisionId> {
        match self.metadata.last_compilation_revision(artifact) {
            Ok(rev) => rev,
            Err(e) => {
                warn!(artifact = %artifact.display(), error = %e, "ignoring unreadable sidecar");
                None
            }
        }
    }

    fn current_reported(&self) -> ReportedRevision {
        self.tracker.current_revision().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitcache_core::MemoryFileSystem;
    use gitcache_hash::fingerprint;
    use gitcache_vcs::InMemoryTracker;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        tracker: Arc<InMemoryTracker>,
        engine: BuildDecisionEngine,
    }

    impl Fixture {
        fn new() -> Self {
            let tracker = Arc::new(InMemoryTracker::new());
            tracker.commit(&["src/main.go"]);
            let engine = BuildDecisionEngine::new(tracker.clone(), Arc::new(Hasher::new()), SidecarMetadata::default());
            Self {
                dir: tempdir().unwrap(),
                tracker,
                engine,
            }
        }

        fn target(&self) -> BuildTarget {
            BuildTarget::new(self.dir.path().join("app"), "src")
        }

        fn build(&self, bytes: &[u8]) -> BuildRecord {
            let target = self.target();
            std::fs::write(&target.artifact_path, bytes).unwrap();
            self.engine.record_build(&target, bytes)
        }
    }

    #[test]
    fn first_build_has_no_prior() {
        let fx = Fixture::new();
        let d = fx.engine.decide(&fx.target());
        assert!(d.should_rebuild);
        assert_eq!(d.reason, DecisionReason::NoPriorBuild);
        assert_eq!(d.reported_revision.known(), Some(&fx.tracker.current_revision().unwrap()));
    }

    #[test]
    fn unchanged_trigger_reuses_artifact() {
        let fx = Fixture::new();
        let record = fx.build(b"binary");
        let stored = record.saved_baseline.unwrap();

        fx.tracker.commit(&["docs/readme.md"]);
        let d = fx.engine.decide(&fx.target());
        assert!(!d.should_rebuild);
        assert_eq!(d.reason, DecisionReason::UpToDate);
        assert_eq!(d.reported_revision, ReportedRevision::Known(stored));
        assert_eq!(d.fingerprint, Some(fingerprint(b"binary")));
    }

    #[test]
    fn changed_trigger_rebuilds_and_moves_baseline() {
        let fx = Fixture::new();
        fx.build(b"v1");
        let first_change = fx.tracker.commit(&["src/a.go"]);
        fx.tracker.commit(&["src/b.go"]);
        let head = fx.tracker.current_revision().unwrap();

        let d = fx.engine.decide(&fx.target());
        assert!(d.should_rebuild);
        assert_eq!(d.reason, DecisionReason::StaleNeedsRebuild);

        let record = fx.build(b"v2");
        assert_eq!(record.reported_revision, ReportedRevision::Known(first_change));
        assert_eq!(record.saved_baseline, Some(head.clone()));
        let sidecar = fx.engine.metadata().last_compilation_revision(&fx.target().artifact_path).unwrap();
        assert_eq!(sidecar, Some(head));
    }

    #[test]
    fn missing_artifact_is_stale() {
        let fx = Fixture::new();
        fx.build(b"v1");
        std::fs::remove_file(fx.target().artifact_path).unwrap();
        let d = fx.engine.decide(&fx.target());
        assert!(d.should_rebuild);
        assert_eq!(d.reason, DecisionReason::StaleNeedsRebuild);
    }

    #[test]
    fn failed_change_query_rebuilds() {
        let fx = Fixture::new();
        let target = fx.target();
        std::fs::write(&target.artifact_path, b"v1").unwrap();
        let unknown = RevisionId::parse("e".repeat(40)).unwrap();
        fx.engine.metadata().save_last_compilation_revision(&target.artifact_path, &unknown).unwrap();

        let d = fx.engine.decide(&target);
        assert!(d.should_rebuild);
        assert_eq!(d.reason, DecisionReason::StaleNeedsRebuild);
        assert_eq!(d.last_revision, Some(unknown));
    }

    #[test]
    fn unreadable_sidecar_counts_as_no_prior_build() {
        let tracker = Arc::new(InMemoryTracker::new());
        let head = tracker.commit(&["src/main.go"]);
        let fs = MemoryFileSystem::new();
        fs.deny("out/app.meta");
        let engine = BuildDecisionEngine::new(
            tracker,
            Arc::new(Hasher::new()),
            SidecarMetadata::new(Arc::new(fs), "meta"),
        );
        let target = BuildTarget::new("out/app", "src");

        assert_eq!(engine.decide(&target).reason, DecisionReason::NoPriorBuild);

        // The save fails too; the build still reports a revision.
        let record = engine.record_build(&target, b"bin");
        assert_eq!(record.reported_revision, ReportedRevision::Known(head));
        assert_eq!(record.saved_baseline, None);
    }

    #[test]
    fn trigger_mode_off_always_rebuilds_and_saves_nothing() {
        let fx = Fixture::new();
        let target = BuildTarget::untriggered(fx.dir.path().join("app"));
        let d = fx.engine.decide(&target);
        assert!(d.should_rebuild);
        assert_eq!(d.reason, DecisionReason::StaleNeedsRebuild);

        let record = fx.engine.record_build(&target, b"bin");
        assert_eq!(record.reported_revision.known(), Some(&fx.tracker.current_revision().unwrap()));
        assert_eq!(record.saved_baseline, None);
        assert!(!fx.dir.path().join("app.meta").exists());
    }

    #[test]
    fn broken_repository_reports_unknown() {
        let fx = Fixture::new();
        fx.tracker.set_failing(true);

        let d = fx.engine.decide(&fx.target());
        assert!(d.should_rebuild);
        assert_eq!(d.reported_revision, ReportedRevision::Unknown);

        let record = fx.build(b"bin");
        assert_eq!(record.reported_revision, ReportedRevision::Unknown);
        assert_eq!(record.saved_baseline, None);
        assert_eq!(record.fingerprint, fingerprint(b"bin"));

        let untriggered = fx.engine.record_build(&BuildTarget::untriggered("x"), b"bin");
        assert_eq!(untriggered.reported_revision.as_str(), "unknown");
    }
}
