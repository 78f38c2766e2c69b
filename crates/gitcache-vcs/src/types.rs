use std::path::{Path, PathBuf};

use gitcache_core::{Result, RevisionId};

/// Read-only view of a version-controlled working tree.
///
/// Paths are interpreted relative to the tracker's working directory.
/// Implementations must never mutate the repository.
pub trait StateTracker: Send + Sync {
    /// The checked-out revision of the whole tree.
    fn current_revision(&self) -> Result<RevisionId>;

    /// Most recent revision that touched `path`.
    fn revision_for_path(&self, path: &Path) -> Result<RevisionId>;

    /// Whether the tree has uncommitted modifications. Fails open to `false`.
    fn is_dirty(&self) -> bool;

    /// Whether `path` has uncommitted modifications. Fails open to `false`,
    /// including for paths outside any working tree.
    fn is_dirty_for_path(&self, path: &Path) -> bool;

    /// Paths with uncommitted modifications under `path`, relative to the
    /// repository top level, in status order.
    fn modified_paths(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Whether a committed change in `(since, HEAD]` touches `path`.
    /// No baseline means "assume changed".
    fn has_changed_since_path(&self, path: &Path, since: Option<&RevisionId>) -> Result<bool>;

    /// The revision a rebuild is attributed to: the oldest revision in
    /// `(since, HEAD]` touching `path`, `since` itself when nothing did, or
    /// `revision_for_path` when there is no baseline.
    fn triggering_revision(&self, path: &Path, since: Option<&RevisionId>) -> Result<RevisionId>;

    /// `current_revision` when clean, otherwise a content-derived fallback.
    fn stable_revision_with_fallback(&self) -> Result<RevisionId>;

    /// `revision_for_path` when `path` is clean, otherwise a fallback
    /// derived from the modified content under `path`.
    fn stable_revision_with_fallback_for_path(&self, path: &Path) -> Result<RevisionId>;
}
