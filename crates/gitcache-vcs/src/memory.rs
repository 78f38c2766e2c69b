use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use gitcache_core::{Error, Result, RevisionId};
use sha2::{Digest, Sha256};

use crate::fallback::{fallback_revision, DirtyScope, ModifiedFile};
use crate::types::StateTracker;

/// In-memory history for tests. Not a VCS, but it answers the tracker
/// contract the way a linear git history would.
#[derive(Default)]
pub struct InMemoryTracker {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Oldest first.
    commits: Vec<Commit>,
    /// Uncommitted modifications; `None` content means deleted.
    dirty: BTreeMap<PathBuf, Option<Vec<u8>>>,
    fail_queries: bool,
}

struct Commit {
    id: RevisionId,
    paths: Vec<PathBuf>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a commit touching `paths` and return its revision.
    pub fn commit<P: AsRef<Path>>(&self, paths: &[P]) -> RevisionId {
        let mut inner = self.lock();
        let seed = format!("commit-{}", inner.commits.len());
        let id = RevisionId::from_sha256(Sha256::digest(seed.as_bytes()).into());
        inner.commits.push(Commit {
            id: id.clone(),
            paths: paths.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        });
        id
    }

    /// Mark `path` modified in the working tree with `content`.
    pub fn modify(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.lock().dirty.insert(path.as_ref().to_path_buf(), Some(content.into()));
    }

    /// Mark `path` deleted in the working tree.
    pub fn delete(&self, path: impl AsRef<Path>) {
        self.lock().dirty.insert(path.as_ref().to_path_buf(), None);
    }

    /// Commit every pending modification.
    pub fn commit_dirty(&self) -> RevisionId {
        let paths: Vec<PathBuf> = std::mem::take(&mut self.lock().dirty).into_keys().collect();
        self.commit(&paths)
    }

    /// Make every fallible query fail, as a broken repository would.
    pub fn set_failing(&self, failing: bool) {
        self.lock().fail_queries = failing;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn touches(changed: &Path, scope: &Path) -> bool {
        scope == Path::new(".") || scope.as_os_str().is_empty() || changed.starts_with(scope)
    }
}

impl Inner {
    fn check(&self, command: &str) -> Result<()> {
        if self.fail_queries {
            return Err(Error::vcs(command, "simulated failure"));
        }
        Ok(())
    }

    fn head(&self) -> Result<RevisionId> {
        self.check("log")?;
        self.commits
            .last()
            .map(|c| c.id.clone())
            .ok_or_else(|| Error::NoRevision { scope: "HEAD".into() })
    }

    fn head_for_path(&self, path: &Path) -> Result<RevisionId> {
        self.check("log")?;
        self.commits
            .iter()
            .rev()
            .find(|c| c.paths.iter().any(|p| InMemoryTracker::touches(p, path)))
            .map(|c| c.id.clone())
            .ok_or_else(|| Error::NoRevision { scope: path.display().to_string() })
    }

    /// Commits strictly after `since`, oldest first.
    fn after(&self, since: &RevisionId) -> Result<&[Commit]> {
        self.check("log")?;
        let idx = self
            .commits
            .iter()
            .position(|c| &c.id == since)
            .ok_or_else(|| Error::vcs("log", format!("unknown revision {since}")))?;
        Ok(&self.commits[idx + 1..])
    }

    fn modified_files(&self, path: &Path) -> Vec<ModifiedFile> {
        self.dirty
            .iter()
            .filter(|(p, _)| InMemoryTracker::touches(p, path))
            .filter_map(|(p, content)| {
                content.as_ref().map(|c| ModifiedFile {
                    path: p.to_string_lossy().into_owned(),
                    content: c.clone(),
                })
            })
            .collect()
    }
}

impl StateTracker for InMemoryTracker {
    fn current_revision(&self) -> Result<RevisionId> {
        self.lock().head()
    }

    fn revision_for_path(&self, path: &Path) -> Result<RevisionId> {
        self.lock().head_for_path(path)
    }

    fn is_dirty(&self) -> bool {
        let inner = self.lock();
        !inner.fail_queries && !inner.dirty.is_empty()
    }

    fn is_dirty_for_path(&self, path: &Path) -> bool {
        let inner = self.lock();
        !inner.fail_queries && inner.dirty.keys().any(|p| Self::touches(p, path))
    }

    fn modified_paths(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let inner = self.lock();
        inner.check("status")?;
        Ok(inner.dirty.keys().filter(|p| Self::touches(p, path)).cloned().collect())
    }

    fn has_changed_since_path(&self, path: &Path, since: Option<&RevisionId>) -> Result<bool> {
        let Some(since) = since else {
            return Ok(true);
        };
        let inner = self.lock();
        let after = inner.after(since)?;
        Ok(after.iter().any(|c| c.paths.iter().any(|p| Self::touches(p, path))))
    }

    fn triggering_revision(&self, path: &Path, since: Option<&RevisionId>) -> Result<RevisionId> {
        let inner = self.lock();
        let Some(since) = since else {
            return inner.head_for_path(path);
        };
        let after = inner.after(since)?;
        Ok(after
            .iter()
            .find(|c| c.paths.iter().any(|p| Self::touches(p, path)))
            .map(|c| c.id.clone())
            .unwrap_or_else(|| since.clone()))
    }

    fn stable_revision_with_fallback(&self) -> Result<RevisionId> {
        let dirty = self.is_dirty();
        let inner = self.lock();
        let head = inner.head()?;
        if !dirty {
            return Ok(head);
        }
        fallback_revision(&head, &inner.modified_files(Path::new(".")), DirtyScope::Tree)
    }

    fn stable_revision_with_fallback_for_path(&self, path: &Path) -> Result<RevisionId> {
        let dirty = self.is_dirty_for_path(path);
        let inner = self.lock();
        let head = inner.head_for_path(path)?;
        if !dirty {
            return Ok(head);
        }
        let scope = path.to_string_lossy();
        fallback_revision(&head, &inner.modified_files(path), DirtyScope::Path(&scope))
    }
}
