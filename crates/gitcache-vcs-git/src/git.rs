use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use gitcache_core::{Error, Result, RevisionId};
use gitcache_vcs::{fallback_revision, parse_porcelain_z, DirtyScope, ModifiedFile, StateTracker};
use tracing::{debug, trace};

/// `StateTracker` backed by the `git` command line.
///
/// Every query runs in `repo`; pathspecs are relative to it.
#[derive(Clone, Debug)]
pub struct GitStateTracker {
    repo: PathBuf,
    program: String,
}

impl GitStateTracker {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            program: "git".to_string(),
        }
    }

    /// Use a different git executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&self.repo);
        cmd
    }

    fn output(&self, mut cmd: Command) -> Result<Output> {
        let label = describe(&cmd);
        trace!(command = %label, "running git");
        cmd.output().map_err(|e| Error::vcs(label, e.to_string()))
    }

    /// Run to completion and return trimmed stdout; any failure is a query error.
    fn run(&self, cmd: Command) -> Result<String> {
        let label = describe(&cmd);
        let out = self.output(cmd)?;
        if !out.status.success() {
            return Err(Error::vcs(label, String::from_utf8_lossy(&out.stderr).trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    fn parse_revision(label: &str, raw: &str) -> Result<RevisionId> {
        RevisionId::parse(raw).map_err(|_| Error::vcs(label, format!("unexpected revision format {raw:?}")))
    }

    /// `git log -1` for the tree or a path. Empty output means no revision.
    fn last_revision(&self, path: Option<&Path>) -> Result<RevisionId> {
        let mut cmd = self.git();
        cmd.args(["--no-pager", "log", "-1", "--pretty=format:%H"]);
        if let Some(path) = path {
            cmd.arg("--").arg(path);
        }
        let label = describe(&cmd);
        let out = self.run(cmd)?;
        if out.is_empty() {
            let scope = path.map_or_else(|| "HEAD".to_string(), |p| p.display().to_string());
            return Err(Error::NoRevision { scope });
        }
        Self::parse_revision(&label, &out)
    }

    fn status_is_dirty(&self, path: Option<&Path>) -> bool {
        let mut cmd = self.git();
        cmd.args(["status", "--porcelain"]);
        if let Some(path) = path {
            cmd.arg("--").arg(path);
        }
        match self.run(cmd) {
            Ok(out) => !out.is_empty(),
            Err(e) => {
                debug!(error = %e, "status query failed; treating as clean");
                false
            }
        }
    }

    fn toplevel(&self) -> Result<PathBuf> {
        let mut cmd = self.git();
        cmd.args(["rev-parse", "--show-toplevel"]);
        Ok(PathBuf::from(self.run(cmd)?))
    }

    /// Content of every modified file under `path` that can still be read.
    fn read_modified(&self, path: &Path) -> Result<Vec<ModifiedFile>> {
        let top = self.toplevel()?;
        let mut files = Vec::new();
        for rel in self.modified_paths(path)? {
            match std::fs::read(top.join(&rel)) {
                Ok(content) => files.push(ModifiedFile {
                    path: rel.to_string_lossy().replace('\\', "/"),
                    content,
                }),
                Err(e) => trace!(path = %rel.display(), error = %e, "skipping unreadable modified path"),
            }
        }
        Ok(files)
    }
}

impl StateTracker for GitStateTracker {
    fn current_revision(&self) -> Result<RevisionId> {
        self.last_revision(None)
    }

    fn revision_for_path(&self, path: &Path) -> Result<RevisionId> {
        self.last_revision(Some(path))
    }

    fn is_dirty(&self) -> bool {
        self.status_is_dirty(None)
    }

    fn is_dirty_for_path(&self, path: &Path) -> bool {
        self.status_is_dirty(Some(path))
    }

    fn modified_paths(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut cmd = self.git();
        cmd.args(["status", "--porcelain", "-z", "--untracked-files=all", "--"]).arg(path);
        let label = describe(&cmd);
        let out = self.output(cmd)?;
        if !out.status.success() {
            return Err(Error::vcs(label, String::from_utf8_lossy(&out.stderr).trim().to_string()));
        }
        Ok(parse_porcelain_z(&out.stdout)?.into_iter().map(|e| e.path).collect())
    }

    fn has_changed_since_path(&self, path: &Path, since: Option<&RevisionId>) -> Result<bool> {
        let Some(since) = since else {
            return Ok(true);
        };
        let mut cmd = self.git();
        cmd.args(["diff", "--quiet", since.as_str(), "HEAD", "--"]).arg(path);
        let label = describe(&cmd);
        let out = self.output(cmd)?;
        // --quiet exits 1 when differences exist; anything else non-zero is a real failure.
        match out.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(Error::vcs(label, String::from_utf8_lossy(&out.stderr).trim().to_string())),
        }
    }

    fn triggering_revision(&self, path: &Path, since: Option<&RevisionId>) -> Result<RevisionId> {
        let Some(since) = since else {
            return self.revision_for_path(path);
        };
        let mut cmd = self.git();
        cmd.args(["--no-pager", "log", "--pretty=format:%H", &format!("{since}..HEAD"), "--"])
            .arg(path);
        let label = describe(&cmd);
        let out = self.run(cmd)?;
        // Newest first; the last line is the first change after the baseline.
        match out.lines().map(str::trim).filter(|l| !l.is_empty()).last() {
            Some(oldest) => Self::parse_revision(&label, oldest),
            None => Ok(since.clone()),
        }
    }

    fn stable_revision_with_fallback(&self) -> Result<RevisionId> {
        let dirty = self.is_dirty();
        let head = self.current_revision()?;
        if !dirty {
            return Ok(head);
        }
        let files = self.read_modified(Path::new("."))?;
        debug!(head = %head, files = files.len(), "dirty tree; using fallback revision");
        fallback_revision(&head, &files, DirtyScope::Tree)
    }

    fn stable_revision_with_fallback_for_path(&self, path: &Path) -> Result<RevisionId> {
        let dirty = self.is_dirty_for_path(path);
        let head = self.revision_for_path(path)?;
        if !dirty {
            return Ok(head);
        }
        let files = self.read_modified(path)?;
        let scope = path.to_string_lossy();
        debug!(head = %head, path = %scope, files = files.len(), "dirty path; using fallback revision");
        fallback_revision(&head, &files, DirtyScope::Path(&scope))
    }
}

fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}
