use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use gitcache_core::{BuildTarget, ContentFingerprint, DecisionReason, Error, ReportedRevision, Result};
use serde::Serialize;
use tracing::{debug, trace};

use crate::BuildDecisionEngine;

/// Source, destination and target platform for one compilation.
///
/// Setters strip stray `"` characters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileRequest {
    source: String,
    destination: String,
    os: String,
    arch: String,
}

impl CompileRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, path: impl AsRef<str>) -> Self {
        self.source = unquote(path.as_ref());
        self
    }

    pub fn destination(mut self, path: impl AsRef<str>) -> Self {
        self.destination = unquote(path.as_ref());
        self
    }

    pub fn os(mut self, os: impl AsRef<str>) -> Self {
        self.os = unquote(os.as_ref());
        self
    }

    pub fn arch(mut self, arch: impl AsRef<str>) -> Self {
        self.arch = unquote(arch.as_ref());
        self
    }

    pub fn source_path(&self) -> &Path {
        Path::new(&self.source)
    }

    pub fn destination_path(&self) -> &Path {
        Path::new(&self.destination)
    }

    pub fn target_os(&self) -> &str {
        &self.os
    }

    pub fn target_arch(&self) -> &str {
        &self.arch
    }

    /// Checks fields in order, then that the source is an existing file.
    pub fn verify(&self) -> Result<()> {
        let missing = [
            (&self.source, "source"),
            (&self.destination, "destination"),
            (&self.os, "target os"),
            (&self.arch, "target arch"),
        ];
        if let Some((_, name)) = missing.iter().find(|(value, _)| value.is_empty()) {
            return Err(Error::InvalidConfig(format!("{name} not set")));
        }
        if !self.source_path().is_file() {
            return Err(Error::InvalidConfig(format!("source file does not exist: {}", self.source)));
        }
        Ok(())
    }
}

fn unquote(s: &str) -> String {
    s.replace('"', "")
}

/// Turns a verified request into a binary on disk.
pub trait Compiler: Send + Sync {
    fn compile(&self, request: &CompileRequest) -> Result<PathBuf>;
}

/// Writes an archive containing `files` (source path -> path inside the archive).
pub trait Packager: Send + Sync {
    fn package(&self, archive: &Path, files: &BTreeMap<PathBuf, String>) -> Result<PathBuf>;
}

#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    /// Watched subtree; `None` turns trigger mode off and always rebuilds.
    pub trigger_path: Option<PathBuf>,
    pub package: bool,
    /// Extra archive entries. The binary is always added at the archive root.
    pub resources: BTreeMap<PathBuf, String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BuildOutput {
    pub artifact_path: PathBuf,
    pub fingerprint: ContentFingerprint,
    pub revision: ReportedRevision,
    pub rebuilt: bool,
    pub reason: DecisionReason,
}

pub struct BuildPipeline {
    engine: BuildDecisionEngine,
    compiler: Box<dyn Compiler>,
    packager: Option<Box<dyn Packager>>,
}

impl BuildPipeline {
    pub fn new(engine: BuildDecisionEngine, compiler: Box<dyn Compiler>) -> Self {
        Self {
            engine,
            compiler,
            packager: None,
        }
    }

    pub fn with_packager(mut self, packager: Box<dyn Packager>) -> Self {
        self.packager = Some(packager);
        self
    }

    pub fn engine(&self) -> &BuildDecisionEngine {
        &self.engine
    }

    /// Reuse the artifact when nothing relevant changed, otherwise compile,
    /// optionally package, fingerprint and record the build.
    pub fn run(&self, request: &CompileRequest, opts: &BuildOptions) -> Result<BuildOutput> {
        request.verify()?;

        let expected = if opts.package {
            zip_path(request.destination_path())
        } else {
            request.destination_path().to_path_buf()
        };
        let target = match &opts.trigger_path {
            Some(trigger) => BuildTarget::new(&expected, trigger),
            None => BuildTarget::untriggered(&expected),
        };

        let decision = self.engine.decide(&target);
        if let (false, Some(fingerprint)) = (decision.should_rebuild, decision.fingerprint) {
            return Ok(BuildOutput {
                artifact_path: expected,
                fingerprint,
                revision: decision.reported_revision,
                rebuilt: false,
                reason: decision.reason,
            });
        }

        trace!(source = %request.source_path().display(), os = request.target_os(), arch = request.target_arch(), "compiling");
        let binary = self.compiler.compile(request)?;

        let artifact = if opts.package {
            self.package(&binary, &opts.resources)?
        } else {
            binary
        };

        let bytes = self.engine.hasher().read_file(&artifact)?;
        let record = self.engine.record_build(&BuildTarget { artifact_path: artifact.clone(), ..target }, &bytes);
        debug!(artifact = %artifact.display(), revision = %record.reported_revision, "build recorded");

        Ok(BuildOutput {
            artifact_path: artifact,
            fingerprint: record.fingerprint,
            revision: record.reported_revision,
            rebuilt: true,
            reason: decision.reason,
        })
    }

    fn package(&self, binary: &Path, resources: &BTreeMap<PathBuf, String>) -> Result<PathBuf> {
        let Some(packager) = &self.packager else {
            return Err(Error::Build {
                stage: "package".to_string(),
                message: "packaging requested but no packager configured".to_string(),
            });
        };
        let name = binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Build {
                stage: "package".to_string(),
                message: format!("binary path has no file name: {}", binary.display()),
            })?;

        let mut files = resources.clone();
        files.insert(binary.to_path_buf(), name);
        let archive = zip_path(binary);
        trace!(archive = %archive.display(), entries = files.len(), "packaging");
        packager.package(&archive, &files)
    }
}

fn zip_path(path: &Path) -> PathBuf {
    let mut os = OsString::from(path.as_os_str());
    os.push(".zip");
    PathBuf::from(os)
}
