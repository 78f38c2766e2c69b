use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitcache_core::{Error, FileSystem, RealFileSystem, Result, RevisionId};
use tracing::trace;

pub const DEFAULT_SIDECAR_EXTENSION: &str = "meta";

/// Sidecar file holding the revision of an artifact's last successful build.
///
/// The file lives at `<artifact>.<extension>` and contains exactly the
/// 40-character revision, nothing else.
#[derive(Clone, Debug)]
pub struct SidecarMetadata {
    fs: Arc<dyn FileSystem>,
    extension: String,
}

impl Default for SidecarMetadata {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem), DEFAULT_SIDECAR_EXTENSION)
    }
}

impl SidecarMetadata {
    pub fn new(fs: Arc<dyn FileSystem>, extension: impl Into<String>) -> Self {
        Self {
            fs,
            extension: extension.into(),
        }
    }

    pub fn sidecar_path(&self, artifact: &Path) -> PathBuf {
        let mut os = artifact.as_os_str().to_owned();
        os.push(".");
        os.push(&self.extension);
        PathBuf::from(os)
    }

    /// Revision recorded for `artifact`, or `None` when no sidecar exists.
    ///
    /// A sidecar that exists but is unreadable or does not hold a valid
    /// revision is a `MetadataIo` error.
    pub fn last_compilation_revision(&self, artifact: &Path) -> Result<Option<RevisionId>> {
        let path = self.sidecar_path(artifact);
        let content = match self.fs.read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(sidecar = %path.display(), "no sidecar metadata");
                return Ok(None);
            }
            Err(e) => return Err(Error::MetadataIo { path, source: e }),
        };

        RevisionId::parse(&content).map(Some).map_err(|_| Error::MetadataIo {
            path,
            source: io::Error::new(io::ErrorKind::InvalidData, format!("not a revision id: {:?}", content.trim())),
        })
    }

    pub fn save_last_compilation_revision(&self, artifact: &Path, revision: &RevisionId) -> Result<()> {
        let path = self.sidecar_path(artifact);
        self.fs
            .write(&path, revision.as_str().as_bytes())
            .map_err(|e| Error::MetadataIo { path: path.clone(), source: e })?;
        trace!(sidecar = %path.display(), revision = %revision, "saved sidecar metadata");
        Ok(())
    }
}
