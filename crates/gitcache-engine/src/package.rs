use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

use gitcache_core::{Error, Result};
use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::Packager;

/// Packager writing a deflated zip archive.
///
/// Each source is walked recursively; a file lands at `destination` and a
/// directory's files land at `destination/<relative path>`. Any archive
/// already at the target path is replaced.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipPackager;

impl Packager for ZipPackager {
    fn package(&self, archive: &Path, files: &BTreeMap<PathBuf, String>) -> Result<PathBuf> {
        match std::fs::remove_file(archive) {
            Ok(()) => debug!(archive = %archive.display(), "removed stale archive"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(archive, e)),
        }

        let out = File::create(archive).map_err(|e| Error::io(archive, e))?;
        let mut writer = ZipWriter::new(out);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (source, destination) in files {
            for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
                let entry = entry.map_err(|e| package_error(format!("walk {}: {e}", source.display())))?;
                if entry.file_type().is_dir() {
                    continue;
                }
                let rel = entry.path().strip_prefix(source).unwrap_or_else(|_| Path::new(""));
                let name = entry_name(destination, rel)
                    .ok_or_else(|| package_error(format!("empty archive name for {}", entry.path().display())))?;

                writer
                    .start_file(name.as_str(), options)
                    .map_err(|e| package_error(format!("start {name}: {e}")))?;
                let mut input = File::open(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
                io::copy(&mut input, &mut writer).map_err(|e| Error::io(entry.path(), e))?;
                trace!(entry = %name, "archived");
            }
        }

        writer
            .finish()
            .map_err(|e| package_error(format!("finish {}: {e}", archive.display())))?;
        Ok(archive.to_path_buf())
    }
}

/// `destination` joined with `rel`, `/`-separated, without `.` or empty parts.
fn entry_name(destination: &str, rel: &Path) -> Option<String> {
    let mut parts: Vec<String> = destination
        .split(['/', '\\'])
        .filter(|p| !p.is_empty() && *p != ".")
        .map(str::to_string)
        .collect();
    parts.extend(rel.components().filter_map(|c| match c {
        Component::Normal(p) => Some(p.to_string_lossy().into_owned()),
        _ => None,
    }));
    (!parts.is_empty()).then(|| parts.join("/"))
}

fn package_error(message: String) -> Error {
    Error::Build {
        stage: "package".to_string(),
        message,
    }
}
