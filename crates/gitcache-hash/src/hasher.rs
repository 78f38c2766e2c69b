use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use gitcache_core::{ContentFingerprint, Error, FileSystem, RealFileSystem, Result};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::digest;

/// Hashing capability handed to the decision engine.
///
/// Only `read_file` and `hash_directory` touch the filesystem; the digest
/// methods are pure and have default implementations.
pub trait ContentHasher: Send + Sync {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    fn hash_directory(&self, root: &Path) -> Result<ContentFingerprint>;

    fn md5(&self, bytes: &[u8]) -> String {
        digest::md5_hex(bytes)
    }

    fn sha1(&self, bytes: &[u8]) -> String {
        digest::sha1_hex(bytes)
    }

    fn sha256(&self, bytes: &[u8]) -> String {
        digest::sha256_hex(bytes)
    }

    fn sha512(&self, bytes: &[u8]) -> String {
        digest::sha512_hex(bytes)
    }

    fn sha256_base64(&self, bytes: &[u8]) -> String {
        digest::sha256_base64(bytes)
    }

    fn sha512_base64(&self, bytes: &[u8]) -> String {
        digest::sha512_base64(bytes)
    }

    fn combined_hash(&self, bytes: &[u8]) -> ContentFingerprint {
        ContentFingerprint {
            md5: self.md5(bytes),
            sha1: self.sha1(bytes),
            sha256: self.sha256(bytes),
            sha512: self.sha512(bytes),
            sha256_base64: self.sha256_base64(bytes),
            sha512_base64: self.sha512_base64(bytes),
        }
    }
}

/// `ContentHasher` reading artifacts through a `FileSystem`.
///
/// A `.zip` artifact is read as the concatenation of `__<name>__<content>`
/// for each entry in archive order, so its fingerprint follows the packaged
/// files rather than archive timestamps or compression.
#[derive(Clone, Debug)]
pub struct Hasher {
    fs: Arc<dyn FileSystem>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::with_fs(Arc::new(RealFileSystem))
    }
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fs(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl ContentHasher for Hasher {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let bytes = self.fs.read(path).map_err(|e| Error::io(path, e))?;
        if path.extension().is_some_and(|ext| ext == "zip") {
            return read_zip_entries(path, bytes);
        }
        Ok(bytes)
    }

    fn hash_directory(&self, root: &Path) -> Result<ContentFingerprint> {
        crate::dir::hash_directory(root)
    }
}

fn read_zip_entries(path: &Path, bytes: Vec<u8>) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| zip_error(path, e))?;
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| zip_error(path, e))?;
        let header = format!("__{}__", entry.name());
        out.extend_from_slice(header.as_bytes());
        entry.read_to_end(&mut out).map_err(|e| Error::io(path, e))?;
    }
    Ok(out)
}

fn zip_error(path: &Path, e: ZipError) -> Error {
    Error::io(path, io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn combined_hash_matches_free_function() {
        let h = Hasher::new();
        assert_eq!(h.combined_hash(b"abc"), digest::fingerprint(b"abc"));
    }

    #[test]
    fn read_file_returns_raw_bytes() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("bin");
        std::fs::write(&p, [0u8, 159, 146, 150]).unwrap();
        assert_eq!(Hasher::new().read_file(&p).unwrap(), vec![0u8, 159, 146, 150]);
    }

    #[test]
    fn read_file_missing_is_io_error() {
        let dir = tempdir().unwrap();
        let err = Hasher::new().read_file(&dir.path().join("does_not_exist.txt")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    fn zip_bytes(method: zip::CompressionMethod, entries: &[(&str, &[u8])]) -> Vec<u8> {
        use std::io::Write;
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default().compression_method(method);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn read_file_goes_through_filesystem() {
        let fs = gitcache_core::MemoryFileSystem::new();
        fs.add_file("out/app", "bin");
        let h = Hasher::with_fs(Arc::new(fs.clone()));
        assert_eq!(h.read_file(Path::new("out/app")).unwrap(), b"bin");

        fs.deny("out/app");
        assert!(matches!(h.read_file(Path::new("out/app")), Err(Error::Io { .. })));
    }

    #[test]
    fn zip_is_read_as_named_entries() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("app.zip");
        let entries: [(&str, &[u8]); 2] = [("app", b"bin"), ("conf/x.json", b"{}")];
        std::fs::write(&p, zip_bytes(zip::CompressionMethod::Deflated, &entries)).unwrap();
        assert_eq!(Hasher::new().read_file(&p).unwrap(), b"__app__bin__conf/x.json__{}".to_vec());
    }

    #[test]
    fn zip_fingerprint_ignores_compression() {
        let dir = tempdir().unwrap();
        let entries: [(&str, &[u8]); 1] = [("app", b"same binary")];
        let stored = dir.path().join("a.zip");
        let deflated = dir.path().join("b.zip");
        std::fs::write(&stored, zip_bytes(zip::CompressionMethod::Stored, &entries)).unwrap();
        std::fs::write(&deflated, zip_bytes(zip::CompressionMethod::Deflated, &entries)).unwrap();
        assert_ne!(std::fs::read(&stored).unwrap(), std::fs::read(&deflated).unwrap());

        let h = Hasher::new();
        assert_eq!(
            h.combined_hash(&h.read_file(&stored).unwrap()),
            h.combined_hash(&h.read_file(&deflated).unwrap())
        );
    }

    #[test]
    fn corrupt_zip_is_io_error() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("broken.zip");
        std::fs::write(&p, b"not a zip").unwrap();
        assert!(matches!(Hasher::new().read_file(&p), Err(Error::Io { .. })));
    }
}
