use std::io;
use std::path::{Component, Path, PathBuf};

use gitcache_core::{ContentFingerprint, Error, Result};
use sha2::{Digest, Sha512};
use tracing::debug;
use walkdir::WalkDir;

use crate::digest::fingerprint;

#[derive(Debug)]
enum EntryKind {
    File,
    Symlink,
}

#[derive(Debug)]
struct TreeEntry {
    rel: String,
    path: PathBuf,
    kind: EntryKind,
}

/// Fingerprint a whole directory tree, independent of walk order.
///
/// Entries are sorted by their `/`-joined path relative to `root`. Each file
/// contributes `SHA512(rel + content)`, each symlink `SHA512(rel + "->" + target)`;
/// directories contribute nothing of their own. The entry digests are
/// concatenated in order and the buffer is fingerprinted.
///
/// Any entry that disappears or cannot be read fails the whole call.
pub fn hash_directory(root: &Path) -> Result<ContentFingerprint> {
    hash_entries(root, collect_entries(root)?)
}

fn hash_entries(root: &Path, mut entries: Vec<TreeEntry>) -> Result<ContentFingerprint> {
    entries.sort_by(|a, b| a.rel.cmp(&b.rel));

    let mut buffer = Vec::with_capacity(entries.len() * 64);
    for entry in &entries {
        let mut hasher = Sha512::new();
        hasher.update(entry.rel.as_bytes());
        match entry.kind {
            EntryKind::File => {
                let content = std::fs::read(&entry.path).map_err(|e| hash_error(&entry.path, e))?;
                hasher.update(&content);
            }
            EntryKind::Symlink => {
                let target = std::fs::read_link(&entry.path).map_err(|e| hash_error(&entry.path, e))?;
                hasher.update(b"->");
                hasher.update(target.to_string_lossy().as_bytes());
            }
        }
        buffer.extend_from_slice(&hasher.finalize());
    }

    debug!(root = %root.display(), entries = entries.len(), "hashed directory");
    Ok(fingerprint(&buffer))
}

fn collect_entries(root: &Path) -> Result<Vec<TreeEntry>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            let source = e
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
            hash_error(&path, source)
        })?;

        let file_type = entry.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            continue;
        };

        let rel = relative_key(root, entry.path())?;
        out.push(TreeEntry {
            rel,
            path: entry.into_path(),
            kind,
        });
    }
    Ok(out)
}

/// Relative path with `/` separators so the key is platform independent.
fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        hash_error(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "entry outside of hashed root"),
        )
    })?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

fn hash_error(path: &Path, source: io::Error) -> Error {
    Error::HashComputation {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn populate(root: &Path, files: &[(&str, &str)]) {
        for (rel, content) in files {
            let p = root.join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, content).unwrap();
        }
    }

    const FILES: &[(&str, &str)] = &[
        ("file1.txt", "content of file 1"),
        ("file2.txt", "content of file 2"),
        ("subdir/file3.txt", "content of file 3"),
        ("subdir/file4.txt", "content of file 4"),
    ];

    #[test]
    fn creation_order_does_not_matter() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        populate(a.path(), FILES);
        let reversed: Vec<_> = FILES.iter().rev().cloned().collect();
        populate(b.path(), &reversed);

        assert_eq!(hash_directory(a.path()).unwrap(), hash_directory(b.path()).unwrap());
    }

    #[test]
    fn one_byte_change_changes_fingerprint() {
        let dir = tempdir().unwrap();
        populate(dir.path(), FILES);
        let before = hash_directory(dir.path()).unwrap();
        fs::write(dir.path().join("subdir/file4.txt"), "content of file 5").unwrap();
        let after = hash_directory(dir.path()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn renaming_a_file_changes_fingerprint() {
        let dir = tempdir().unwrap();
        populate(dir.path(), FILES);
        let before = hash_directory(dir.path()).unwrap();
        fs::rename(dir.path().join("file1.txt"), dir.path().join("file0.txt")).unwrap();
        assert_ne!(before, hash_directory(dir.path()).unwrap());
    }

    #[test]
    fn empty_directories_do_not_contribute() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        populate(a.path(), FILES);
        populate(b.path(), FILES);
        fs::create_dir_all(b.path().join("empty/nested")).unwrap();
        assert_eq!(hash_directory(a.path()).unwrap(), hash_directory(b.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_hash_their_target_not_content() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        populate(a.path(), FILES);
        populate(b.path(), FILES);
        std::os::unix::fs::symlink("file1.txt", a.path().join("link")).unwrap();
        std::os::unix::fs::symlink("file1.txt", b.path().join("link")).unwrap();
        assert_eq!(hash_directory(a.path()).unwrap(), hash_directory(b.path()).unwrap());

        fs::remove_file(b.path().join("link")).unwrap();
        std::os::unix::fs::symlink("file2.txt", b.path().join("link")).unwrap();
        assert_ne!(hash_directory(a.path()).unwrap(), hash_directory(b.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_hashed_by_target() {
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink("missing", dir.path().join("dangling")).unwrap();
        assert!(hash_directory(dir.path()).is_ok());
    }

    #[test]
    fn missing_root_is_a_hash_error() {
        let dir = tempdir().unwrap();
        let err = hash_directory(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::HashComputation { .. }));
    }

    #[test]
    fn file_vanishing_mid_walk_fails() {
        let dir = tempdir().unwrap();
        populate(dir.path(), FILES);
        let entries = collect_entries(dir.path()).unwrap();
        fs::remove_file(dir.path().join("subdir/file3.txt")).unwrap();

        match hash_entries(dir.path(), entries) {
            Err(Error::HashComputation { path, .. }) => assert!(path.ends_with("subdir/file3.txt")),
            other => panic!("expected a hash error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlink_vanishing_mid_walk_fails() {
        let dir = tempdir().unwrap();
        populate(dir.path(), FILES);
        std::os::unix::fs::symlink("file1.txt", dir.path().join("link")).unwrap();
        let entries = collect_entries(dir.path()).unwrap();
        fs::remove_file(dir.path().join("link")).unwrap();

        let err = hash_entries(dir.path(), entries).unwrap_err();
        assert!(matches!(err, Error::HashComputation { .. }));
    }

    #[test]
    fn relative_key_uses_forward_slashes() {
        let root = Path::new("/r");
        assert_eq!(relative_key(root, &root.join("a").join("b.txt")).unwrap(), "a/b.txt");
    }
}
