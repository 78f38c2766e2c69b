use gitcache_core::{Result, RevisionId};
use sha2::{Digest, Sha256};

/// A modified file whose content could be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModifiedFile {
    /// Path as reported by the status query.
    pub path: String,
    pub content: Vec<u8>,
}

/// Hex SHA-256 over `path:content` of every file, in path order.
/// `None` when there is nothing to hash.
pub fn modified_content_digest(files: &[ModifiedFile]) -> Option<String> {
    if files.is_empty() {
        return None;
    }
    let mut sorted: Vec<&ModifiedFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = Sha256::new();
    for file in sorted {
        hasher.update(file.path.as_bytes());
        hasher.update(b":");
        hasher.update(&file.content);
    }
    Some(hex::encode(hasher.finalize()))
}

/// What a dirty tree hashes to when no modified content was readable.
#[derive(Clone, Copy, Debug)]
pub enum DirtyScope<'a> {
    Tree,
    Path(&'a str),
}

/// Synthetic revision for a dirty working tree, truncated to revision length.
///
/// With readable content: `SHA256(head + ":" + content_digest)`.
/// Without (only deletions, unreadable entries): `SHA256(head + ":dirty")`,
/// or `SHA256(head + ":dirty:" + path)` for a path-scoped query.
pub fn fallback_revision(head: &RevisionId, files: &[ModifiedFile], scope: DirtyScope<'_>) -> Result<RevisionId> {
    let seed = match (modified_content_digest(files), scope) {
        (Some(digest), _) => format!("{head}:{digest}"),
        (None, DirtyScope::Tree) => format!("{head}:dirty"),
        (None, DirtyScope::Path(path)) => format!("{head}:dirty:{path}"),
    };
    Ok(RevisionId::from_sha256(Sha256::digest(seed.as_bytes()).into()))
}
