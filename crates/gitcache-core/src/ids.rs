use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Length of a revision hash in hex characters.
pub const REVISION_LEN: usize = 40;

/// Sentinel reported when no revision could be determined.
pub const UNKNOWN_REVISION: &str = "unknown";

/// A 40-character lowercase hex revision.
///
/// Either a real commit hash or a synthetic fallback derived from dirty
/// working-tree content. Construction always validates the shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RevisionId(String);

impl RevisionId {
    pub fn parse(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref().trim();
        if s.len() != REVISION_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidRevision(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Build a revision from a longer hex digest by keeping the first 40 chars.
    pub fn from_digest_hex(digest: &str) -> Result<Self, Error> {
        match digest.get(..REVISION_LEN) {
            Some(prefix) => Self::parse(prefix),
            None => Err(Error::InvalidRevision(digest.to_string())),
        }
    }

    /// Revision from the leading 20 bytes of a SHA-256 digest.
    pub fn from_sha256(digest: [u8; 32]) -> Self {
        Self(digest[..REVISION_LEN / 2].iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RevisionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RevisionId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<RevisionId> for String {
    fn from(rev: RevisionId) -> Self {
        rev.0
    }
}

/// Revision reported alongside an artifact. Reporting is best-effort, so a
/// failed lookup degrades to `Unknown` instead of failing the build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportedRevision {
    Known(RevisionId),
    Unknown,
}

impl ReportedRevision {
    pub fn known(&self) -> Option<&RevisionId> {
        match self {
            Self::Known(rev) => Some(rev),
            Self::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(rev) => rev.as_str(),
            Self::Unknown => UNKNOWN_REVISION,
        }
    }
}

impl<E> From<Result<RevisionId, E>> for ReportedRevision {
    fn from(res: Result<RevisionId, E>) -> Self {
        match res {
            Ok(rev) => Self::Known(rev),
            Err(_) => Self::Unknown,
        }
    }
}

impl fmt::Display for ReportedRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReportedRevision {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
