use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ids::{ReportedRevision, RevisionId};

/// Digests of one byte sequence. A pure function of that sequence.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFingerprint {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub sha512: String,
    pub sha256_base64: String,
    pub sha512_base64: String,
}

/// What the caller wants evaluated. Not persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildTarget {
    pub artifact_path: PathBuf,
    pub trigger_path: PathBuf,
    pub trigger_mode: bool,
}

impl BuildTarget {
    pub fn new(artifact_path: impl Into<PathBuf>, trigger_path: impl Into<PathBuf>) -> Self {
        Self {
            artifact_path: artifact_path.into(),
            trigger_path: trigger_path.into(),
            trigger_mode: true,
        }
    }

    /// A target that always rebuilds.
    pub fn untriggered(artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            artifact_path: artifact_path.into(),
            trigger_path: PathBuf::from("."),
            trigger_mode: false,
        }
    }

    pub fn with_trigger_mode(mut self, enabled: bool) -> Self {
        self.trigger_mode = enabled;
        self
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    NoPriorBuild,
    UpToDate,
    StaleNeedsRebuild,
}

#[derive(Clone, Debug, Serialize)]
pub struct Decision {
    pub should_rebuild: bool,
    pub reason: DecisionReason,
    pub reported_revision: ReportedRevision,
    /// Revision read from the sidecar, if any.
    pub last_revision: Option<RevisionId>,
    /// Fingerprint of the reused artifact; only set when up to date.
    pub fingerprint: Option<ContentFingerprint>,
}

impl Decision {
    pub fn rebuild(reason: DecisionReason, reported_revision: ReportedRevision, last_revision: Option<RevisionId>) -> Self {
        Self {
            should_rebuild: true,
            reason,
            reported_revision,
            last_revision,
            fingerprint: None,
        }
    }

    pub fn up_to_date(last_revision: RevisionId, fingerprint: ContentFingerprint) -> Self {
        Self {
            should_rebuild: false,
            reason: DecisionReason::UpToDate,
            reported_revision: ReportedRevision::Known(last_revision.clone()),
            last_revision: Some(last_revision),
            fingerprint: Some(fingerprint),
        }
    }
}

/// Result of recording a successful rebuild.
#[derive(Clone, Debug, Serialize)]
pub struct BuildRecord {
    pub reported_revision: ReportedRevision,
    pub fingerprint: ContentFingerprint,
    /// Baseline written to the sidecar, if it was written.
    pub saved_baseline: Option<RevisionId>,
}
