use std::path::PathBuf;

use gitcache_core::{Error, Result};

const STATUS_CODES: &[u8] = b" MTADRCU?!";

/// One entry of `git status --porcelain -z`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEntry {
    pub index: char,
    pub worktree: char,
    /// Path relative to the repository top level (the destination for renames).
    pub path: PathBuf,
    /// Original path of a rename or copy.
    pub source: Option<PathBuf>,
}

impl StatusEntry {
    pub fn is_rename_or_copy(&self) -> bool {
        matches!(self.index, 'R' | 'C') || matches!(self.worktree, 'R' | 'C')
    }
}

/// Parse NUL-separated porcelain v1 status output.
///
/// Every record must be `XY<space>PATH`. A rename or copy is followed by one
/// extra record carrying the original path. Anything else is rejected rather
/// than sliced at a guessed offset.
pub fn parse_porcelain_z(output: &[u8]) -> Result<Vec<StatusEntry>> {
    let mut entries = Vec::new();
    let mut records = output.split(|b| *b == 0).filter(|r| !r.is_empty());

    while let Some(record) = records.next() {
        if record.len() < 4 || record[2] != b' ' || !STATUS_CODES.contains(&record[0]) || !STATUS_CODES.contains(&record[1]) {
            return Err(unrecognized(record));
        }
        let mut entry = StatusEntry {
            index: record[0] as char,
            worktree: record[1] as char,
            path: PathBuf::from(String::from_utf8_lossy(&record[3..]).into_owned()),
            source: None,
        };
        if entry.is_rename_or_copy() {
            let source = records.next().ok_or_else(|| unrecognized(record))?;
            entry.source = Some(PathBuf::from(String::from_utf8_lossy(source).into_owned()));
        }
        entries.push(entry);
    }

    Ok(entries)
}

fn unrecognized(record: &[u8]) -> Error {
    Error::UnrecognizedStatus {
        line: String::from_utf8_lossy(record).into_owned(),
    }
}
