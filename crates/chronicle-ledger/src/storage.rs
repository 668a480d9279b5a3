use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::anchor::Anchor;
use crate::entry::LedgerEntry;
use crate::error::LedgerError;

/// File name of the append-only entry log.
pub const ENTRY_LOG_FILE: &str = "entries.log";

/// File name of the anchor side index.
pub const ANCHOR_INDEX_FILE: &str = "anchors.json";

/// How reload reacts to a stored record that fails to parse.
///
/// Entries are precious, so the default skips the offending line and keeps
/// loading; a deployment that prefers loud failure can opt into `Strict`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecoveryMode {
    /// Skip unparseable records, recording a [`LoadWarning`] for each.
    #[default]
    Lenient,
    /// Fail on the first unparseable record.
    Strict,
}

/// Non-fatal note recorded when a stored record could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadWarning {
    /// File the record came from.
    pub file: String,
    /// 1-based line number; 0 when the file is not line-oriented.
    pub line: usize,
    /// Why the record was skipped.
    pub reason: String,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{}: {}", self.file, self.line, self.reason)
        } else {
            write!(f, "{}: {}", self.file, self.reason)
        }
    }
}

/// Append-only entry log: one JSON entry per line, each line independently
/// parseable so one corrupted line never blocks the rest.
///
/// Every append opens the file fresh, writes, and fsyncs before returning;
/// the committed length is tracked so a failed write can be rolled back to
/// the last known-good boundary.
#[derive(Debug)]
pub struct EntryLog {
    path: PathBuf,
    committed_len: u64,
}

impl EntryLog {
    /// Open (or create) the entry log at the given path.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let committed_len = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        Ok(Self {
            path: path.to_path_buf(),
            committed_len,
        })
    }

    /// Durably append one serialized entry line.
    ///
    /// The line is written and fsynced before this returns. On failure the
    /// file is truncated back to the last committed length so a partial line
    /// never survives, and the error is surfaced to the caller.
    pub fn append_line(&mut self, line: &str) -> io::Result<()> {
        match self.write_durably(line) {
            Ok(new_len) => {
                self.committed_len = new_len;
                Ok(())
            }
            Err(e) => {
                if let Ok(file) = OpenOptions::new().write(true).open(&self.path) {
                    let _ = file.set_len(self.committed_len);
                }
                Err(e)
            }
        }
    }

    fn write_durably(&self, line: &str) -> io::Result<u64> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(file.metadata()?.len())
    }

    /// Read all entries back, line by line.
    ///
    /// In lenient mode a line that fails to parse (typically a torn write
    /// from a crash) is skipped and recorded as a warning; loading continues
    /// with the remaining lines. In strict mode the first bad line is fatal.
    pub fn read_entries(
        &self,
        mode: RecoveryMode,
    ) -> Result<(Vec<LedgerEntry>, Vec<LoadWarning>), LedgerError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((vec![], vec![])),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let number = index + 1;
            let line = line.map_err(LedgerError::from)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    if mode == RecoveryMode::Strict {
                        return Err(LedgerError::CorruptRecord {
                            line: number,
                            reason: e.to_string(),
                        });
                    }
                    warn!(line = number, error = %e, "skipping unparseable entry");
                    warnings.push(LoadWarning {
                        file: ENTRY_LOG_FILE.to_string(),
                        line: number,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(
            loaded = entries.len(),
            skipped = warnings.len(),
            "entry log read"
        );
        Ok((entries, warnings))
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Anchor side index: a single JSON document rewritten wholesale on each
/// anchor creation.
///
/// Anchors are disposable verification aids; an unreadable index degrades to
/// an empty anchor set plus a warning and never affects entry loading.
#[derive(Debug)]
pub struct AnchorStore {
    path: PathBuf,
}

impl AnchorStore {
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Rewrite the whole index.
    pub fn save(&self, anchors: &[Anchor]) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(anchors)?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(LedgerError::from)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Load the index; an unparseable or unreadable index yields an empty
    /// anchor set plus a warning.
    pub fn load(&self) -> (Vec<Anchor>, Option<LoadWarning>) {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return (vec![], None),
            Err(e) => {
                warn!(error = %e, "anchor index unreadable; treating as empty");
                return (
                    vec![],
                    Some(LoadWarning {
                        file: ANCHOR_INDEX_FILE.to_string(),
                        line: 0,
                        reason: e.to_string(),
                    }),
                );
            }
        };

        match serde_json::from_str::<Vec<Anchor>>(&contents) {
            Ok(anchors) => (anchors, None),
            Err(e) => {
                warn!(error = %e, "anchor index unparseable; treating as empty");
                (
                    vec![],
                    Some(LoadWarning {
                        file: ANCHOR_INDEX_FILE.to_string(),
                        line: 0,
                        reason: e.to_string(),
                    }),
                )
            }
        }
    }

    /// Path to the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
