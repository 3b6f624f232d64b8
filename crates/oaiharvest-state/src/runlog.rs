//! Append-only run log (`{name}.stats`)
//!
//! One human-readable line per run or recorded page:
//! ```text
//! Started: 2020-01-01 00:00:00, Harvested/Uploaded/Deleted/Total: 5/5/0/5, Done: 2020-01-01 00:05:00, ResumptionToken: tok1
//! Started: 2020-01-02 00:00:00, Harvested/Uploaded/Deleted/Total: 0/0/0/5, Error: TransportFailure: ...
//! Started: 2020-01-03 00:00:00, Harvested/Uploaded/Deleted/Total: 0/0/0/0, Done: Deleted all ids.
//! Started: 2020-01-04 00:00:00, Done: Reset to last clean state. ResumptionToken: 
//! ```
//! The grammar is the persisted format: recovery scrapes it when the
//! checkpoint file is missing.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::checkpoint::Checkpoint;
use crate::counts::Counts;
use crate::error::StateError;

/// Log timestamps, always UTC
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static START_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Started: (\d{4}-\d{2}-\d{2})").expect("valid regex"));

static RESUMPTION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ResumptionToken: (.*)").expect("valid regex"));

const TS: &str = r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}";

static COMPLETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^Started: ({TS}), Harvested/Uploaded/Deleted/Total: ([\d/]+), Done: ({TS}), ResumptionToken: ?(.*)$"
    ))
    .expect("valid regex")
});

static FAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^Started: ({TS}), Harvested/Uploaded/Deleted/Total: ([\d/]+), Error: (.*)$"
    ))
    .expect("valid regex")
});

static DELETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^Started: ({TS}), Harvested/Uploaded/Deleted/Total: [\d/]+, Done: Deleted all id(?:s|'s)"
    ))
    .expect("valid regex")
});

static RESET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^Started: ({TS}), Done: Reset to last clean state")).expect("valid regex")
});

static INTERRUPTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^Started: ({TS}), Harvested/Uploaded/Deleted/Total:\s*$"))
        .expect("valid regex")
});

/// One parsed run log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunLogEntry {
    Completed {
        started: NaiveDateTime,
        counts: Counts,
        done: NaiveDateTime,
        resumption_token: Option<String>,
    },
    Failed {
        started: NaiveDateTime,
        counts: Counts,
        /// `<kind>: <message>`
        error: String,
    },
    DeletedAll {
        started: NaiveDateTime,
    },
    Reset {
        started: NaiveDateTime,
    },
    /// Started but never finished (process killed mid-run)
    Interrupted {
        started: NaiveDateTime,
    },
    Unrecognized(String),
}

impl RunLogEntry {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end();
        let unrecognized = || Self::Unrecognized(line.to_string());

        if let Some(c) = DELETED.captures(line) {
            return parse_ts(&c[1]).map_or_else(unrecognized, |started| Self::DeletedAll { started });
        }
        if let Some(c) = RESET.captures(line) {
            return parse_ts(&c[1]).map_or_else(unrecognized, |started| Self::Reset { started });
        }
        if let Some(c) = COMPLETED.captures(line) {
            return match (parse_ts(&c[1]), c[2].parse::<Counts>(), parse_ts(&c[3])) {
                (Some(started), Ok(counts), Some(done)) => Self::Completed {
                    started,
                    counts,
                    done,
                    resumption_token: token_value(&c[4]),
                },
                _ => unrecognized(),
            };
        }
        if let Some(c) = FAILED.captures(line) {
            return match (parse_ts(&c[1]), c[2].parse::<Counts>()) {
                (Some(started), Ok(counts)) => Self::Failed {
                    started,
                    counts,
                    error: c[3].to_string(),
                },
                _ => unrecognized(),
            };
        }
        if let Some(c) = INTERRUPTED.captures(line) {
            return parse_ts(&c[1]).map_or_else(unrecognized, |started| Self::Interrupted { started });
        }
        unrecognized()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::DeletedAll { .. } => "deleted",
            Self::Reset { .. } => "reset",
            Self::Interrupted { .. } => "interrupted",
            Self::Unrecognized(_) => "unrecognized",
        }
    }

    pub fn started(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Completed { started, .. }
            | Self::Failed { started, .. }
            | Self::DeletedAll { started }
            | Self::Reset { started }
            | Self::Interrupted { started } => Some(*started),
            Self::Unrecognized(_) => None,
        }
    }
}

fn parse_ts(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()
}

/// Logged token text; empty and the literal `None` mean no token
fn token_value(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty() && s != "None").then(|| s.to_string())
}

/// A run log line that cannot be used for recovery
#[derive(Debug, thiserror::Error)]
#[error("run log line {line}: {reason}")]
pub struct RecoveryError {
    pub line: usize,
    pub reason: String,
}

fn is_delete(line: &str) -> bool {
    line.contains("Done: Deleted all ids") || line.contains("Done: Deleted all id's")
}

fn is_reset(line: &str) -> bool {
    line.contains("Done: Reset to last clean state")
}

/// Rebuild the harvest cursor from run log lines.
///
/// Only lines containing `Done:` count. While no token is pending, each such
/// line's `Started:` date becomes the candidate from-date; every such line's
/// `ResumptionToken:` replaces the candidate token. If the last one is a
/// full delete, both are cleared.
pub fn recover_from_log<I, S>(lines: I) -> Result<Checkpoint, RecoveryError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut token: Option<String> = None;
    let mut from: Option<NaiveDate> = None;
    let mut last_deleted = false;

    for (index, line) in lines.into_iter().enumerate() {
        let line = line.as_ref().trim();
        if !line.contains("Done:") {
            continue;
        }
        last_deleted = is_delete(line);

        // A reset abandons the token but never moves the from-date
        if token.is_none() && !is_reset(line) {
            from = Some(start_date(line).map_err(|reason| RecoveryError {
                line: index + 1,
                reason,
            })?);
        }
        token = RESUMPTION_TOKEN
            .captures(line)
            .and_then(|c| token_value(&c[1]));
    }

    if last_deleted {
        return Ok(Checkpoint::default());
    }
    Ok(Checkpoint::new(token, from))
}

fn start_date(line: &str) -> Result<NaiveDate, String> {
    let captures = START_DATE
        .captures(line)
        .ok_or_else(|| format!("no Started date in {line:?}"))?;
    NaiveDate::parse_from_str(&captures[1], "%Y-%m-%d")
        .map_err(|e| format!("bad Started date {:?}: {e}", &captures[1]))
}

/// Parse every line of a run log; a missing file has no entries.
pub fn read_entries(path: &Path) -> Result<Vec<RunLogEntry>, StateError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(RunLogEntry::parse)
            .collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(StateError::io(path, e)),
    }
}

/// Terminate a partial last line so the next append starts a fresh one.
pub fn ensure_trailing_newline(path: &Path) -> io::Result<()> {
    let mut file = match OpenOptions::new().read(true).append(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if file.metadata()?.len() == 0 {
        return Ok(());
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        log::debug!("terminating partial line in {}", path.display());
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

fn started_prefix(now: DateTime<Utc>) -> String {
    format!(
        "Started: {}, Harvested/Uploaded/Deleted/Total: ",
        timestamp(now)
    )
}

/// Appending writer. Every operation is a single `write_all`.
#[derive(Debug)]
pub(crate) struct RunLog {
    path: PathBuf,
    file: File,
    /// A `Started` prefix is waiting for its outcome
    line_open: bool,
}

impl RunLog {
    pub fn open(path: &Path) -> Result<Self, StateError> {
        ensure_trailing_newline(path).map_err(|e| StateError::io(path, e))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StateError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            line_open: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, text: &str) -> Result<(), StateError> {
        self.file
            .write_all(text.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| StateError::io(&self.path, e))
    }

    /// Leading text for a line that must stand on its own
    fn line_break(&self) -> &'static str {
        if self.line_open { "\n" } else { "" }
    }

    pub fn started(&mut self, now: DateTime<Utc>) -> Result<(), StateError> {
        let text = format!("{}{}", self.line_break(), started_prefix(now));
        self.append(&text)?;
        self.line_open = true;
        Ok(())
    }

    /// Outcome line; opens a fresh prefix if none is pending
    fn outcome(&mut self, now: DateTime<Utc>, tail: &str) -> Result<(), StateError> {
        let mut text = String::new();
        if !self.line_open {
            text.push_str(&started_prefix(now));
        }
        text.push_str(tail);
        text.push('\n');
        self.append(&text)?;
        self.line_open = false;
        Ok(())
    }

    pub fn completed(
        &mut self,
        now: DateTime<Utc>,
        counts: &Counts,
        token: Option<&str>,
    ) -> Result<(), StateError> {
        let tail = format!(
            "{counts}, Done: {}, ResumptionToken: {}",
            timestamp(now),
            token.unwrap_or_default()
        );
        self.outcome(now, &tail)
    }

    pub fn failed(
        &mut self,
        now: DateTime<Utc>,
        kind: &str,
        message: &str,
        counts: &Counts,
    ) -> Result<(), StateError> {
        let message = message.replace(['\r', '\n'], " ");
        self.outcome(now, &format!("{counts}, Error: {kind}: {message}"))
    }

    pub fn deleted(&mut self, now: DateTime<Utc>) -> Result<(), StateError> {
        let text = format!(
            "{}Started: {}, Harvested/Uploaded/Deleted/Total: 0/0/0/0, Done: Deleted all ids.\n",
            self.line_break(),
            timestamp(now)
        );
        self.append(&text)?;
        self.line_open = false;
        Ok(())
    }

    pub fn reset(&mut self, now: DateTime<Utc>) -> Result<(), StateError> {
        let text = format!(
            "{}Started: {}, Done: Reset to last clean state. ResumptionToken: \n",
            self.line_break(),
            timestamp(now)
        );
        self.append(&text)?;
        self.line_open = false;
        Ok(())
    }

    pub fn close(self) -> Result<(), StateError> {
        let Self { path, file, .. } = self;
        file.sync_all().map_err(|e| StateError::io(&path, e))?;
        drop(file);
        ensure_trailing_newline(&path).map_err(|e| StateError::io(&path, e))
    }
}
