//! Checkpoint store: durable cursor plus run log for one repository

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};

use crate::checkpoint::{Checkpoint, parse_date};
use crate::counts::Counts;
use crate::error::StateError;
use crate::runlog::{self, RunLog, RunLogEntry, recover_from_log};

/// Source of "now" for log timestamps
pub type Clock = fn() -> DateTime<Utc>;

fn checkpoint_path(state_dir: &Path, name: &str) -> PathBuf {
    state_dir.join(format!("{name}.next"))
}

fn log_path(state_dir: &Path, name: &str) -> PathBuf {
    state_dir.join(format!("{name}.stats"))
}

/// Recover the cursor for `name` without opening the run log for writing.
///
/// The checkpoint file wins when present; otherwise the run log is scanned.
pub fn recover(state_dir: &Path, name: &str) -> Result<Checkpoint, StateError> {
    let next = checkpoint_path(state_dir, name);
    if let Some(checkpoint) = Checkpoint::read(&next)? {
        return Ok(checkpoint);
    }

    let stats = log_path(state_dir, name);
    let file = match fs::File::open(&stats) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Checkpoint::default()),
        Err(e) => return Err(StateError::io(&stats, e)),
    };
    let lines = BufReader::new(file)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StateError::io(&stats, e))?;
    let checkpoint =
        recover_from_log(&lines).map_err(|e| StateError::corrupt(&stats, e.to_string()))?;
    log::info!(
        "{name}: no checkpoint file, recovered token={:?} from={:?} from run log",
        checkpoint.resumption_token,
        checkpoint.from
    );
    Ok(checkpoint)
}

/// Harvest cursor and run log of one repository.
///
/// Every `mark_*` call appends to the run log; all but `mark_started` and
/// `mark_exception` also rewrite the checkpoint file.
#[derive(Debug)]
pub struct HarvestState {
    name: String,
    checkpoint_path: PathBuf,
    log: RunLog,
    current: Checkpoint,
    now: Clock,
}

impl HarvestState {
    /// Open (creating the state directory if needed) and recover the cursor.
    pub fn open(state_dir: &Path, name: &str) -> Result<Self, StateError> {
        Self::open_with_clock(state_dir, name, Utc::now)
    }

    pub fn open_with_clock(state_dir: &Path, name: &str, now: Clock) -> Result<Self, StateError> {
        fs::create_dir_all(state_dir).map_err(|e| StateError::io(state_dir, e))?;
        let log = RunLog::open(&log_path(state_dir, name))?;
        let current = recover(state_dir, name)?;
        log::debug!(
            "{name}: token={:?} from={:?}",
            current.resumption_token,
            current.from
        );
        Ok(Self {
            name: name.to_string(),
            checkpoint_path: checkpoint_path(state_dir, name),
            log,
            current,
            now,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resumption_token(&self) -> Option<&str> {
        self.current.resumption_token.as_deref()
    }

    pub fn from_date(&self) -> Option<NaiveDate> {
        self.current.from
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.current
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    pub fn read_log_entries(&self) -> Result<Vec<RunLogEntry>, StateError> {
        runlog::read_entries(self.log.path())
    }

    pub fn mark_started(&mut self) -> Result<(), StateError> {
        self.log.started((self.now)())
    }

    /// Record a harvested page and advance the cursor.
    ///
    /// The from-date moves to `response_date` only when no token was pending
    /// before this page; inside a pagination sequence it stays pinned to the
    /// date the sequence began.
    pub fn mark_harvested(
        &mut self,
        counts: &Counts,
        token: Option<&str>,
        response_date: &str,
    ) -> Result<(), StateError> {
        let token = token.filter(|t| !t.is_empty());
        let from = if self.current.resumption_token.is_some() {
            self.current.from
        } else {
            parse_date(response_date)?
        };
        let next = Checkpoint::new(token.map(str::to_string), from);

        self.log.completed((self.now)(), counts, token)?;
        self.store(next)
    }

    /// Record that every harvested identifier was removed; clears the cursor.
    pub fn mark_deleted(&mut self) -> Result<(), StateError> {
        self.log.deleted((self.now)())?;
        self.store(Checkpoint::default())
    }

    /// Record a failed run. The cursor is left as it was.
    pub fn mark_exception(
        &mut self,
        kind: &str,
        message: &str,
        counts: &Counts,
    ) -> Result<(), StateError> {
        self.log.failed((self.now)(), kind, message, counts)
    }

    /// Abandon the pending token, keeping the from-date.
    pub fn set_to_last_clean_state(&mut self) -> Result<(), StateError> {
        self.log.reset((self.now)())?;
        let from = self.current.from;
        self.store(Checkpoint::new(None, from))
    }

    fn store(&mut self, checkpoint: Checkpoint) -> Result<(), StateError> {
        checkpoint.write(&self.checkpoint_path)?;
        self.current = checkpoint;
        Ok(())
    }

    /// Flush the run log and terminate any partial line.
    pub fn close(self) -> Result<(), StateError> {
        self.log.close()
    }
}
