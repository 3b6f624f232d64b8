//! Per-run record counters

use std::fmt;
use std::str::FromStr;

/// Counters reported in every run log entry as `harvested/uploaded/deleted/total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Records received this run
    pub harvested: u64,
    /// Records stored by the sink
    pub uploaded: u64,
    /// Deleted records removed by the sink
    pub deleted: u64,
    /// Identifiers known after the run
    pub total: u64,
}

impl Counts {
    pub fn new(harvested: u64, uploaded: u64, deleted: u64, total: u64) -> Self {
        Self {
            harvested,
            uploaded,
            deleted,
            total,
        }
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.harvested, self.uploaded, self.deleted, self.total
        )
    }
}

impl FromStr for Counts {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u64> = s
            .trim()
            .split('/')
            .map(|p| p.parse::<u64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid counts {s:?}: {e}"))?;
        match parts[..] {
            [harvested, uploaded, deleted, total] => {
                Ok(Self::new(harvested, uploaded, deleted, total))
            }
            _ => Err(format!("invalid counts {s:?}: expected four fields")),
        }
    }
}
