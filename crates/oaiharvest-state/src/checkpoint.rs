//! Checkpoint file: the fast-path harvest cursor

use std::fs;
use std::io;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use oaiharvest_core::write_atomic;

use crate::error::StateError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Where the next harvest run begins.
///
/// A pending token always pairs with the date at which its pagination
/// sequence started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub resumption_token: Option<String>,
    pub from: Option<NaiveDate>,
}

/// On-disk shape, shared with existing `.next` files
#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    #[serde(rename = "resumptionToken", default)]
    resumption_token: Option<String>,
    #[serde(default)]
    from: Option<String>,
}

impl Checkpoint {
    pub fn new(resumption_token: Option<String>, from: Option<NaiveDate>) -> Self {
        Self {
            resumption_token: resumption_token.filter(|t| !t.is_empty()),
            from,
        }
    }

    /// Nothing harvested yet, or everything deleted
    pub fn is_empty(&self) -> bool {
        self.resumption_token.is_none() && self.from.is_none()
    }

    /// `from` as sent to the repository
    pub fn from_string(&self) -> Option<String> {
        self.from.map(|d| d.format(DATE_FORMAT).to_string())
    }

    /// Load a checkpoint file; `Ok(None)` when it does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, StateError> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateError::io(path, e)),
        };
        let file: CheckpointFile = serde_json::from_slice(&content)
            .map_err(|e| StateError::corrupt(path, e.to_string()))?;
        let from = match file.from.as_deref() {
            Some(value) => parse_date(value).map_err(|e| StateError::corrupt(path, e.to_string()))?,
            None => None,
        };
        Ok(Some(Self::new(file.resumption_token, from)))
    }

    /// Replace the checkpoint file atomically.
    pub fn write(&self, path: &Path) -> Result<(), StateError> {
        let file = CheckpointFile {
            resumption_token: Some(self.resumption_token.clone().unwrap_or_default()),
            from: Some(self.from_string().unwrap_or_default()),
        };
        let json = serde_json::to_vec(&file)
            .map_err(|e| StateError::corrupt(path, e.to_string()))?;
        write_atomic(path, &json).map_err(|e| StateError::io(path, e))
    }
}

/// Date part of an ISO-8601 date or date-time; empty means none.
pub fn parse_date(value: &str) -> Result<Option<NaiveDate>, StateError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let date_part = value.split('T').next().unwrap_or(value);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map(Some)
        .map_err(|_| StateError::InvalidDate(value.to_string()))
}
