//! Identifier set (`{name}.ids`): one identifier per line

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use oaiharvest_core::write_atomic;

use crate::error::StateError;

/// Identifiers harvested from one repository, kept in memory and rewritten
/// in full on [`flush`](Self::flush) and [`close`](Self::close).
#[derive(Debug)]
pub struct IdentifierSet {
    path: PathBuf,
    ids: FxHashSet<String>,
    dirty: bool,
}

impl IdentifierSet {
    /// Load `{dir}/{name}.ids`, creating `dir` if needed.
    pub fn open(dir: &Path, name: &str) -> Result<Self, StateError> {
        fs::create_dir_all(dir).map_err(|e| StateError::io(dir, e))?;
        let path = dir.join(format!("{name}.ids"));
        let ids = match fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(|l| l.trim_end_matches('\r'))
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => FxHashSet::default(),
            Err(e) => return Err(StateError::io(&path, e)),
        };
        Ok(Self {
            path,
            ids,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the identifier was new.
    ///
    /// Identifiers that cannot be stored one per line (empty, or containing
    /// a line break) are refused.
    pub fn add(&mut self, id: &str) -> bool {
        if !is_storable(id) {
            log::warn!("{}: refusing identifier {id:?}", self.path.display());
            return false;
        }
        let added = self.ids.insert(id.to_string());
        self.dirty |= added;
        added
    }

    /// Removing an absent identifier is a no-op
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.ids.remove(id);
        self.dirty |= removed;
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn total(&self) -> usize {
        self.ids.len()
    }

    pub fn clear(&mut self) {
        self.dirty |= !self.ids.is_empty();
        self.ids.clear();
    }

    /// Identifiers in sorted order
    pub fn sorted(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Rewrite the file if anything changed since the last write.
    pub fn flush(&mut self) -> Result<(), StateError> {
        if !self.dirty && self.path.exists() {
            return Ok(());
        }
        let mut content = String::new();
        for id in self.sorted() {
            content.push_str(id);
            content.push('\n');
        }
        write_atomic(&self.path, content.as_bytes()).map_err(|e| StateError::io(&self.path, e))?;
        self.dirty = false;
        Ok(())
    }

    pub fn close(mut self) -> Result<(), StateError> {
        self.flush()
    }
}

fn is_storable(id: &str) -> bool {
    !id.is_empty() && !id.contains(['\n', '\r'])
}
