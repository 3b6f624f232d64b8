//! Record sinks: where harvested records end up

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use oaiharvest_client::Record;
use oaiharvest_core::write_atomic;

/// Destination for harvested records
pub trait RecordSink {
    /// Store (or replace) a live record. Returns `false` if nothing was stored.
    fn store(&mut self, record: &Record) -> Result<bool>;

    /// Remove a record. Returns `false` if it was not present.
    fn delete(&mut self, identifier: &str) -> Result<bool>;
}

/// One XML file per record: `{dir}/{percent-encoded identifier}.xml`
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn record_path(&self, identifier: &str) -> PathBuf {
        let encoded: String = url::form_urlencoded::byte_serialize(identifier.as_bytes()).collect();
        self.dir.join(format!("{encoded}.xml"))
    }
}

impl RecordSink for FileSink {
    fn store(&mut self, record: &Record) -> Result<bool> {
        let Some(metadata) = record.metadata.as_deref() else {
            log::warn!("{}: record without metadata, skipped", record.identifier());
            return Ok(false);
        };
        let path = self.record_path(record.identifier());
        write_atomic(&path, metadata.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(true)
    }

    fn delete(&mut self, identifier: &str) -> Result<bool> {
        let path = self.record_path(identifier);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}
