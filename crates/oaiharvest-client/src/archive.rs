//! Request/response archiving for replay and debugging
//!
//! Archive directory layout:
//! ```text
//! {dir}/
//! ├── number                  # next sequence number
//! ├── oairequest.0.url
//! ├── oairequest.0.xml
//! └── ...
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use oaiharvest_core::write_atomic;

use crate::error::TransportCause;
use crate::transport::Transport;

/// Durable sequence counter, persisted in `{dir}/number`.
///
/// A number is written to disk before it is handed out, so restarts never
/// reuse one even when the process dies mid-request.
#[derive(Debug)]
pub struct RequestCounter {
    path: PathBuf,
    next: Mutex<u64>,
}

impl RequestCounter {
    pub const FILE_NAME: &'static str = "number";

    /// Load the counter from `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::FILE_NAME);
        let next = match fs::read_to_string(&path) {
            Ok(content) => content.trim().parse::<u64>().map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{}: {e}", path.display()),
                )
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        Ok(Self {
            path,
            next: Mutex::new(next),
        })
    }

    /// Read, increment and persist in one step; returns the reserved number.
    pub fn reserve(&self) -> io::Result<u64> {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let number = *next;
        write_atomic(&self.path, (number + 1).to_string().as_bytes())?;
        *next = number + 1;
        Ok(number)
    }

    /// Number the next `reserve` will return
    pub fn peek(&self) -> u64 {
        *self.next.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transport decorator that saves every request URL and response body.
#[derive(Debug)]
pub struct ArchivingTransport<T> {
    inner: T,
    dir: PathBuf,
    counter: RequestCounter,
}

impl<T: Transport> ArchivingTransport<T> {
    pub fn new(inner: T, dir: &Path) -> io::Result<Self> {
        let counter = RequestCounter::open(dir)?;
        Ok(Self {
            inner,
            dir: dir.to_path_buf(),
            counter,
        })
    }

    pub fn counter(&self) -> &RequestCounter {
        &self.counter
    }

    pub fn response_path(&self, number: u64) -> PathBuf {
        self.dir.join(format!("oairequest.{number}.xml"))
    }

    pub fn request_path(&self, number: u64) -> PathBuf {
        self.dir.join(format!("oairequest.{number}.url"))
    }
}

impl<T: Transport> Transport for ArchivingTransport<T> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportCause> {
        let number = self.counter.reserve()?;
        fs::write(self.request_path(number), url)?;
        let body = self.inner.fetch(url)?;
        fs::write(self.response_path(number), &body)?;
        log::debug!("archived response {number} ({} bytes)", body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Echo;

    impl Transport for Echo {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportCause> {
            Ok(format!("<echo>{url}</echo>").into_bytes())
        }
    }

    struct Refuse;

    impl Transport for Refuse {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, TransportCause> {
            Err(TransportCause::malformed("refused"))
        }
    }

    #[test]
    fn counter_starts_at_zero() {
        let dir = TempDir::new().unwrap();
        let counter = RequestCounter::open(dir.path()).unwrap();
        assert_eq!(counter.reserve().unwrap(), 0);
        assert_eq!(counter.reserve().unwrap(), 1);
        assert_eq!(counter.peek(), 2);
    }

    #[test]
    fn counter_survives_restart() {
        let dir = TempDir::new().unwrap();
        {
            let counter = RequestCounter::open(dir.path()).unwrap();
            counter.reserve().unwrap();
            counter.reserve().unwrap();
        }
        let counter = RequestCounter::open(dir.path()).unwrap();
        assert_eq!(counter.reserve().unwrap(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("number")).unwrap(),
            "3"
        );
    }

    #[test]
    fn counter_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("number"), "twelve").unwrap();
        let err = RequestCounter::open(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn archives_request_and_response() {
        let dir = TempDir::new().unwrap();
        let transport = ArchivingTransport::new(Echo, &dir.path().join("archive")).unwrap();

        transport.fetch("http://x/oai?verb=Identify").unwrap();
        transport.fetch("http://x/oai?verb=ListRecords").unwrap();

        assert_eq!(
            fs::read_to_string(transport.request_path(1)).unwrap(),
            "http://x/oai?verb=ListRecords"
        );
        assert_eq!(
            fs::read_to_string(transport.response_path(0)).unwrap(),
            "<echo>http://x/oai?verb=Identify</echo>"
        );
    }

    #[test]
    fn failed_fetch_still_consumes_number() {
        let dir = TempDir::new().unwrap();
        let transport = ArchivingTransport::new(Refuse, dir.path()).unwrap();
        assert!(transport.fetch("http://x/oai").is_err());
        assert!(transport.request_path(0).exists());
        assert!(!transport.response_path(0).exists());
        assert_eq!(transport.counter().peek(), 1);
    }
}
