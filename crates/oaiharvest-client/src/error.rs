//! Error taxonomy for protocol calls
//!
//! Anything that prevents obtaining a well-formed `OAI-PMH` envelope is a
//! transport failure; a well-formed envelope carrying `<error>` is a protocol
//! error. The client never retries either.

use oaiharvest_core::FetchError;

/// OAI error code a repository uses for an empty (but valid) result set
pub const NO_RECORDS_MATCH: &str = "noRecordsMatch";

/// Why no usable envelope was obtained
#[derive(Debug, thiserror::Error)]
pub enum TransportCause {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Local I/O (archive files, non-HTTP transports)
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Well-formed XML that is not a usable OAI-PMH response
    #[error("{0}")]
    Malformed(String),
}

impl TransportCause {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Classified failure of a single protocol request
#[derive(Debug, thiserror::Error)]
pub enum OaiError {
    #[error("transport failure with repository at \"{url}\": {cause}")]
    Transport {
        url: String,
        #[source]
        cause: TransportCause,
    },
    #[error("OAI error with repository at \"{url}\": [{code}] {message}")]
    Protocol {
        url: String,
        code: String,
        message: String,
    },
}

impl OaiError {
    /// Short name recorded in the run log
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "TransportFailure",
            Self::Protocol { .. } => "ProtocolError",
        }
    }

    /// Full request URL that failed
    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. } | Self::Protocol { url, .. } => url,
        }
    }

    /// OAI error code, for protocol errors only
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Protocol { code, .. } => Some(code),
            Self::Transport { .. } => None,
        }
    }
}
