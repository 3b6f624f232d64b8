//! oaiharvest client - OAI-PMH protocol client
//!
//! Issues `Identify`, `ListRecords` and `GetRecord` against a repository base
//! URL and turns the responses into typed values or a classified [`OaiError`].
//!
//! # Example
//!
//! ```ignore
//! use oaiharvest_client::{HttpTransport, ListRecordsArgs, OaiClient};
//!
//! let transport = HttpTransport::new(&Default::default())?;
//! let client = OaiClient::new("https://example.org/oai", transport)?;
//!
//! for page in client.pages(ListRecordsArgs::new("oai_dc")) {
//!     let page = page?;
//!     for record in &page {
//!         println!("{}", record.header.identifier);
//!     }
//! }
//! ```

pub mod archive;
pub mod client;
pub mod error;
pub mod pages;
pub mod request;
pub mod response;
pub mod transport;

// Re-exports
pub use archive::{ArchivingTransport, RequestCounter};
pub use client::OaiClient;
pub use error::{OaiError, TransportCause};
pub use pages::RecordPages;
pub use request::ListRecordsArgs;
pub use response::{Header, Record, RecordPage, RepositoryInfo};
pub use transport::{HttpTransport, Transport};
