//! oaiharvest core - shared infrastructure for the OAI-PMH harvester
//!
//! Logging, progress reporting, graceful shutdown and the blocking HTTP
//! client used by the protocol layer.

pub mod fsutil;
pub mod http;
pub mod logging;
pub mod progress;
pub mod shutdown;

// Re-exports for convenience
pub use fsutil::write_atomic;
pub use http::{FetchError, HttpClient, HttpConfig, SHARED_RUNTIME};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, fmt_num};
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown};
