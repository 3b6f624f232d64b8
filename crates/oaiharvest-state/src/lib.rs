//! oaiharvest state - durable harvest cursor, run log and identifier set
//!
//! Per repository name, a state directory holds:
//! ```text
//! {state_dir}/
//! ├── {name}.next    # checkpoint: {"resumptionToken": .., "from": ..}
//! ├── {name}.stats   # append-only run log, one line per run or page
//! └── {name}.ids     # harvested identifiers, one per line
//! ```
//!
//! The checkpoint file is the fast path. When it is missing the cursor is
//! rebuilt from the run log (see [`recover_from_log`]).

pub mod checkpoint;
pub mod counts;
pub mod error;
pub mod ids;
pub mod runlog;
pub mod state;

// Re-exports
pub use checkpoint::Checkpoint;
pub use counts::Counts;
pub use error::StateError;
pub use ids::IdentifierSet;
pub use runlog::{RunLogEntry, recover_from_log};
pub use state::{HarvestState, recover};
