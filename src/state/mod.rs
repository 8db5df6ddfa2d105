//! State storage for the command-line driver.
//!
//! The provider itself is stateless; the driver records what it applied so
//! later runs can plan against it.

mod local;
mod lock;
mod store;
mod types;

pub use local::LocalStateStore;
pub use lock::{LOCK_EXPIRY_SECS, LockInfo, generate_holder_id};
pub use store::StateStore;
pub use types::{
    HistoryEntry, ProviderState, ResourceRecord, STATE_VERSION, StateOperation, address, config_hash,
};
