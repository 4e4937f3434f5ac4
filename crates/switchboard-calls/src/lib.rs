//! Call lifecycle for the Switchboard framework.
//!
//! [`CallLifecycleManager`] keeps one [`CallSession`] per active call,
//! supplies call context to dispatched invocations, and on call end writes
//! a [`switchboard_types::CallSummaryRecord`] through a [`SummaryStore`].
//! Re-delivered summaries overwrite the earlier record for the same call.

mod error;
mod lifecycle;
mod session;
mod store;

pub use error::PersistenceError;
pub use lifecycle::{extract_summary, synthetic_key, CallLifecycleManager, SessionPolicy};
pub use session::CallSession;
pub use store::{JsonDirSummaryStore, SqliteSummaryStore, SummaryStore};
