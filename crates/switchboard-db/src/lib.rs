//! SQLite storage for Switchboard.
//!
//! Connection pooling (`r2d2`), WAL-mode initialization, and embedded SQL
//! migrations. The only table today holds end-of-call summaries, written by
//! the SQLite summary store in `switchboard-calls`.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
