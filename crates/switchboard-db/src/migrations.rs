//! Embedded SQL migrations.
//!
//! Applied in order at startup and recorded in `_switchboard_migrations`.
//! A migration and its tracking row commit in one transaction.

use rusqlite::Connection;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_call_summaries",
        sql: include_str!("migrations/000_call_summaries.sql"),
    },
    Migration {
        name: "001_call_summaries_updated_idx",
        sql: include_str!("migrations/001_call_summaries_updated_idx.sql"),
    },
];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Applies every pending migration and returns how many ran.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply(conn, MIGRATIONS)
}

fn apply(conn: &Connection, migrations: &[Migration]) -> Result<usize, MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _switchboard_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|source| MigrationError::ExecutionFailed {
        name: "_switchboard_migrations".to_string(),
        source,
    })?;

    let mut applied = 0;
    for migration in migrations {
        let done: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _switchboard_migrations WHERE name = ?1",
                [migration.name],
                |row| row.get(0),
            )
            .map_err(MigrationError::StateQuery)?;
        if done {
            continue;
        }

        let failed = |source: rusqlite::Error| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source,
        };

        tracing::info!(migration = migration.name, "applying migration");
        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _switchboard_migrations (name) VALUES (?1)",
            [migration.name],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;
        applied += 1;
    }

    Ok(applied)
}
