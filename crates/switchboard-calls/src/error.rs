/// Failure to persist a call summary. Logged, never returned to the caller
/// of the end-of-call hook.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to get database connection: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to encode summary: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("summary write task failed: {0}")]
    Task(String),
}
