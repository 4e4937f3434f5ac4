//! Where end-of-call summaries go.

use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::{params, OptionalExtension};
use switchboard_db::DbPool;
use tempfile::NamedTempFile;
use switchboard_types::CallSummaryRecord;

use crate::error::PersistenceError;

/// Durable summary storage. Writing the same `call_id` twice keeps only the
/// second record.
///
/// Implementations are synchronous; the lifecycle manager calls them on the
/// blocking thread pool.
pub trait SummaryStore: Send + Sync {
    fn save(&self, record: &CallSummaryRecord) -> Result<(), PersistenceError>;
}

/// Summaries in the `call_summaries` table.
#[derive(Debug, Clone)]
pub struct SqliteSummaryStore {
    pool: DbPool,
}

impl SqliteSummaryStore {
    /// The pool's database must already be migrated.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn load(&self, call_id: &str) -> Result<Option<CallSummaryRecord>, PersistenceError> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                "SELECT call_id, summary, raw_payload FROM call_summaries WHERE call_id = ?1",
                [call_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((call_id, summary_text, raw)) = row else {
            return Ok(None);
        };
        Ok(Some(CallSummaryRecord {
            call_id,
            summary_text,
            raw_payload: serde_json::from_str(&raw)?,
        }))
    }

    pub fn count(&self) -> Result<usize, PersistenceError> {
        let conn = self.pool.get()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM call_summaries", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl SummaryStore for SqliteSummaryStore {
    fn save(&self, record: &CallSummaryRecord) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(&record.raw_payload)?;
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO call_summaries (call_id, summary, raw_payload)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(call_id) DO UPDATE SET
                summary = excluded.summary,
                raw_payload = excluded.raw_payload,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![record.call_id, record.summary_text, raw],
        )?;
        Ok(())
    }
}

/// One pretty-printed `<call_id>.json` file per call, holding the raw
/// end-of-call payload.
#[derive(Debug, Clone)]
pub struct JsonDirSummaryStore {
    dir: PathBuf,
}

impl JsonDirSummaryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a record with this key is written to.
    ///
    /// The key is percent-encoded, so distinct keys never share a file and
    /// no key can name a path outside the directory. A leading `.` is
    /// encoded as well to keep `.` and `..` out of file names.
    pub fn path_for(&self, call_id: &str) -> PathBuf {
        let encoded = urlencoding::encode(call_id);
        let name = match encoded.strip_prefix('.') {
            Some(rest) => format!("%2E{rest}"),
            None => encoded.into_owned(),
        };
        self.dir.join(format!("{name}.json"))
    }
}

impl SummaryStore for JsonDirSummaryStore {
    fn save(&self, record: &CallSummaryRecord) -> Result<(), PersistenceError> {
        let io_err = |path: &Path| {
            let path = path.display().to_string();
            move |source: std::io::Error| PersistenceError::Io { path, source }
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        let path = self.path_for(&record.call_id);
        let body = serde_json::to_vec_pretty(&record.raw_payload)?;

        // One temp file per write; concurrent writers for a key race only
        // on the final rename, and the last one wins.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err(&self.dir))?;
        tmp.write_all(&body).map_err(io_err(tmp.path()))?;
        tmp.persist(&path).map_err(|e| io_err(&path)(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_db::{create_pool, run_migrations, DbRuntimeSettings};

    fn record(call_id: &str, summary: &str) -> CallSummaryRecord {
        CallSummaryRecord {
            call_id: call_id.to_string(),
            summary_text: summary.to_string(),
            raw_payload: json!({"call_id": call_id, "summary": summary}),
        }
    }

    fn sqlite_store(dir: &tempfile::TempDir) -> SqliteSummaryStore {
        let path = dir.path().join("calls.db");
        let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();
        SqliteSummaryStore::new(pool)
    }

    #[test]
    fn sqlite_upsert_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = sqlite_store(&dir);

        store.save(&record("abc", "first")).unwrap();
        store.save(&record("abc", "second")).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let loaded = store.load("abc").unwrap().unwrap();
        assert_eq!(loaded.summary_text, "second");
        assert_eq!(loaded.raw_payload["summary"], "second");
        assert!(store.load("missing").unwrap().is_none());
    }

    #[test]
    fn json_dir_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirSummaryStore::new(dir.path().join("calls"));

        store.save(&record("abc", "first")).unwrap();
        store.save(&record("abc", "second")).unwrap();

        let path = store.path_for("abc");
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["summary"], "second");

        let files: Vec<_> = std::fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn json_dir_keys_stay_inside_the_directory() {
        let store = JsonDirSummaryStore::new("/var/calls");
        assert_eq!(
            store.path_for("../../etc/passwd"),
            PathBuf::from("/var/calls/%2E.%2F..%2Fetc%2Fpasswd.json")
        );
        assert_eq!(store.path_for(".."), PathBuf::from("/var/calls/%2E..json"));
        assert_eq!(
            store.path_for("20261015_120000_123456"),
            PathBuf::from("/var/calls/20261015_120000_123456.json")
        );
    }

    #[test]
    fn json_dir_keeps_similar_keys_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirSummaryStore::new(dir.path());

        for key in ["a/b", "a_b", "a%2Fb", ".hidden", "%2Ehidden"] {
            store.save(&record(key, key)).unwrap();
        }

        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 5);
        for key in ["a/b", "a_b", "a%2Fb", ".hidden", "%2Ehidden"] {
            let saved: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(store.path_for(key)).unwrap())
                    .unwrap();
            assert_eq!(saved["call_id"], key);
        }
    }

    #[test]
    fn json_dir_concurrent_redelivery_never_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirSummaryStore::new(dir.path());

        std::thread::scope(|scope| {
            let writers: Vec<_> = (0..4)
                .map(|writer| {
                    let store = &store;
                    scope.spawn(move || {
                        for round in 0..50 {
                            let summary = format!("writer {writer} round {round}");
                            store.save(&record("same", &summary)).unwrap();
                        }
                    })
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }
        });

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("same.json")]);
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path_for("same")).unwrap())
                .unwrap();
        assert!(saved["summary"].as_str().unwrap().ends_with("round 49"));
    }
}
