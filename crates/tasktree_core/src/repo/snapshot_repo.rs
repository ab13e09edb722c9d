//! Snapshot repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the whole task collection as one JSON value under one key.
//! - Rehydrate that value on startup.
//!
//! # Invariants
//! - `save` replaces the slot atomically (single upsert statement).
//! - `load` returns `None` only when the key has never been written or was
//!   cleared.
//! - Each record's `id` must match the key it is stored under.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::task::TaskCollection;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage key used by the original application for the todo collection.
pub const DEFAULT_STORAGE_KEY: &str = "todos";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from snapshot persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Stored value could not be encoded or decoded.
    Serialization(serde_json::Error),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Decoded value is structurally valid JSON but not a valid collection.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "snapshot serialization failed: {err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "snapshot repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "snapshot repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted snapshot: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Durable key-value slot holding one task collection per key.
pub trait SnapshotRepository {
    /// Loads the collection stored under `key`, if any.
    fn load(&self, key: &str) -> RepoResult<Option<TaskCollection>>;
    /// Replaces the collection stored under `key`.
    fn save(&self, key: &str, tasks: &TaskCollection) -> RepoResult<()>;
    /// Removes the slot. Returns whether a value existed.
    fn clear(&self, key: &str) -> RepoResult<bool>;
}

impl<R: SnapshotRepository + ?Sized> SnapshotRepository for &R {
    fn load(&self, key: &str) -> RepoResult<Option<TaskCollection>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, tasks: &TaskCollection) -> RepoResult<()> {
        (**self).save(key, tasks)
    }

    fn clear(&self, key: &str) -> RepoResult<bool> {
        (**self).clear(key)
    }
}

/// SQLite-backed snapshot repository over the `kv_store` table.
pub struct SqliteSnapshotRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSnapshotRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SnapshotRepository for SqliteSnapshotRepository<'_> {
    fn load(&self, key: &str) -> RepoResult<Option<TaskCollection>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        let Some(value) = value else {
            return Ok(None);
        };

        let tasks = decode_collection(&value)?;
        debug!(
            "event=snapshot_load module=repo status=ok key={} tasks={}",
            key,
            tasks.len()
        );
        Ok(Some(tasks))
    }

    fn save(&self, key: &str, tasks: &TaskCollection) -> RepoResult<()> {
        let value = serde_json::to_string(tasks)?;
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }

    fn clear(&self, key: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1;", [key])?;
        Ok(changed > 0)
    }
}

fn decode_collection(value: &str) -> RepoResult<TaskCollection> {
    let tasks: TaskCollection = serde_json::from_str(value)?;
    if let Some((key, task)) = tasks.iter().find(|(key, task)| **key != task.id) {
        return Err(RepoError::InvalidData(format!(
            "record stored under `{key}` carries id `{}`",
            task.id
        )));
    }
    Ok(tasks)
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'kv_store'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::MissingRequiredTable("kv_store"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{decode_collection, RepoError};
    use uuid::Uuid;

    #[test]
    fn decode_accepts_original_record_shape() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"{id}":{{"id":"{id}","title":"Buy milk","completed":false}}}}"#);
        let tasks = decode_collection(&raw).unwrap();
        let task = &tasks[&id];
        assert_eq!(task.title, "Buy milk");
        assert!(task.parent_id.is_none());
        assert!(task.children_ids.is_empty());
    }

    #[test]
    fn decode_rejects_key_id_mismatch() {
        let key = Uuid::new_v4();
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"{key}":{{"id":"{id}","title":"x","completed":false}}}}"#);
        let err = decode_collection(&raw).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let err = decode_collection("{not json").unwrap_err();
        assert!(matches!(err, RepoError::Serialization(_)));
    }
}
