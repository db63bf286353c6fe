//! SQLite-backed keystore repository.
//!
//! [`VaultStore`] is an isolated, asynchronous string-key → JSON-string
//! store. It wraps a `rusqlite::Connection` behind an `Arc<Mutex<>>` and
//! dispatches every operation onto the blocking thread pool via
//! `tokio::task::spawn_blocking`, so callers never block the async runtime
//! on file I/O.
//!
//! Each operation is a single SQLite transaction: a failed write never
//! leaves a half-written record. [`VaultStore::set_many`] extends that to
//! multi-record writes, which is what makes password change and backup
//! import all-or-nothing at the persistence layer.
//!
//! # Schema
//!
//! One table, `vault_records(key TEXT PRIMARY KEY, value TEXT NOT NULL)`.
//! The vault uses four well-known keys (see the `records` constants).

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::{Result, VaultError};

/// Well-known record keys in the vault store.
pub mod records {
    /// JSON array of `SecureKeystore`, one per wallet account.
    pub const KEYSTORES: &str = "keystores";
    /// The currently selected wallet address.
    pub const CURRENT_ADDRESS: &str = "current_address";
    /// JSON map of address → human-readable alias.
    pub const ALIASES: &str = "aliases";
    /// `EncryptedPackage` holding the password check sentinel.
    pub const MASTER_KEY_CHECK: &str = "master_key_check";
}

/// Thread-safe async handle to the vault's SQLite store.
///
/// Cloning is cheap and shares the underlying connection.
#[derive(Clone)]
pub struct VaultStore {
    conn: Arc<Mutex<Connection>>,
}

impl VaultStore {
    /// Open (or create) the store at `path` and apply pragmas + schema.
    ///
    /// This call blocks briefly (file I/O), so call it during startup before
    /// entering the main async loop, or wrap it in `spawn_blocking` yourself.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening vault store");

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate_blocking()?;

        info!("vault store ready");
        Ok(store)
    }

    /// Open an in-memory store — useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        debug!("opening in-memory vault store");

        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate_blocking()?;
        Ok(store)
    }

    /// Apply SQLite pragmas for durability and performance.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA temp_store = MEMORY;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Create the schema if it does not exist yet.
    fn migrate_blocking(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS vault_records (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        debug!("vault store schema ready");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VaultError::TaskJoin(format!("store mutex poisoned: {e}")))
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| VaultError::TaskJoin(format!("store mutex poisoned: {e}")))?;
            f(&mut conn)
        })
        .await?
    }

    // -- Operations ---------------------------------------------------------

    /// Fetch the value stored under `key`, or `None` if absent.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM vault_records WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    /// Upsert `value` under `key`.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO vault_records (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            debug!(key = %key, "stored vault record");
            Ok(())
        })
        .await
    }

    /// Upsert every `(key, value)` pair in a single transaction.
    ///
    /// Either all entries land or none do. Password change and backup import
    /// rely on this for their all-or-nothing guarantee.
    pub async fn set_many(&self, entries: Vec<(String, String)>) -> Result<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for (key, value) in &entries {
                tx.execute(
                    "INSERT INTO vault_records (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                )?;
            }
            tx.commit()?;
            debug!(count = entries.len(), "stored vault records atomically");
            Ok(())
        })
        .await
    }

    /// Delete the record under `key`. Deleting a missing key is a no-op.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM vault_records WHERE key = ?1", params![key])?;
            debug!(key = %key, "deleted vault record");
            Ok(())
        })
        .await
    }

    /// Remove every record — the full vault wipe.
    pub async fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM vault_records", [])?;
            info!("cleared all vault records");
            Ok(())
        })
        .await
    }

    /// Verify the storage backend is reachable and writable.
    ///
    /// Used by `VaultManager::initialize` as the fail-fast storage probe.
    pub async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT count(*) FROM vault_records", [], |row| {
                row.get::<_, i64>(0)
            })?;
            Ok(())
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let store = VaultStore::open_in_memory().unwrap();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let store = VaultStore::open_in_memory().unwrap();
        store.set(records::CURRENT_ADDRESS, "5Grw...").await.unwrap();

        let value = store.get(records::CURRENT_ADDRESS).await.unwrap();
        assert_eq!(value.as_deref(), Some("5Grw..."));
    }

    #[tokio::test]
    async fn set_replaces_existing_value() {
        let store = VaultStore::open_in_memory().unwrap();
        store.set("k", "one").await.unwrap();
        store.set("k", "two").await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = VaultStore::open_in_memory().unwrap();
        store.set("k", "v").await.unwrap();
        store.delete("k").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), None);
        // Deleting again is a no-op, not an error.
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn clear_wipes_everything() {
        let store = VaultStore::open_in_memory().unwrap();
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();

        store.clear().await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_many_writes_all_entries() {
        let store = VaultStore::open_in_memory().unwrap();
        store
            .set_many(vec![
                (records::KEYSTORES.into(), "[]".into()),
                (records::ALIASES.into(), "{}".into()),
                (records::CURRENT_ADDRESS.into(), "5Grw...".into()),
            ])
            .await
            .unwrap();

        assert_eq!(store.get(records::KEYSTORES).await.unwrap().as_deref(), Some("[]"));
        assert_eq!(store.get(records::ALIASES).await.unwrap().as_deref(), Some("{}"));
        assert_eq!(
            store.get(records::CURRENT_ADDRESS).await.unwrap().as_deref(),
            Some("5Grw...")
        );
    }

    #[tokio::test]
    async fn ping_succeeds_on_open_store() {
        let store = VaultStore::open_in_memory().unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn on_disk_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        {
            let store = VaultStore::open(&path).unwrap();
            store.set("k", "persisted").await.unwrap();
        }

        let store = VaultStore::open(&path).unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("persisted"));
    }
}
