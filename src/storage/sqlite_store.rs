//! SQLite preference store.
//!
//! # Schema
//! ```sql
//! CREATE TABLE user_settings (
//!     user_id       INTEGER PRIMARY KEY,
//!     settings_json TEXT NOT NULL,
//!     updated_at_ms INTEGER NOT NULL
//! )
//! ```
//!
//! Player identities are stored as the two's-complement `i64` of the `u64`.

use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::types::PreferenceRecord;
use super::PreferenceStore;
use crate::types::{now_ms, PlayerId};

/// SQLite-backed [`PreferenceStore`].
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

fn to_db_id(id: PlayerId) -> i64 {
    id.as_u64() as i64
}

fn from_db_id(raw: i64) -> PlayerId {
    PlayerId(raw as u64)
}

fn decode(json: &str) -> Result<PreferenceRecord, String> {
    serde_json::from_str(json).map_err(|e| format!("Decode settings failed: {}", e))
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create directory: {}", e))?;
            }
        }

        let conn = Connection::open(&path).map_err(|e| format!("Failed to open sqlite db: {}", e))?;
        Self::migrate(&conn)?;

        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("Failed to open sqlite db: {}", e))?;
        Self::migrate(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<(), String> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_settings (
                user_id INTEGER PRIMARY KEY,
                settings_json TEXT NOT NULL,
                updated_at_ms INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| format!("Failed to create user_settings table: {}", e))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored players.
    pub fn count(&self) -> Result<usize, String> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_settings", [], |row| row.get(0))
            .map_err(|e| format!("Count failed: {}", e))?;
        Ok(count as usize)
    }

    /// Most recently updated records, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<(PreferenceRecord, u64)>, String> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT settings_json, updated_at_ms FROM user_settings
                 ORDER BY updated_at_ms DESC LIMIT ?1",
            )
            .map_err(|e| format!("Prepare failed: {}", e))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| format!("Query failed: {}", e))?;

        let mut records = Vec::new();
        for row in rows {
            let (json, updated_at) = row.map_err(|e| format!("Read row failed: {}", e))?;
            records.push((decode(&json)?, updated_at as u64));
        }
        Ok(records)
    }
}

impl PreferenceStore for SqliteStore {
    fn get_one(&self, id: PlayerId) -> Result<Option<PreferenceRecord>, String> {
        let conn = self.conn.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT settings_json FROM user_settings WHERE user_id = ?1",
                params![to_db_id(id)],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| format!("Query failed: {}", e))?;

        json.as_deref().map(decode).transpose()
    }

    fn get_many(&self, ids: &[PlayerId]) -> Result<HashMap<PlayerId, PreferenceRecord>, String> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT user_id, settings_json FROM user_settings WHERE user_id IN ({})",
            placeholders
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(|e| format!("Prepare failed: {}", e))?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter().map(|id| to_db_id(*id))), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| format!("Query failed: {}", e))?;

        let mut records = HashMap::with_capacity(ids.len());
        for row in rows {
            let (raw_id, json) = row.map_err(|e| format!("Read row failed: {}", e))?;
            records.insert(from_db_id(raw_id), decode(&json)?);
        }
        Ok(records)
    }

    fn upsert_one(&self, id: PlayerId, record: &PreferenceRecord) -> Result<(), String> {
        if !id.is_valid() {
            return Ok(());
        }

        let json = serde_json::to_string(record)
            .map_err(|e| format!("Encode settings failed: {}", e))?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO user_settings (user_id, settings_json, updated_at_ms)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                settings_json = excluded.settings_json,
                updated_at_ms = excluded.updated_at_ms",
            params![to_db_id(id), json, now_ms() as i64],
        )
        .map_err(|e| format!("Upsert failed: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::WeaponPreference;
    use crate::types::{AllocationType, Team};
    use crate::weapons::WeaponItem;

    #[test]
    fn test_sqlite_store_create_and_reopen() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let path = tmp_dir.path().join("nested/prefs.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            let mut record = PreferenceRecord::new(PlayerId(11));
            record.set_weapon_preference(
                Team::TeamB,
                AllocationType::HalfBuyPrimary,
                Some(WeaponItem::MP9.into()),
            );
            store.upsert_one(PlayerId(11), &record).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let record = store.get_one(PlayerId(11)).unwrap().unwrap();
        assert_eq!(
            record.weapon_preference(Team::TeamB, AllocationType::HalfBuyPrimary),
            Some(WeaponPreference::Fixed(WeaponItem::MP9))
        );
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_sqlite_upsert_replaces() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut record = PreferenceRecord::new(PlayerId(5));
        store.upsert_one(PlayerId(5), &record).unwrap();
        record.special_item_enabled = true;
        store.upsert_one(PlayerId(5), &record).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert!(store.get_one(PlayerId(5)).unwrap().unwrap().special_item_enabled);
    }

    #[test]
    fn test_sqlite_get_many_omits_missing() {
        let store = SqliteStore::open_in_memory().unwrap();
        for id in [1u64, 2, 3] {
            store.upsert_one(PlayerId(id), &PreferenceRecord::new(PlayerId(id))).unwrap();
        }

        let found = store
            .get_many(&[PlayerId(1), PlayerId(3), PlayerId(99)])
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains_key(&PlayerId(3)));
        assert!(!found.contains_key(&PlayerId(99)));
        assert!(store.get_many(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_high_bit_identity() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = PlayerId(u64::MAX - 3);
        store.upsert_one(id, &PreferenceRecord::new(id)).unwrap();
        assert_eq!(store.get_one(id).unwrap().unwrap().user_id, id);
        assert!(store.get_many(&[id]).unwrap().contains_key(&id));
    }

    #[test]
    fn test_sqlite_ignores_invalid_identity() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_one(PlayerId::INVALID, &PreferenceRecord::new(PlayerId::INVALID))
            .unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }
}
