// src/storage/mod.rs
//
// Store layer: the only place that talks SQL. Everything above it goes through
// the `Store` trait so handlers can be exercised without a live process.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row, Statement};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// A row surfaced as a JSON object keyed by column name.
pub type Record = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store connection lock poisoned")]
    Poisoned,
    #[error("column `{column}` is not valid UTF-8: {source}")]
    Decode {
        column: String,
        source: std::str::Utf8Error,
    },
}

/// Capabilities the query service needs from the relational store.
pub trait Store: Send + Sync {
    fn count_users(&self) -> StoreResult<u64>;

    /// Reads `limit` users starting at `offset`, in `id` order.
    fn list_users(&self, limit: u32, offset: u64) -> StoreResult<Vec<Record>>;

    /// First address row whose `user_id` matches, if any.
    fn find_address(&self, user_id: &Value) -> StoreResult<Option<Record>>;

    fn find_user(&self, id: i64) -> StoreResult<Option<Record>>;

    fn count_posts(&self, user_id: i64) -> StoreResult<u64>;

    fn list_posts(&self, user_id: i64, limit: u32, offset: u64) -> StoreResult<Vec<Record>>;

    /// Returns true when a row was actually removed.
    fn delete_post(&self, id: i64) -> StoreResult<bool>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT
);
CREATE TABLE IF NOT EXISTS addresses (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    street TEXT,
    city TEXT,
    zipcode TEXT
);
CREATE INDEX IF NOT EXISTS idx_addresses_user_id ON addresses(user_id);
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    body TEXT
);
CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts(user_id);
";

/// SQLite-backed store. One long-lived connection shared by every request.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        tracing::info!(path = %path.display(), "Opened SQLite store");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Mutex::new(conn),
        }
    }

    /// Creates the `users`, `addresses` and `posts` tables when missing.
    pub fn init_schema(&self) -> StoreResult<()> {
        self.lock()?.execute_batch(SCHEMA)?;
        tracing::debug!("Schema ensured");
        Ok(())
    }

    /// Runs arbitrary SQL against the connection. Used for seeding.
    pub fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|poisoned| {
            tracing::error!(error = ?poisoned, "Store connection lock poisoned");
            StoreError::Poisoned
        })
    }
}

impl Store for SqliteStore {
    fn count_users(&self) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn list_users(&self, limit: u32, offset: u64) -> StoreResult<Vec<Record>> {
        // No rowid table reaches past i64::MAX, so such a page is always empty.
        let Ok(offset) = i64::try_from(offset) else {
            return Ok(Vec::new());
        };
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached("SELECT * FROM users ORDER BY id LIMIT ?1 OFFSET ?2")?;
        collect_records(&mut stmt, params![limit, offset])
    }

    fn find_address(&self, user_id: &Value) -> StoreResult<Option<Record>> {
        let key = match json_to_sql(user_id) {
            Some(key) => key,
            None => return Ok(None),
        };
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare_cached("SELECT * FROM addresses WHERE user_id = ?1 ORDER BY id LIMIT 1")?;
        Ok(collect_records(&mut stmt, params![key])?.into_iter().next())
    }

    fn find_user(&self, id: i64) -> StoreResult<Option<Record>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached("SELECT * FROM users WHERE id = ?1")?;
        let names = column_names(&stmt);
        let record = stmt
            .query_row(params![id], |row| Ok(read_record(row, &names)))
            .optional()?;
        record.transpose()
    }

    fn count_posts(&self, user_id: i64) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_posts(&self, user_id: i64, limit: u32, offset: u64) -> StoreResult<Vec<Record>> {
        let Ok(offset) = i64::try_from(offset) else {
            return Ok(Vec::new());
        };
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM posts WHERE user_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
        )?;
        collect_records(&mut stmt, params![user_id, limit, offset])
    }

    fn delete_post(&self, id: i64) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changes = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(changes > 0)
    }
}

fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(str::to_owned).collect()
}

fn collect_records(
    stmt: &mut Statement<'_>,
    params: impl rusqlite::Params,
) -> StoreResult<Vec<Record>> {
    let names = column_names(stmt);
    let mut rows = stmt.query(params)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(read_record(row, &names)?);
    }
    Ok(records)
}

fn read_record(row: &Row<'_>, names: &[String]) -> StoreResult<Record> {
    let mut record = Record::new();
    for (idx, name) in names.iter().enumerate() {
        let value = sqlite_value_to_json(name, row.get_ref(idx)?)?;
        record.insert(name.clone(), value);
    }
    Ok(record)
}

fn sqlite_value_to_json(column: &str, value: ValueRef<'_>) -> StoreResult<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(value) => Ok(Value::from(value)),
        // NaN and infinities have no JSON form.
        ValueRef::Real(value) => Ok(Number::from_f64(value).map_or(Value::Null, Value::Number)),
        ValueRef::Text(value) => {
            let text = std::str::from_utf8(value).map_err(|source| StoreError::Decode {
                column: column.to_string(),
                source,
            })?;
            Ok(Value::String(text.to_string()))
        }
        ValueRef::Blob(value) => Ok(Value::Array(
            value.iter().map(|byte| Value::from(*byte)).collect(),
        )),
    }
}

/// Converts a key read back out of a row into something bindable.
fn json_to_sql(value: &Value) -> Option<rusqlite::types::Value> {
    use rusqlite::types::Value as SqlValue;
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real)),
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
            .execute_batch(
                "INSERT INTO users (id, name) VALUES (1, 'Alice'), (2, 'Bob'), (3, 'Carol');
                 INSERT INTO addresses (id, user_id, city) VALUES (1, 1, 'X');
                 INSERT INTO posts (id, user_id, title) VALUES
                    (10, 1, 'first'), (11, 1, 'second'), (12, 1, 'third'), (20, 2, 'hello');",
            )
            .unwrap();
        store
    }

    #[test]
    fn test_count_and_list_users() {
        let store = seeded_store();
        assert_eq!(store.count_users().unwrap(), 3);

        let page = store.list_users(2, 1).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["id"], 2);
        assert_eq!(page[0]["name"], "Bob");
        assert_eq!(page[1]["id"], 3);
        assert_eq!(page[1]["email"], Value::Null);
    }

    #[test]
    fn test_list_users_past_the_end_is_empty() {
        let store = seeded_store();
        assert!(store.list_users(10, 30).unwrap().is_empty());
    }

    #[test]
    fn test_offset_beyond_sqlite_range_is_empty() {
        let store = seeded_store();
        let offset = u64::from(u32::MAX - 1) * u64::from(u32::MAX);
        assert!(store.list_users(u32::MAX, offset).unwrap().is_empty());
        assert!(store.list_posts(1, u32::MAX, offset).unwrap().is_empty());
        assert!(store.list_users(10, i64::MAX as u64 + 1).unwrap().is_empty());
    }

    #[test]
    fn test_find_address() {
        let store = seeded_store();
        let address = store.find_address(&Value::from(1)).unwrap().unwrap();
        assert_eq!(address["city"], "X");
        assert_eq!(address["user_id"], 1);

        assert!(store.find_address(&Value::from(2)).unwrap().is_none());
        assert!(store.find_address(&Value::Null).unwrap().is_none());
    }

    #[test]
    fn test_find_user() {
        let store = seeded_store();
        let user = store.find_user(2).unwrap().unwrap();
        assert_eq!(user["id"], 2);
        assert_eq!(user["name"], "Bob");
        assert!(store.find_user(99).unwrap().is_none());
    }

    #[test]
    fn test_posts_for_user() {
        let store = seeded_store();
        assert_eq!(store.count_posts(1).unwrap(), 3);
        assert_eq!(store.count_posts(3).unwrap(), 0);

        let posts = store.list_posts(1, 2, 2).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["title"], "third");
    }

    #[test]
    fn test_delete_post_is_idempotent() {
        let store = seeded_store();
        assert!(store.delete_post(10).unwrap());
        assert!(!store.delete_post(10).unwrap());
        assert_eq!(store.count_posts(1).unwrap(), 2);
    }

    #[test]
    fn test_value_mapping() {
        assert_eq!(sqlite_value_to_json("c", ValueRef::Real(1.5)).unwrap(), 1.5);
        assert_eq!(
            sqlite_value_to_json("c", ValueRef::Real(f64::NAN)).unwrap(),
            Value::Null
        );
        assert_eq!(
            sqlite_value_to_json("c", ValueRef::Blob(&[1, 2])).unwrap(),
            serde_json::json!([1, 2])
        );
        let err = sqlite_value_to_json("c", ValueRef::Text(&[0xff, 0xfe])).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }
}
