//! Store contract and SQLite implementation.
//!
//! # Invariants
//! - Every `put` and `delete_many` runs in one write transaction under the
//!   writer lock.
//! - Every `get` reads the series row and its columns inside one read
//!   transaction, so it sees either the old or the new table.
//! - The read cache only admits tables read under the current write
//!   generation.

use crate::db::{open_reader, open_store_db, open_store_db_in_memory};
use crate::model::Scalar;
use crate::store::{ColumnValues, StorageError, StoreKey, StoreResult, TimeSeriesTable};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// Per-key metadata attributes.
pub type StoreAttrs = BTreeMap<String, Scalar>;

const MAX_IDLE_READERS: usize = 4;

/// Keyed columnar store contract.
pub trait SeriesStore: Send + Sync {
    /// Writes or replaces one table and its attributes.
    fn put(&self, key: &StoreKey, table: &TimeSeriesTable, attrs: &StoreAttrs)
        -> StoreResult<()>;
    /// Loads one table; `None` when the key was never written.
    fn get(&self, key: &StoreKey) -> StoreResult<Option<Arc<TimeSeriesTable>>>;
    /// Loads one attribute map; `None` when the key was never written.
    fn get_attrs(&self, key: &StoreKey) -> StoreResult<Option<StoreAttrs>>;
    /// Deletes one key. Returns `false` when it did not exist.
    fn delete(&self, key: &StoreKey) -> StoreResult<bool> {
        Ok(self.delete_many(std::slice::from_ref(key))? == 1)
    }
    /// Deletes keys in one transaction. Returns the number removed.
    fn delete_many(&self, keys: &[StoreKey]) -> StoreResult<usize>;
    fn contains(&self, key: &StoreKey) -> StoreResult<bool>;
    /// Lists stored keys in ascending order.
    fn keys(&self) -> StoreResult<Vec<StoreKey>>;
}

#[derive(Default)]
struct ReadCache {
    generation: u64,
    tables: HashMap<StoreKey, Arc<TimeSeriesTable>>,
}

/// SQLite-backed store file.
///
/// File-backed stores serve reads from a small pool of read-only
/// connections, so concurrent `get` calls do not wait on each other or on
/// the writer. In-memory stores share the writer connection for reads.
pub struct SqliteSeriesStore {
    path: Option<PathBuf>,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
    cache: RwLock<ReadCache>,
}

impl SqliteSeriesStore {
    /// Opens or creates the store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = open_store_db(&path)?;
        Ok(Self {
            path: Some(path),
            writer: Mutex::new(writer),
            readers: Mutex::new(Vec::new()),
            cache: RwLock::new(ReadCache::default()),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            path: None,
            writer: Mutex::new(open_store_db_in_memory()?),
            readers: Mutex::new(Vec::new()),
            cache: RwLock::new(ReadCache::default()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_reader<T>(
        &self,
        read: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let Some(path) = self.path.as_ref() else {
            let conn = self.writer.lock().map_err(|_| StorageError::LockPoisoned)?;
            return read(&conn);
        };

        let pooled = self
            .readers
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => open_reader(path)?,
        };
        let result = read(&conn);
        let mut idle = self.readers.lock().map_err(|_| StorageError::LockPoisoned)?;
        if idle.len() < MAX_IDLE_READERS {
            idle.push(conn);
        }
        result
    }

    fn current_generation(&self) -> StoreResult<u64> {
        Ok(self
            .cache
            .read()
            .map_err(|_| StorageError::LockPoisoned)?
            .generation)
    }

    fn invalidate(&self, keys: &[StoreKey]) -> StoreResult<()> {
        let mut cache = self.cache.write().map_err(|_| StorageError::LockPoisoned)?;
        cache.generation += 1;
        for key in keys {
            cache.tables.remove(key);
        }
        Ok(())
    }
}

impl SeriesStore for SqliteSeriesStore {
    fn put(
        &self,
        key: &StoreKey,
        table: &TimeSeriesTable,
        attrs: &StoreAttrs,
    ) -> StoreResult<()> {
        let started_at = Instant::now();
        let mut conn = self.writer.lock().map_err(|_| StorageError::LockPoisoned)?;
        let result = write_entry(&mut conn, key, table, attrs);
        drop(conn);
        self.invalidate(std::slice::from_ref(key))?;

        match &result {
            Ok(()) => info!(
                "event=store_put module=store status=ok key={} rows={} columns={} duration_ms={}",
                key,
                table.len(),
                table.columns().len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=store_put module=store status=error key={} duration_ms={} error={}",
                key,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn get(&self, key: &StoreKey) -> StoreResult<Option<Arc<TimeSeriesTable>>> {
        {
            let cache = self.cache.read().map_err(|_| StorageError::LockPoisoned)?;
            if let Some(table) = cache.tables.get(key) {
                return Ok(Some(Arc::clone(table)));
            }
        }

        let generation = self.current_generation()?;
        let Some(table) = self.with_reader(|conn| read_table(conn, key))? else {
            return Ok(None);
        };
        let table = Arc::new(table);

        let mut cache = self.cache.write().map_err(|_| StorageError::LockPoisoned)?;
        if cache.generation == generation {
            cache.tables.insert(key.clone(), Arc::clone(&table));
        }
        Ok(Some(table))
    }

    fn get_attrs(&self, key: &StoreKey) -> StoreResult<Option<StoreAttrs>> {
        self.with_reader(|conn| {
            let tx = conn.unchecked_transaction()?;
            if !series_exists(&tx, key)? {
                return Ok(None);
            }
            let attrs = read_attrs(&tx, key)?;
            tx.finish()?;
            Ok(Some(attrs))
        })
    }

    fn delete_many(&self, keys: &[StoreKey]) -> StoreResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let started_at = Instant::now();
        let mut conn = self.writer.lock().map_err(|_| StorageError::LockPoisoned)?;
        let removed = {
            let tx = conn.transaction()?;
            let mut removed = 0;
            for key in keys {
                removed += tx.execute("DELETE FROM series WHERE key = ?1", params![key.as_str()])?;
            }
            tx.commit()?;
            removed
        };
        drop(conn);
        self.invalidate(keys)?;

        info!(
            "event=store_delete module=store status=ok requested={} removed={} duration_ms={}",
            keys.len(),
            removed,
            started_at.elapsed().as_millis()
        );
        Ok(removed)
    }

    fn contains(&self, key: &StoreKey) -> StoreResult<bool> {
        self.with_reader(|conn| series_exists(conn, key))
    }

    fn keys(&self) -> StoreResult<Vec<StoreKey>> {
        self.with_reader(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM series ORDER BY key ASC")?;
            let raw = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            raw.into_iter()
                .map(|value| {
                    StoreKey::parse(&value).ok_or_else(|| StorageError::Corrupt {
                        key: value.clone(),
                        detail: "malformed key".to_string(),
                    })
                })
                .collect()
        })
    }
}

fn write_entry(
    conn: &mut Connection,
    key: &StoreKey,
    table: &TimeSeriesTable,
    attrs: &StoreAttrs,
) -> StoreResult<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM series WHERE key = ?1", params![key.as_str()])?;
    let index: Vec<i64> = table
        .index()
        .iter()
        .map(DateTime::timestamp_micros)
        .collect();
    tx.execute(
        "INSERT INTO series (key, row_count, time_index, written_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            key.as_str(),
            table.len() as i64,
            encode_i64s(&index),
            Utc::now().timestamp_millis()
        ],
    )?;

    {
        let mut insert_column = tx.prepare(
            "INSERT INTO series_columns (key, position, name, kind, data) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (position, column) in table.columns().iter().enumerate() {
            let data = match column.values() {
                ColumnValues::Float(values) => encode_f64s(values),
                ColumnValues::Text(values) => {
                    serde_json::to_vec(values).map_err(|err| StorageError::Corrupt {
                        key: key.to_string(),
                        detail: err.to_string(),
                    })?
                }
            };
            insert_column.execute(params![
                key.as_str(),
                position as i64,
                column.name(),
                column.values().kind_name(),
                data
            ])?;
        }

        let mut insert_attr =
            tx.prepare("INSERT INTO series_attrs (key, name, kind, value) VALUES (?1, ?2, ?3, ?4)")?;
        for (name, value) in attrs {
            let (kind, value) = encode_attr(value);
            insert_attr.execute(params![key.as_str(), name, kind, value])?;
        }
    }

    tx.commit()?;
    Ok(())
}

fn series_exists(conn: &Connection, key: &StoreKey) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM series WHERE key = ?1",
            params![key.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn read_table(conn: &Connection, key: &StoreKey) -> StoreResult<Option<TimeSeriesTable>> {
    let tx = conn.unchecked_transaction()?;
    let header = tx
        .query_row(
            "SELECT row_count, time_index FROM series WHERE key = ?1",
            params![key.as_str()],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)),
        )
        .optional()?;
    let Some((row_count, index_bytes)) = header else {
        return Ok(None);
    };

    let corrupt = |detail: String| StorageError::Corrupt {
        key: key.to_string(),
        detail,
    };
    let rows = usize::try_from(row_count).map_err(|_| corrupt(format!("row count {row_count}")))?;
    let index = decode_i64s(&index_bytes, rows)
        .ok_or_else(|| corrupt("time index length mismatch".to_string()))?
        .into_iter()
        .map(|micros| {
            DateTime::from_timestamp_micros(micros)
                .ok_or_else(|| corrupt(format!("time index value {micros} out of range")))
        })
        .collect::<StoreResult<Vec<_>>>()?;
    let mut table = TimeSeriesTable::new(index).map_err(|err| corrupt(err.to_string()))?;

    let mut stmt = tx.prepare(
        "SELECT name, kind, data FROM series_columns WHERE key = ?1 ORDER BY position ASC",
    )?;
    let columns = stmt
        .query_map(params![key.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);
    tx.finish()?;

    for (name, kind, data) in columns {
        let values = match kind.as_str() {
            "float" => ColumnValues::Float(
                decode_f64s(&data, rows)
                    .ok_or_else(|| corrupt(format!("column `{name}` length mismatch")))?,
            ),
            "text" => ColumnValues::Text(
                serde_json::from_slice(&data).map_err(|err| corrupt(err.to_string()))?,
            ),
            other => return Err(corrupt(format!("unknown column kind `{other}`"))),
        };
        table
            .push_column(name, values)
            .map_err(|err| corrupt(err.to_string()))?;
    }
    Ok(Some(table))
}

fn read_attrs(conn: &Connection, key: &StoreKey) -> StoreResult<StoreAttrs> {
    let mut stmt = conn.prepare("SELECT name, kind, value FROM series_attrs WHERE key = ?1")?;
    let rows = stmt
        .query_map(params![key.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Value>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(name, kind, value)| {
            let scalar = decode_attr(&kind, value).ok_or_else(|| StorageError::Corrupt {
                key: key.to_string(),
                detail: format!("attribute `{name}` has invalid `{kind}` value"),
            })?;
            Ok((name, scalar))
        })
        .collect()
}

fn encode_attr(value: &Scalar) -> (&'static str, Value) {
    match value {
        Scalar::Text(text) => ("text", Value::Text(text.clone())),
        Scalar::Int(number) => ("int", Value::Integer(*number)),
        // SQLite turns NaN reals into NULL; keep the exact bits instead.
        Scalar::Float(number) => ("float", Value::Blob(number.to_le_bytes().to_vec())),
        Scalar::Bool(flag) => ("bool", Value::Integer(i64::from(*flag))),
    }
}

fn decode_attr(kind: &str, value: Value) -> Option<Scalar> {
    match (kind, value) {
        ("text", Value::Text(text)) => Some(Scalar::Text(text)),
        ("int", Value::Integer(number)) => Some(Scalar::Int(number)),
        ("float", Value::Blob(bytes)) => {
            let bytes: [u8; 8] = bytes.as_slice().try_into().ok()?;
            Some(Scalar::Float(f64::from_le_bytes(bytes)))
        }
        ("bool", Value::Integer(flag)) => Some(Scalar::Bool(flag != 0)),
        _ => None,
    }
}

fn encode_i64s(values: &[i64]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn encode_f64s(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn decode_i64s(bytes: &[u8], rows: usize) -> Option<Vec<i64>> {
    if bytes.len() != rows.checked_mul(8)? {
        return None;
    }
    bytes
        .chunks_exact(8)
        .map(|chunk| chunk.try_into().ok().map(i64::from_le_bytes))
        .collect()
}

fn decode_f64s(bytes: &[u8], rows: usize) -> Option<Vec<f64>> {
    if bytes.len() != rows.checked_mul(8)? {
        return None;
    }
    bytes
        .chunks_exact(8)
        .map(|chunk| chunk.try_into().ok().map(f64::from_le_bytes))
        .collect()
}
