//! Connection bootstrap for the binary store file.
//!
//! # Invariants
//! - Writer connections have `journal_mode=WAL`, `foreign_keys=ON` and all
//!   migrations applied.
//! - Reader connections are read-only and never run migrations.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the store file for writing, creating it when absent.
///
/// # Side effects
/// - Switches the file to WAL journaling and applies pending migrations.
/// - Emits one `db_open` event with duration and status.
pub fn open_store_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();
    let result = Connection::open(path)
        .map_err(|source| DbError::Open {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|mut conn| {
            enable_wal(&conn)?;
            bootstrap_writer(&mut conn)?;
            Ok(conn)
        });

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode=file path={} duration_ms={}",
            path.display(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode=file path={} duration_ms={} error={}",
            path.display(),
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

/// Opens an in-memory store database with migrations applied.
pub fn open_store_db_in_memory() -> DbResult<Connection> {
    let mut conn = Connection::open_in_memory()?;
    bootstrap_writer(&mut conn)?;
    Ok(conn)
}

/// Opens a read-only connection to an existing store file.
pub fn open_reader(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| DbError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn enable_wal(conn: &Connection) -> DbResult<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        return Err(DbError::WalUnavailable { mode });
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

fn bootstrap_writer(conn: &mut Connection) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}
