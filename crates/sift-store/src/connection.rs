//! Connection pooling.
//!
//! File-backed pools are the production path. In-memory pools use a named
//! shared-cache database (unique URI per pool) so every pooled connection
//! sees the same data; the pool keeps at least one connection open, which
//! keeps the database alive.

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use uuid::Uuid;

use crate::errors::Result;

/// Pool of `SQLite` connections.
pub type ConnectionPool = r2d2::Pool<SqliteConnectionManager>;

/// One pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pragmas applied to every new connection.
const INIT_PRAGMAS: &str = "PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

fn build_pool(manager: SqliteConnectionManager, max_size: u32) -> Result<ConnectionPool> {
    let manager = manager.with_init(|conn| conn.execute_batch(INIT_PRAGMAS));
    let pool = r2d2::Pool::builder()
        .max_size(max_size)
        .min_idle(Some(1))
        .build(manager)?;
    Ok(pool)
}

/// Create a pool over a database file.
pub fn new_file_pool(path: &str, max_size: u32) -> Result<ConnectionPool> {
    build_pool(SqliteConnectionManager::file(path), max_size)
}

/// Create a pool over a fresh named in-memory database.
///
/// Each call gets its own database; connections within one pool share it.
pub fn new_in_memory_pool() -> Result<ConnectionPool> {
    let uri = format!("file:sift_mem_{}?mode=memory&cache=shared", Uuid::now_v7().simple());
    let manager = SqliteConnectionManager::file(uri).with_flags(
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    );
    build_pool(manager, 4)
}
