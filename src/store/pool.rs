use crate::error::StoreError;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::warn;

pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

const CONNECT_RETRIES: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Opens (creating if needed) the SQLite database at `path` and returns a
/// pooled handle to it, with the schema already applied. Transient failures
/// at startup (e.g. the file briefly locked) are retried before giving up.
pub fn open_pool(path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    let manager = SqliteConnectionManager::file(path);
    let pool = r2d2::Pool::builder().max_size(16).build(manager)?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        match pool.get().map_err(StoreError::from).and_then(|conn| init_schema(&conn)) {
            Ok(()) => return Ok(pool),
            Err(e) if attempt < CONNECT_RETRIES => {
                warn!(attempt, error = %e, "database connect failed, retrying");
                thread::sleep(CONNECT_RETRY_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Creates the `klines` and `trades` tables if they do not already exist.
pub fn init_schema(conn: &rusqlite::Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS klines (
            pair        TEXT NOT NULL,
            interval    TEXT NOT NULL,
            o           REAL NOT NULL,
            h           REAL NOT NULL,
            l           REAL NOT NULL,
            c           REAL NOT NULL,
            utc_begin   INTEGER NOT NULL,
            utc_end     INTEGER NOT NULL,
            buy_base    REAL NOT NULL DEFAULT 0,
            sell_base   REAL NOT NULL DEFAULT 0,
            buy_quote   REAL NOT NULL DEFAULT 0,
            sell_quote  REAL NOT NULL DEFAULT 0,
            updated_at  INTEGER NOT NULL,
            UNIQUE(pair, interval, utc_begin)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS trades (
            tid         TEXT NOT NULL,
            pair        TEXT NOT NULL,
            price       REAL NOT NULL,
            amount      REAL NOT NULL,
            side        TEXT NOT NULL,
            timestamp   INTEGER NOT NULL,
            UNIQUE(tid, pair)
        )",
        [],
    )?;

    Ok(())
}
