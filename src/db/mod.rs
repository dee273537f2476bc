pub mod models;
pub mod schema;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

use crate::state::DbPool;

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

/// Creates every forum table in one go. The installer does the same work
/// one table per request; this is for tooling and tests.
pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    for table in schema::TABLES {
        conn.execute_batch(table.create_sql)?;
    }
    Ok(())
}

/// Runs `body` inside `BEGIN IMMEDIATE` .. `COMMIT`.
///
/// The outer result carries infrastructure failures (begin, commit). The
/// inner result is whatever `body` returned; when it is an `Err` the
/// transaction has already been rolled back.
pub fn in_transaction<T, E, F>(conn: &Connection, body: F) -> rusqlite::Result<Result<T, E>>
where
    F: FnOnce(&Connection) -> Result<T, E>,
{
    conn.execute_batch("BEGIN IMMEDIATE")?;

    match body(conn) {
        Ok(value) => {
            if let Err(e) = conn.execute_batch("COMMIT") {
                rollback(conn);
                return Err(e);
            }
            Ok(Ok(value))
        }
        Err(e) => {
            rollback(conn);
            Ok(Err(e))
        }
    }
}

fn rollback(conn: &Connection) {
    if let Err(e) = conn.execute_batch("ROLLBACK") {
        tracing::error!("Rollback failed: {}", e);
    }
}

/// Current time as unix seconds, the unit every forum timestamp uses.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Checks whether a table exists in the connected database.
pub fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )
}

/// Builds `?1, ?2, ...` for an `IN (...)` clause of `count` values.
pub(crate) fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tempfile::TempDir;

    /// Pool over a fresh file database with the whole schema in place.
    pub fn pool_with_schema() -> (DbPool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = create_pool(&temp_dir.path().join("test.db")).unwrap();
        create_schema(&pool.get().unwrap()).unwrap();
        (pool, temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn schema_creates_every_table() {
        let (pool, _tmp) = testing::pool_with_schema();
        let conn = pool.get().unwrap();
        for table in schema::TABLES {
            assert!(table_exists(&conn, table.name).unwrap(), "{}", table.name);
        }
    }

    #[test]
    fn in_transaction_commits_on_ok() {
        let (pool, _tmp) = testing::pool_with_schema();
        let conn = pool.get().unwrap();

        let result: Result<(), rusqlite::Error> = in_transaction(&conn, |tx| {
            tx.execute(
                "INSERT INTO config (name, value) VALUES (?1, ?2)",
                params!["name", "Agora"],
            )?;
            Ok(())
        })
        .unwrap();
        assert!(result.is_ok());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM config", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn in_transaction_rolls_back_on_err() {
        let (pool, _tmp) = testing::pool_with_schema();
        let conn = pool.get().unwrap();

        let result: Result<(), String> = in_transaction(&conn, |tx| {
            tx.execute(
                "INSERT INTO config (name, value) VALUES (?1, ?2)",
                params!["name", "Agora"],
            )
            .map_err(|e| e.to_string())?;
            Err("boom".to_string())
        })
        .unwrap();
        assert_eq!(result, Err("boom".to_string()));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM config", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn foreign_keys_enforced() {
        let (pool, _tmp) = testing::pool_with_schema();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO posts (content, thread_id, forum_id, author_id, created_at, updated_at)
             VALUES ('hello there', 99, 99, 99, 0, 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn placeholders_are_numbered() {
        assert_eq!(placeholders(3), "?1, ?2, ?3");
        assert_eq!(placeholders(0), "");
    }
}
