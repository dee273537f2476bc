//! Outgoing e-mail queue. Delivery happens elsewhere; the forum only
//! records what should be sent.

use rusqlite::{params, Connection};

use crate::db::unix_now;

pub const STATUS_PENDING: i64 = 0;

/// Queues one e-mail. Failures are logged and reported as `false`, never
/// raised.
pub fn queue(
    conn: &Connection,
    address: &str,
    subject: &str,
    content: &str,
    user_id: Option<i64>,
) -> bool {
    let now = unix_now();
    match conn.execute(
        "INSERT INTO emails (user_id, email, subject, content, status, attempts, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
        params![user_id, address, subject, content, STATUS_PENDING, now],
    ) {
        Ok(_) => true,
        Err(e) => {
            tracing::error!("Cannot queue e-mail for {}: {}", address, e);
            false
        }
    }
}

/// Number of e-mails waiting for delivery.
pub fn pending(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM emails WHERE status = ?1",
        params![STATUS_PENDING],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::pool_with_schema;

    #[test]
    fn queue_inserts_pending_row() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        assert!(queue(&conn, "a@example.com", "Hi", "Body", Some(1)));
        assert_eq!(pending(&conn).unwrap(), 1);
    }

    #[test]
    fn queue_reports_failure_instead_of_raising() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::create_pool(&tmp.path().join("empty.db")).unwrap();
        let conn = pool.get().unwrap();
        assert!(!queue(&conn, "a@example.com", "Hi", "Body", None));
    }
}
