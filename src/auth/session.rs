use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

/// Create a new session for a user. Returns the session token.
pub fn create_session(conn: &Connection, user_id: i64, hours: u64) -> rusqlite::Result<String> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Resolves a live session token to its user id.
pub fn session_user(conn: &Connection, token: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
        params![token],
        |row| row.get(0),
    )
    .optional()
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password;
    use crate::db::testing::pool_with_schema;

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn sessions_resolve_until_deleted() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let user_id = password::create_user(&conn, "alice", Some("alice@example.com"), "secret-pass")
            .unwrap();

        let token = create_session(&conn, user_id, 1).unwrap();
        assert_eq!(session_user(&conn, &token).unwrap(), Some(user_id));

        delete_session(&conn, &token).unwrap();
        assert_eq!(session_user(&conn, &token).unwrap(), None);
    }
}
