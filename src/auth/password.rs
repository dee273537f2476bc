use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{ROLE_MEMBER, USER_STATUS_ACTIVE};
use crate::db::unix_now;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

pub fn hash(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, HASH_COST)
}

pub fn verify(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Random one-time password handed to the operator after installation.
pub fn generate_password() -> String {
    const CHARSET: &[u8] = b"abcdefghijkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    const LEN: usize = 12;

    let mut rng = rand::thread_rng();
    (0..LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Inserts an active member account. Returns the new user id.
pub fn create_user(
    conn: &Connection,
    username: &str,
    email: Option<&str>,
    password: &str,
) -> Result<i64, AccountError> {
    let password_hash = hash(password)?;
    let now = unix_now();
    conn.execute(
        "INSERT INTO users (username, email, password_hash, status, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![username, email, password_hash, USER_STATUS_ACTIVE, ROLE_MEMBER, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Checks credentials of an active account. Returns its id on success.
pub fn authenticate(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Result<Option<i64>, AccountError> {
    let row: Option<(i64, Option<String>)> = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE username = ?1 AND status = ?2",
            params![username, USER_STATUS_ACTIVE],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(row.and_then(|(id, stored)| {
        stored
            .filter(|stored| verify(password, stored))
            .map(|_| id)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::pool_with_schema;

    #[test]
    fn generated_passwords_are_twelve_unambiguous_chars() {
        let password = generate_password();
        assert_eq!(password.len(), 12);
        assert!(!password.contains(['0', 'O', 'l', '1']));
        assert_ne!(password, generate_password());
    }

    #[test]
    fn hash_and_verify() {
        let hashed = hash("correct horse").unwrap();
        assert!(verify("correct horse", &hashed));
        assert!(!verify("wrong", &hashed));
    }

    #[test]
    fn authenticate_checks_password() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let id = create_user(&conn, "bob", None, "hunter22").unwrap();

        assert_eq!(authenticate(&conn, "bob", "hunter22").unwrap(), Some(id));
        assert_eq!(authenticate(&conn, "bob", "nope").unwrap(), None);
        assert_eq!(authenticate(&conn, "carol", "hunter22").unwrap(), None);
    }
}
