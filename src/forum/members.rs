use rusqlite::{params, Connection, OptionalExtension};

use crate::auth::password::{self, AccountError};
use crate::db::models::User;
use crate::rbac;

pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        params![id],
        User::from_row,
    )
    .optional()
}

pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", User::COLUMNS),
        params![username],
        User::from_row,
    )
    .optional()
}

/// Creates an active account holding the `user` role.
pub fn create_member(
    conn: &Connection,
    username: &str,
    email: Option<&str>,
    password: &str,
) -> Result<i64, AccountError> {
    let id = password::create_user(conn, username, email, password)?;
    rbac::assign(conn, rbac::ROLE_USER, id)?;
    tracing::info!("Member {} registered as #{}", username, id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::pool_with_schema;

    #[test]
    fn created_members_can_post() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        rbac::seed(&conn).unwrap();

        let id = create_member(&conn, "dana", Some("dana@example.com"), "password1").unwrap();
        let user = find(&conn, id).unwrap().unwrap();
        assert!(user.is_active());
        assert_eq!(find_by_username(&conn, "dana").unwrap().unwrap().id, id);
        assert!(rbac::can(&conn, id, rbac::CREATE_POST).unwrap());
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        rbac::seed(&conn).unwrap();
        create_member(&conn, "dana", None, "password1").unwrap();
        assert!(create_member(&conn, "dana", None, "password2").is_err());
    }
}
