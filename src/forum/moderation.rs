//! Who may moderate which forum.

use rusqlite::{params, Connection};

use crate::db::models::Post;
use crate::rbac;

/// Administrators moderate everywhere; moderators only where listed.
pub fn is_moderator(conn: &Connection, forum_id: i64, user_id: i64) -> rusqlite::Result<bool> {
    if rbac::can(conn, user_id, rbac::ROLE_ADMIN)? {
        return Ok(true);
    }
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM moderators WHERE forum_id = ?1 AND user_id = ?2",
        params![forum_id, user_id],
        |row| row.get(0),
    )
}

pub fn add_moderator(conn: &Connection, forum_id: i64, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO moderators (user_id, forum_id) VALUES (?1, ?2)",
        params![user_id, forum_id],
    )?;
    rbac::assign(conn, rbac::ROLE_MODERATOR, user_id)
}

/// Everyone receiving complaints about posts in the forum: listed
/// moderators and all administrators.
pub fn moderators_of(conn: &Connection, forum_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM moderators WHERE forum_id = ?1
         UNION
         SELECT user_id FROM auth_assignments WHERE item_name = ?2
         ORDER BY 1",
    )?;
    let ids = stmt
        .query_map(params![forum_id, rbac::ROLE_ADMIN], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

pub fn may_edit(conn: &Connection, user_id: i64, post: &Post) -> rusqlite::Result<bool> {
    may(conn, user_id, post, rbac::UPDATE_OWN_POST, rbac::UPDATE_POST)
}

pub fn may_delete(conn: &Connection, user_id: i64, post: &Post) -> rusqlite::Result<bool> {
    may(conn, user_id, post, rbac::DELETE_OWN_POST, rbac::DELETE_POST)
}

fn may(
    conn: &Connection,
    user_id: i64,
    post: &Post,
    own: &str,
    any: &str,
) -> rusqlite::Result<bool> {
    if post.author_id == user_id && rbac::can(conn, user_id, own)? {
        return Ok(true);
    }
    Ok(rbac::can(conn, user_id, any)? && is_moderator(conn, post.forum_id, user_id)?)
}
