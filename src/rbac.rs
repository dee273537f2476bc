//! Role based access rules stored in the `auth_*` tables.

use rusqlite::{params, Connection};

use crate::db::unix_now;

const KIND_ROLE: i64 = 1;
const KIND_PERMISSION: i64 = 2;

pub const ROLE_USER: &str = "user";
pub const ROLE_MODERATOR: &str = "moderator";
pub const ROLE_ADMIN: &str = "admin";

pub const CREATE_THREAD: &str = "createThread";
pub const CREATE_POST: &str = "createPost";
pub const UPDATE_OWN_POST: &str = "updateOwnPost";
pub const UPDATE_POST: &str = "updatePost";
pub const DELETE_OWN_POST: &str = "deleteOwnPost";
pub const DELETE_POST: &str = "deletePost";
pub const SEND_MESSAGE: &str = "sendMessage";
pub const CHANGE_SETTINGS: &str = "changeSettings";

const PERMISSIONS: &[(&str, &str)] = &[
    (CREATE_THREAD, "Create new threads"),
    (CREATE_POST, "Reply in threads"),
    (UPDATE_OWN_POST, "Edit own posts"),
    (UPDATE_POST, "Edit any post"),
    (DELETE_OWN_POST, "Delete own posts"),
    (DELETE_POST, "Delete any post"),
    (SEND_MESSAGE, "Send private messages"),
    (CHANGE_SETTINGS, "Change forum settings"),
];

const ROLES: &[(&str, &str)] = &[
    (ROLE_USER, "Forum member"),
    (ROLE_MODERATOR, "Forum moderator"),
    (ROLE_ADMIN, "Forum administrator"),
];

/// Parent -> child edges. Roles inherit everything their children grant.
const HIERARCHY: &[(&str, &str)] = &[
    (ROLE_USER, CREATE_THREAD),
    (ROLE_USER, CREATE_POST),
    (ROLE_USER, UPDATE_OWN_POST),
    (ROLE_USER, DELETE_OWN_POST),
    (ROLE_USER, SEND_MESSAGE),
    (ROLE_MODERATOR, ROLE_USER),
    (ROLE_MODERATOR, UPDATE_POST),
    (ROLE_MODERATOR, DELETE_POST),
    (ROLE_ADMIN, ROLE_MODERATOR),
    (ROLE_ADMIN, CHANGE_SETTINGS),
];

/// Inserts the default roles, permissions and their hierarchy.
pub fn seed(conn: &Connection) -> rusqlite::Result<()> {
    let mut item = conn.prepare(
        "INSERT INTO auth_items (name, kind, description) VALUES (?1, ?2, ?3)",
    )?;
    for (name, description) in PERMISSIONS {
        item.execute(params![name, KIND_PERMISSION, description])?;
    }
    for (name, description) in ROLES {
        item.execute(params![name, KIND_ROLE, description])?;
    }

    let mut child =
        conn.prepare("INSERT INTO auth_item_children (parent, child) VALUES (?1, ?2)")?;
    for (parent, item) in HIERARCHY {
        child.execute(params![parent, item])?;
    }
    Ok(())
}

pub fn assign(conn: &Connection, role: &str, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO auth_assignments (item_name, user_id, created_at) VALUES (?1, ?2, ?3)",
        params![role, user_id, unix_now()],
    )?;
    Ok(())
}

/// Whether the user holds `item` directly or through a role.
pub fn can(conn: &Connection, user_id: i64, item: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "WITH RECURSIVE granted(name) AS (
            SELECT item_name FROM auth_assignments WHERE user_id = ?1
            UNION
            SELECT c.child FROM auth_item_children c JOIN granted g ON c.parent = g.name
         )
         SELECT COUNT(*) > 0 FROM granted WHERE name = ?2",
        params![user_id, item],
        |row| row.get(0),
    )
}
