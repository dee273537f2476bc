//! Forum settings stored as name/value rows in the `config` table.
//!
//! Missing rows fall back to the compiled-in defaults, so a half-installed
//! forum still reads sane values.

use rusqlite::{params, Connection, OptionalExtension};

/// Version of the forum schema and content this build installs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = "name";
pub const VERSION_KEY: &str = "version";
pub const MERGE_POSTS: &str = "merge_posts";
pub const MEMBERS_VISIBLE: &str = "members_visible";
pub const MAINTENANCE_MODE: &str = "maintenance_mode";
pub const META_KEYWORDS: &str = "meta_keywords";
pub const META_DESCRIPTION: &str = "meta_description";
pub const HOT_MINIMUM: &str = "hot_minimum";

/// Default settings seeded by the installer.
pub const DEFAULTS: &[(&str, &str)] = &[
    (NAME, "Agora"),
    (VERSION_KEY, VERSION),
    (HOT_MINIMUM, "20"),
    (MEMBERS_VISIBLE, "1"),
    ("from_email", "no-reply@change.me"),
    ("from_name", "Agora"),
    (MAINTENANCE_MODE, "0"),
    ("max_attempts", "5"),
    ("use_captcha", "1"),
    (MERGE_POSTS, "1"),
    ("recaptcha_sitekey", ""),
    ("recaptcha_secretkey", ""),
    ("password_reset_token_expire", "86400"),
    ("email_token_expire", "86400"),
    ("activation_token_expire", "259200"),
    (META_KEYWORDS, "agora,forum"),
    (META_DESCRIPTION, "Agora discussion forum"),
    ("registration_off", "0"),
];

pub fn default_value(name: &str) -> Option<&'static str> {
    DEFAULTS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
}

/// Stored value of a setting, or its default.
pub fn get(conn: &Connection, name: &str) -> rusqlite::Result<Option<String>> {
    let stored = stored(conn, name)?;
    Ok(stored.or_else(|| default_value(name).map(str::to_string)))
}

/// Stored value only, without falling back to defaults.
pub fn stored(conn: &Connection, name: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM config WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
}

pub fn get_flag(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    Ok(get(conn, name)?.is_some_and(|v| v == "1"))
}

pub fn set(conn: &Connection, name: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO config (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        params![name, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::pool_with_schema;

    #[test]
    fn missing_rows_fall_back_to_defaults() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        assert_eq!(get(&conn, NAME).unwrap().as_deref(), Some("Agora"));
        assert!(get_flag(&conn, MERGE_POSTS).unwrap());
        assert!(stored(&conn, NAME).unwrap().is_none());
        assert!(get(&conn, "unknown").unwrap().is_none());
    }

    #[test]
    fn set_upserts() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        set(&conn, MERGE_POSTS, "0").unwrap();
        assert!(!get_flag(&conn, MERGE_POSTS).unwrap());
        set(&conn, MERGE_POSTS, "1").unwrap();
        assert!(get_flag(&conn, MERGE_POSTS).unwrap());

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM config", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn defaults_record_this_build_version() {
        assert_eq!(default_value(VERSION_KEY), Some(VERSION));
    }
}
