//! Forum content: boards, threads, posts and everything hanging off them.

pub mod board;
pub mod content;
pub mod members;
pub mod messages;
pub mod moderation;
pub mod posts;
pub mod search;
pub mod subscriptions;
pub mod words;

pub use words::IndexError;

#[derive(Debug, thiserror::Error)]
pub enum ForumError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type ForumResult<T> = Result<T, ForumError>;

/// Resolves the outcome of a lifecycle transaction.
///
/// `Some` means committed. A body failure was already rolled back; it is
/// logged and becomes `None`, except word index failures which the caller
/// must see.
pub(crate) fn settle<T>(
    action: &str,
    outcome: rusqlite::Result<ForumResult<T>>,
) -> ForumResult<Option<T>> {
    match outcome? {
        Ok(value) => Ok(Some(value)),
        Err(ForumError::Index(e)) => Err(ForumError::Index(e)),
        Err(e) => {
            tracing::error!("{} failed and was rolled back: {}", action, e);
            Ok(None)
        }
    }
}

/// URL fragment derived from a display name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "topic".to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use rusqlite::{params, Connection};

    use crate::auth::password::create_user;
    use crate::db::unix_now;

    pub struct Board {
        pub author_id: i64,
        pub category_id: i64,
        pub forum_id: i64,
        pub thread_id: i64,
        pub post_id: i64,
    }

    /// One category, forum and thread with a single post by `author`.
    pub fn seed_board(conn: &Connection) -> Board {
        crate::rbac::seed(conn).unwrap();
        let author_id = create_user(conn, "author", Some("author@example.com"), "password1").unwrap();
        crate::rbac::assign(conn, crate::rbac::ROLE_USER, author_id).unwrap();
        let now = unix_now();

        conn.execute(
            "INSERT INTO categories (name, slug, created_at, updated_at) VALUES ('General', 'general', ?1, ?1)",
            params![now],
        )
        .unwrap();
        let category_id = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO forums (category_id, name, slug, threads, posts, created_at, updated_at)
             VALUES (?1, 'Lounge', 'lounge', 1, 1, ?2, ?2)",
            params![category_id, now],
        )
        .unwrap();
        let forum_id = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO threads (name, slug, category_id, forum_id, author_id, posts,
                                  new_post_at, edited_post_at, created_at, updated_at)
             VALUES ('Hello', 'hello', ?1, ?2, ?3, 1, ?4, ?4, ?4, ?4)",
            params![category_id, forum_id, author_id, now],
        )
        .unwrap();
        let thread_id = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO posts (content, thread_id, forum_id, author_id, created_at, updated_at)
             VALUES ('First post of the thread', ?1, ?2, ?3, ?4, ?4)",
            params![thread_id, forum_id, author_id, now],
        )
        .unwrap();
        let post_id = conn.last_insert_rowid();

        Board {
            author_id,
            category_id,
            forum_id,
            thread_id,
            post_id,
        }
    }

    /// Active member with the `user` role.
    pub fn member(conn: &Connection, name: &str) -> i64 {
        let email = format!("{}@example.com", name);
        let id = create_user(conn, name, Some(&email), "password1").unwrap();
        crate::rbac::assign(conn, crate::rbac::ROLE_USER, id).unwrap();
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Hello,  World!"), "hello-world");
        assert_eq!(slugify("  Rust & SQLite 3 "), "rust-sqlite-3");
        assert_eq!(slugify("Zażółć gęślą"), "zażółć-gęślą");
        assert_eq!(slugify("!!!"), "topic");
    }

    #[test]
    fn settle_hides_body_failures_but_not_index_failures() {
        let rolled_back: rusqlite::Result<ForumResult<i64>> =
            Ok(Err(ForumError::Invalid("nope".into())));
        assert!(settle("test", rolled_back).unwrap().is_none());

        let committed: rusqlite::Result<ForumResult<i64>> = Ok(Ok(7));
        assert_eq!(settle("test", committed).unwrap(), Some(7));

        let index: rusqlite::Result<ForumResult<i64>> = Ok(Err(ForumError::Index(
            IndexError::from(rusqlite::Error::QueryReturnedNoRows),
        )));
        assert!(matches!(settle("test", index), Err(ForumError::Index(_))));

        let infra: rusqlite::Result<ForumResult<i64>> = Err(rusqlite::Error::InvalidQuery);
        assert!(matches!(settle("test", infra), Err(ForumError::Database(_))));
    }
}
