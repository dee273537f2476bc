//! Thread subscriptions and the e-mail notifications they trigger.

use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;

use crate::cache::Cache;
use crate::db::models::Subscription;
use crate::db::placeholders;
use crate::forum::content::{self, EMAIL_SUBSCRIPTION};
use crate::mail;

const CACHE_KEY: &str = "user.subscriptions";

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub id: i64,
    pub thread_id: i64,
    pub thread_name: String,
    pub post_seen: i64,
}

/// Flags every subscriber of the thread, except `author`, as having a new
/// post and queues their notification e-mail. Subscribers that already
/// have an unseen post are not notified again.
///
/// Returns how many e-mails were queued. Missing addresses and queue
/// failures are logged and skipped.
pub fn notify(
    conn: &Connection,
    cache: &Cache,
    thread_id: i64,
    author: i64,
    forum_name: &str,
    link: &str,
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.user_id, u.email FROM subscriptions s
         JOIN users u ON u.id = s.user_id
         WHERE s.thread_id = ?1 AND s.post_seen = ?2 AND s.user_id != ?3",
    )?;
    let subscribers = stmt
        .query_map(params![thread_id, Subscription::POST_SEEN, author], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if subscribers.is_empty() {
        return Ok(0);
    }

    let template = content::find(conn, EMAIL_SUBSCRIPTION)?;
    let mut queued = 0;
    for (subscription_id, user_id, email) in subscribers {
        conn.execute(
            "UPDATE subscriptions SET post_seen = ?1 WHERE id = ?2",
            params![Subscription::POST_NEW, subscription_id],
        )?;
        cache.delete_element(CACHE_KEY, &user_id.to_string());

        let (Some(template), Some(email)) = (&template, email.filter(|e| !e.is_empty())) else {
            tracing::warn!("Skipping subscription notice for user #{}", user_id);
            continue;
        };
        let filled = content::fill(template, forum_name, link);
        if mail::queue(conn, &email, &filled.topic, &filled.content, Some(user_id)) {
            queued += 1;
        }
    }
    Ok(queued)
}

pub fn exists(conn: &Connection, user_id: i64, thread_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM subscriptions WHERE user_id = ?1 AND thread_id = ?2",
        params![user_id, thread_id],
        |row| row.get(0),
    )
}

/// Subscribes the user with the thread already seen. `false` when the
/// subscription existed.
pub fn add(conn: &Connection, user_id: i64, thread_id: i64) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO subscriptions (user_id, thread_id, post_seen) VALUES (?1, ?2, ?3)",
        params![user_id, thread_id, Subscription::POST_SEEN],
    )?;
    Ok(inserted > 0)
}

/// Removes the user's own subscriptions among `ids`.
pub fn remove(
    conn: &Connection,
    cache: &Cache,
    user_id: i64,
    ids: &[i64],
) -> rusqlite::Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "DELETE FROM subscriptions WHERE id IN ({}) AND user_id = ?{}",
        placeholders(ids.len()),
        ids.len() + 1
    );
    let values = ids.iter().copied().chain(std::iter::once(user_id));
    let removed = conn.execute(&sql, params_from_iter(values))?;
    cache.delete_element(CACHE_KEY, &user_id.to_string());
    Ok(removed)
}

/// Marks one of the user's subscriptions as seen or unseen.
pub fn mark(
    conn: &Connection,
    cache: &Cache,
    user_id: i64,
    subscription_id: i64,
    seen: bool,
) -> rusqlite::Result<bool> {
    let status = if seen {
        Subscription::POST_SEEN
    } else {
        Subscription::POST_NEW
    };
    let changed = conn.execute(
        "UPDATE subscriptions SET post_seen = ?1 WHERE id = ?2 AND user_id = ?3",
        params![status, subscription_id, user_id],
    )?;
    cache.delete_element(CACHE_KEY, &user_id.to_string());
    Ok(changed > 0)
}

/// Flips the user's subscription of the thread back to seen.
pub fn mark_thread_seen(
    conn: &Connection,
    cache: &Cache,
    user_id: i64,
    thread_id: i64,
) -> rusqlite::Result<()> {
    let changed = conn.execute(
        "UPDATE subscriptions SET post_seen = ?1
         WHERE user_id = ?2 AND thread_id = ?3 AND post_seen = ?4",
        params![
            Subscription::POST_SEEN,
            user_id,
            thread_id,
            Subscription::POST_NEW
        ],
    )?;
    if changed > 0 {
        cache.delete_element(CACHE_KEY, &user_id.to_string());
    }
    Ok(())
}

/// The user's subscriptions, unseen first.
pub fn list(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<SubscriptionView>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.thread_id, t.name, s.post_seen FROM subscriptions s
         JOIN threads t ON t.id = s.thread_id
         WHERE s.user_id = ?1
         ORDER BY s.post_seen ASC, s.id DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok(SubscriptionView {
                id: row.get(0)?,
                thread_id: row.get(1)?,
                thread_name: row.get(2)?,
                post_seen: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Number of subscribed threads with unseen posts, cached per user.
pub fn unseen_count(conn: &Connection, cache: &Cache, user_id: i64) -> rusqlite::Result<i64> {
    let element = user_id.to_string();
    if let Some(count) = cache.get_element_as::<i64>(CACHE_KEY, &element) {
        return Ok(count);
    }
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?1 AND post_seen = ?2",
        params![user_id, Subscription::POST_NEW],
        |row| row.get(0),
    )?;
    cache.set_element_from(CACHE_KEY, &element, &count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::pool_with_schema;
    use crate::forum::testing::{member, seed_board};

    #[test]
    fn notify_skips_author_and_already_flagged() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        let b = seed_board(&conn);
        let reader = member(&conn, "reader");

        add(&conn, b.author_id, b.thread_id).unwrap();
        add(&conn, reader, b.thread_id).unwrap();

        let queued = notify(&conn, &cache, b.thread_id, b.author_id, "Agora", "http://x/last/1").unwrap();
        assert_eq!(queued, 1);
        assert_eq!(unseen_count(&conn, &cache, reader).unwrap(), 1);
        assert_eq!(unseen_count(&conn, &cache, b.author_id).unwrap(), 0);

        // still unseen, no second e-mail
        let again = notify(&conn, &cache, b.thread_id, b.author_id, "Agora", "http://x/last/1").unwrap();
        assert_eq!(again, 0);
        assert_eq!(mail::pending(&conn).unwrap(), 1);
    }

    #[test]
    fn notify_without_address_still_flags_subscription() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        let b = seed_board(&conn);
        let silent = crate::auth::password::create_user(&conn, "silent", None, "password1").unwrap();
        add(&conn, silent, b.thread_id).unwrap();

        let queued = notify(&conn, &cache, b.thread_id, b.author_id, "Agora", "link").unwrap();
        assert_eq!(queued, 0);
        assert_eq!(unseen_count(&conn, &cache, silent).unwrap(), 1);
    }

    #[test]
    fn add_is_unique_per_thread() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let b = seed_board(&conn);
        assert!(add(&conn, b.author_id, b.thread_id).unwrap());
        assert!(!add(&conn, b.author_id, b.thread_id).unwrap());
        assert!(exists(&conn, b.author_id, b.thread_id).unwrap());
    }

    #[test]
    fn remove_only_touches_own_rows() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        let b = seed_board(&conn);
        let other = member(&conn, "other");
        add(&conn, b.author_id, b.thread_id).unwrap();
        add(&conn, other, b.thread_id).unwrap();
        let ids: Vec<i64> = list(&conn, other).unwrap().iter().map(|s| s.id).collect();

        assert_eq!(remove(&conn, &cache, b.author_id, &ids).unwrap(), 0);
        assert_eq!(remove(&conn, &cache, other, &ids).unwrap(), 1);
        assert!(exists(&conn, b.author_id, b.thread_id).unwrap());
        assert_eq!(remove(&conn, &cache, other, &[]).unwrap(), 0);
    }

    #[test]
    fn mark_toggles_and_refreshes_count() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        let b = seed_board(&conn);
        add(&conn, b.author_id, b.thread_id).unwrap();
        let id = list(&conn, b.author_id).unwrap()[0].id;

        assert_eq!(unseen_count(&conn, &cache, b.author_id).unwrap(), 0);
        assert!(mark(&conn, &cache, b.author_id, id, false).unwrap());
        assert_eq!(unseen_count(&conn, &cache, b.author_id).unwrap(), 1);
        mark_thread_seen(&conn, &cache, b.author_id, b.thread_id).unwrap();
        assert_eq!(unseen_count(&conn, &cache, b.author_id).unwrap(), 0);
    }
}
