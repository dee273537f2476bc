//! Private messages between members, and post complaints routed to
//! moderators through the same mailboxes.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::cache::Cache;
use crate::db::models::{Message, Post};
use crate::db::{in_transaction, unix_now};
use crate::forum::{members, moderation, settle, ForumError, ForumResult};
use crate::sanitize::{self, Profile};
use crate::sessions::SessionStore;

pub const MAX_RECEIVERS: usize = 10;
pub const MAX_TOPIC_CHARS: usize = 255;

/// Messages a member may send from one session within the window.
pub const SPAM_MESSAGES: usize = 10;
pub const SPAM_WINDOW_SECS: i64 = 60;

const CACHE_KEY: &str = "user.newmessages";

#[derive(Debug, Clone)]
pub struct MessageDraft {
    topic: String,
    content: String,
    receivers: Vec<i64>,
    replyto: Option<i64>,
}

impl MessageDraft {
    pub fn new(topic: &str, content: &str, receivers: Vec<i64>) -> ForumResult<Self> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ForumError::Invalid("Topic cannot be blank.".into()));
        }
        if topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(ForumError::Invalid(format!(
                "Topic must not be longer than {} characters.",
                MAX_TOPIC_CHARS
            )));
        }
        let content = sanitize::clean(content.trim(), Profile::Default);
        if content.trim().is_empty() {
            return Err(ForumError::Invalid("Message cannot be blank.".into()));
        }

        let mut receivers = receivers;
        receivers.sort_unstable();
        receivers.dedup();
        if receivers.is_empty() {
            return Err(ForumError::Invalid("Select at least one receiver.".into()));
        }
        if receivers.len() > MAX_RECEIVERS {
            return Err(ForumError::Invalid(format!(
                "You can send a message to at most {} receivers.",
                MAX_RECEIVERS
            )));
        }

        Ok(Self {
            topic: topic.to_string(),
            content,
            receivers,
            replyto: None,
        })
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.replyto = Some(message_id);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    /// Id of the receiver row, used to read or remove the copy.
    pub id: i64,
    pub message_id: i64,
    pub topic: String,
    pub sender: String,
    pub status: i64,
    pub created_at: i64,
}

impl InboxEntry {
    pub fn is_new(&self) -> bool {
        self.status == Message::STATUS_NEW
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub message: Message,
    pub sender: String,
    /// Set when the viewer reads it as a receiver.
    pub receiver_row: Option<i64>,
}

/// Checks the session's send window. Sends older than the window are
/// forgotten.
pub fn too_many(store: &mut SessionStore, sid: &str, user_id: i64, now: i64) -> bool {
    let key = spam_key(user_id);
    let mut sent: Vec<i64> = store.get_as(sid, &key).unwrap_or_default();
    sent.retain(|stamp| now - stamp < SPAM_WINDOW_SECS);
    let blocked = sent.len() >= SPAM_MESSAGES;
    store.set_from(sid, &key, &sent);
    blocked
}

pub fn record_sent(store: &mut SessionStore, sid: &str, user_id: i64, now: i64) {
    let key = spam_key(user_id);
    let mut sent: Vec<i64> = store.get_as(sid, &key).unwrap_or_default();
    sent.push(now);
    store.set_from(sid, &key, &sent);
}

fn spam_key(user_id: i64) -> String {
    format!("messages.{}", user_id)
}

/// Stores the message with one receiver row per active receiver.
/// Inactive receivers are skipped; the message fails when none is left.
pub fn send(
    conn: &Connection,
    cache: &Cache,
    sender: i64,
    draft: &MessageDraft,
) -> ForumResult<Option<i64>> {
    if draft.receivers.contains(&sender) {
        return Err(ForumError::Invalid("You can not send a message to yourself.".into()));
    }

    let outcome = in_transaction(conn, |tx| -> ForumResult<(i64, Vec<i64>)> {
        let now = unix_now();
        tx.execute(
            "INSERT INTO messages (sender_id, topic, content, replyto, sender_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![sender, draft.topic, draft.content, draft.replyto, Message::STATUS_READ, now],
        )?;
        let message_id = tx.last_insert_rowid();

        let mut delivered = Vec::with_capacity(draft.receivers.len());
        for receiver in &draft.receivers {
            let active = members::find(tx, *receiver)?.is_some_and(|user| user.is_active());
            if !active {
                tracing::warn!("Skipping inactive receiver #{} of message #{}", receiver, message_id);
                continue;
            }
            insert_receiver(tx, message_id, *receiver, now)?;
            delivered.push(*receiver);
        }
        if delivered.is_empty() {
            return Err(ForumError::Invalid("None of the receivers can receive messages.".into()));
        }
        Ok((message_id, delivered))
    });

    let Some((message_id, delivered)) = settle("Message sending", outcome)? else {
        return Ok(None);
    };
    for receiver in &delivered {
        cache.delete_element(CACHE_KEY, &receiver.to_string());
    }
    tracing::info!(
        "Message #{} sent by user #{} to {} receiver(s)",
        message_id,
        sender,
        delivered.len()
    );
    Ok(Some(message_id))
}

/// Sends a complaint about `post` to everyone moderating its forum,
/// except the reporter.
pub fn report(
    conn: &Connection,
    cache: &Cache,
    reporter: i64,
    post: &Post,
    complaint: &str,
) -> ForumResult<bool> {
    let complaint = sanitize::clean(complaint.trim(), Profile::Default);
    if complaint.trim().is_empty() {
        return Err(ForumError::Invalid("Complaint cannot be blank.".into()));
    }
    let topic = format!("Complaint about the post #{}", post.id);
    let content = format!(
        "{}<hr><a href=\"/show/{}\">Direct link to this post</a><hr><p>Post contents</p><blockquote>{}</blockquote>",
        complaint, post.id, post.content
    );

    let outcome = in_transaction(conn, |tx| -> ForumResult<Vec<i64>> {
        let receivers: Vec<i64> = moderation::moderators_of(tx, post.forum_id)?
            .into_iter()
            .filter(|id| *id != reporter)
            .collect();
        if receivers.is_empty() {
            return Err(ForumError::Invalid("No one can receive this report.".into()));
        }

        let now = unix_now();
        tx.execute(
            "INSERT INTO messages (sender_id, topic, content, sender_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![reporter, topic, content, Message::STATUS_DELETED, now],
        )?;
        let message_id = tx.last_insert_rowid();
        for receiver in &receivers {
            insert_receiver(tx, message_id, *receiver, now)?;
        }
        Ok(receivers)
    });

    let Some(receivers) = settle("Post report", outcome)? else {
        return Ok(false);
    };
    cache.delete(CACHE_KEY);
    tracing::info!(
        "Post #{} reported by user #{} to {} moderator(s)",
        post.id,
        reporter,
        receivers.len()
    );
    Ok(true)
}

fn insert_receiver(
    conn: &Connection,
    message_id: i64,
    receiver: i64,
    now: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO message_receivers (message_id, receiver_id, receiver_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![message_id, receiver, Message::STATUS_NEW, now],
    )?;
    Ok(())
}

/// Removes the sender's copy. The message itself goes once no receiver
/// keeps a copy either.
pub fn remove_sent(conn: &Connection, sender: i64, message_id: i64) -> ForumResult<bool> {
    let outcome = in_transaction(conn, |tx| -> ForumResult<()> {
        let owned: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM messages WHERE id = ?1 AND sender_id = ?2",
            params![message_id, sender],
            |row| row.get(0),
        )?;
        if !owned {
            return Err(ForumError::NotFound("Message"));
        }
        tx.execute(
            "UPDATE messages SET sender_status = ?1, updated_at = ?2 WHERE id = ?3",
            params![Message::STATUS_DELETED, unix_now(), message_id],
        )?;
        purge_if_abandoned(tx, message_id)?;
        Ok(())
    });

    Ok(settle("Message removal", outcome)?.is_some())
}

/// Removes a receiver's copy, and the message once nobody keeps it.
pub fn remove_received(
    conn: &Connection,
    cache: &Cache,
    receiver: i64,
    receiver_row: i64,
) -> ForumResult<bool> {
    let outcome = in_transaction(conn, |tx| -> ForumResult<()> {
        let message_id: Option<i64> = tx
            .query_row(
                "SELECT message_id FROM message_receivers WHERE id = ?1 AND receiver_id = ?2",
                params![receiver_row, receiver],
                |row| row.get(0),
            )
            .optional()?;
        let Some(message_id) = message_id else {
            return Err(ForumError::NotFound("Message"));
        };
        tx.execute(
            "UPDATE message_receivers SET receiver_status = ?1, updated_at = ?2 WHERE id = ?3",
            params![Message::STATUS_DELETED, unix_now(), receiver_row],
        )?;
        purge_if_abandoned(tx, message_id)?;
        Ok(())
    });

    let removed = settle("Message removal", outcome)?.is_some();
    if removed {
        cache.delete_element(CACHE_KEY, &receiver.to_string());
    }
    Ok(removed)
}

fn purge_if_abandoned(conn: &Connection, message_id: i64) -> rusqlite::Result<()> {
    let kept: bool = conn.query_row(
        "SELECT (SELECT sender_status FROM messages WHERE id = ?1) != ?2
             OR EXISTS (SELECT 1 FROM message_receivers WHERE message_id = ?1 AND receiver_status != ?2)",
        params![message_id, Message::STATUS_DELETED],
        |row| row.get(0),
    )?;
    if !kept {
        conn.execute("DELETE FROM messages WHERE id = ?1", params![message_id])?;
    }
    Ok(())
}

/// Marks a received copy as read.
pub fn mark_read(
    conn: &Connection,
    cache: &Cache,
    receiver: i64,
    receiver_row: i64,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE message_receivers SET receiver_status = ?1, updated_at = ?2
         WHERE id = ?3 AND receiver_id = ?4 AND receiver_status = ?5",
        params![
            Message::STATUS_READ,
            unix_now(),
            receiver_row,
            receiver,
            Message::STATUS_NEW
        ],
    )?;
    if changed > 0 {
        cache.delete_element(CACHE_KEY, &receiver.to_string());
    }
    Ok(changed > 0)
}

pub fn inbox(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<InboxEntry>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, m.id, m.topic, u.username, r.receiver_status, m.created_at
         FROM message_receivers r
         JOIN messages m ON m.id = r.message_id
         JOIN users u ON u.id = m.sender_id
         WHERE r.receiver_id = ?1 AND r.receiver_status != ?2
         ORDER BY r.id DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id, Message::STATUS_DELETED], |row| {
            Ok(InboxEntry {
                id: row.get(0)?,
                message_id: row.get(1)?,
                topic: row.get(2)?,
                sender: row.get(3)?,
                status: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn sent(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM messages WHERE sender_id = ?1 AND sender_status != ?2 ORDER BY id DESC",
        Message::COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![user_id, Message::STATUS_DELETED], Message::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A message the viewer still holds a copy of, as sender or receiver.
pub fn view(conn: &Connection, viewer: i64, message_id: i64) -> rusqlite::Result<Option<MessageView>> {
    let found = conn
        .query_row(
            "SELECT m.id, m.sender_id, m.topic, m.content, m.replyto, m.sender_status, m.created_at,
                    u.username
             FROM messages m JOIN users u ON u.id = m.sender_id
             WHERE m.id = ?1",
            params![message_id],
            |row| Ok((Message::from_row(row)?, row.get::<_, String>(7)?)),
        )
        .optional()?;
    let Some((message, sender)) = found else {
        return Ok(None);
    };

    let receiver_row: Option<i64> = conn
        .query_row(
            "SELECT id FROM message_receivers
             WHERE message_id = ?1 AND receiver_id = ?2 AND receiver_status != ?3",
            params![message_id, viewer, Message::STATUS_DELETED],
            |row| row.get(0),
        )
        .optional()?;
    let sender_copy = message.sender_id == viewer && message.sender_status != Message::STATUS_DELETED;
    if receiver_row.is_none() && !sender_copy {
        return Ok(None);
    }
    Ok(Some(MessageView {
        message,
        sender,
        receiver_row,
    }))
}

/// Unread received messages, cached per user.
pub fn new_count(conn: &Connection, cache: &Cache, user_id: i64) -> rusqlite::Result<i64> {
    let element = user_id.to_string();
    if let Some(count) = cache.get_element_as::<i64>(CACHE_KEY, &element) {
        return Ok(count);
    }
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM message_receivers WHERE receiver_id = ?1 AND receiver_status = ?2",
        params![user_id, Message::STATUS_NEW],
        |row| row.get(0),
    )?;
    cache.set_element_from(CACHE_KEY, &element, &count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::pool_with_schema;
    use crate::forum::board;
    use crate::forum::testing::{member, seed_board};
    use crate::rbac;

    fn draft(receivers: Vec<i64>) -> MessageDraft {
        MessageDraft::new("Hello", "<p>How are you?</p>", receivers).unwrap()
    }

    #[test]
    fn drafts_are_validated() {
        assert!(MessageDraft::new(" ", "body", vec![1]).is_err());
        assert!(MessageDraft::new("Topic", "<script>x</script>", vec![1]).is_err());
        assert!(MessageDraft::new("Topic", "body", vec![]).is_err());
        assert!(MessageDraft::new("Topic", "body", (1..=11).collect()).is_err());
        let deduped = MessageDraft::new("Topic", "body", vec![2, 2, 3]).unwrap();
        assert_eq!(deduped.receivers, vec![2, 3]);
    }

    #[test]
    fn send_delivers_to_every_receiver() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        let b = seed_board(&conn);
        let anna = member(&conn, "anna");
        let ben = member(&conn, "ben");

        let id = send(&conn, &cache, b.author_id, &draft(vec![anna, ben])).unwrap().unwrap();

        assert_eq!(new_count(&conn, &cache, anna).unwrap(), 1);
        assert_eq!(inbox(&conn, ben).unwrap()[0].message_id, id);
        assert_eq!(sent(&conn, b.author_id).unwrap().len(), 1);
    }

    #[test]
    fn inactive_receivers_are_skipped_unless_alone() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        let b = seed_board(&conn);
        let anna = member(&conn, "anna");
        let banned = member(&conn, "banned");
        conn.execute("UPDATE users SET status = 20 WHERE id = ?1", [banned]).unwrap();

        assert!(send(&conn, &cache, b.author_id, &draft(vec![anna, banned])).unwrap().is_some());
        assert_eq!(inbox(&conn, anna).unwrap().len(), 1);
        assert!(inbox(&conn, banned).unwrap().is_empty());

        assert!(send(&conn, &cache, b.author_id, &draft(vec![banned])).unwrap().is_none());
        assert_eq!(sent(&conn, b.author_id).unwrap().len(), 1);
        assert!(send(&conn, &cache, anna, &draft(vec![anna])).is_err());
    }

    #[test]
    fn spam_window_blocks_the_eleventh_message() {
        let mut store = SessionStore::new();
        for i in 0..SPAM_MESSAGES as i64 {
            assert!(!too_many(&mut store, "sid", 1, 1000 + i));
            record_sent(&mut store, "sid", 1, 1000 + i);
        }
        assert!(too_many(&mut store, "sid", 1, 1010));
        assert!(!too_many(&mut store, "other", 1, 1010));
        assert!(!too_many(&mut store, "sid", 1, 1000 + SPAM_WINDOW_SECS + 10));
    }

    #[test]
    fn messages_disappear_when_both_sides_remove_them() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        let b = seed_board(&conn);
        let anna = member(&conn, "anna");
        let id = send(&conn, &cache, b.author_id, &draft(vec![anna])).unwrap().unwrap();
        let row = inbox(&conn, anna).unwrap()[0].id;

        assert!(mark_read(&conn, &cache, anna, row).unwrap());
        assert!(!mark_read(&conn, &cache, anna, row).unwrap());
        assert_eq!(new_count(&conn, &cache, anna).unwrap(), 0);

        assert!(remove_sent(&conn, b.author_id, id).unwrap());
        assert!(view(&conn, b.author_id, id).unwrap().is_none());
        assert!(view(&conn, anna, id).unwrap().is_some());

        assert!(remove_received(&conn, &cache, anna, row).unwrap());
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))
            .unwrap();
        assert_eq!(left, 0);
        assert!(!remove_sent(&conn, b.author_id, id).unwrap());
    }

    #[test]
    fn reports_reach_moderators_but_not_the_reporter() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        let b = seed_board(&conn);
        let moderator = member(&conn, "moderator");
        moderation::add_moderator(&conn, b.forum_id, moderator).unwrap();
        let post = board::post(&conn, b.post_id).unwrap().unwrap();

        assert!(report(&conn, &cache, b.author_id, &post, "Spam link").unwrap());
        let received = inbox(&conn, moderator).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].topic, format!("Complaint about the post #{}", post.id));
        assert!(sent(&conn, b.author_id).unwrap().is_empty());

        // the only moderator reporting leaves nobody to tell
        assert!(!report(&conn, &cache, moderator, &post, "Self report").unwrap());
    }

    #[test]
    fn reports_include_admins() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        let b = seed_board(&conn);
        let admin = member(&conn, "admin");
        rbac::assign(&conn, rbac::ROLE_ADMIN, admin).unwrap();
        let post = board::post(&conn, b.post_id).unwrap().unwrap();

        assert!(report(&conn, &cache, b.author_id, &post, "Off topic").unwrap());
        assert_eq!(new_count(&conn, &cache, admin).unwrap(), 1);
    }
}
