//! Post lifecycle: threads and replies, edits, deletion and votes.
//!
//! Every operation that touches more than one row runs in a single
//! transaction. A failed body is rolled back, logged and reported as
//! `false` (or `None`); word index failures and broken transactions
//! surface as errors.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::time::Duration;

use crate::cache::{Cache, CacheEvent};
use crate::db::models::{Forum, Post, Thread};
use crate::db::{in_transaction, unix_now};
use crate::forum::words::{self, IndexMode};
use crate::forum::{board, settle, slugify, subscriptions, ForumError, ForumResult};
use crate::sanitize::{self, Profile};
use crate::settings;

pub const MIN_CONTENT_CHARS: usize = 10;
pub const MAX_TOPIC_CHARS: usize = 255;

/// Votes a member may cast per window.
pub const VOTE_LIMIT: i64 = 10;
const VOTE_WINDOW: Duration = Duration::from_secs(3600);

/// Validated input for a new post, a reply or an edit.
#[derive(Debug, Clone)]
pub struct PostDraft {
    content: String,
    topic: Option<String>,
    subscribe: bool,
}

impl PostDraft {
    /// Cleans the body and checks its length.
    pub fn new(raw: &str) -> ForumResult<Self> {
        let content = sanitize::clean(raw.trim(), Profile::Full);
        if content.trim().chars().count() < MIN_CONTENT_CHARS {
            return Err(ForumError::Invalid(format!(
                "Post must contain at least {} characters.",
                MIN_CONTENT_CHARS
            )));
        }
        Ok(Self {
            content,
            topic: None,
            subscribe: false,
        })
    }

    pub fn with_topic(mut self, raw: &str) -> ForumResult<Self> {
        let topic = raw.trim();
        if topic.is_empty() {
            return Err(ForumError::Invalid("Topic cannot be blank.".into()));
        }
        if topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(ForumError::Invalid(format!(
                "Topic must not be longer than {} characters.",
                MAX_TOPIC_CHARS
            )));
        }
        self.topic = Some(topic.to_string());
        Ok(self)
    }

    pub fn subscribe(mut self, subscribe: bool) -> Self {
        self.subscribe = subscribe;
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }
}

pub struct PostManager<'a> {
    conn: &'a Connection,
    cache: &'a Cache,
    base_url: &'a str,
}

impl<'a> PostManager<'a> {
    /// `base_url` prefixes the links in notification e-mails.
    pub fn new(conn: &'a Connection, cache: &'a Cache, base_url: &'a str) -> Self {
        Self {
            conn,
            cache,
            base_url,
        }
    }

    /// Opens a thread with its first post. Returns the new thread id.
    pub fn create_thread(
        &self,
        forum: &Forum,
        author: i64,
        draft: &PostDraft,
    ) -> ForumResult<Option<i64>> {
        let Some(name) = draft.topic() else {
            return Err(ForumError::Invalid("Topic cannot be blank.".into()));
        };

        let outcome = in_transaction(self.conn, |tx| -> ForumResult<i64> {
            let now = unix_now();
            tx.execute(
                "INSERT INTO threads (name, slug, category_id, forum_id, author_id, posts,
                                      new_post_at, edited_post_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6, ?6, ?6)",
                params![name, slugify(name), forum.category_id, forum.id, author, now],
            )?;
            let thread_id = tx.last_insert_rowid();

            let post_id = insert_post(tx, thread_id, forum.id, author, &draft.content, now)?;
            words::index_post(tx, post_id, &draft.content, IndexMode::Create)?;
            tx.execute(
                "UPDATE forums SET threads = threads + 1, posts = posts + 1 WHERE id = ?1",
                params![forum.id],
            )?;

            let post = load(tx, post_id)?;
            mark_seen(tx, self.cache, author, &post, true)?;
            if draft.subscribe {
                subscriptions::add(tx, author, thread_id)?;
            }
            Ok(thread_id)
        });

        let Some(thread_id) = settle("Thread creation", outcome)? else {
            return Ok(None);
        };
        self.cache.clear_after(CacheEvent::NewThread);
        tracing::info!("Thread #{} created in forum #{}", thread_id, forum.id);
        Ok(Some(thread_id))
    }

    /// Adds a reply. When merging is enabled and the thread's last post
    /// belongs to the same author, the reply is appended to that post
    /// instead and no counters move.
    pub fn create_post(&self, thread: &Thread, author: i64, draft: &PostDraft) -> ForumResult<bool> {
        let merge = settings::get_flag(self.conn, settings::MERGE_POSTS)?;
        let forum_name = settings::get(self.conn, settings::NAME)?.unwrap_or_default();
        let link = format!("{}/last/{}", self.base_url.trim_end_matches('/'), thread.id);

        let outcome = in_transaction(self.conn, |tx| -> ForumResult<i64> {
            let now = unix_now();
            let previous = last_post(tx, thread.id)?;
            let follows_other = previous.as_ref().map_or(true, |p| p.author_id != author);

            let (post_id, count_view) = match previous {
                Some(previous) if merge && previous.author_id == author => {
                    let merged = format!("{}<hr>{}", previous.content, draft.content);
                    tx.execute(
                        "UPDATE posts SET content = ?1, edited = 1, edited_at = ?2, updated_at = ?2
                         WHERE id = ?3",
                        params![merged, now, previous.id],
                    )?;
                    words::index_post(tx, previous.id, &merged, IndexMode::Edit)?;
                    tx.execute(
                        "UPDATE threads SET edited_post_at = ?1, updated_at = ?1 WHERE id = ?2",
                        params![now, thread.id],
                    )?;
                    (previous.id, false)
                }
                _ => {
                    let id = insert_post(tx, thread.id, thread.forum_id, author, &draft.content, now)?;
                    words::index_post(tx, id, &draft.content, IndexMode::Create)?;
                    tx.execute(
                        "UPDATE forums SET posts = posts + 1 WHERE id = ?1",
                        params![thread.forum_id],
                    )?;
                    tx.execute(
                        "UPDATE threads SET posts = posts + 1, new_post_at = ?1, edited_post_at = ?1,
                                            updated_at = ?1
                         WHERE id = ?2",
                        params![now, thread.id],
                    )?;
                    (id, follows_other)
                }
            };

            let post = load(tx, post_id)?;
            mark_seen(tx, self.cache, author, &post, count_view)?;
            subscriptions::notify(tx, self.cache, thread.id, author, &forum_name, &link)?;
            if draft.subscribe {
                subscriptions::add(tx, author, thread.id)?;
            }
            Ok(post_id)
        });

        let Some(post_id) = settle("Post creation", outcome)? else {
            return Ok(false);
        };
        self.cache.clear_after(CacheEvent::NewPost);
        tracing::info!("Post #{} saved in thread #{}", post_id, thread.id);
        Ok(true)
    }

    /// Replaces the body. A topic on the draft renames the thread when
    /// the post opens it.
    pub fn edit_post(&self, post: &Post, editor: i64, draft: &PostDraft) -> ForumResult<bool> {
        let outcome = in_transaction(self.conn, |tx| -> ForumResult<i64> {
            let now = unix_now();
            let changed = tx.execute(
                "UPDATE posts SET content = ?1, edited = 1, edited_at = ?2, updated_at = ?2
                 WHERE id = ?3",
                params![draft.content, now, post.id],
            )?;
            if changed == 0 {
                return Err(ForumError::NotFound("Post"));
            }
            words::index_post(tx, post.id, &draft.content, IndexMode::Edit)?;

            if let Some(topic) = draft.topic() {
                if board::first_post_id(tx, post.thread_id)? == Some(post.id) {
                    tx.execute(
                        "UPDATE threads SET name = ?1, slug = ?2, updated_at = ?3 WHERE id = ?4",
                        params![topic, slugify(topic), now, post.thread_id],
                    )?;
                }
            }
            tx.execute(
                "UPDATE threads SET edited_post_at = ?1 WHERE id = ?2",
                params![now, post.thread_id],
            )?;

            let updated = load(tx, post.id)?;
            mark_seen(tx, self.cache, editor, &updated, true)?;
            Ok(post.id)
        });

        let Some(post_id) = settle("Post edit", outcome)? else {
            return Ok(false);
        };
        tracing::info!("Post #{} edited by user #{}", post_id, editor);
        Ok(true)
    }

    /// Deletes the post. The thread goes with its last post.
    pub fn delete_post(&self, post: &Post) -> ForumResult<bool> {
        let outcome = in_transaction(self.conn, |tx| -> ForumResult<i64> {
            let deleted = tx.execute("DELETE FROM posts WHERE id = ?1", params![post.id])?;
            if deleted == 0 {
                return Err(ForumError::NotFound("Post"));
            }

            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM posts WHERE thread_id = ?1",
                params![post.thread_id],
                |row| row.get(0),
            )?;
            if remaining > 0 {
                tx.execute(
                    "UPDATE threads SET posts = posts - 1 WHERE id = ?1",
                    params![post.thread_id],
                )?;
                tx.execute(
                    "UPDATE forums SET posts = posts - 1 WHERE id = ?1",
                    params![post.forum_id],
                )?;
            } else {
                tx.execute("DELETE FROM threads WHERE id = ?1", params![post.thread_id])?;
                tx.execute(
                    "UPDATE forums SET posts = posts - 1, threads = threads - 1 WHERE id = ?1",
                    params![post.forum_id],
                )?;
            }
            Ok(remaining)
        });

        let Some(remaining) = settle("Post deletion", outcome)? else {
            return Ok(false);
        };
        self.cache.clear_after(CacheEvent::PostDelete);
        if remaining == 0 {
            tracing::info!("Post #{} deleted with its thread #{}", post.id, post.thread_id);
        } else {
            tracing::info!("Post #{} deleted", post.id);
        }
        Ok(true)
    }

    /// Records a vote. Voting the same way twice changes nothing; voting
    /// the other way moves the vote between counters.
    pub fn thumb(&self, post: &Post, user_id: i64, up: bool) -> ForumResult<bool> {
        if post.author_id == user_id {
            return Err(ForumError::Invalid("You can not vote for your own post.".into()));
        }
        if self.votes_cast(user_id) >= VOTE_LIMIT {
            return Err(ForumError::Invalid(
                "You have reached the vote limit, try again in an hour.".into(),
            ));
        }
        let vote: i64 = if up { 1 } else { -1 };

        let outcome = in_transaction(self.conn, |tx| -> ForumResult<i64> {
            let now = unix_now();
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT thumb FROM post_thumbs WHERE user_id = ?1 AND post_id = ?2",
                    params![user_id, post.id],
                    |row| row.get(0),
                )
                .optional()?;

            let (likes, dislikes) = match existing {
                Some(previous) if previous == vote => return Ok(post.id),
                Some(_) => {
                    tx.execute(
                        "UPDATE post_thumbs SET thumb = ?1, updated_at = ?2
                         WHERE user_id = ?3 AND post_id = ?4",
                        params![vote, now, user_id, post.id],
                    )?;
                    (vote, -vote)
                }
                None => {
                    tx.execute(
                        "INSERT INTO post_thumbs (user_id, post_id, thumb, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?4)",
                        params![user_id, post.id, vote, now],
                    )?;
                    if up {
                        (1, 0)
                    } else {
                        (0, 1)
                    }
                }
            };
            tx.execute(
                "UPDATE posts SET likes = likes + ?1, dislikes = dislikes + ?2 WHERE id = ?3",
                params![likes, dislikes, post.id],
            )?;
            Ok(post.id)
        });

        if settle("Post vote", outcome)?.is_none() {
            return Ok(false);
        }
        self.count_vote(user_id);
        Ok(true)
    }

    /// Votes the user cast within the current window.
    pub fn votes_cast(&self, user_id: i64) -> i64 {
        self.cache
            .get_element_as::<i64>(&votes_key(user_id), "count")
            .unwrap_or(0)
    }

    fn count_vote(&self, user_id: i64) {
        let key = votes_key(user_id);
        match self.cache.get_element_as::<i64>(&key, "count") {
            Some(count) => self.cache.set_element(&key, "count", json!(count + 1)),
            None => self
                .cache
                .set_with_ttl(&key, json!({ "count": 1 }), VOTE_WINDOW),
        }
    }
}

fn votes_key(user_id: i64) -> String {
    format!("user.votes.{}", user_id)
}

fn insert_post(
    conn: &Connection,
    thread_id: i64,
    forum_id: i64,
    author: i64,
    content: &str,
    now: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO posts (content, thread_id, forum_id, author_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![content, thread_id, forum_id, author, now],
    )?;
    Ok(conn.last_insert_rowid())
}

fn load(conn: &Connection, post_id: i64) -> ForumResult<Post> {
    board::post(conn, post_id)?.ok_or(ForumError::NotFound("Post"))
}

fn last_post(conn: &Connection, thread_id: i64) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM posts WHERE thread_id = ?1 ORDER BY id DESC LIMIT 1",
            Post::COLUMNS
        ),
        params![thread_id],
        Post::from_row,
    )
    .optional()
}

/// Records that the user has seen the post.
///
/// Advances the user's view markers for the thread, counts a thread view
/// when `count_view` is set and something new was seen, and flips the
/// user's subscription of the thread back to seen.
pub fn mark_seen(
    conn: &Connection,
    cache: &Cache,
    user_id: i64,
    post: &Post,
    count_view: bool,
) -> rusqlite::Result<()> {
    let edited_at = post.edited_at.unwrap_or(post.created_at).max(post.created_at);
    let view: Option<(i64, i64, i64)> = conn
        .query_row(
            "SELECT id, new_last_seen, edited_last_seen FROM thread_views
             WHERE user_id = ?1 AND thread_id = ?2",
            params![user_id, post.thread_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let advanced = match view {
        None => {
            conn.execute(
                "INSERT INTO thread_views (user_id, thread_id, new_last_seen, edited_last_seen)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, post.thread_id, post.created_at, edited_at],
            )?;
            true
        }
        Some((id, new_seen, edited_seen)) => {
            let next_new = new_seen.max(post.created_at);
            let next_edited = edited_seen.max(edited_at);
            let changed = next_new != new_seen || next_edited != edited_seen;
            if changed {
                conn.execute(
                    "UPDATE thread_views SET new_last_seen = ?1, edited_last_seen = ?2 WHERE id = ?3",
                    params![next_new, next_edited, id],
                )?;
            }
            changed
        }
    };

    if advanced && count_view {
        conn.execute(
            "UPDATE threads SET views = views + 1 WHERE id = ?1",
            params![post.thread_id],
        )?;
    }
    subscriptions::mark_thread_seen(conn, cache, user_id, post.thread_id)
}
