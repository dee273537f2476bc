//! Categories, forums and read access to threads and posts.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::db::models::{Category, Forum, Post, Thread};
use crate::db::unix_now;
use crate::forum::slugify;
use crate::settings;

/// Threads per forum page and posts per thread page.
pub const PAGE_SIZE: i64 = 10;

const LATEST_POSTS_KEY: &str = "forum.latestposts";
const THREADS_COUNT_KEY: &str = "forum.threadscount";
const POSTS_COUNT_KEY: &str = "forum.postscount";

/// A post as rendered on a thread page.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    pub author: String,
    pub likes: i64,
    pub dislikes: i64,
    pub edited: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestPost {
    pub id: i64,
    pub thread_id: i64,
    pub thread_name: String,
    pub author: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub threads: i64,
    pub posts: i64,
}

pub fn categories(conn: &Connection, guest: bool) -> rusqlite::Result<Vec<Category>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM categories WHERE visible = 1 OR ?1 = 0 ORDER BY sort, id",
        Category::COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![guest], Category::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn forums_in(conn: &Connection, category_id: i64, guest: bool) -> rusqlite::Result<Vec<Forum>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM forums WHERE category_id = ?1 AND (visible = 1 OR ?2 = 0) ORDER BY sort, id",
        Forum::COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![category_id, guest], Forum::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Category matching both id and slug, respecting guest visibility.
pub fn category(
    conn: &Connection,
    id: i64,
    slug: &str,
    guest: bool,
) -> rusqlite::Result<Option<Category>> {
    let found = conn
        .query_row(
            &format!("SELECT {} FROM categories WHERE id = ?1 AND slug = ?2", Category::COLUMNS),
            params![id, slug],
            Category::from_row,
        )
        .optional()?;
    Ok(found.filter(|c| c.visible || !guest))
}

/// Forum matching id, slug and category. Guests also need the category
/// to be visible.
pub fn forum(
    conn: &Connection,
    category_id: i64,
    id: i64,
    slug: &str,
    guest: bool,
) -> rusqlite::Result<Option<Forum>> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {} FROM forums WHERE id = ?1 AND slug = ?2 AND category_id = ?3",
                Forum::COLUMNS
            ),
            params![id, slug, category_id],
            Forum::from_row,
        )
        .optional()?;
    let Some(forum) = found.filter(|f| f.visible || !guest) else {
        return Ok(None);
    };
    if guest && !category_visible(conn, category_id)? {
        return Ok(None);
    }
    Ok(Some(forum))
}

pub fn thread_in(
    conn: &Connection,
    category_id: i64,
    forum_id: i64,
    id: i64,
    slug: &str,
    guest: bool,
) -> rusqlite::Result<Option<Thread>> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {} FROM threads WHERE id = ?1 AND slug = ?2 AND forum_id = ?3 AND category_id = ?4",
                Thread::COLUMNS
            ),
            params![id, slug, forum_id, category_id],
            Thread::from_row,
        )
        .optional()?;
    let Some(thread) = found else {
        return Ok(None);
    };
    if guest && !forum_visible(conn, forum_id)? {
        return Ok(None);
    }
    Ok(Some(thread))
}

pub fn thread(conn: &Connection, id: i64) -> rusqlite::Result<Option<Thread>> {
    conn.query_row(
        &format!("SELECT {} FROM threads WHERE id = ?1", Thread::COLUMNS),
        params![id],
        Thread::from_row,
    )
    .optional()
}

pub fn category_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<Category>> {
    conn.query_row(
        &format!("SELECT {} FROM categories WHERE id = ?1", Category::COLUMNS),
        params![id],
        Category::from_row,
    )
    .optional()
}

pub fn forum_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<Forum>> {
    conn.query_row(
        &format!("SELECT {} FROM forums WHERE id = ?1", Forum::COLUMNS),
        params![id],
        Forum::from_row,
    )
    .optional()
}

pub fn post(conn: &Connection, id: i64) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("SELECT {} FROM posts WHERE id = ?1", Post::COLUMNS),
        params![id],
        Post::from_row,
    )
    .optional()
}

/// Whether guests may see the forum and its category.
pub fn forum_visible(conn: &Connection, forum_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM forums f JOIN categories c ON c.id = f.category_id
         WHERE f.id = ?1 AND f.visible = 1 AND c.visible = 1",
        params![forum_id],
        |row| row.get(0),
    )
}

fn category_visible(conn: &Connection, category_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM categories WHERE id = ?1 AND visible = 1",
        params![category_id],
        |row| row.get(0),
    )
}

/// Thread list toggles a reader keeps for the length of a browser session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadFilters {
    /// Threads with posts the reader has not seen.
    pub new: bool,
    /// Threads with edits the reader has not seen.
    pub edit: bool,
    /// Threads with at least the `hot_minimum` number of posts.
    pub hot: bool,
    pub pin: bool,
    pub lock: bool,
}

impl ThreadFilters {
    /// Flips the named filter; `all` clears every filter. Returns false
    /// for names that are not filters.
    pub fn toggle(&mut self, name: &str) -> bool {
        let flag = match name.to_ascii_lowercase().as_str() {
            "all" => {
                *self = Self::default();
                return true;
            }
            "new" => &mut self.new,
            "edit" => &mut self.edit,
            "hot" => &mut self.hot,
            "pin" => &mut self.pin,
            "lock" => &mut self.lock,
            _ => return false,
        };
        *flag = !*flag;
        true
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// WHERE clause on `threads` with its parameters. Guests have no read
    /// markers, so the `new` and `edit` filters do not apply to them.
    fn conditions(&self, forum_id: i64, reader: Option<i64>, hot_minimum: i64) -> (String, Vec<Value>) {
        let mut sql = String::from("forum_id = ?");
        let mut values = vec![Value::Integer(forum_id)];
        if let Some(reader) = reader {
            if self.new {
                sql.push_str(
                    " AND NOT EXISTS (SELECT 1 FROM thread_views v WHERE v.thread_id = threads.id
                       AND v.user_id = ? AND v.new_last_seen >= threads.new_post_at)",
                );
                values.push(Value::Integer(reader));
            }
            if self.edit {
                sql.push_str(
                    " AND NOT EXISTS (SELECT 1 FROM thread_views v WHERE v.thread_id = threads.id
                       AND v.user_id = ? AND v.edited_last_seen >= threads.edited_post_at)",
                );
                values.push(Value::Integer(reader));
            }
        }
        if self.hot {
            sql.push_str(" AND posts >= ?");
            values.push(Value::Integer(hot_minimum));
        }
        if self.pin {
            sql.push_str(" AND pinned = 1");
        }
        if self.lock {
            sql.push_str(" AND locked = 1");
        }
        (sql, values)
    }
}

/// Threads of a forum passing `filters`, pinned first, then by latest post.
pub fn threads_page(
    conn: &Connection,
    forum_id: i64,
    filters: &ThreadFilters,
    reader: Option<i64>,
    page: i64,
) -> rusqlite::Result<Vec<Thread>> {
    let (condition, mut values) = filters.conditions(forum_id, reader, hot_minimum(conn)?);
    values.extend([Value::Integer(PAGE_SIZE), Value::Integer(offset(page))]);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM threads WHERE {}
         ORDER BY pinned DESC, new_post_at DESC, id DESC LIMIT ? OFFSET ?",
        Thread::COLUMNS,
        condition
    ))?;
    let rows = stmt
        .query_map(params_from_iter(values), Thread::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Number of threads passing `filters`.
pub fn count_threads(
    conn: &Connection,
    forum_id: i64,
    filters: &ThreadFilters,
    reader: Option<i64>,
) -> rusqlite::Result<i64> {
    let (condition, values) = filters.conditions(forum_id, reader, hot_minimum(conn)?);
    conn.query_row(
        &format!("SELECT COUNT(*) FROM threads WHERE {}", condition),
        params_from_iter(values),
        |row| row.get(0),
    )
}

fn hot_minimum(conn: &Connection) -> rusqlite::Result<i64> {
    Ok(settings::get(conn, settings::HOT_MINIMUM)?
        .and_then(|value| value.parse().ok())
        .unwrap_or(20))
}

/// A thread with content the reader has not seen.
#[derive(Debug, Clone)]
pub struct UnreadThread {
    pub thread: Thread,
    /// Posts were added since the last visit, not only edited.
    pub has_new_posts: bool,
}

const UNREAD_CONDITION: &str = "NOT EXISTS (SELECT 1 FROM thread_views v
     WHERE v.thread_id = threads.id AND v.user_id = ?1
       AND v.new_last_seen >= threads.new_post_at
       AND v.edited_last_seen >= threads.edited_post_at)";

/// Threads holding new or edited posts the member has not seen, most
/// recently active first.
pub fn unread_threads(conn: &Connection, user_id: i64, page: i64) -> rusqlite::Result<Vec<UnreadThread>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, NOT EXISTS (SELECT 1 FROM thread_views v
                 WHERE v.thread_id = threads.id AND v.user_id = ?1
                   AND v.new_last_seen >= threads.new_post_at)
         FROM threads WHERE {}
         ORDER BY new_post_at DESC, edited_post_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        Thread::COLUMNS,
        UNREAD_CONDITION
    ))?;
    let rows = stmt
        .query_map(params![user_id, PAGE_SIZE, offset(page)], |row| {
            Ok(UnreadThread {
                thread: Thread::from_row(row)?,
                has_new_posts: row.get(Thread::COLUMN_COUNT)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_unread_threads(conn: &Connection, user_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM threads WHERE {}", UNREAD_CONDITION),
        params![user_id],
        |row| row.get(0),
    )
}

/// A post listed on a member's post history.
#[derive(Debug, Clone)]
pub struct AuthoredPost {
    pub id: i64,
    pub content: String,
    pub thread_id: i64,
    pub thread_name: String,
    pub created_at: i64,
}

const AUTHORED_FROM: &str = "FROM posts p
     JOIN threads t ON t.id = p.thread_id
     JOIN forums f ON f.id = p.forum_id
     JOIN categories c ON c.id = f.category_id
     WHERE p.author_id = ?1 AND (?2 = 0 OR (f.visible = 1 AND c.visible = 1))";

/// Posts written by a member, oldest first. Guests only see posts in
/// visible forums.
pub fn posts_by_user(
    conn: &Connection,
    user_id: i64,
    guest: bool,
    page: i64,
) -> rusqlite::Result<Vec<AuthoredPost>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT p.id, p.content, p.thread_id, t.name, p.created_at {}
         ORDER BY p.id LIMIT ?3 OFFSET ?4",
        AUTHORED_FROM
    ))?;
    let rows = stmt
        .query_map(params![user_id, guest, PAGE_SIZE, offset(page)], |row| {
            Ok(AuthoredPost {
                id: row.get(0)?,
                content: row.get(1)?,
                thread_id: row.get(2)?,
                thread_name: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_posts_by_user(conn: &Connection, user_id: i64, guest: bool) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!("SELECT COUNT(*) {}", AUTHORED_FROM),
        params![user_id, guest],
        |row| row.get(0),
    )
}

pub fn posts_page(conn: &Connection, thread_id: i64, page: i64) -> rusqlite::Result<Vec<PostView>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.content, p.author_id, u.username, p.likes, p.dislikes, p.edited, p.created_at
         FROM posts p JOIN users u ON u.id = p.author_id
         WHERE p.thread_id = ?1 ORDER BY p.id LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt
        .query_map(params![thread_id, PAGE_SIZE, offset(page)], |row| {
            Ok(PostView {
                id: row.get(0)?,
                content: row.get(1)?,
                author_id: row.get(2)?,
                author: row.get(3)?,
                likes: row.get(4)?,
                dislikes: row.get(5)?,
                edited: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn offset(page: i64) -> i64 {
    (page.max(1) - 1) * PAGE_SIZE
}

/// Pages needed for `items`; an empty list still has one page.
pub fn page_count(items: i64) -> i64 {
    ((items - 1).max(0) / PAGE_SIZE) + 1
}

/// Page of the thread that holds the post.
pub fn page_of_post(conn: &Connection, post: &Post) -> rusqlite::Result<i64> {
    let before: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE thread_id = ?1 AND id < ?2",
        params![post.thread_id, post.id],
        |row| row.get(0),
    )?;
    Ok(before / PAGE_SIZE + 1)
}

pub fn last_post_id(conn: &Connection, thread_id: i64) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT MAX(id) FROM posts WHERE thread_id = ?1",
        params![thread_id],
        |row| row.get(0),
    )
}

pub fn first_post_id(conn: &Connection, thread_id: i64) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT MIN(id) FROM posts WHERE thread_id = ?1",
        params![thread_id],
        |row| row.get(0),
    )
}

pub fn create_category(conn: &Connection, name: &str, visible: bool) -> rusqlite::Result<i64> {
    let now = unix_now();
    conn.execute(
        "INSERT INTO categories (name, slug, visible, sort, created_at, updated_at)
         VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(sort), -1) + 1 FROM categories), ?4, ?4)",
        params![name, slugify(name), visible, now],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!("Category #{} {} created", id, name);
    Ok(id)
}

pub fn create_forum(
    conn: &Connection,
    category_id: i64,
    name: &str,
    sub: Option<&str>,
    visible: bool,
) -> rusqlite::Result<i64> {
    let now = unix_now();
    conn.execute(
        "INSERT INTO forums (category_id, name, sub, slug, visible, sort, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5,
                 (SELECT COALESCE(MAX(sort), -1) + 1 FROM forums WHERE category_id = ?1), ?6, ?6)",
        params![category_id, name, sub, slugify(name), visible, now],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!("Forum #{} {} created in category #{}", id, name, category_id);
    Ok(id)
}

/// Sets the meta keywords and description of a category. Blank values
/// clear them. Returns false for an unknown category.
pub fn describe_category(
    conn: &Connection,
    id: i64,
    keywords: Option<&str>,
    description: Option<&str>,
) -> rusqlite::Result<bool> {
    describe(conn, "categories", id, keywords, description)
}

pub fn describe_forum(
    conn: &Connection,
    id: i64,
    keywords: Option<&str>,
    description: Option<&str>,
) -> rusqlite::Result<bool> {
    describe(conn, "forums", id, keywords, description)
}

fn describe(
    conn: &Connection,
    table: &'static str,
    id: i64,
    keywords: Option<&str>,
    description: Option<&str>,
) -> rusqlite::Result<bool> {
    let filled = |value: Option<&str>| value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
    let changed = conn.execute(
        &format!(
            "UPDATE {} SET keywords = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            table
        ),
        params![filled(keywords), filled(description), unix_now(), id],
    )?;
    Ok(changed > 0)
}

/// Board wide thread and post counts, cached until content changes.
pub fn totals(conn: &Connection, cache: &Cache) -> rusqlite::Result<Totals> {
    let threads = match cache.get_as::<i64>(THREADS_COUNT_KEY) {
        Some(count) => count,
        None => {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM threads", [], |r| r.get(0))?;
            cache.set(THREADS_COUNT_KEY, count.into());
            count
        }
    };
    let posts = match cache.get_as::<i64>(POSTS_COUNT_KEY) {
        Some(count) => count,
        None => {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))?;
            cache.set(POSTS_COUNT_KEY, count.into());
            count
        }
    };
    Ok(Totals { threads, posts })
}

/// Newest posts, cached separately for guests and members.
pub fn latest_posts(
    conn: &Connection,
    cache: &Cache,
    guest: bool,
    limit: i64,
) -> rusqlite::Result<Vec<LatestPost>> {
    let element = if guest { "guest" } else { "member" };
    if let Some(posts) = cache.get_element_as::<Vec<LatestPost>>(LATEST_POSTS_KEY, element) {
        return Ok(posts);
    }

    let mut stmt = conn.prepare(
        "SELECT p.id, p.thread_id, t.name, u.username, p.created_at
         FROM posts p
         JOIN threads t ON t.id = p.thread_id
         JOIN forums f ON f.id = p.forum_id
         JOIN categories c ON c.id = f.category_id
         JOIN users u ON u.id = p.author_id
         WHERE ?1 = 0 OR (f.visible = 1 AND c.visible = 1)
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?2",
    )?;
    let posts = stmt
        .query_map(params![guest, limit], |row| {
            Ok(LatestPost {
                id: row.get(0)?,
                thread_id: row.get(1)?,
                thread_name: row.get(2)?,
                author: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    cache.set_element_from(LATEST_POSTS_KEY, element, &posts);
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::pool_with_schema;
    use crate::forum::testing::{member, seed_board};

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0), 1);
        assert_eq!(page_count(1), 1);
        assert_eq!(page_count(10), 1);
        assert_eq!(page_count(11), 2);
        assert_eq!(page_count(21), 3);
    }

    #[test]
    fn lookups_require_matching_slug() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let b = seed_board(&conn);

        assert!(category(&conn, b.category_id, "general", true).unwrap().is_some());
        assert!(category(&conn, b.category_id, "other", true).unwrap().is_none());
        assert!(forum(&conn, b.category_id, b.forum_id, "lounge", true).unwrap().is_some());
        assert!(forum(&conn, b.category_id + 1, b.forum_id, "lounge", true).unwrap().is_none());
        assert!(thread_in(&conn, b.category_id, b.forum_id, b.thread_id, "hello", true)
            .unwrap()
            .is_some());
    }

    #[test]
    fn hidden_boards_are_members_only() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let b = seed_board(&conn);
        conn.execute("UPDATE categories SET visible = 0", []).unwrap();

        assert!(categories(&conn, true).unwrap().is_empty());
        assert_eq!(categories(&conn, false).unwrap().len(), 1);
        assert!(forum(&conn, b.category_id, b.forum_id, "lounge", true).unwrap().is_none());
        assert!(thread_in(&conn, b.category_id, b.forum_id, b.thread_id, "hello", true)
            .unwrap()
            .is_none());
        assert!(thread_in(&conn, b.category_id, b.forum_id, b.thread_id, "hello", false)
            .unwrap()
            .is_some());
    }

    #[test]
    fn created_boards_get_slugs_and_order() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let first = create_category(&conn, "Main Hall", true).unwrap();
        let second = create_category(&conn, "Back Room", false).unwrap();
        let cats = categories(&conn, false).unwrap();
        assert_eq!(cats.iter().map(|c| c.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(cats[0].slug, "main-hall");

        let forum_id = create_forum(&conn, first, "News & Notes", Some("What's new"), true).unwrap();
        let forums = forums_in(&conn, first, true).unwrap();
        assert_eq!(forums[0].id, forum_id);
        assert_eq!(forums[0].slug, "news-notes");
    }

    #[test]
    fn page_of_post_counts_earlier_posts() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let b = seed_board(&conn);
        for i in 0..10 {
            conn.execute(
                "INSERT INTO posts (content, thread_id, forum_id, author_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, 0)",
                params![format!("reply number {}", i), b.thread_id, b.forum_id, b.author_id],
            )
            .unwrap();
        }
        let last = post(&conn, last_post_id(&conn, b.thread_id).unwrap().unwrap())
            .unwrap()
            .unwrap();
        let first = post(&conn, b.post_id).unwrap().unwrap();

        assert_eq!(page_of_post(&conn, &first).unwrap(), 1);
        assert_eq!(page_of_post(&conn, &last).unwrap(), 2);
        assert_eq!(posts_page(&conn, b.thread_id, 2).unwrap().len(), 1);
        assert_eq!(first_post_id(&conn, b.thread_id).unwrap(), Some(b.post_id));
    }

    #[test]
    fn latest_posts_are_cached_per_audience() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        seed_board(&conn);
        conn.execute("UPDATE forums SET visible = 0", []).unwrap();

        assert!(latest_posts(&conn, &cache, true, 5).unwrap().is_empty());
        assert_eq!(latest_posts(&conn, &cache, false, 5).unwrap().len(), 1);

        conn.execute("UPDATE forums SET visible = 1", []).unwrap();
        // stale until content changes
        assert!(latest_posts(&conn, &cache, true, 5).unwrap().is_empty());
        cache.clear_after(crate::cache::CacheEvent::NewPost);
        assert_eq!(latest_posts(&conn, &cache, true, 5).unwrap().len(), 1);
    }

    #[test]
    fn totals_count_threads_and_posts() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        seed_board(&conn);
        assert_eq!(totals(&conn, &cache).unwrap(), Totals { threads: 1, posts: 1 });
    }

    fn pinned_hot_thread(conn: &Connection, b: &crate::forum::testing::Board) -> i64 {
        let now = unix_now();
        conn.execute(
            "INSERT INTO threads (name, slug, category_id, forum_id, author_id, pinned, posts,
                                  new_post_at, edited_post_at, created_at, updated_at)
             VALUES ('Rules', 'rules', ?1, ?2, ?3, 1, 25, ?4, ?4, ?4, ?4)",
            params![b.category_id, b.forum_id, b.author_id, now],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn thread_filters_toggle_and_clear() {
        let mut filters = ThreadFilters::default();
        assert!(filters.toggle("HOT"));
        assert!(filters.hot);
        assert!(filters.toggle("hot"));
        assert!(!filters.hot);

        filters.toggle("pin");
        filters.toggle("new");
        assert!(!filters.toggle("bogus"));
        assert!(!filters.is_empty());
        assert!(filters.toggle("all"));
        assert!(filters.is_empty());
    }

    #[test]
    fn filters_narrow_the_thread_list() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        let b = seed_board(&conn);
        let reader = member(&conn, "reader");
        let pinned = pinned_hot_thread(&conn, &b);

        let everything = ThreadFilters::default();
        let all = threads_page(&conn, b.forum_id, &everything, Some(reader), 1).unwrap();
        assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![pinned, b.thread_id]);

        let only = |name: &str| {
            let mut filters = ThreadFilters::default();
            filters.toggle(name);
            filters
        };
        let ids = |filters: &ThreadFilters, reader: Option<i64>| {
            threads_page(&conn, b.forum_id, filters, reader, 1)
                .unwrap()
                .into_iter()
                .map(|t| t.id)
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&only("pin"), Some(reader)), vec![pinned]);
        assert_eq!(ids(&only("hot"), None), vec![pinned]);
        assert!(ids(&only("lock"), None).is_empty());
        assert_eq!(ids(&only("new"), Some(reader)).len(), 2);

        let first = post(&conn, b.post_id).unwrap().unwrap();
        crate::forum::posts::mark_seen(&conn, &cache, reader, &first, true).unwrap();
        assert_eq!(ids(&only("new"), Some(reader)), vec![pinned]);
        assert_eq!(count_threads(&conn, b.forum_id, &only("new"), Some(reader)).unwrap(), 1);
        // guests have nothing marked as read
        assert_eq!(count_threads(&conn, b.forum_id, &only("new"), None).unwrap(), 2);
        assert_eq!(count_threads(&conn, b.forum_id, &everything, None).unwrap(), 2);
    }

    #[test]
    fn unread_threads_follow_the_read_markers() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let cache = Cache::new();
        let b = seed_board(&conn);
        let reader = member(&conn, "reader");
        let pinned = pinned_hot_thread(&conn, &b);
        assert_eq!(count_unread_threads(&conn, reader).unwrap(), 2);

        let first = post(&conn, b.post_id).unwrap().unwrap();
        crate::forum::posts::mark_seen(&conn, &cache, reader, &first, true).unwrap();
        let unread = unread_threads(&conn, reader, 1).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].thread.id, pinned);
        assert!(unread[0].has_new_posts);

        // An edit after the visit brings the thread back without new posts
        conn.execute(
            "UPDATE threads SET edited_post_at = edited_post_at + 100 WHERE id = ?1",
            params![b.thread_id],
        )
        .unwrap();
        let unread = unread_threads(&conn, reader, 1).unwrap();
        let edited = unread.iter().find(|u| u.thread.id == b.thread_id).unwrap();
        assert!(!edited.has_new_posts);
        assert_eq!(count_unread_threads(&conn, reader).unwrap(), 2);
    }

    #[test]
    fn member_posts_hide_invisible_forums_from_guests() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let b = seed_board(&conn);

        let posts = posts_by_user(&conn, b.author_id, true, 1).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].thread_name, "Hello");
        assert_eq!(posts[0].content, "First post of the thread");

        conn.execute("UPDATE forums SET visible = 0", []).unwrap();
        assert!(posts_by_user(&conn, b.author_id, true, 1).unwrap().is_empty());
        assert_eq!(count_posts_by_user(&conn, b.author_id, true).unwrap(), 0);
        assert_eq!(count_posts_by_user(&conn, b.author_id, false).unwrap(), 1);
    }

    #[test]
    fn descriptions_trim_and_clear_blank_values() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let b = seed_board(&conn);

        assert!(describe_forum(&conn, b.forum_id, Some(" rust, sql "), Some("  ")).unwrap());
        let forum = forum_by_id(&conn, b.forum_id).unwrap().unwrap();
        assert_eq!(forum.keywords.as_deref(), Some("rust, sql"));
        assert!(forum.description.is_none());

        assert!(describe_category(&conn, b.category_id, None, Some("Talk")).unwrap());
        let category = category_by_id(&conn, b.category_id).unwrap().unwrap();
        assert_eq!(category.description.as_deref(), Some("Talk"));
        assert!(!describe_category(&conn, 999, None, None).unwrap());
    }
}
