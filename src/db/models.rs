use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub const USER_STATUS_REGISTERED: i64 = 1;
pub const USER_STATUS_ACTIVE: i64 = 10;
pub const USER_STATUS_BANNED: i64 = 20;

pub const ROLE_MEMBER: i64 = 1;
pub const ROLE_MODERATOR: i64 = 9;
pub const ROLE_ADMIN: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub inherited_id: Option<String>,
    pub username: String,
    pub email: Option<String>,
    pub status: i64,
    pub role: i64,
    pub created_at: i64,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, inherited_id, username, email, status, role, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            inherited_id: row.get(1)?,
            username: row.get(2)?,
            email: row.get(3)?,
            status: row.get(4)?,
            role: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == USER_STATUS_ACTIVE
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub visible: bool,
    pub sort: i64,
}

impl Category {
    pub const COLUMNS: &'static str = "id, name, slug, keywords, description, visible, sort";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            keywords: row.get(3)?,
            description: row.get(4)?,
            visible: row.get(5)?,
            sort: row.get(6)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forum {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub sub: Option<String>,
    pub slug: String,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub visible: bool,
    pub sort: i64,
    pub threads: i64,
    pub posts: i64,
}

impl Forum {
    pub const COLUMNS: &'static str =
        "id, category_id, name, sub, slug, keywords, description, visible, sort, threads, posts";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            category_id: row.get(1)?,
            name: row.get(2)?,
            sub: row.get(3)?,
            slug: row.get(4)?,
            keywords: row.get(5)?,
            description: row.get(6)?,
            visible: row.get(7)?,
            sort: row.get(8)?,
            threads: row.get(9)?,
            posts: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub category_id: i64,
    pub forum_id: i64,
    pub author_id: i64,
    pub pinned: bool,
    pub locked: bool,
    pub posts: i64,
    pub views: i64,
    pub new_post_at: i64,
    pub edited_post_at: i64,
    pub created_at: i64,
}

impl Thread {
    pub const COLUMNS: &'static str = "id, name, slug, category_id, forum_id, author_id, pinned, \
         locked, posts, views, new_post_at, edited_post_at, created_at";
    /// Number of columns `from_row` reads; extra selected values follow.
    pub const COLUMN_COUNT: usize = 13;

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            category_id: row.get(3)?,
            forum_id: row.get(4)?,
            author_id: row.get(5)?,
            pinned: row.get(6)?,
            locked: row.get(7)?,
            posts: row.get(8)?,
            views: row.get(9)?,
            new_post_at: row.get(10)?,
            edited_post_at: row.get(11)?,
            created_at: row.get(12)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub content: String,
    pub thread_id: i64,
    pub forum_id: i64,
    pub author_id: i64,
    pub likes: i64,
    pub dislikes: i64,
    pub edited: bool,
    pub edited_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Post {
    pub const COLUMNS: &'static str = "id, content, thread_id, forum_id, author_id, likes, \
         dislikes, edited, edited_at, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            thread_id: row.get(2)?,
            forum_id: row.get(3)?,
            author_id: row.get(4)?,
            likes: row.get(5)?,
            dislikes: row.get(6)?,
            edited: row.get(7)?,
            edited_at: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub thread_id: i64,
    pub post_seen: i64,
}

impl Subscription {
    pub const POST_NEW: i64 = 0;
    pub const POST_SEEN: i64 = 1;

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            thread_id: row.get(2)?,
            post_seen: row.get(3)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub topic: String,
    pub content: String,
    pub replyto: Option<i64>,
    pub sender_status: i64,
    pub created_at: i64,
}

impl Message {
    pub const STATUS_NEW: i64 = 1;
    pub const STATUS_READ: i64 = 10;
    pub const STATUS_DELETED: i64 = 20;

    pub const COLUMNS: &'static str =
        "id, sender_id, topic, content, replyto, sender_status, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sender_id: row.get(1)?,
            topic: row.get(2)?,
            content: row.get(3)?,
            replyto: row.get(4)?,
            sender_status: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub name: String,
    pub topic: String,
    pub content: String,
}
