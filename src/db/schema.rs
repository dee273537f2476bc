/// One forum table: its name and the statement that creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub create_sql: &'static str,
}

impl Table {
    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name)
    }
}

/// Every table, parents before children. Dropping walks this list backwards.
pub const TABLES: &[Table] = &[
    Table {
        name: "config",
        create_sql: "CREATE TABLE config (
            name TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    },
    Table {
        name: "content",
        create_sql: "CREATE TABLE content (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            topic TEXT NOT NULL,
            content TEXT NOT NULL
        );",
    },
    Table {
        name: "users",
        create_sql: "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            inherited_id TEXT UNIQUE,
            username TEXT NOT NULL UNIQUE,
            email TEXT,
            password_hash TEXT,
            status INTEGER NOT NULL DEFAULT 10,
            role INTEGER NOT NULL DEFAULT 1,
            timezone TEXT NOT NULL DEFAULT 'UTC',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    },
    Table {
        name: "sessions",
        create_sql: "CREATE TABLE sessions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token TEXT NOT NULL UNIQUE,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    },
    Table {
        name: "auth_items",
        create_sql: "CREATE TABLE auth_items (
            name TEXT PRIMARY KEY,
            kind INTEGER NOT NULL,
            description TEXT
        );",
    },
    Table {
        name: "auth_item_children",
        create_sql: "CREATE TABLE auth_item_children (
            parent TEXT NOT NULL REFERENCES auth_items(name) ON DELETE CASCADE,
            child TEXT NOT NULL REFERENCES auth_items(name) ON DELETE CASCADE,
            PRIMARY KEY (parent, child)
        );",
    },
    Table {
        name: "auth_assignments",
        create_sql: "CREATE TABLE auth_assignments (
            item_name TEXT NOT NULL REFERENCES auth_items(name) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (item_name, user_id)
        );",
    },
    Table {
        name: "categories",
        create_sql: "CREATE TABLE categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            keywords TEXT,
            description TEXT,
            visible INTEGER NOT NULL DEFAULT 1,
            sort INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    },
    Table {
        name: "forums",
        create_sql: "CREATE TABLE forums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            sub TEXT,
            slug TEXT NOT NULL,
            keywords TEXT,
            description TEXT,
            visible INTEGER NOT NULL DEFAULT 1,
            sort INTEGER NOT NULL DEFAULT 0,
            threads INTEGER NOT NULL DEFAULT 0,
            posts INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    },
    Table {
        name: "moderators",
        create_sql: "CREATE TABLE moderators (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            forum_id INTEGER NOT NULL REFERENCES forums(id) ON DELETE CASCADE,
            UNIQUE (user_id, forum_id)
        );",
    },
    Table {
        name: "threads",
        create_sql: "CREATE TABLE threads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            forum_id INTEGER NOT NULL REFERENCES forums(id) ON DELETE CASCADE,
            author_id INTEGER NOT NULL REFERENCES users(id),
            pinned INTEGER NOT NULL DEFAULT 0,
            locked INTEGER NOT NULL DEFAULT 0,
            posts INTEGER NOT NULL DEFAULT 0,
            views INTEGER NOT NULL DEFAULT 0,
            new_post_at INTEGER NOT NULL,
            edited_post_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    },
    Table {
        name: "posts",
        create_sql: "CREATE TABLE posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
            forum_id INTEGER NOT NULL REFERENCES forums(id) ON DELETE CASCADE,
            author_id INTEGER NOT NULL REFERENCES users(id),
            edited INTEGER NOT NULL DEFAULT 0,
            likes INTEGER NOT NULL DEFAULT 0,
            dislikes INTEGER NOT NULL DEFAULT 0,
            edited_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX idx_posts_thread ON posts(thread_id, id);",
    },
    Table {
        name: "post_thumbs",
        create_sql: "CREATE TABLE post_thumbs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            thumb INTEGER NOT NULL CHECK (thumb IN (-1, 1)),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (user_id, post_id)
        );",
    },
    Table {
        name: "thread_views",
        create_sql: "CREATE TABLE thread_views (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
            new_last_seen INTEGER NOT NULL,
            edited_last_seen INTEGER NOT NULL,
            UNIQUE (user_id, thread_id)
        );",
    },
    Table {
        name: "subscriptions",
        create_sql: "CREATE TABLE subscriptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
            post_seen INTEGER NOT NULL DEFAULT 1,
            UNIQUE (user_id, thread_id)
        );",
    },
    Table {
        name: "vocabulary",
        create_sql: "CREATE TABLE vocabulary (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            word TEXT NOT NULL UNIQUE
        );",
    },
    Table {
        name: "vocabulary_junction",
        create_sql: "CREATE TABLE vocabulary_junction (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            word_id INTEGER NOT NULL REFERENCES vocabulary(id) ON DELETE CASCADE,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            UNIQUE (word_id, post_id)
        );
        CREATE INDEX idx_junction_post ON vocabulary_junction(post_id);",
    },
    Table {
        name: "messages",
        create_sql: "CREATE TABLE messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            topic TEXT NOT NULL,
            content TEXT NOT NULL,
            replyto INTEGER,
            sender_status INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    },
    Table {
        name: "message_receivers",
        create_sql: "CREATE TABLE message_receivers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            receiver_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            receiver_status INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    },
    Table {
        name: "emails",
        create_sql: "CREATE TABLE emails (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER,
            email TEXT NOT NULL,
            subject TEXT NOT NULL,
            content TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_names_are_unique() {
        let names: HashSet<_> = TABLES.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), TABLES.len());
    }

    #[test]
    fn every_statement_creates_its_own_table() {
        for table in TABLES {
            let prefix = format!("CREATE TABLE {} (", table.name);
            assert!(table.create_sql.starts_with(&prefix), "{}", table.name);
        }
    }

    #[test]
    fn drop_statement_names_the_table() {
        let posts = TABLES.iter().find(|t| t.name == "posts").unwrap();
        assert_eq!(posts.drop_sql(), "DROP TABLE IF EXISTS posts");
    }
}
