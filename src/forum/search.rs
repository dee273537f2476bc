use rusqlite::{params_from_iter, types::Value, Connection};
use serde::Serialize;

use crate::forum::words::derive_words;
use crate::forum::{ForumError, ForumResult};

/// Query words considered; the rest are ignored.
const MAX_QUERY_WORDS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub post_id: i64,
    pub thread_id: i64,
    pub thread_name: String,
    pub author: String,
    pub created_at: i64,
}

/// Posts whose indexed words contain any word of the query, newest first.
/// Guests only see posts from visible forums and categories.
pub fn search(conn: &Connection, query: &str, guest: bool, limit: i64) -> ForumResult<Vec<SearchHit>> {
    let words: Vec<String> = derive_words(query).into_iter().take(MAX_QUERY_WORDS).collect();
    if words.is_empty() {
        return Err(ForumError::Invalid(
            "Search query needs a word of at least 3 characters.".into(),
        ));
    }

    let matches = (1..=words.len())
        .map(|i| format!("instr(v.word, ?{}) > 0", i))
        .collect::<Vec<_>>()
        .join(" OR ");
    let guest_param = words.len() + 1;
    let limit_param = words.len() + 2;
    let sql = format!(
        "SELECT DISTINCT p.id, p.thread_id, t.name, u.username, p.created_at
         FROM vocabulary v
         JOIN vocabulary_junction j ON j.word_id = v.id
         JOIN posts p ON p.id = j.post_id
         JOIN threads t ON t.id = p.thread_id
         JOIN forums f ON f.id = p.forum_id
         JOIN categories c ON c.id = f.category_id
         JOIN users u ON u.id = p.author_id
         WHERE ({matches})
           AND (?{guest_param} = 0 OR (f.visible = 1 AND c.visible = 1))
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?{limit_param}"
    );

    let mut values: Vec<Value> = words.into_iter().map(Value::Text).collect();
    values.push(Value::Integer(i64::from(guest)));
    values.push(Value::Integer(limit));

    let mut stmt = conn.prepare(&sql)?;
    let hits = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(SearchHit {
                post_id: row.get(0)?,
                thread_id: row.get(1)?,
                thread_name: row.get(2)?,
                author: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::pool_with_schema;
    use crate::forum::testing::seed_board;
    use crate::forum::words::{index_post, IndexMode};

    #[test]
    fn finds_posts_by_partial_word() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let b = seed_board(&conn);
        index_post(&conn, b.post_id, "Borrowing rules explained", IndexMode::Create).unwrap();

        let hits = search(&conn, "borrow", true, 20).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].post_id, b.post_id);
        assert_eq!(hits[0].thread_name, "Hello");
        assert!(search(&conn, "lifetimes", true, 20).unwrap().is_empty());
    }

    #[test]
    fn guests_do_not_see_hidden_forums() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let b = seed_board(&conn);
        index_post(&conn, b.post_id, "Secret plans", IndexMode::Create).unwrap();
        conn.execute("UPDATE forums SET visible = 0", []).unwrap();

        assert!(search(&conn, "secret", true, 20).unwrap().is_empty());
        assert_eq!(search(&conn, "secret", false, 20).unwrap().len(), 1);
    }

    #[test]
    fn short_queries_are_rejected() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        assert!(matches!(search(&conn, "a b", true, 20), Err(ForumError::Invalid(_))));
    }
}
