//! Search vocabulary derived from post bodies.
//!
//! Every post owns its set of rows in `vocabulary_junction`; the shared
//! `vocabulary` table only ever grows.

use regex::Regex;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use crate::db::placeholders;
use crate::sanitize::{self, Profile};

pub const MIN_WORD_CHARS: usize = 3;
pub const MAX_WORD_CHARS: usize = 255;

/// Keeps `IN (...)` lists well under SQLite's bound parameter limit.
const LOOKUP_CHUNK: usize = 500;

static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<[^>]+>|&(#[0-9]+|#x[0-9a-f]+|[a-z]+);").expect("valid markup pattern")
});

#[derive(Debug, thiserror::Error)]
#[error("Word index update failed: {0}")]
pub struct IndexError(#[from] rusqlite::Error);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// The post is new; it has no junction rows yet.
    Create,
    /// The post changed; stale junction rows must go.
    Edit,
}

/// Normalized, deduplicated tokens of a post body.
pub fn derive_words(text: &str) -> BTreeSet<String> {
    let cleaned = sanitize::clean(text, Profile::Full);
    let plain = MARKUP.replace_all(&cleaned, " ");

    plain
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| {
            let chars = token.chars().count();
            (MIN_WORD_CHARS..=MAX_WORD_CHARS).contains(&chars)
        })
        .map(str::to_lowercase)
        .collect()
}

/// Derives the words of `content` and reconciles them for the post.
pub fn index_post(
    conn: &Connection,
    post_id: i64,
    content: &str,
    mode: IndexMode,
) -> Result<(), IndexError> {
    reconcile(conn, post_id, &derive_words(content), mode)
}

/// Makes the junction rows of `post_id` an exact image of `words`.
///
/// Missing vocabulary entries are added first. Running it twice with the
/// same words changes nothing.
pub fn reconcile(
    conn: &Connection,
    post_id: i64,
    words: &BTreeSet<String>,
    mode: IndexMode,
) -> Result<(), IndexError> {
    let words: Vec<&str> = words.iter().map(String::as_str).collect();

    let known = vocabulary_ids(conn, &words)?;
    let missing: Vec<&str> = words
        .iter()
        .copied()
        .filter(|word| !known.contains_key(*word))
        .collect();
    if !missing.is_empty() {
        let mut insert = conn.prepare_cached("INSERT OR IGNORE INTO vocabulary (word) VALUES (?1)")?;
        for word in &missing {
            insert.execute(params![word])?;
        }
    }

    let wanted: HashSet<i64> = vocabulary_ids(conn, &words)?.into_values().collect();
    let existing: HashSet<i64> = match mode {
        IndexMode::Create => HashSet::new(),
        IndexMode::Edit => junction_word_ids(conn, post_id)?,
    };

    let mut link = conn.prepare_cached(
        "INSERT OR IGNORE INTO vocabulary_junction (word_id, post_id) VALUES (?1, ?2)",
    )?;
    for word_id in wanted.difference(&existing) {
        link.execute(params![word_id, post_id])?;
    }

    if mode == IndexMode::Edit {
        let mut unlink = conn.prepare_cached(
            "DELETE FROM vocabulary_junction WHERE post_id = ?1 AND word_id = ?2",
        )?;
        for word_id in existing.difference(&wanted) {
            unlink.execute(params![post_id, word_id])?;
        }
    }

    Ok(())
}

/// Words currently linked to a post.
pub fn post_words(conn: &Connection, post_id: i64) -> rusqlite::Result<BTreeSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT v.word FROM vocabulary_junction j
         JOIN vocabulary v ON v.id = j.word_id
         WHERE j.post_id = ?1",
    )?;
    let words = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<BTreeSet<String>, _>>()?;
    Ok(words)
}

fn vocabulary_ids(conn: &Connection, words: &[&str]) -> rusqlite::Result<HashMap<String, i64>> {
    let mut ids = HashMap::with_capacity(words.len());
    for chunk in words.chunks(LOOKUP_CHUNK) {
        let sql = format!(
            "SELECT id, word FROM vocabulary WHERE word IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, i64>(0)?))
        })?;
        for row in rows {
            let (word, id) = row?;
            ids.insert(word, id);
        }
    }
    Ok(ids)
}

fn junction_word_ids(conn: &Connection, post_id: i64) -> rusqlite::Result<HashSet<i64>> {
    let mut stmt = conn.prepare_cached("SELECT word_id FROM vocabulary_junction WHERE post_id = ?1")?;
    let ids = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<HashSet<i64>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::pool_with_schema;
    use crate::forum::testing::{seed_board, Board};

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn junction_rows(conn: &Connection, post_id: i64) -> Vec<(i64, i64)> {
        let mut stmt = conn
            .prepare("SELECT word_id, post_id FROM vocabulary_junction WHERE post_id = ?1 ORDER BY word_id")
            .unwrap();
        stmt.query_map([post_id], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn derive_words_drops_short_tokens_and_punctuation() {
        assert_eq!(
            derive_words("Hello, world! ab abc"),
            set(&["abc", "hello", "world"])
        );
    }

    #[test]
    fn derive_words_strips_markup_and_entities() {
        assert_eq!(
            derive_words("<p>Rust&nbsp;<b>borrow</b></p>\n<script>secret()</script>checker"),
            set(&["borrow", "checker", "rust"])
        );
    }

    #[test]
    fn derive_words_counts_characters_not_bytes() {
        // three characters, six bytes
        assert_eq!(derive_words("żółw źó"), set(&["żółw"]));
        let long = "a".repeat(256);
        let max = "b".repeat(255);
        assert_eq!(derive_words(&format!("{} {}", long, max)), set(&[max.as_str()]));
    }

    #[test]
    fn derive_words_deduplicates_case_insensitively() {
        assert_eq!(derive_words("Word word WORD"), set(&["word"]));
    }

    #[test]
    fn reconcile_adds_only_missing_vocabulary() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let Board { post_id, .. } = seed_board(&conn);

        reconcile(&conn, post_id, &set(&["alpha", "beta"]), IndexMode::Create).unwrap();
        reconcile(&conn, post_id, &set(&["beta", "gamma"]), IndexMode::Edit).unwrap();

        let vocabulary: i64 = conn
            .query_row("SELECT COUNT(*) FROM vocabulary", [], |r| r.get(0))
            .unwrap();
        assert_eq!(vocabulary, 3);
        assert_eq!(post_words(&conn, post_id).unwrap(), set(&["beta", "gamma"]));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let Board { post_id, .. } = seed_board(&conn);
        let words = derive_words("The quick brown fox jumps over the lazy dog");

        reconcile(&conn, post_id, &words, IndexMode::Edit).unwrap();
        let once = junction_rows(&conn, post_id);
        reconcile(&conn, post_id, &words, IndexMode::Edit).unwrap();
        assert_eq!(junction_rows(&conn, post_id), once);
        assert_eq!(once.len(), words.len());
    }

    #[test]
    fn reconcile_with_no_words_clears_the_post() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let Board { post_id, .. } = seed_board(&conn);

        reconcile(&conn, post_id, &set(&["alpha"]), IndexMode::Create).unwrap();
        reconcile(&conn, post_id, &BTreeSet::new(), IndexMode::Edit).unwrap();
        assert!(post_words(&conn, post_id).unwrap().is_empty());
    }

    #[test]
    fn reconcile_fails_for_unknown_post() {
        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        let result = reconcile(&conn, 9999, &set(&["alpha"]), IndexMode::Create);
        assert!(result.is_err());
    }
}
