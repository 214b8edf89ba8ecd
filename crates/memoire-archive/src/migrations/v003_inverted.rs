//! v003 -- Posting lists for the hand-rolled search strategy.
//!
//! One table holds all three index kinds (`term`, `contact`, `month`); the
//! value is a JSON array of archive ids.  Rows are read, mutated, and
//! written back inside one transaction by the inverted index.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS search_postings (
    kind        TEXT NOT NULL,     -- 'term' | 'contact' | 'month'
    key         TEXT NOT NULL,
    archive_ids TEXT NOT NULL,     -- JSON array of archive ids

    PRIMARY KEY (kind, key)
);
"#;

/// Apply the posting-list migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
