// Database schema — table creation and migrations.
//
// Version 1 is the base layout below. Later versions are applied once each
// and recorded in `schema_version`, so older database files upgrade on open.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create the artifact tables and apply pending migrations.
///
/// Idempotent: safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Per-document artifact: each sampled review with its derived columns
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_file TEXT NOT NULL,
            review_id TEXT NOT NULL,
            star_rating INTEGER NOT NULL,
            product_category TEXT NOT NULL,
            review TEXT NOT NULL,
            e1 REAL NOT NULL,
            e2 REAL NOT NULL,
            cluster INTEGER NOT NULL,          -- -1 is noise
            topic TEXT NOT NULL
        );

        -- Per-file differential lexicon, one row per topic
        CREATE TABLE IF NOT EXISTS topic_keywords (
            source_file TEXT NOT NULL,
            topic TEXT NOT NULL,
            bad_count INTEGER NOT NULL,
            good_count INTEGER NOT NULL,
            ranking REAL,                      -- NULL when good_count = 0
            bad_keywords TEXT NOT NULL,
            good_keywords TEXT NOT NULL,
            product_category TEXT NOT NULL,
            PRIMARY KEY (source_file, topic)
        );

        -- Concatenation of topic_keywords over the last batch's successful files
        CREATE TABLE IF NOT EXISTS combined_keywords (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            topic TEXT NOT NULL,
            bad_count INTEGER NOT NULL,
            good_count INTEGER NOT NULL,
            ranking REAL,
            bad_keywords TEXT NOT NULL,
            good_keywords TEXT NOT NULL,
            product_category TEXT NOT NULL
        );

        -- One row per file per batch
        CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id INTEGER NOT NULL,
            source_file TEXT NOT NULL,
            succeeded INTEGER NOT NULL,
            documents INTEGER NOT NULL DEFAULT 0,
            clusters INTEGER NOT NULL DEFAULT 0,
            elapsed_secs REAL NOT NULL,
            error TEXT,
            finished_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_documents_source
            ON documents(source_file);

        CREATE INDEX IF NOT EXISTS idx_keywords_category
            ON topic_keywords(product_category);

        CREATE INDEX IF NOT EXISTS idx_runs_batch
            ON runs(batch_id);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: warnings column on runs.
    // JSON array of the file's non-fatal warnings (placeholder topics,
    // undefined rankings).
    run_migration(conn, 2, |c| {
        c.execute_batch("ALTER TABLE runs ADD COLUMN warnings TEXT NOT NULL DEFAULT '[]';")
    })?;

    // Migration v3: per-side review samples of each file's clustered reviews.
    run_migration(conn, 3, |c| {
        c.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_file TEXT NOT NULL,
                side TEXT NOT NULL,            -- 'bad' or 'good'
                product_topic TEXT NOT NULL,
                product_category TEXT NOT NULL,
                topic TEXT NOT NULL,
                text TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_samples_source
                ON samples(source_file, side);
            ",
        )
    })?;

    Ok(())
}

/// Apply `migrate` unless `version` is already recorded.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// User tables in the database, printed by `init`.
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
