// Database layer — SQLite storage for per-document and per-topic artifacts.
//
// rusqlite is built with the "bundled" feature, so there is no system SQLite
// dependency. The file lives at REVIEW_TOPICS_DB_PATH (default
// ./review-topics.db).

pub mod models;
pub mod queries;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

/// Create the database (and its parent directory) if needed, then migrate.
///
/// Called by `review-topics init` and at the start of every `run`.
pub fn initialize(db_path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {db_path}"))?;
        }
    }
    connect(db_path)
}

/// Open a database created by `init`; a missing file is an error.
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        anyhow::bail!("Database not found at {db_path}. Run `review-topics init` first.");
    }
    connect(db_path)
}

fn connect(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {db_path}"))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Files from before a migration pick it up here.
    schema::create_tables(&conn)?;
    Ok(conn)
}
