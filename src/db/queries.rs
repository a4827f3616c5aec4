// Database queries — every read and write of the artifact tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::models::{stored_ranking, RunRecord, TopicKeywordRow};
use crate::pipeline::{Analysis, FileOutcome, Side};
use crate::topics::LexiconEntry;

// --- Per-file artifacts ---

/// Tables holding rows keyed by `source_file`.
const FILE_TABLES: [&str; 3] = ["documents", "topic_keywords", "samples"];

fn delete_file_rows(conn: &Connection, source_file: &str) -> Result<()> {
    for table in FILE_TABLES {
        conn.execute(
            &format!("DELETE FROM {table} WHERE source_file = ?1"),
            params![source_file],
        )?;
    }
    Ok(())
}

/// Replace everything stored for `source_file` in one transaction: either
/// all of the file's documents, lexicon and sample rows land, or none do.
pub fn replace_file_artifacts(
    conn: &mut Connection,
    source_file: &str,
    analysis: &Analysis,
) -> Result<()> {
    let tx = conn.transaction()?;
    delete_file_rows(&tx, source_file)?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO documents
                (source_file, review_id, star_rating, product_category, review, e1, e2, cluster, topic)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for doc in &analysis.documents {
            stmt.execute(params![
                source_file,
                doc.review.review_id,
                doc.review.star_rating,
                doc.review.product_category,
                doc.review.review,
                doc.e1,
                doc.e2,
                doc.cluster,
                doc.topic,
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO topic_keywords
                (source_file, topic, bad_count, good_count, ranking, bad_keywords, good_keywords, product_category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for entry in &analysis.lexicon {
            stmt.execute(params![
                source_file,
                entry.topic,
                entry.bad_count as i64,
                entry.good_count as i64,
                stored_ranking(entry.ranking),
                entry.bad_keywords,
                entry.good_keywords,
                entry.product_category,
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO samples
                (source_file, side, product_topic, product_category, topic, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for row in &analysis.samples {
            stmt.execute(params![
                source_file,
                row.side.as_str(),
                row.product_topic,
                row.product_category,
                row.topic,
                row.text,
            ])?;
        }
    }

    tx.commit()
        .with_context(|| format!("Failed to commit artifacts for {source_file}"))?;
    Ok(())
}

/// Drop every row stored for `source_file`, so a file that failed this
/// batch no longer shows earlier results.
pub fn clear_file_artifacts(conn: &mut Connection, source_file: &str) -> Result<()> {
    let tx = conn.transaction()?;
    delete_file_rows(&tx, source_file)?;
    tx.commit()
        .with_context(|| format!("Failed to clear artifacts for {source_file}"))?;
    Ok(())
}

/// Rebuild the combined table from a batch's successful files.
pub fn write_combined(conn: &mut Connection, entries: &[LexiconEntry]) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM combined_keywords", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO combined_keywords
                (topic, bad_count, good_count, ranking, bad_keywords, good_keywords, product_category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for entry in entries {
            stmt.execute(params![
                entry.topic,
                entry.bad_count as i64,
                entry.good_count as i64,
                stored_ranking(entry.ranking),
                entry.bad_keywords,
                entry.good_keywords,
                entry.product_category,
            ])?;
        }
    }
    tx.commit().context("Failed to commit combined keywords")?;
    Ok(())
}

/// Stored lexicon rows, optionally for one category, worst-ranked first.
/// Undefined rankings (no good reviews) sort ahead of everything.
pub fn get_topic_keywords(conn: &Connection, category: Option<&str>) -> Result<Vec<TopicKeywordRow>> {
    let mut stmt = conn.prepare(
        "SELECT source_file, topic, bad_count, good_count, ranking,
                bad_keywords, good_keywords, product_category
         FROM topic_keywords
         WHERE ?1 IS NULL OR product_category = ?1 COLLATE NOCASE
         ORDER BY product_category, ranking IS NOT NULL, ranking DESC, topic",
    )?;
    let rows = stmt
        .query_map(params![category], |row| {
            Ok(TopicKeywordRow {
                source_file: row.get(0)?,
                topic: row.get(1)?,
                bad_count: row.get(2)?,
                good_count: row.get(3)?,
                ranking: row.get(4)?,
                bad_keywords: row.get(5)?,
                good_keywords: row.get(6)?,
                product_category: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Number of documents stored for one source file.
pub fn document_count(conn: &Connection, source_file: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE source_file = ?1",
        params![source_file],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Clear the stored rows of every file that failed in a batch.
/// Returns how many files were cleared.
pub fn clear_failed_files(conn: &mut Connection, outcomes: &[FileOutcome]) -> Result<usize> {
    let mut cleared = 0;
    for outcome in outcomes.iter().filter(|o| !o.is_success()) {
        let source_file = outcome.source().display().to_string();
        clear_file_artifacts(conn, &source_file)?;
        debug!(file = %source_file, "Cleared stored rows of failed file");
        cleared += 1;
    }
    Ok(cleared)
}

/// Sample rows stored for one source file on one rating side.
pub fn sample_count(conn: &Connection, source_file: &str, side: Side) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM samples WHERE source_file = ?1 AND side = ?2",
        params![source_file, side.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Row counts of the artifact tables, for `status`.
pub fn table_row_counts(conn: &Connection) -> Result<Vec<(&'static str, i64)>> {
    ["documents", "topic_keywords", "samples", "combined_keywords", "runs"]
        .into_iter()
        .map(|table| -> Result<(&'static str, i64)> {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok((table, count))
        })
        .collect()
}

// --- Runs ---

/// Id for a new batch: one past the highest recorded.
pub fn next_batch_id(conn: &Connection) -> Result<i64> {
    let id: i64 = conn.query_row(
        "SELECT COALESCE(MAX(batch_id), 0) + 1 FROM runs",
        [],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn record_run(conn: &Connection, run: &RunRecord) -> Result<()> {
    let warnings = serde_json::to_string(&run.warnings)?;
    conn.execute(
        "INSERT INTO runs
            (batch_id, source_file, succeeded, documents, clusters, elapsed_secs, error, warnings)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            run.batch_id,
            run.source_file,
            run.succeeded,
            run.documents,
            run.clusters,
            run.elapsed_secs,
            run.error,
            warnings,
        ],
    )?;
    Ok(())
}

/// Per-file records of the most recent batch, or `None` before the first.
pub fn last_batch_runs(conn: &Connection) -> Result<Option<Vec<RunRecord>>> {
    let last: Option<i64> = conn
        .query_row("SELECT MAX(batch_id) FROM runs", [], |row| row.get(0))
        .optional()?
        .flatten();
    let Some(batch_id) = last else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT batch_id, source_file, succeeded, documents, clusters, elapsed_secs,
                error, warnings, finished_at
         FROM runs WHERE batch_id = ?1 ORDER BY source_file",
    )?;
    let raw = stmt
        .query_map(params![batch_id], |row| {
            let warnings: String = row.get(7)?;
            Ok((
                RunRecord {
                    batch_id: row.get(0)?,
                    source_file: row.get(1)?,
                    succeeded: row.get(2)?,
                    documents: row.get(3)?,
                    clusters: row.get(4)?,
                    elapsed_secs: row.get(5)?,
                    error: row.get(6)?,
                    warnings: Vec::new(),
                    finished_at: row.get(8)?,
                },
                warnings,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut runs = Vec::with_capacity(raw.len());
    for (mut run, warnings) in raw {
        run.warnings = serde_json::from_str(&warnings)
            .with_context(|| format!("Corrupt warnings for {}", run.source_file))?;
        runs.push(run);
    }
    Ok(Some(runs))
}
