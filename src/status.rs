// System status display — DB stats and the last batch's per-file outcomes.

use anyhow::Result;
use std::path::Path;

use crate::db::{self, queries};
use crate::output::terminal;

/// Display system status to the terminal.
pub fn show(db_path: &str) -> Result<()> {
    if !Path::new(db_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `review-topics init` to set up the database.");
        return Ok(());
    }

    let file_size = std::fs::metadata(db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_path, file_size);

    let conn = db::open(db_path)?;
    for (table, count) in queries::table_row_counts(&conn)? {
        println!("  {table:<18} {count:>10} rows");
    }

    match queries::last_batch_runs(&conn)? {
        Some(runs) => {
            let batch_id = runs.first().map_or(0, |r| r.batch_id);
            let failed = runs.iter().filter(|r| !r.succeeded).count();
            println!(
                "\nLast batch #{batch_id}: {} files, {} failed",
                runs.len(),
                failed
            );
            terminal::display_runs(&runs);
        }
        None => {
            println!("\nLast batch: never");
            println!("  Run `review-topics run` to process the data directory");
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_missing_database_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.db");
        assert!(show(path.to_str().unwrap()).is_ok());
    }
}
