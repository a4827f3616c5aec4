// Colored terminal output for lexicon reports and batch summaries.
//
// This module handles all terminal-specific formatting: colors and tables.
// The main.rs command handlers delegate here.

use colored::Colorize;

use crate::db::models::{RunRecord, TopicKeywordRow};
use crate::pipeline::{BatchSummary, FileOutcome};

/// Display stored lexicon rows, one block per category.
pub fn display_topic_report(rows: &[TopicKeywordRow]) {
    if rows.is_empty() {
        println!("No topics stored yet. Run `review-topics run` first.");
        return;
    }

    let mut current_category: Option<&str> = None;
    for row in rows {
        if current_category != Some(row.product_category.as_str()) {
            current_category = Some(row.product_category.as_str());
            println!(
                "\n{}",
                format!("=== {} ===", row.product_category).bold()
            );
            println!();
            println!(
                "  {:<20} {:>6} {:>6} {:>8}  {}",
                "Topic".dimmed(),
                "Bad".dimmed(),
                "Good".dimmed(),
                "Ranking".dimmed(),
                "Keywords (bad / good)".dimmed(),
            );
            println!("  {}", "-".repeat(78).dimmed());
        }

        println!(
            "  {:<20} {:>6} {:>6} {:>8}  {}",
            super::truncate_chars(&row.topic, 20),
            row.bad_count,
            row.good_count,
            colorize_ranking(row.ranking),
            super::truncate_chars(&row.bad_keywords, 60).red(),
        );
        if !row.good_keywords.is_empty() {
            println!(
                "  {:<20} {:>6} {:>6} {:>8}  {}",
                "",
                "",
                "",
                "",
                super::truncate_chars(&row.good_keywords, 60).green(),
            );
        }
    }
    println!();
}

/// Summary printed at the end of `review-topics run`.
pub fn display_batch_summary(summary: &BatchSummary) {
    println!(
        "\n{}",
        format!("=== Batch ({} files) ===", summary.outcomes.len()).bold()
    );
    println!();

    for outcome in &summary.outcomes {
        let name = outcome
            .source()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match outcome {
            FileOutcome::Succeeded(s) => {
                println!(
                    "  {} {:<40} {:>7} docs {:>4} topics  {:>7.1}s",
                    "ok".green(),
                    name,
                    s.documents,
                    s.clusters,
                    s.elapsed.as_secs_f64(),
                );
                for warning in &s.warnings {
                    println!("       {} {}", "~".yellow(), warning.to_string().dimmed());
                }
            }
            FileOutcome::Failed { error, elapsed, .. } => {
                println!(
                    "  {} {:<40} {}  {:>7.1}s",
                    "!!".red().bold(),
                    name,
                    super::truncate_chars(&error.to_string(), 60).red(),
                    elapsed.as_secs_f64(),
                );
            }
        }
    }

    let failed = summary.failed_count();
    println!();
    println!(
        "  {} succeeded, {} failed in {:.1}s",
        summary.outcomes.len() - failed,
        failed,
        summary.elapsed.as_secs_f64()
    );
}

/// Per-file lines for `status`.
pub fn display_runs(runs: &[RunRecord]) {
    for run in runs {
        let marker = if run.succeeded {
            "ok".green()
        } else {
            "!!".red().bold()
        };
        let detail = match &run.error {
            Some(error) => super::truncate_chars(error, 60).red().to_string(),
            None => format!("{} docs, {} topics", run.documents, run.clusters),
        };
        println!(
            "  {} {:<40} {}  ({:.1}s, {})",
            marker,
            run.source_file,
            detail,
            run.elapsed_secs,
            run.finished_at.dimmed()
        );
    }
}

/// Color a ranking by how lopsided toward bad reviews it is.
fn colorize_ranking(ranking: Option<f64>) -> colored::ColoredString {
    match ranking {
        None => "n/a".red().bold(),
        Some(r) if r >= 1.0 => format!("{r:.2}").bright_red(),
        Some(r) if r >= 0.5 => format!("{r:.2}").yellow(),
        Some(r) => format!("{r:.2}").green(),
    }
}
