// Data models — Rust structs that map to database rows.
//
// These are separate from the queries so other modules (terminal output,
// status) can use them without depending on rusqlite directly.

use serde::{Deserialize, Serialize};

use crate::pipeline::FileOutcome;

/// A stored lexicon row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicKeywordRow {
    pub source_file: String,
    pub topic: String,
    pub bad_count: i64,
    pub good_count: i64,
    /// `None` when the ranking was undefined (no good reviews).
    pub ranking: Option<f64>,
    pub bad_keywords: String,
    pub good_keywords: String,
    pub product_category: String,
}

/// Non-finite rankings are stored as NULL.
pub fn stored_ranking(ranking: f64) -> Option<f64> {
    ranking.is_finite().then_some(ranking)
}

/// One file's result within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub batch_id: i64,
    pub source_file: String,
    pub succeeded: bool,
    pub documents: i64,
    pub clusters: i64,
    pub elapsed_secs: f64,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    /// Filled in by the database.
    pub finished_at: String,
}

impl RunRecord {
    pub fn from_outcome(batch_id: i64, outcome: &FileOutcome) -> Self {
        let source_file = outcome.source().display().to_string();
        match outcome {
            FileOutcome::Succeeded(s) => Self {
                batch_id,
                source_file,
                succeeded: true,
                documents: s.documents as i64,
                clusters: s.clusters as i64,
                elapsed_secs: s.elapsed.as_secs_f64(),
                error: None,
                warnings: s.warnings.iter().map(ToString::to_string).collect(),
                finished_at: String::new(),
            },
            FileOutcome::Failed { error, elapsed, .. } => Self {
                batch_id,
                source_file,
                succeeded: false,
                documents: 0,
                clusters: 0,
                elapsed_secs: elapsed.as_secs_f64(),
                error: Some(error.to_string()),
                warnings: Vec::new(),
                finished_at: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_ranking_stored_as_null() {
        assert_eq!(stored_ranking(f64::INFINITY), None);
        assert_eq!(stored_ranking(f64::NAN), None);
        assert_eq!(stored_ranking(1.5), Some(1.5));
    }
}
