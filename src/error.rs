// Error and warning taxonomy for the per-file pipeline.
//
// Every variant of PipelineError is recoverable at the file level: the batch
// orchestrator records it against the file and moves on. Warnings never stop
// a file; they travel with its report.

use std::time::Duration;

use thiserror::Error;

/// Result alias for core pipeline stages.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The vectorizer filtered every term out of the vocabulary.
    #[error("degenerate vocabulary: {0}")]
    DegenerateVocabulary(String),

    /// Neighbor graph could not be built, or the layout went non-finite.
    #[error("projection failed: {0}")]
    Projection(String),

    /// A cluster's concatenated text had nothing left after stop-word removal.
    #[error("cluster {cluster} has no usable text")]
    EmptyClusterText { cluster: i32 },

    /// The input file could not be read or had no usable rows.
    #[error("ingest failed: {0}")]
    Ingest(String),

    /// The per-file wall-clock budget ran out.
    #[error("file exceeded its {budget:?} budget during {stage}")]
    Timeout { stage: &'static str, budget: Duration },

    #[error("persistence failed: {0}")]
    Persistence(String),

    /// A stage panicked; the panic was caught at the file boundary.
    #[error("processing panicked: {0}")]
    Panicked(String),
}

/// Non-fatal conditions recorded while processing a file.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    /// `good_count` was zero, so the ranking ratio is non-finite.
    UndefinedRanking { topic: String, bad_count: usize },
    /// Keyword extraction found nothing; the cluster id stands in as its label.
    PlaceholderTopic { cluster: i32, placeholder: String },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::UndefinedRanking { topic, bad_count } => write!(
                f,
                "topic '{topic}' has no high-rating reviews ({bad_count} low), ranking undefined"
            ),
            PipelineWarning::PlaceholderTopic {
                cluster,
                placeholder,
            } => write!(
                f,
                "cluster {cluster} produced no keyword, labeled '{placeholder}'"
            ),
        }
    }
}
