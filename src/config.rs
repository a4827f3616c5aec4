use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::clustering::HdbscanConfig;
use crate::embedding::{Metric, ProjectionConfig};
use crate::topics::{LexiconConfig, VectorizerConfig};

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Every
/// value has a default, so an empty environment is a valid one.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory scanned for `*.tsv` review dumps.
    pub data_dir: PathBuf,
    pub db_path: String,
    /// Where scatter exports are written.
    pub output_dir: PathBuf,
    /// Wall-clock budget per input file.
    pub file_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let file_timeout = match env::var("REVIEW_TOPICS_FILE_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("REVIEW_TOPICS_FILE_TIMEOUT_SECS is not a number: {raw}"))?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(3600),
        };

        Ok(Self {
            data_dir: env::var("REVIEW_TOPICS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            db_path: env::var("REVIEW_TOPICS_DB_PATH")
                .unwrap_or_else(|_| "./review-topics.db".to_string()),
            output_dir: env::var("REVIEW_TOPICS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./output")),
            file_timeout,
        })
    }
}

/// Every algorithm knob of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParams {
    /// Most documents kept per file after filtering.
    pub sample_cap: usize,
    pub seed: u64,
    pub min_df: usize,
    pub max_df: Option<f64>,
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub metric: Metric,
    pub n_epochs: Option<usize>,
    pub min_samples: usize,
    pub min_cluster_size: usize,
    pub lexicon_min_df: usize,
    pub lexicon_top_k: usize,
    /// Most clustered reviews sampled from each rating side.
    pub samples_per_side: usize,
    /// Show layout progress bars.
    pub progress: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            sample_cap: 100_000,
            seed: 1729,
            min_df: 5,
            max_df: Some(0.1),
            n_neighbors: 30,
            min_dist: 0.0,
            metric: Metric::Hellinger,
            n_epochs: None,
            min_samples: 10,
            min_cluster_size: 500,
            lexicon_min_df: 5,
            lexicon_top_k: 30,
            samples_per_side: 5000,
            progress: false,
        }
    }
}

impl PipelineParams {
    pub fn vectorizer(&self) -> VectorizerConfig {
        VectorizerConfig {
            min_df: self.min_df,
            max_df: self.max_df,
        }
    }

    pub fn projection(&self) -> ProjectionConfig {
        ProjectionConfig {
            n_neighbors: self.n_neighbors,
            min_dist: self.min_dist,
            metric: self.metric,
            n_epochs: self.n_epochs,
            seed: self.seed,
            progress: self.progress,
            ..ProjectionConfig::default()
        }
    }

    pub fn clustering(&self) -> HdbscanConfig {
        HdbscanConfig {
            min_samples: self.min_samples,
            min_cluster_size: self.min_cluster_size,
        }
    }

    pub fn lexicon(&self) -> LexiconConfig {
        LexiconConfig {
            min_df: self.lexicon_min_df,
            top_k: self.lexicon_top_k,
        }
    }
}
