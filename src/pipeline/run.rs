// Single-file pipeline: reviews in, annotated documents and lexicon out.
//
// ingest -> filter/sample -> TF-IDF -> UMAP -> HDBSCAN -> topic labels ->
// differential lexicon, plus seeded per-side samples of the clustered reviews. Every stage returns a fresh value; nothing upstream
// is mutated. The deadline is checked between stages and inside the long
// ones.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use super::samples::{review_samples, SampleRow};
use crate::clustering::Hdbscan;
use crate::config::PipelineParams;
use crate::deadline::Deadline;
use crate::embedding::UmapProjector;
use crate::error::{PipelineError, PipelineResult, PipelineWarning};
use crate::reviews::ingest::read_reviews;
use crate::reviews::models::Review;
use crate::reviews::{dataset_name, sample::filter_and_sample};
use crate::text::stopwords::StopWords;
use crate::topics::{
    label_topics, LexiconEntry, LexiconExtractor, RatedText, TfIdfVectorizer, YakeExtractor,
};

/// A sampled review with every derived column attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedReview {
    pub review: Review,
    pub e1: f64,
    pub e2: f64,
    pub cluster: i32,
    pub topic: String,
}

/// Everything the core produces for one set of reviews.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub documents: Vec<AnnotatedReview>,
    pub lexicon: Vec<LexiconEntry>,
    pub samples: Vec<SampleRow>,
    pub warnings: Vec<PipelineWarning>,
}

impl Analysis {
    /// Distinct non-noise clusters.
    pub fn cluster_count(&self) -> usize {
        let mut ids: Vec<i32> = self
            .documents
            .iter()
            .map(|d| d.cluster)
            .filter(|&c| c >= 0)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

/// One successfully processed input file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub source: PathBuf,
    pub dataset: String,
    /// Rows the reader rejected as malformed.
    pub skipped_rows: usize,
    pub analysis: Analysis,
    pub elapsed: Duration,
}

/// Run the core stages on already-sampled reviews.
pub fn analyze(
    reviews: Vec<Review>,
    dataset: &str,
    params: &PipelineParams,
    deadline: &Deadline,
) -> PipelineResult<Analysis> {
    let stop_words = StopWords::for_dataset(dataset);
    let texts: Vec<String> = reviews.iter().map(Review::text).collect();

    deadline.check("vectorize")?;
    let terms = TfIdfVectorizer::new(params.vectorizer(), &stop_words).fit_transform(&texts)?;

    deadline.check("projection")?;
    let embedding = UmapProjector::new(params.projection()).project(&terms.matrix, deadline)?;

    deadline.check("clustering")?;
    let labels = Hdbscan::new(params.clustering()).cluster_masked(
        embedding.points(),
        embedding.isolated(),
        deadline,
    )?;

    deadline.check("topics")?;
    let yake = YakeExtractor::new(&stop_words);
    let topics = label_topics(&texts, &labels, &yake);

    let documents: Vec<AnnotatedReview> = reviews
        .into_iter()
        .zip(embedding.points())
        .zip(labels.iter().zip(topics.assign(&labels)))
        .map(|((review, point), (&cluster, topic))| AnnotatedReview {
            review,
            e1: point[0],
            e2: point[1],
            cluster,
            topic,
        })
        .collect();

    deadline.check("lexicon")?;
    let rated: Vec<RatedText<'_>> = documents
        .iter()
        .map(|d| RatedText {
            text: &d.review.review,
            star_rating: d.review.star_rating,
            topic: &d.topic,
        })
        .collect();
    let lexicon = LexiconExtractor::new(params.lexicon(), &stop_words, &yake).extract(&rated, dataset);

    let samples = review_samples(&documents, params.samples_per_side, params.seed);

    let mut warnings = topics.warnings;
    warnings.extend(lexicon.warnings);
    Ok(Analysis {
        documents,
        lexicon: lexicon.entries,
        samples,
        warnings,
    })
}

/// Read, sample and analyze one TSV file within `budget`.
pub fn process_file(
    path: &Path,
    params: &PipelineParams,
    budget: Option<Duration>,
) -> PipelineResult<FileReport> {
    let deadline = budget.map_or_else(Deadline::unbounded, Deadline::new);

    let ingested = read_reviews(path)?;
    let total = ingested.reviews.len();
    let sample = filter_and_sample(ingested.reviews, params.sample_cap, params.seed);
    if sample.is_empty() {
        return Err(PipelineError::Ingest(format!(
            "no verified, helpful reviews among {total} rows"
        )));
    }
    let dataset = dataset_name(path, &sample);
    info!(
        file = %path.display(),
        dataset = %dataset,
        rows = total,
        skipped = ingested.skipped,
        documents = sample.len(),
        "Sampled reviews"
    );

    let analysis = analyze(sample, &dataset, params, &deadline)?;
    Ok(FileReport {
        source: path.to_path_buf(),
        dataset,
        skipped_rows: ingested.skipped,
        analysis,
        elapsed: deadline.elapsed(),
    })
}
