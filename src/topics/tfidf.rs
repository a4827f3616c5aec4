// TF-IDF vectorizer — documents to a sparse term-document matrix.
//
// Vocabulary pruning follows the usual document-frequency rules: a term must
// appear in at least `min_df` documents, and (when set) in at most `max_df`
// of the corpus as a fraction. Stop words are removed before counting.
// Weights are raw term counts times smoothed IDF, each row L2-normalized.

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use tracing::info;

use crate::embedding::sparse::CsrMatrix;
use crate::error::{PipelineError, PipelineResult};
use crate::text::stopwords::StopWords;
use crate::text::tokenize;

/// Document-frequency thresholds for vocabulary pruning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorizerConfig {
    /// Minimum number of documents a term must appear in.
    pub min_df: usize,
    /// Maximum fraction of documents a term may appear in.
    pub max_df: Option<f64>,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            min_df: 5,
            max_df: Some(0.1),
        }
    }
}

/// The fitted term-document matrix and its column labels.
#[derive(Debug, Clone)]
pub struct TermMatrix {
    pub matrix: CsrMatrix,
    /// Column terms, sorted lexicographically.
    pub vocabulary: Vec<String>,
    /// Smoothed inverse document frequency per column.
    pub idf: Vec<f64>,
}

pub struct TfIdfVectorizer<'a> {
    pub config: VectorizerConfig,
    pub stop_words: &'a StopWords,
}

impl<'a> TfIdfVectorizer<'a> {
    pub fn new(config: VectorizerConfig, stop_words: &'a StopWords) -> Self {
        Self { config, stop_words }
    }

    /// Learn the vocabulary and weight every document against it.
    pub fn fit_transform<S: AsRef<str> + Sync>(&self, docs: &[S]) -> PipelineResult<TermMatrix> {
        let counts = self.count_terms(docs);
        let doc_freq = document_frequencies(&counts);
        let vocabulary = self.prune(&doc_freq, docs.len())?;

        let column: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.as_str(), i))
            .collect();

        let n_docs = docs.len() as f64;
        let idf: Vec<f64> = vocabulary
            .iter()
            .map(|term| {
                let df = doc_freq[term.as_str()] as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let rows: Vec<Vec<(usize, f64)>> = counts
            .par_iter()
            .map(|doc| {
                let mut row: Vec<(usize, f64)> = doc
                    .iter()
                    .filter_map(|(term, &tf)| {
                        column
                            .get(term.as_str())
                            .map(|&col| (col, tf as f64 * idf[col]))
                    })
                    .collect();
                // Column order fixes the summation order, so rows are bitwise reproducible.
                row.sort_unstable_by_key(|&(col, _)| col);
                let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for (_, w) in &mut row {
                        *w /= norm;
                    }
                }
                row
            })
            .collect();

        let matrix = CsrMatrix::from_rows(rows, vocabulary.len());
        info!(
            documents = matrix.n_rows(),
            vocabulary = vocabulary.len(),
            nnz = matrix.nnz(),
            "Built TF-IDF matrix"
        );

        Ok(TermMatrix {
            matrix,
            vocabulary,
            idf,
        })
    }

    /// Vocabulary only, as a bag-of-words count vectorizer would learn it.
    pub fn fit_vocabulary<S: AsRef<str> + Sync>(
        &self,
        docs: &[S],
    ) -> PipelineResult<BTreeSet<String>> {
        let counts = self.count_terms(docs);
        let doc_freq = document_frequencies(&counts);
        Ok(self.prune(&doc_freq, docs.len())?.into_iter().collect())
    }

    fn count_terms<S: AsRef<str> + Sync>(&self, docs: &[S]) -> Vec<HashMap<String, usize>> {
        docs.par_iter()
            .map(|doc| {
                let mut counts: HashMap<String, usize> = HashMap::new();
                for token in tokenize(doc.as_ref()) {
                    if !self.stop_words.contains(&token) {
                        *counts.entry(token).or_insert(0) += 1;
                    }
                }
                counts
            })
            .collect()
    }

    fn prune(
        &self,
        doc_freq: &HashMap<&str, usize>,
        n_docs: usize,
    ) -> PipelineResult<Vec<String>> {
        let max_docs = self
            .config
            .max_df
            .map_or(n_docs as f64, |ratio| ratio * n_docs as f64);
        if max_docs < self.config.min_df as f64 {
            return Err(PipelineError::DegenerateVocabulary(format!(
                "max_df allows {max_docs:.1} documents, fewer than min_df={}",
                self.config.min_df
            )));
        }

        let mut vocabulary: Vec<String> = doc_freq
            .iter()
            .filter(|&(_, &df)| df >= self.config.min_df && df as f64 <= max_docs)
            .map(|(term, _)| term.to_string())
            .collect();
        vocabulary.sort_unstable();

        if vocabulary.is_empty() {
            return Err(PipelineError::DegenerateVocabulary(format!(
                "no terms remain after pruning {} documents (min_df={}, max_df={:?})",
                n_docs, self.config.min_df, self.config.max_df
            )));
        }
        Ok(vocabulary)
    }
}

fn document_frequencies(counts: &[HashMap<String, usize>]) -> HashMap<&str, usize> {
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for doc in counts {
        for term in doc.keys() {
            *doc_freq.entry(term.as_str()).or_insert(0) += 1;
        }
    }
    doc_freq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<String> {
        vec![
            "the kettle boils water fast".to_string(),
            "kettle leaks water everywhere".to_string(),
            "great kettle, boils quickly".to_string(),
            "toaster burns bread".to_string(),
        ]
    }

    #[test]
    fn test_min_df_prunes_rare_terms() {
        let stop = StopWords::custom(["the"]);
        let config = VectorizerConfig {
            min_df: 2,
            max_df: None,
        };
        let tm = TfIdfVectorizer::new(config, &stop).fit_transform(&docs()).unwrap();
        assert_eq!(tm.vocabulary, vec!["boils", "kettle", "water"]);
        assert_eq!(tm.matrix.n_rows(), 4);
        assert_eq!(tm.matrix.n_cols(), 3);
        // the toaster document keeps a row, just an empty one
        assert_eq!(tm.matrix.row(3).0.len(), 0);
    }

    #[test]
    fn test_max_df_prunes_ubiquitous_terms() {
        let stop = StopWords::default();
        let config = VectorizerConfig {
            min_df: 1,
            max_df: Some(0.5),
        };
        let tm = TfIdfVectorizer::new(config, &stop).fit_transform(&docs()).unwrap();
        // "kettle" is in 3 of 4 documents
        assert!(!tm.vocabulary.contains(&"kettle".to_string()));
        assert!(tm.vocabulary.contains(&"boils".to_string()));
    }

    #[test]
    fn test_rows_are_unit_length() {
        let stop = StopWords::default();
        let config = VectorizerConfig {
            min_df: 1,
            max_df: None,
        };
        let tm = TfIdfVectorizer::new(config, &stop).fit_transform(&docs()).unwrap();
        for i in 0..tm.matrix.n_rows() {
            let norm: f64 = tm.matrix.row(i).1.iter().map(|v| v * v).sum();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rarer_terms_weigh_more() {
        let stop = StopWords::default();
        let config = VectorizerConfig {
            min_df: 1,
            max_df: None,
        };
        let tm = TfIdfVectorizer::new(config, &stop).fit_transform(&docs()).unwrap();
        let col = |t: &str| tm.vocabulary.iter().position(|v| v == t).unwrap();
        // doc 1: "kettle leaks water everywhere", kettle is common, leaks is not
        assert!(tm.matrix.get(1, col("leaks")) > tm.matrix.get(1, col("kettle")));
    }

    #[test]
    fn test_repeated_fits_are_bitwise_identical() {
        let words = [
            "kettle", "boils", "water", "lid", "spout", "handle", "steam", "quiet", "leaks",
            "cord", "base", "switch", "light", "fast", "slow", "hot",
        ];
        let corpus: Vec<String> = (0..200)
            .map(|i| {
                (0..12)
                    .map(|j| words[(i * 7 + j * j * 3 + j) % words.len()])
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        let stop = StopWords::default();
        let config = VectorizerConfig {
            min_df: 1,
            max_df: None,
        };
        let first = TfIdfVectorizer::new(config, &stop).fit_transform(&corpus).unwrap();
        for _ in 0..10 {
            let again = TfIdfVectorizer::new(config, &stop).fit_transform(&corpus).unwrap();
            assert_eq!(again.matrix, first.matrix);
        }
    }

    #[test]
    fn test_empty_vocabulary_is_an_error() {
        let stop = StopWords::default();
        let config = VectorizerConfig {
            min_df: 10,
            max_df: None,
        };
        let result = TfIdfVectorizer::new(config, &stop).fit_transform(&docs());
        assert!(matches!(result, Err(PipelineError::DegenerateVocabulary(_))));
    }

    #[test]
    fn test_stop_words_never_enter_vocabulary() {
        let stop = StopWords::custom(["kettle"]);
        let config = VectorizerConfig {
            min_df: 1,
            max_df: None,
        };
        let vocab = TfIdfVectorizer::new(config, &stop).fit_vocabulary(&docs()).unwrap();
        assert!(!vocab.contains("kettle"));
        assert!(vocab.contains("toaster"));
    }
}
