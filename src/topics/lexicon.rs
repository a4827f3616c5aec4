// Differential lexicon — what unhappy reviewers say that happy ones don't.
//
// Per topic: split members into low (rating <= 3) and high ratings, learn a
// count-vectorizer vocabulary for each side independently, take the two set
// differences, and boil each down to a ranked keyword phrase.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::tfidf::{TfIdfVectorizer, VectorizerConfig};
use super::traits::KeywordExtractor;
use crate::error::PipelineWarning;
use crate::text::stopwords::StopWords;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexiconConfig {
    /// Minimum document frequency for a term to enter a side's vocabulary.
    pub min_df: usize,
    /// Keywords kept per side.
    pub top_k: usize,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            min_df: 5,
            top_k: 30,
        }
    }
}

/// One document as the lexicon sees it.
#[derive(Debug, Clone, Copy)]
pub struct RatedText<'a> {
    pub text: &'a str,
    pub star_rating: u8,
    pub topic: &'a str,
}

impl RatedText<'_> {
    fn is_bad(&self) -> bool {
        self.star_rating <= crate::reviews::models::BAD_RATING_MAX
    }
}

/// Per-topic summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub topic: String,
    pub bad_count: usize,
    pub good_count: usize,
    /// `bad_count / good_count`; positive infinity when there are no good reviews.
    pub ranking: f64,
    pub bad_keywords: String,
    pub good_keywords: String,
    pub product_category: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexicon {
    /// Sorted by topic.
    pub entries: Vec<LexiconEntry>,
    pub warnings: Vec<PipelineWarning>,
}

/// Vocabulary terms unique to each side: `(bad - good, good - bad)`.
pub fn unique_terms(
    bad: &BTreeSet<String>,
    good: &BTreeSet<String>,
) -> (BTreeSet<String>, BTreeSet<String>) {
    (
        bad.difference(good).cloned().collect(),
        good.difference(bad).cloned().collect(),
    )
}

pub struct LexiconExtractor<'a> {
    config: LexiconConfig,
    stop_words: &'a StopWords,
    extractor: &'a dyn KeywordExtractor,
}

impl<'a> LexiconExtractor<'a> {
    pub fn new(
        config: LexiconConfig,
        stop_words: &'a StopWords,
        extractor: &'a dyn KeywordExtractor,
    ) -> Self {
        Self {
            config,
            stop_words,
            extractor,
        }
    }

    /// Vocabulary of one side. Too few documents, or nothing surviving
    /// `min_df`, is an empty vocabulary rather than an error.
    fn vocabulary(&self, texts: &[&str]) -> BTreeSet<String> {
        if texts.is_empty() {
            return BTreeSet::new();
        }
        let config = VectorizerConfig {
            min_df: self.config.min_df,
            max_df: None,
        };
        TfIdfVectorizer::new(config, self.stop_words)
            .fit_vocabulary(texts)
            .unwrap_or_default()
    }

    fn summarize(&self, terms: &BTreeSet<String>) -> String {
        if terms.is_empty() {
            return String::new();
        }
        let joined = terms.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
        self.extractor.extract(&joined, self.config.top_k).join(" ")
    }

    fn entry(&self, topic: &str, docs: &[RatedText<'_>], product_category: &str) -> LexiconEntry {
        let (bad, good): (Vec<&RatedText<'_>>, Vec<&RatedText<'_>>) =
            docs.iter().partition(|d| d.is_bad());
        let bad_texts: Vec<&str> = bad.iter().map(|d| d.text).collect();
        let good_texts: Vec<&str> = good.iter().map(|d| d.text).collect();

        let (bad_unique, good_unique) =
            unique_terms(&self.vocabulary(&bad_texts), &self.vocabulary(&good_texts));

        LexiconEntry {
            topic: topic.to_string(),
            bad_count: bad.len(),
            good_count: good.len(),
            ranking: if good.is_empty() {
                f64::INFINITY
            } else {
                bad.len() as f64 / good.len() as f64
            },
            bad_keywords: self.summarize(&bad_unique),
            good_keywords: self.summarize(&good_unique),
            product_category: product_category.to_string(),
        }
    }

    /// One entry per distinct topic string, sorted by topic.
    pub fn extract(&self, docs: &[RatedText<'_>], product_category: &str) -> Lexicon {
        let mut by_topic: BTreeMap<&str, Vec<RatedText<'_>>> = BTreeMap::new();
        for doc in docs {
            by_topic.entry(doc.topic).or_default().push(*doc);
        }
        let groups: Vec<(&str, Vec<RatedText<'_>>)> = by_topic.into_iter().collect();

        let entries: Vec<LexiconEntry> = groups
            .par_iter()
            .map(|(topic, members)| self.entry(topic, members, product_category))
            .collect();

        let warnings: Vec<PipelineWarning> = entries
            .iter()
            .filter(|e| !e.ranking.is_finite())
            .map(|e| {
                warn!(topic = %e.topic, bad = e.bad_count, "No high-rating reviews, ranking undefined");
                PipelineWarning::UndefinedRanking {
                    topic: e.topic.clone(),
                    bad_count: e.bad_count,
                }
            })
            .collect();

        info!(
            topics = entries.len(),
            category = product_category,
            "Differential lexicon extracted"
        );
        Lexicon { entries, warnings }
    }
}
