// Review samples — clustered reviews split by rating side, ready for reading.
//
// From the clustered (non-noise) documents of one file, up to `cap` low-rating
// and up to `cap` high-rating reviews are drawn with a fixed seed. Each row
// names its "<category> <topic>" and flattens rating, title and review into
// one line of text.

use std::fmt;

use serde::Serialize;

use super::run::AnnotatedReview;
use crate::reviews::sample::seeded_sample;

/// Which rating side a sample row was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bad,
    Good,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bad => "bad",
            Side::Good => "good",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sampled review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    pub side: Side,
    /// Lowercased category, a space, then the topic label.
    pub product_topic: String,
    pub product_category: String,
    pub topic: String,
    pub text: String,
}

impl SampleRow {
    fn from_document(side: Side, doc: &AnnotatedReview) -> Self {
        let review = &doc.review;
        Self {
            side,
            product_topic: format!("{} {}", review.product_category.to_lowercase(), doc.topic),
            product_category: review.product_category.clone(),
            topic: doc.topic.clone(),
            text: format!(
                "Rating: {}, Title: {}, Review: {}",
                review.star_rating, review.product_title, review.review
            ),
        }
    }
}

/// Bad-side rows, then good-side rows, each at most `cap` long.
///
/// Noise documents never appear. Both sides draw with the same `seed`, and
/// each keeps the documents' order.
pub fn review_samples(documents: &[AnnotatedReview], cap: usize, seed: u64) -> Vec<SampleRow> {
    let (bad, good): (Vec<&AnnotatedReview>, Vec<&AnnotatedReview>) = documents
        .iter()
        .filter(|d| d.cluster >= 0)
        .partition(|d| d.review.is_bad());

    let mut rows: Vec<SampleRow> = seeded_sample(bad, cap, seed)
        .into_iter()
        .map(|d| SampleRow::from_document(Side::Bad, d))
        .collect();
    rows.extend(
        seeded_sample(good, cap, seed)
            .into_iter()
            .map(|d| SampleRow::from_document(Side::Good, d)),
    );
    rows
}
