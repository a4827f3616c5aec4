// TSV ingestion for Amazon customer-review dumps.
//
// The dumps are tab-separated with a header row and no quoting at all, so
// stray quote characters inside review bodies must be read literally. Null
// text fields become empty strings and the headline is folded into the body
// here, so nothing downstream re-normalizes text.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use super::models::Review;
use crate::error::{PipelineError, PipelineResult};

/// Raw row as it appears in the dump. Everything is optional text so a
/// missing column never fails deserialization on its own.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    review_id: Option<String>,
    #[serde(default)]
    product_title: Option<String>,
    #[serde(default)]
    product_category: Option<String>,
    #[serde(default)]
    star_rating: Option<String>,
    #[serde(default)]
    helpful_votes: Option<String>,
    #[serde(default)]
    total_votes: Option<String>,
    #[serde(default)]
    verified_purchase: Option<String>,
    #[serde(default)]
    review_headline: Option<String>,
    #[serde(default)]
    review_body: Option<String>,
}

/// Reviews read from one file, plus how many malformed rows were dropped.
#[derive(Debug)]
pub struct IngestedFile {
    pub reviews: Vec<Review>,
    pub skipped: usize,
}

/// Read every well-formed review from a TSV dump.
pub fn read_reviews(path: &Path) -> PipelineResult<IngestedFile> {
    let file = std::fs::File::open(path)
        .map_err(|e| PipelineError::Ingest(format!("{}: {e}", path.display())))?;
    read_reviews_from(file)
}

/// Same as [`read_reviews`] for any reader; used by tests with in-memory data.
pub fn read_reviews_from<R: std::io::Read>(reader: R) -> PipelineResult<IngestedFile> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut reviews = Vec::new();
    let mut skipped = 0usize;

    for (line, row) in rdr.deserialize::<RawRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                debug!(line, error = %e, "Skipping unreadable row");
                skipped += 1;
                continue;
            }
        };
        match into_review(row) {
            Some(review) => reviews.push(review),
            None => skipped += 1,
        }
    }

    if reviews.is_empty() {
        return Err(PipelineError::Ingest(format!(
            "no usable rows ({skipped} skipped)"
        )));
    }

    info!(rows = reviews.len(), skipped, "Read reviews");
    Ok(IngestedFile { reviews, skipped })
}

fn into_review(row: RawRow) -> Option<Review> {
    let star_rating: u8 = row.star_rating.as_deref()?.trim().parse().ok()?;
    if !(1..=5).contains(&star_rating) {
        return None;
    }

    let headline = row.review_headline.unwrap_or_default();
    let body = row.review_body.unwrap_or_default();
    let review = format!("{headline} {body}").trim().to_string();

    Some(Review {
        review_id: row.review_id.unwrap_or_default(),
        product_title: row.product_title.unwrap_or_default(),
        review,
        star_rating,
        product_category: row.product_category.unwrap_or_default(),
        verified_purchase: row
            .verified_purchase
            .as_deref()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("y")),
        helpful_votes: parse_count(row.helpful_votes.as_deref()),
        total_votes: parse_count(row.total_votes.as_deref()),
    })
}

fn parse_count(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "marketplace\tcustomer_id\treview_id\tproduct_id\tproduct_parent\tproduct_title\tproduct_category\tstar_rating\thelpful_votes\ttotal_votes\tvine\tverified_purchase\treview_headline\treview_body\treview_date\n";

    #[test]
    fn test_reads_rows_and_joins_headline() {
        let data = format!(
            "{HEADER}US\t1\tR1\tP1\t9\tKettle\tKitchen\t5\t3\t4\tN\tY\tGreat\tBoils \"fast\"\t2015-08-31\n"
        );
        let file = read_reviews_from(data.as_bytes()).unwrap();
        assert_eq!(file.reviews.len(), 1);
        let r = &file.reviews[0];
        assert_eq!(r.review, "Great Boils \"fast\"");
        assert_eq!(r.star_rating, 5);
        assert!(r.verified_purchase);
        assert_eq!((r.helpful_votes, r.total_votes), (3, 4));
    }

    #[test]
    fn test_missing_headline_is_empty_string() {
        let data = format!("{HEADER}US\t1\tR1\tP1\t9\tKettle\tKitchen\t2\t0\t0\tN\tN\t\tLeaks\t2015-08-31\n");
        let file = read_reviews_from(data.as_bytes()).unwrap();
        assert_eq!(file.reviews[0].review, "Leaks");
        assert!(!file.reviews[0].verified_purchase);
    }

    #[test]
    fn test_bad_rating_rows_are_skipped() {
        let data = format!(
            "{HEADER}US\t1\tR1\tP1\t9\tKettle\tKitchen\tseven\t0\t0\tN\tY\tx\ty\t2015\n\
             US\t1\tR2\tP1\t9\tKettle\tKitchen\t4\t0\t0\tN\tY\tx\ty\t2015\n"
        );
        let file = read_reviews_from(data.as_bytes()).unwrap();
        assert_eq!(file.reviews.len(), 1);
        assert_eq!(file.skipped, 1);
    }

    #[test]
    fn test_no_rows_is_an_ingest_error() {
        let result = read_reviews_from(HEADER.as_bytes());
        assert!(matches!(result, Err(PipelineError::Ingest(_))));
    }
}
