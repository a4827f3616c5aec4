// Review records as they flow into the core pipeline.

use serde::{Deserialize, Serialize};

/// Ratings at or below this are "bad"; above it are "good".
pub const BAD_RATING_MAX: u8 = 3;

/// One customer review. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: String,
    pub product_title: String,
    /// Headline and body, joined and trimmed.
    pub review: String,
    /// Star rating, 1 through 5.
    pub star_rating: u8,
    pub product_category: String,
    pub verified_purchase: bool,
    pub helpful_votes: u32,
    pub total_votes: u32,
}

impl Review {
    /// Document text used for vectorizing and topic labeling: title + review.
    pub fn text(&self) -> String {
        format!("{} {}", self.product_title, self.review)
    }

    pub fn is_bad(&self) -> bool {
        self.star_rating <= BAD_RATING_MAX
    }

    /// Helpful-vote ratio, or `None` when nobody voted.
    pub fn helpful_ratio(&self) -> Option<f64> {
        if self.total_votes == 0 {
            None
        } else {
            Some(self.helpful_votes as f64 / self.total_votes as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: u8, helpful: u32, total: u32) -> Review {
        Review {
            review_id: "R1".to_string(),
            product_title: "Kettle".to_string(),
            review: "Boils fast".to_string(),
            star_rating: rating,
            product_category: "Kitchen".to_string(),
            verified_purchase: true,
            helpful_votes: helpful,
            total_votes: total,
        }
    }

    #[test]
    fn test_text_joins_title_and_review() {
        assert_eq!(review(5, 0, 0).text(), "Kettle Boils fast");
    }

    #[test]
    fn test_rating_split_at_three() {
        assert!(review(3, 0, 0).is_bad());
        assert!(!review(4, 0, 0).is_bad());
    }

    #[test]
    fn test_helpful_ratio_undefined_without_votes() {
        assert_eq!(review(5, 0, 0).helpful_ratio(), None);
        assert_eq!(review(5, 3, 4).helpful_ratio(), Some(0.75));
    }
}
