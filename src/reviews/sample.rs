// Sampling policy between ingestion and the core pipeline.
//
// Only verified purchases whose reviews most voters found helpful are kept,
// then a seeded uniform sample caps the working set.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::models::Review;

/// Helpful-vote ratio a review must strictly exceed to be kept.
pub const MIN_HELPFUL_RATIO: f64 = 0.5;

/// Keep only verified purchases with a helpful ratio above 0.5.
/// Rows nobody voted on have no ratio and are dropped.
pub fn is_trustworthy(review: &Review) -> bool {
    review.verified_purchase
        && review
            .helpful_ratio()
            .is_some_and(|ratio| ratio > MIN_HELPFUL_RATIO)
}

/// Filter, then draw up to `cap` rows uniformly with a fixed seed.
///
/// The sampled rows keep their input order, so the same file and seed always
/// yield the same sequence.
pub fn filter_and_sample(reviews: Vec<Review>, cap: usize, seed: u64) -> Vec<Review> {
    let kept: Vec<Review> = reviews.into_iter().filter(is_trustworthy).collect();
    seeded_sample(kept, cap, seed)
}

/// Up to `cap` of `items`, drawn uniformly with `seed`, in input order.
pub fn seeded_sample<T>(items: Vec<T>, cap: usize, seed: u64) -> Vec<T> {
    if items.len() <= cap {
        return items;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = vec![false; items.len()];
    for idx in rand::seq::index::sample(&mut rng, items.len(), cap) {
        picked[idx] = true;
    }
    items
        .into_iter()
        .zip(picked)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(id: usize, verified: bool, helpful: u32, total: u32) -> Review {
        Review {
            review_id: format!("R{id}"),
            product_title: "Widget".to_string(),
            review: "fine".to_string(),
            star_rating: 4,
            product_category: "Tools".to_string(),
            verified_purchase: verified,
            helpful_votes: helpful,
            total_votes: total,
        }
    }

    #[test]
    fn test_filter_rules() {
        assert!(is_trustworthy(&review(0, true, 3, 4)));
        // exactly half is not enough
        assert!(!is_trustworthy(&review(0, true, 2, 4)));
        assert!(!is_trustworthy(&review(0, false, 4, 4)));
        assert!(!is_trustworthy(&review(0, true, 0, 0)));
    }

    #[test]
    fn test_sample_is_capped_and_reproducible() {
        let rows: Vec<Review> = (0..200).map(|i| review(i, true, 5, 5)).collect();
        let a = filter_and_sample(rows.clone(), 50, 1729);
        let b = filter_and_sample(rows, 50, 1729);
        assert_eq!(a.len(), 50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_keeps_input_order() {
        let rows: Vec<Review> = (0..100).map(|i| review(i, true, 5, 5)).collect();
        let sample = filter_and_sample(rows, 10, 7);
        let ids: Vec<usize> = sample
            .iter()
            .map(|r| r.review_id[1..].parse().unwrap())
            .collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_small_input_is_not_sampled() {
        let rows: Vec<Review> = (0..5).map(|i| review(i, true, 5, 5)).collect();
        assert_eq!(filter_and_sample(rows, 100, 1729).len(), 5);
    }
}
