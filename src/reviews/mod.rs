// Review data — ingestion from TSV dumps, filtering and sampling.

pub mod ingest;
pub mod models;
pub mod sample;

use std::path::Path;

use models::Review;

/// Human-readable dataset name for a file.
///
/// Multilingual dumps mix categories, so they get a fixed name. Otherwise the
/// first sampled row's category is title-cased with underscores as spaces.
pub fn dataset_name(path: &Path, sample: &[Review]) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if file_name.contains("multilingual") {
        return "Multilingual".to_string();
    }

    let category = sample
        .first()
        .map(|r| r.product_category.as_str())
        .unwrap_or("");
    let name = title_case(&category.replace('_', " "));
    if name.is_empty() {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown".to_string())
    } else {
        name
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(category: &str) -> Review {
        Review {
            review_id: "R1".to_string(),
            product_title: String::new(),
            review: String::new(),
            star_rating: 5,
            product_category: category.to_string(),
            verified_purchase: true,
            helpful_votes: 1,
            total_votes: 1,
        }
    }

    #[test]
    fn test_dataset_name_from_category() {
        let path = Path::new("data/amazon_reviews_us_Gift_Card_v1_00.tsv");
        assert_eq!(dataset_name(path, &[review("Gift_Card")]), "Gift Card");
        assert_eq!(dataset_name(path, &[review("DIGITAL MUSIC")]), "Digital Music");
    }

    #[test]
    fn test_dataset_name_multilingual() {
        let path = Path::new("data/amazon_reviews_multilingual_US_v1_00.tsv");
        assert_eq!(dataset_name(path, &[review("Books")]), "Multilingual");
    }
}
