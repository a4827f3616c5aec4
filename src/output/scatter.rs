// Scatter export — per-document points for an external plotting tool.
//
// One JSON array per processed file, named after the dataset and the source
// file, so several dumps of one category never overwrite each other. Colors are assigned here so every
// consumer renders the same legend: unclustered is always light gray, other
// topics cycle through a fixed palette in sorted topic order.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::pipeline::AnnotatedReview;
use crate::topics::UNCLUSTERED;

pub const UNCLUSTERED_COLOR: &str = "#EEEEEE";

const PALETTE: [&str; 16] = [
    "#1F77B4", "#FF7F0E", "#2CA02C", "#D62728", "#9467BD", "#8C564B", "#E377C2", "#7F7F7F",
    "#BCBD22", "#17BECF", "#393B79", "#AD494A", "#637939", "#8C6D31", "#7B4173", "#3182BD",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint<'a> {
    pub x: f64,
    pub y: f64,
    pub topic: &'a str,
    pub rating: u8,
    pub text: &'a str,
    pub color: &'static str,
}

/// Topic to color for every topic present in `documents`.
pub fn topic_colors(documents: &[AnnotatedReview]) -> BTreeMap<&str, &'static str> {
    let topics: BTreeSet<&str> = documents.iter().map(|d| d.topic.as_str()).collect();
    let mut next = 0;
    topics
        .into_iter()
        .map(|topic| {
            if topic == UNCLUSTERED {
                (topic, UNCLUSTERED_COLOR)
            } else {
                let color = PALETTE[next % PALETTE.len()];
                next += 1;
                (topic, color)
            }
        })
        .collect()
}

pub fn scatter_points(documents: &[AnnotatedReview]) -> Vec<ScatterPoint<'_>> {
    let colors = topic_colors(documents);
    documents
        .iter()
        .map(|d| ScatterPoint {
            x: d.e1,
            y: d.e2,
            topic: &d.topic,
            rating: d.review.star_rating,
            text: &d.review.review,
            color: colors.get(d.topic.as_str()).copied().unwrap_or(UNCLUSTERED_COLOR),
        })
        .collect()
}

/// `<dir>/<dataset>_<source stem>_embeddings.json`, with spaces as `_`.
pub fn export_path(dir: &Path, dataset: &str, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{dataset}_{stem}_embeddings.json").replace(' ', "_");
    dir.join(name)
}

/// Write the scatter export for one source file and return its path.
pub fn write_scatter(
    dir: &Path,
    dataset: &str,
    source: &Path,
    documents: &[AnnotatedReview],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let path = export_path(dir, dataset, source);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &scatter_points(documents))?;
    writer.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reviews::models::Review;

    fn doc(topic: &str, rating: u8) -> AnnotatedReview {
        AnnotatedReview {
            review: Review {
                review_id: "R".to_string(),
                product_title: "Kettle".to_string(),
                review: format!("about {topic}"),
                star_rating: rating,
                product_category: "Kitchen".to_string(),
                verified_purchase: true,
                helpful_votes: 1,
                total_votes: 1,
            },
            e1: 0.5,
            e2: -1.0,
            cluster: if topic == UNCLUSTERED { -1 } else { 0 },
            topic: topic.to_string(),
        }
    }

    #[test]
    fn test_unclustered_is_always_light_gray() {
        let docs = vec![doc("lid", 1), doc(UNCLUSTERED, 5), doc("handle", 3)];
        let colors = topic_colors(&docs);
        assert_eq!(colors[UNCLUSTERED], UNCLUSTERED_COLOR);
        // sorted topic order: handle, lid
        assert_eq!(colors["handle"], PALETTE[0]);
        assert_eq!(colors["lid"], PALETTE[1]);
    }

    #[test]
    fn test_write_scatter_json() {
        let dir = tempfile::tempdir().unwrap();
        let docs = vec![doc("lid", 2), doc(UNCLUSTERED, 4)];
        let source = Path::new("data/kitchen.tsv");
        let path = write_scatter(dir.path(), "Home Kitchen", source, &docs).unwrap();
        assert!(path.ends_with("Home_Kitchen_kitchen_embeddings.json"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let points = json.as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0]["topic"], "lid");
        assert_eq!(points[0]["rating"], 2);
        assert_eq!(points[1]["color"], UNCLUSTERED_COLOR);
        assert_eq!(points[0]["x"], 0.5);
    }

    #[test]
    fn test_parts_of_one_category_get_separate_exports() {
        let dir = Path::new("out");
        let parts: BTreeSet<PathBuf> = ["v1_00", "v1_01", "v1_02"]
            .iter()
            .map(|part| {
                let source = PathBuf::from(format!("data/amazon_reviews_us_Books_{part}.tsv"));
                export_path(dir, "Books", &source)
            })
            .collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.contains(Path::new(
            "out/Books_amazon_reviews_us_Books_v1_01_embeddings.json"
        )));
    }
}
