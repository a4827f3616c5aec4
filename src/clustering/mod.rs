// Clustering — density-based grouping of the 2-D embedding.

pub mod hdbscan;
pub mod kdtree;

pub use hdbscan::{Hdbscan, HdbscanConfig, NOISE};
