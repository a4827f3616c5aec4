// Embedding — sparse term rows to 2-D coordinates.
//
// The pipeline only calls UmapProjector; the stages are public for testing.

pub mod fuzzy;
pub mod knn;
pub mod layout;
pub mod sparse;
pub mod umap;

pub use sparse::{CsrMatrix, Metric};
pub use umap::{Embedding, ProjectionConfig, UmapProjector, N_COMPONENTS};
