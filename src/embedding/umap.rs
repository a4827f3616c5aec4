// Two-dimensional manifold projection of the term matrix.
//
// neighbor graph -> fuzzy simplicial set -> spectral init -> SGD layout.
//
// Documents that share no term are never neighbors. A document left with no
// neighbor at all is marked isolated; it keeps a random position and takes no
// part in the layout.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use super::fuzzy::fuzzy_simplicial_set;
use super::knn::nearest_neighbors;
use super::layout::{find_ab_params, initial_layout, optimize_layout, LayoutParams, Point};
use super::sparse::{CsrMatrix, Metric, MetricRows, DISJOINT_DISTANCE};
use crate::deadline::Deadline;
use crate::error::{PipelineError, PipelineResult};

/// Output dimensionality. Downstream clustering and export assume 2-D points.
pub const N_COMPONENTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionConfig {
    /// Neighbors per point, counting the point itself.
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    pub metric: Metric,
    /// Defaults to 500 epochs for up to 10,000 points and 200 beyond.
    pub n_epochs: Option<usize>,
    pub negative_sample_rate: usize,
    pub learning_rate: f64,
    pub repulsion_strength: f64,
    pub seed: u64,
    /// Show an epoch progress bar on stderr.
    pub progress: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 30,
            min_dist: 0.0,
            spread: 1.0,
            metric: Metric::Hellinger,
            n_epochs: None,
            negative_sample_rate: 5,
            learning_rate: 1.0,
            repulsion_strength: 1.0,
            seed: 1729,
            progress: false,
        }
    }
}

/// One coordinate pair per input row, in row order.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    points: Vec<Point>,
    isolated: Vec<bool>,
}

impl Embedding {
    pub fn new(points: Vec<Point>, isolated: Vec<bool>) -> Self {
        debug_assert_eq!(points.len(), isolated.len());
        Self { points, isolated }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Per row: true when the row had no neighbor sharing a term.
    pub fn isolated(&self) -> &[bool] {
        &self.isolated
    }
}

pub struct UmapProjector {
    config: ProjectionConfig,
}

impl UmapProjector {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    /// Project every row of `matrix` to the plane.
    pub fn project(&self, matrix: &CsrMatrix, deadline: &Deadline) -> PipelineResult<Embedding> {
        let cfg = &self.config;
        let n = matrix.n_rows();
        if cfg.n_neighbors < 2 {
            return Err(PipelineError::Projection(format!(
                "n_neighbors must be at least 2, got {}",
                cfg.n_neighbors
            )));
        }
        if cfg.n_neighbors >= n {
            return Err(PipelineError::Projection(format!(
                "n_neighbors ({}) must be smaller than the number of documents ({n})",
                cfg.n_neighbors
            )));
        }

        let rows = MetricRows::new(matrix, cfg.metric);
        let knn = nearest_neighbors(&rows, cfg.n_neighbors, cfg.seed);
        deadline.check("neighbor graph")?;

        let graph = fuzzy_simplicial_set(&knn, DISJOINT_DISTANCE);
        let isolated = graph.isolated();
        info!(
            documents = n,
            edges = graph.n_edges(),
            isolated = isolated.iter().filter(|&&i| i).count(),
            metric = ?cfg.metric,
            "Fuzzy neighbor graph built"
        );

        let (a, b) = find_ab_params(cfg.spread, cfg.min_dist);
        let params = LayoutParams {
            a,
            b,
            n_epochs: cfg
                .n_epochs
                .unwrap_or(if n <= 10_000 { 500 } else { 200 }),
            negative_sample_rate: cfg.negative_sample_rate,
            learning_rate: cfg.learning_rate,
            repulsion_strength: cfg.repulsion_strength,
        };

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut points = initial_layout(&graph, &mut rng);
        optimize_layout(&mut points, &graph, &params, &mut rng, deadline, cfg.progress)?;

        if let Some(bad) = points.iter().position(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(PipelineError::Projection(format!(
                "layout produced a non-finite coordinate for document {bad}"
            )));
        }
        info!(documents = n, epochs = params.n_epochs, "Projection complete");
        Ok(Embedding::new(points, isolated))
    }
}
