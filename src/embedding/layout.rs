// Low-dimensional layout of a fuzzy graph.
//
// Each connected component of the graph starts from its own spectral
// embedding (falling back to a seeded random one when the spectrum is
// degenerate), scaled into a box of its own on a grid. Then the usual
// attract/repel stochastic gradient descent runs: every edge is sampled in
// proportion to its weight and pulls its endpoints together, and each sample
// draws a few random points to push away. Points without edges keep their
// starting position. Everything runs on one thread from one seeded RNG so a
// seed pins down the coordinates.

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, warn};

use super::fuzzy::FuzzyGraph;
use crate::deadline::Deadline;
use crate::error::PipelineResult;

/// A point in the learned two-dimensional space.
pub type Point = [f64; 2];

const GRADIENT_CLIP: f64 = 4.0;
const SPECTRAL_ITERS: usize = 200;
const MIN_SPECTRAL_POINTS: usize = 3;
const LAYOUT_SCALE: f64 = 10.0;
/// Grid pitch between component boxes: one box plus an equal gap.
const CELL: f64 = 2.0 * LAYOUT_SCALE;
const INIT_JITTER: f64 = 1e-4;

/// Knobs of the stochastic gradient descent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub a: f64,
    pub b: f64,
    pub n_epochs: usize,
    pub negative_sample_rate: usize,
    pub learning_rate: f64,
    pub repulsion_strength: f64,
}

/// Fit the curve 1 / (1 + a * d^(2b)) to the target membership function
/// that is 1 below `min_dist` and decays as exp(-(d - min_dist) / spread).
///
/// Least squares over 300 samples of [0, 3 * spread], solved by a grid
/// search that narrows around the best cell each round.
pub fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    let xs: Vec<f64> = (0..300).map(|i| 3.0 * spread * i as f64 / 299.0).collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();
    let loss = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let fit = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (fit - y) * (fit - y)
            })
            .sum()
    };

    const STEPS: usize = 24;
    let (mut a_lo, mut a_hi, mut b_lo, mut b_hi) = (0.05, 5.0, 0.2, 2.0);
    let (mut best_a, mut best_b) = (1.0, 1.0);
    for _ in 0..8 {
        let a_step = (a_hi - a_lo) / STEPS as f64;
        let b_step = (b_hi - b_lo) / STEPS as f64;
        let mut best_loss = f64::INFINITY;
        for ia in 0..=STEPS {
            let a = a_lo + a_step * ia as f64;
            for ib in 0..=STEPS {
                let b = b_lo + b_step * ib as f64;
                let l = loss(a, b);
                if l < best_loss {
                    best_loss = l;
                    best_a = a;
                    best_b = b;
                }
            }
        }
        a_lo = (best_a - 2.0 * a_step).max(1e-3);
        a_hi = best_a + 2.0 * a_step;
        b_lo = (best_b - 2.0 * b_step).max(1e-3);
        b_hi = best_b + 2.0 * b_step;
    }
    (best_a, best_b)
}

/// Initial coordinates. Every connected component gets a spectral layout in
/// its own 10 x 10 box, boxes laid out row by row on a grid, largest
/// component first. Points without edges are scattered over the whole grid.
pub fn initial_layout(graph: &FuzzyGraph, rng: &mut StdRng) -> Vec<Point> {
    let components = graph.components();
    let cols = ((components.len() as f64).sqrt().ceil() as usize).max(1);
    let rows = components.len().div_ceil(cols).max(1);

    let mut points = vec![[0.0, 0.0]; graph.n_points];
    let mut placed = vec![false; graph.n_points];
    for (c, component) in components.iter().enumerate() {
        let local = match spectral_layout(&component.graph, rng) {
            Some(local) => local,
            None => {
                if component.len() >= MIN_SPECTRAL_POINTS {
                    warn!(
                        component = c,
                        points = component.len(),
                        "Spectral initialisation degenerate, using random layout"
                    );
                }
                random_layout(component.len(), rng)
            }
        };
        let offset = [(c % cols) as f64 * CELL, (c / cols) as f64 * CELL];
        for (&i, p) in component.members.iter().zip(local) {
            points[i] = [p[0] + offset[0], p[1] + offset[1]];
            placed[i] = true;
        }
    }

    let extent = [
        (cols - 1) as f64 * CELL + LAYOUT_SCALE,
        (rows - 1) as f64 * CELL + LAYOUT_SCALE,
    ];
    let mut isolated = 0usize;
    for (p, &done) in points.iter_mut().zip(&placed) {
        if !done {
            *p = [rng.random::<f64>() * extent[0], rng.random::<f64>() * extent[1]];
            isolated += 1;
        }
    }
    debug!(
        components = components.len(),
        isolated,
        "Initial layout placed"
    );
    points
}

/// Uniform random layout in [0, 10]^2.
pub fn random_layout(n: usize, rng: &mut StdRng) -> Vec<Point> {
    (0..n)
        .map(|_| {
            [
                rng.random::<f64>() * LAYOUT_SCALE,
                rng.random::<f64>() * LAYOUT_SCALE,
            ]
        })
        .collect()
}

/// Subspace iteration on M = (I + D^-1/2 W D^-1/2) / 2, with the trivial
/// eigenvector sqrt(D) projected out. M is positive semi-definite, so power
/// steps converge toward its largest eigenvalues. Meant for a connected
/// graph; min-max scaled into [0, 10] with a little jitter.
fn spectral_layout(graph: &FuzzyGraph, rng: &mut StdRng) -> Option<Vec<Point>> {
    let n = graph.n_points;
    if n < MIN_SPECTRAL_POINTS {
        return None;
    }
    let degrees = Array1::from_vec(graph.degrees());
    let inv_sqrt = degrees.mapv(|d| if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 });
    let mut trivial = degrees.mapv(f64::sqrt);
    if !normalize(&mut trivial) {
        return None;
    }

    // Off-diagonal entries of M, one per edge.
    let scaled: Vec<f64> = (0..graph.n_edges())
        .map(|e| 0.5 * inv_sqrt[graph.heads[e]] * graph.weights[e] * inv_sqrt[graph.tails[e]])
        .collect();

    let mut basis = Array2::from_shape_fn((n, 2), |_| rng.random::<f64>() - 0.5);
    orthonormalize(&mut basis, &trivial)?;
    for _ in 0..SPECTRAL_ITERS {
        let mut next = &basis * 0.5;
        for (e, &m) in scaled.iter().enumerate() {
            let (h, t) = (graph.heads[e], graph.tails[e]);
            for c in 0..2 {
                next[[h, c]] += m * basis[[t, c]];
            }
        }
        basis = next;
        orthonormalize(&mut basis, &trivial)?;
    }

    rescale(&mut basis)?;
    let points: Vec<Point> = basis
        .rows()
        .into_iter()
        .map(|row| {
            [
                row[0] + (rng.random::<f64>() - 0.5) * INIT_JITTER,
                row[1] + (rng.random::<f64>() - 0.5) * INIT_JITTER,
            ]
        })
        .collect();
    debug!(points = n, "Spectral initialisation complete");
    Some(points)
}

fn normalize(v: &mut Array1<f64>) -> bool {
    let norm = v.dot(&*v).sqrt();
    if !norm.is_finite() || norm < 1e-12 {
        return false;
    }
    *v /= norm;
    true
}

/// Gram-Schmidt on the columns of `basis`, against `fixed` and then against
/// each earlier column.
fn orthonormalize(basis: &mut Array2<f64>, fixed: &Array1<f64>) -> Option<()> {
    for i in 0..basis.ncols() {
        let mut v = basis.column(i).to_owned();
        let dot = v.dot(fixed);
        v.scaled_add(-dot, fixed);
        for j in 0..i {
            let u = basis.column(j);
            let dot = v.dot(&u);
            v.scaled_add(-dot, &u);
        }
        if !normalize(&mut v) {
            return None;
        }
        basis.column_mut(i).assign(&v);
    }
    Some(())
}

/// Min-max scale each column into [0, 10]. None if a column has no spread.
fn rescale(basis: &mut Array2<f64>) -> Option<()> {
    for mut col in basis.columns_mut() {
        let lo = col.fold(f64::INFINITY, |acc, &x| acc.min(x));
        let hi = col.fold(f64::NEG_INFINITY, |acc, &x| acc.max(x));
        let span = hi - lo;
        if !span.is_finite() || span <= 0.0 {
            return None;
        }
        col.mapv_inplace(|x| LAYOUT_SCALE * (x - lo) / span);
    }
    Some(())
}

fn clip(v: f64) -> f64 {
    v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

fn dist_sq(p: &Point, q: &Point) -> f64 {
    (p[0] - q[0]) * (p[0] - q[0]) + (p[1] - q[1]) * (p[1] - q[1])
}

/// Run the attract/repel optimisation in place.
pub fn optimize_layout(
    points: &mut [Point],
    graph: &FuzzyGraph,
    params: &LayoutParams,
    rng: &mut StdRng,
    deadline: &Deadline,
    progress: bool,
) -> PipelineResult<()> {
    let n = points.len();
    let n_epochs = params.n_epochs.max(1);
    let max_weight = graph.max_weight();
    if max_weight <= 0.0 || n == 0 {
        return Ok(());
    }

    // Edges too weak to be sampled even once are dropped.
    let min_weight = max_weight / n_epochs as f64;
    let edges: Vec<(usize, usize, f64)> = (0..graph.n_edges())
        .filter(|&e| graph.weights[e] >= min_weight)
        .map(|e| (graph.heads[e], graph.tails[e], max_weight / graph.weights[e]))
        .collect();

    let neg_rate = params.negative_sample_rate.max(1) as f64;
    let mut next_sample: Vec<f64> = edges.iter().map(|e| e.2).collect();
    let mut next_negative: Vec<f64> = edges.iter().map(|e| e.2 / neg_rate).collect();

    let (a, b) = (params.a, params.b);
    let gamma = params.repulsion_strength;

    let pb = if progress {
        let pb = ProgressBar::new(n_epochs as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("  Layout [{bar:30}] {pos}/{len} ({eta})") {
            pb.set_style(style);
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    for epoch in 0..n_epochs {
        deadline.check("layout")?;
        let alpha = params.learning_rate * (1.0 - epoch as f64 / n_epochs as f64);
        let epoch_f = epoch as f64;

        for (e, &(j, k, epochs_per_sample)) in edges.iter().enumerate() {
            if next_sample[e] > epoch_f {
                continue;
            }

            let other = points[k];
            let current = points[j];
            let d2 = dist_sq(&current, &other);
            let attract = if d2 > 0.0 {
                -2.0 * a * b * d2.powf(b - 1.0) / (a * d2.powf(b) + 1.0)
            } else {
                0.0
            };
            for axis in 0..2 {
                let grad = clip(attract * (current[axis] - other[axis]));
                points[j][axis] += grad * alpha;
                points[k][axis] -= grad * alpha;
            }
            next_sample[e] += epochs_per_sample;

            let per_negative = epochs_per_sample / neg_rate;
            let n_neg = ((epoch_f - next_negative[e]) / per_negative).max(0.0) as usize;
            for _ in 0..n_neg {
                let r = rng.random_range(0..n);
                if r == j {
                    continue;
                }
                let current = points[j];
                let other = points[r];
                let d2 = dist_sq(&current, &other);
                if d2 <= 0.0 {
                    continue;
                }
                let repel = 2.0 * gamma * b / ((0.001 + d2) * (a * d2.powf(b) + 1.0));
                for axis in 0..2 {
                    let grad = clip(repel * (current[axis] - other[axis]));
                    points[j][axis] += grad * alpha;
                }
            }
            next_negative[e] += n_neg as f64 * per_negative;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn two_cliques() -> FuzzyGraph {
        // two 5-cliques joined by nothing
        let mut heads = Vec::new();
        let mut tails = Vec::new();
        let mut weights = Vec::new();
        for group in [0usize, 5] {
            for i in group..group + 5 {
                for j in group..group + 5 {
                    if i != j {
                        heads.push(i);
                        tails.push(j);
                        weights.push(1.0);
                    }
                }
            }
        }
        FuzzyGraph {
            n_points: 10,
            heads,
            tails,
            weights,
        }
    }

    #[test]
    fn test_ab_params_for_zero_min_dist() {
        let (a, b) = find_ab_params(1.0, 0.0);
        assert!((a - 1.929).abs() < 0.03, "a = {a}");
        assert!((b - 0.7915).abs() < 0.01, "b = {b}");
    }

    #[test]
    fn test_ab_params_for_default_min_dist() {
        let (a, b) = find_ab_params(1.0, 0.1);
        assert!((a - 1.577).abs() < 0.03, "a = {a}");
        assert!((b - 0.895).abs() < 0.01, "b = {b}");
    }

    fn in_box(p: &Point, origin: Point) -> bool {
        (0..2).all(|axis| {
            p[axis].is_finite()
                && p[axis] > origin[axis] - 0.01
                && p[axis] < origin[axis] + LAYOUT_SCALE + 0.01
        })
    }

    #[test]
    fn test_each_component_gets_its_own_box() {
        let mut rng = StdRng::seed_from_u64(1);
        let points = initial_layout(&two_cliques(), &mut rng);
        assert_eq!(points.len(), 10);
        assert!(points[..5].iter().all(|p| in_box(p, [0.0, 0.0])));
        assert!(points[5..].iter().all(|p| in_box(p, [CELL, 0.0])));
    }

    #[test]
    fn test_isolated_points_are_placed_and_never_move() {
        let mut graph = two_cliques();
        graph.n_points = 12;
        let mut rng = StdRng::seed_from_u64(3);
        let mut points = initial_layout(&graph, &mut rng);
        let before = [points[10], points[11]];
        for p in &before {
            assert!(p[0] >= 0.0 && p[0] <= CELL + LAYOUT_SCALE);
            assert!(p[1] >= 0.0 && p[1] <= LAYOUT_SCALE);
        }

        let params = LayoutParams {
            a: 1.9,
            b: 0.8,
            n_epochs: 50,
            negative_sample_rate: 5,
            learning_rate: 1.0,
            repulsion_strength: 1.0,
        };
        optimize_layout(&mut points, &graph, &params, &mut rng, &Deadline::unbounded(), false)
            .unwrap();
        assert_eq!([points[10], points[11]], before);
    }

    #[test]
    fn test_connected_graph_fills_one_box() {
        // a ring of 12 with chords, one component
        let mut heads = Vec::new();
        let mut tails = Vec::new();
        for i in 0..12usize {
            for j in [(i + 11) % 12, (i + 1) % 12, (i + 6) % 12] {
                heads.push(i);
                tails.push(j);
            }
        }
        let mut edges: Vec<(usize, usize)> = heads.into_iter().zip(tails).collect();
        edges.sort_unstable();
        let graph = FuzzyGraph {
            n_points: 12,
            heads: edges.iter().map(|e| e.0).collect(),
            tails: edges.iter().map(|e| e.1).collect(),
            weights: vec![1.0; edges.len()],
        };
        let mut rng = StdRng::seed_from_u64(5);
        let points = initial_layout(&graph, &mut rng);
        assert!(points.iter().all(|p| in_box(p, [0.0, 0.0])));
        let spread = |axis: usize| {
            let lo = points.iter().map(|p| p[axis]).fold(f64::INFINITY, f64::min);
            let hi = points.iter().map(|p| p[axis]).fold(f64::NEG_INFINITY, f64::max);
            hi - lo
        };
        assert!(spread(0) > 9.9 && spread(1) > 9.9);
    }

    #[test]
    fn test_optimized_cliques_stay_apart() {
        let graph = two_cliques();
        let mut rng = StdRng::seed_from_u64(1729);
        let mut points = initial_layout(&graph, &mut rng);
        let (a, b) = find_ab_params(1.0, 0.0);
        let params = LayoutParams {
            a,
            b,
            n_epochs: 200,
            negative_sample_rate: 5,
            learning_rate: 1.0,
            repulsion_strength: 1.0,
        };
        optimize_layout(&mut points, &graph, &params, &mut rng, &Deadline::unbounded(), false)
            .unwrap();

        let centroid = |range: std::ops::Range<usize>| -> Point {
            let len = range.len() as f64;
            let mut c = [0.0, 0.0];
            for i in range {
                c[0] += points[i][0] / len;
                c[1] += points[i][1] / len;
            }
            c
        };
        let (ca, cb) = (centroid(0..5), centroid(5..10));
        let between = dist_sq(&ca, &cb).sqrt();
        let within = (0..5).map(|i| dist_sq(&points[i], &ca).sqrt()).fold(0.0, f64::max);
        assert!(between > within, "between {between}, within {within}");
    }

    #[test]
    fn test_expired_deadline_stops_layout() {
        let graph = two_cliques();
        let mut rng = StdRng::seed_from_u64(1);
        let mut points = random_layout(10, &mut rng);
        let params = LayoutParams {
            a: 1.9,
            b: 0.8,
            n_epochs: 10,
            negative_sample_rate: 5,
            learning_rate: 1.0,
            repulsion_strength: 1.0,
        };
        let deadline = Deadline::new(std::time::Duration::ZERO);
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(optimize_layout(&mut points, &graph, &params, &mut rng, &deadline, false).is_err());
    }
}
