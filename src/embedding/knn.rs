// Nearest-neighbor graph construction.
//
// Small inputs get an exact parallel brute-force search. Larger inputs use
// NN-descent: start from random neighbor lists and repeatedly try the
// neighbors of neighbors, keeping whatever is closer. Candidate distances are
// computed in parallel per block of points but applied to the heaps in point
// order, so the result depends only on the seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use super::sparse::MetricRows;

/// Inputs at or below this size get an exact search.
pub const BRUTE_FORCE_MAX: usize = 4096;

const MAX_DESCENT_ITERS: usize = 16;
const DESCENT_DELTA: f64 = 0.001;
const JOIN_BLOCK: usize = 2048;

/// Anything neighbor search can measure.
pub trait PointDistance: Sync {
    fn n_points(&self) -> usize;
    fn distance(&self, i: usize, j: usize) -> f64;
}

impl PointDistance for MetricRows {
    fn n_points(&self) -> usize {
        self.len()
    }

    fn distance(&self, i: usize, j: usize) -> f64 {
        MetricRows::distance(self, i, j)
    }
}

/// The k nearest neighbors of every point, nearest first. Each point is its
/// own first neighbor at distance zero.
#[derive(Debug, Clone)]
pub struct KnnGraph {
    pub indices: Vec<Vec<usize>>,
    pub distances: Vec<Vec<f64>>,
}

impl KnnGraph {
    pub fn n_points(&self) -> usize {
        self.indices.len()
    }

    pub fn k(&self) -> usize {
        self.indices.first().map_or(0, Vec::len)
    }
}

/// Build a k-nearest-neighbor graph; `k` counts the point itself and must be
/// smaller than the number of points.
pub fn nearest_neighbors<D: PointDistance>(points: &D, k: usize, seed: u64) -> KnnGraph {
    let n = points.n_points();
    debug_assert!(k < n, "k must be smaller than the number of points");
    if n <= BRUTE_FORCE_MAX {
        exact_neighbors(points, k)
    } else {
        nn_descent(points, k, seed)
    }
}

/// Exact search, comparing every pair.
pub fn exact_neighbors<D: PointDistance>(points: &D, k: usize) -> KnnGraph {
    let n = points.n_points();
    let rows: Vec<(Vec<usize>, Vec<f64>)> = (0..n)
        .into_par_iter()
        .map(|i| -> (Vec<usize>, Vec<f64>) {
            let mut all: Vec<(f64, usize)> = (0..n)
                .map(|j| (if i == j { 0.0 } else { points.distance(i, j) }, j))
                .collect();
            all.sort_by(|a, b| order_candidates(i, *a, *b));
            all.truncate(k);
            all.into_iter().map(|(d, j)| (j, d)).unzip()
        })
        .collect();
    let (indices, distances) = rows.into_iter().unzip();
    KnnGraph { indices, distances }
}

/// Self first, then ascending distance, then ascending index.
fn order_candidates(owner: usize, a: (f64, usize), b: (f64, usize)) -> std::cmp::Ordering {
    (a.1 != owner)
        .cmp(&(b.1 != owner))
        .then(a.0.total_cmp(&b.0))
        .then(a.1.cmp(&b.1))
}

/// A bounded, sorted neighbor list. `fresh` marks entries not yet used as
/// join candidates.
struct NeighborHeap {
    owner: usize,
    entries: Vec<(f64, usize, bool)>,
    capacity: usize,
}

impl NeighborHeap {
    fn new(owner: usize, capacity: usize) -> Self {
        Self {
            owner,
            entries: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    fn push(&mut self, distance: f64, index: usize) -> bool {
        if self.entries.len() == self.capacity {
            if let Some(&(worst, worst_idx, _)) = self.entries.last() {
                let worse = distance
                    .total_cmp(&worst)
                    .then(index.cmp(&worst_idx))
                    .is_ge();
                if worse {
                    return false;
                }
            }
        }
        if self.entries.iter().any(|&(_, j, _)| j == index) {
            return false;
        }
        let owner = self.owner;
        let pos = self
            .entries
            .partition_point(|&(d, j, _)| order_candidates(owner, (d, j), (distance, index)).is_lt());
        self.entries.insert(pos, (distance, index, true));
        self.entries.truncate(self.capacity);
        true
    }
}

fn nn_descent<D: PointDistance>(points: &D, k: usize, seed: u64) -> KnnGraph {
    let n = points.n_points();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut heaps: Vec<NeighborHeap> = (0..n).map(|i| NeighborHeap::new(i, k)).collect();
    for (i, heap) in heaps.iter_mut().enumerate() {
        heap.push(0.0, i);
        while heap.entries.len() < k {
            let j = rng.random_range(0..n);
            heap.push(points.distance(i, j), j);
        }
    }

    let max_candidates = k;
    for iteration in 0..MAX_DESCENT_ITERS {
        let (new_cands, old_cands) = build_candidates(&mut heaps, max_candidates, &mut rng);

        let mut updates = 0usize;
        for block_start in (0..n).step_by(JOIN_BLOCK) {
            let block_end = (block_start + JOIN_BLOCK).min(n);
            let proposals: Vec<Vec<(usize, usize, f64)>> = (block_start..block_end)
                .into_par_iter()
                .map(|i| local_join(points, &new_cands[i], &old_cands[i]))
                .collect();
            for (a, b, d) in proposals.into_iter().flatten() {
                if heaps[a].push(d, b) {
                    updates += 1;
                }
                if heaps[b].push(d, a) {
                    updates += 1;
                }
            }
        }

        debug!(iteration, updates, "NN-descent pass");
        if (updates as f64) <= DESCENT_DELTA * (k * n) as f64 {
            break;
        }
    }

    let (indices, distances): (Vec<Vec<usize>>, Vec<Vec<f64>>) = heaps
        .into_iter()
        .map(|heap| -> (Vec<usize>, Vec<f64>) {
            heap.entries.into_iter().map(|(d, j, _)| (j, d)).unzip()
        })
        .unzip();
    info!(points = n, k, "Approximate neighbor graph built");
    KnnGraph { indices, distances }
}

/// Split every heap into fresh and already-joined candidates, including
/// reverse neighbors, capped at `max_candidates` per list.
fn build_candidates(
    heaps: &mut [NeighborHeap],
    max_candidates: usize,
    rng: &mut StdRng,
) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    let n = heaps.len();
    let mut new_cands: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut old_cands: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, heap) in heaps.iter().enumerate() {
        for &(_, j, fresh) in &heap.entries {
            if j == i {
                continue;
            }
            if fresh {
                new_cands[i].push(j);
                new_cands[j].push(i);
            } else {
                old_cands[i].push(j);
                old_cands[j].push(i);
            }
        }
    }

    for list in new_cands.iter_mut().chain(old_cands.iter_mut()) {
        list.sort_unstable();
        list.dedup();
        if list.len() > max_candidates {
            list.shuffle(rng);
            list.truncate(max_candidates);
            list.sort_unstable();
        }
    }

    // Anything sampled as a fresh candidate has now been joined.
    for (i, heap) in heaps.iter_mut().enumerate() {
        for entry in &mut heap.entries {
            if entry.2 && new_cands[i].binary_search(&entry.1).is_ok() {
                entry.2 = false;
            }
        }
    }

    (new_cands, old_cands)
}

fn local_join<D: PointDistance>(
    points: &D,
    new: &[usize],
    old: &[usize],
) -> Vec<(usize, usize, f64)> {
    let mut out = Vec::new();
    for (x, &a) in new.iter().enumerate() {
        for &b in &new[x + 1..] {
            out.push((a, b, points.distance(a, b)));
        }
        for &b in old {
            if a != b {
                out.push((a, b, points.distance(a, b)));
            }
        }
    }
    out
}
