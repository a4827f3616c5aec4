// Fuzzy simplicial set — the weighted graph the layout tries to preserve.
//
// Each point gets a local scale: rho is the distance to its nearest
// non-identical neighbor, sigma is found by binary search so the memberships
// of its k neighbors sum to log2(k). Directed memberships are then combined
// with the probabilistic t-conorm w = a + b - a*b.
//
// Neighbors at or beyond the disconnection distance contribute nothing: a
// point whose every neighbor is that far ends up with no edges at all.

use super::knn::KnnGraph;

const SMOOTH_K_ITERS: usize = 64;
const SMOOTH_K_TOLERANCE: f64 = 1e-5;
const MIN_K_DIST_SCALE: f64 = 1e-3;

/// Symmetric weighted graph in coordinate form. Each undirected edge appears
/// twice, once per direction, sorted by (head, tail).
#[derive(Debug, Clone)]
pub struct FuzzyGraph {
    pub n_points: usize,
    pub heads: Vec<usize>,
    pub tails: Vec<usize>,
    pub weights: Vec<f64>,
}

impl FuzzyGraph {
    pub fn n_edges(&self) -> usize {
        self.weights.len()
    }

    pub fn max_weight(&self) -> f64 {
        self.weights.iter().copied().fold(0.0, f64::max)
    }

    /// Points with no edge.
    pub fn isolated(&self) -> Vec<bool> {
        let mut isolated = vec![true; self.n_points];
        for &h in &self.heads {
            isolated[h] = false;
        }
        isolated
    }

    /// Connected components with at least one edge, largest first and ties
    /// by lowest member. Each comes with its own graph over local indices.
    pub fn components(&self) -> Vec<Component> {
        let n = self.n_points;
        // heads are sorted, so each point's edges are one contiguous range
        let mut offsets = vec![0usize; n + 1];
        for &h in &self.heads {
            offsets[h + 1] += 1;
        }
        for i in 0..n {
            offsets[i + 1] += offsets[i];
        }

        let mut label = vec![usize::MAX; n];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for start in 0..n {
            if label[start] != usize::MAX || offsets[start] == offsets[start + 1] {
                continue;
            }
            let id = groups.len();
            label[start] = id;
            let mut members = vec![start];
            let mut cursor = 0;
            while cursor < members.len() {
                let p = members[cursor];
                cursor += 1;
                for &q in &self.tails[offsets[p]..offsets[p + 1]] {
                    if label[q] == usize::MAX {
                        label[q] = id;
                        members.push(q);
                    }
                }
            }
            members.sort_unstable();
            groups.push(members);
        }

        let mut local = vec![0usize; n];
        for members in &groups {
            for (pos, &i) in members.iter().enumerate() {
                local[i] = pos;
            }
        }
        let mut components: Vec<Component> = groups
            .into_iter()
            .map(|members| Component {
                graph: FuzzyGraph {
                    n_points: members.len(),
                    heads: Vec::new(),
                    tails: Vec::new(),
                    weights: Vec::new(),
                },
                members,
            })
            .collect();
        for e in 0..self.n_edges() {
            let (h, t) = (self.heads[e], self.tails[e]);
            let graph = &mut components[label[h]].graph;
            graph.heads.push(local[h]);
            graph.tails.push(local[t]);
            graph.weights.push(self.weights[e]);
        }

        components.sort_by(|a, b| {
            b.members
                .len()
                .cmp(&a.members.len())
                .then(a.members[0].cmp(&b.members[0]))
        });
        components
    }

    /// Weighted degree of every point.
    pub fn degrees(&self) -> Vec<f64> {
        let mut deg = vec![0.0; self.n_points];
        for (&h, &w) in self.heads.iter().zip(&self.weights) {
            deg[h] += w;
        }
        deg
    }
}

/// One connected piece of a [`FuzzyGraph`].
#[derive(Debug, Clone)]
pub struct Component {
    /// Original point indices, ascending. Local index `i` is `members[i]`.
    pub members: Vec<usize>,
    pub graph: FuzzyGraph,
}

impl Component {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Per-point `(rho, sigma)` normalizers. Neighbors at `max_distance` or
/// beyond are left out.
pub fn smooth_knn_dist(knn: &KnnGraph, max_distance: f64) -> Vec<(f64, f64)> {
    let k = knn.k();
    let target = (k as f64).log2();
    let all_mean = {
        let total: f64 = knn.distances.iter().flatten().sum();
        let count = knn.distances.iter().map(Vec::len).sum::<usize>().max(1);
        total / count as f64
    };

    knn.distances
        .iter()
        .map(|dists| {
            let rho = dists
                .iter()
                .copied()
                .find(|&d| d > 0.0 && d < max_distance)
                .unwrap_or(0.0);

            let (mut lo, mut hi, mut mid) = (0.0f64, f64::INFINITY, 1.0f64);
            for _ in 0..SMOOTH_K_ITERS {
                let psum: f64 = dists
                    .iter()
                    .skip(1)
                    .filter(|&&d| d < max_distance)
                    .map(|&d| {
                        let gap = d - rho;
                        if gap > 0.0 {
                            (-gap / mid).exp()
                        } else {
                            1.0
                        }
                    })
                    .sum();
                if (psum - target).abs() < SMOOTH_K_TOLERANCE {
                    break;
                }
                if psum > target {
                    hi = mid;
                    mid = (lo + hi) / 2.0;
                } else {
                    lo = mid;
                    mid = if hi.is_infinite() {
                        mid * 2.0
                    } else {
                        (lo + hi) / 2.0
                    };
                }
            }

            let floor_scale = if rho > 0.0 {
                let own_mean = dists.iter().sum::<f64>() / dists.len().max(1) as f64;
                MIN_K_DIST_SCALE * own_mean
            } else {
                MIN_K_DIST_SCALE * all_mean
            };
            (rho, mid.max(floor_scale))
        })
        .collect()
}

/// Build the symmetric fuzzy graph from a neighbor graph, dropping every
/// neighbor at `max_distance` or beyond.
pub fn fuzzy_simplicial_set(knn: &KnnGraph, max_distance: f64) -> FuzzyGraph {
    let n = knn.n_points();
    let scales = smooth_knn_dist(knn, max_distance);

    // (row, col, weight, transposed)
    let mut entries: Vec<(usize, usize, f64, bool)> = Vec::with_capacity(2 * n * knn.k());
    for (i, (neighbors, dists)) in knn.indices.iter().zip(&knn.distances).enumerate() {
        let (rho, sigma) = scales[i];
        for (&j, &d) in neighbors.iter().zip(dists) {
            if j == i || d >= max_distance {
                continue;
            }
            let w = if d - rho <= 0.0 || sigma == 0.0 {
                1.0
            } else {
                (-(d - rho) / sigma).exp()
            };
            if w > 0.0 {
                entries.push((i, j, w, false));
                entries.push((j, i, w, true));
            }
        }
    }
    entries.sort_unstable_by(|a, b| (a.0, a.1, a.3).cmp(&(b.0, b.1, b.3)));

    let mut graph = FuzzyGraph {
        n_points: n,
        heads: Vec::new(),
        tails: Vec::new(),
        weights: Vec::new(),
    };
    let mut idx = 0;
    while idx < entries.len() {
        let (row, col) = (entries[idx].0, entries[idx].1);
        let (mut forward, mut backward) = (0.0, 0.0);
        while idx < entries.len() && entries[idx].0 == row && entries[idx].1 == col {
            if entries[idx].3 {
                backward = entries[idx].2;
            } else {
                forward = entries[idx].2;
            }
            idx += 1;
        }
        let w = forward + backward - forward * backward;
        if w > 0.0 {
            graph.heads.push(row);
            graph.tails.push(col);
            graph.weights.push(w);
        }
    }
    graph
}
