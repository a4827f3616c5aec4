// HDBSCAN over 2-D points.
//
// core distances -> mutual reachability MST -> single-linkage dendrogram ->
// condensed tree (min_cluster_size) -> excess-of-mass selection -> labels.
// The root of the condensed tree is never selected, so a data set with a
// single dense region comes out as all noise.

use rayon::prelude::*;
use tracing::{debug, info};

use super::kdtree::core_distances;
use crate::deadline::Deadline;
use crate::embedding::layout::Point;
use crate::error::{PipelineError, PipelineResult};

/// Label given to points outside every selected cluster.
pub const NOISE: i32 = -1;

/// Distances below this are treated as this, keeping lambda = 1/d finite.
const MIN_DISTANCE: f64 = 1e-12;
const DEADLINE_STRIDE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HdbscanConfig {
    /// Neighbor count behind each point's core distance.
    pub min_samples: usize,
    /// Smallest group the condensed tree keeps as a cluster.
    pub min_cluster_size: usize,
}

impl Default for HdbscanConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            min_cluster_size: 500,
        }
    }
}

/// One merge of the single-linkage dendrogram. Node ids below `n` are
/// points; merge `i` creates node `n + i`.
#[derive(Debug, Clone, Copy)]
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

/// One edge of the condensed tree.
#[derive(Debug, Clone, Copy)]
struct Condensed {
    parent: usize,
    child: usize,
    lambda: f64,
    child_size: usize,
}

pub struct Hdbscan {
    config: HdbscanConfig,
}

impl Hdbscan {
    pub fn new(config: HdbscanConfig) -> Self {
        Self { config }
    }

    /// Label every point; `NOISE` for unclaimed points, otherwise cluster
    /// ids `0..k` in the order the hierarchy created them.
    pub fn cluster(&self, points: &[Point], deadline: &Deadline) -> PipelineResult<Vec<i32>> {
        if let Some(bad) = points.iter().position(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(PipelineError::Projection(format!(
                "non-finite coordinate for document {bad} reached clustering"
            )));
        }
        let n = points.len();
        if n < 2 {
            return Ok(vec![NOISE; n]);
        }

        let core = core_distances(points, self.config.min_samples);
        let mst = mutual_reachability_mst(points, &core, deadline)?;
        deadline.check("clustering")?;
        let dendrogram = single_linkage(mst, n);
        let condensed = condense_tree(&dendrogram, n, self.config.min_cluster_size.max(2));
        let selected = select_clusters(&condensed, n);
        let labels = assign_labels(&condensed, &selected, n);

        let noise = labels.iter().filter(|&&l| l == NOISE).count();
        info!(
            documents = n,
            clusters = selected.len(),
            noise,
            "Density clustering complete"
        );
        Ok(labels)
    }

    /// Cluster only the points not flagged in `excluded`; flagged points are
    /// labeled `NOISE` without taking part in density estimation.
    pub fn cluster_masked(
        &self,
        points: &[Point],
        excluded: &[bool],
        deadline: &Deadline,
    ) -> PipelineResult<Vec<i32>> {
        let kept: Vec<usize> = (0..points.len())
            .filter(|&i| !excluded.get(i).copied().unwrap_or(false))
            .collect();
        if kept.len() == points.len() {
            return self.cluster(points, deadline);
        }
        debug!(
            excluded = points.len() - kept.len(),
            "Excluded points labeled noise"
        );

        let subset: Vec<Point> = kept.iter().map(|&i| points[i]).collect();
        let mut labels = vec![NOISE; points.len()];
        for (&i, label) in kept.iter().zip(self.cluster(&subset, deadline)?) {
            labels[i] = label;
        }
        Ok(labels)
    }
}

fn mutual_reachability(points: &[Point], core: &[f64], i: usize, j: usize) -> f64 {
    let d = ((points[i][0] - points[j][0]).powi(2) + (points[i][1] - points[j][1]).powi(2)).sqrt();
    d.max(core[i]).max(core[j])
}

#[derive(Clone, Copy)]
struct Frontier {
    distance: f64,
    from: usize,
    done: bool,
}

/// Dense Prim's algorithm. Each step relaxes every remaining point against
/// the newest tree member in parallel, then takes the closest (lowest index
/// on ties).
fn mutual_reachability_mst(
    points: &[Point],
    core: &[f64],
    deadline: &Deadline,
) -> PipelineResult<Vec<(usize, usize, f64)>> {
    let n = points.len();
    let mut frontier = vec![
        Frontier {
            distance: f64::INFINITY,
            from: 0,
            done: false,
        };
        n
    ];
    let mut edges = Vec::with_capacity(n - 1);
    let mut current = 0;
    frontier[current].done = true;

    for step in 1..n {
        if step % DEADLINE_STRIDE == 0 {
            deadline.check("clustering")?;
        }
        let next = frontier
            .par_iter_mut()
            .enumerate()
            .filter(|(_, f)| !f.done)
            .map(|(j, f)| {
                let d = mutual_reachability(points, core, current, j);
                if d < f.distance {
                    f.distance = d;
                    f.from = current;
                }
                (f.distance, j)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let Some((distance, j)) = next else { break };
        frontier[j].done = true;
        edges.push((frontier[j].from, j, distance));
        current = j;
    }
    debug!(edges = edges.len(), "Mutual reachability MST built");
    Ok(edges)
}

/// Union-find over dendrogram nodes; merging two roots creates a new node.
struct LinkageUnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    next: usize,
}

impl LinkageUnionFind {
    fn new(n: usize) -> Self {
        let total = 2 * n - 1;
        Self {
            parent: (0..total).collect(),
            size: (0..total).map(|i| usize::from(i < n)).collect(),
            next: n,
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let up = self.parent[x];
            self.parent[x] = root;
            x = up;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        self.parent[a] = self.next;
        self.parent[b] = self.next;
        self.size[self.next] = self.size[a] + self.size[b];
        self.next += 1;
    }
}

fn single_linkage(mut edges: Vec<(usize, usize, f64)>, n: usize) -> Vec<Merge> {
    edges.sort_by(|a, b| a.2.total_cmp(&b.2));
    let mut uf = LinkageUnionFind::new(n);
    edges
        .into_iter()
        .map(|(a, b, distance)| {
            let (left, right) = (uf.find(a), uf.find(b));
            let merge = Merge {
                left,
                right,
                distance,
                size: uf.size[left] + uf.size[right],
            };
            uf.union(left, right);
            merge
        })
        .collect()
}

fn node_size(dendrogram: &[Merge], n: usize, node: usize) -> usize {
    if node < n {
        1
    } else {
        dendrogram[node - n].size
    }
}

/// `node` and everything below it, breadth first.
fn subtree(dendrogram: &[Merge], n: usize, node: usize) -> Vec<usize> {
    let mut out = vec![node];
    let mut i = 0;
    while i < out.len() {
        let x = out[i];
        if x >= n {
            let merge = dendrogram[x - n];
            out.push(merge.left);
            out.push(merge.right);
        }
        i += 1;
    }
    out
}

fn lambda_of(distance: f64) -> f64 {
    1.0 / distance.max(MIN_DISTANCE)
}

/// Walk the dendrogram top-down. A split where both sides hold at least
/// `min_cluster_size` points births two clusters; otherwise the small side's
/// points fall out of the parent at that lambda and the large side keeps the
/// parent's identity. Condensed cluster ids start at `n` (the root).
fn condense_tree(dendrogram: &[Merge], n: usize, min_cluster_size: usize) -> Vec<Condensed> {
    let root = 2 * n - 2;
    let mut relabel = vec![0usize; 2 * n - 1];
    let mut ignore = vec![false; 2 * n - 1];
    let mut next_label = n + 1;
    relabel[root] = n;
    let mut out = Vec::new();

    for node in subtree(dendrogram, n, root) {
        if ignore[node] || node < n {
            continue;
        }
        let merge = dendrogram[node - n];
        let lambda = lambda_of(merge.distance);
        let parent = relabel[node];
        let left_size = node_size(dendrogram, n, merge.left);
        let right_size = node_size(dendrogram, n, merge.right);
        let left_big = left_size >= min_cluster_size;
        let right_big = right_size >= min_cluster_size;

        let fall_out = |side: usize, out: &mut Vec<Condensed>, ignore: &mut [bool]| {
            for x in subtree(dendrogram, n, side) {
                if x < n {
                    out.push(Condensed {
                        parent,
                        child: x,
                        lambda,
                        child_size: 1,
                    });
                }
                ignore[x] = true;
            }
        };

        match (left_big, right_big) {
            (true, true) => {
                for (side, size) in [(merge.left, left_size), (merge.right, right_size)] {
                    relabel[side] = next_label;
                    out.push(Condensed {
                        parent,
                        child: next_label,
                        lambda,
                        child_size: size,
                    });
                    next_label += 1;
                }
            }
            (false, false) => {
                fall_out(merge.left, &mut out, &mut ignore);
                fall_out(merge.right, &mut out, &mut ignore);
            }
            (false, true) => {
                relabel[merge.right] = parent;
                fall_out(merge.left, &mut out, &mut ignore);
            }
            (true, false) => {
                relabel[merge.left] = parent;
                fall_out(merge.right, &mut out, &mut ignore);
            }
        }
    }
    out
}

/// Highest cluster id in the condensed tree, plus one.
fn cluster_bound(condensed: &[Condensed], n: usize) -> usize {
    condensed
        .iter()
        .map(|c| c.parent.max(if c.child >= n { c.child } else { 0 }))
        .max()
        .map_or(n + 1, |m| m + 1)
}

/// Excess-of-mass stability of every condensed cluster, indexed by id - n.
fn stabilities(condensed: &[Condensed], n: usize) -> Vec<f64> {
    let bound = cluster_bound(condensed, n);
    let mut birth = vec![0.0; bound - n];
    for c in condensed.iter().filter(|c| c.child >= n) {
        birth[c.child - n] = c.lambda;
    }
    let mut stability = vec![0.0; bound - n];
    for c in condensed {
        stability[c.parent - n] += (c.lambda - birth[c.parent - n]) * c.child_size as f64;
    }
    stability
}

/// Excess-of-mass selection, bottom-up, root excluded. Returns the selected
/// cluster ids in ascending order.
fn select_clusters(condensed: &[Condensed], n: usize) -> Vec<usize> {
    let bound = cluster_bound(condensed, n);
    let mut stability = stabilities(condensed, n);
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); bound - n];
    for c in condensed.iter().filter(|c| c.child >= n) {
        children[c.parent - n].push(c.child);
    }
    let mut selected = vec![true; bound - n];
    selected[0] = false;

    // Children always carry larger ids than their parents.
    for node in (n + 1..bound).rev() {
        let subtree_stability: f64 = children[node - n].iter().map(|&c| stability[c - n]).sum();
        if subtree_stability > stability[node - n] {
            selected[node - n] = false;
            stability[node - n] = subtree_stability;
        } else {
            let mut stack = children[node - n].clone();
            while let Some(c) = stack.pop() {
                selected[c - n] = false;
                stack.extend(children[c - n].iter().copied());
            }
        }
    }
    (n + 1..bound).filter(|&c| selected[c - n]).collect()
}

/// Each point takes the label of its nearest selected ancestor.
fn assign_labels(condensed: &[Condensed], selected: &[usize], n: usize) -> Vec<i32> {
    let bound = cluster_bound(condensed, n);
    let mut parent_of = vec![usize::MAX; bound];
    for c in condensed {
        parent_of[c.child] = c.parent;
    }
    let mut label_of = vec![NOISE; bound];
    for (label, &c) in selected.iter().enumerate() {
        label_of[c] = label as i32;
    }

    (0..n)
        .map(|point| {
            let mut node = parent_of[point];
            while node != usize::MAX {
                if label_of[node] != NOISE {
                    return label_of[node];
                }
                node = parent_of[node];
            }
            NOISE
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Peaked blob: each coordinate is a sum of four uniforms.
    fn blob(rng: &mut StdRng, center: Point, count: usize) -> Vec<Point> {
        let mut bump = || (0..4).map(|_| rng.random::<f64>()).sum::<f64>() - 2.0;
        (0..count)
            .map(|_| [center[0] + bump(), center[1] + bump()])
            .collect()
    }

    fn small() -> Hdbscan {
        Hdbscan::new(HdbscanConfig {
            min_samples: 3,
            min_cluster_size: 10,
        })
    }

    #[test]
    fn test_two_blobs_and_an_outlier() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut points = blob(&mut rng, [0.0, 0.0], 60);
        points.extend(blob(&mut rng, [100.0, 100.0], 60));
        points.push([1000.0, -1000.0]);

        let labels = small().cluster(&points, &Deadline::unbounded()).unwrap();
        assert_eq!(labels.len(), 121);
        assert_eq!(labels[120], NOISE);

        let majority = |range: std::ops::Range<usize>| {
            let mut counts = std::collections::BTreeMap::new();
            for i in range {
                *counts.entry(labels[i]).or_insert(0) += 1;
            }
            counts.into_iter().max_by_key(|&(_, c)| c).unwrap()
        };
        let (a, a_count) = majority(0..60);
        let (b, b_count) = majority(60..120);
        assert!(a != NOISE && b != NOISE && a != b);
        assert!(a_count >= 54 && b_count >= 54);
    }

    #[test]
    fn test_labels_are_dense_from_zero() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut points = Vec::new();
        for c in 0..3 {
            points.extend(blob(&mut rng, [50.0 * c as f64, 0.0], 40));
        }
        let labels = small().cluster(&points, &Deadline::unbounded()).unwrap();
        let mut used: Vec<i32> = labels.iter().copied().filter(|&l| l != NOISE).collect();
        used.sort_unstable();
        used.dedup();
        assert_eq!(used, vec![0, 1, 2]);
    }

    #[test]
    fn test_single_region_is_all_noise() {
        let mut rng = StdRng::seed_from_u64(2);
        let points = blob(&mut rng, [0.0, 0.0], 8);
        let labels = small().cluster(&points, &Deadline::unbounded()).unwrap();
        assert!(labels.iter().all(|&l| l == NOISE));
    }

    #[test]
    fn test_non_finite_input_is_projection_error() {
        let points = vec![[0.0, 0.0], [f64::NAN, 1.0], [2.0, 2.0]];
        let err = small().cluster(&points, &Deadline::unbounded()).unwrap_err();
        assert!(matches!(err, PipelineError::Projection(_)));
    }

    #[test]
    fn test_empty_and_single_point() {
        assert!(small().cluster(&[], &Deadline::unbounded()).unwrap().is_empty());
        assert_eq!(
            small().cluster(&[[1.0, 1.0]], &Deadline::unbounded()).unwrap(),
            vec![NOISE]
        );
    }

    #[test]
    fn test_excluded_points_are_noise_and_ignored() {
        let mut rng = StdRng::seed_from_u64(19);
        let mut points = blob(&mut rng, [0.0, 0.0], 40);
        points.extend(blob(&mut rng, [100.0, 100.0], 40));
        // a dense third group that is excluded wholesale
        points.extend(blob(&mut rng, [-100.0, 100.0], 40));
        let excluded: Vec<bool> = (0..120).map(|i| i >= 80).collect();

        let labels = small()
            .cluster_masked(&points, &excluded, &Deadline::unbounded())
            .unwrap();
        assert!(labels[80..].iter().all(|&l| l == NOISE));
        let ids: std::collections::BTreeSet<i32> =
            labels.iter().copied().filter(|&l| l != NOISE).collect();
        assert_eq!(ids.len(), 2);
    }
}
