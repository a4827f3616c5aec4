// Two-dimensional k-d tree for exact k-nearest-neighbor queries.

use rayon::prelude::*;

use crate::embedding::layout::Point;

const LEAF_SIZE: usize = 16;

enum Node {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

pub struct KdTree<'a> {
    points: &'a [Point],
    order: Vec<usize>,
    nodes: Vec<Node>,
    root: usize,
}

impl<'a> KdTree<'a> {
    pub fn new(points: &'a [Point]) -> Self {
        let mut tree = Self {
            points,
            order: (0..points.len()).collect(),
            nodes: Vec::new(),
            root: 0,
        };
        tree.root = tree.build(0, points.len());
        tree
    }

    fn build(&mut self, start: usize, end: usize) -> usize {
        if end - start <= LEAF_SIZE {
            self.nodes.push(Node::Leaf { start, end });
            return self.nodes.len() - 1;
        }

        // split on the wider axis at the median
        let slice = &self.order[start..end];
        let spread = |axis: usize| {
            let (lo, hi) = slice.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                let v = self.points[i][axis];
                (lo.min(v), hi.max(v))
            });
            hi - lo
        };
        let axis = if spread(0) >= spread(1) { 0 } else { 1 };
        let mid = (end - start) / 2;
        let points = self.points;
        self.order[start..end].select_nth_unstable_by(mid, |&a, &b| {
            points[a][axis].total_cmp(&points[b][axis]).then(a.cmp(&b))
        });
        let value = points[self.order[start + mid]][axis];

        let left = self.build(start, start + mid);
        let right = self.build(start + mid, end);
        self.nodes.push(Node::Split {
            axis,
            value,
            left,
            right,
        });
        self.nodes.len() - 1
    }

    /// The `k` points nearest to `query` as `(distance, index)`, nearest
    /// first, ties broken by index.
    pub fn nearest(&self, query: &Point, k: usize) -> Vec<(f64, usize)> {
        let mut best: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        if k > 0 {
            self.search(self.root, query, k, &mut best);
        }
        best.into_iter().map(|(d2, i)| (d2.sqrt(), i)).collect()
    }

    fn search(&self, node: usize, query: &Point, k: usize, best: &mut Vec<(f64, usize)>) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &i in &self.order[start..end] {
                    let p = self.points[i];
                    let d2 = (p[0] - query[0]).powi(2) + (p[1] - query[1]).powi(2);
                    let candidate = (d2, i);
                    let full = best.len() == k;
                    if full {
                        if let Some(worst) = best.last() {
                            if d2.total_cmp(&worst.0).then(i.cmp(&worst.1)).is_ge() {
                                continue;
                            }
                        }
                    }
                    let pos = best.partition_point(|b| {
                        b.0.total_cmp(&candidate.0).then(b.1.cmp(&candidate.1)).is_lt()
                    });
                    best.insert(pos, candidate);
                    best.truncate(k);
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.search(near, query, k, best);
                let worst = best.last().map_or(f64::INFINITY, |b| b.0);
                if best.len() < k || diff * diff <= worst {
                    self.search(far, query, k, best);
                }
            }
        }
    }
}

/// Distance from every point to its `min_samples`-th nearest other point.
/// Clamped to the number of other points available.
pub fn core_distances(points: &[Point], min_samples: usize) -> Vec<f64> {
    if points.len() < 2 {
        return vec![0.0; points.len()];
    }
    let k = min_samples.clamp(1, points.len() - 1) + 1;
    let tree = KdTree::new(points);
    points
        .par_iter()
        .map(|p| tree.nearest(p, k).last().map_or(0.0, |&(d, _)| d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brute(points: &[Point], query: &Point, k: usize) -> Vec<usize> {
        let mut all: Vec<(f64, usize)> = points
            .iter()
            .enumerate()
            .map(|(i, p)| (((p[0] - query[0]).powi(2) + (p[1] - query[1]).powi(2)), i))
            .collect();
        all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        all.into_iter().take(k).map(|(_, i)| i).collect()
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(3);
        let points: Vec<Point> = (0..500)
            .map(|_| [rng.random::<f64>() * 50.0, rng.random::<f64>() * 50.0])
            .collect();
        let tree = KdTree::new(&points);
        for q in points.iter().take(40) {
            let got: Vec<usize> = tree.nearest(q, 7).into_iter().map(|(_, i)| i).collect();
            assert_eq!(got, brute(&points, q, 7));
        }
    }

    #[test]
    fn test_core_distance_excludes_self() {
        let points = vec![[0.0, 0.0], [1.0, 0.0], [3.0, 0.0], [6.0, 0.0]];
        let core = core_distances(&points, 2);
        assert_eq!(core, vec![3.0, 2.0, 3.0, 5.0]);
    }

    #[test]
    fn test_core_distance_clamped_for_tiny_inputs() {
        let points = vec![[0.0, 0.0], [0.0, 4.0]];
        assert_eq!(core_distances(&points, 10), vec![4.0, 4.0]);
    }
}
