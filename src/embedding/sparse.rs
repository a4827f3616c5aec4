// Compressed sparse row matrix and distances over its rows.
//
// Hellinger treats each row as a discrete distribution over terms: rows are
// L1-normalized, square-rooted once up front, and the distance between two
// rows is sqrt(1 - <sqrt(p), sqrt(q)>). That turns every distance call into a
// sorted-index sparse dot product.

/// Row-major sparse matrix. Column indices within a row are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// Build from per-row `(column, value)` lists. Each row is sorted by column
    /// and zero entries are dropped.
    pub fn from_rows(rows: Vec<Vec<(usize, f64)>>, n_cols: usize) -> Self {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for mut row in rows {
            row.sort_unstable_by_key(|&(col, _)| col);
            for (col, value) in row {
                if value != 0.0 {
                    indices.push(col);
                    data.push(value);
                }
            }
            indptr.push(indices.len());
        }
        Self {
            n_cols,
            indptr,
            indices,
            data,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        (&self.indices[start..end], &self.data[start..end])
    }

    /// Dense value lookup; intended for tests and diagnostics.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (cols, values) = self.row(i);
        match cols.binary_search(&j) {
            Ok(pos) => values[pos],
            Err(_) => 0.0,
        }
    }
}

/// Distance measures over sparse term rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// Rows as discrete distributions over terms.
    #[default]
    Hellinger,
    /// One minus the cosine similarity.
    Cosine,
}

/// Distance between two rows with no term in common, under either metric.
/// Nothing is farther.
pub const DISJOINT_DISTANCE: f64 = 1.0;

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hellinger" => Ok(Metric::Hellinger),
            "cosine" => Ok(Metric::Cosine),
            other => Err(format!(
                "unknown metric '{other}', expected one of: hellinger, cosine"
            )),
        }
    }
}

/// Rows normalized once so every distance is a single sparse dot product.
#[derive(Debug, Clone)]
pub struct MetricRows {
    metric: Metric,
    matrix: CsrMatrix,
    empty: Vec<bool>,
}

impl MetricRows {
    pub fn new(matrix: &CsrMatrix, metric: Metric) -> Self {
        let mut rows = Vec::with_capacity(matrix.n_rows());
        let mut empty = Vec::with_capacity(matrix.n_rows());
        for i in 0..matrix.n_rows() {
            let (cols, values) = matrix.row(i);
            let norm: f64 = match metric {
                Metric::Hellinger => values.iter().map(|v| v.abs()).sum(),
                Metric::Cosine => values.iter().map(|v| v * v).sum::<f64>().sqrt(),
            };
            if norm > 0.0 {
                rows.push(
                    cols.iter()
                        .zip(values)
                        .map(|(&c, &v)| match metric {
                            Metric::Hellinger => (c, (v.abs() / norm).sqrt()),
                            Metric::Cosine => (c, v / norm),
                        })
                        .collect(),
                );
                empty.push(false);
            } else {
                rows.push(Vec::new());
                empty.push(true);
            }
        }
        Self {
            metric,
            matrix: CsrMatrix::from_rows(rows, matrix.n_cols()),
            empty,
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.empty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.empty.is_empty()
    }

    /// Distance between rows `i` and `j`. An empty row shares no term with
    /// any other row, empty or not, so it sits at [`DISJOINT_DISTANCE`] from
    /// all of them.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        if self.empty[i] || self.empty[j] {
            return DISJOINT_DISTANCE;
        }
        let (ci, vi) = self.matrix.row(i);
        let (cj, vj) = self.matrix.row(j);
        let mut dot = 0.0;
        let (mut a, mut b) = (0, 0);
        while a < ci.len() && b < cj.len() {
            match ci[a].cmp(&cj[b]) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    dot += vi[a] * vj[b];
                    a += 1;
                    b += 1;
                }
            }
        }
        match self.metric {
            Metric::Hellinger => (1.0 - dot).max(0.0).sqrt(),
            Metric::Cosine => (1.0 - dot).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> CsrMatrix {
        CsrMatrix::from_rows(
            vec![
                vec![(2, 1.0), (0, 1.0)],
                vec![(0, 2.0), (2, 2.0)],
                vec![(1, 5.0)],
                vec![],
            ],
            3,
        )
    }

    #[test]
    fn test_rows_are_sorted() {
        let m = matrix();
        assert_eq!(m.row(0).0, &[0, 2]);
        assert_eq!(m.nnz(), 5);
        assert_eq!(m.get(1, 2), 2.0);
        assert_eq!(m.get(2, 0), 0.0);
    }

    #[test]
    fn test_hellinger_ignores_scale() {
        let rows = MetricRows::new(&matrix(), Metric::Hellinger);
        assert!(rows.distance(0, 1).abs() < 1e-9);
    }

    #[test]
    fn test_hellinger_disjoint_support_is_one() {
        let rows = MetricRows::new(&matrix(), Metric::Hellinger);
        assert!((rows.distance(0, 2) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hellinger_empty_rows() {
        let rows = MetricRows::new(&matrix(), Metric::Hellinger);
        assert_eq!(rows.distance(3, 3), 0.0);
        assert_eq!(rows.distance(3, 0), DISJOINT_DISTANCE);
    }

    #[test]
    fn test_two_empty_rows_are_disjoint() {
        let m = CsrMatrix::from_rows(vec![vec![], vec![], vec![(0, 1.0)]], 1);
        for metric in [Metric::Hellinger, Metric::Cosine] {
            let rows = MetricRows::new(&m, metric);
            assert_eq!(rows.distance(0, 1), DISJOINT_DISTANCE);
        }
    }

    #[test]
    fn test_cosine_distance() {
        let m = CsrMatrix::from_rows(vec![vec![(0, 3.0)], vec![(0, 1.0), (1, 1.0)]], 2);
        let rows = MetricRows::new(&m, Metric::Cosine);
        assert!((rows.distance(0, 1) - (1.0 - 0.5f64.sqrt())).abs() < 1e-9);
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("Hellinger".parse::<Metric>(), Ok(Metric::Hellinger));
        assert!("euclid".parse::<Metric>().is_err());
    }

    #[test]
    fn test_hellinger_partial_overlap() {
        // p = (0.5, 0, 0.5), q = (1, 0, 0): sqrt(1 - sqrt(0.5))
        let m = CsrMatrix::from_rows(vec![vec![(0, 1.0), (2, 1.0)], vec![(0, 3.0)]], 3);
        let rows = MetricRows::new(&m, Metric::Hellinger);
        let expected = (1.0 - 0.5f64.sqrt()).sqrt();
        assert!((rows.distance(0, 1) - expected).abs() < 1e-9);
    }
}
