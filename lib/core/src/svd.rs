//! Dimensionality Reducer
//!
//! Randomized truncated SVD (Halko, Martinsson, Tropp). A seeded random sketch
//! finds the dominant range of the TF-IDF matrix, power iterations sharpen it,
//! and the small projected problem is solved exactly with a Jacobi
//! eigendecomposition. The output is `U * Sigma`, one dense row
//! per description.
//!
//! ## Rank clamping
//!
//! The effective rank is `min(n_components, rows, vocabulary)`. Asking for
//! more components than the corpus can supply is not an error; the result
//! simply has fewer columns and records both numbers.
//!
//! The clamp follows the matrix shape, not the rank of the data. Descriptions
//! that are permutations of each other ("RED MUG" and "MUG RED") give
//! identical rows, so trailing columns can carry a singular value of zero.
//! [`ReducedMatrix::numerical_rank`] counts only the informative ones.

use crate::{EmbeddingMatrix, Error, Result, Vector};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

pub const DEFAULT_COMPONENTS: usize = 50;
pub const DEFAULT_SEED: u64 = 42;

const MAX_JACOBI_SWEEPS: usize = 64;
const ZERO_COLUMN_EPS: f64 = 1e-10;
/// Singular values below this fraction of the largest one count as zero
const RANK_TOLERANCE: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducerConfig {
    pub n_components: usize,
    pub seed: u64,
    /// Power iterations over the sketch
    pub n_iter: usize,
    /// Extra sketch columns beyond the target rank
    pub oversamples: usize,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            n_components: DEFAULT_COMPONENTS,
            seed: DEFAULT_SEED,
            n_iter: 5,
            oversamples: 10,
        }
    }
}

/// Dense document coordinates in the reduced space
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedMatrix {
    rows: Vec<Vector>,
    singular_values: Vec<f32>,
    requested_rank: usize,
}

impl ReducedMatrix {
    #[inline]
    pub fn rows(&self) -> &[Vector] {
        &self.rows
    }

    #[inline]
    pub fn row(&self, index: usize) -> Option<&Vector> {
        self.rows.get(index)
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns actually produced. This is the shape-clamped rank;
    /// for rank-deficient corpora the trailing columns may have a zero
    /// singular value and contribute nothing to distances.
    #[inline]
    pub fn rank(&self) -> usize {
        self.singular_values.len()
    }

    /// Columns whose singular value is non-zero relative to the largest
    pub fn numerical_rank(&self) -> usize {
        let largest = self.singular_values.first().copied().unwrap_or(0.0);
        if largest <= 0.0 {
            return 0;
        }
        self.singular_values
            .iter()
            .filter(|&&sigma| sigma > largest * RANK_TOLERANCE)
            .count()
    }

    #[inline]
    pub fn requested_rank(&self) -> usize {
        self.requested_rank
    }

    #[inline]
    pub fn is_clamped(&self) -> bool {
        self.rank() < self.requested_rank
    }

    /// Descending
    #[inline]
    pub fn singular_values(&self) -> &[f32] {
        &self.singular_values
    }
}

/// Largest rank a corpus of this shape can support for `requested`
#[inline]
pub fn clamp_rank(requested: usize, rows: usize, cols: usize) -> usize {
    requested.min(rows).min(cols)
}

#[derive(Debug, Clone, Default)]
pub struct TruncatedSvd {
    config: ReducerConfig,
}

impl TruncatedSvd {
    pub fn new(config: ReducerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    pub fn fit_transform(&self, matrix: &EmbeddingMatrix) -> Result<ReducedMatrix> {
        if self.config.n_components == 0 {
            return Err(Error::InvalidConfig("n_components must be at least 1".to_string()));
        }

        let (m, n) = (matrix.n_rows(), matrix.n_cols());
        if m == 0 || n == 0 {
            return Err(Error::EmptyVocabulary);
        }

        let rank = clamp_rank(self.config.n_components, m, n);
        if rank < self.config.n_components {
            debug!(
                requested = self.config.n_components,
                rank,
                rows = m,
                vocabulary = n,
                "Clamping SVD rank to corpus size"
            );
        }
        let sketch = (rank + self.config.oversamples).min(m.min(n));

        // Range finder: Q spans the dominant column space of A
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let omega = Array2::<f64>::from_shape_fn((n, sketch), |_| rng.random_range(-1.0..1.0));
        let mut q = orthonormalize(multiply(matrix, &omega));
        for _ in 0..self.config.n_iter {
            let z = orthonormalize(multiply_transposed(matrix, &q));
            q = orthonormalize(multiply(matrix, &z));
        }

        // B = Q^T A; eigenvectors of B B^T are the left singular vectors of B
        let bt = multiply_transposed(matrix, &q);
        let gram = bt.t().dot(&bt);
        let (eigenvalues, eigenvectors) = symmetric_eigen(gram);

        let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
        order.sort_by(|&a, &b| {
            eigenvalues[b]
                .partial_cmp(&eigenvalues[a])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        });
        order.truncate(rank);

        let singular: Vec<f64> = order
            .iter()
            .map(|&i| eigenvalues[i].max(0.0).sqrt())
            .collect();
        let w = eigenvectors.select(Axis(1), &order);
        let mut u = q.dot(&w);
        flip_signs(&mut u);

        let rows = u
            .outer_iter()
            .map(|row| {
                Vector::new(
                    row.iter()
                        .zip(&singular)
                        .map(|(x, s)| (x * s) as f32)
                        .collect(),
                )
            })
            .collect();

        Ok(ReducedMatrix {
            rows,
            singular_values: singular.iter().map(|&s| s as f32).collect(),
            requested_rank: self.config.n_components,
        })
    }
}

/// A (m x n, sparse) times D (n x k)
fn multiply(matrix: &EmbeddingMatrix, dense: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((matrix.n_rows(), dense.ncols()));
    for (r, row) in matrix.rows().iter().enumerate() {
        let mut target = out.row_mut(r);
        for (c, value) in row.iter() {
            target.scaled_add(value as f64, &dense.row(c));
        }
    }
    out
}

/// A^T (n x m, sparse) times D (m x k)
fn multiply_transposed(matrix: &EmbeddingMatrix, dense: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((matrix.n_cols(), dense.ncols()));
    for (r, row) in matrix.rows().iter().enumerate() {
        let source = dense.row(r);
        for (c, value) in row.iter() {
            out.row_mut(c).scaled_add(value as f64, &source);
        }
    }
    out
}

/// Modified Gram-Schmidt with one re-orthogonalization pass.
/// Columns that vanish (rank deficiency) are left as zeros.
fn orthonormalize(mut y: Array2<f64>) -> Array2<f64> {
    for j in 0..y.ncols() {
        for _ in 0..2 {
            for i in 0..j {
                let basis: Array1<f64> = y.column(i).to_owned();
                let projection = basis.dot(&y.column(j));
                y.column_mut(j).scaled_add(-projection, &basis);
            }
        }
        let norm = y.column(j).dot(&y.column(j)).sqrt();
        if norm > ZERO_COLUMN_EPS {
            y.column_mut(j).mapv_inplace(|x| x / norm);
        } else {
            y.column_mut(j).fill(0.0);
        }
    }
    y
}

/// Cyclic Jacobi eigendecomposition of a small symmetric matrix.
/// Returns eigenvalues and eigenvectors (as columns), unsorted.
fn symmetric_eigen(mut a: Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);
    let scale = a.iter().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);

    for _ in 0..MAX_JACOBI_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off <= 1e-24 * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[[i, i]]).collect();
    (eigenvalues, v)
}

/// Make the largest-magnitude entry of every column positive
fn flip_signs(u: &mut Array2<f64>) {
    for mut column in u.columns_mut() {
        let pivot = column
            .iter()
            .copied()
            .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
        if pivot < 0.0 {
            column.mapv_inplace(|x| -x);
        }
    }
}
