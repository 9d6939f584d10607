// Exact nearest-neighbor index under cosine distance.
// Rows are normalized once at build time, so a query is one dot product per
// row. Low-thousands of rows do not need an approximate structure.
use crate::{Error, ReducedMatrix, Result, Vector};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Whether a row may appear in its own neighbor list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelfMatch {
    Include,
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Catalog row
    pub index: usize,
    /// `1 - cosine`, never negative
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct NeighborIndex {
    rows: Vec<Vector>,
    // false for all-zero rows, which are orthogonal to everything
    nonzero: Vec<bool>,
    dim: usize,
}

impl NeighborIndex {
    pub fn build(reduced: &ReducedMatrix) -> Self {
        let dim = reduced.rank();
        let rows: Vec<Vector> = reduced.rows().iter().map(Vector::normalized).collect();
        let nonzero = rows.iter().map(|row| row.norm() > f32::EPSILON).collect();
        Self { rows, nonzero, dim }
    }

    /// Build from arbitrary vectors; all must share one dimension
    pub fn from_vectors(vectors: Vec<Vector>) -> Result<Self> {
        let dim = vectors.first().map(Vector::dim).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.dim() != dim) {
            return Err(Error::InvalidDimension {
                expected: dim,
                actual: bad.dim(),
            });
        }
        let rows: Vec<Vector> = vectors.iter().map(Vector::normalized).collect();
        let nonzero = rows.iter().map(|row| row.norm() > f32::EPSILON).collect();
        Ok(Self { rows, nonzero, dim })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The `n` rows closest to `query`, ascending distance, ties by lower row
    pub fn search(&self, query: &Vector, n: usize) -> Result<Vec<Neighbor>> {
        if query.dim() != self.dim {
            return Err(Error::InvalidDimension {
                expected: self.dim,
                actual: query.dim(),
            });
        }
        let query = query.normalized();
        let query_nonzero = query.norm() > f32::EPSILON;
        Ok(self.rank(n, |row| self.distance_to(&query, query_nonzero, row)))
    }

    /// Neighbors of a stored row. With [`SelfMatch::Include`] a non-zero row
    /// is its own first neighbor at distance 0.
    pub fn neighbors_of(&self, row: usize, n: usize, self_match: SelfMatch) -> Result<Vec<Neighbor>> {
        let query = self.rows.get(row).ok_or(Error::RowOutOfRange {
            index: row,
            len: self.rows.len(),
        })?;
        let query_nonzero = self.nonzero[row];

        let mut neighbors = self.rank(n.saturating_add(1), |other| {
            if other == row && query_nonzero {
                0.0
            } else {
                self.distance_to(query, query_nonzero, other)
            }
        });

        if self_match == SelfMatch::Exclude {
            neighbors.retain(|neighbor| neighbor.index != row);
        }
        neighbors.truncate(n);
        Ok(neighbors)
    }

    /// All-pairs table: for every row, its `n` nearest other rows
    pub fn neighbor_table(&self, n: usize) -> Vec<Vec<Neighbor>> {
        (0..self.rows.len())
            .map(|row| {
                self.neighbors_of(row, n, SelfMatch::Exclude)
                    .unwrap_or_default()
            })
            .collect()
    }

    #[inline]
    fn distance_to(&self, query: &Vector, query_nonzero: bool, row: usize) -> f32 {
        if !query_nonzero || !self.nonzero[row] {
            return 1.0;
        }
        (1.0 - query.dot(&self.rows[row])).max(0.0)
    }

    fn rank<F>(&self, n: usize, distance: F) -> Vec<Neighbor>
    where
        F: Fn(usize) -> f32,
    {
        let mut scored: Vec<Neighbor> = (0..self.rows.len())
            .map(|index| Neighbor {
                index,
                distance: distance(index),
            })
            .collect();

        let key = |neighbor: &Neighbor| (OrderedFloat(neighbor.distance), neighbor.index);
        if n < scored.len() {
            scored.select_nth_unstable_by_key(n, key);
            scored.truncate(n);
        }
        scored.sort_unstable_by_key(key);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(vectors: &[[f32; 2]]) -> NeighborIndex {
        NeighborIndex::from_vectors(vectors.iter().map(|v| Vector::from_slice(v)).collect()).unwrap()
    }

    #[test]
    fn test_self_query_is_first_at_zero() {
        let idx = index(&[[1.0, 0.0], [0.9, 0.1], [0.0, 1.0], [0.7, 0.7]]);
        for row in 0..idx.len() {
            let neighbors = idx.neighbors_of(row, 3, SelfMatch::Include).unwrap();
            assert_eq!(neighbors[0].index, row);
            assert_eq!(neighbors[0].distance, 0.0);
        }

        let by_vector = idx.search(&Vector::new(vec![0.0, 2.0]), 1).unwrap();
        assert_eq!(by_vector[0].index, 2);
        assert!(by_vector[0].distance < 1e-6);
    }

    #[test]
    fn test_exclude_self() {
        let idx = index(&[[1.0, 0.0], [0.9, 0.1], [0.0, 1.0]]);
        let neighbors = idx.neighbors_of(0, 5, SelfMatch::Exclude).unwrap();
        assert_eq!(neighbors.iter().map(|n| n.index).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_ties_prefer_lower_index() {
        let idx = index(&[[1.0, 0.0], [0.0, 1.0], [0.0, 3.0], [0.0, 2.0]]);
        let neighbors = idx.search(&Vector::new(vec![0.0, 1.0]), 3).unwrap();
        assert_eq!(neighbors.iter().map(|n| n.index).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_ascending_distance() {
        let idx = index(&[[1.0, 0.0], [0.0, 1.0], [0.5, 0.5], [0.9, 0.2], [-1.0, 0.0]]);
        let neighbors = idx.search(&Vector::new(vec![1.0, 0.0]), 5).unwrap();
        assert_eq!(neighbors.iter().map(|n| n.index).collect::<Vec<_>>(), vec![0, 3, 2, 1, 4]);
        assert!(neighbors.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!((neighbors[4].distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_rows_are_far() {
        let idx = index(&[[0.0, 0.0], [1.0, 0.0]]);
        let neighbors = idx.neighbors_of(0, 2, SelfMatch::Include).unwrap();
        assert!(neighbors.iter().all(|n| n.distance == 1.0));
        assert_eq!(neighbors[0].index, 0);
    }

    #[test]
    fn test_dimension_and_range_errors() {
        let idx = index(&[[1.0, 0.0]]);
        assert!(matches!(
            idx.search(&Vector::new(vec![1.0, 0.0, 0.0]), 1),
            Err(Error::InvalidDimension { expected: 2, actual: 3 })
        ));
        assert!(matches!(
            idx.neighbors_of(4, 1, SelfMatch::Include),
            Err(Error::RowOutOfRange { index: 4, len: 1 })
        ));
        assert!(NeighborIndex::from_vectors(vec![Vector::new(vec![1.0]), Vector::new(vec![1.0, 2.0])]).is_err());
    }

    #[test]
    fn test_neighbor_table() {
        let idx = index(&[[1.0, 0.0], [0.9, 0.1], [0.0, 1.0]]);
        let table = idx.neighbor_table(1);
        assert_eq!(table.len(), 3);
        assert_eq!(table[0][0].index, 1);
        assert_eq!(table[2][0].index, 1);
    }
}
