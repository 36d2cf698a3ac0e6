//! Brute-force flat index: exact k-NN by scanning every row

use crate::distance::MetricType;
use crate::error::{Result, VdbError};
use crate::index::{check_dimension, top_k, QueryParams, VectorIndex};

/// A flat (brute-force) index that computes distance to every stored vector.
#[derive(Debug)]
pub struct FlatIndex {
    /// Row-major vector storage, `dim` floats per row
    data: Vec<f32>,
    dim: usize,
    metric: MetricType,
}

impl FlatIndex {
    /// Create a new empty flat index with the given distance metric.
    pub fn new(metric: MetricType, dim: usize) -> Self {
        Self {
            data: Vec::new(),
            dim,
            metric,
        }
    }
}

impl VectorIndex for FlatIndex {
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(VdbError::index(format!(
                "dimension mismatch: expected {}, got {}",
                self.dim,
                v.len()
            )));
        }
        self.data.reserve(vectors.len() * self.dim);
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        _params: &QueryParams,
        filter: Option<&[bool]>,
    ) -> Result<Vec<(usize, f32)>> {
        check_dimension(self.dim, query.len())?;

        let candidates = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .filter(|(offset, _)| filter.map_or(true, |f| f.get(*offset).copied().unwrap_or(false)))
            .map(|(offset, row)| (offset, self.metric.distance_unchecked(query, row)))
            .collect();

        Ok(top_k(candidates, k))
    }

    fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FlatIndex {
        let mut index = FlatIndex::new(MetricType::L2, 3);
        index
            .add(&[
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![1.0, 1.0, 0.0],
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_flat_index_basic() {
        let index = sample();
        let results = index
            .search(&[1.0, 0.0, 0.0], 2, &QueryParams::default(), None)
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0); // exact match
        assert!(results[0].1 < 1e-6);
    }

    #[test]
    fn test_flat_index_filter() {
        let index = sample();
        let filter = [false, true, true];
        let results = index
            .search(&[1.0, 0.0, 0.0], 3, &QueryParams::default(), Some(&filter))
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(offset, _)| *offset != 0));
    }

    #[test]
    fn test_flat_index_rejects_wrong_dimension() {
        let mut index = sample();
        assert!(index.add(&[vec![1.0]]).is_err());
        assert!(index
            .search(&[1.0, 0.0], 1, &QueryParams::default(), None)
            .is_err());
        assert_eq!(index.len(), 3);
    }
}
