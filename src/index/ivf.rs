//! IVF_FLAT index: k-means coarse quantizer with raw vectors per list.
//!
//! Training runs Lloyd's k-means over the stored rows. While fewer lists
//! than requested could be trained, every added batch retrains over all rows
//! and reassigns them; after that, batches join the nearest existing
//! centroid. Either way an inserted vector sits in the list of its nearest
//! centroid.

use crate::distance::MetricType;
use crate::error::{Result, VdbError};
use crate::index::{check_dimension, top_k, QueryParams, VectorIndex, DEFAULT_NPROBE};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::debug;

/// Lloyd iterations run during training.
const KMEANS_ITERATIONS: usize = 6;

/// Seed for centroid initialisation, fixed so builds are reproducible.
const KMEANS_SEED: u64 = 0x5EED;

#[derive(Debug)]
pub struct IvfFlatIndex {
    metric: MetricType,
    dim: usize,
    /// Requested number of lists; the trained count may be lower
    nlist: usize,
    centroids: Vec<Vec<f32>>,
    /// Offsets of the rows assigned to each centroid
    lists: Vec<Vec<usize>>,
    /// Row-major vector storage indexed by offset
    data: Vec<f32>,
}

impl IvfFlatIndex {
    pub fn new(metric: MetricType, dim: usize, nlist: usize) -> Self {
        Self {
            metric,
            dim,
            nlist: nlist.max(1),
            centroids: Vec::new(),
            lists: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Number of trained lists: `min(nlist, rows)`.
    pub fn trained_lists(&self) -> usize {
        self.centroids.len()
    }

    /// Sizes of the inverted lists, in centroid order.
    pub fn list_sizes(&self) -> Vec<usize> {
        self.lists.iter().map(Vec::len).collect()
    }

    fn row(&self, offset: usize) -> &[f32] {
        &self.data[offset * self.dim..(offset + 1) * self.dim]
    }

    /// Retrain over every stored row and rebuild the lists.
    fn retrain(&mut self) {
        let rows: Vec<Vec<f32>> = self.data.chunks_exact(self.dim).map(<[f32]>::to_vec).collect();
        let k = self.nlist.min(rows.len());
        self.centroids = kmeans(&rows, k, self.metric, KMEANS_ITERATIONS, KMEANS_SEED);
        self.lists = vec![Vec::new(); self.centroids.len()];
        self.assign(&rows, 0);
        debug!(
            requested = self.nlist,
            trained = self.centroids.len(),
            rows = rows.len(),
            "trained IVF centroids"
        );
    }

    /// Put `vectors`, stored from offset `base` on, into their nearest lists.
    fn assign(&mut self, vectors: &[Vec<f32>], base: usize) {
        let assignments: Vec<usize> = vectors
            .par_iter()
            .map(|v| nearest_centroid(&self.centroids, v, self.metric))
            .collect();
        for (i, list) in assignments.into_iter().enumerate() {
            self.lists[list].push(base + i);
        }
    }
}

impl VectorIndex for IvfFlatIndex {
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(VdbError::index(format!(
                "dimension mismatch: expected {}, got {}",
                self.dim,
                v.len()
            )));
        }
        if vectors.is_empty() {
            return Ok(());
        }
        let base = self.len();
        self.data.reserve(vectors.len() * self.dim);
        for v in vectors {
            self.data.extend_from_slice(v);
        }

        if self.centroids.len() < self.nlist {
            self.retrain();
        } else {
            self.assign(vectors, base);
        }
        Ok(())
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        params: &QueryParams,
        filter: Option<&[bool]>,
    ) -> Result<Vec<(usize, f32)>> {
        check_dimension(self.dim, query.len())?;
        if self.centroids.is_empty() {
            return Ok(Vec::new());
        }

        let nprobe = params.nprobe.unwrap_or(DEFAULT_NPROBE).min(self.centroids.len());
        let probes = top_k(
            self.centroids
                .iter()
                .enumerate()
                .map(|(i, c)| (i, self.metric.distance_unchecked(query, c)))
                .collect(),
            nprobe,
        );

        let candidates = probes
            .iter()
            .flat_map(|&(list, _)| self.lists[list].iter().copied())
            .filter(|offset| filter.map_or(true, |f| f.get(*offset).copied().unwrap_or(false)))
            .map(|offset| (offset, self.metric.distance_unchecked(query, self.row(offset))))
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

/// Index of the centroid nearest to `v`; the lowest index wins ties.
fn nearest_centroid(centroids: &[Vec<f32>], v: &[f32], metric: MetricType) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = metric.distance_unchecked(v, c);
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

/// Lloyd's k-means seeded with `k` distinct input vectors.
///
/// Empty clusters keep their previous centroid.
fn kmeans(
    vectors: &[Vec<f32>],
    k: usize,
    metric: MetricType,
    iterations: usize,
    seed: u64,
) -> Vec<Vec<f32>> {
    if k == 0 {
        return Vec::new();
    }
    let dim = vectors[0].len();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids: Vec<Vec<f32>> = rand::seq::index::sample(&mut rng, vectors.len(), k)
        .iter()
        .map(|i| vectors[i].clone())
        .collect();

    for _ in 0..iterations {
        let assignments: Vec<usize> = vectors
            .par_iter()
            .map(|v| nearest_centroid(&centroids, v, metric))
            .collect();

        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for (v, &c) in vectors.iter().zip(assignments.iter()) {
            counts[c] += 1;
            for (s, x) in sums[c].iter_mut().zip(v.iter()) {
                *s += x;
            }
        }

        let mut moved = false;
        for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
            if count == 0 {
                continue;
            }
            let updated: Vec<f32> = sum.into_iter().map(|s| s / count as f32).collect();
            if updated != *centroid {
                moved = true;
                *centroid = updated;
            }
        }
        if !moved {
            break;
        }
    }

    centroids
}
