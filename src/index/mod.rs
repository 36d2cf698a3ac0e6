//! Vector indexes: the FLAT and IVF_FLAT search backends

pub mod flat;
pub mod ivf;

pub use flat::FlatIndex;
pub use ivf::IvfFlatIndex;

use crate::distance::MetricType;
use crate::error::{Result, VdbError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound for `nlist` and `nprobe`.
pub const MAX_NLIST: usize = 65_536;

/// `nprobe` used when a search request does not set one.
pub const DEFAULT_NPROBE: usize = 8;

/// Supported index types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexType {
    /// Exhaustive scan over every stored vector
    Flat,
    /// Inverted file over k-means clusters, raw vectors in each list
    IvfFlat,
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexType::Flat => f.write_str("FLAT"),
            IndexType::IvfFlat => f.write_str("IVF_FLAT"),
        }
    }
}

/// Index build parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParams {
    /// Number of clusters for IVF indexes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nlist: Option<usize>,
}

/// Everything needed to build an index over one vector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    pub index_type: IndexType,
    pub metric_type: MetricType,
    #[serde(default)]
    pub params: BuildParams,
}

impl IndexParams {
    pub fn flat(metric_type: MetricType) -> Self {
        Self {
            index_type: IndexType::Flat,
            metric_type,
            params: BuildParams::default(),
        }
    }

    pub fn ivf_flat(metric_type: MetricType, nlist: usize) -> Self {
        Self {
            index_type: IndexType::IvfFlat,
            metric_type,
            params: BuildParams { nlist: Some(nlist) },
        }
    }

    pub fn validate(&self) -> Result<()> {
        match (self.index_type, self.params.nlist) {
            (IndexType::IvfFlat, None) => Err(VdbError::index("IVF_FLAT requires nlist")),
            (IndexType::IvfFlat, Some(nlist)) if nlist == 0 || nlist > MAX_NLIST => {
                Err(VdbError::index(format!(
                    "nlist {} out of range 1..={}",
                    nlist, MAX_NLIST
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Per-request search tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Number of IVF lists to scan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nprobe: Option<usize>,
}

impl QueryParams {
    pub fn with_nprobe(nprobe: usize) -> Self {
        Self {
            nprobe: Some(nprobe),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.nprobe {
            Some(n) if n == 0 || n > MAX_NLIST => Err(VdbError::search(format!(
                "nprobe {} out of range 1..={}",
                n, MAX_NLIST
            ))),
            _ => Ok(()),
        }
    }
}

/// A search index over the vectors of one field.
///
/// Rows are identified by their offset in insertion order; the owning
/// collection maps offsets back to primary keys.
pub trait VectorIndex: Send + Sync + fmt::Debug {
    /// Append vectors; the first gets offset `self.len()`.
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()>;

    /// Search for the `k` nearest rows to `query`.
    ///
    /// `filter`, when present, is indexed by offset and excludes rows set to
    /// `false`. Returns `(offset, distance)` pairs sorted by distance, ties
    /// broken by offset.
    fn search(
        &self,
        query: &[f32],
        k: usize,
        params: &QueryParams,
        filter: Option<&[bool]>,
    ) -> Result<Vec<(usize, f32)>>;

    /// The number of vectors in this index.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build an index of the requested type over `vectors`.
pub fn build_index(
    params: &IndexParams,
    dim: usize,
    vectors: &[Vec<f32>],
) -> Result<Box<dyn VectorIndex>> {
    params.validate()?;

    let mut index: Box<dyn VectorIndex> = match params.index_type {
        IndexType::Flat => Box::new(FlatIndex::new(params.metric_type, dim)),
        IndexType::IvfFlat => Box::new(IvfFlatIndex::new(
            params.metric_type,
            dim,
            params.params.nlist.unwrap_or(1),
        )),
    };
    if !vectors.is_empty() {
        index.add(vectors)?;
    }
    Ok(index)
}

/// Sort candidates by distance (offset on ties) and keep the best `k`.
pub(crate) fn top_k(mut candidates: Vec<(usize, f32)>, k: usize) -> Vec<(usize, f32)> {
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    candidates.truncate(k);
    candidates
}

fn check_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(VdbError::search(format!(
            "dimension mismatch: expected {}, got {}",
            expected, actual
        )));
    }
    Ok(())
}
