//! Distance metrics for vector similarity

use crate::error::{Result, VdbError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metric used to rank search results.
///
/// Every metric is reported as a distance: smaller is nearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricType {
    /// Squared Euclidean distance
    #[default]
    L2,
    /// Inner product, negated so that larger products rank first
    Ip,
    /// Cosine distance (1 - cosine similarity)
    Cosine,
}

impl MetricType {
    /// Distance between two vectors of the same dimension.
    ///
    /// A zero vector under COSINE scores 1.0, as if orthogonal; queries are
    /// checked for that before they reach an index.
    pub(crate) fn distance_unchecked(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            MetricType::L2 => squared_l2(a, b),
            MetricType::Ip => -dot_product(a, b),
            MetricType::Cosine => cosine_distance(a, b).unwrap_or(1.0),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricType::L2 => "L2",
            MetricType::Ip => "IP",
            MetricType::Cosine => "COSINE",
        };
        f.write_str(name)
    }
}

/// Squared Euclidean (L2) distance between two vectors
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Dot product of two vectors
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2 norm of a vector
pub fn norm(a: &[f32]) -> f32 {
    dot_product(a, a).sqrt()
}

/// Cosine distance between two vectors (1 - cosine similarity)
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(VdbError::search(
            "cannot compute cosine distance with zero vector",
        ));
    }

    // Clamp to [-1, 1] to absorb floating point error
    let similarity = (dot_product(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0);

    Ok(1.0 - similarity)
}
