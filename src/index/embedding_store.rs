//! Flat, row-major storage for fixed-length ingredient coordinates with
//! brute-force nearest-neighbour queries.
#![forbid(unsafe_code)]

use base64::{engine::general_purpose, Engine as _};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::errors::IndexError;

type Float = f32;

/// Distance used by a store. Nutritional coordinates are compared with
/// Euclidean distance; text embeddings with cosine distance on unit vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Euclidean,
    Cosine,
}

/// A row of the store and its distance to the query (smaller is closer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: Float,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingStore {
    dimension: usize,
    metric: Metric,
    rows: usize,
    #[serde(with = "base64_matrix")]
    matrix: Vec<Float>,
}

pub(crate) mod base64_matrix {
    use super::*;
    use bytemuck::cast_slice;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(vec: &[Float], serializer: S) -> Result<S::Ok, S::Error> {
        let bytes: &[u8] = cast_slice(vec);
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Float>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)?;
        if bytes.len() % std::mem::size_of::<Float>() != 0 {
            return Err(serde::de::Error::custom("matrix byte length is not a multiple of 4"));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| Float::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

impl EmbeddingStore {
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            rows: 0,
            matrix: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Appends one row. Cosine stores keep rows normalized to unit length.
    pub fn push(&mut self, vector: &[Float]) -> Result<usize, IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                found: vector.len(),
            });
        }
        let row = self.rows;
        match self.metric {
            Metric::Euclidean => self.matrix.extend_from_slice(vector),
            Metric::Cosine => self.matrix.extend_from_slice(&normalize(vector)),
        }
        self.rows += 1;
        Ok(row)
    }

    pub fn row(&self, row: usize) -> Option<&[Float]> {
        if row >= self.rows {
            return None;
        }
        let start = row.checked_mul(self.dimension)?;
        self.matrix.get(start..start + self.dimension)
    }

    /// Checks the invariant `matrix.len() == rows * dimension` after a reload.
    pub fn validate(&self, expected_rows: usize) -> Result<(), IndexError> {
        let expected = expected_rows * self.dimension;
        if self.rows != expected_rows || self.matrix.len() != expected {
            return Err(IndexError::MatrixSizeMismatch {
                expected,
                found: self.matrix.len(),
            });
        }
        Ok(())
    }

    pub fn distance(&self, a: &[Float], b: &[Float]) -> Float {
        match self.metric {
            Metric::Euclidean => euclidean_distance(a, b),
            Metric::Cosine => 1.0 - dot_product(a, b),
        }
    }

    /// Rows accepted by `filter`, ordered by distance to `query` (row index
    /// breaks ties), truncated to `top_k`.
    ///
    /// A cosine query is normalized before comparison.
    pub fn nearest<F>(&self, query: &[Float], top_k: usize, filter: F) -> Vec<Neighbor>
    where
        F: Fn(usize) -> bool + Sync,
    {
        if query.len() != self.dimension || top_k == 0 {
            return Vec::new();
        }
        let query = match self.metric {
            Metric::Euclidean => query.to_vec(),
            Metric::Cosine => normalize(query),
        };

        let mut neighbors: Vec<Neighbor> = (0..self.len())
            .into_par_iter()
            .filter(|&row| filter(row))
            .filter_map(|row| {
                self.row(row).map(|coords| Neighbor {
                    row,
                    distance: self.distance(coords, &query),
                })
            })
            .collect();

        neighbors.sort_by(|a, b| compare_distance(a.distance, b.distance).then(a.row.cmp(&b.row)));
        neighbors.truncate(top_k);
        neighbors
    }
}

/// Total order on distances with NaN placed last.
pub fn compare_distance(a: Float, b: Float) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| match (a.is_nan(), b.is_nan()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => Ordering::Equal,
    })
}

#[inline]
fn dot_product(a: &[Float], b: &[Float]) -> Float {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn euclidean_distance(a: &[Float], b: &[Float]) -> Float {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<Float>()
        .sqrt()
}

/// Normalize a vector to unit length. A zero vector stays zero.
pub fn normalize(vector: &[Float]) -> Vec<Float> {
    let norm_sq: Float = vector.iter().map(|&x| x * x).sum();
    if norm_sq == 0.0 {
        return vec![0.0; vector.len()];
    }
    let inv_norm = 1.0 / norm_sq.sqrt();
    vector.iter().map(|&x| x * inv_norm).collect()
}
