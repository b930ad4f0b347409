//! Similarity index adapter.
//!
//! Wraps a pre-built flat nearest-neighbour index loaded from a persisted
//! artifact at startup. The index is read-only for the process lifetime:
//! never appended to, rebuilt, or persisted again. Row ordering in the
//! artifact defines the meaning of the indices returned to clients.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

use crate::error::LoadError;

/// Serialized form of the index: row-major `f32` matrix with its stated
/// dimensionality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexArtifact {
    pub dimension: u32,
    /// Row-major, `rows * dimension` values.
    pub vectors: Vec<f32>,
}

/// Flat index: exhaustive scan, squared L2 distance, nearest first.
pub struct FlatIndex {
    vectors: Array2<f32>,
}

impl FlatIndex {
    /// Load the index from its bincode artifact. Startup-fatal on a missing
    /// file, decode failure, or a vector count that does not divide evenly
    /// by the stated dimensionality.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|e| LoadError::Index {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let (artifact, _): (IndexArtifact, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).map_err(
                |e| LoadError::Index {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                },
            )?;

        Self::from_artifact(artifact).map_err(|reason| LoadError::Index {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_artifact(artifact: IndexArtifact) -> Result<Self, String> {
        let dimension = artifact.dimension as usize;
        if dimension == 0 {
            return Err("index dimension is zero".to_string());
        }
        if artifact.vectors.len() % dimension != 0 {
            return Err(format!(
                "{} values do not divide into rows of dimension {}",
                artifact.vectors.len(),
                dimension
            ));
        }

        let rows = artifact.vectors.len() / dimension;
        let vectors = Array2::from_shape_vec((rows, dimension), artifact.vectors)
            .map_err(|e| e.to_string())?;

        Ok(Self { vectors })
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.nrows() == 0
    }

    /// For each query, return the indices of the `k` nearest rows by squared
    /// L2 distance, nearest first. `k` is clamped to the row count.
    pub fn search(&self, queries: &[Vec<f32>], k: usize) -> Vec<Vec<usize>> {
        queries
            .iter()
            .map(|query| self.search_one(query, k))
            .collect()
    }

    fn search_one(&self, query: &[f32], k: usize) -> Vec<usize> {
        // Startup validation guarantees queries match the index width; the
        // zip below would silently truncate if that ever stopped holding.
        debug_assert_eq!(query.len(), self.dimension());

        let query = ArrayView1::from(query);

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .rows()
            .into_iter()
            .enumerate()
            .map(|(idx, row)| {
                let dist = row
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>();
                (dist, idx)
            })
            .collect();

        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(k.min(self.len()))
            .map(|(_, idx)| idx)
            .collect()
    }
}

impl std::fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatIndex")
            .field("rows", &self.len())
            .field("dimension", &self.dimension())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatIndex {
        // Four 2-d rows at known positions.
        FlatIndex::from_artifact(IndexArtifact {
            dimension: 2,
            vectors: vec![
                0.0, 0.0, // row 0
                1.0, 0.0, // row 1
                0.0, 5.0, // row 2
                3.0, 4.0, // row 3
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_exact_duplicate_ranks_first() {
        let index = sample_index();
        let results = index.search(&[vec![3.0, 4.0]], 3);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0][0], 3);
    }

    #[test]
    fn test_results_ordered_by_increasing_distance() {
        let index = sample_index();
        let results = index.search(&[vec![0.0, 0.0]], 4);
        assert_eq!(results[0], vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_k_clamps_to_row_count() {
        let index = sample_index();
        let results = index.search(&[vec![0.0, 0.0]], 10);
        assert_eq!(results[0].len(), 4);
    }

    #[test]
    fn test_batch_queries_return_one_row_each() {
        let index = sample_index();
        let results = index.search(&[vec![0.0, 0.0], vec![3.0, 4.0]], 1);
        assert_eq!(results, vec![vec![0], vec![3]]);
    }

    #[test]
    #[should_panic(expected = "assertion `left == right` failed")]
    #[cfg(debug_assertions)]
    fn test_query_width_mismatch_is_asserted() {
        let index = sample_index();
        index.search(&[vec![1.0, 2.0, 3.0]], 1);
    }

    #[test]
    fn test_rejects_ragged_artifact() {
        let err = FlatIndex::from_artifact(IndexArtifact {
            dimension: 3,
            vectors: vec![1.0, 2.0, 3.0, 4.0],
        })
        .unwrap_err();
        assert!(err.contains("dimension 3"));
    }

    #[test]
    fn test_artifact_roundtrip_through_file() {
        let artifact = IndexArtifact {
            dimension: 2,
            vectors: vec![1.0, 2.0, 3.0, 4.0],
        };
        let bytes =
            bincode::serde::encode_to_vec(&artifact, bincode::config::standard()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        std::fs::write(&path, bytes).unwrap();

        let index = FlatIndex::load(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimension(), 2);
    }

    #[test]
    fn test_missing_artifact_is_index_error() {
        let err = FlatIndex::load(Path::new("/nonexistent/index.bin")).unwrap_err();
        assert!(matches!(err, LoadError::Index { .. }));
    }
}
