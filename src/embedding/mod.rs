//! The embedding model is an opaque `text -> vector` function. Stages see it
//! only through [`EmbeddingProvider`].

use ndarray::{Array2, Axis};

use crate::config::{EmbeddingConfig, EmbeddingKind};
use crate::errors::{Result, VoynichError};

/// Cached stem embeddings.
pub mod cache;
/// Character n-gram feature hashing.
pub mod hashed;
/// Vectors exported from an external model.
pub mod precomputed;

pub use cache::EmbeddingCache;
pub use hashed::HashedNgramEmbedder;
pub use precomputed::PrecomputedEmbeddings;

/// Maps a batch of texts to fixed-dimension vectors.
pub trait EmbeddingProvider: Send + Sync {
    /// Output dimension.
    fn dim(&self) -> usize;

    /// Embed `texts`, one row per text, optionally L2-normalized.
    fn embed(&self, texts: &[String], normalize: bool) -> Result<Array2<f32>>;

    /// Identifies the provider and its settings; a cache built under a
    /// different fingerprint is not reused.
    fn fingerprint(&self) -> String;
}

/// Build the provider selected by the configuration.
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.kind {
        EmbeddingKind::Hashed => Ok(Box::new(HashedNgramEmbedder::new(
            config.dim,
            config.ngram_min,
            config.ngram_max,
        ))),
        EmbeddingKind::Precomputed => {
            let path = config.path.as_ref().ok_or_else(|| {
                VoynichError::Config("embedding.path is required for precomputed embeddings".into())
            })?;
            Ok(Box::new(PrecomputedEmbeddings::from_json_file(path)?))
        }
    }
}

/// Normalize rows to unit length in place; zero rows stay zero.
pub fn normalize_rows(vectors: &mut Array2<f32>) {
    for mut row in vectors.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > 1e-10 {
            row.mapv_inplace(|x| x / norm);
        }
    }
}

/// Cosine similarity of every row of `a` against every row of `b`.
pub fn cosine_matrix(a: &Array2<f32>, b: &Array2<f32>) -> Array2<f32> {
    let mut a = a.clone();
    let mut b = b.clone();
    normalize_rows(&mut a);
    normalize_rows(&mut b);
    a.dot(&b.t())
}
