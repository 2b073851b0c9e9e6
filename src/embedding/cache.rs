use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::errors::{Result, VoynichError};
use crate::persistence;

/// Stem embeddings persisted between cluster runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCache {
    /// Provider fingerprint the vectors came from.
    pub provider: String,
    /// Whether rows were normalized.
    pub normalized: bool,
    /// Stems, row order.
    pub stems: Vec<String>,
    /// Row dimension.
    pub dim: usize,
    /// Row-major vectors.
    pub data: Vec<f32>,
}

impl EmbeddingCache {
    /// Snapshot a matrix.
    pub fn new(provider: String, normalized: bool, stems: Vec<String>, matrix: &Array2<f32>) -> Self {
        Self {
            provider,
            normalized,
            stems,
            dim: matrix.ncols(),
            data: matrix.iter().copied().collect(),
        }
    }

    /// Rebuild the matrix.
    pub fn matrix(&self) -> Result<Array2<f32>> {
        Array2::from_shape_vec((self.stems.len(), self.dim), self.data.clone())
            .map_err(|e| VoynichError::Embedding(format!("corrupt embedding cache: {}", e)))
    }

    /// True if this cache holds exactly `stems` from `provider`, at the
    /// provider's dimension.
    pub fn matches(&self, provider: &dyn EmbeddingProvider, normalized: bool, stems: &[String]) -> bool {
        self.provider == provider.fingerprint()
            && self.dim == provider.dim()
            && self.normalized == normalized
            && self.stems == stems
    }

    /// Write with bincode.
    pub fn save(&self, path: &Path) -> Result<()> {
        persistence::write_atomic(path, |file| {
            let mut w = BufWriter::new(file);
            bincode::serialize_into(&mut w, self)?;
            w.flush()?;
            Ok(())
        })
    }

    /// Read with bincode; `None` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(path)?;
        Ok(Some(bincode::deserialize_from(BufReader::new(file))?))
    }
}

/// Embed `stems`, reusing the cache at `path` when it still matches.
pub fn embed_with_cache(
    provider: &dyn EmbeddingProvider,
    stems: &[String],
    normalize: bool,
    path: &Path,
) -> Result<Array2<f32>> {
    match EmbeddingCache::load(path) {
        Ok(Some(cache)) if cache.matches(provider, normalize, stems) => {
            tracing::info!("Reusing cached embeddings from {}", path.display());
            return cache.matrix();
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Ignoring unreadable embedding cache {}: {}", path.display(), e),
    }

    tracing::info!("Embedding {} stems with {}", stems.len(), provider.fingerprint());
    let matrix = provider.embed(stems, normalize)?;
    if matrix.dim() != (stems.len(), provider.dim()) {
        return Err(VoynichError::Embedding(format!(
            "{} returned a {:?} matrix for {} stems at dimension {}",
            provider.fingerprint(),
            matrix.dim(),
            stems.len(),
            provider.dim()
        )));
    }
    EmbeddingCache::new(provider.fingerprint(), normalize, stems.to_vec(), &matrix).save(path)?;
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedNgramEmbedder;

    #[test]
    fn cache_round_trips_and_invalidates_on_new_stems() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emb.bin");
        let provider = HashedNgramEmbedder::new(16, 1, 2);
        let stems = vec!["chol".to_string(), "qok".to_string()];

        let first = embed_with_cache(&provider, &stems, true, &path).unwrap();
        let cache = EmbeddingCache::load(&path).unwrap().unwrap();
        assert!(cache.matches(&provider, true, &stems));
        assert_eq!(cache.matrix().unwrap(), first);

        let more = vec!["chol".to_string(), "qok".to_string(), "sh".to_string()];
        assert!(!cache.matches(&provider, true, &more));
        let second = embed_with_cache(&provider, &more, true, &path).unwrap();
        assert_eq!(second.nrows(), 3);
    }

    #[derive(Debug)]
    struct ShortRows;

    impl EmbeddingProvider for ShortRows {
        fn dim(&self) -> usize {
            4
        }

        fn embed(&self, texts: &[String], _normalize: bool) -> Result<Array2<f32>> {
            Ok(Array2::zeros((texts.len(), 3)))
        }

        fn fingerprint(&self) -> String {
            "short-rows".into()
        }
    }

    #[test]
    fn cache_at_other_dimension_is_not_reused() {
        let provider = HashedNgramEmbedder::new(16, 1, 2);
        let stems = vec!["qok".to_string()];
        let stale = EmbeddingCache::new(provider.fingerprint(), true, stems.clone(), &Array2::zeros((1, 8)));
        assert!(!stale.matches(&provider, true, &stems));
    }

    #[test]
    fn provider_dimension_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emb.bin");
        let err = embed_with_cache(&ShortRows, &["qok".to_string()], false, &path).unwrap_err();
        assert!(matches!(err, VoynichError::Embedding(_)));
        assert!(!path.exists());
    }
}
