use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::Array2;

use crate::embedding::{normalize_rows, EmbeddingProvider};
use crate::errors::{Result, VoynichError};

/// Table of vectors produced offline by a sentence-embedding model.
///
/// Expected file format: a JSON object `{"text": [f32, ...], ...}`.
#[derive(Debug, Clone)]
pub struct PrecomputedEmbeddings {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
    source: String,
}

impl PrecomputedEmbeddings {
    /// Build from an in-memory table. All vectors must share one dimension.
    pub fn new(vectors: HashMap<String, Vec<f32>>, source: impl Into<String>) -> Result<Self> {
        let mut dims = vectors.values().map(Vec::len);
        let dim = dims.next().unwrap_or(0);
        if dim == 0 {
            return Err(VoynichError::Embedding("no precomputed vectors".into()));
        }
        if let Some((text, v)) = vectors.iter().find(|(_, v)| v.len() != dim) {
            return Err(VoynichError::Embedding(format!(
                "vector for {:?} has dimension {}, expected {}",
                text,
                v.len(),
                dim
            )));
        }
        Ok(Self {
            dim,
            vectors,
            source: source.into(),
        })
    }

    /// Load a JSON table.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            VoynichError::Embedding(format!("cannot open {}: {}", path.display(), e))
        })?;
        let vectors: HashMap<String, Vec<f32>> = serde_json::from_reader(BufReader::new(file))?;
        Self::new(vectors, path.display().to_string())
    }
}

impl EmbeddingProvider for PrecomputedEmbeddings {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, texts: &[String], normalize: bool) -> Result<Array2<f32>> {
        let mut out = Array2::zeros((texts.len(), self.dim));
        for (i, text) in texts.iter().enumerate() {
            let v = self.vectors.get(text).ok_or_else(|| {
                VoynichError::Embedding(format!("no precomputed vector for {:?}", text))
            })?;
            for (j, x) in v.iter().enumerate() {
                out[[i, j]] = *x;
            }
        }
        if normalize {
            normalize_rows(&mut out);
        }
        Ok(out)
    }

    fn fingerprint(&self) -> String {
        format!("precomputed/{}/{}", self.dim, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mixed_dimensions() {
        let mut table = HashMap::new();
        table.insert("a".to_string(), vec![1.0, 0.0]);
        table.insert("b".to_string(), vec![1.0]);
        assert!(PrecomputedEmbeddings::new(table, "mem").is_err());
    }

    #[test]
    fn unknown_text_is_an_error() {
        let mut table = HashMap::new();
        table.insert("qok".to_string(), vec![3.0, 4.0]);
        let p = PrecomputedEmbeddings::new(table, "mem").unwrap();

        let m = p.embed(&["qok".to_string()], true).unwrap();
        assert!((m[[0, 0]] - 0.6).abs() < 1e-6);

        let err = p.embed(&["chol".to_string()], false).unwrap_err();
        assert!(matches!(err, VoynichError::Embedding(_)));
    }
}
