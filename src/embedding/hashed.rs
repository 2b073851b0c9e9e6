use std::hash::Hasher;

use ndarray::Array2;
use rayon::prelude::*;
use twox_hash::XxHash64;

use crate::embedding::{normalize_rows, EmbeddingProvider};
use crate::errors::Result;

/// Deterministic character n-gram embedder.
///
/// Each n-gram of `^text$` is hashed into one of `dim` buckets with a
/// hash-derived sign, so texts sharing substrings land near each other.
#[derive(Debug, Clone)]
pub struct HashedNgramEmbedder {
    dim: usize,
    ngram_min: usize,
    ngram_max: usize,
}

impl HashedNgramEmbedder {
    /// Create an embedder with `dim` buckets over n-grams of length
    /// `ngram_min..=ngram_max`.
    pub fn new(dim: usize, ngram_min: usize, ngram_max: usize) -> Self {
        Self {
            dim: dim.max(1),
            ngram_min: ngram_min.max(1),
            ngram_max: ngram_max.max(ngram_min.max(1)),
        }
    }

    #[inline]
    fn hash_ngram(gram: &[char]) -> u64 {
        let mut h = XxHash64::with_seed(0x5EED_0F_C1A5);
        for c in gram {
            h.write_u32(*c as u32);
        }
        h.finish()
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        let chars: Vec<char> = std::iter::once('^')
            .chain(text.chars())
            .chain(std::iter::once('$'))
            .collect();

        for n in self.ngram_min..=self.ngram_max {
            if n > chars.len() {
                break;
            }
            for gram in chars.windows(n) {
                let h = Self::hash_ngram(gram);
                let bucket = (h % self.dim as u64) as usize;
                let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
                v[bucket] += sign;
            }
        }
        v
    }
}

impl EmbeddingProvider for HashedNgramEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, texts: &[String], normalize: bool) -> Result<Array2<f32>> {
        let rows: Vec<Vec<f32>> = texts.par_iter().map(|t| self.embed_one(t)).collect();

        let mut out = Array2::zeros((texts.len(), self.dim));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, x) in row.into_iter().enumerate() {
                out[[i, j]] = x;
            }
        }
        if normalize {
            normalize_rows(&mut out);
        }
        Ok(out)
    }

    fn fingerprint(&self) -> String {
        format!("hashed-ngram/{}/{}-{}", self.dim, self.ngram_min, self.ngram_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn deterministic_and_unit_length() {
        let e = HashedNgramEmbedder::new(64, 1, 3);
        let a = e.embed(&words(&["qok", "chol"]), true).unwrap();
        let b = e.embed(&words(&["qok", "chol"]), true).unwrap();
        assert_eq!(a, b);
        for row in a.rows() {
            assert!((row.dot(&row).sqrt() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn shared_ngrams_are_closer() {
        let e = HashedNgramEmbedder::new(256, 1, 3);
        let m = e.embed(&words(&["qokeey", "qokeedy", "shar"]), true).unwrap();
        let near = m.row(0).dot(&m.row(1));
        let far = m.row(0).dot(&m.row(2));
        assert!(near > far);
    }

    #[test]
    fn empty_batch() {
        let e = HashedNgramEmbedder::new(8, 1, 2);
        let m = e.embed(&[], true).unwrap();
        assert_eq!(m.dim(), (0, 8));
    }
}
