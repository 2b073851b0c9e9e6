//! How close are a cluster's stems to high-frequency words of known
//! languages, in the embedding space? A curiosity probe, not evidence.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::config::{PipelineConfig, ProbeConfig};
use crate::embedding::{cosine_matrix, EmbeddingProvider};
use crate::errors::{Result, VoynichError};
use crate::persistence::{self, names};
use crate::types::Label;

/// Which words to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    /// Every stem the lookup assigns to this cluster.
    Cluster(Label),
    /// An explicit word list.
    Words(Vec<String>),
}

/// Mean similarity of one word to one language's reference words.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityRow {
    /// Probed word.
    #[serde(rename = "Cluster Word")]
    pub word: String,
    /// Reference language.
    #[serde(rename = "Language")]
    pub language: String,
    /// Mean cosine similarity against the language's reference words.
    #[serde(rename = "Average Cosine Similarity")]
    pub similarity: f32,
}

/// Scores words against per-language reference lists.
pub struct LanguageProbe<'a> {
    provider: &'a dyn EmbeddingProvider,
    reference_words: BTreeMap<String, Vec<String>>,
    top_n: usize,
}

impl std::fmt::Debug for LanguageProbe<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageProbe")
            .field("provider", &self.provider.fingerprint())
            .field("languages", &self.reference_words.keys().collect::<Vec<_>>())
            .field("top_n", &self.top_n)
            .finish()
    }
}

impl<'a> LanguageProbe<'a> {
    /// Create a probe from its configuration section.
    pub fn new(provider: &'a dyn EmbeddingProvider, config: &ProbeConfig) -> Self {
        Self {
            provider,
            reference_words: config.reference_words.clone(),
            top_n: config.top_n,
        }
    }

    /// Score every (word, language) pair; keep the best `top_n` per language.
    ///
    /// Rows come back sorted by similarity, highest first.
    pub fn score(&self, words: &[String]) -> Result<Vec<SimilarityRow>> {
        if words.is_empty() {
            return Err(VoynichError::Config("no words to probe".into()));
        }
        let probed = self.provider.embed(words, true)?;

        let mut rows = Vec::new();
        for (language, refs) in &self.reference_words {
            if refs.is_empty() {
                tracing::warn!("No reference words for {}; skipping", language);
                continue;
            }
            let reference = self.provider.embed(refs, true)?;
            let sims = cosine_matrix(&probed, &reference);
            for (word, row) in words.iter().zip(sims.rows()) {
                rows.push(SimilarityRow {
                    word: word.clone(),
                    language: language.clone(),
                    similarity: row.mean().unwrap_or(0.0),
                });
            }
        }

        rows.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.language.cmp(&b.language))
                .then_with(|| a.word.cmp(&b.word))
        });

        let mut kept: HashMap<String, usize> = HashMap::new();
        rows.retain(|r| {
            let n = kept.entry(r.language.clone()).or_insert(0);
            *n += 1;
            *n <= self.top_n
        });
        Ok(rows)
    }
}

/// Resolve the target, score it, and write the probe CSV.
pub fn run_probe_stage(
    config: &PipelineConfig,
    provider: &dyn EmbeddingProvider,
    target: &ProbeTarget,
) -> Result<Vec<SimilarityRow>> {
    let lookup_path = config.data_path(names::CLUSTER_LOOKUP);
    let (words, inputs): (Vec<String>, Vec<(&str, &std::path::Path)>) = match target {
        ProbeTarget::Words(words) => (words.clone(), Vec::new()),
        ProbeTarget::Cluster(label) => {
            let lookup = persistence::load_lookup(&lookup_path)?;
            let words = lookup.reverse().remove(label).ok_or_else(|| {
                VoynichError::Cluster(format!("cluster {} has no stems in the lookup", label))
            })?;
            (words, vec![("cluster_lookup", lookup_path.as_path())])
        }
    };

    tracing::info!("Probing {} words against {} languages", words.len(), config.probe.reference_words.len());
    let rows = LanguageProbe::new(provider, &config.probe).score(&words)?;

    let out = config.results_path(names::LANGUAGE_SIMILARITY);
    persistence::write_csv(&out, &rows)?;
    persistence::write_stamp(&out, "probe", &inputs, None)?;
    for r in rows.iter().take(5) {
        tracing::info!("{} ~ {}: {:.4}", r.word, r.language, r.similarity);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedNgramEmbedder;

    fn probe_config(top_n: usize) -> ProbeConfig {
        let mut reference_words = BTreeMap::new();
        reference_words.insert("Same".to_string(), vec!["qokeedy".to_string()]);
        reference_words.insert("Other".to_string(), vec!["the".to_string(), "and".to_string()]);
        reference_words.insert("Empty".to_string(), Vec::new());
        ProbeConfig { reference_words, top_n }
    }

    #[test]
    fn identical_word_scores_highest_and_rows_are_sorted() {
        let embedder = HashedNgramEmbedder::new(128, 1, 3);
        let probe = LanguageProbe::new(&embedder, &probe_config(10));
        let words = vec!["chol".to_string(), "qokeedy".to_string()];
        let rows = probe.score(&words).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].word, "qokeedy");
        assert_eq!(rows[0].language, "Same");
        assert!((rows[0].similarity - 1.0).abs() < 1e-5);
        for pair in rows.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        assert!(rows.iter().all(|r| r.language != "Empty"));
    }

    #[test]
    fn top_n_is_per_language() {
        let embedder = HashedNgramEmbedder::new(64, 1, 2);
        let probe = LanguageProbe::new(&embedder, &probe_config(1));
        let words: Vec<String> = ["ykeeal", "ychockh", "yteyt"].iter().map(|s| s.to_string()).collect();
        let rows = probe.score(&words).unwrap();
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].language, rows[1].language);
    }

    #[test]
    fn empty_word_list_rejected() {
        let embedder = HashedNgramEmbedder::new(16, 1, 2);
        let probe = LanguageProbe::new(&embedder, &probe_config(3));
        assert!(matches!(probe.score(&[]), Err(VoynichError::Config(_))));
    }

    #[test]
    fn cluster_target_needs_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            data_dir: dir.path().join("data"),
            results_dir: dir.path().join("results"),
            ..PipelineConfig::default()
        };
        let embedder = HashedNgramEmbedder::new(16, 1, 2);
        let err = run_probe_stage(&config, &embedder, &ProbeTarget::Cluster(8)).unwrap_err();
        assert!(matches!(err, VoynichError::MissingArtifact { producer: "cluster", .. }));
    }
}
