//! Global configuration for the pipeline: clustering knobs, embedding
//! provider, and the heuristic tables (role thresholds, role map, folio
//! sections) that downstream stages consume.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::corpus::suffix::DEFAULT_SUFFIXES;
use crate::errors::{Result, VoynichError};
use crate::types::Label;

/// Reducer used for the 2-D visualization projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReducerKind {
    /// Neighbour-graph Laplacian embedding, falls back to PCA on failure.
    Spectral,
    /// Principal components only.
    Pca,
}

/// Which embedding provider backs the cluster stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    /// Character n-gram feature hashing.
    Hashed,
    /// Vectors exported from an external sentence-embedding model.
    Precomputed,
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider selection.
    pub kind: EmbeddingKind,
    /// Output dimension for the hashed provider.
    pub dim: usize,
    /// Smallest character n-gram.
    pub ngram_min: usize,
    /// Largest character n-gram.
    pub ngram_max: usize,
    /// L2-normalize vectors before clustering.
    pub normalize: bool,
    /// JSON `{text: [f32]}` file for the precomputed provider.
    pub path: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            kind: EmbeddingKind::Hashed,
            dim: 256,
            ngram_min: 1,
            ngram_max: 3,
            normalize: true,
            path: None,
        }
    }
}

/// Decision-table thresholds for role inference.
///
/// These are tuned to the full transcription with ten clusters and need
/// recalibration for other corpora or cluster counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleThresholds {
    /// `Function` needs more occurrences than this...
    pub function_min_total: u64,
    /// ...and fewer distinct stems than this.
    pub function_max_unique: u64,
    /// `Root` needs more distinct stems than this.
    pub root_min_unique: u64,
    /// `Modifier` needs more line starts and more line ends than this.
    pub modifier_min_edges: u64,
}

impl Default for RoleThresholds {
    fn default() -> Self {
        Self {
            function_min_total: 3000,
            function_max_unique: 500,
            root_min_unique: 1000,
            modifier_min_edges: 500,
        }
    }
}

/// Inclusive folio range mapped to a manuscript section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRange {
    /// Section name.
    pub name: String,
    /// First folio number.
    pub start: u32,
    /// Last folio number.
    pub end: u32,
}

impl SectionRange {
    fn new(name: &str, start: u32, end: u32) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
        }
    }

    /// True if `folio` falls in this range.
    pub fn contains(&self, folio: u32) -> bool {
        (self.start..=self.end).contains(&folio)
    }
}

/// Settings for the cluster/language similarity probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Reference words per language.
    pub reference_words: BTreeMap<String, Vec<String>>,
    /// Rows kept per language.
    pub top_n: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        let table: [(&str, [&str; 5]); 5] = [
            ("English", ["the", "and", "of", "to", "in"]),
            ("Latin", ["et", "est", "non", "qui", "ad"]),
            ("Arabic", ["ال", "و", "من", "إلى", "في"]),
            ("Hebrew", ["של", "ו", "על", "עם", "זה"]),
            ("Nahuatl", ["inin", "tlatl", "ca", "noch", "tlali"]),
        ];
        let reference_words = table
            .iter()
            .map(|(lang, words)| {
                (
                    lang.to_string(),
                    words.iter().map(|w| w.to_string()).collect(),
                )
            })
            .collect();
        Self {
            reference_words,
            top_n: 10,
        }
    }
}

/// Configuration for the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Suffixes stripped from raw tokens (longest match wins).
    pub suffixes: Vec<String>,
    /// First character of a tagged corpus line.
    pub tag_delimiter: char,
    /// Number of clusters (k).
    pub n_clusters: usize,
    /// Seed for k-means and reducers.
    pub seed: u64,
    /// k-means restarts; the lowest-inertia run wins.
    pub n_init: usize,
    /// Maximum Lloyd iterations per restart.
    pub max_iter: usize,
    /// Convergence threshold on total centroid shift.
    pub tolerance: f32,
    /// Preferred visualization reducer.
    pub reducer: ReducerKind,
    /// Neighbours per point for the spectral reducer.
    pub n_neighbors: usize,
    /// Embedding provider.
    pub embedding: EmbeddingConfig,
    /// Role inference thresholds.
    pub role_thresholds: RoleThresholds,
    /// Cluster -> POS role used by the lexicon.
    pub role_map: BTreeMap<Label, String>,
    /// Folio sections, first match wins.
    pub sections: Vec<SectionRange>,
    /// Added to every transition row sum.
    pub transition_stabilizer: f64,
    /// Intermediate artifacts (lookup, stems, embeddings cache).
    pub data_dir: PathBuf,
    /// Stage outputs.
    pub results_dir: PathBuf,
    /// Similarity probe.
    pub probe: ProbeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let role_map = [
            (8, "Function"),
            (3, "Root"),
            (6, "Object?"),
            (5, "Modifier?"),
            (0, "Object?"),
        ]
        .into_iter()
        .map(|(c, r)| (c, r.to_string()))
        .collect();

        Self {
            suffixes: DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            tag_delimiter: '<',
            n_clusters: 10,
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            reducer: ReducerKind::Spectral,
            n_neighbors: 5,
            embedding: EmbeddingConfig::default(),
            role_thresholds: RoleThresholds::default(),
            role_map,
            sections: vec![
                SectionRange::new("Botanical", 1, 66),
                SectionRange::new("Astronomical", 67, 74),
                SectionRange::new("Biological", 75, 84),
                SectionRange::new("Cosmological", 85, 87),
                SectionRange::new("Pharmaceutical", 88, 102),
                SectionRange::new("Unknown", 103, 116),
            ],
            transition_stabilizer: 1e-9,
            data_dir: PathBuf::from("data"),
            results_dir: PathBuf::from("results"),
            probe: ProbeConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no stage can run with.
    pub fn validate(&self) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(VoynichError::Config("n_clusters must be at least 1".into()));
        }
        if self.n_init == 0 || self.max_iter == 0 {
            return Err(VoynichError::Config(
                "n_init and max_iter must be at least 1".into(),
            ));
        }
        if !(self.transition_stabilizer > 0.0) {
            return Err(VoynichError::Config(
                "transition_stabilizer must be positive".into(),
            ));
        }
        if self.embedding.dim == 0 {
            return Err(VoynichError::Config("embedding.dim must be positive".into()));
        }
        if self.embedding.ngram_min == 0 || self.embedding.ngram_min > self.embedding.ngram_max {
            return Err(VoynichError::Config(format!(
                "invalid n-gram range {}..={}",
                self.embedding.ngram_min, self.embedding.ngram_max
            )));
        }
        for s in &self.sections {
            if s.start > s.end {
                return Err(VoynichError::Config(format!(
                    "section {} has inverted range {}..={}",
                    s.name, s.start, s.end
                )));
            }
        }
        if self.suffixes.iter().any(|s| s.is_empty()) {
            return Err(VoynichError::Config("empty suffix in suffix list".into()));
        }
        Ok(())
    }

    /// Resolve a path under the data directory.
    pub fn data_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    /// Resolve a path under the results directory.
    pub fn results_path(&self, file: &str) -> PathBuf {
        self.results_dir.join(file)
    }
}
