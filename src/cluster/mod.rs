//! Partitions embedded stems into `k` clusters and produces the
//! authoritative cluster lookup.

use std::collections::BTreeMap;

use ndarray::Array2;

use crate::config::PipelineConfig;
use crate::errors::{Result, VoynichError};
use crate::types::{ClusterLookup, Label};

pub mod kmeans;
pub mod reduce;

pub use kmeans::{KMeans, KMeansFit};
pub use reduce::{project_2d, Reduction, ReductionError};

/// Result of clustering one stem set.
#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    /// Stems in embedding-row order.
    pub stems: Vec<String>,
    /// Label per stem, same order.
    pub labels: Vec<Label>,
    /// Number of clusters actually formed.
    pub k: usize,
    /// Within-cluster sum of squares.
    pub inertia: f64,
    /// 2-D visualization coordinates.
    pub projection: Reduction,
}

impl ClusterOutcome {
    /// `stem -> label` mapping for downstream stages.
    pub fn lookup(&self) -> ClusterLookup {
        self.stems
            .iter()
            .cloned()
            .zip(self.labels.iter().copied())
            .collect()
    }

    /// First `n` stems of every cluster, in stem order.
    pub fn sample_members(&self, n: usize) -> BTreeMap<Label, Vec<&str>> {
        let mut out: BTreeMap<Label, Vec<&str>> = (0..self.k as Label).map(|l| (l, Vec::new())).collect();
        for (stem, label) in self.stems.iter().zip(&self.labels) {
            let members = out.entry(*label).or_default();
            if members.len() < n {
                members.push(stem);
            }
        }
        out
    }
}

/// Seeded centroid-based clustering of stem embeddings.
#[derive(Debug, Clone)]
pub struct ClusterEngine {
    config: PipelineConfig,
}

impl ClusterEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Cluster `stems` (row `i` of `embeddings` belongs to `stems[i]`).
    ///
    /// The visualization projection never fails the run.
    pub fn run(&self, stems: Vec<String>, embeddings: &Array2<f32>) -> Result<ClusterOutcome> {
        if stems.is_empty() {
            return Err(VoynichError::Corpus("no stems to cluster".into()));
        }
        if stems.len() != embeddings.nrows() {
            return Err(VoynichError::Cluster(format!(
                "{} stems but {} embedding rows",
                stems.len(),
                embeddings.nrows()
            )));
        }

        let mut k = self.config.n_clusters;
        if k > stems.len() {
            tracing::warn!(
                "Only {} stems for {} clusters; clamping k to {}",
                stems.len(),
                k,
                stems.len()
            );
            k = stems.len();
        }

        tracing::info!("Clustering {} stems into {} clusters", stems.len(), k);
        let fit = KMeans {
            k,
            n_init: self.config.n_init,
            max_iter: self.config.max_iter,
            tolerance: self.config.tolerance,
            seed: self.config.seed,
        }
        .fit(embeddings)?;
        tracing::info!("k-means converged: inertia {:.4} after {} iterations", fit.inertia, fit.n_iter);

        tracing::info!("Reducing {} points to 2-D with {:?}", embeddings.nrows(), self.config.reducer);
        let projection = project_2d(embeddings, self.config.reducer, self.config.n_neighbors, self.config.seed);

        Ok(ClusterOutcome {
            stems,
            labels: fit.labels,
            k,
            inertia: fit.inertia,
            projection,
        })
    }
}
