#![forbid(unsafe_code)]
#![deny(
    warnings,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms
)]

//! # voynich-roles
//!
//! Exploratory pipeline for statistical structure in the Voynich corpus:
//! - suffix-stripping normalization of raw tokens
//! - stem embedding and seeded k-means clustering
//! - projection of cluster labels back onto corpus lines
//! - heuristic role inference, cluster transition model, candidate lexicon
//!
//! Everything here is a weak signal for human interpretation, not a
//! decipherment.

pub mod config;
pub mod corpus;
pub mod errors;
/// Embedding providers (the model is a black box behind a trait).
pub mod embedding;
/// Stem clustering and visualization reducers.
pub mod cluster;
/// Downstream stages: projection, roles, transitions, lexicon.
pub mod pipeline;
/// Cluster/language similarity probe.
pub mod probe;
/// Artifact files and their stamps.
pub mod persistence;
pub mod types;

pub use cluster::{ClusterEngine, ClusterOutcome};
pub use config::PipelineConfig;
pub use corpus::SuffixStripper;
pub use errors::VoynichError;
pub use pipeline::{CorpusProjector, LexiconAssembler, RoleInferenceEngine, TransitionModel};
pub use types::{ClusterLookup, CorpusLine, Label};
