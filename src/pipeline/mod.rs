//! Downstream consumers of the cluster lookup.
//!
//! Each component is a plain in-memory transformation; [`stages`] wires them
//! to the artifact files.

mod lexicon;
mod project;
mod roles;
pub mod stages;
mod transitions;

pub use lexicon::{LexiconAssembler, LexiconRecord, SectionClassifier};
pub use project::CorpusProjector;
pub use roles::{ClusterRoleSummary, InferredRole, RoleInferenceEngine};
pub use transitions::{TransitionMatrix, TransitionModel};
