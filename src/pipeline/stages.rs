//! Stage runners: each reads its input artifacts, runs one component, and
//! writes a stamped output artifact.

use std::path::Path;

use serde::Serialize;

use crate::cluster::{ClusterEngine, ClusterOutcome};
use crate::config::PipelineConfig;
use crate::corpus::{collect_words, stem_set, SuffixStripper, TextDocument};
use crate::embedding::{cache::embed_with_cache, EmbeddingProvider};
use crate::errors::{Result, VoynichError};
use crate::persistence::{self, names};
use crate::pipeline::{
    ClusterRoleSummary, CorpusProjector, LexiconAssembler, LexiconRecord, RoleInferenceEngine,
    SectionClassifier, TransitionMatrix, TransitionModel,
};
use crate::types::{ClusterLookup, CorpusLine, Label};

#[derive(Debug, Serialize)]
struct ProjectionRow<'a> {
    #[serde(rename = "Word")]
    word: &'a str,
    #[serde(rename = "Cluster")]
    cluster: Label,
    #[serde(rename = "X")]
    x: f32,
    #[serde(rename = "Y")]
    y: f32,
}

/// Files only get stamped as inputs; directories cannot be hashed.
fn file_inputs<'a>(inputs: &[(&'a str, &'a Path)]) -> Vec<(&'a str, &'a Path)> {
    inputs.iter().copied().filter(|(_, p)| p.is_file()).collect()
}

/// Stem the corpus, embed, cluster, and export the lookup.
pub fn run_cluster_stage(
    config: &PipelineConfig,
    corpus: &Path,
    provider: &dyn EmbeddingProvider,
) -> Result<ClusterOutcome> {
    let stripper = SuffixStripper::new(&config.suffixes);
    let words = collect_words(corpus, config.tag_delimiter)?;
    let stems = stem_set(&stripper, &words);
    tracing::info!("{} words, {} unique stems after suffix stripping", words.len(), stems.len());

    std::fs::create_dir_all(&config.data_dir)?;
    persistence::save_json(&config.data_path(names::UNIQUE_STEMS), &stems)?;

    let embeddings = embed_with_cache(
        provider,
        &stems,
        config.embedding.normalize,
        &config.data_path(names::EMBEDDINGS),
    )?;

    let outcome = ClusterEngine::new(config.clone()).run(stems, &embeddings)?;
    for (label, members) in outcome.sample_members(10) {
        tracing::info!("Cluster {}: {:?}", label, members);
    }

    let lookup_path = config.data_path(names::CLUSTER_LOOKUP);
    persistence::save_lookup(&lookup_path, &outcome.lookup())?;
    persistence::write_stamp(
        &lookup_path,
        "cluster",
        &file_inputs(&[("corpus", corpus)]),
        Some(config.suffixes.as_slice()),
    )?;
    tracing::info!("Saved stem -> cluster lookup to {}", lookup_path.display());

    let projection_path = config.results_path(names::CLUSTER_PROJECTION);
    let rows: Vec<ProjectionRow<'_>> = outcome
        .stems
        .iter()
        .zip(&outcome.labels)
        .zip(outcome.projection.coords.rows())
        .map(|((word, &cluster), xy)| ProjectionRow {
            word,
            cluster,
            x: xy[0],
            y: xy[1],
        })
        .collect();
    persistence::write_csv(&projection_path, &rows)?;
    persistence::write_stamp(&projection_path, "cluster", &[("cluster_lookup", &lookup_path)], None)?;
    tracing::info!(
        "Saved {:?} projection to {}",
        outcome.projection.method,
        projection_path.display()
    );

    Ok(outcome)
}

fn same_suffixes(a: &[String], b: &[String]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    a.dedup();
    b.sort();
    b.dedup();
    a == b
}

/// Load the lookup and refuse it if it was built with other suffixes.
fn load_checked_lookup(config: &PipelineConfig) -> Result<ClusterLookup> {
    let lookup_path = config.data_path(names::CLUSTER_LOOKUP);
    persistence::require(&lookup_path, "cluster")?;
    if let Some(stamp) = persistence::verify_fresh(&lookup_path, &[])? {
        if let Some(used) = &stamp.suffixes {
            if !same_suffixes(used, &config.suffixes) {
                return Err(VoynichError::StaleArtifact {
                    path: lookup_path,
                    reason: format!(
                        "lookup was built with suffixes {:?}, configuration has {:?}",
                        used, config.suffixes
                    ),
                });
            }
        }
    }
    persistence::load_lookup(&lookup_path)
}

/// Project the tagged corpus lines onto cluster labels.
pub fn run_project_stage(config: &PipelineConfig, corpus: &Path) -> Result<Vec<CorpusLine>> {
    let lookup = load_checked_lookup(config)?;
    let stripper = SuffixStripper::new(&config.suffixes);
    let projector = CorpusProjector::new(&stripper, &lookup, config.tag_delimiter);
    let lines = projector.project_document(&TextDocument::new(corpus))?;

    let (known, total) = lines.iter().fold((0usize, 0usize), |(k, t), l| {
        (k + l.labels.iter().filter(|x| x.is_some()).count(), t + l.labels.len())
    });
    if total > 0 {
        tracing::info!(
            "Cluster coverage: {}/{} tokens ({:.1}%) resolved",
            known,
            total,
            100.0 * known as f64 / total as f64
        );
    }

    let lookup_path = config.data_path(names::CLUSTER_LOOKUP);
    let out = config.results_path(names::LINE_CLUSTERS);
    persistence::write_line_clusters(&out, &lines)?;
    persistence::write_stamp(
        &out,
        "project",
        &file_inputs(&[("cluster_lookup", &lookup_path), ("corpus", corpus)]),
        Some(config.suffixes.as_slice()),
    )?;
    tracing::info!("Saved line clusters to {}", out.display());
    Ok(lines)
}

/// Lines and lookup for the downstream consumers, checked for staleness.
pub fn load_projection(config: &PipelineConfig) -> Result<(Vec<CorpusLine>, ClusterLookup)> {
    let lookup_path = config.data_path(names::CLUSTER_LOOKUP);
    let lines_path = config.results_path(names::LINE_CLUSTERS);
    persistence::require(&lookup_path, "cluster")?;
    persistence::require(&lines_path, "project")?;
    persistence::verify_fresh(&lines_path, &[("cluster_lookup", &lookup_path)])?;

    let loaded = persistence::read_line_clusters(&lines_path)?;
    if loaded.skipped > 0 {
        tracing::warn!(
            "{} malformed rows skipped in {}",
            loaded.skipped,
            lines_path.display()
        );
    }
    let lookup = persistence::load_lookup(&lookup_path)?;
    Ok((loaded.lines, lookup))
}

fn stamp_downstream(config: &PipelineConfig, out: &Path, stage: &str) -> Result<()> {
    let lookup_path = config.data_path(names::CLUSTER_LOOKUP);
    let lines_path = config.results_path(names::LINE_CLUSTERS);
    persistence::write_stamp(
        out,
        stage,
        &[("cluster_lookup", &lookup_path), ("line_clusters", &lines_path)],
        None,
    )?;
    Ok(())
}

/// Per-cluster statistics and inferred roles.
pub fn run_roles_stage(config: &PipelineConfig) -> Result<Vec<ClusterRoleSummary>> {
    let (lines, lookup) = load_projection(config)?;
    let summary = RoleInferenceEngine::new(config.role_thresholds.clone()).summarize(&lines, &lookup);

    let out = config.results_path(names::ROLE_SUMMARY);
    persistence::write_csv(&out, &summary)?;
    stamp_downstream(config, &out, "roles")?;
    tracing::info!("Saved cluster role summary to {}", out.display());
    Ok(summary)
}

/// Cluster transition matrix.
pub fn run_transitions_stage(config: &PipelineConfig) -> Result<TransitionMatrix> {
    let (lines, _) = load_projection(config)?;
    let matrix = TransitionModel::new(config.transition_stabilizer).fit(&lines);

    let out = config.results_path(names::TRANSITION_MATRIX);
    persistence::write_label_matrix(&out, &matrix.labels, &matrix.probs)?;
    stamp_downstream(config, &out, "transitions")?;
    for (from, to, p) in matrix.most_likely_next() {
        tracing::debug!("{} -> {} ({:.3})", from, to, p);
    }
    tracing::info!("Saved transition matrix to {}", out.display());
    Ok(matrix)
}

/// Candidate lexicon by manuscript section.
pub fn run_lexicon_stage(config: &PipelineConfig) -> Result<Vec<LexiconRecord>> {
    let (lines, lookup) = load_projection(config)?;
    let assembler = LexiconAssembler::new(
        SectionClassifier::new(config.sections.clone()),
        config.role_map.clone(),
    );
    let records = assembler.assemble(&lines, &lookup);

    let out = config.results_path(names::LEXICON);
    persistence::write_csv(&out, &records)?;
    stamp_downstream(config, &out, "lexicon")?;
    tracing::info!("Saved lexicon candidates to {}", out.display());
    Ok(records)
}
