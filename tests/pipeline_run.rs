use std::fs;
use std::path::Path;

use voynich_roles::{
    config::ReducerKind,
    embedding::HashedNgramEmbedder,
    persistence::{self, names},
    pipeline::stages,
    PipelineConfig, VoynichError,
};

const CORPUS: &str = "\
<f1r.1> qokaiin chol shedy daiin okchey
<f1r.2> qokeedy chol cthol sheol otedy
<f2v.1> daiin qokal shol okaiin chody
<f68r.1> otaiin okal cheol qokchy dal
<f88r.3> sholdy qokol chor daral okeol
";

fn small_config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig {
        data_dir: dir.join("data"),
        results_dir: dir.join("results"),
        n_clusters: 3,
        n_init: 4,
        ..PipelineConfig::default()
    };
    config.embedding.dim = 64;
    config
}

fn write_corpus(dir: &Path) -> std::path::PathBuf {
    let corpus = dir.join("corpus.txt");
    fs::write(&corpus, CORPUS).unwrap();
    corpus
}

#[test]
fn full_pipeline_on_small_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let corpus = write_corpus(dir.path());
    let embedder = HashedNgramEmbedder::new(config.embedding.dim, 1, 3);

    let outcome = stages::run_cluster_stage(&config, &corpus, &embedder).expect("cluster failed");
    assert_eq!(outcome.k, 3);
    assert_eq!(outcome.stems.len(), outcome.labels.len());
    assert!(outcome.labels.iter().all(|&l| l < 3));
    assert_eq!(outcome.projection.coords.dim(), (outcome.stems.len(), 2));

    let lookup = persistence::load_lookup(&config.data_path(names::CLUSTER_LOOKUP)).unwrap();
    assert_eq!(lookup.len(), outcome.stems.len());
    assert!(lookup.get("qok").is_some());
    let stamp = persistence::read_stamp(&config.data_path(names::CLUSTER_LOOKUP))
        .unwrap()
        .expect("lookup stamp");
    assert_eq!(stamp.stage, "cluster");
    assert_eq!(stamp.suffixes.as_deref(), Some(config.suffixes.as_slice()));
    assert!(config.data_path(names::UNIQUE_STEMS).exists());
    assert!(config.data_path(names::EMBEDDINGS).exists());
    let projection = fs::read_to_string(config.results_path(names::CLUSTER_PROJECTION)).unwrap();
    let mut rows = projection.lines();
    assert_eq!(rows.next(), Some("Word,Cluster,X,Y"));
    assert_eq!(rows.count(), outcome.stems.len());

    // Every corpus token strips to a clustered stem, so nothing is unknown.
    let lines = stages::run_project_stage(&config, &corpus).expect("project failed");
    assert_eq!(lines.len(), 5);
    for line in &lines {
        assert_eq!(line.labels.len(), 5);
        assert!(line.labels.iter().all(Option::is_some), "{:?}", line);
    }

    let summary = stages::run_roles_stage(&config).unwrap();
    let total: u64 = summary.iter().map(|s| s.total).sum();
    assert_eq!(total, 25);
    let starts: u64 = summary.iter().map(|s| s.starts).sum();
    assert_eq!(starts, 5);

    let matrix = stages::run_transitions_stage(&config).unwrap();
    for (i, &label) in matrix.labels.iter().enumerate() {
        if matrix.counts.row(i).sum() > 0 {
            approx::assert_abs_diff_eq!(matrix.row_sum(label).unwrap(), 1.0, epsilon = 1e-6);
        }
    }

    let records = stages::run_lexicon_stage(&config).unwrap();
    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.section_exclusive == (r.section_count == 1)));
    let sections: Vec<_> = records.iter().map(|r| r.section.as_str()).collect();
    let mut sorted = sections.clone();
    sorted.sort();
    assert_eq!(sections, sorted);
}

#[test]
fn same_seed_same_lookup() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let embedder = HashedNgramEmbedder::new(64, 1, 3);

    let ca = small_config(a.path());
    let cb = small_config(b.path());
    let first = stages::run_cluster_stage(&ca, &write_corpus(a.path()), &embedder).unwrap();
    let second = stages::run_cluster_stage(&cb, &write_corpus(b.path()), &embedder).unwrap();
    assert_eq!(first.lookup(), second.lookup());

    // Rerunning in place reuses the embedding cache and reproduces the labels.
    let again = stages::run_cluster_stage(&ca, &write_corpus(a.path()), &embedder).unwrap();
    assert_eq!(first.labels, again.labels);
}

#[test]
fn too_few_points_falls_back_to_pca() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.txt");
    fs::write(&corpus, "<f1r.1> qokaiin chol shedy\n").unwrap();
    let config = PipelineConfig {
        reducer: ReducerKind::Spectral,
        ..small_config(dir.path())
    };
    let embedder = HashedNgramEmbedder::new(32, 1, 3);

    let outcome = stages::run_cluster_stage(&config, &corpus, &embedder).unwrap();
    assert_eq!(outcome.projection.method, ReducerKind::Pca);
    assert!(outcome.projection.fallback_reason.is_some());
    assert_eq!(outcome.k, 3);
}

#[test]
fn reclustering_invalidates_old_projection() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let corpus = write_corpus(dir.path());
    let embedder = HashedNgramEmbedder::new(64, 1, 3);
    stages::run_cluster_stage(&config, &corpus, &embedder).unwrap();
    stages::run_project_stage(&config, &corpus).unwrap();
    stages::load_projection(&config).expect("fresh projection");

    // One cluster instead of three: the lookup on disk changes.
    let recluster = PipelineConfig {
        n_clusters: 1,
        ..small_config(dir.path())
    };
    stages::run_cluster_stage(&recluster, &corpus, &embedder).unwrap();

    let err = stages::run_roles_stage(&config).unwrap_err();
    assert!(matches!(err, VoynichError::StaleArtifact { .. }), "got {:?}", err);
}

#[test]
fn all_suffix_tokens_get_the_empty_stem_label() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.txt");
    fs::write(&corpus, "<f1r.1> qokaiin dy chol y\n<f2r.1> dy shedy\n").unwrap();
    let config = small_config(dir.path());
    let embedder = HashedNgramEmbedder::new(64, 1, 3);

    let outcome = stages::run_cluster_stage(&config, &corpus, &embedder).unwrap();
    assert_eq!(outcome.stems, vec!["", "chol", "qok", "sh"]);
    let lookup = outcome.lookup();
    let empty = lookup.get("").expect("empty stem is clustered");

    let lines = stages::run_project_stage(&config, &corpus).unwrap();
    assert!(lines.iter().all(|l| l.labels.iter().all(Option::is_some)), "{:?}", lines);
    assert_eq!(lines[0].labels[1], Some(empty));
    assert_eq!(lines[0].labels[3], Some(empty));
    assert_eq!(lines[1].labels[0], Some(empty));
    assert_eq!(lines[0].labels[0], lookup.get("qok"));
}
