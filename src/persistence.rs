//! Artifact files exchanged between stages, and the stamps that tie each
//! artifact to the exact inputs it was derived from.
//!
//! Every artifact `foo.csv` gets a sidecar `foo.csv.meta.json`. Consumers
//! recompute input digests and refuse to run on stale data.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{Result, VoynichError};
use crate::types::{ClusterLookup, CorpusLine, Label};

/// Well-known artifact file names.
pub mod names {
    /// Sorted stem set (JSON).
    pub const UNIQUE_STEMS: &str = "unique_stems.json";
    /// Embedding cache (bincode).
    pub const EMBEDDINGS: &str = "stem_embeddings.bin";
    /// Stem -> label lookup (JSON).
    pub const CLUSTER_LOOKUP: &str = "stripped_cluster_lookup.json";
    /// 2-D coordinates per stem (CSV).
    pub const CLUSTER_PROJECTION: &str = "cluster_projection.csv";
    /// Line tag -> label sequence (CSV).
    pub const LINE_CLUSTERS: &str = "voynich_line_clusters.csv";
    /// Per-cluster role summary (CSV).
    pub const ROLE_SUMMARY: &str = "cluster_role_summary.csv";
    /// Transition probabilities (CSV).
    pub const TRANSITION_MATRIX: &str = "cluster_transition_matrix.csv";
    /// Lexicon candidates (CSV).
    pub const LEXICON: &str = "lexicon_candidates.csv";
    /// Similarity probe output (CSV).
    pub const LANGUAGE_SIMILARITY: &str = "cluster_language_similarity.csv";
}

/// Provenance record written next to an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStamp {
    /// Crate version that wrote the artifact.
    pub version: String,
    /// RFC 3339 timestamp of creation.
    pub created_at: String,
    /// Producing stage.
    pub stage: String,
    /// SHA-256 of the artifact itself.
    pub digest: String,
    /// SHA-256 of every input, by input name.
    pub inputs: BTreeMap<String, String>,
    /// Suffix list used for normalization, if the stage normalized tokens.
    #[serde(default)]
    pub suffixes: Option<Vec<String>>,
}

/// Location of the stamp for `artifact`.
pub fn stamp_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fail with [`VoynichError::MissingArtifact`] unless `path` exists.
pub fn require(path: &Path, producer: &'static str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(VoynichError::MissingArtifact {
            path: path.to_path_buf(),
            producer,
        })
    }
}

/// Write `artifact`'s stamp, hashing the artifact and every input.
pub fn write_stamp(
    artifact: &Path,
    stage: &str,
    inputs: &[(&str, &Path)],
    suffixes: Option<&[String]>,
) -> Result<ArtifactStamp> {
    let mut input_digests = BTreeMap::new();
    for (name, path) in inputs {
        input_digests.insert(name.to_string(), sha256_file(path)?);
    }
    let stamp = ArtifactStamp {
        version: env!("CARGO_PKG_VERSION").to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        stage: stage.to_string(),
        digest: sha256_file(artifact)?,
        inputs: input_digests,
        suffixes: suffixes.map(<[String]>::to_vec),
    };
    write_atomic(&stamp_path(artifact), |w| {
        serde_json::to_writer_pretty(&mut *w, &stamp)?;
        Ok(())
    })?;
    Ok(stamp)
}

/// Read `artifact`'s stamp; `None` if it has none.
pub fn read_stamp(artifact: &Path) -> Result<Option<ArtifactStamp>> {
    let path = stamp_path(artifact);
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(&path)?;
    Ok(Some(serde_json::from_reader(BufReader::new(file))?))
}

/// Check that `artifact` still reflects the current `inputs`.
///
/// Artifacts without a stamp (written by external tools) pass with a
/// warning; inputs the stamp does not mention are not checked.
pub fn verify_fresh(artifact: &Path, inputs: &[(&str, &Path)]) -> Result<Option<ArtifactStamp>> {
    let stamp = match read_stamp(artifact)? {
        Some(s) => s,
        None => {
            tracing::warn!("{} has no stamp; freshness not checked", artifact.display());
            return Ok(None);
        }
    };

    let own = sha256_file(artifact)?;
    if own != stamp.digest {
        return Err(VoynichError::StaleArtifact {
            path: artifact.to_path_buf(),
            reason: "artifact was modified after it was stamped".into(),
        });
    }

    for (name, path) in inputs {
        if let Some(recorded) = stamp.inputs.get(*name) {
            let current = sha256_file(path)?;
            if &current != recorded {
                return Err(VoynichError::StaleArtifact {
                    path: artifact.to_path_buf(),
                    reason: format!(
                        "input `{}` ({}) changed since this artifact was built; rerun the {} stage",
                        name,
                        path.display(),
                        stamp.stage
                    ),
                });
            }
        }
    }

    Ok(Some(stamp))
}

/// Write through a temporary sibling and rename, so readers never see a
/// truncated file.
pub fn write_atomic<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let result = (|| -> Result<()> {
        let mut file = File::create(&tmp)?;
        body(&mut file)?;
        file.flush()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            fs::rename(&tmp, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Write a JSON value.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |w| {
        serde_json::to_writer(&mut *w, value)?;
        Ok(())
    })
}

/// Save the cluster lookup.
pub fn save_lookup(path: &Path, lookup: &ClusterLookup) -> Result<()> {
    save_json(path, lookup)
}

/// Load the cluster lookup; missing file is fatal.
pub fn load_lookup(path: &Path) -> Result<ClusterLookup> {
    require(path, "cluster")?;
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Render a label sequence as a literal list, e.g. `[8, 3, None]`.
pub fn format_sequence(labels: &[Option<Label>]) -> String {
    let items: Vec<String> = labels
        .iter()
        .map(|l| match l {
            Some(l) => l.to_string(),
            None => "None".to_string(),
        })
        .collect();
    format!("[{}]", items.join(", "))
}

/// Parse a literal list; `None` and `null` both mean unknown.
pub fn parse_sequence(s: &str) -> Result<Vec<Option<Label>>> {
    let inner = s
        .trim()
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(|| VoynichError::MalformedRecord(format!("not a list: {:?}", s)))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut items: Vec<&str> = inner.split(',').collect();
    // One trailing comma is allowed: `[8, 3,]`.
    if items.len() > 1 && items.last().map_or(false, |l| l.trim().is_empty()) {
        items.pop();
    }

    items
        .into_iter()
        .map(|item| match item.trim() {
            "None" | "null" => Ok(None),
            other => other
                .parse::<Label>()
                .map(Some)
                .map_err(|_| VoynichError::MalformedRecord(format!("bad label {:?} in {:?}", other, s))),
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
struct LineClusterRow {
    #[serde(rename = "Line Tag")]
    tag: String,
    #[serde(rename = "Cluster Sequence")]
    sequence: String,
}

/// Write the line projection.
pub fn write_line_clusters(path: &Path, lines: &[CorpusLine]) -> Result<()> {
    write_atomic(path, |file| {
        let mut w = csv::Writer::from_writer(file);
        for line in lines {
            w.serialize(LineClusterRow {
                tag: line.tag.clone(),
                sequence: format_sequence(&line.labels),
            })?;
        }
        w.flush()?;
        Ok(())
    })
}

/// Line projection as read back, with the number of rows skipped.
#[derive(Debug, Clone)]
pub struct LoadedLines {
    /// Parsed lines in file order.
    pub lines: Vec<CorpusLine>,
    /// Rows that failed to parse.
    pub skipped: usize,
}

/// Read the line projection. Malformed rows are skipped with a warning;
/// the rest keep their order.
pub fn read_line_clusters(path: &Path) -> Result<LoadedLines> {
    require(path, "project")?;
    let mut reader = csv::Reader::from_path(path)?;
    let mut lines = Vec::new();
    let mut skipped = 0;

    for (i, row) in reader.deserialize::<LineClusterRow>().enumerate() {
        let row = match row {
            Ok(r) => r,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                tracing::warn!("Skipping row {} of {}: {}", i + 1, path.display(), e);
                skipped += 1;
                continue;
            }
        };
        match parse_sequence(&row.sequence) {
            Ok(labels) => lines.push(CorpusLine { tag: row.tag, labels }),
            Err(e) => {
                tracing::warn!("Skipping row {} ({}) of {}: {}", i + 1, row.tag, path.display(), e);
                skipped += 1;
            }
        }
    }

    Ok(LoadedLines { lines, skipped })
}

/// Serialize `rows` as CSV with a header from the row type.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    write_atomic(path, |file| {
        let mut w = csv::Writer::from_writer(file);
        for row in rows {
            w.serialize(row)?;
        }
        w.flush()?;
        Ok(())
    })
}

/// Write a square label-indexed matrix: header row of labels with an empty
/// corner cell, then one row per label.
pub fn write_label_matrix(path: &Path, labels: &[Label], values: &Array2<f64>) -> Result<()> {
    write_atomic(path, |file| {
        let mut w = csv::Writer::from_writer(file);
        let mut header = vec![String::new()];
        header.extend(labels.iter().map(|l| l.to_string()));
        w.write_record(&header)?;
        for (i, label) in labels.iter().enumerate() {
            let mut record = vec![label.to_string()];
            record.extend(values.row(i).iter().map(|p| p.to_string()));
            w.write_record(&record)?;
        }
        w.flush()?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_literal_round_trip_and_null_spelling() {
        let labels = vec![Some(8), None, Some(3)];
        let s = format_sequence(&labels);
        assert_eq!(s, "[8, None, 3]");
        assert_eq!(parse_sequence(&s).unwrap(), labels);
        assert_eq!(parse_sequence("[8, null,3]").unwrap(), labels);
        assert_eq!(parse_sequence("[]").unwrap(), Vec::new());
    }

    #[test]
    fn malformed_sequences_rejected() {
        assert!(parse_sequence("8, 3").is_err());
        assert!(parse_sequence("[8, x]").is_err());
        assert!(parse_sequence("[-1]").is_err());
        assert!(parse_sequence("[8,, 3]").is_err());
        assert!(parse_sequence("[,]").is_err());
        assert!(parse_sequence("[8, 3,,]").is_err());
    }

    #[test]
    fn single_trailing_comma_accepted() {
        assert_eq!(parse_sequence("[8, 3,]").unwrap(), vec![Some(8), Some(3)]);
        assert_eq!(parse_sequence("[None, ]").unwrap(), vec![None]);
    }

    #[test]
    fn trailing_comma_rows_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.csv");
        fs::write(&path, "Line Tag,Cluster Sequence\n<f1r.1>,\"[8, 3,]\"\n").unwrap();
        let loaded = read_line_clusters(&path).unwrap();
        assert_eq!(loaded.skipped, 0);
        assert_eq!(loaded.lines[0].labels, vec![Some(8), Some(3)]);
    }

    #[test]
    fn malformed_rows_are_skipped_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.csv");
        fs::write(
            &path,
            "Line Tag,Cluster Sequence\n<f1r.1>,\"[8, 3]\"\n<f1r.2>,\"[oops]\"\n<f1r.3>,\"[None, 2]\"\n",
        )
        .unwrap();

        let loaded = read_line_clusters(&path).unwrap();
        assert_eq!(loaded.skipped, 1);
        let tags: Vec<_> = loaded.lines.iter().map(|l| l.tag.as_str()).collect();
        assert_eq!(tags, vec!["<f1r.1>", "<f1r.3>"]);
        assert_eq!(loaded.lines[1].labels, vec![None, Some(2)]);
    }

    #[test]
    fn missing_artifact_is_reported() {
        let err = load_lookup(Path::new("/nonexistent/lookup.json")).unwrap_err();
        assert!(matches!(err, VoynichError::MissingArtifact { producer: "cluster", .. }));
    }

    #[test]
    fn stamp_detects_changed_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("lookup.json");
        let artifact = dir.path().join("lines.csv");
        fs::write(&input, "{\"qok\":1}").unwrap();
        fs::write(&artifact, "Line Tag,Cluster Sequence\n").unwrap();

        write_stamp(&artifact, "project", &[("cluster_lookup", &input)], None).unwrap();
        assert!(verify_fresh(&artifact, &[("cluster_lookup", &input)]).unwrap().is_some());

        fs::write(&input, "{\"qok\":2}").unwrap();
        let err = verify_fresh(&artifact, &[("cluster_lookup", &input)]).unwrap_err();
        assert!(matches!(err, VoynichError::StaleArtifact { .. }));
    }

    #[test]
    fn unstamped_artifact_passes() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("external.csv");
        fs::write(&artifact, "x").unwrap();
        assert!(verify_fresh(&artifact, &[]).unwrap().is_none());
    }

    #[test]
    fn lookup_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lookup.json");
        let lookup: ClusterLookup = [("qok".to_string(), 1), ("chol".to_string(), 0)].into_iter().collect();
        save_lookup(&path, &lookup).unwrap();
        assert_eq!(load_lookup(&path).unwrap(), lookup);
    }
}
