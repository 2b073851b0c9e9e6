//! Per-cluster usage statistics and a heuristic role label.
//!
//! The decision table is a bootstrap heuristic, not a classifier.

use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::config::RoleThresholds;
use crate::types::{ClusterLookup, CorpusLine, Label};

/// Role guessed for a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InferredRole {
    /// Very frequent, few distinct stems.
    Function,
    /// Many distinct stems.
    Root,
    /// Frequent at both line edges.
    Modifier,
    /// Leans towards line starts.
    SubjectMarker,
    /// Leans towards line ends.
    ObjectMarker,
    /// No signal.
    Unknown,
}

impl InferredRole {
    /// Label written to artifacts. Uncertain roles carry a `?`.
    pub fn as_str(&self) -> &'static str {
        match self {
            InferredRole::Function => "Function",
            InferredRole::Root => "Root",
            InferredRole::Modifier => "Modifier",
            InferredRole::SubjectMarker => "Subject Marker?",
            InferredRole::ObjectMarker => "Object Marker?",
            InferredRole::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for InferredRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for InferredRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Aggregate usage of one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterRoleSummary {
    /// Cluster label.
    #[serde(rename = "Cluster")]
    pub cluster: Label,
    /// Occurrences across all lines.
    #[serde(rename = "Total Occurrences")]
    pub total: u64,
    /// Distinct stems carrying this label.
    #[serde(rename = "Unique Words")]
    pub unique: u64,
    /// Lines whose first known label is this one.
    #[serde(rename = "Line Starts")]
    pub starts: u64,
    /// Lines whose last known label is this one.
    #[serde(rename = "Line Ends")]
    pub ends: u64,
    /// Decision-table outcome.
    #[serde(rename = "Inferred Role")]
    pub role: InferredRole,
}

/// Applies the role decision table to per-cluster statistics.
#[derive(Debug, Clone, Default)]
pub struct RoleInferenceEngine {
    thresholds: RoleThresholds,
}

impl RoleInferenceEngine {
    /// Create an engine with the given thresholds.
    pub fn new(thresholds: RoleThresholds) -> Self {
        Self { thresholds }
    }

    /// First matching rule wins.
    pub fn infer(&self, total: u64, unique: u64, starts: u64, ends: u64) -> InferredRole {
        let t = &self.thresholds;
        if total > t.function_min_total && unique < t.function_max_unique {
            InferredRole::Function
        } else if unique > t.root_min_unique {
            InferredRole::Root
        } else if starts > t.modifier_min_edges && ends > t.modifier_min_edges {
            InferredRole::Modifier
        } else if starts > ends {
            InferredRole::SubjectMarker
        } else if ends > starts {
            InferredRole::ObjectMarker
        } else {
            InferredRole::Unknown
        }
    }

    /// One summary per label in `lookup`, ascending.
    pub fn summarize(&self, lines: &[CorpusLine], lookup: &ClusterLookup) -> Vec<ClusterRoleSummary> {
        let mut totals: HashMap<Label, u64> = HashMap::new();
        let mut starts: HashMap<Label, u64> = HashMap::new();
        let mut ends: HashMap<Label, u64> = HashMap::new();

        for line in lines {
            let mut first = None;
            let mut last = None;
            for label in line.resolved() {
                first.get_or_insert(label);
                last = Some(label);
                *totals.entry(label).or_insert(0) += 1;
            }
            if let Some(f) = first {
                *starts.entry(f).or_insert(0) += 1;
            }
            if let Some(l) = last {
                *ends.entry(l).or_insert(0) += 1;
            }
        }

        lookup
            .reverse()
            .into_iter()
            .map(|(cluster, stems)| {
                let total = totals.get(&cluster).copied().unwrap_or(0);
                let unique = stems.len() as u64;
                let s = starts.get(&cluster).copied().unwrap_or(0);
                let e = ends.get(&cluster).copied().unwrap_or(0);
                ClusterRoleSummary {
                    cluster,
                    total,
                    unique,
                    starts: s,
                    ends: e,
                    role: self.infer(total, unique, s, e),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RoleInferenceEngine {
        RoleInferenceEngine::new(RoleThresholds::default())
    }

    #[test]
    fn decision_table_priority() {
        let e = engine();
        assert_eq!(e.infer(3001, 499, 0, 0), InferredRole::Function);
        // Fails Function on uniqueness, then matches Root.
        assert_eq!(e.infer(5000, 1500, 0, 0), InferredRole::Root);
        assert_eq!(e.infer(100, 10, 501, 501), InferredRole::Modifier);
        assert_eq!(e.infer(100, 10, 501, 400), InferredRole::SubjectMarker);
        assert_eq!(e.infer(100, 10, 3, 7), InferredRole::ObjectMarker);
        assert_eq!(e.infer(100, 10, 5, 5), InferredRole::Unknown);
        // Boundaries are strict.
        assert_eq!(e.infer(3000, 10, 0, 0), InferredRole::Unknown);
        assert_eq!(e.infer(4000, 500, 0, 0), InferredRole::Unknown);
    }

    #[test]
    fn thresholds_are_configurable() {
        let e = RoleInferenceEngine::new(RoleThresholds {
            function_min_total: 2,
            function_max_unique: 5,
            root_min_unique: 100,
            modifier_min_edges: 100,
        });
        assert_eq!(e.infer(3, 2, 0, 0), InferredRole::Function);
    }

    #[test]
    fn counts_use_first_and_last_known_labels() {
        let lookup: ClusterLookup = [
            ("a".to_string(), 0),
            ("b".to_string(), 1),
            ("c".to_string(), 1),
            ("d".to_string(), 2),
        ]
        .into_iter()
        .collect();
        let lines = vec![
            CorpusLine { tag: "<f1r.1>".into(), labels: vec![None, Some(0), Some(1), None] },
            CorpusLine { tag: "<f1r.2>".into(), labels: vec![Some(1), Some(1)] },
            CorpusLine { tag: "<f1r.3>".into(), labels: vec![None, None] },
        ];

        let summary = engine().summarize(&lines, &lookup);
        assert_eq!(summary.len(), 3);

        let c0 = &summary[0];
        assert_eq!((c0.cluster, c0.total, c0.unique, c0.starts, c0.ends), (0, 1, 1, 1, 0));
        assert_eq!(c0.role, InferredRole::SubjectMarker);

        let c1 = &summary[1];
        assert_eq!((c1.cluster, c1.total, c1.unique, c1.starts, c1.ends), (1, 3, 2, 1, 2));
        assert_eq!(c1.role, InferredRole::ObjectMarker);

        let c2 = &summary[2];
        assert_eq!((c2.total, c2.starts, c2.ends), (0, 0, 0));
        assert_eq!(c2.role, InferredRole::Unknown);
    }
}
