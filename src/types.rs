//! Common core types shared by every pipeline stage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Cluster label assigned to a stem (`0..k`).
pub type Label = u32;

/// Authoritative `stem -> label` mapping produced by the cluster stage.
///
/// Stems missing from the lookup are unknown, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterLookup {
    map: BTreeMap<String, Label>,
}

impl ClusterLookup {
    /// Create an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `label` to `stem`, returning the previous label if any.
    pub fn insert(&mut self, stem: impl Into<String>, label: Label) -> Option<Label> {
        self.map.insert(stem.into(), label)
    }

    /// Resolve a stem.
    pub fn get(&self, stem: &str) -> Option<Label> {
        self.map.get(stem).copied()
    }

    /// Number of stems.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no stem has a label.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate `(stem, label)` in stem order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Label)> {
        self.map.iter().map(|(s, l)| (s.as_str(), *l))
    }

    /// Reverse mapping `label -> stems`, stems sorted.
    pub fn reverse(&self) -> BTreeMap<Label, Vec<String>> {
        let mut rev: BTreeMap<Label, Vec<String>> = BTreeMap::new();
        for (stem, label) in &self.map {
            rev.entry(*label).or_default().push(stem.clone());
        }
        rev
    }
}

impl FromIterator<(String, Label)> for ClusterLookup {
    fn from_iter<I: IntoIterator<Item = (String, Label)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

/// One tagged corpus line projected onto cluster labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusLine {
    /// Folio/paragraph tag, e.g. `<f1r.1>`.
    pub tag: String,
    /// One entry per token; `None` where the stem has no cluster.
    pub labels: Vec<Option<Label>>,
}

impl CorpusLine {
    /// Labels with unknown entries removed, order preserved.
    pub fn resolved(&self) -> impl Iterator<Item = Label> + '_ {
        self.labels.iter().filter_map(|l| *l)
    }

    /// Folio identifier: the tag without angle brackets, up to the first `.`.
    pub fn folio(&self) -> &str {
        let inner = self.tag.trim_start_matches('<').trim_end_matches('>');
        inner.split('.').next().unwrap_or(inner)
    }
}

/// Section name used when a folio matches no configured range.
pub const UNCATEGORIZED: &str = "Uncategorized";
