//! Candidate lexicon: which stems plausibly occur in which manuscript
//! section, given only their cluster labels.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::SectionRange;
use crate::types::{ClusterLookup, CorpusLine, Label, UNCATEGORIZED};

/// Maps folio numbers to manuscript sections.
#[derive(Debug, Clone)]
pub struct SectionClassifier {
    sections: Vec<SectionRange>,
}

impl SectionClassifier {
    /// Ranges are tried in order; the first containing the folio wins.
    pub fn new(sections: Vec<SectionRange>) -> Self {
        Self { sections }
    }

    /// Section of a folio identifier such as `f67v` (digits are extracted).
    pub fn section_for_folio(&self, folio: &str) -> &str {
        let digits: String = folio.chars().filter(char::is_ascii_digit).collect();
        let number = match digits.parse::<u32>() {
            Ok(n) => n,
            Err(_) => return UNCATEGORIZED,
        };
        self.sections
            .iter()
            .find(|s| s.contains(number))
            .map_or(UNCATEGORIZED, |s| s.name.as_str())
    }

    /// Section of a corpus line, from its tag.
    pub fn section_for_line(&self, line: &CorpusLine) -> &str {
        self.section_for_folio(line.folio())
    }
}

/// One (section, stem) row of the lexicon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LexiconRecord {
    /// Manuscript section.
    #[serde(rename = "Section")]
    pub section: String,
    /// Stem.
    #[serde(rename = "Word")]
    pub word: String,
    /// Times the stem's cluster occurred in this section.
    #[serde(rename = "Estimated Frequency")]
    pub frequency: u64,
    /// The stem's cluster.
    #[serde(rename = "Cluster")]
    pub cluster: Label,
    /// Role from the cluster role map, or `Cluster N`.
    #[serde(rename = "POS Role")]
    pub pos_role: String,
    /// Distinct sections the stem appears in.
    #[serde(rename = "Section Count")]
    pub section_count: usize,
    /// True iff `section_count == 1`.
    #[serde(rename = "Section Exclusive")]
    pub section_exclusive: bool,
    /// Sorted section names, comma separated.
    #[serde(rename = "Sections Used In")]
    pub sections_used_in: String,
}

/// Cross-references lines, lookup, and section ranges.
#[derive(Debug, Clone)]
pub struct LexiconAssembler {
    classifier: SectionClassifier,
    role_map: BTreeMap<Label, String>,
}

impl LexiconAssembler {
    /// Create an assembler.
    pub fn new(classifier: SectionClassifier, role_map: BTreeMap<Label, String>) -> Self {
        Self { classifier, role_map }
    }

    /// POS role for a cluster.
    pub fn role_for(&self, cluster: Label) -> String {
        self.role_map
            .get(&cluster)
            .cloned()
            .unwrap_or_else(|| format!("Cluster {}", cluster))
    }

    /// Build records sorted by section, then frequency descending, then word.
    pub fn assemble(&self, lines: &[CorpusLine], lookup: &ClusterLookup) -> Vec<LexiconRecord> {
        let reverse = lookup.reverse();
        let mut freq: BTreeMap<(String, String), u64> = BTreeMap::new();
        let mut word_sections: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for line in lines {
            let section = self.classifier.section_for_line(line);
            for label in line.resolved() {
                let Some(stems) = reverse.get(&label) else {
                    continue;
                };
                for stem in stems {
                    *freq.entry((section.to_string(), stem.clone())).or_insert(0) += 1;
                    word_sections
                        .entry(stem.clone())
                        .or_default()
                        .insert(section.to_string());
                }
            }
        }

        let mut records: Vec<LexiconRecord> = freq
            .into_iter()
            .filter(|(_, f)| *f > 0)
            .filter_map(|((section, word), frequency)| {
                let cluster = lookup.get(&word)?;
                let used = word_sections.get(&word)?;
                Some(LexiconRecord {
                    section,
                    frequency,
                    cluster,
                    pos_role: self.role_for(cluster),
                    section_count: used.len(),
                    section_exclusive: used.len() == 1,
                    sections_used_in: used.iter().map(String::as_str).collect::<Vec<_>>().join(", "),
                    word,
                })
            })
            .collect();

        records.sort_by(|a, b| {
            a.section
                .cmp(&b.section)
                .then(b.frequency.cmp(&a.frequency))
                .then_with(|| a.word.cmp(&b.word))
        });

        tracing::info!("Assembled {} lexicon candidates", records.len());
        records
    }
}
