//! First-order Markov transitions between cluster labels within a line.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array2;

use crate::types::{CorpusLine, Label};

/// Row-normalized transition probabilities.
#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    /// Row/column labels, ascending.
    pub labels: Vec<Label>,
    /// `probs[[i, j]]` = P(labels[j] follows labels[i]).
    pub probs: Array2<f64>,
    /// Raw pair counts, same layout.
    pub counts: Array2<u64>,
}

impl TransitionMatrix {
    /// Probability that `to` follows `from`, if both are indexed.
    pub fn get(&self, from: Label, to: Label) -> Option<f64> {
        let i = self.labels.binary_search(&from).ok()?;
        let j = self.labels.binary_search(&to).ok()?;
        Some(self.probs[[i, j]])
    }

    /// Sum of row `label`.
    pub fn row_sum(&self, label: Label) -> Option<f64> {
        let i = self.labels.binary_search(&label).ok()?;
        Some(self.probs.row(i).sum())
    }

    /// Most likely successor per label (ties to the lower label).
    pub fn most_likely_next(&self) -> Vec<(Label, Label, f64)> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, &from)| {
                let row = self.probs.row(i);
                let (j, p) = row
                    .iter()
                    .enumerate()
                    .fold((0usize, f64::NEG_INFINITY), |acc, (j, &p)| if p > acc.1 { (j, p) } else { acc });
                (p > 0.0).then(|| (from, self.labels[j], p))
            })
            .collect()
    }
}

/// Builds the transition matrix from projected lines.
#[derive(Debug, Clone)]
pub struct TransitionModel {
    stabilizer: f64,
}

impl Default for TransitionModel {
    fn default() -> Self {
        Self { stabilizer: 1e-9 }
    }
}

impl TransitionModel {
    /// Create a model; `stabilizer` is added to every row sum.
    pub fn new(stabilizer: f64) -> Self {
        Self { stabilizer }
    }

    /// Count adjacent known labels per line; never across lines.
    pub fn fit(&self, lines: &[CorpusLine]) -> TransitionMatrix {
        let mut pairs: BTreeMap<(Label, Label), u64> = BTreeMap::new();
        let mut outgoing: BTreeMap<Label, u64> = BTreeMap::new();

        for line in lines {
            let known: Vec<Label> = line.resolved().collect();
            for w in known.windows(2) {
                *pairs.entry((w[0], w[1])).or_insert(0) += 1;
                *outgoing.entry(w[0]).or_insert(0) += 1;
            }
        }

        let labels: Vec<Label> = pairs
            .keys()
            .flat_map(|&(a, b)| [a, b])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let n = labels.len();
        let mut counts = Array2::<u64>::zeros((n, n));
        for (&(a, b), &c) in &pairs {
            // Both labels are in `labels` by construction.
            if let (Ok(i), Ok(j)) = (labels.binary_search(&a), labels.binary_search(&b)) {
                counts[[i, j]] = c;
            }
        }

        let mut probs = Array2::<f64>::zeros((n, n));
        for (i, from) in labels.iter().enumerate() {
            let total = outgoing.get(from).copied().unwrap_or(0) as f64;
            for j in 0..n {
                probs[[i, j]] = counts[[i, j]] as f64 / (total + self.stabilizer);
            }
        }

        tracing::info!("Transition matrix over {} clusters from {} pairs", n, pairs.values().sum::<u64>());
        TransitionMatrix { labels, probs, counts }
    }
}
