//! Corpus ingestion, tokenization, and suffix normalization.

pub mod suffix;
pub mod tokenizer;
/// Paragraph document and raw word loading.
pub mod loader;

use std::collections::BTreeSet;

pub use loader::{collect_words, TextDocument};
pub use suffix::{SuffixStripper, DEFAULT_SUFFIXES};
pub use tokenizer::{TaggedLine, Token, Tokenizer, WhitespaceTokenizer};

/// Distinct stems of `words`, sorted.
///
/// A token that is all suffix (`dy`, `y`) strips to the empty stem, which
/// is kept and clustered like any other.
pub fn stem_set<S: AsRef<str>>(stripper: &SuffixStripper, words: &[S]) -> Vec<String> {
    let set: BTreeSet<&str> = words.iter().map(|w| stripper.strip(w.as_ref())).collect();
    set.into_iter().map(str::to_string).collect()
}
