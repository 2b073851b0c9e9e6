//! Corpus lines -> cluster label sequences.

use crate::corpus::{SuffixStripper, TaggedLine, TextDocument, WhitespaceTokenizer};
use crate::errors::Result;
use crate::types::{ClusterLookup, CorpusLine};

/// Maps every tagged paragraph of a document onto cluster labels.
#[derive(Debug)]
pub struct CorpusProjector<'a> {
    stripper: &'a SuffixStripper,
    lookup: &'a ClusterLookup,
    tag_delimiter: char,
    tokenizer: WhitespaceTokenizer,
}

impl<'a> CorpusProjector<'a> {
    /// Create a projector over a shared stripper and lookup.
    pub fn new(stripper: &'a SuffixStripper, lookup: &'a ClusterLookup, tag_delimiter: char) -> Self {
        Self {
            stripper,
            lookup,
            tag_delimiter,
            tokenizer: WhitespaceTokenizer,
        }
    }

    /// Project one paragraph; `None` if it is not a tagged line.
    pub fn project_paragraph(&self, paragraph: &str) -> Option<CorpusLine> {
        let line = TaggedLine::parse(&self.tokenizer, paragraph, self.tag_delimiter)?;
        let labels = line
            .tokens
            .iter()
            .map(|tok| self.lookup.get(self.stripper.strip(&tok.text)))
            .collect();
        Some(CorpusLine { tag: line.tag, labels })
    }

    /// Project paragraphs in order.
    pub fn project<I, S>(&self, paragraphs: I) -> Vec<CorpusLine>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        paragraphs
            .into_iter()
            .filter_map(|p| self.project_paragraph(p.as_ref()))
            .collect()
    }

    /// Project a whole document.
    pub fn project_document(&self, doc: &TextDocument) -> Result<Vec<CorpusLine>> {
        let mut out = Vec::new();
        for para in doc.paragraphs()? {
            if let Some(line) = self.project_paragraph(&para?) {
                out.push(line);
            }
        }
        tracing::info!(
            "Projected {} tagged lines from {}",
            out.len(),
            doc.path().display()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup() -> ClusterLookup {
        [
            ("ykeeal".to_string(), 8),
            ("ychockh".to_string(), 3),
            ("yteyt".to_string(), 8),
            ("qok".to_string(), 1),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn labels_follow_token_order_with_nulls() {
        let stripper = SuffixStripper::with_defaults();
        let lookup = lookup();
        let p = CorpusProjector::new(&stripper, &lookup, '<');

        let line = p.project_paragraph("<f1r.1> qokaiin unknownword ykeeal qokedy").unwrap();
        assert_eq!(line.tag, "<f1r.1>");
        assert_eq!(line.labels, vec![Some(1), None, Some(8), Some(1)]);
    }

    #[test]
    fn skips_untagged_paragraphs_and_keeps_order() {
        let stripper = SuffixStripper::with_defaults();
        let lookup = lookup();
        let p = CorpusProjector::new(&stripper, &lookup, '<');

        let lines = p.project([
            "<f1r.1> ykeeal ychockh",
            "",
            "title page",
            "<f67v.2> yteyt",
        ]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].labels, vec![Some(8), Some(3)]);
        assert_eq!(lines[1].tag, "<f67v.2>");
        assert_eq!(lines[1].labels, vec![Some(8)]);
    }

    #[test]
    fn all_suffix_tokens_resolve_through_empty_stem() {
        let stripper = SuffixStripper::with_defaults();
        let mut lookup = lookup();
        let p = CorpusProjector::new(&stripper, &lookup, '<');
        assert_eq!(p.project_paragraph("<f2r.1> y dy").unwrap().labels, vec![None, None]);

        lookup.insert("", 5);
        let p = CorpusProjector::new(&stripper, &lookup, '<');
        let line = p.project_paragraph("<f2r.1> y qokaiin dy").unwrap();
        assert_eq!(line.labels, vec![Some(5), Some(1), Some(5)]);
    }
}
