use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::errors::{Result, VoynichError};

/// A transcription document stored as UTF-8 text, one paragraph per line.
#[derive(Debug, Clone)]
pub struct TextDocument {
    path: PathBuf,
}

impl TextDocument {
    /// Create a reader for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate paragraphs in document order.
    pub fn paragraphs(&self) -> Result<impl Iterator<Item = Result<String>>> {
        let file = File::open(&self.path).map_err(|e| {
            VoynichError::Corpus(format!("cannot open {}: {}", self.path.display(), e))
        })?;
        let reader = BufReader::new(file);
        Ok(reader.lines().map(|line| line.map_err(VoynichError::from)))
    }
}

/// Collect raw words for the cluster stage.
///
/// A directory contributes every whitespace token of every regular file in
/// it (sorted by file name). A single file is read as a [`TextDocument`]:
/// tagged lines contribute their tokens without the tag, other lines all of
/// their words.
pub fn collect_words(path: &Path, tag_delimiter: char) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(VoynichError::Corpus(format!(
            "corpus path {} does not exist",
            path.display()
        )));
    }

    let mut words = Vec::new();
    if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        for file in files {
            let text = fs::read_to_string(&file)?;
            words.extend(text.split_whitespace().map(str::to_string));
        }
    } else {
        for para in TextDocument::new(path).paragraphs()? {
            let para = para?;
            let mut fields = para.split_whitespace().peekable();
            if fields.peek().map_or(false, |f| f.starts_with(tag_delimiter)) {
                fields.next();
            }
            words.extend(fields.map(str::to_string));
        }
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_words_skip_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.txt");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "<f1r.1> qokaiin shedy").unwrap();
        writeln!(f, "untagged words here").unwrap();
        drop(f);

        let words = collect_words(&path, '<').unwrap();
        assert_eq!(words, vec!["qokaiin", "shedy", "untagged", "words", "here"]);
    }

    #[test]
    fn directory_reads_all_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "chol daiin").unwrap();
        fs::write(dir.path().join("a.txt"), "okeey\nqokedy").unwrap();

        let words = collect_words(dir.path(), '<').unwrap();
        assert_eq!(words, vec!["okeey", "qokedy", "chol", "daiin"]);
    }

    #[test]
    fn missing_path_is_corpus_error() {
        let err = collect_words(Path::new("/nonexistent/voynich"), '<').unwrap_err();
        assert!(matches!(err, VoynichError::Corpus(_)));
    }
}
