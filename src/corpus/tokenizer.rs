//! Tokenization of transcription paragraphs into tag + tokens.

/// A raw token and its index within the line (tag excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token text as transcribed.
    pub text: String,
    /// Position among the line's tokens.
    pub position: usize,
}

/// Trait for tokenization.
pub trait Tokenizer: Send + Sync {
    /// Split text into tokens.
    fn tokenize(&self, text: &str) -> Vec<Token>;
}

/// Whitespace tokenizer; the transcription separates words by spaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, t)| Token {
                text: t.to_string(),
                position: i,
            })
            .collect()
    }
}

/// A paragraph that starts with a line tag, e.g. `<f1r.1> ykeeal ychockh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedLine {
    /// First whitespace-delimited field.
    pub tag: String,
    /// Remaining fields, in order.
    pub tokens: Vec<Token>,
}

impl TaggedLine {
    /// Parse a paragraph. `None` unless the trimmed text is non-empty and
    /// begins with `delimiter`.
    pub fn parse<T: Tokenizer + ?Sized>(tokenizer: &T, paragraph: &str, delimiter: char) -> Option<Self> {
        let text = paragraph.trim();
        if !text.starts_with(delimiter) {
            return None;
        }

        let mut tokens = tokenizer.tokenize(text);
        if tokens.is_empty() {
            return None;
        }
        let tag = tokens.remove(0).text;
        for (i, tok) in tokens.iter_mut().enumerate() {
            tok.position = i;
        }

        Some(Self { tag, tokens })
    }
}
