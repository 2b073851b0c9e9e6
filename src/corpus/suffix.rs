//! Suffix stripping. Every stage normalizes through one `SuffixStripper`.

/// Suffixes stripped from transcription tokens by default.
pub const DEFAULT_SUFFIXES: &[&str] = &["aiin", "dy", "in", "chy", "chey", "edy", "ey", "y"];

/// Removes the longest matching known suffix from a token.
///
/// Single pass only: `strip(strip(t))` may differ from `strip(t)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixStripper {
    /// Sorted longest first; stable, so equal-length suffixes keep list order.
    suffixes: Vec<String>,
}

impl SuffixStripper {
    /// Build a stripper from a suffix list.
    pub fn new<S: AsRef<str>>(list: &[S]) -> Self {
        let mut suffixes: Vec<String> = Vec::with_capacity(list.len());
        for s in list.iter().map(|s| s.as_ref()) {
            if !suffixes.iter().any(|seen| seen == s) {
                suffixes.push(s.to_string());
            }
        }
        suffixes.sort_by(|a, b| b.len().cmp(&a.len()));
        Self { suffixes }
    }

    /// Stripper over [`DEFAULT_SUFFIXES`].
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SUFFIXES)
    }

    /// Return `token` without its longest matching suffix.
    pub fn strip<'a>(&self, token: &'a str) -> &'a str {
        self.suffixes
            .iter()
            .find_map(|s| token.strip_suffix(s.as_str()))
            .unwrap_or(token)
    }

    /// Suffixes in match order.
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }
}

impl Default for SuffixStripper {
    fn default() -> Self {
        Self::with_defaults()
    }
}
