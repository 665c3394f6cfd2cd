use regex::Regex;

/// The fixed pattern set masked before any persistence, redacted-log write,
/// or outbound hand-off. Order does not matter — every pattern is applied
/// to every string.
const DEFAULT_PATTERNS: &[&str] = &[
    r"\b\+?\d{8,15}\b",
    r"\b(?:sk|rk|pk|xoxb)-[A-Za-z0-9_-]{12,}\b",
    r"\b(?:OPENROUTER|OPENAI|ANTHROPIC|BRAVE)_[A-Z0-9_]*=?[A-Za-z0-9_-]{8,}\b",
    r"\bya29\.[A-Za-z0-9._-]+\b",
    r"\b1//[A-Za-z0-9._-]+\b",
];

/// Compiles a fixed set of regexes once and masks matches with `[REDACTED]`.
///
/// Applied at exactly three boundaries: before inserting into
/// `messages.text`, before writing to the redacted log, and before handing
/// text to a channel adapter. See SPEC_FULL.md §4.11 and §9.
pub struct Redactor {
    patterns: Vec<Regex>,
}

impl Redactor {
    /// Build a redactor from the default pattern set.
    pub fn new() -> Self {
        Self::with_patterns(DEFAULT_PATTERNS.iter().map(|s| s.to_string()))
    }

    /// Build a redactor from an explicit pattern set (e.g. loaded from config).
    /// Invalid patterns are skipped with a warning rather than failing startup.
    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .filter_map(|p| match Regex::new(p.as_ref()) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = p.as_ref(), error = %e, "invalid redaction pattern, skipped");
                    None
                }
            })
            .collect();
        Self { patterns: compiled }
    }

    /// Mask every match of every pattern in `text` with `[REDACTED]`.
    pub fn mask(&self, text: &str) -> String {
        let mut out = text.to_string();
        for re in &self.patterns {
            out = re.replace_all(&out, "[REDACTED]").into_owned();
        }
        out
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_phone_like_sequences() {
        let r = Redactor::new();
        let masked = r.mask("call me at +14155552671 please");
        assert!(!masked.contains("+14155552671"));
        assert!(masked.contains("[REDACTED]"));
    }

    #[test]
    fn masks_provider_api_keys() {
        let r = Redactor::new();
        let masked = r.mask("key is sk-abcdefghijklmnop");
        assert!(!masked.contains("sk-abcdefghijklmnop"));
    }

    #[test]
    fn leaves_unrelated_text_untouched() {
        let r = Redactor::new();
        assert_eq!(r.mask("hello world"), "hello world");
    }
}
