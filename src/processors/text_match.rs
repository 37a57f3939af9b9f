//! Text similarity rules for anchoring annotations on OCR words.
//!
//! Two rules live here. The KEY rule treats punctuation in the reference text
//! as a sign of exact intent and otherwise tolerates trailing OCR artifacts and
//! small spelling errors. The ETC rule is more lenient: a shared prefix or a
//! run of fuzzy-equal leading words is enough.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::config::AlignConfig;

/// Separators ignored by the ETC rule.
static ETC_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s/\-:,.]+").expect("Invalid ETC separator regex"));

/// Decides whether a reference string and an OCR string denote the same text.
#[derive(Debug, Clone)]
pub struct TextMatcher {
    similarity_threshold: f32,
    case_sensitive: bool,
    etc_prefix_len: usize,
    etc_fuzzy_words: usize,
    etc_min_word_matches: usize,
}

impl Default for TextMatcher {
    fn default() -> Self {
        Self::from_config(&AlignConfig::default())
    }
}

impl TextMatcher {
    /// Builds a matcher from the thresholds of an [`AlignConfig`].
    pub fn from_config(config: &AlignConfig) -> Self {
        Self {
            similarity_threshold: config.text_similarity_threshold,
            case_sensitive: config.case_sensitive_keys,
            etc_prefix_len: config.etc_prefix_len,
            etc_fuzzy_words: config.etc_fuzzy_words,
            etc_min_word_matches: config.etc_min_word_matches,
        }
    }

    fn normalize(&self, text: &str) -> String {
        let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if self.case_sensitive {
            stripped
        } else {
            stripped.to_lowercase()
        }
    }

    /// KEY rule: does `candidate` (an OCR word) match `reference` (one line of
    /// template text)?
    ///
    /// 1. Whitespace is removed from both sides (and case folded unless the
    ///    matcher is case-sensitive); equal strings match.
    /// 2. A reference with any non-alphanumeric character must appear verbatim
    ///    inside the candidate.
    /// 3. Otherwise the candidate is reduced to its alphanumeric characters and
    ///    matches if either string contains the other, or if their Levenshtein
    ///    similarity reaches the configured threshold.
    ///
    /// Empty strings never match.
    pub fn matches(&self, reference: &str, candidate: &str) -> bool {
        let reference = self.normalize(reference);
        let candidate = self.normalize(candidate);
        if reference.is_empty() || candidate.is_empty() {
            return false;
        }
        if reference == candidate {
            return true;
        }

        if reference.chars().any(|c| !c.is_alphanumeric()) {
            return candidate.contains(&reference);
        }

        let alnum: String = candidate.chars().filter(|c| c.is_alphanumeric()).collect();
        if alnum.is_empty() {
            return false;
        }
        if alnum.contains(&reference) || reference.contains(&alnum) {
            return true;
        }

        self.similarity(&reference, &alnum) >= self.similarity_threshold
    }

    /// True when any non-empty line of a (possibly multi-line) reference matches.
    pub fn matches_any_line(&self, reference: &str, candidate: &str) -> bool {
        reference_lines(reference).any(|line| self.matches(line, candidate))
    }

    /// `1 - distance / max_len` over characters; 0.0 when both strings are empty.
    pub fn similarity(&self, a: &str, b: &str) -> f32 {
        let max_len = a.chars().count().max(b.chars().count());
        if max_len == 0 {
            return 0.0;
        }
        1.0 - strsim::levenshtein(a, b) as f32 / max_len as f32
    }

    /// Compares the first characters of two trimmed strings, case-sensitively.
    ///
    /// Empty strings never match.
    pub fn leading_char_matches(&self, a: &str, b: &str) -> bool {
        match (a.trim().chars().next(), b.trim().chars().next()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// ETC rule: prefix match on separator-free text, or fuzzy match of the
    /// leading words.
    pub fn etc_matches(&self, etc_text: &str, candidate: &str) -> bool {
        let etc_compact = ETC_SEPARATORS.replace_all(&etc_text.to_lowercase(), "").into_owned();
        let cand_compact = ETC_SEPARATORS.replace_all(&candidate.to_lowercase(), "").into_owned();
        if !etc_compact.is_empty() && !cand_compact.is_empty() {
            let etc_prefix: String = etc_compact.chars().take(self.etc_prefix_len).collect();
            let cand_prefix: String = cand_compact.chars().take(self.etc_prefix_len).collect();
            if cand_compact.starts_with(&etc_prefix) || etc_compact.starts_with(&cand_prefix) {
                return true;
            }
        }

        let etc_words = split_words(etc_text);
        let cand_words = split_words(candidate);
        if etc_words.is_empty() || cand_words.is_empty() {
            return false;
        }

        let compared = self
            .etc_fuzzy_words
            .min(etc_words.len())
            .min(cand_words.len());
        let mut hits = 0;
        for (etc_word, cand_word) in etc_words.iter().zip(&cand_words).take(compared) {
            let etc_word = etc_word.to_lowercase();
            let cand_word = cand_word.to_lowercase();
            let allowed = if etc_word.chars().count() <= 3 { 1 } else { 2 };
            if etc_word == cand_word || strsim::levenshtein(&etc_word, &cand_word) <= allowed {
                hits += 1;
            } else {
                break;
            }
        }

        let required = if etc_words.len() == 1 {
            1
        } else {
            self.etc_min_word_matches
        };
        hits >= required
    }
}

/// Trimmed, non-empty lines of a template text.
pub fn reference_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(str::trim).filter(|line| !line.is_empty())
}

fn split_words(text: &str) -> Vec<&str> {
    ETC_SEPARATORS
        .split(text.trim())
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_artifacts_match() {
        let matcher = TextMatcher::default();
        assert!(matcher.matches("Class", "Class:8"));
        assert!(matcher.matches("Class", "  class "));
        assert!(matcher.matches("Invoice No", "INVOICENO."));
    }

    #[test]
    fn test_punctuated_reference_requires_containment() {
        let matcher = TextMatcher::default();
        assert!(matcher.matches("No.", "Invoice No. 123"));
        assert!(!matcher.matches("No.", "No 123"));
        assert!(!matcher.matches("Date:", "Dates"));
    }

    #[test]
    fn test_levenshtein_similarity_threshold() {
        let matcher = TextMatcher::default();
        // one edit in five characters: similarity 0.8
        assert!(matcher.matches("Class", "Clas5"));
        // two edits in five characters: similarity 0.6
        assert!(!matcher.matches("Class", "Cxasz"));
        assert!((matcher.similarity("abcde", "abcdx") - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_reflexive_for_non_empty_text() {
        let matcher = TextMatcher::default();
        for s in ["Class", "No.", "B/L NO", "총 중량", "a"] {
            assert!(matcher.matches(s, s), "{s} should match itself");
        }
    }

    #[test]
    fn test_empty_and_punctuation_only_candidates_never_match() {
        let matcher = TextMatcher::default();
        assert!(!matcher.matches("Class", ""));
        assert!(!matcher.matches("Class", "::"));
        assert!(!matcher.matches("", "Class"));
        assert!(!matcher.matches("   ", "Class"));
    }

    #[test]
    fn test_case_sensitive_keys() {
        let config = AlignConfig::default().with_case_sensitive_keys(true);
        let matcher = TextMatcher::from_config(&config);
        assert!(!matcher.matches("No.", "no."));
        assert!(matcher.matches("No.", "No."));
    }

    #[test]
    fn test_leading_char_is_case_sensitive() {
        let matcher = TextMatcher::default();
        assert!(matcher.leading_char_matches("Weight", " Wt."));
        assert!(!matcher.leading_char_matches("Weight", "weight"));
        assert!(!matcher.leading_char_matches("", "W"));
    }

    #[test]
    fn test_multi_line_reference() {
        let matcher = TextMatcher::default();
        assert!(matcher.matches_any_line("Shipper\n  Exporter ", "EXPORTER"));
        assert!(!matcher.matches_any_line("\n \n", "EXPORTER"));
        assert_eq!(reference_lines(" a \n\n b").collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_etc_prefix_ignores_separators() {
        let matcher = TextMatcher::default();
        assert!(matcher.etc_matches("BILL OF LADING", "BILLOF LADING"));
        assert!(matcher.etc_matches("Bill of Lading (original)", "bill-of-lading"));
        assert!(!matcher.etc_matches("BILL OF LADING", "INVOICE"));
    }

    #[test]
    fn test_etc_fuzzy_words() {
        let matcher = TextMatcher::default();
        // prefix differs, first two words are within edit distance
        assert!(matcher.etc_matches("Notify Party Address", "Natify Parti Adress"));
        // first word misses, so the run stops
        assert!(!matcher.etc_matches("Notify Party", "Consignee Party"));
        // single-word ETC needs one hit
        assert!(matcher.etc_matches("Marks", "Marcs"));
    }

    #[test]
    fn test_etc_empty_inputs() {
        let matcher = TextMatcher::default();
        assert!(!matcher.etc_matches("", "anything"));
        assert!(!matcher.etc_matches("Notes", ""));
        assert!(!matcher.etc_matches("Notes", "--"));
        assert!(!matcher.etc_matches(" / ", "Notes"));
    }
}
