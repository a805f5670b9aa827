use anyhow::{Context, Result};
use regex::Regex;

/// Amounts with the OCR-typical O/0 confusion in the kopeck group, like
/// "100 00О,00".
const AMOUNT_PATTERN: &str = r"^\d{1,3}(?: \d{2}[ОоOo],\d{2})$";
/// Plain numbers, allowing digit groups separated by spaces, a decimal
/// part, and leading or trailing O/0 confusions.
const NUMBER_PATTERN: &str =
    r"^[-+]?(?:\d[\d\s]*(?:[.,]\d+)?|[ОоOo][\d\s]*(?:[.,]\d+)?)(?:[ОоOo])?$";
/// Numeric dates such as 12/05/2023 or 1.3.24.
const DATE_PATTERN: &str = r"^\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4}\s*$";

/// Decides which detected texts are never sent to translation: configured
/// fragments (stamps, form codes, known OCR noise) plus anything that is
/// just a number, an amount, or a date.
pub struct ExclusionRules {
    fragments: Vec<String>,
    patterns: Vec<Regex>,
}

impl ExclusionRules {
    pub fn new(fragments: &[String]) -> Result<Self> {
        let patterns = [AMOUNT_PATTERN, NUMBER_PATTERN, DATE_PATTERN]
            .iter()
            .map(|pattern| {
                Regex::new(&format!("(?i){pattern}"))
                    .with_context(|| format!("invalid exclusion pattern {pattern:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            fragments: fragments
                .iter()
                .map(|fragment| fragment.to_lowercase())
                .filter(|fragment| !fragment.is_empty())
                .collect(),
            patterns,
        })
    }

    /// True when `text` should keep its original form on the page.
    /// Fragment matches are case-insensitive and may occur anywhere in the
    /// text, not just at the start.
    pub fn is_excluded(&self, text: &str) -> bool {
        let trimmed = text.trim();
        let lowered = trimmed.to_lowercase();
        if self
            .fragments
            .iter()
            .any(|fragment| lowered.contains(fragment.as_str()))
        {
            return true;
        }
        self.patterns.iter().any(|pattern| pattern.is_match(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(fragments: &[&str]) -> ExclusionRules {
        let owned: Vec<String> = fragments.iter().map(|s| s.to_string()).collect();
        ExclusionRules::new(&owned).unwrap()
    }

    #[test]
    fn dates_are_excluded() {
        let rules = rules(&[]);
        assert!(rules.is_excluded("12/05/2023"));
        assert!(rules.is_excluded("1.3.24"));
        assert!(rules.is_excluded("31-12-1999 "));
        assert!(!rules.is_excluded("12/05/2023 соглашение"));
    }

    #[test]
    fn plain_numbers_are_excluded() {
        let rules = rules(&[]);
        assert!(rules.is_excluded("100"));
        assert!(rules.is_excluded("+380"));
        assert!(rules.is_excluded("-17,5"));
        assert!(rules.is_excluded("1 234 567.89"));
        assert!(rules.is_excluded(" 42 "));
    }

    #[test]
    fn ocr_confused_amounts_are_excluded() {
        let rules = rules(&[]);
        // Cyrillic О standing in for a zero.
        assert!(rules.is_excluded("100 00О,00"));
        assert!(rules.is_excluded("О 123,45"));
        assert!(rules.is_excluded("12О"));
    }

    #[test]
    fn words_are_not_excluded() {
        let rules = rules(&[]);
        assert!(!rules.is_excluded("Рахунок"));
        assert!(!rules.is_excluded("Hello world"));
        assert!(!rules.is_excluded("No 5 items"));
    }

    #[test]
    fn configured_fragments_match_anywhere_case_insensitively() {
        let rules = rules(&["ЦЕНТР", "БІК"]);
        assert!(rules.is_excluded("центр"));
        assert!(rules.is_excluded("ОБЛЦЕНТРБАНК"));
        assert!(rules.is_excluded("  бік 305299"));
        assert!(!rules.is_excluded("ЦЕН ТР"));
    }

    #[test]
    fn empty_fragments_never_match() {
        let rules = rules(&[""]);
        assert!(!rules.is_excluded("будь-який текст"));
    }
}
