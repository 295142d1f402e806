//! Contact field extraction from raw OCR text.
//!
//! Pure functions, no async: given the recognized text and any named
//! entities, pulls out name, email, phone, address and profession using the
//! tables in [`ExtractionRules`]. Every field is optional; a miss is `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::{ExtractionRules, Substitution};
use crate::name::HumanName;
use crate::ner::NamedEntity;
use crate::schema::ContactRecord;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.\-]+@[\w.\-]+\.\w+").expect("email pattern compiles"));

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\+?\d{1,3}[ \t\-]?)?(\(?\d{2,4}\)?[ \t\-]?)?[\d \t\-]{7,}")
        .expect("phone pattern compiles")
});

/// Fewest digits a phone match must carry.
const MIN_PHONE_DIGITS: usize = 7;

/// Field extractor with pre-compiled profession patterns.
pub struct FieldExtractor {
    rules: ExtractionRules,
    professions: ProfessionMatcher,
}

impl FieldExtractor {
    pub fn new(rules: ExtractionRules) -> Self {
        let professions = ProfessionMatcher::compile(&rules.profession_keywords);
        debug!(
            "Compiled {} profession patterns",
            professions.patterns.len()
        );
        Self { rules, professions }
    }

    /// Extract every field from an OCR text blob.
    pub fn extract(&self, text: &str, entities: &[NamedEntity]) -> ContactRecord {
        let lines: Vec<&str> = text.split('\n').collect();
        ContactRecord {
            name: extract_name(&lines),
            email: self.extract_email(text),
            phone: extract_phone(text),
            address: self.extract_address(entities, &lines),
            profession: self.extract_profession(&lines),
        }
    }

    /// First email address after undoing common obfuscation.
    pub fn extract_email(&self, text: &str) -> Option<String> {
        let cleaned = normalize_email_text(text, &self.rules.email_substitutions);
        EMAIL_RE.find(&cleaned).map(|m| m.as_str().to_string())
    }

    /// First address-like entity, else the first line with an address keyword.
    pub fn extract_address(&self, entities: &[NamedEntity], lines: &[&str]) -> Option<String> {
        let from_entities = entities.iter().find(|e| {
            self.rules
                .address_entity_labels
                .iter()
                .any(|label| label.eq_ignore_ascii_case(&e.label))
        });
        if let Some(entity) = from_entities {
            return Some(entity.text.clone());
        }

        lines
            .iter()
            .find(|line| contains_any_keyword(line, &self.rules.address_keywords))
            .map(|line| line.trim().to_string())
    }

    /// Profession title by token pattern, else the first line mentioning a keyword.
    pub fn extract_profession(&self, lines: &[&str]) -> Option<String> {
        if let Some(title) = self.professions.find(lines) {
            return Some(title);
        }
        lines
            .iter()
            .find(|line| contains_any_keyword(line, &self.rules.profession_keywords))
            .map(|line| line.trim().to_string())
    }
}

/// First line that parses as a complete human name, formatted canonically.
pub fn extract_name(lines: &[&str]) -> Option<String> {
    find_name(lines).map(|n| n.to_string())
}

pub fn find_name(lines: &[&str]) -> Option<HumanName> {
    lines
        .iter()
        .map(|line| HumanName::parse(line))
        .find(HumanName::is_complete)
}

/// First phone-like run with at least seven digits.
pub fn extract_phone(text: &str) -> Option<String> {
    PHONE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .find(|candidate| {
            candidate.chars().filter(|c| c.is_numeric()).count() >= MIN_PHONE_DIGITS
        })
        .map(str::to_string)
}

/// Drop spaces and replace disguised symbols such as `(at)` and `[dot]`.
pub fn normalize_email_text(text: &str, substitutions: &[Substitution]) -> String {
    let mut cleaned = text.replace(' ', "");
    for sub in substitutions {
        cleaned = replace_ignore_ascii_case(&cleaned, &sub.from, &sub.to);
    }
    cleaned
}

fn replace_ignore_ascii_case(haystack: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return haystack.to_string();
    }
    let lower = haystack.to_ascii_lowercase();
    let needle = from.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (idx, _) in lower.match_indices(&needle) {
        out.push_str(&haystack[last..idx]);
        out.push_str(to);
        last = idx + needle.len();
    }
    out.push_str(&haystack[last..]);
    out
}

fn contains_any_keyword(line: &str, keywords: &[String]) -> bool {
    let lower = line.to_lowercase();
    keywords.iter().any(|kw| lower.contains(&kw.to_lowercase()))
}

// ============================================================================
// Profession token matcher
// ============================================================================

/// Exact lowercase token-sequence matcher over a keyword list.
pub struct ProfessionMatcher {
    patterns: Vec<Vec<String>>,
}

impl ProfessionMatcher {
    /// Split each keyword into lowercase tokens. Empty keywords are skipped.
    pub fn compile(keywords: &[String]) -> Self {
        let patterns = keywords
            .iter()
            .map(|kw| {
                tokenize(kw)
                    .into_iter()
                    .map(|(s, e)| kw[s..e].to_lowercase())
                    .collect::<Vec<_>>()
            })
            .filter(|tokens| !tokens.is_empty())
            .collect();
        Self { patterns }
    }

    /// First match in reading order; the longest pattern wins at a position.
    /// Returns the matched span with its original casing.
    pub fn find(&self, lines: &[&str]) -> Option<String> {
        for line in lines {
            let spans = tokenize(line);
            let lowered: Vec<String> = spans
                .iter()
                .map(|&(s, e)| line[s..e].to_lowercase())
                .collect();

            for start in 0..spans.len() {
                let best = self
                    .patterns
                    .iter()
                    .filter(|p| {
                        lowered.len() - start >= p.len()
                            && p.iter().zip(&lowered[start..]).all(|(a, b)| a == b)
                    })
                    .map(Vec::len)
                    .max();

                if let Some(len) = best {
                    let from = spans[start].0;
                    let to = spans[start + len - 1].1;
                    return Some(line[from..to].to_string());
                }
            }
        }
        None
    }
}

/// Byte spans of alphanumeric runs.
fn tokenize(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, c) in text.char_indices() {
        match (c.is_alphanumeric(), start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                spans.push((s, idx));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(ExtractionRules::default())
    }

    #[test]
    fn test_name_from_own_line() {
        let name = find_name(&["ACME", "John Smith", "Engineer"]).unwrap();
        assert_eq!(name.first, "John");
        assert_eq!(name.last, "Smith");
        assert_eq!(extract_name(&["John Smith"]).as_deref(), Some("John Smith"));
    }

    #[test]
    fn test_name_skips_contact_lines() {
        let lines = ["+1 555 123 4567", "jane@acme.io", "Jane Doe"];
        assert_eq!(extract_name(&lines).as_deref(), Some("Jane Doe"));
        assert_eq!(extract_name(&["ACME", "555-1234"]), None);
    }

    #[test]
    fn test_email_obfuscated() {
        let ex = extractor();
        assert_eq!(
            ex.extract_email("Contact: john.doe(at)example(dot)com").as_deref(),
            Some("john.doe@example.com")
        );
        assert_eq!(
            ex.extract_email("jane [at] acme {dot} io").as_deref(),
            Some("jane@acme.io")
        );
        assert_eq!(
            ex.extract_email("SALES(AT)ACME(DOT)COM").as_deref(),
            Some("SALES@ACME.COM")
        );
    }

    #[test]
    fn test_email_plain_and_missing() {
        let ex = extractor();
        assert_eq!(
            ex.extract_email("John Smith\nj.smith-1@mail.example.org\n").as_deref(),
            Some("j.smith-1@mail.example.org")
        );
        assert_eq!(ex.extract_email("no address here"), None);
    }

    #[test]
    fn test_email_normalization_is_idempotent() {
        let subs = ExtractionRules::default().email_substitutions;
        for input in [
            "john.doe@example.com",
            "john.doe(at)example(dot)com",
            "a b [at] c {dot} d\nline two",
        ] {
            let once = normalize_email_text(input, &subs);
            let twice = normalize_email_text(&once, &subs);
            assert_eq!(once, twice, "input: {input}");
        }
    }

    #[test]
    fn test_phone_variants() {
        assert_eq!(
            extract_phone("Tel: +1 (555) 123-4567").as_deref(),
            Some("+1 (555) 123-4567")
        );
        assert_eq!(
            extract_phone("Mobile 0300 1234567\n").as_deref(),
            Some("0300 1234567")
        );
        assert_eq!(extract_phone("Suite 12, est. 1999"), None);
    }

    #[test]
    fn test_phone_with_non_ascii_digits() {
        assert_eq!(
            extract_phone("هاتف ٠٣٠٠ ١٢٣٤٥٦٧").as_deref(),
            Some("٠٣٠٠ ١٢٣٤٥٦٧")
        );
        assert_eq!(extract_phone("Tel ०१२३-४५६७८").as_deref(), Some("०१२३-४५६७८"));
    }

    #[test]
    fn test_phone_does_not_cross_lines() {
        let phone = extract_phone("555-1234\n2024 99").unwrap();
        assert_eq!(phone, "555-1234");
    }

    #[test]
    fn test_address_prefers_entities() {
        let ex = extractor();
        let entities = vec![
            NamedEntity::new("ACME", "ORG"),
            NamedEntity::new("Springfield", "GPE"),
        ];
        let lines = ["12 Main Street"];
        assert_eq!(
            ex.extract_address(&entities, &lines).as_deref(),
            Some("Springfield")
        );
    }

    #[test]
    fn test_address_keyword_fallback() {
        let ex = extractor();
        let lines = ["John Smith", "  42 Baker STREET, Block 7  ", "London"];
        assert_eq!(
            ex.extract_address(&[], &lines).as_deref(),
            Some("42 Baker STREET, Block 7")
        );
        assert_eq!(ex.extract_address(&[], &["John Smith"]), None);
    }

    #[test]
    fn test_profession_pattern_match() {
        let ex = extractor();
        let title = ex
            .extract_profession(&["John Smith", "Senior Software Engineer"])
            .unwrap();
        assert!(title.to_lowercase().contains("software engineer"));
        assert_eq!(title, "Software Engineer");
    }

    #[test]
    fn test_profession_single_token() {
        let ex = extractor();
        assert_eq!(
            ex.extract_profession(&["Co-Founder & CEO"]).as_deref(),
            Some("Founder")
        );
    }

    #[test]
    fn test_profession_substring_fallback() {
        let ex = extractor();
        assert_eq!(
            ex.extract_profession(&["ACME", "  Head of Engineering  "]).as_deref(),
            Some("Head of Engineering")
        );
        assert_eq!(ex.extract_profession(&["ACME", "Baker"]), None);
    }

    #[test]
    fn test_custom_profession_keywords() {
        let rules = ExtractionRules {
            profession_keywords: vec!["chief wizard".to_string()],
            ..Default::default()
        };
        let ex = FieldExtractor::new(rules);
        assert_eq!(
            ex.extract_profession(&["Grand Chief Wizard"]).as_deref(),
            Some("Chief Wizard")
        );
        assert_eq!(ex.extract_profession(&["Software Engineer"]), None);
    }

    #[test]
    fn test_extract_full_card() {
        let ex = extractor();
        let text = "John Smith\nSenior Software Engineer\njohn.smith(at)acme(dot)com\n+44 20 7946 0958\n221B Baker Street";
        let record = ex.extract(text, &[]);
        assert_eq!(record.name.as_deref(), Some("John Smith"));
        assert_eq!(record.email.as_deref(), Some("john.smith@acme.com"));
        assert_eq!(record.phone.as_deref(), Some("+44 20 7946 0958"));
        assert_eq!(record.address.as_deref(), Some("221B Baker Street"));
        assert_eq!(record.profession.as_deref(), Some("Software Engineer"));
    }

    #[test]
    fn test_extract_nothing() {
        let record = extractor().extract("???", &[]);
        assert_eq!(record, ContactRecord::default());
    }

    #[test]
    fn test_tokenize_spans() {
        let text = "Co-Founder & CEO";
        let tokens: Vec<&str> = tokenize(text).into_iter().map(|(s, e)| &text[s..e]).collect();
        assert_eq!(tokens, vec!["Co", "Founder", "CEO"]);
    }
}
