//! Process configuration and extraction rule tables.
//!
//! [`AppConfig`] is read from the environment (after `.env`), defaulting to
//! `0.0.0.0:8000` and `data.xlsx`. [`ExtractionRules`] holds the keyword
//! tables used by the field extractor; the built-in tables can be overridden
//! by a JSON file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SPREADSHEET_PATH: &str = "data.xlsx";
pub const DEFAULT_OCR_URL: &str = "http://localhost:8001";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// Runtime settings for the server.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub spreadsheet_path: PathBuf,
    pub ocr_url: String,
    /// NER sidecar; address detection falls back to keywords when unset.
    pub ner_url: Option<String>,
    pub rules_path: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("Invalid PORT: {:?}", raw))?,
            None => DEFAULT_PORT,
        };

        let max_upload_mb = match get("MAX_UPLOAD_MB") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid MAX_UPLOAD_MB: {:?}", raw))?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            spreadsheet_path: get("SPREADSHEET_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SPREADSHEET_PATH)),
            ocr_url: get("OCR_URL").unwrap_or_else(|| DEFAULT_OCR_URL.to_string()),
            ner_url: get("NER_URL"),
            rules_path: get("RULES_PATH").map(PathBuf::from),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Extraction rules
// ============================================================================

/// Profession titles. Multi-word entries match as exact token sequences.
pub const PROFESSION_KEYWORDS: &[&str] = &[
    "software engineer",
    "graphic designer",
    "data scientist",
    "founder",
    "ceo",
    "cto",
    "analyst",
    "consultant",
    "developer",
    "manager",
    "architect",
    "accountant",
    "marketing",
    "officer",
    "president",
    "administrator",
    "seo",
    "designer",
    "engineer",
];

/// Substrings marking a line as an address.
pub const ADDRESS_KEYWORDS: &[&str] = &["street", "road", "city", "state", "block", "avenue"];

/// NER labels accepted as an address.
pub const ADDRESS_ENTITY_LABELS: &[&str] = &["GPE", "LOC", "FAC"];

/// Disguised email symbols and their literal replacements.
pub const EMAIL_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("(at)", "@"),
    ("[at]", "@"),
    ("{at}", "@"),
    ("(dot)", "."),
    ("[dot]", "."),
    ("{dot}", "."),
];

/// A literal text replacement applied before email matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub from: String,
    pub to: String,
}

/// Keyword and pattern tables driving the field extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRules {
    #[serde(default = "default_profession_keywords")]
    pub profession_keywords: Vec<String>,
    #[serde(default = "default_address_keywords")]
    pub address_keywords: Vec<String>,
    #[serde(default = "default_address_entity_labels")]
    pub address_entity_labels: Vec<String>,
    #[serde(default = "default_email_substitutions")]
    pub email_substitutions: Vec<Substitution>,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_profession_keywords() -> Vec<String> {
    to_strings(PROFESSION_KEYWORDS)
}

fn default_address_keywords() -> Vec<String> {
    to_strings(ADDRESS_KEYWORDS)
}

fn default_address_entity_labels() -> Vec<String> {
    to_strings(ADDRESS_ENTITY_LABELS)
}

fn default_email_substitutions() -> Vec<Substitution> {
    EMAIL_SUBSTITUTIONS
        .iter()
        .map(|(from, to)| Substitution {
            from: from.to_string(),
            to: to.to_string(),
        })
        .collect()
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            profession_keywords: default_profession_keywords(),
            address_keywords: default_address_keywords(),
            address_entity_labels: default_address_entity_labels(),
            email_substitutions: default_email_substitutions(),
        }
    }
}

impl ExtractionRules {
    /// Load rules from a JSON file. Missing keys keep the built-in tables.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules: {:?}", path))?;
        let rules: ExtractionRules = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse rules: {:?}", path))?;
        info!(
            "Loaded extraction rules from {:?} ({} profession keywords, {} address keywords)",
            path,
            rules.profession_keywords.len(),
            rules.address_keywords.len()
        );
        Ok(rules)
    }

    /// Rules from `path` when given, built-in tables otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.spreadsheet_path, PathBuf::from("data.xlsx"));
        assert_eq!(config.ocr_url, DEFAULT_OCR_URL);
        assert!(config.ner_url.is_none());
        assert!(config.rules_path.is_none());
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9100"),
            ("SPREADSHEET_PATH", "/tmp/cards.xlsx"),
            ("NER_URL", "http://ner:9000"),
            ("MAX_UPLOAD_MB", "5"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:9100");
        assert_eq!(config.spreadsheet_path, PathBuf::from("/tmp/cards.xlsx"));
        assert_eq!(config.ner_url.as_deref(), Some("http://ner:9000"));
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("NER_URL", "  "), ("PORT", "")])).unwrap();
        assert!(config.ner_url.is_none());
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_invalid_port_is_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("Invalid PORT"));
    }

    #[test]
    fn test_default_rules_tables() {
        let rules = ExtractionRules::default();
        assert_eq!(rules.profession_keywords.len(), 19);
        assert_eq!(rules.address_keywords.len(), 6);
        assert_eq!(rules.address_entity_labels, vec!["GPE", "LOC", "FAC"]);
        assert_eq!(rules.email_substitutions.len(), 6);
    }

    #[test]
    fn test_partial_rules_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"profession_keywords": ["plumber", "chief wizard"]}}"#).unwrap();

        let rules = ExtractionRules::load(Some(file.path())).unwrap();
        assert_eq!(rules.profession_keywords, vec!["plumber", "chief wizard"]);
        assert_eq!(rules.address_keywords.len(), 6);
    }

    #[test]
    fn test_missing_rules_file_is_error() {
        let err = ExtractionRules::load(Some(Path::new("/nonexistent/rules.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read rules"));
    }
}
