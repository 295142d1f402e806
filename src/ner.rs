//! Named entity recognition capability.
//!
//! The NER model is an external collaborator. [`SidecarEntityRecognizer`]
//! talks to it over HTTP; [`DisabledEntityRecognizer`] stands in when no
//! model is configured so address detection relies on keywords alone.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A labelled span of text (spaCy label scheme: GPE, LOC, FAC, PERSON, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub text: String,
    pub label: String,
}

impl NamedEntity {
    #[cfg(test)]
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait EntityRecognizer: Send + Sync {
    fn name(&self) -> &str;
    async fn entities(&self, text: &str) -> anyhow::Result<Vec<NamedEntity>>;
}

/// No model available: never returns entities.
pub struct DisabledEntityRecognizer;

#[async_trait::async_trait]
impl EntityRecognizer for DisabledEntityRecognizer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn entities(&self, _text: &str) -> anyhow::Result<Vec<NamedEntity>> {
        Ok(Vec::new())
    }
}

#[derive(Serialize)]
struct EntitiesRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    entities: Vec<NamedEntity>,
}

pub struct SidecarEntityRecognizer {
    url: String,
    client: reqwest::Client,
}

impl SidecarEntityRecognizer {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl EntityRecognizer for SidecarEntityRecognizer {
    fn name(&self) -> &str {
        "ner_sidecar"
    }

    async fn entities(&self, text: &str) -> anyhow::Result<Vec<NamedEntity>> {
        let response = self
            .client
            .post(format!("{}/entities", self.url))
            .json(&EntitiesRequest { text })
            .send()
            .await
            .with_context(|| format!("NER sidecar unreachable at {}", self.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("NER sidecar error ({}): {}", status, error_text);
        }

        let body: EntitiesResponse = response
            .json()
            .await
            .context("Invalid NER sidecar response")?;
        debug!("NER sidecar returned {} entities", body.entities.len());
        Ok(body.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_recognizer_returns_nothing() {
        let entities = DisabledEntityRecognizer
            .entities("221B Baker Street, London")
            .await
            .unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn test_response_parsing() {
        let body: EntitiesResponse = serde_json::from_str(
            r#"{"entities": [{"text": "London", "label": "GPE"}, {"text": "ACME", "label": "ORG"}]}"#,
        )
        .unwrap();
        assert_eq!(body.entities.len(), 2);
        assert_eq!(body.entities[0], NamedEntity::new("London", "GPE"));
    }

    #[test]
    fn test_request_serialization() {
        let json = serde_json::to_value(EntitiesRequest { text: "hello" }).unwrap();
        assert_eq!(json, serde_json::json!({"text": "hello"}));
    }
}
