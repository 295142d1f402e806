//! Text recognition abstraction and the confidence-based retry policy.
//!
//! Defines the [`TextRecognizer`] trait so the OCR model can live behind any
//! backend (HTTP sidecar, in-process engine, test double), plus
//! [`recognize_with_retry`], which owns the retry and filtering rules.

pub mod sidecar;

use image::DynamicImage;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// One recognized text region.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OcrFragment {
    pub text: String,
    pub confidence: f32,
}

impl OcrFragment {
    #[cfg(test)]
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &str;
    async fn read_text(&self, image: &DynamicImage) -> anyhow::Result<Vec<OcrFragment>>;
}

/// Confidence thresholds governing the retry and the final filter.
#[derive(Debug, Clone, Copy)]
pub struct OcrPolicy {
    /// Retry on the original image when every fragment is below this.
    pub retry_below: f32,
    /// Fragments must be strictly above this to be kept.
    pub keep_above: f32,
}

impl Default for OcrPolicy {
    fn default() -> Self {
        Self {
            retry_below: 0.5,
            keep_above: 0.4,
        }
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("text recognition failed: {0}")]
    Recognizer(#[from] anyhow::Error),
    #[error("OCR returned no confident text.")]
    NoConfidentText,
}

/// Confident text recovered from one image.
#[derive(Debug, Clone)]
pub struct OcrOutcome {
    /// Kept fragments joined with newlines.
    pub text: String,
    /// Whether the original image had to be re-read.
    pub retried: bool,
}

/// Read text from the preprocessed image, falling back once to the original.
pub async fn recognize_with_retry(
    recognizer: &dyn TextRecognizer,
    preprocessed: &DynamicImage,
    original: &DynamicImage,
    policy: OcrPolicy,
) -> Result<OcrOutcome, OcrError> {
    let mut fragments = recognizer.read_text(preprocessed).await?;
    let mut retried = false;

    if needs_retry(&fragments, policy) {
        warn!(
            "Low-confidence OCR from {} ({} fragments), retrying with original image",
            recognizer.name(),
            fragments.len()
        );
        fragments = recognizer.read_text(original).await?;
        retried = true;
    }

    let text = join_confident(&fragments, policy);
    if text.trim().is_empty() {
        return Err(OcrError::NoConfidentText);
    }

    debug!(
        "OCR kept {} chars from {} fragments (retried: {})",
        text.len(),
        fragments.len(),
        retried
    );
    Ok(OcrOutcome { text, retried })
}

fn needs_retry(fragments: &[OcrFragment], policy: OcrPolicy) -> bool {
    fragments.iter().all(|f| f.confidence < policy.retry_below)
}

fn join_confident(fragments: &[OcrFragment], policy: OcrPolicy) -> String {
    fragments
        .iter()
        .filter(|f| f.confidence > policy.keep_above)
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Recognizer returning one canned answer for grayscale input and
    /// another for colour input, counting calls.
    pub struct ScriptedRecognizer {
        pub on_preprocessed: Vec<OcrFragment>,
        pub on_original: Vec<OcrFragment>,
        pub calls: AtomicUsize,
    }

    impl ScriptedRecognizer {
        pub fn new(on_preprocessed: Vec<OcrFragment>, on_original: Vec<OcrFragment>) -> Self {
            Self {
                on_preprocessed,
                on_original,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TextRecognizer for ScriptedRecognizer {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn read_text(&self, image: &DynamicImage) -> anyhow::Result<Vec<OcrFragment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match image {
                DynamicImage::ImageLuma8(_) => Ok(self.on_preprocessed.clone()),
                _ => Ok(self.on_original.clone()),
            }
        }
    }
}
