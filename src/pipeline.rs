//! Per-image processing: decode, preprocess, OCR, extract, persist.
//!
//! [`Pipeline::process`] never fails: every problem with a single image is
//! folded into an [`ImageOutcome::Failed`] so the rest of a batch carries on.

use image::DynamicImage;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::extractor::FieldExtractor;
use crate::ner::EntityRecognizer;
use crate::ocr::{recognize_with_retry, OcrError, OcrPolicy, TextRecognizer};
use crate::preprocess::preprocess_image;
use crate::schema::{ContactRecord, ImageOutcome};
use crate::spreadsheet::SpreadsheetStore;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error("entity recognition failed: {0}")]
    Entities(anyhow::Error),
    #[error("image task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Shared, read-only processing stack.
pub struct Pipeline {
    recognizer: Arc<dyn TextRecognizer>,
    entities: Arc<dyn EntityRecognizer>,
    extractor: FieldExtractor,
    store: SpreadsheetStore,
    policy: OcrPolicy,
}

impl Pipeline {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        entities: Arc<dyn EntityRecognizer>,
        extractor: FieldExtractor,
        store: SpreadsheetStore,
    ) -> Self {
        Self {
            recognizer,
            entities,
            extractor,
            store,
            policy: OcrPolicy::default(),
        }
    }

    pub fn store(&self) -> &SpreadsheetStore {
        &self.store
    }

    /// Process one uploaded image into its per-image result.
    pub async fn process(&self, filename: &str, bytes: &[u8]) -> ImageOutcome {
        info!("Processing {} ({} bytes)", filename, bytes.len());

        match self.extract(bytes).await {
            Ok((raw_text, data)) => {
                if let Err(e) = self.store.append(&data).await {
                    error!("Failed to save {} to {:?}: {}", filename, self.store.path(), e);
                }
                ImageOutcome::Processed {
                    filename: filename.to_string(),
                    raw_text,
                    data,
                }
            }
            Err(e) => {
                error!("Failed on {}: {}", filename, e);
                ImageOutcome::Failed {
                    filename: filename.to_string(),
                    error: format!("OCR processing failed: {}", e),
                }
            }
        }
    }

    async fn extract(&self, bytes: &[u8]) -> Result<(String, ContactRecord), ProcessError> {
        let (original, preprocessed) = decode_and_preprocess(bytes.to_vec()).await?;

        let ocr = recognize_with_retry(
            self.recognizer.as_ref(),
            &preprocessed,
            &original,
            self.policy,
        )
        .await?;
        debug!(
            "Text from {} ({} chars, retried on original: {})",
            self.recognizer.name(),
            ocr.text.len(),
            ocr.retried
        );

        let entities = self
            .entities
            .entities(&ocr.text)
            .await
            .map_err(ProcessError::Entities)?;
        debug!("{} entities from {}", entities.len(), self.entities.name());

        let data = self.extractor.extract(&ocr.text, &entities);
        Ok((ocr.text.trim().to_string(), data))
    }
}

/// Decode and threshold on the blocking pool. Returns (original, preprocessed).
async fn decode_and_preprocess(
    bytes: Vec<u8>,
) -> Result<(DynamicImage, DynamicImage), ProcessError> {
    let images = tokio::task::spawn_blocking(move || -> Result<_, image::ImageError> {
        let original = image::load_from_memory(&bytes)?.to_rgb8();
        let preprocessed = preprocess_image(&original);
        Ok((
            DynamicImage::ImageRgb8(original),
            DynamicImage::ImageLuma8(preprocessed),
        ))
    })
    .await??;
    Ok(images)
}
