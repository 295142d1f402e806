//! OCR sidecar provider.
//!
//! The recognition model runs in a separate process that accepts a PNG upload
//! on `POST /readtext` and answers with `(text, confidence)` pairs.

use super::{OcrFragment, TextRecognizer};
use anyhow::Context;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use std::io::Cursor;
use tracing::debug;

/// Sidecar response (private deserialization type).
#[derive(Debug, Deserialize)]
struct ReadTextResponse {
    #[serde(default)]
    results: Vec<OcrFragment>,
}

pub struct SidecarRecognizer {
    url: String,
    client: reqwest::Client,
}

impl SidecarRecognizer {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/readtext", self.url)
    }
}

/// Encode an image as PNG bytes for upload.
pub fn encode_png(image: &DynamicImage) -> anyhow::Result<Vec<u8>> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("Failed to encode image as PNG")?;
    Ok(png)
}

#[async_trait::async_trait]
impl TextRecognizer for SidecarRecognizer {
    fn name(&self) -> &str {
        "ocr_sidecar"
    }

    async fn read_text(&self, image: &DynamicImage) -> anyhow::Result<Vec<OcrFragment>> {
        use reqwest::multipart::{Form, Part};

        let png = encode_png(image)?;
        debug!(
            "SidecarRecognizer: uploading {}x{} image ({} bytes)",
            image.width(),
            image.height(),
            png.len()
        );

        let part = Part::bytes(png)
            .file_name("card.png")
            .mime_str("image/png")?;
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("OCR sidecar unreachable at {}", self.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OCR sidecar error ({}): {}", status, error_text);
        }

        let body: ReadTextResponse = response
            .json()
            .await
            .context("Invalid OCR sidecar response")?;
        Ok(body.results)
    }
}
