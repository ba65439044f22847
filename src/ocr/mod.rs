pub mod cluster;
pub mod geometry;
pub mod merge;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::imageops::FilterType;
use serde::Deserialize;
use std::io::Cursor;

use geometry::{Detection, RawBox};

/// Reading layout convention. Affects clustering weights, member sort order
/// and text reflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDirection {
    Horizontal,
    Vertical,
}

impl TextDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "horizontal" => Some(TextDirection::Horizontal),
            "vertical" => Some(TextDirection::Vertical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TextDirection::Horizontal => "horizontal",
            TextDirection::Vertical => "vertical",
        }
    }
}

pub const OCR_OK: i32 = 100;

#[derive(Debug, Deserialize)]
pub struct OcrResponse {
    pub code: i32,
    #[serde(default)]
    pub data: Vec<OcrRecord>,
}

#[derive(Debug, Deserialize)]
pub struct OcrRecord {
    pub text: String,
    pub score: f32,
    #[serde(rename = "box")]
    pub bounds: RawBox,
}

#[derive(Debug, Clone)]
pub struct OcrClient {
    endpoint: String,
    http: reqwest::Client,
}

impl OcrClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Sends one image to the OCR service. A response code other than
    /// [`OCR_OK`] is a hard failure for that image.
    pub async fn recognize(
        &self,
        image_bytes: &[u8],
        source_language: &str,
    ) -> Result<Vec<OcrRecord>> {
        let body = serde_json::json!({
            "base64": BASE64.encode(image_bytes),
            "options": {
                "ocr.language": language_model_config(source_language),
            }
        });
        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("OCR request to {} failed", self.endpoint))?;
        let payload: OcrResponse = response
            .json()
            .await
            .with_context(|| "failed to decode OCR response")?;
        if payload.code != OCR_OK {
            return Err(anyhow!("OCR failed with code {}", payload.code));
        }
        Ok(payload.data)
    }
}

/// Per-language OCR model configuration files understood by the service.
fn language_model_config(source_language: &str) -> &'static str {
    match source_language {
        "Simplified Chinese" => "models/config_chinese.txt",
        "Traditional Chinese" => "models/config_chinese_cht.txt",
        "English" => "models/config_en.txt",
        "Japanese" => "models/config_japan.txt",
        "Korean" => "models/config_korean.txt",
        other => {
            tracing::warn!("no OCR config for language '{}', using default", other);
            "models/config_chinese.txt"
        }
    }
}

pub const MIN_OCR_DIMENSION: u32 = 800;

/// Upscales small pages before OCR so the detector has enough pixels to
/// work with. Larger images pass through re-encoded as PNG.
pub fn preprocess_image(image_bytes: &[u8]) -> Result<Vec<u8>> {
    let img =
        image::load_from_memory(image_bytes).with_context(|| "failed to decode input image")?;
    let (w, h) = (img.width(), img.height());
    let smallest = w.min(h).max(1);
    let img = if smallest < MIN_OCR_DIMENSION {
        let scale = MIN_OCR_DIMENSION as f32 / smallest as f32;
        img.resize_exact(
            (w as f32 * scale).round() as u32,
            (h as f32 * scale).round() as u32,
            FilterType::Lanczos3,
        )
    } else {
        img
    };
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .with_context(|| "failed to encode preprocessed image")?;
    Ok(bytes)
}

/// Filters and canonicalizes raw OCR records. Bad records are skipped, never
/// fatal to the batch.
pub fn normalize_records(records: &[OcrRecord]) -> Vec<Detection> {
    records
        .iter()
        .filter_map(|record| geometry::normalize(&record.text, record.score, &record.bounds))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_response_accepts_all_box_encodings() {
        let raw = r#"{
            "code": 100,
            "data": [
                {"text": "a", "score": 0.9, "box": [1.0, 2.0, 3.0, 2.0, 3.0, 4.0, 1.0, 4.0]},
                {"text": "b", "score": 0.8, "box": [1.0, 2.0, 10.0, 12.0]},
                {"text": "c", "score": 0.7, "box": [[1.0, 2.0], [3.0, 2.0], [3.0, 4.0], [1.0, 4.0]]},
                {"text": "d", "score": 0.2, "box": [0.0, 0.0, 5.0, 5.0]}
            ]
        }"#;
        let response: OcrResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.code, OCR_OK);
        assert_eq!(response.data.len(), 4);

        let detections = normalize_records(&response.data);
        // the 0.2-score record is dropped
        assert_eq!(detections.len(), 3);
        assert!(detections.iter().all(|d| d.confidence >= 0.5));
    }

    #[test]
    fn random_confidences_below_threshold_are_excluded() {
        let records: Vec<OcrRecord> = (0..100)
            .map(|i| OcrRecord {
                text: format!("t{}", i),
                score: (i as f32) / 100.0,
                bounds: RawBox::Numbers(vec![0.0, 0.0, 10.0, 10.0]),
            })
            .collect();
        let detections = normalize_records(&records);
        assert_eq!(detections.len(), 50);
        assert!(detections.iter().all(|d| d.confidence >= 0.5));
    }

    #[test]
    fn direction_parses_known_values_only() {
        assert_eq!(
            TextDirection::parse("Horizontal"),
            Some(TextDirection::Horizontal)
        );
        assert_eq!(
            TextDirection::parse(" vertical "),
            Some(TextDirection::Vertical)
        );
        assert_eq!(TextDirection::parse("diagonal"), None);
    }
}
