use anyhow::{Result, anyhow};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backends::build_backend;
use crate::ocr::merge::merge_detections;
use crate::ocr::{OcrClient, TextDirection, normalize_records, preprocess_image};
use crate::render::{OverlayBlock, OverlayStyle, render_page};
use crate::render::font::resolve_font;
use crate::settings::Settings;
use crate::translate::Translator;
use crate::translate::context::ContextStore;
use std::sync::Arc;

/// Fallback families tried when no overlay font is configured.
const FALLBACK_FONT_FAMILIES: &[&str] = &[
    "Noto Sans CJK JP",
    "Noto Sans CJK SC",
    "sans-serif",
];

/// Progress notifications, emitted in block-processing order.
#[derive(Debug, Clone)]
pub enum PageEvent {
    BlocksDetected {
        count: usize,
    },
    BlockTranslated {
        index: usize,
        source: String,
        translated: String,
    },
    PageDone {
        image: Vec<u8>,
    },
    Failed {
        message: String,
    },
}

/// Runs one image through OCR, clustering, translation and re-rendering.
pub struct Pipeline {
    ocr: OcrClient,
    translator: Translator,
    source_language: String,
    direction: TextDirection,
    style: OverlayStyle,
}

impl Pipeline {
    pub fn new(
        ocr: OcrClient,
        translator: Translator,
        source_language: impl Into<String>,
        direction: TextDirection,
        style: OverlayStyle,
    ) -> Self {
        Self {
            ocr,
            translator,
            source_language: source_language.into(),
            direction,
            style,
        }
    }

    pub fn from_settings(settings: &Settings, context: ContextStore) -> Self {
        let backend = Arc::new(build_backend(&settings.preset));
        let translator = Translator::new(
            backend,
            context,
            settings.source_language.clone(),
            settings.target_language.clone(),
        );

        let mut style = OverlayStyle {
            fill_color: settings.overlay_fill_color.clone(),
            text_color: settings.overlay_text_color.clone(),
            font_family: settings.overlay_font_family.clone(),
            font_metrics: None,
        };
        match resolve_font(
            settings.overlay_font_path.as_deref().map(std::path::Path::new),
            settings.overlay_font_family.as_deref(),
            FALLBACK_FONT_FAMILIES,
        ) {
            Ok(resolved) => {
                if style.font_family.is_none() {
                    style.font_family = Some(resolved.family.clone());
                }
                style.font_metrics = Some(resolved.metrics);
            }
            Err(err) => warn!("no overlay font resolved, using heuristic widths: {err:#}"),
        }

        Self::new(
            OcrClient::new(settings.ocr_api.clone()),
            translator,
            settings.source_language.clone(),
            settings.text_direction,
            style,
        )
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Processes one page. OCR failure and an empty detection set are fatal
    /// for the image; translation and rendering problems degrade per block,
    /// leaving that block's pixels untouched.
    pub async fn run(
        &self,
        image_bytes: &[u8],
        events: Option<&mpsc::UnboundedSender<PageEvent>>,
    ) -> Result<Vec<u8>> {
        let result = self.run_inner(image_bytes, events).await;
        if let Err(err) = &result {
            emit(
                events,
                PageEvent::Failed {
                    message: format!("{err:#}"),
                },
            );
        }
        result
    }

    async fn run_inner(
        &self,
        image_bytes: &[u8],
        events: Option<&mpsc::UnboundedSender<PageEvent>>,
    ) -> Result<Vec<u8>> {
        let page = preprocess_image(image_bytes)?;
        let records = self.ocr.recognize(&page, &self.source_language).await?;
        let detections = normalize_records(&records);
        if detections.is_empty() {
            return Err(anyhow!("no text detected on page"));
        }
        let blocks = merge_detections(&detections, self.direction);
        info!(
            blocks = blocks.len(),
            detections = detections.len(),
            "page segmented"
        );
        emit(
            events,
            PageEvent::BlocksDetected {
                count: blocks.len(),
            },
        );

        let mut current = page;
        let mut page_context = String::new();
        for (index, block) in blocks.into_iter().enumerate() {
            let translated = self.translator.translate(&block.text, &page_context).await;
            page_context.push_str(&page_context_line(&block.text, &translated));
            emit(
                events,
                PageEvent::BlockTranslated {
                    index,
                    source: block.text.clone(),
                    translated: translated.clone(),
                },
            );

            let overlay = OverlayBlock {
                region: block,
                text: translated,
            };
            match render_page(&current, &[overlay], self.direction, &self.style) {
                Ok(rendered) => current = rendered,
                Err(err) => {
                    warn!(index, "failed to render block, leaving it as-is: {err:#}");
                }
            }
        }

        emit(
            events,
            PageEvent::PageDone {
                image: current.clone(),
            },
        );
        Ok(current)
    }
}

fn emit(events: Option<&mpsc::UnboundedSender<PageEvent>>, event: PageEvent) {
    if let Some(sender) = events {
        if sender.send(event).is_err() {
            debug!("page event receiver dropped");
        }
    }
}

/// One line of the per-page running context handed to later blocks.
/// Untranslated blocks still appear so the model sees the full page.
fn page_context_line(source: &str, translated: &str) -> String {
    let translated = translated.trim();
    if translated.is_empty() || translated == source {
        format!("{}\n", source)
    } else {
        format!("{} -> {}\n", source, translated)
    }
}
