use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::TextDirection;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetKind {
    Ollama,
    OpenAi,
}

impl PresetKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(PresetKind::Ollama),
            "openai" => Some(PresetKind::OpenAi),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PresetKind::Ollama => "ollama",
            PresetKind::OpenAi => "openai",
        }
    }
}

/// One configured chat endpoint.
#[derive(Debug, Clone)]
pub struct Preset {
    pub kind: PresetKind,
    pub api_url: String,
    pub model: String,
    pub bearer_token: Option<String>,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            kind: PresetKind::Ollama,
            api_url: "http://localhost:11434/api/chat".to_string(),
            model: "qwen2.5:14b".to_string(),
            bearer_token: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub source_language: String,
    pub target_language: String,
    pub text_direction: TextDirection,
    pub ocr_api: String,
    pub preset: Preset,
    pub overlay_text_color: String,
    pub overlay_fill_color: String,
    pub overlay_font_family: Option<String>,
    pub overlay_font_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_language: "Japanese".to_string(),
            target_language: "English".to_string(),
            text_direction: TextDirection::Vertical,
            ocr_api: "http://localhost:1224/api/ocr".to_string(),
            preset: Preset::default(),
            overlay_text_color: "#000000".to_string(),
            overlay_fill_color: "#ffffff".to_string(),
            overlay_font_family: None,
            overlay_font_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    translation: Option<TranslationSettings>,
    ocr: Option<OcrSettings>,
    preset: Option<PresetSettings>,
    overlay: Option<OverlaySettings>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    source_language: Option<String>,
    target_language: Option<String>,
    text_direction: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    api: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PresetSettings {
    #[serde(rename = "type")]
    kind: Option<String>,
    api: Option<String>,
    model: Option<String>,
    bearer_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    text_color: Option<String>,
    fill_color: Option<String>,
    font_family: Option<String>,
    font_path: Option<String>,
}

/// Loads settings, merging each file found over the defaults in order:
/// ./settings.toml, ./settings.local.toml, the per-user copies under
/// $HOME/.manga-page-translator/, then an explicit extra path last.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed)?;
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(translation) = incoming.translation {
            if let Some(language) = translation.source_language {
                if !language.trim().is_empty() {
                    self.source_language = language;
                }
            }
            if let Some(language) = translation.target_language {
                if !language.trim().is_empty() {
                    self.target_language = language;
                }
            }
            if let Some(direction) = translation.text_direction {
                self.text_direction = TextDirection::parse(&direction)
                    .ok_or_else(|| anyhow!("unknown text direction: {}", direction))?;
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(api) = ocr.api {
                if !api.trim().is_empty() {
                    self.ocr_api = api;
                }
            }
        }
        if let Some(preset) = incoming.preset {
            if let Some(kind) = preset.kind {
                self.preset.kind = PresetKind::parse(&kind)
                    .ok_or_else(|| anyhow!("unknown preset type: {}", kind))?;
            }
            if let Some(api) = preset.api {
                if !api.trim().is_empty() {
                    self.preset.api_url = api;
                }
            }
            if let Some(model) = preset.model {
                if !model.trim().is_empty() {
                    self.preset.model = model;
                }
            }
            if let Some(token) = preset.bearer_token {
                if !token.trim().is_empty() {
                    self.preset.bearer_token = Some(token);
                }
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(color) = overlay.text_color {
                if !color.trim().is_empty() {
                    self.overlay_text_color = color;
                }
            }
            if let Some(color) = overlay.fill_color {
                if !color.trim().is_empty() {
                    self.overlay_fill_color = color;
                }
            }
            if let Some(family) = overlay.font_family {
                if !family.trim().is_empty() {
                    self.overlay_font_family = Some(family);
                }
            }
            if let Some(path) = overlay.font_path {
                if !path.trim().is_empty() {
                    self.overlay_font_path = Some(path);
                }
            }
        }
        Ok(())
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".manga-page-translator"))
        }
    })
}
