use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

/// Glyph used to size vertical character cells. Full-width kana is as wide
/// as any CJK glyph in practice.
pub const REFERENCE_GLYPH: char = 'あ';

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn advance_units(&self, ch: char) -> u16 {
        if ch == ' ' {
            return self.space_advance;
        }
        Face::parse(&self.data, self.face_index)
            .ok()
            .and_then(|face| {
                let glyph = face.glyph_index(ch)?;
                face.glyph_hor_advance(glyph)
            })
            .unwrap_or(self.space_advance)
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    font_metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

pub struct ResolvedFont {
    pub metrics: FontMetrics,
    pub family: String,
}

/// Picks the overlay font: explicit path first, then a named system family,
/// then the fallback list.
pub fn resolve_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[&str],
) -> Result<ResolvedFont> {
    if let Some(path) = font_path {
        let metrics = load_font_metrics(path)?;
        let family = metrics
            .family()
            .map(str::to_string)
            .or_else(|| font_family.map(str::to_string))
            .unwrap_or_else(|| "sans-serif".to_string());
        return Ok(ResolvedFont { metrics, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = font_family {
        return font_from_family(&db, family);
    }

    for candidate in fallback {
        if let Ok(resolved) = font_from_family(&db, candidate) {
            return Ok(resolved);
        }
    }

    Err(anyhow!("no fallback fonts found"))
}

/// Width of one character at the given size. Falls back to heuristic unit
/// widths when no font is loaded.
pub fn char_width_px(ch: char, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    match font {
        Some(font) => {
            let units = font.units_per_em.max(1) as f32;
            font.advance_units(ch) as f32 * (font_size / units)
        }
        None => estimate_char_units(ch) * font_size,
    }
}

pub fn text_width_px(text: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    text.chars()
        .filter(|ch| *ch != '\n')
        .map(|ch| char_width_px(ch, font_size, font))
        .sum()
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.9
    }
}

fn font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            let family = extract_family_name(&face);
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            let metrics = FontMetrics {
                data: Arc::new(data.to_vec()),
                units_per_em,
                space_advance,
                family: family.clone(),
                face_index: index,
            };
            if let (Some(preferred), Some(found)) = (preferred_family, &family) {
                if found.eq_ignore_ascii_case(preferred) {
                    return Ok(metrics);
                }
            }
            if fallback.is_none() {
                fallback = Some(metrics);
            }
        }
    }
    if preferred_family.is_some() {
        return Err(anyhow!("font family not found in font file"));
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn font_from_family(db: &fontdb::Database, family: &str) -> Result<ResolvedFont> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let (data, _face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let metrics = font_metrics_from_data(&data, Some(family))?;
    let resolved_family = metrics
        .family()
        .map(str::to_string)
        .unwrap_or_else(|| family.to_string());
    Ok(ResolvedFont {
        metrics,
        family: resolved_family,
    })
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_widths_rank_cjk_widest() {
        let cjk = char_width_px('漢', 10.0, None);
        let latin = char_width_px('a', 10.0, None);
        let space = char_width_px(' ', 10.0, None);
        assert!(cjk > latin);
        assert!(latin > space);
        assert_eq!(cjk, 10.0);
    }

    #[test]
    fn text_width_skips_newlines() {
        let with_break = text_width_px("ab\ncd", 10.0, None);
        let without = text_width_px("abcd", 10.0, None);
        assert_eq!(with_break, without);
    }
}
