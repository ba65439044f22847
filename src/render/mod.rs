pub mod font;
pub mod layout;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use crate::ocr::TextDirection;
use crate::ocr::geometry::RectF;
use crate::ocr::merge::TextBlock;
use font::FontMetrics;
use layout::{BlockLayout, layout_block};

/// Colors and font used when painting translations over the page.
#[derive(Clone, Default)]
pub struct OverlayStyle {
    pub fill_color: String,
    pub text_color: String,
    pub font_family: Option<String>,
    pub font_metrics: Option<FontMetrics>,
}

/// One region to paint over: the detected block plus its translation.
#[derive(Debug, Clone)]
pub struct OverlayBlock {
    pub region: TextBlock,
    pub text: String,
}

/// Paints every translated block over the page and returns PNG bytes.
/// The original text is hidden by an opaque polygon matching the detected
/// region, then the translation is laid out inside its bounding box.
pub fn render_page(
    image_bytes: &[u8],
    blocks: &[OverlayBlock],
    direction: TextDirection,
    style: &OverlayStyle,
) -> Result<Vec<u8>> {
    let decoded =
        image::load_from_memory(image_bytes).with_context(|| "failed to decode page image")?;
    let (width, height) = (decoded.width(), decoded.height());
    let svg = build_overlay_svg(image_bytes, width, height, blocks, direction, style);
    rasterize(&svg, style.font_metrics.as_ref().map(FontMetrics::data))
}

fn build_overlay_svg(
    image_bytes: &[u8],
    width: u32,
    height: u32,
    blocks: &[OverlayBlock],
    direction: TextDirection,
    style: &OverlayStyle,
) -> String {
    let data_uri = format!("data:image/png;base64,{}", BASE64.encode(image_bytes));

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    for (idx, block) in blocks.iter().enumerate() {
        if block.text.trim().is_empty() {
            continue;
        }
        push_cover_polygon(&mut svg, &block.region.polygon, &style.fill_color);

        let rect = block.region.bounding;
        let clip_id = format!("block-{}", idx);
        svg.push_str(&format!(
            r#"<clipPath id="{id}"><rect x="{x}" y="{y}" width="{w}" height="{h}"/></clipPath>"#,
            id = clip_id,
            x = rect.x,
            y = rect.y,
            w = rect.w,
            h = rect.h
        ));

        let layout = layout_block(&block.text, &rect, direction, style.font_metrics.as_ref());
        match layout {
            BlockLayout::Horizontal {
                font_size,
                line_height,
                lines,
            } => push_horizontal_text(&mut svg, &rect, &clip_id, font_size, line_height, &lines, style),
            BlockLayout::Vertical {
                font_size,
                char_step,
                column_step,
                columns,
            } => push_vertical_text(
                &mut svg, &rect, &clip_id, font_size, char_step, column_step, &columns, style,
            ),
        }
    }

    svg.push_str("</svg>");
    svg
}

fn push_cover_polygon(svg: &mut String, polygon: &[f32], fill: &str) {
    let points = polygon
        .chunks_exact(2)
        .map(|pair| format!("{},{}", pair[0], pair[1]))
        .collect::<Vec<_>>()
        .join(" ");
    svg.push_str(&format!(
        r#"<polygon points="{points}" fill="{fill}"/>"#,
        points = points,
        fill = fill
    ));
}

fn push_horizontal_text(
    svg: &mut String,
    rect: &RectF,
    clip_id: &str,
    font_size: f32,
    line_height: f32,
    lines: &[String],
    style: &OverlayStyle,
) {
    let total_height = lines.len() as f32 * line_height;
    let mut baseline = rect.y + ((rect.h - total_height) / 2.0).max(0.0) + font_size;
    for line in lines {
        let line_width = font::text_width_px(line, font_size, style.font_metrics.as_ref());
        let x = rect.x + ((rect.w - line_width) / 2.0).max(0.0);
        svg.push_str(&text_element(
            x,
            baseline,
            font_size,
            &escape_xml(line),
            clip_id,
            style,
            false,
        ));
        baseline += line_height;
    }
}

#[allow(clippy::too_many_arguments)]
fn push_vertical_text(
    svg: &mut String,
    rect: &RectF,
    clip_id: &str,
    font_size: f32,
    char_step: f32,
    column_step: f32,
    columns: &[Vec<char>],
    style: &OverlayStyle,
) {
    for (col, chars) in columns.iter().enumerate() {
        // Columns run right to left; anchor each glyph at the column center.
        let x = rect.x + rect.w - column_step * (col as f32 + 0.5);
        let mut baseline = rect.y + char_step;
        for ch in chars {
            svg.push_str(&text_element(
                x,
                baseline,
                font_size,
                &escape_xml(&ch.to_string()),
                clip_id,
                style,
                true,
            ));
            baseline += char_step;
        }
    }
}

fn text_element(
    x: f32,
    y: f32,
    font_size: f32,
    escaped_text: &str,
    clip_id: &str,
    style: &OverlayStyle,
    centered: bool,
) -> String {
    let anchor = if centered {
        r#" text-anchor="middle""#
    } else {
        ""
    };
    let family = style
        .font_family
        .as_deref()
        .or_else(|| style.font_metrics.as_ref().and_then(FontMetrics::family));
    match family {
        Some(family) => format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" font-family="{family}"{anchor} clip-path="url(#{clip})">{text}</text>"#,
            x = x,
            y = y,
            size = font_size,
            color = &style.text_color,
            family = escape_xml(family),
            anchor = anchor,
            clip = clip_id,
            text = escaped_text
        ),
        None => format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}"{anchor} clip-path="url(#{clip})">{text}</text>"#,
            x = x,
            y = y,
            size = font_size,
            color = &style.text_color,
            anchor = anchor,
            clip = clip_id,
            text = escaped_text
        ),
    }
}

fn rasterize(svg: &str, font_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse overlay SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .with_context(|| "failed to encode rendered page")?;
    Ok(bytes)
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
