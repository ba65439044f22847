use super::font::{FontMetrics, REFERENCE_GLYPH, char_width_px};
use crate::ocr::TextDirection;
use crate::ocr::geometry::RectF;

pub const MAX_FONT_SIZE: f32 = 72.0;
pub const MIN_FONT_SIZE: f32 = 12.0;
/// Vertical advance between horizontal lines, as a multiple of font size.
pub const LINE_FACTOR: f32 = 1.1;
/// Vertical advance between characters within a column, as a multiple of
/// the cell width.
pub const COLUMN_CHAR_FACTOR: f32 = 1.2;
/// Horizontal advance between columns, as a multiple of the cell width.
pub const COLUMN_STEP_FACTOR: f32 = 1.5;

/// A block of text laid out inside its bounding box, ready to be emitted
/// as SVG text elements.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockLayout {
    Horizontal {
        font_size: f32,
        line_height: f32,
        lines: Vec<String>,
    },
    Vertical {
        font_size: f32,
        char_step: f32,
        column_step: f32,
        /// Columns in reading order, rendered right to left.
        columns: Vec<Vec<char>>,
    },
}

/// Finds the largest integer font size, searched downward from the box
/// dimension cap, whose wrapped text fits the box. Below the floor the
/// floor layout is returned even if it overflows.
pub fn layout_block(
    text: &str,
    rect: &RectF,
    direction: TextDirection,
    font: Option<&FontMetrics>,
) -> BlockLayout {
    let start = MAX_FONT_SIZE.min(rect.w.max(rect.h)).max(MIN_FONT_SIZE) as u32;
    let floor = MIN_FONT_SIZE as u32;

    for size in (floor..=start).rev() {
        let font_size = size as f32;
        if let Some(layout) = try_layout(text, rect, direction, font, font_size, false) {
            return layout;
        }
    }
    // Nothing fits. Lay out at the floor size and let the clip path handle
    // the overflow.
    match try_layout(text, rect, direction, font, MIN_FONT_SIZE, true) {
        Some(layout) => layout,
        None => BlockLayout::Horizontal {
            font_size: MIN_FONT_SIZE,
            line_height: MIN_FONT_SIZE * LINE_FACTOR,
            lines: vec![text.to_string()],
        },
    }
}

fn try_layout(
    text: &str,
    rect: &RectF,
    direction: TextDirection,
    font: Option<&FontMetrics>,
    font_size: f32,
    forced: bool,
) -> Option<BlockLayout> {
    match direction {
        TextDirection::Horizontal => {
            let lines = wrap_lines(text, rect.w, font_size, font);
            let line_height = font_size * LINE_FACTOR;
            let fits = lines.len() as f32 * line_height <= rect.h;
            if fits || forced {
                Some(BlockLayout::Horizontal {
                    font_size,
                    line_height,
                    lines,
                })
            } else {
                None
            }
        }
        TextDirection::Vertical => {
            // Both steps derive from the reference glyph cell, so a font
            // whose full-width advance is not 1 em keeps square cells.
            let cell = char_width_px(REFERENCE_GLYPH, font_size, font);
            let char_step = cell * COLUMN_CHAR_FACTOR;
            let column_step = cell * COLUMN_STEP_FACTOR;
            let per_column = (rect.h / char_step).floor() as usize;
            if per_column == 0 && !forced {
                return None;
            }
            let columns = fill_columns(text, per_column.max(1));
            let tallest = columns.iter().map(Vec::len).max().unwrap_or(0);
            let fits = columns.len() as f32 * column_step <= rect.w
                && tallest as f32 * char_step <= rect.h;
            if fits || forced {
                Some(BlockLayout::Vertical {
                    font_size,
                    char_step,
                    column_step,
                    columns,
                })
            } else {
                None
            }
        }
    }
}

/// Greedy word-free wrap: characters are packed into lines until the next
/// one would overflow the box width. Explicit newlines always break.
fn wrap_lines(text: &str, max_width: f32, font_size: f32, font: Option<&FontMetrics>) -> Vec<String> {
    let mut lines = Vec::new();
    for source_line in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0.0;
        for ch in source_line.chars() {
            let advance = char_width_px(ch, font_size, font);
            if !current.is_empty() && current_width + advance > max_width {
                lines.push(std::mem::take(&mut current));
                current_width = 0.0;
            }
            current.push(ch);
            current_width += advance;
        }
        lines.push(current);
    }
    lines
}

fn fill_columns(text: &str, per_column: usize) -> Vec<Vec<char>> {
    let mut columns = Vec::new();
    for source_line in text.split('\n') {
        let mut current = Vec::new();
        for ch in source_line.chars() {
            if current.len() >= per_column {
                columns.push(std::mem::take(&mut current));
            }
            current.push(ch);
        }
        columns.push(current);
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(w: f32, h: f32) -> RectF {
        RectF {
            x: 0.0,
            y: 0.0,
            w,
            h,
        }
    }

    #[test]
    fn horizontal_picks_largest_single_line_size() {
        // Heuristic ASCII width is 0.55 em, so "HELLO" spans 2.75 em. The
        // largest integer size with one line inside 100px is 36.
        let layout = layout_block(
            "HELLO",
            &rect(100.0, 50.0),
            TextDirection::Horizontal,
            None,
        );
        match layout {
            BlockLayout::Horizontal {
                font_size, lines, ..
            } => {
                assert_eq!(font_size, 36.0);
                assert_eq!(lines, vec!["HELLO".to_string()]);
            }
            other => panic!("expected horizontal layout, got {:?}", other),
        }
    }

    #[test]
    fn horizontal_wraps_longer_text_at_smaller_size() {
        let layout = layout_block(
            "HELLO WORLD AGAIN",
            &rect(100.0, 40.0),
            TextDirection::Horizontal,
            None,
        );
        match layout {
            BlockLayout::Horizontal {
                font_size,
                line_height,
                lines,
            } => {
                assert!(font_size >= MIN_FONT_SIZE);
                assert!(lines.len() as f32 * line_height <= 40.0 + 1e-3);
                let rejoined: String = lines.join("");
                assert_eq!(rejoined.replace(' ', ""), "HELLOWORLDAGAIN");
            }
            other => panic!("expected horizontal layout, got {:?}", other),
        }
    }

    #[test]
    fn tiny_box_falls_back_to_floor_size() {
        let layout = layout_block(
            "a very long sentence that cannot possibly fit",
            &rect(10.0, 10.0),
            TextDirection::Horizontal,
            None,
        );
        match layout {
            BlockLayout::Horizontal { font_size, .. } => assert_eq!(font_size, MIN_FONT_SIZE),
            other => panic!("expected horizontal layout, got {:?}", other),
        }
    }

    #[test]
    fn vertical_fills_columns_top_down() {
        // Five CJK chars in a 100x100 box: at size 27 a column holds three
        // chars and the two columns span 81px.
        let layout = layout_block(
            "あいうえお",
            &rect(100.0, 100.0),
            TextDirection::Vertical,
            None,
        );
        match layout {
            BlockLayout::Vertical {
                font_size, columns, ..
            } => {
                assert_eq!(font_size, 27.0);
                assert_eq!(
                    columns,
                    vec![vec!['あ', 'い', 'う'], vec!['え', 'お']]
                );
            }
            other => panic!("expected vertical layout, got {:?}", other),
        }
    }

    #[test]
    fn short_wide_box_rejects_sizes_taller_than_one_cell() {
        // 500x20: any size above 16 has a 1.2x cell taller than the box,
        // so the height condition must reject it no matter how wide the
        // box is.
        let layout = layout_block("あい", &rect(500.0, 20.0), TextDirection::Vertical, None);
        match layout {
            BlockLayout::Vertical {
                font_size,
                char_step,
                columns,
                ..
            } => {
                assert_eq!(font_size, 16.0);
                assert_eq!(columns.len(), 2);
                let tallest = columns.iter().map(Vec::len).max().unwrap() as f32;
                assert!(tallest * char_step <= 20.0);
            }
            other => panic!("expected vertical layout, got {:?}", other),
        }
    }

    #[test]
    fn newline_starts_a_new_column() {
        let layout = layout_block("ab\ncd", &rect(500.0, 500.0), TextDirection::Vertical, None);
        match layout {
            BlockLayout::Vertical { columns, .. } => {
                assert!(columns.len() >= 2);
                let first: String = columns[0].iter().collect();
                assert!(!first.contains('c'));
            }
            other => panic!("expected vertical layout, got {:?}", other),
        }
    }
}
