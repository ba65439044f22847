use serde::Deserialize;
use tracing::warn;

pub const MIN_CONFIDENCE: f32 = 0.5;

/// Raw `box` payload as it arrives from the OCR service. The three layouts
/// are disambiguated after decode, not by serde guesswork.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawBox {
    Points(Vec<[f32; 2]>),
    Numbers(Vec<f32>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoxShape {
    Flat8([f32; 8]),
    RectXywh { x: f32, y: f32, w: f32, h: f32 },
    PointList4([[f32; 2]; 4]),
}

impl BoxShape {
    pub fn classify(raw: &RawBox) -> Option<Self> {
        match raw {
            RawBox::Numbers(values) if values.len() == 8 => {
                let mut corners = [0.0; 8];
                corners.copy_from_slice(values);
                Some(BoxShape::Flat8(corners))
            }
            RawBox::Numbers(values) if values.len() == 4 => Some(BoxShape::RectXywh {
                x: values[0],
                y: values[1],
                w: values[2],
                h: values[3],
            }),
            RawBox::Points(points) if points.len() == 4 => {
                let mut corners = [[0.0; 2]; 4];
                corners.copy_from_slice(points);
                Some(BoxShape::PointList4(corners))
            }
            _ => None,
        }
    }
}

/// One usable OCR hit: text plus a canonical 8-number polygon and its
/// centroid. The centroid is the arithmetic mean of the four corner
/// coordinates, not the true polygon centroid; the clustering weights were
/// tuned against that value, so it is kept as-is.
#[derive(Debug, Clone)]
pub struct Detection {
    pub text: String,
    pub confidence: f32,
    pub polygon: [f32; 8],
    pub centroid: (f32, f32),
}

/// Turns a raw OCR record into a [`Detection`], or `None` for records that
/// should be skipped (low score, unrecognized box layout). Skips never fail
/// the batch.
pub fn normalize(text: &str, score: f32, raw: &RawBox) -> Option<Detection> {
    if score < MIN_CONFIDENCE {
        return None;
    }
    let Some(shape) = BoxShape::classify(raw) else {
        warn!("skipping detection with unrecognized box shape: {:?}", raw);
        return None;
    };

    let (polygon, centroid) = match shape {
        BoxShape::Flat8(corners) => {
            let cx = (corners[0] + corners[2] + corners[4] + corners[6]) / 4.0;
            let cy = (corners[1] + corners[3] + corners[5] + corners[7]) / 4.0;
            (corners, (cx, cy))
        }
        BoxShape::RectXywh { x, y, w, h } => {
            // clockwise from top-left
            let polygon = [x, y, x + w, y, x + w, y + h, x, y + h];
            (polygon, (x + w / 2.0, y + h / 2.0))
        }
        BoxShape::PointList4(points) => {
            let polygon = [
                points[0][0],
                points[0][1],
                points[1][0],
                points[1][1],
                points[2][0],
                points[2][1],
                points[3][0],
                points[3][1],
            ];
            let cx = points.iter().map(|p| p[0]).sum::<f32>() / 4.0;
            let cy = points.iter().map(|p| p[1]).sum::<f32>() / 4.0;
            (polygon, (cx, cy))
        }
    };

    Some(Detection {
        text: text.to_string(),
        confidence: score,
        polygon,
        centroid,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Axis-aligned bounding box over a flattened x,y polygon.
pub fn bounding_rect(polygon: &[f32]) -> Option<RectF> {
    if polygon.len() < 2 {
        return None;
    }
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for pair in polygon.chunks_exact(2) {
        min_x = min_x.min(pair[0]);
        max_x = max_x.max(pair[0]);
        min_y = min_y.min(pair[1]);
        max_y = max_y.max(pair[1]);
    }
    Some(RectF {
        x: min_x,
        y: min_y,
        w: max_x - min_x,
        h: max_y - min_y,
    })
}

/// Monotone-chain convex hull. Returns vertices in counter-clockwise order;
/// fewer than three distinct input points yield the points themselves.
pub fn convex_hull(points: &[(f32, f32)]) -> Vec<(f32, f32)> {
    let mut sorted: Vec<(f32, f32)> = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let cross = |o: (f32, f32), a: (f32, f32), b: (f32, f32)| -> f32 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut lower: Vec<(f32, f32)> = Vec::new();
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<(f32, f32)> = Vec::new();
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat8() -> RawBox {
        RawBox::Numbers(vec![10.0, 10.0, 60.0, 10.0, 60.0, 30.0, 10.0, 30.0])
    }

    #[test]
    fn low_confidence_is_dropped() {
        assert!(normalize("a", 0.49, &flat8()).is_none());
        assert!(normalize("a", 0.5, &flat8()).is_some());
    }

    #[test]
    fn equivalent_encodings_agree() {
        let from_flat = normalize("a", 0.9, &flat8()).unwrap();
        let from_rect =
            normalize("a", 0.9, &RawBox::Numbers(vec![10.0, 10.0, 50.0, 20.0])).unwrap();
        let from_points = normalize(
            "a",
            0.9,
            &RawBox::Points(vec![[10.0, 10.0], [60.0, 10.0], [60.0, 30.0], [10.0, 30.0]]),
        )
        .unwrap();

        assert_eq!(from_flat.polygon, from_rect.polygon);
        assert_eq!(from_flat.polygon, from_points.polygon);
        for got in [from_rect.centroid, from_points.centroid] {
            assert!((got.0 - from_flat.centroid.0).abs() < 1e-4);
            assert!((got.1 - from_flat.centroid.1).abs() < 1e-4);
        }
        assert_eq!(from_flat.centroid, (35.0, 20.0));
    }

    #[test]
    fn unknown_shapes_are_skipped() {
        assert!(normalize("a", 0.9, &RawBox::Numbers(vec![1.0, 2.0, 3.0])).is_none());
        assert!(normalize("a", 0.9, &RawBox::Points(vec![[1.0, 2.0], [3.0, 4.0]])).is_none());
    }

    #[test]
    fn bounding_rect_covers_extrema() {
        let rect = bounding_rect(&[10.0, 10.0, 60.0, 10.0, 60.0, 30.0, 10.0, 30.0]).unwrap();
        assert_eq!(
            rect,
            RectF {
                x: 10.0,
                y: 10.0,
                w: 50.0,
                h: 20.0
            }
        );
    }

    #[test]
    fn hull_of_two_squares() {
        let points = vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (5.0, 5.0),
            (20.0, 20.0),
        ];
        let hull = convex_hull(&points);
        assert!(!hull.contains(&(5.0, 5.0)));
        assert!(hull.contains(&(0.0, 0.0)));
        assert!(hull.contains(&(20.0, 20.0)));
    }
}
