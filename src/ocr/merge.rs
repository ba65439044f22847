use super::TextDirection;
use super::cluster::{ClusterLabel, cluster_centroids};
use super::geometry::{Detection, RectF, bounding_rect, convex_hull};

/// One reading unit: the concatenated member texts and a bounding polygon.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub text: String,
    /// Flattened x,y polygon. A convex hull for merged clusters, the member
    /// quad for singletons and degenerate merges.
    pub polygon: Vec<f32>,
    pub bounding: RectF,
}

/// Clusters detections and merges each cluster into a [`TextBlock`]. Noise
/// points become one singleton block each and are never merged.
pub fn merge_detections(detections: &[Detection], direction: TextDirection) -> Vec<TextBlock> {
    if detections.is_empty() {
        return Vec::new();
    }
    let centroids: Vec<(f32, f32)> = detections.iter().map(|d| d.centroid).collect();
    let labels = cluster_centroids(&centroids, direction);

    let mut blocks = Vec::new();
    let cluster_count = labels
        .iter()
        .filter_map(|label| match label {
            ClusterLabel::Cluster(id) => Some(id + 1),
            ClusterLabel::Noise => None,
        })
        .max()
        .unwrap_or(0);

    for id in 0..cluster_count {
        let mut members: Vec<&Detection> = detections
            .iter()
            .zip(&labels)
            .filter(|(_, label)| **label == ClusterLabel::Cluster(id))
            .map(|(detection, _)| detection)
            .collect();
        if members.is_empty() {
            continue;
        }
        sort_reading_order(&mut members, direction);
        blocks.push(merge_members(&members));
    }

    for (detection, label) in detections.iter().zip(&labels) {
        if *label == ClusterLabel::Noise {
            blocks.push(singleton_block(detection));
        }
    }

    blocks
}

/// Horizontal: top-to-bottom, then left-to-right.
/// Vertical: top-to-bottom, then right-to-left.
fn sort_reading_order(members: &mut [&Detection], direction: TextDirection) {
    members.sort_by(|a, b| {
        let by_y = a.centroid.1.total_cmp(&b.centroid.1);
        match direction {
            TextDirection::Horizontal => by_y.then(a.centroid.0.total_cmp(&b.centroid.0)),
            TextDirection::Vertical => by_y.then(b.centroid.0.total_cmp(&a.centroid.0)),
        }
    });
}

fn merge_members(members: &[&Detection]) -> TextBlock {
    let text = members
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let corners: Vec<(f32, f32)> = members
        .iter()
        .flat_map(|d| d.polygon.chunks_exact(2).map(|pair| (pair[0], pair[1])))
        .collect();
    let hull = convex_hull(&corners);

    // A degenerate hull (collinear or empty cluster) falls back to the
    // first member's own quad.
    let polygon: Vec<f32> = if hull.len() >= 3 {
        hull.iter().flat_map(|&(x, y)| [x, y]).collect()
    } else {
        members[0].polygon.to_vec()
    };
    let bounding = bounding_rect(&polygon).unwrap_or(RectF {
        x: 0.0,
        y: 0.0,
        w: 0.0,
        h: 0.0,
    });

    TextBlock {
        text,
        polygon,
        bounding,
    }
}

fn singleton_block(detection: &Detection) -> TextBlock {
    let polygon = detection.polygon.to_vec();
    let bounding = bounding_rect(&polygon).unwrap_or(RectF {
        x: 0.0,
        y: 0.0,
        w: 0.0,
        h: 0.0,
    });
    TextBlock {
        text: detection.text.clone(),
        polygon,
        bounding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::geometry::{RawBox, normalize};

    fn detection(text: &str, rect: [f32; 4]) -> Detection {
        normalize(text, 0.9, &RawBox::Numbers(rect.to_vec())).unwrap()
    }

    #[test]
    fn stacked_boxes_merge_into_one_block() {
        // Two detections at (10,10)-(60,30) and (12,32)-(58,55).
        let detections = vec![
            detection("A", [10.0, 10.0, 50.0, 20.0]),
            detection("B", [12.0, 32.0, 46.0, 23.0]),
        ];
        let blocks = merge_detections(&detections, TextDirection::Horizontal);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "A\nB");

        let bounding = blocks[0].bounding;
        assert_eq!(bounding.x, 10.0);
        assert_eq!(bounding.y, 10.0);
        assert_eq!(bounding.x + bounding.w, 60.0);
        assert_eq!(bounding.y + bounding.h, 55.0);
    }

    #[test]
    fn bounding_contains_all_member_corners() {
        let detections = vec![
            detection("A", [10.0, 10.0, 50.0, 20.0]),
            detection("B", [12.0, 32.0, 46.0, 23.0]),
            detection("C", [20.0, 58.0, 30.0, 20.0]),
        ];
        let blocks = merge_detections(&detections, TextDirection::Horizontal);
        let merged = &blocks[0];
        for det in &detections {
            for pair in det.polygon.chunks_exact(2) {
                assert!(pair[0] >= merged.bounding.x - 1e-3);
                assert!(pair[0] <= merged.bounding.x + merged.bounding.w + 1e-3);
                assert!(pair[1] >= merged.bounding.y - 1e-3);
                assert!(pair[1] <= merged.bounding.y + merged.bounding.h + 1e-3);
            }
        }
    }

    #[test]
    fn horizontal_reading_order_is_top_down_left_right() {
        let detections = vec![
            detection("right", [60.0, 10.0, 20.0, 10.0]),
            detection("left", [10.0, 10.0, 20.0, 10.0]),
            detection("below", [10.0, 24.0, 20.0, 10.0]),
        ];
        let blocks = merge_detections(&detections, TextDirection::Horizontal);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "left\nright\nbelow");
    }

    #[test]
    fn vertical_reading_order_is_top_down_right_left() {
        let detections = vec![
            detection("second", [10.0, 10.0, 20.0, 10.0]),
            detection("first", [60.0, 10.0, 20.0, 10.0]),
            detection("third", [60.0, 24.0, 20.0, 10.0]),
        ];
        let blocks = merge_detections(&detections, TextDirection::Vertical);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "first\nsecond\nthird");
    }

    #[test]
    fn noise_detections_become_singletons() {
        let detections = vec![
            detection("a", [10.0, 10.0, 20.0, 10.0]),
            detection("b", [12.0, 24.0, 20.0, 10.0]),
            detection("lonely", [900.0, 900.0, 20.0, 10.0]),
        ];
        let blocks = merge_detections(&detections, TextDirection::Horizontal);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "a\nb");
        assert_eq!(blocks[1].text, "lonely");
        assert_eq!(blocks[1].polygon.len(), 8);
    }

    #[test]
    fn empty_input_yields_no_blocks() {
        assert!(merge_detections(&[], TextDirection::Horizontal).is_empty());
    }
}
