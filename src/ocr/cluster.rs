//! Density clustering of detection centroids into reading units.
//!
//! This is an OPTICS implementation (ordering + reachability plot + xi
//! steep-area extraction) over a direction-weighted L1 metric. The axis
//! along which glyphs of the same line/column sit close together gets the
//! larger weight, so clusters grow along the minor axis and split across
//! the major one.

use super::TextDirection;

pub const MIN_SAMPLES: usize = 2;
pub const MAX_EPS: f64 = 100.0;
pub const XI: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterLabel {
    Cluster(usize),
    Noise,
}

impl TextDirection {
    /// (x_weight, y_weight) for the clustering metric.
    pub fn cluster_weights(self) -> (f64, f64) {
        match self {
            TextDirection::Horizontal => (0.75, 1.5),
            TextDirection::Vertical => (1.5, 0.75),
        }
    }
}

fn weighted_l1(a: (f32, f32), b: (f32, f32), weights: (f64, f64)) -> f64 {
    let dx = (a.0 as f64 - b.0 as f64).abs();
    let dy = (a.1 as f64 - b.1 as f64).abs();
    dx * weights.0 + dy * weights.1
}

/// Assigns a [`ClusterLabel`] to every centroid. Zero or one centroids skip
/// clustering entirely; an internal failure (non-finite input) degrades to a
/// single cluster holding everything rather than aborting the image.
pub fn cluster_centroids(centroids: &[(f32, f32)], direction: TextDirection) -> Vec<ClusterLabel> {
    match centroids.len() {
        0 => return Vec::new(),
        1 => return vec![ClusterLabel::Cluster(0)],
        _ => {}
    }
    match try_cluster(centroids, direction.cluster_weights()) {
        Some(labels) => labels,
        None => {
            tracing::warn!("clustering failed, treating all detections as one cluster");
            vec![ClusterLabel::Cluster(0); centroids.len()]
        }
    }
}

fn try_cluster(centroids: &[(f32, f32)], weights: (f64, f64)) -> Option<Vec<ClusterLabel>> {
    if centroids
        .iter()
        .any(|&(x, y)| !x.is_finite() || !y.is_finite())
    {
        return None;
    }

    let run = optics_order(centroids, weights);
    let clusters = extract_xi_clusters(&run);
    Some(assign_labels(&run.ordering, &clusters, centroids.len()))
}

struct OpticsRun {
    /// Original indices in visit order.
    ordering: Vec<usize>,
    /// Reachability per ordering position, with a trailing infinity.
    reachability: Vec<f64>,
    /// Predecessor (original index) per ordering position.
    predecessor: Vec<Option<usize>>,
}

fn optics_order(points: &[(f32, f32)], weights: (f64, f64)) -> OpticsRun {
    let n = points.len();
    let dist = |i: usize, j: usize| weighted_l1(points[i], points[j], weights);

    // Core distance: distance to the min_samples-th nearest neighbor, the
    // point itself included. Beyond max_eps the point is not core.
    let mut core = vec![f64::INFINITY; n];
    for i in 0..n {
        let mut distances: Vec<f64> = (0..n).map(|j| dist(i, j)).collect();
        distances.sort_by(f64::total_cmp);
        let kth = distances[MIN_SAMPLES - 1];
        if kth <= MAX_EPS {
            core[i] = kth;
        }
    }

    let mut reach = vec![f64::INFINITY; n];
    let mut pred: Vec<Option<usize>> = vec![None; n];
    let mut processed = vec![false; n];
    let mut ordering = Vec::with_capacity(n);

    while ordering.len() < n {
        // Smallest reachability among unprocessed points; ties (and the
        // all-infinite start) resolve to the lowest index, which keeps the
        // run deterministic.
        let mut next = None;
        let mut best = f64::INFINITY;
        for i in 0..n {
            if processed[i] {
                continue;
            }
            if next.is_none() || reach[i] < best {
                next = Some(i);
                best = reach[i];
            }
        }
        let Some(p) = next else {
            break;
        };
        processed[p] = true;
        ordering.push(p);

        if core[p].is_infinite() {
            continue;
        }
        for o in 0..n {
            if processed[o] {
                continue;
            }
            let d = dist(p, o);
            if d > MAX_EPS {
                continue;
            }
            let new_reach = core[p].max(d);
            if new_reach < reach[o] {
                reach[o] = new_reach;
                pred[o] = Some(p);
            }
        }
    }

    let mut reachability: Vec<f64> = ordering.iter().map(|&i| reach[i]).collect();
    let mut predecessor: Vec<Option<usize>> = ordering.iter().map(|&i| pred[i]).collect();
    reachability.push(f64::INFINITY);
    predecessor.push(None);
    OpticsRun {
        ordering,
        reachability,
        predecessor,
    }
}

struct SteepDownArea {
    start: usize,
    end: usize,
    mib: f64,
}

/// Xi steep-area cluster extraction over the reachability plot. Returns
/// `(start, end)` ranges of ordering positions, innermost-first per upward
/// area so that nested clusters win during labeling.
fn extract_xi_clusters(run: &OpticsRun) -> Vec<(usize, usize)> {
    let r = &run.reachability;
    let n = run.ordering.len();
    let xi_complement = 1.0 - XI;
    let min_cluster_size = MIN_SAMPLES;

    // NaN ratios (infinite plateaus) compare false everywhere, which is the
    // behavior the extraction relies on.
    let ratio: Vec<f64> = (0..n).map(|i| r[i] / r[i + 1]).collect();
    let steep_up: Vec<bool> = ratio.iter().map(|&q| q <= xi_complement).collect();
    let steep_down: Vec<bool> = ratio.iter().map(|&q| q >= 1.0 / xi_complement).collect();
    let upward: Vec<bool> = ratio.iter().map(|&q| q < 1.0).collect();
    let downward: Vec<bool> = ratio.iter().map(|&q| q > 1.0).collect();

    let mut sdas: Vec<SteepDownArea> = Vec::new();
    let mut clusters: Vec<(usize, usize)> = Vec::new();
    let mut index = 0usize;
    let mut mib = 0.0f64;

    for steep_index in 0..n {
        if !(steep_up[steep_index] || steep_down[steep_index]) || steep_index < index {
            continue;
        }
        mib = r[index..=steep_index].iter().copied().fold(mib, f64::max);

        if steep_down[steep_index] {
            filter_sdas(&mut sdas, mib, xi_complement, r);
            let start = steep_index;
            let end = extend_region(&steep_down, &upward, start, n);
            sdas.push(SteepDownArea {
                start,
                end,
                mib: 0.0,
            });
            index = end + 1;
            mib = r[index];
        } else {
            filter_sdas(&mut sdas, mib, xi_complement, r);
            let u_start = steep_index;
            let u_end = extend_region(&steep_up, &downward, u_start, n);
            index = u_end + 1;
            mib = r[index];

            let mut local: Vec<(usize, usize)> = Vec::new();
            for area in &sdas {
                let mut c_start = area.start;
                let mut c_end = u_end;

                if area.mib > r[c_end + 1] * xi_complement {
                    continue;
                }
                let d_max = r[area.start];
                if d_max * xi_complement >= r[c_end + 1] {
                    while c_start < area.end && r[c_start + 1] > r[c_end + 1] {
                        c_start += 1;
                    }
                } else if r[c_end + 1] * xi_complement >= d_max {
                    while c_end > u_start && r[c_end] < d_max {
                        c_end -= 1;
                    }
                }
                let Some((c_start, c_end)) = correct_predecessor(run, c_start, c_end) else {
                    continue;
                };
                if c_end + 1 - c_start < min_cluster_size {
                    continue;
                }
                if c_start > area.end || c_end < u_start {
                    continue;
                }
                local.push((c_start, c_end));
            }
            local.reverse();
            clusters.extend(local);
        }
    }
    clusters
}

fn extend_region(steep: &[bool], opposite: &[bool], start: usize, n: usize) -> usize {
    let mut non_steep = 0usize;
    let mut end = start;
    let mut index = start;
    while index < n {
        if steep[index] {
            non_steep = 0;
            end = index;
        } else if !opposite[index] {
            non_steep += 1;
            if non_steep > MIN_SAMPLES {
                break;
            }
        } else {
            return end;
        }
        index += 1;
    }
    end
}

fn filter_sdas(sdas: &mut Vec<SteepDownArea>, mib: f64, xi_complement: f64, r: &[f64]) {
    if mib.is_infinite() {
        sdas.clear();
        return;
    }
    sdas.retain(|area| mib <= r[area.start] * xi_complement);
    for area in sdas.iter_mut() {
        area.mib = area.mib.max(mib);
    }
}

/// Shrinks a candidate cluster from the right until its last point is
/// actually reachable from inside the cluster.
fn correct_predecessor(run: &OpticsRun, s: usize, mut e: usize) -> Option<(usize, usize)> {
    while s < e {
        if run.reachability[s] > run.reachability[e] {
            return Some((s, e));
        }
        if let Some(p) = run.predecessor[e] {
            if run.ordering[s..e].contains(&p) {
                return Some((s, e));
            }
        }
        e -= 1;
    }
    None
}

fn assign_labels(ordering: &[usize], clusters: &[(usize, usize)], n: usize) -> Vec<ClusterLabel> {
    let mut by_position: Vec<Option<usize>> = vec![None; n];
    let mut label = 0usize;
    for &(start, end) in clusters {
        if by_position[start..=end].iter().any(Option::is_some) {
            continue;
        }
        for slot in &mut by_position[start..=end] {
            *slot = Some(label);
        }
        label += 1;
    }

    let mut labels = vec![ClusterLabel::Noise; n];
    for (position, &original) in ordering.iter().enumerate() {
        if let Some(id) = by_position[position] {
            labels[original] = ClusterLabel::Cluster(id);
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_singleton_inputs() {
        assert!(cluster_centroids(&[], TextDirection::Horizontal).is_empty());
        assert_eq!(
            cluster_centroids(&[(5.0, 5.0)], TextDirection::Horizontal),
            vec![ClusterLabel::Cluster(0)]
        );
    }

    #[test]
    fn close_pair_forms_one_cluster() {
        let labels = cluster_centroids(&[(35.0, 20.0), (35.0, 43.5)], TextDirection::Horizontal);
        assert_eq!(labels[0], labels[1]);
        assert!(matches!(labels[0], ClusterLabel::Cluster(_)));
    }

    #[test]
    fn far_groups_split_into_two_clusters() {
        let points = [
            (10.0, 10.0),
            (14.0, 12.0),
            (12.0, 18.0),
            (500.0, 500.0),
            (504.0, 502.0),
            (502.0, 508.0),
        ];
        let labels = cluster_centroids(&points, TextDirection::Horizontal);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
        assert!(labels.iter().all(|l| *l != ClusterLabel::Noise));
    }

    #[test]
    fn isolated_point_is_noise() {
        let points = [(10.0, 10.0), (14.0, 12.0), (12.0, 18.0), (900.0, 10.0)];
        let labels = cluster_centroids(&points, TextDirection::Horizontal);
        assert_eq!(labels[3], ClusterLabel::Noise);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
    }

    #[test]
    fn direction_changes_the_metric() {
        // 80px apart along x: 60 under horizontal weights (clustered),
        // 120 under vertical weights (beyond max_eps, both noise).
        let points = [(0.0, 0.0), (80.0, 0.0)];
        let horizontal = cluster_centroids(&points, TextDirection::Horizontal);
        assert_eq!(horizontal[0], horizontal[1]);
        assert!(matches!(horizontal[0], ClusterLabel::Cluster(_)));

        let vertical = cluster_centroids(&points, TextDirection::Vertical);
        assert_eq!(vertical, vec![ClusterLabel::Noise, ClusterLabel::Noise]);
    }

    #[test]
    fn repeated_runs_are_deterministic() {
        let points = [
            (10.0, 10.0),
            (30.0, 14.0),
            (12.0, 40.0),
            (300.0, 300.0),
            (310.0, 305.0),
            (700.0, 20.0),
        ];
        let first = cluster_centroids(&points, TextDirection::Vertical);
        for _ in 0..10 {
            assert_eq!(cluster_centroids(&points, TextDirection::Vertical), first);
        }
    }

    #[test]
    fn non_finite_input_degrades_to_single_cluster() {
        let points = [(0.0, 0.0), (f32::NAN, 5.0), (10.0, 10.0)];
        let labels = cluster_centroids(&points, TextDirection::Horizontal);
        assert_eq!(labels, vec![ClusterLabel::Cluster(0); 3]);
    }
}
