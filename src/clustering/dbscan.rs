//! DBSCAN over 1-D genomic intervals (§4.4/§4.9), grounded on
//! `original_source/src/dbscan.c`/`.h`.
//!
//! A point's neighbourhood is found via the interval index with radius
//! `eps` around its midpoint: `[max(center - eps, 1), center + eps]`. The
//! state machine (UNDEFINED → NOISE | REACHABLE | CORE) matches SPEC_FULL
//! §4.9 exactly: a point reached during seed expansion that turns out to
//! have enough neighbours becomes CORE *in the same cluster*, growing the
//! seed set further; a point found not to have enough neighbours becomes
//! REACHABLE rather than staying NOISE (NOISE is reserved for points never
//! reached by any CORE point's expansion).

use crate::interval::{IntervalTree, OverlapParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Undefined,
    Noise,
    Reachable,
    Core,
}

/// One clustering atom: the reference span of one alignment, plus its
/// assigned label/cluster id once `cluster` has run.
#[derive(Debug, Clone)]
pub struct Point {
    pub low: i64,
    pub high: i64,
    pub label: Label,
    pub cluster_id: usize,
    pub neighbors: usize,
    /// Index back into the caller's point vector / alignment list.
    pub index: usize,
}

impl Point {
    pub fn new(low: i64, high: i64, index: usize) -> Self {
        Point {
            low,
            high,
            label: Label::Undefined,
            cluster_id: 0,
            neighbors: 0,
            index,
        }
    }

    fn center(&self) -> i64 {
        (self.high + self.low) / 2
    }
}

/// Range-query the index for all points within `eps` of `point`'s midpoint.
fn range_query(index: &IntervalTree<usize>, point: &Point, eps: i64) -> Vec<usize> {
    let center = point.center();
    let low = (center - eps).max(1);
    let high = center + eps;
    index
        .lookup(low, high, OverlapParams::default())
        .into_iter()
        .map(|hit| *hit.data)
        .collect()
}

/// Cluster `points` in place with parameters `eps`/`min_pts`. Returns the
/// number of clusters found; cluster ids are written into `points[i].cluster_id`
/// as `1..=n` (0 means "no cluster", i.e. NOISE).
pub fn dbscan_cluster(points: &mut [Point], eps: i64, min_pts: usize) -> usize {
    if points.is_empty() {
        return 0;
    }

    let mut index = IntervalTree::new();
    for (i, p) in points.iter().enumerate() {
        index.insert(p.low, p.high, i);
    }

    let mut next_cluster_id = 0usize;

    for i in 0..points.len() {
        if points[i].label != Label::Undefined {
            continue;
        }
        let neighbors = range_query(&index, &points[i], eps);
        points[i].neighbors = neighbors.len();
        if neighbors.len() < min_pts {
            points[i].label = Label::Noise;
            continue;
        }

        next_cluster_id += 1;
        points[i].label = Label::Core;
        points[i].cluster_id = next_cluster_id;

        let mut seeds: Vec<usize> = neighbors.into_iter().filter(|&j| j != i).collect();
        let mut in_seeds = vec![false; points.len()];
        for &s in &seeds {
            in_seeds[s] = true;
        }

        let mut k = 0usize;
        while k < seeds.len() {
            let q = seeds[k];
            k += 1;

            if points[q].label == Label::Noise {
                points[q].label = Label::Reachable;
                points[q].cluster_id = next_cluster_id;
            }
            if points[q].label != Label::Undefined {
                continue;
            }

            points[q].cluster_id = next_cluster_id;
            let q_neighbors = range_query(&index, &points[q], eps);
            points[q].neighbors = q_neighbors.len();

            if q_neighbors.len() >= min_pts {
                points[q].label = Label::Core;
                for n in q_neighbors {
                    if !in_seeds[n] {
                        in_seeds[n] = true;
                        seeds.push(n);
                    }
                }
            } else {
                points[q].label = Label::Reachable;
            }
        }
    }

    next_cluster_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make(spans: &[(i64, i64)]) -> Vec<Point> {
        spans
            .iter()
            .enumerate()
            .map(|(i, &(l, h))| Point::new(l, h, i))
            .collect()
    }

    /// Scenario 1 (SPEC_FULL §8): eps=300, min_pts=3.
    #[test]
    fn scenario_one_cluster_and_noise() {
        let mut points = make(&[
            (1000, 1100),
            (1050, 1150),
            (1300, 1400),
            (2000, 2100),
            (2500, 2600),
            (2560, 2660),
        ]);
        let n = dbscan_cluster(&mut points, 300, 3);
        assert_eq!(n, 1);
        for p in &points[0..3] {
            assert_eq!(p.label, Label::Core);
            assert_eq!(p.cluster_id, 1);
        }
        for p in &points[3..6] {
            assert_eq!(p.label, Label::Noise);
        }
    }

    /// Scenario 2 (SPEC_FULL §8): eps=500, min_pts=3.
    #[test]
    fn scenario_two_clusters() {
        let mut points = make(&[
            (1000, 1100),
            (1050, 1150),
            (1300, 1400),
            (2000, 2100),
            (2500, 2600),
            (2560, 2660),
        ]);
        let n = dbscan_cluster(&mut points, 500, 3);
        assert_eq!(n, 2);
        for p in &points[0..3] {
            assert_eq!(p.label, Label::Core);
        }
        assert_eq!(points[3].label, Label::Reachable);
        assert_eq!(points[4].label, Label::Core);
        assert_eq!(points[5].label, Label::Reachable);
        assert_eq!(points[3].cluster_id, points[4].cluster_id);
        assert_eq!(points[5].cluster_id, points[4].cluster_id);
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        let mut points: Vec<Point> = Vec::new();
        assert_eq!(dbscan_cluster(&mut points, 300, 3), 0);
    }

    #[test]
    fn every_core_point_has_enough_neighbors() {
        let mut points = make(&[
            (1000, 1100),
            (1050, 1150),
            (1300, 1400),
            (2000, 2100),
            (2500, 2600),
            (2560, 2660),
        ]);
        dbscan_cluster(&mut points, 300, 3);
        for p in &points {
            if p.label == Label::Core {
                assert!(p.neighbors >= 3);
            }
        }
    }
}
