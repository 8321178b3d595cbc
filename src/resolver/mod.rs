//! Retrocopy resolver (§4.6), grounded on `original_source/src/retrocopy.c`/`.h`.
//!
//! Fully-passing clusters are grouped into "stacks" of transitively
//! overlapping windows, each stack is walked in parental-gene order, and
//! adjacent clusters are merged by the rules in SPEC_FULL §4.6. Each merged
//! group becomes one retrocopy: its insertion point comes from the mode of
//! supplementary-read CIGAR-derived positions, falling back to the window
//! midpoint, and its orientation from a Spearman permutation test against
//! the parental gene's exon order.

use std::collections::HashMap;

use crate::common::cigar::Cigar;
use crate::correlation::{spearman, spearman_permutation_test, PERMUTATION_SIZE};
use crate::err::StoreError;
use crate::model::{Cluster, InsertionPointType, Retrocopy, RetrocopyLevel};
use crate::store::Store;

/// Maximum rank distance between parental genes for `NEAR_PARENTALS` (§4.6,
/// `MAX_DIST` in the reference). Not exposed as a CLI flag — see DESIGN.md.
pub const MAX_DIST: i64 = 3;

struct GeneWindows(HashMap<String, (String, i64, i64)>);

impl GeneWindows {
    fn overlap(&self, a: &str, b: &str) -> bool {
        let (Some(wa), Some(wb)) = (self.0.get(a), self.0.get(b)) else {
            return false;
        };
        wa.0 == wb.0 && wa.1 <= wb.2 && wb.1 <= wa.2
    }
}

/// Dense rank of each gene's window within its chromosome, ordered by
/// `(start, end)` — the reference's `gene_rank` CTE.
fn gene_ranks(windows: &GeneWindows) -> HashMap<String, i64> {
    let mut by_chr: HashMap<&str, Vec<(&str, i64, i64)>> = HashMap::new();
    for (gene, (chr, start, end)) in &windows.0 {
        by_chr
            .entry(chr.as_str())
            .or_default()
            .push((gene.as_str(), *start, *end));
    }
    let mut ranks = HashMap::new();
    for genes in by_chr.values_mut() {
        genes.sort_by_key(|&(_, s, e)| (s, e));
        let mut rank = 0i64;
        let mut prev: Option<(i64, i64)> = None;
        for &(gene, s, e) in genes.iter() {
            if prev != Some((s, e)) {
                rank += 1;
            }
            ranks.insert(gene.to_string(), rank);
            prev = Some((s, e));
        }
    }
    ranks
}

/// Group clusters (already sorted by chr,start,end) into stacks of
/// transitively overlapping windows.
fn group_into_stacks(clusters: Vec<Cluster>) -> Vec<Vec<Cluster>> {
    let mut stacks: Vec<Vec<Cluster>> = Vec::new();
    for c in clusters {
        match stacks.last_mut() {
            Some(stack)
                if stack.last().map_or(false, |last| {
                    last.chr == c.chr && c.start <= stack.iter().map(|x| x.end).max().unwrap()
                }) =>
            {
                stack.push(c);
            }
            _ => stacks.push(vec![c]),
        }
    }
    stacks
}

struct MergeGroup {
    clusters: Vec<Cluster>,
    level: RetrocopyLevel,
}

/// Walk one stack's clusters (already sorted by parental gene order) and
/// apply the three merge rules of SPEC_FULL §4.6.
fn merge_and_classify(
    mut stack: Vec<Cluster>,
    windows: &GeneWindows,
    ranks: &HashMap<String, i64>,
) -> Vec<MergeGroup> {
    stack.sort_by(|a, b| {
        let ra = ranks.get(&a.gene_name).copied().unwrap_or(0);
        let rb = ranks.get(&b.gene_name).copied().unwrap_or(0);
        ra.cmp(&rb).then_with(|| a.start.cmp(&b.start))
    });

    let mut groups = Vec::new();
    let mut current = vec![stack[0].clone()];
    let mut current_level = RetrocopyLevel::PASS;

    for pair in stack.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if windows.overlap(&prev.gene_name, &next.gene_name) {
            current.push(next.clone());
            current_level |= RetrocopyLevel::OVERLAPPED_PARENTALS;
        } else if (ranks.get(&prev.gene_name).copied().unwrap_or(0)
            - ranks.get(&next.gene_name).copied().unwrap_or(0))
        .abs()
            <= MAX_DIST
        {
            current.push(next.clone());
            current_level |= RetrocopyLevel::NEAR_PARENTALS;
        } else {
            groups.push(MergeGroup {
                clusters: std::mem::take(&mut current),
                level: current_level | RetrocopyLevel::HOTSPOT,
            });
            current = vec![next.clone()];
            current_level = RetrocopyLevel::PASS;
        }
    }
    groups.push(MergeGroup {
        clusters: current,
        level: current_level,
    });
    groups
}

/// Supplementary-CIGAR-mode insertion point, falling back to the window
/// midpoint (§4.6).
fn insertion_point(
    store: &Store,
    clusters: &[Cluster],
) -> Result<(i64, InsertionPointType), StoreError> {
    let mut candidates: HashMap<i64, usize> = HashMap::new();
    for c in clusters {
        for a in store.fetch_cluster_alignments(c.id, c.sid)? {
            if !a.is_supplementary() {
                continue;
            }
            let Ok(cigar) = Cigar::parse(&a.cigar) else {
                continue;
            };
            let point = if cigar.ends_with_clip() {
                a.pos + a.rlen
            } else if cigar.starts_with_clip() {
                a.pos
            } else {
                continue;
            };
            *candidates.entry(point).or_insert(0) += 1;
        }
    }

    if candidates.is_empty() {
        let start = clusters.iter().map(|c| c.start).min().unwrap();
        let end = clusters.iter().map(|c| c.end).max().unwrap();
        return Ok(((start + end) / 2, InsertionPointType::WindowMean));
    }

    let best = candidates
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .unwrap();
    Ok((best.0, InsertionPointType::SupplementaryMode))
}

/// Spearman orientation (§4.6): parental exon rank vs. observed read strand,
/// only computed for PASS-level groups with at least two distinct data points.
fn orientation(
    store: &Store,
    clusters: &[Cluster],
) -> Result<(Option<f64>, Option<f64>), StoreError> {
    let mut exon_ranks_by_gene: HashMap<String, HashMap<i64, i64>> = HashMap::new();
    let mut xs = Vec::new();
    let mut ys = Vec::new();

    for c in clusters {
        let ranks = exon_ranks_by_gene
            .entry(c.gene_name.clone())
            .or_insert_with(|| store.fetch_gene_exon_ranks(&c.gene_name).unwrap_or_default())
            .clone();
        for a in store.fetch_cluster_alignments(c.id, c.sid)? {
            if let Some(exon_id) = store.fetch_alignment_exon(a.id)? {
                if let Some(&rank) = ranks.get(&exon_id) {
                    xs.push(rank as f64);
                    ys.push(if a.is_reverse() { -1.0 } else { 1.0 });
                }
            }
        }
    }

    if xs.len() < 2 || xs.iter().all(|&v| v == xs[0]) {
        return Ok((None, None));
    }

    let rho = spearman(&xs, &ys);
    let p = spearman_permutation_test(&xs, &ys, rho, PERMUTATION_SIZE);
    Ok((Some(rho), Some(p)))
}

/// Top-level orchestration (§4.6): groups passing clusters into stacks,
/// merges/classifies each, computes insertion point + orientation, and
/// persists one `Retrocopy` (plus its `cluster_merging` rows) per group.
pub fn resolve(store: &Store) -> Result<Vec<i64>, StoreError> {
    let clusters = store.fetch_passing_clusters()?;
    let windows = GeneWindows(store.fetch_gene_windows()?);
    let ranks = gene_ranks(&windows);

    let mut ids = Vec::new();
    for stack in group_into_stacks(clusters) {
        for group in merge_and_classify(stack, &windows, &ranks) {
            let chr = group.clusters[0].chr.clone();
            let window_start = group.clusters.iter().map(|c| c.start).min().unwrap();
            let window_end = group.clusters.iter().map(|c| c.end).max().unwrap();
            let parental_gene_name = group
                .clusters
                .iter()
                .map(|c| c.gene_name.as_str())
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect::<Vec<_>>()
                .join(",");

            let (ip, ip_type) = insertion_point(store, &group.clusters)?;
            let (rho, p_value) = if group.level.contains(RetrocopyLevel::PASS) {
                orientation(store, &group.clusters)?
            } else {
                (None, None)
            };

            let rc = Retrocopy {
                id: 0,
                chr,
                window_start,
                window_end,
                parental_gene_name,
                level: group.level,
                insertion_point: ip,
                insertion_point_type: ip_type,
                orientation_rho: rho,
                orientation_p_value: p_value,
            };
            let id = store.insert_retrocopy(&rc)?;
            for c in &group.clusters {
                store.insert_cluster_merging(id, c.id, c.sid)?;
            }
            ids.push(id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn overlapping_parental_genes_are_merged() {
        let mut map = HashMap::new();
        map.insert("A".to_string(), ("chr1".to_string(), 100, 200));
        map.insert("B".to_string(), ("chr1".to_string(), 150, 250));
        let windows = GeneWindows(map);
        assert!(windows.overlap("A", "B"));
    }

    #[test]
    fn non_overlapping_distant_genes_are_not_merged() {
        let mut map = HashMap::new();
        map.insert("A".to_string(), ("chr1".to_string(), 100, 200));
        map.insert("B".to_string(), ("chr1".to_string(), 5_000_000, 5_000_100));
        let windows = GeneWindows(map);
        assert!(!windows.overlap("A", "B"));
    }

    #[test]
    fn merge_and_classify_sets_overlapped_parentals() {
        let c1 = Cluster {
            id: 1,
            sid: 1,
            chr: "chr1".into(),
            start: 1000,
            end: 1100,
            gene_name: "A".into(),
            filter: Default::default(),
        };
        let c2 = Cluster {
            id: 2,
            sid: 1,
            chr: "chr1".into(),
            start: 1050,
            end: 1150,
            gene_name: "B".into(),
            filter: Default::default(),
        };
        let mut map = HashMap::new();
        map.insert("A".to_string(), ("chr1".to_string(), 100, 200));
        map.insert("B".to_string(), ("chr1".to_string(), 150, 250));
        let windows = GeneWindows(map);
        let mut ranks = HashMap::new();
        ranks.insert("A".to_string(), 1);
        ranks.insert("B".to_string(), 2);

        let groups = merge_and_classify(vec![c1, c2], &windows, &ranks);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].level.contains(RetrocopyLevel::OVERLAPPED_PARENTALS));
        assert_eq!(groups[0].clusters.len(), 2);
    }
}
