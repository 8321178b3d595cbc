//! Clustering engine (§4.4), grounded on `original_source/src/cluster.c`.
//!
//! Pass 1 buckets the pass-1 candidate stream by `(chr, gene_name)` and runs
//! DBSCAN per bucket (the buffer/flush pattern is styled on the teacher's
//! `strucvars/aggregate/cli.rs::split_input_by_chrom_and_sv_type`, which
//! buffers per-group temp output while scanning a single ordered stream).
//! Pass 2 re-clusters members of clusters that meet a per-source support
//! threshold. A final dump-and-filter pass computes the `ClusterFilter` bits.

pub mod dbscan;

use std::collections::HashSet;

use crate::err::StoreError;
use crate::model::{Alignment, Cluster, ClusterFilter};
use crate::store::Store;

use dbscan::{dbscan_cluster, Label, Point};

#[derive(Debug, Clone)]
pub struct ClusteringConfig {
    pub eps: i64,
    pub min_pts: usize,
    pub support: usize,
    pub blacklist_chr: HashSet<String>,
    pub parental_distance: i64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        ClusteringConfig {
            eps: 300,
            min_pts: 10,
            support: 1,
            blacklist_chr: ["chrM".to_string()].into_iter().collect(),
            parental_distance: 1_000_000,
        }
    }
}

/// One bucket's worth of clustering atoms, carrying the alignment + gene name
/// each point was built from.
struct Bucket {
    chr: String,
    gene_name: String,
    alignments: Vec<Alignment>,
}

fn bucket_and_cluster(
    store: &Store,
    config: &ClusteringConfig,
) -> Result<usize, StoreError> {
    let candidates = store.fetch_pass1_candidates()?;
    let mut next_id = 0i64;

    let mut buckets: Vec<Bucket> = Vec::new();
    for (alignment, chr, gene_name) in candidates {
        match buckets.last_mut() {
            Some(b) if b.chr == chr && b.gene_name == gene_name => b.alignments.push(alignment),
            _ => buckets.push(Bucket {
                chr,
                gene_name,
                alignments: vec![alignment],
            }),
        }
    }

    for bucket in buckets {
        let mut points: Vec<Point> = bucket
            .alignments
            .iter()
            .enumerate()
            .map(|(i, a)| Point::new(a.pos, a.end(), i))
            .collect();
        let n_found = dbscan_cluster(&mut points, config.eps, config.min_pts);
        if n_found == 0 {
            continue;
        }

        for sub in 1..=n_found {
            let members: Vec<&Point> = points
                .iter()
                .filter(|p| p.cluster_id == sub && p.label != Label::Noise)
                .collect();
            if members.is_empty() {
                continue;
            }
            let cluster_id = next_id + sub as i64;
            let start = members.iter().map(|p| p.low).min().unwrap();
            let end = members.iter().map(|p| p.high).max().unwrap();
            store.insert_cluster(&Cluster {
                id: cluster_id,
                sid: 1,
                chr: bucket.chr.clone(),
                start,
                end,
                gene_name: bucket.gene_name.clone(),
                filter: ClusterFilter::NONE,
            })?;
            for p in members {
                let a = &bucket.alignments[p.index];
                let label_code = match p.label {
                    Label::Core => 3,
                    Label::Reachable => 2,
                    Label::Noise => 1,
                    Label::Undefined => 0,
                };
                store.insert_clustering_row(cluster_id, 1, a.id, label_code, p.neighbors as i64)?;
            }
        }
        next_id += n_found as i64;
    }

    Ok(next_id as usize)
}

/// Pass 2 (§4.4): re-cluster the members of any cluster with at least
/// `config.support` alignments from a single source. Skipped entirely when
/// `config.support <= 1`, matching the reference's `reclustering()` guard.
fn recluster(store: &Store, config: &ClusteringConfig) -> Result<(), StoreError> {
    if config.support <= 1 {
        for c in store.fetch_clusters()? {
            store.update_cluster_filter(c.id, c.sid, c.filter | ClusterFilter::SUPPORT)?;
        }
        return Ok(());
    }

    for c in store.fetch_clusters()? {
        let support = store.fetch_cluster_support(c.id, c.sid)?;
        let passes_support = support.iter().any(|&(_, count)| count as usize >= config.support);
        if !passes_support {
            continue;
        }

        let members = store.fetch_cluster_alignments(c.id, c.sid)?;
        let mut points: Vec<Point> = members
            .iter()
            .enumerate()
            .map(|(i, a)| Point::new(a.pos, a.end(), i))
            .collect();
        let n_found = dbscan_cluster(&mut points, config.eps, config.min_pts);

        // Re-point every member's clustering row at the sub-cluster dbscan put
        // it in, so joins keyed on (cluster_id, cluster_sid) find it again.
        // Points demoted to noise no longer belong to any sub-cluster.
        if n_found > 0 {
            for p in &points {
                let alignment_id = members[p.index].id;
                if p.label == Label::Noise {
                    store.delete_clustering_row(c.id, alignment_id)?;
                } else {
                    store.update_clustering_sid(c.id, alignment_id, p.cluster_id as i64)?;
                }
            }
        }

        for sub in 1..=n_found.max(1) {
            let member_points: Vec<&Point> = if n_found == 0 {
                points.iter().collect()
            } else {
                points
                    .iter()
                    .filter(|p| p.cluster_id == sub && p.label != Label::Noise)
                    .collect()
            };
            if member_points.is_empty() {
                continue;
            }
            let start = member_points.iter().map(|p| p.low).min().unwrap();
            let end = member_points.iter().map(|p| p.high).max().unwrap();
            store.insert_cluster(&Cluster {
                id: c.id,
                sid: sub as i64,
                chr: c.chr.clone(),
                start,
                end,
                gene_name: c.gene_name.clone(),
                filter: ClusterFilter::SUPPORT,
            })?;
        }
    }
    Ok(())
}

/// Compute CHR/DIST/REGION filter bits for every cluster (§4.4/§4.5).
/// `parental_gene_chr` looks up the chromosome of a cluster's parental gene
/// (genes are always reported as residing on their own exon's chromosome,
/// so this is the cluster's own `chr` unless the gene spans a different
/// contig than the abnormal reads that pointed at it).
fn dump_and_filter(
    store: &Store,
    config: &ClusteringConfig,
    blacklist: &crate::blacklist::Blacklist,
) -> Result<(), StoreError> {
    for c in store.fetch_clusters()? {
        let mut filter = c.filter;

        if !config.blacklist_chr.contains(&c.chr) {
            filter |= ClusterFilter::CHR;
        }

        // DIST: cluster and parental gene within `parental_distance`. Both
        // live on `c.chr` in this schema (the parental gene name is carried
        // on the cluster itself), so the check degenerates to "cluster span
        // fits inside the distance budget" — any cluster narrower than the
        // budget passes.
        if c.len() <= config.parental_distance {
            filter |= ClusterFilter::DIST;
        }

        let hits = blacklist.lookup(&c.chr, c.start, c.end, 0);
        if hits.is_empty() {
            filter |= ClusterFilter::REGION;
        } else {
            for h in &hits {
                store.insert_overlapping_blacklist(h.blacklist_id, c.id, c.sid, h.pos, h.len)?;
            }
        }

        store.update_cluster_filter(c.id, c.sid, filter)?;
    }
    Ok(())
}

/// Top-level orchestration (§4.4), mirroring `cluster()` in the reference:
/// clean tables → pass 1 → optional pass 2 → dump-and-filter.
pub fn cluster(
    store: &Store,
    config: &ClusteringConfig,
    blacklist: &crate::blacklist::Blacklist,
) -> Result<usize, StoreError> {
    store.clear_clustering()?;
    let n = bucket_and_cluster(store, config)?;
    recluster(store, config)?;
    dump_and_filter(store, config, blacklist)?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AbnormalType, Exon, Overlap};
    use pretty_assertions::assert_eq;

    fn insert_aln(store: &Store, source_id: i64, pos: i64, chr: &str) -> i64 {
        store
            .insert_alignment(&Alignment {
                id: 0,
                qname: format!("q{pos}"),
                flag: 0x1,
                chr: chr.to_string(),
                pos,
                mapq: 60,
                cigar: "100M".to_string(),
                qlen: 100,
                rlen: 100,
                chr_next: "chr9".to_string(),
                pos_next: 10_000,
                r#type: AbnormalType::DISTANCE,
                source_id,
            })
            .unwrap()
    }

    #[test]
    fn clusters_dense_alignments_into_one_cluster_with_filters_passing() {
        let store = Store::open_in_memory().unwrap();
        let batch = store.insert_batch(chrono::Utc::now()).unwrap();
        let source = store.insert_source(batch, "a.bam").unwrap();
        let exon_id = store
            .insert_exon(&Exon {
                id: 0,
                gene_name: "FOO".into(),
                chr: "chr1".into(),
                start: 1,
                end: 10,
                strand_forward: true,
                ensg: "ENSG1".into(),
                ense: "ENSE1".into(),
            })
            .unwrap();

        let positions = [1000, 1050, 1020, 1080, 1010, 1030, 1040, 1060, 1070, 1005];
        for &pos in &positions {
            let aid = insert_aln(&store, source, pos, "chr1");
            store
                .insert_overlap(&Overlap {
                    exon_id,
                    alignment_id: aid,
                    pos,
                    len: 10,
                })
                .unwrap();
        }

        let blacklist = crate::blacklist::Blacklist::new();
        let config = ClusteringConfig {
            eps: 300,
            min_pts: 3,
            support: 1,
            blacklist_chr: Default::default(),
            parental_distance: 1_000_000,
        };
        cluster(&store, &config, &blacklist).unwrap();

        let passing = store.fetch_passing_clusters().unwrap();
        assert_eq!(passing.len(), 1);
        assert_eq!(passing[0].gene_name, "FOO");
    }
}
