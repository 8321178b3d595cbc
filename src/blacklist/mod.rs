//! Blacklist region index (§4.5), grounded on
//! `original_source/src/blacklist.c`/`.h`.
//!
//! A per-chromosome interval index of excluded regions (loaded from a
//! GFF/GTF feature stream or a BED stream), used by the clustering engine's
//! REGION filter: a cluster passes when *no* blacklist interval overlaps it.

use std::collections::HashMap;
use std::io::BufRead;

use crate::interval::{IntervalTree, OverlapParams};

#[derive(Debug, Clone, Copy)]
pub struct BlacklistHit {
    pub blacklist_id: i64,
    pub pos: i64,
    pub len: i64,
}

#[derive(Debug, Default)]
pub struct Blacklist {
    by_chr: HashMap<String, IntervalTree<i64>>,
}

impl Blacklist {
    pub fn new() -> Self {
        Blacklist {
            by_chr: HashMap::new(),
        }
    }

    pub fn insert(&mut self, chr: &str, start: i64, end: i64, id: i64) {
        self.by_chr
            .entry(crate::common::chrom::standardize(chr))
            .or_default()
            .insert(start, end, id);
    }

    /// Regions in `chr` overlapping `[start, end]`, expanded by `padding` on
    /// both ends.
    pub fn lookup(&self, chr: &str, start: i64, end: i64, padding: i64) -> Vec<BlacklistHit> {
        let chr = crate::common::chrom::standardize(chr);
        let Some(tree) = self.by_chr.get(&chr) else {
            return Vec::new();
        };
        tree.lookup(start - padding, end + padding, OverlapParams::default())
            .into_iter()
            .map(|hit| BlacklistHit {
                blacklist_id: *hit.data,
                pos: hit.overlap_pos,
                len: hit.overlap_len,
            })
            .collect()
    }

    /// Load blacklist entries from a BED stream (`chr\tstart\tend[\tname]`,
    /// 0-based half-open per the BED spec, converted to 1-based inclusive).
    pub fn load_bed<R: BufRead>(
        &mut self,
        reader: R,
        store: &crate::store::Store,
    ) -> Result<usize, crate::err::IngestError> {
        let mut n = 0usize;
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() || line.starts_with('#') || line.starts_with("track") {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 3 {
                return Err(crate::err::IngestError::MalformedAnnotation(format!(
                    "BED line has fewer than 3 columns: {line}"
                )));
            }
            let chr = crate::common::chrom::standardize(cols[0]);
            let start: i64 = cols[1]
                .parse::<i64>()
                .map_err(|_| crate::err::IngestError::MalformedAnnotation(line.clone()))?
                + 1;
            let end: i64 = cols[2]
                .parse()
                .map_err(|_| crate::err::IngestError::MalformedAnnotation(line.clone()))?;
            let name = cols.get(3).copied().unwrap_or("blacklist");
            let id = store
                .insert_blacklist(name, &chr, start, end)
                .map_err(|e| crate::err::IngestError::Store(e))?;
            self.insert(&chr, start, end, id);
            n += 1;
        }
        Ok(n)
    }

    /// Load blacklist entries from a GFF3/GTF stream, filtered to a
    /// `feature` type and an optional `attribute=value` pair (matches the
    /// reference's default `gene_type=processed_pseudogene`/`tag=retrogene`
    /// filtering, generalized to one attribute check here; see
    /// `original_source/src/gff.c`).
    pub fn load_gff<R: BufRead>(
        &mut self,
        reader: R,
        feature: &str,
        attribute: Option<(&str, &str)>,
        store: &crate::store::Store,
    ) -> Result<usize, crate::err::IngestError> {
        let mut n = 0usize;
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 9 {
                continue;
            }
            if cols[2] != feature {
                continue;
            }
            if let Some((key, value)) = attribute {
                if !attribute_matches(cols[8], key, value) {
                    continue;
                }
            }
            let chr = crate::common::chrom::standardize(cols[0]);
            let start: i64 = cols[3]
                .parse()
                .map_err(|_| crate::err::IngestError::MalformedAnnotation(line.clone()))?;
            let end: i64 = cols[4]
                .parse()
                .map_err(|_| crate::err::IngestError::MalformedAnnotation(line.clone()))?;
            let id = store
                .insert_blacklist(feature, &chr, start, end)
                .map_err(|e| crate::err::IngestError::Store(e))?;
            self.insert(&chr, start, end, id);
            n += 1;
        }
        Ok(n)
    }
}

/// Matches `key "value"` or `key=value` style GFF3/GTF attribute column entries.
fn attribute_matches(attrs: &str, key: &str, value: &str) -> bool {
    attrs.split(';').any(|field| {
        let field = field.trim();
        if let Some(rest) = field.strip_prefix(key) {
            let rest = rest.trim_start();
            let rest = rest.strip_prefix('=').unwrap_or(rest);
            let rest = rest.trim().trim_matches('"');
            rest == value
        } else {
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn bed_lookup_finds_overlap() {
        let store = crate::store::Store::open_in_memory().unwrap();
        let mut bl = Blacklist::new();
        let bed = "chr1\t999\t2000\tregion_a\n";
        bl.load_bed(Cursor::new(bed), &store).unwrap();
        let hits = bl.lookup("chr1", 1500, 1600, 0);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn no_overlap_returns_empty() {
        let store = crate::store::Store::open_in_memory().unwrap();
        let mut bl = Blacklist::new();
        bl.load_bed(Cursor::new("chr1\t0\t100\n"), &store).unwrap();
        assert!(bl.lookup("chr1", 1000, 2000, 0).is_empty());
    }

    #[test]
    fn gff_filters_by_feature_and_attribute() {
        let store = crate::store::Store::open_in_memory().unwrap();
        let mut bl = Blacklist::new();
        let gff = "chr2\tsrc\tgene\t100\t200\t.\t+\t.\tgene_type=processed_pseudogene;tag=retrogene\n\
                   chr2\tsrc\tgene\t300\t400\t.\t+\t.\tgene_type=protein_coding\n";
        let n = bl
            .load_gff(
                Cursor::new(gff),
                "gene",
                Some(("gene_type", "processed_pseudogene")),
                &store,
            )
            .unwrap();
        assert_eq!(n, 1);
        assert!(bl.lookup("chr2", 300, 400, 0).is_empty());
        assert!(!bl.lookup("chr2", 100, 200, 0).is_empty());
    }
}
