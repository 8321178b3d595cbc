//! Genotype / zygosity caller (§4.7), grounded on
//! `original_source/src/genotype.c`. For each source BAM, counts
//! reference-supporting reads crossing each retrocopy's insertion point and
//! combines them with the already-clustered alternate-supporting mapqs into
//! HOM_REF/HET/HOM_ALT log-likelihoods. Re-scans run on a bounded `rayon`
//! thread pool, one task per source (SPEC_FULL §9: the reference's
//! `thpool`-based worker pool is retargeted to `rayon`).

use std::path::Path;

use noodles_bam as bam;

use crate::err::StoreError;
use crate::model::{Genotype, Ploidy, Retrocopy};
use crate::store::Store;

#[derive(Debug, Clone, Copy)]
pub struct GenotypeConfig {
    pub phred_quality: u8,
    pub threads: usize,
}

impl Default for GenotypeConfig {
    fn default() -> Self {
        GenotypeConfig {
            phred_quality: 8,
            threads: 1,
        }
    }
}

/// `p(q) = 10^(-q/10)`, the probability a base call at quality `q` is wrong.
pub fn dephred_score(q: u8) -> f64 {
    10f64.powf(-(q as f64) / 10.0)
}

/// `log10 L_HE(len, ploidy) = len * log10(1/ploidy)`.
pub fn likelihood_he(len: usize, ploidy: Ploidy) -> f64 {
    len as f64 * (1.0 / ploidy.as_u8() as f64).log10()
}

/// `log10 L_HO`, symmetric between "this is the only allele" (`same`) and
/// "this is the other allele" (`other`) mapqs.
pub fn likelihood_ho(same: &[u8], other: &[u8], ploidy: Ploidy) -> f64 {
    let n = (same.len() + other.len()) as f64;
    let mut ll = n * (1.0 / ploidy.as_u8() as f64).log10();
    for &q in same {
        ll += (ploidy.as_u8() as f64 * (1.0 - dephred_score(q))).log10();
    }
    for &q in other {
        ll += (ploidy.as_u8() as f64 * dephred_score(q)).log10();
    }
    ll
}

/// Compute all three likelihoods for one retrocopy/source pair.
pub fn likelihoods(alt_mapqs: &[u8], ref_mapqs: &[u8], ploidy: Ploidy) -> (f64, f64, f64) {
    let n = alt_mapqs.len() + ref_mapqs.len();
    let he = likelihood_he(n, ploidy);
    let ho_ref = likelihood_ho(ref_mapqs, alt_mapqs, ploidy);
    let ho_alt = likelihood_ho(alt_mapqs, ref_mapqs, ploidy);
    (ho_ref, he, ho_alt)
}

/// A minimal read-record view, abstracted from the noodles record type so
/// the crossing-point filter (§4.7) can be unit tested without a BAM file.
#[derive(Debug, Clone, Copy)]
pub struct ReadSpan {
    pub flag: u16,
    pub mapq: u8,
    pub start: i64,
    pub end: i64,
}

/// The flag/mapq/window filter from `original_source/src/genotype.c`'s
/// `cross_insertion_point`: paired, proper pair, mapped, mate mapped, not
/// duplicate, not supplementary, mapq above threshold, and the read's
/// reference span strictly covers the insertion point.
pub fn crosses_insertion_point(read: &ReadSpan, insertion_point: i64, phred_quality: u8) -> bool {
    const PAIRED: u16 = 0x1;
    const PROPER_PAIR: u16 = 0x2;
    const UNMAPPED: u16 = 0x4;
    const MATE_UNMAPPED: u16 = 0x8;
    const DUPLICATE: u16 = 0x400;
    const SUPPLEMENTARY: u16 = 0x800;

    read.flag & PAIRED != 0
        && read.flag & PROPER_PAIR != 0
        && read.flag & UNMAPPED == 0
        && read.flag & MATE_UNMAPPED == 0
        && read.flag & DUPLICATE == 0
        && read.flag & SUPPLEMENTARY == 0
        && read.mapq as u32 >= phred_quality as u32
        && read.start <= insertion_point
        && read.end >= insertion_point
}

/// Scan one source BAM for reference-supporting reads crossing each
/// retrocopy's insertion point, using the BAM index (`{path}.bai`) when
/// present to query each window directly, and falling back to a single
/// linear scan otherwise (§4.7).
pub fn scan_source(
    bam_path: &Path,
    retrocopies: &[(i64, String, i64)],
    phred_quality: u8,
) -> Result<std::collections::HashMap<i64, Vec<u8>>, std::io::Error> {
    let mut out: std::collections::HashMap<i64, Vec<u8>> = std::collections::HashMap::new();
    let index_path = bam_path.with_extension("bam.bai");

    let mut reader = bam::io::Reader::new(std::io::BufReader::new(std::fs::File::open(bam_path)?));
    let header = reader.read_header()?;

    if let Ok(index) = bam::bai::read(&index_path) {
        for (retrocopy_id, chr, insertion_point) in retrocopies {
            let Ok(region) = format!("{chr}:{insertion_point}-{insertion_point}").parse() else {
                continue;
            };
            let Ok(query) = reader.query(&header, &index, &region) else {
                continue;
            };
            for record in query.flatten() {
                collect_hit(&record, *insertion_point, phred_quality, *retrocopy_id, chr, &header, &mut out);
            }
        }
    } else {
        for result in reader.records(&header) {
            let record = result?;
            for (retrocopy_id, chr, insertion_point) in retrocopies {
                collect_hit(&record, *insertion_point, phred_quality, *retrocopy_id, chr, &header, &mut out);
            }
        }
    }

    Ok(out)
}

fn collect_hit(
    record: &bam::Record,
    insertion_point: i64,
    phred_quality: u8,
    retrocopy_id: i64,
    chr: &str,
    header: &noodles_sam::Header,
    out: &mut std::collections::HashMap<i64, Vec<u8>>,
) {
    let Some(Ok(record_ref_id)) = record.reference_sequence_id(header) else {
        return;
    };
    let Some((name, _)) = header.reference_sequences().get_index(record_ref_id) else {
        return;
    };
    if name.as_slice() != chr.as_bytes() {
        return;
    }
    let Some(Ok(start)) = record.alignment_start() else {
        return;
    };
    let ref_len = record
        .cigar()
        .alignment_span()
        .unwrap_or(0) as i64;
    let span = ReadSpan {
        flag: u16::from(record.flags()),
        mapq: record.mapping_quality().map(|q| q.get()).unwrap_or(0),
        start: usize::from(start) as i64,
        end: usize::from(start) as i64 + ref_len - 1,
    };
    if crosses_insertion_point(&span, insertion_point, phred_quality) {
        out.entry(retrocopy_id).or_default().push(span.mapq);
    }
}

/// Top-level orchestration (§4.7/§5): builds the read-only retrocopy map,
/// then re-scans every source BAM on a bounded `rayon` thread pool. A
/// `rusqlite::Connection` is `Send` but not `Sync`, so `&Store` cannot be
/// shared across worker threads (it would need `Store: Sync`, which it
/// isn't). Instead the database path is resolved once up front and each
/// task opens its own connection to it, matching the reference's
/// one-task-per-source worker pool (each with its own `sqlite3*` handle).
pub fn genotype(
    store: &Store,
    retrocopies: &[Retrocopy],
    config: &GenotypeConfig,
) -> Result<(), StoreError> {
    let sources = store.fetch_sources()?;
    let windows: Vec<(i64, String, i64)> = retrocopies
        .iter()
        .map(|rc| (rc.id, rc.chr.clone(), rc.insertion_point))
        .collect();
    let db_path = store.path().map(|p| p.to_path_buf()).ok_or_else(|| {
        StoreError::Invariant("genotype calling requires an on-disk store".to_string())
    })?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.max(1))
        .build()
        .expect("failed to build genotype worker pool");

    let results: Vec<Result<(), StoreError>> = pool.install(|| {
        use rayon::prelude::*;
        sources
            .par_iter()
            .map(|source| -> Result<(), StoreError> {
                let worker_store = Store::open(&db_path)?;
                let ref_counts = scan_source(Path::new(&source.path), &windows, config.phred_quality)
                    .unwrap_or_default();

                for rc in retrocopies {
                    let ploidy = Ploidy::for_chrom(&rc.chr);
                    let alt_mapqs: Vec<u8> = worker_store
                        .fetch_cluster_merging_alignments_mapqs(rc.id, source.id)
                        .unwrap_or_default();
                    let ref_mapqs = ref_counts.get(&rc.id).cloned().unwrap_or_default();
                    let (ho_ref, he, ho_alt) = likelihoods(&alt_mapqs, &ref_mapqs, ploidy);

                    let genotype = Genotype {
                        source_id: source.id,
                        retrocopy_id: rc.id,
                        reference_depth: ref_mapqs.len() as u32,
                        alternate_depth: alt_mapqs.len() as u32,
                        ho_ref_likelihood: ho_ref,
                        he_likelihood: he,
                        ho_alt_likelihood: ho_alt,
                    };
                    worker_store.insert_genotype(&genotype)?;
                }
                Ok(())
            })
            .collect()
    });

    for r in results {
        r?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn likelihood_sanity_equal_mapqs_favor_het() {
        let (ho_ref, he, ho_alt) = likelihoods(&[30, 30], &[30, 30], Ploidy::Diploid);
        assert!(he > ho_ref);
        assert!(he > ho_alt);
    }

    #[test]
    fn no_alt_support_favors_hom_ref() {
        let (ho_ref, he, ho_alt) = likelihoods(&[], &[40, 40, 40, 40], Ploidy::Diploid);
        assert!(ho_ref > he);
        assert!(he > ho_alt);
    }

    #[test]
    fn scenario_six_favors_hom_alt() {
        // SPEC_FULL §8 scenario 6: 4 alt mapqs of 40, 0 ref reads, diploid.
        let (ho_ref, he, ho_alt) = likelihoods(&[40, 40, 40, 40], &[], Ploidy::Diploid);
        assert!(ho_alt > he);
        assert!(he > ho_ref);
    }

    #[test]
    fn dephred_matches_phred_definition() {
        assert!(approx_eq!(f64, dephred_score(10), 0.1, epsilon = 1e-9));
        assert!(approx_eq!(f64, dephred_score(20), 0.01, epsilon = 1e-9));
    }

    #[test]
    fn crossing_filter_rejects_duplicates_and_low_mapq() {
        let good = ReadSpan {
            flag: 0x1 | 0x2,
            mapq: 30,
            start: 90,
            end: 110,
        };
        assert!(crosses_insertion_point(&good, 100, 8));

        let dup = ReadSpan { flag: good.flag | 0x400, ..good };
        assert!(!crosses_insertion_point(&dup, 100, 8));

        let low_mapq = ReadSpan { mapq: 1, ..good };
        assert!(!crosses_insertion_point(&low_mapq, 100, 8));

        let outside = ReadSpan { start: 200, end: 250, ..good };
        assert!(!crosses_insertion_point(&outside, 100, 8));
    }
}
