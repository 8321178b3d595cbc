//! Ingest / `process-sample` stage (§4.10), grounded on
//! `original_source/src/process_sample.c`, `abnormal.c`, and `exon.c`.
//!
//! Indexes a GFF/GTF's protein-coding exons into a per-chromosome interval
//! tree (and the `exon` table), then scans one queryname-grouped BAM at a
//! time, classifying each read pair's abnormality and persisting the
//! abnormal alignments plus their exon overlaps.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use noodles_bam as bam;
use noodles_sam::alignment::record::cigar::op::Kind;
use noodles_sam::alignment::record::Cigar as _;

use crate::common::cigar::Cigar as ParsedCigar;
use crate::err::IngestError;
use crate::interval::IntervalTree;
use crate::model::{AbnormalType, Alignment, Exon, Overlap};
use crate::store::Store;

#[derive(Debug, Clone, Copy)]
pub struct IngestConfig {
    /// Mate distance beyond which a same-chromosome pair is abnormal
    /// (`original_source/src/process_sample.c`'s `DEFAULT_MAX_DISTANCE`).
    pub max_distance: i64,
    pub exon_frac: f64,
    pub alignment_frac: f64,
    pub either: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            max_distance: 10_000,
            exon_frac: 1e-9,
            alignment_frac: 1e-9,
            either: false,
        }
    }
}

/// One chromosome's exon interval tree, keyed by exon table id.
pub type ExonIndex = HashMap<String, IntervalTree<i64>>;

fn cigar_op_char(kind: Kind) -> char {
    match kind {
        Kind::Match => 'M',
        Kind::Insertion => 'I',
        Kind::Deletion => 'D',
        Kind::Skip => 'N',
        Kind::SoftClip => 'S',
        Kind::HardClip => 'H',
        Kind::Pad => 'P',
        Kind::SequenceMatch => '=',
        Kind::SequenceMismatch => 'X',
    }
}

fn cigar_to_string(cigar: &impl noodles_sam::alignment::record::Cigar) -> Result<String, IngestError> {
    let mut s = String::new();
    for op in cigar.iter() {
        let op = op.map_err(IngestError::Io)?;
        s.push_str(&op.len().to_string());
        s.push(cigar_op_char(op.kind()));
    }
    Ok(s)
}

/// Index an annotation file's protein-coding exons: `feature == "exon"` and
/// `transcript_type=protein_coding`, deduplicated by `exon_id`
/// (`original_source/src/abnormal.c`'s `index_dump_gff_file`).
pub fn index_gff<R: BufRead>(reader: R, store: &Store) -> Result<ExonIndex, IngestError> {
    let mut index: ExonIndex = HashMap::new();
    let mut seen_exon_ids: HashSet<String> = HashSet::new();

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 9 || cols[2] != "exon" {
            continue;
        }
        let attrs = cols[8];
        if attribute_value(attrs, "transcript_type").as_deref() != Some("protein_coding") {
            continue;
        }
        let (Some(gene_name), Some(gene_id), Some(exon_id)) = (
            attribute_value(attrs, "gene_name"),
            attribute_value(attrs, "gene_id"),
            attribute_value(attrs, "exon_id"),
        ) else {
            continue;
        };
        if !seen_exon_ids.insert(exon_id.clone()) {
            continue;
        }

        let chr = crate::common::chrom::standardize(cols[0]);
        let start: i64 = cols[3]
            .parse()
            .map_err(|_| IngestError::MalformedAnnotation(line.clone()))?;
        let end: i64 = cols[4]
            .parse()
            .map_err(|_| IngestError::MalformedAnnotation(line.clone()))?;
        let strand_forward = cols[6] != "-";

        let exon = Exon {
            id: 0,
            gene_name,
            chr: chr.clone(),
            start,
            end,
            strand_forward,
            ensg: gene_id,
            ense: exon_id,
        };
        let id = store.insert_exon(&exon)?;
        index.entry(chr).or_default().insert(start, end, id);
    }
    Ok(index)
}

fn attribute_value(attrs: &str, key: &str) -> Option<String> {
    attrs.split(';').find_map(|field| {
        let field = field.trim();
        let rest = field.strip_prefix(key)?;
        let rest = rest.trim_start();
        let rest = rest.strip_prefix('=').unwrap_or(rest);
        Some(rest.trim().trim_matches('"').to_string())
    })
}

struct PendingRead {
    qname: String,
    flag: u16,
    tid: Option<usize>,
    mtid: Option<usize>,
    pos: i64,
    mpos: i64,
    mapq: u8,
    cigar: String,
    qlen: i64,
    rlen: i64,
}

/// Classify one fragment's abnormality bits, following
/// `original_source/src/abnormal.c`'s `dump_if_abnormal`: every read must be
/// paired/mapped/mate-mapped or the whole fragment is skipped; otherwise the
/// bits are the OR, across reads, of SUPPLEMENTARY / CHROMOSOME / DISTANCE.
fn classify_fragment(reads: &[PendingRead], max_distance: i64) -> AbnormalType {
    const PAIRED: u16 = 0x1;
    const UNMAPPED: u16 = 0x4;
    const MATE_UNMAPPED: u16 = 0x8;
    const SUPPLEMENTARY: u16 = 0x800;

    for r in reads {
        if r.flag & PAIRED == 0 || r.flag & UNMAPPED != 0 || r.flag & MATE_UNMAPPED != 0 {
            return AbnormalType::NONE;
        }
    }

    let mut ty = AbnormalType::NONE;
    for r in reads {
        if r.flag & SUPPLEMENTARY != 0 {
            ty |= AbnormalType::SUPPLEMENTARY;
        }
        if r.tid != r.mtid {
            ty |= AbnormalType::CHROMOSOME;
        } else if (r.pos - r.mpos).abs() > max_distance {
            ty |= AbnormalType::DISTANCE;
        }
    }
    ty
}

fn dump_fragment(
    store: &Store,
    source_id: i64,
    reads: &[PendingRead],
    ty: AbnormalType,
    exon_index: &ExonIndex,
    header: &noodles_sam::Header,
    config: &IngestConfig,
) -> Result<(usize, usize), IngestError> {
    let mut acm = 0usize;
    let mut exonic = 0usize;

    for r in reads {
        let chr = tid_name(header, r.tid);
        let chr_next = tid_name(header, r.mtid);

        let alignment = Alignment {
            id: 0,
            qname: r.qname.clone(),
            flag: r.flag,
            chr: crate::common::chrom::standardize(&chr),
            pos: r.pos,
            mapq: r.mapq,
            cigar: r.cigar.clone(),
            qlen: r.qlen,
            rlen: r.rlen,
            chr_next: crate::common::chrom::standardize(&chr_next),
            pos_next: r.mpos,
            r#type: ty,
            source_id,
        };
        let alignment_chr = alignment.chr.clone();
        let alignment_pos = alignment.pos;
        let alignment_end = alignment.end();
        let alignment_id = store.insert_alignment(&alignment)?;
        acm += 1;

        if let Some(tree) = exon_index.get(&alignment_chr) {
            let params = crate::interval::OverlapParams {
                node_frac: config.exon_frac,
                interval_frac: config.alignment_frac,
                either: config.either,
            };
            for hit in tree.lookup(alignment_pos, alignment_end, params) {
                store.insert_overlap(&Overlap {
                    exon_id: *hit.data,
                    alignment_id,
                    pos: hit.overlap_pos,
                    len: hit.overlap_len,
                })?;
                exonic += 1;
            }
        }
    }

    Ok((acm, exonic))
}

fn tid_name(header: &noodles_sam::Header, tid: Option<usize>) -> String {
    tid.and_then(|i| header.reference_sequences().get_index(i))
        .map(|(name, _)| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_else(|| "*".to_string())
}

/// Scan one queryname-grouped BAM, dumping abnormal fragments.
/// Returns `(fragments_seen, abnormal_fragments, exonic_overlaps)`.
pub fn ingest_bam(
    store: &Store,
    source_id: i64,
    bam_path: &Path,
    exon_index: &ExonIndex,
    config: &IngestConfig,
) -> Result<(usize, usize, usize), IngestError> {
    let mut reader = bam::io::Reader::new(std::io::BufReader::new(std::fs::File::open(bam_path)?));
    let header = reader.read_header()?;

    let mut fragments = 0usize;
    let mut abnormal = 0usize;
    let mut exonic = 0usize;
    let mut stack: Vec<PendingRead> = Vec::new();

    for result in reader.records(&header) {
        let record = result?;
        let qname = record
            .name()
            .map(|n| String::from_utf8_lossy(n.as_ref()).into_owned())
            .unwrap_or_default();

        if !stack.is_empty() && stack[0].qname != qname {
            fragments += 1;
            let ty = classify_fragment(&stack, config.max_distance);
            if ty.is_eligible() {
                let (_, ex) = dump_fragment(store, source_id, &stack, ty, exon_index, &header, config)?;
                exonic += ex;
                abnormal += 1;
            }
            stack.clear();
        }

        let cigar = cigar_to_string(&record.cigar())?;
        let parsed = ParsedCigar::parse(&cigar).ok();
        let rlen = parsed.as_ref().map(|c| c.ref_len() as i64).unwrap_or(0);
        let qlen = parsed.as_ref().map(|c| c.query_len() as i64).unwrap_or(0);
        let pos = record
            .alignment_start()
            .transpose()
            .map_err(std::io::Error::other)?
            .map(|p| usize::from(p) as i64)
            .unwrap_or(0);
        let mpos = record
            .mate_alignment_start()
            .transpose()
            .map_err(std::io::Error::other)?
            .map(|p| usize::from(p) as i64)
            .unwrap_or(0);
        let tid = record
            .reference_sequence_id(&header)
            .transpose()
            .map_err(std::io::Error::other)?;
        let mtid = record
            .mate_reference_sequence_id(&header)
            .transpose()
            .map_err(std::io::Error::other)?;

        stack.push(PendingRead {
            qname,
            flag: u16::from(record.flags()),
            tid,
            mtid,
            pos,
            mpos,
            mapq: record.mapping_quality().map(|q| q.get()).unwrap_or(0),
            cigar,
            qlen,
            rlen,
        });
    }

    if !stack.is_empty() {
        fragments += 1;
        let ty = classify_fragment(&stack, config.max_distance);
        if ty.is_eligible() {
            let (_, ex) = dump_fragment(store, source_id, &stack, ty, exon_index, &header, config)?;
            exonic += ex;
            abnormal += 1;
        }
    }

    Ok((fragments, abnormal, exonic))
}

/// Top-level `process-sample` orchestration: one batch, one GFF index,
/// one source row + BAM scan per input file, all inside per-file
/// transactions.
pub fn process_sample(
    store: &Store,
    gff_path: &Path,
    bam_paths: &[std::path::PathBuf],
    config: &IngestConfig,
) -> Result<i64, IngestError> {
    let batch_id = store.insert_batch(chrono::Utc::now())?;

    let gff_reader = std::io::BufReader::new(std::fs::File::open(gff_path)?);
    let exon_index = index_gff(gff_reader, store)?;

    for bam_path in bam_paths {
        store.begin_transaction()?;
        let source_id = store.insert_source(batch_id, &bam_path.to_string_lossy())?;
        ingest_bam(store, source_id, bam_path, &exon_index, config)?;
        store.end_transaction()?;
    }

    Ok(batch_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn index_gff_dedups_by_exon_id_and_filters_protein_coding() {
        let store = Store::open_in_memory().unwrap();
        let gff = "chr1\tsrc\texon\t100\t200\t.\t+\t.\tgene_name=ABC;gene_id=ENSG1;exon_id=ENSE1;transcript_type=protein_coding\n\
                   chr1\tsrc\texon\t100\t200\t.\t+\t.\tgene_name=ABC;gene_id=ENSG1;exon_id=ENSE1;transcript_type=protein_coding\n\
                   chr1\tsrc\texon\t500\t600\t.\t+\t.\tgene_name=XYZ;gene_id=ENSG2;exon_id=ENSE2;transcript_type=lncRNA\n";
        let index = index_gff(Cursor::new(gff), &store).unwrap();
        let tree = index.get("chr1").unwrap();
        assert_eq!(tree.lookup(100, 200, Default::default()).len(), 1);
        assert!(tree.lookup(500, 600, Default::default()).is_empty());
    }

    #[test]
    fn classify_fragment_requires_paired_mapped_reads() {
        let base = PendingRead {
            qname: "r1".into(),
            flag: 0x1,
            tid: Some(0),
            mtid: Some(0),
            pos: 100,
            mpos: 200,
            mapq: 60,
            cigar: "100M".into(),
            qlen: 100,
            rlen: 100,
        };
        let unmapped = PendingRead { flag: 0x1 | 0x4, ..clone(&base) };
        assert_eq!(classify_fragment(&[unmapped], 10_000), AbnormalType::NONE);
    }

    #[test]
    fn classify_fragment_sets_distance_bit() {
        let near = PendingRead {
            qname: "r1".into(),
            flag: 0x1,
            tid: Some(0),
            mtid: Some(0),
            pos: 100,
            mpos: 200,
            mapq: 60,
            cigar: "100M".into(),
            qlen: 100,
            rlen: 100,
        };
        let far = PendingRead { pos: 1_000_000, ..clone(&near) };
        let ty = classify_fragment(&[near, far], 10_000);
        assert!(ty.contains(AbnormalType::DISTANCE));
    }

    #[test]
    fn classify_fragment_sets_chromosome_bit() {
        let r1 = PendingRead {
            qname: "r1".into(),
            flag: 0x1,
            tid: Some(0),
            mtid: Some(1),
            pos: 100,
            mpos: 200,
            mapq: 60,
            cigar: "100M".into(),
            qlen: 100,
            rlen: 100,
        };
        let r2 = PendingRead { tid: Some(1), mtid: Some(0), ..clone(&r1) };
        let ty = classify_fragment(&[r1, r2], 10_000);
        assert!(ty.contains(AbnormalType::CHROMOSOME));
    }

    fn clone(r: &PendingRead) -> PendingRead {
        PendingRead {
            qname: r.qname.clone(),
            flag: r.flag,
            tid: r.tid,
            mtid: r.mtid,
            pos: r.pos,
            mpos: r.mpos,
            mapq: r.mapq,
            cigar: r.cigar.clone(),
            qlen: r.qlen,
            rlen: r.rlen,
        }
    }
}
