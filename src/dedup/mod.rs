//! Deduplicator (§4.3), grounded on `original_source/src/dedup.c`.
//!
//! Alignments are read ordered by `(source_id, chr, pos, chr_next,
//! pos_next, qname)`. Consecutive rows that agree on every field except
//! `id`/`qname` form a duplicate-candidate group; within a group, rows that
//! also share a `qname` are the two mates of one physical fragment and
//! belong to the same equivalence class rather than starting a new one.
//! The first fragment encountered is primary; every other fragment in the
//! group has its `alignment.type` reset to `NONE`.

use crate::err::StoreError;
use crate::model::Alignment;
use crate::store::Store;

/// Dedup key: every column the reference's `dedup_data_is_dup` compares,
/// excluding `id` and `qname`.
fn dedup_key(a: &Alignment) -> (i64, &str, i64, &str, i64) {
    (a.source_id, a.chr.as_str(), a.pos, a.chr_next.as_str(), a.pos_next)
}

/// Run deduplication against `store`, marking duplicate alignments `type = NONE`.
/// Returns the number of alignments marked as duplicates.
pub fn dedup(store: &Store) -> Result<usize, StoreError> {
    let alignments = store.fetch_alignments_for_dedup()?;
    let mut marked = 0usize;

    let mut i = 0usize;
    while i < alignments.len() {
        let key = dedup_key(&alignments[i]);
        let mut j = i + 1;
        while j < alignments.len() && dedup_key(&alignments[j]) == key {
            j += 1;
        }
        // [i, j) is one equivalence class by (source, chr, pos, chr_next, pos_next).
        // Within it, group by qname so both mates of a fragment stay together;
        // the first qname seen is primary, every other qname in the group is a dup.
        let mut seen_primary_qname: Option<&str> = None;
        for a in &alignments[i..j] {
            match seen_primary_qname {
                None => seen_primary_qname = Some(a.qname.as_str()),
                Some(primary) if primary == a.qname => {
                    // second mate of the primary fragment, not a duplicate
                }
                Some(_) => {
                    store.mark_alignment_none(a.id)?;
                    marked += 1;
                }
            }
        }
        i = j;
    }
    Ok(marked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AbnormalType;
    use pretty_assertions::assert_eq;

    fn aln(qname: &str, pos: i64, source_id: i64) -> Alignment {
        Alignment {
            id: 0,
            qname: qname.to_string(),
            flag: 0x1,
            chr: "chr1".to_string(),
            pos,
            mapq: 60,
            cigar: "100M".to_string(),
            qlen: 100,
            rlen: 100,
            chr_next: "chr2".to_string(),
            pos_next: 500,
            r#type: AbnormalType::DISTANCE,
            source_id,
        }
    }

    #[test]
    fn marks_all_but_first_fragment_as_none() {
        let store = Store::open_in_memory().unwrap();
        let batch_id = store.insert_batch(chrono::Utc::now()).unwrap();
        let source_id = store.insert_source(batch_id, "a.bam").unwrap();

        // Two mates (r1) of one fragment, plus three duplicate fragments (r2..r4).
        let ids: Vec<i64> = ["r1", "r1", "r2", "r3", "r4"]
            .iter()
            .map(|q| store.insert_alignment(&aln(q, 100, source_id)).unwrap())
            .collect();

        let marked = dedup(&store).unwrap();
        assert_eq!(marked, 3);

        let remaining = store.fetch_alignments_for_dedup().unwrap();
        let remaining_ids: Vec<i64> = remaining.iter().map(|a| a.id).collect();
        assert!(remaining_ids.contains(&ids[0]));
        assert!(remaining_ids.contains(&ids[1]));
        assert_eq!(remaining.len(), 2);
    }

    #[test]
    fn idempotent_on_second_run() {
        let store = Store::open_in_memory().unwrap();
        let batch_id = store.insert_batch(chrono::Utc::now()).unwrap();
        let source_id = store.insert_source(batch_id, "a.bam").unwrap();
        for q in ["r1", "r1", "r2", "r3"] {
            store.insert_alignment(&aln(q, 100, source_id)).unwrap();
        }
        let first = dedup(&store).unwrap();
        let second = dedup(&store).unwrap();
        assert_eq!(first, 2);
        assert_eq!(second, 0);
    }

    #[test]
    fn distinct_positions_are_not_duplicates() {
        let store = Store::open_in_memory().unwrap();
        let batch_id = store.insert_batch(chrono::Utc::now()).unwrap();
        let source_id = store.insert_source(batch_id, "a.bam").unwrap();
        store.insert_alignment(&aln("r1", 100, source_id)).unwrap();
        store.insert_alignment(&aln("r2", 200, source_id)).unwrap();
        assert_eq!(dedup(&store).unwrap(), 0);
    }
}
