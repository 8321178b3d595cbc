//! Relational store façade (§4.2/§6), a thin layer over a single-file
//! embedded SQL engine. Grounded on `original_source/src/db.h`'s API
//! surface (open/close/exec/prepare, per-table insert functions, explicit
//! transactions, a cache-size knob) — implemented here with `rusqlite`
//! rather than the reference's own hand-rolled SQLite wrapper.

mod schema;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::err::StoreError;
use crate::model::{
    Alignment, Batch, Cluster, ClusterFilter, Exon, Genotype, InsertionPointType, Overlap,
    Retrocopy, RetrocopyLevel, Source,
};

/// Busy-retry budget before a lock-contention error becomes fatal (§5).
const BUSY_TIMEOUT_MS: u32 = 5_000;

pub struct Store {
    conn: Connection,
    /// The file this store was opened from, if any. `None` for in-memory
    /// stores. Exposed via `path()` so the genotype caller can open one
    /// connection per worker thread instead of sharing a `Connection`
    /// (which is `Send` but not `Sync`) across threads.
    path: Option<PathBuf>,
}

impl Store {
    /// Open (creating if necessary) the database at `path`, applying schema
    /// and pragmas. A brand new file gets `user_version = 1`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// In-memory store, used by tests and by ad-hoc merges.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS as u64))?;
        conn.execute_batch(schema::SCHEMA)?;
        conn.pragma_update(None, "user_version", 1)?;
        Ok(Store { conn, path })
    }

    /// The file this store was opened from, or `None` for an in-memory
    /// store. `Path` is `Sync`, unlike `Store` itself (it wraps a
    /// `rusqlite::Connection`), so this is what a multi-threaded caller
    /// should capture to open one fresh connection per thread rather than
    /// sharing `&Store`.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// `PRAGMA cache_size` knob (negative values are KiB in SQLite).
    pub fn set_cache_size_kib(&self, kib: i64) -> Result<(), StoreError> {
        self.conn
            .pragma_update(None, "cache_size", -kib)
            .map_err(StoreError::from)
    }

    pub fn begin_transaction(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    pub fn end_transaction(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    pub fn exec(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    // --- batch / source -----------------------------------------------

    pub fn insert_batch(&self, timestamp: chrono::DateTime<chrono::Utc>) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO batch (timestamp) VALUES (?1)",
            params![timestamp.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_source(&self, batch_id: i64, path: &str) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO source (batch_id, path) VALUES (?1, ?2)",
            params![batch_id, path],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn fetch_sources(&self) -> Result<Vec<Source>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, batch_id, path FROM source")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Source {
                    id: r.get(0)?,
                    batch_id: r.get(1)?,
                    path: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- exon / alignment / overlapping --------------------------------

    pub fn insert_exon(&self, exon: &Exon) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO exon (gene_name, chr, start, end, strand, ensg, ense)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                exon.gene_name,
                exon.chr,
                exon.start,
                exon.end,
                exon.strand_forward as i64,
                exon.ensg,
                exon.ense
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_alignment(&self, a: &Alignment) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO alignment
                (qname, flag, chr, pos, mapq, cigar, qlen, rlen, chr_next, pos_next, type, source_id)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            params![
                a.qname, a.flag, a.chr, a.pos, a.mapq, a.cigar, a.qlen, a.rlen, a.chr_next,
                a.pos_next, a.r#type.0, a.source_id
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_overlap(&self, o: &Overlap) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO overlapping (exon_id, alignment_id, pos, len) VALUES (?1,?2,?3,?4)",
            params![o.exon_id, o.alignment_id, o.pos, o.len],
        )?;
        Ok(())
    }

    /// Every exon row, paired with its original id, for the cohort merge
    /// step (`db_merge.c`'s per-table copy loop).
    pub fn fetch_all_exons(&self) -> Result<Vec<(i64, Exon)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, gene_name, chr, start, end, strand, ensg, ense FROM exon")?;
        let rows = stmt
            .query_map([], |r| {
                let id: i64 = r.get(0)?;
                Ok((
                    id,
                    Exon {
                        id,
                        gene_name: r.get(1)?,
                        chr: r.get(2)?,
                        start: r.get(3)?,
                        end: r.get(4)?,
                        strand_forward: r.get::<_, i64>(5)? != 0,
                        ensg: r.get(6)?,
                        ense: r.get(7)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every source's id and path, for the cohort merge step.
    pub fn fetch_all_source_paths(&self) -> Result<Vec<(i64, String)>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, path FROM source")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every alignment belonging to `source_id`, paired with its original
    /// id, for the cohort merge step.
    pub fn fetch_alignments_for_source(
        &self,
        source_id: i64,
    ) -> Result<Vec<(i64, Alignment)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, qname, flag, chr, pos, mapq, cigar, qlen, rlen, chr_next, pos_next, type, source_id
             FROM alignment WHERE source_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![source_id], |r| {
                let id: i64 = r.get(0)?;
                Ok((
                    id,
                    Alignment {
                        id,
                        qname: r.get(1)?,
                        flag: r.get(2)?,
                        chr: r.get(3)?,
                        pos: r.get(4)?,
                        mapq: r.get(5)?,
                        cigar: r.get(6)?,
                        qlen: r.get(7)?,
                        rlen: r.get(8)?,
                        chr_next: r.get(9)?,
                        pos_next: r.get(10)?,
                        r#type: crate::model::AbnormalType(r.get(11)?),
                        source_id: r.get(12)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every overlap row belonging to an alignment of `source_id`, paired
    /// with its original exon/alignment ids, for the cohort merge step.
    pub fn fetch_overlaps_for_source(
        &self,
        source_id: i64,
    ) -> Result<Vec<(i64, i64, Overlap)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT ov.exon_id, ov.alignment_id, ov.pos, ov.len
             FROM overlapping ov
             JOIN alignment a ON a.id = ov.alignment_id
             WHERE a.source_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![source_id], |r| {
                let exon_id: i64 = r.get(0)?;
                let alignment_id: i64 = r.get(1)?;
                Ok((
                    exon_id,
                    alignment_id,
                    Overlap {
                        exon_id,
                        alignment_id,
                        pos: r.get(2)?,
                        len: r.get(3)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All alignments with `type != NONE`, ordered for the deduplicator
    /// (§4.3): `(source_id, chr, pos, chr_next, pos_next, qname)`.
    pub fn fetch_alignments_for_dedup(&self) -> Result<Vec<Alignment>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, qname, flag, chr, pos, mapq, cigar, qlen, rlen, chr_next, pos_next, type, source_id
             FROM alignment
             WHERE type != 0
             ORDER BY source_id, chr, pos, chr_next, pos_next, qname",
        )?;
        Self::collect_alignments(&mut stmt)
    }

    fn collect_alignments(
        stmt: &mut rusqlite::Statement<'_>,
    ) -> Result<Vec<Alignment>, StoreError> {
        let rows = stmt
            .query_map([], |r| {
                Ok(Alignment {
                    id: r.get(0)?,
                    qname: r.get(1)?,
                    flag: r.get(2)?,
                    chr: r.get(3)?,
                    pos: r.get(4)?,
                    mapq: r.get(5)?,
                    cigar: r.get(6)?,
                    qlen: r.get(7)?,
                    rlen: r.get(8)?,
                    chr_next: r.get(9)?,
                    pos_next: r.get(10)?,
                    r#type: crate::model::AbnormalType(r.get(11)?),
                    source_id: r.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn mark_alignment_none(&self, id: i64) -> Result<(), StoreError> {
        self.conn
            .execute("UPDATE alignment SET type = 0 WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// The pass-1 clustering stream (§4.4): distinct `(alignment, parental
    /// gene)` tuples for alignments whose mate/supplementary overlaps an
    /// exon, ordered by `(chr ASC, gene_name ASC)`. The reference computes
    /// this with a single CTE-joined SQL query; here the join and ordering
    /// are expressed directly since we already hold `Overlap`/`Exon` rows.
    pub fn fetch_pass1_candidates(&self) -> Result<Vec<(Alignment, String, String)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.qname, a.flag, a.chr, a.pos, a.mapq, a.cigar, a.qlen, a.rlen,
                    a.chr_next, a.pos_next, a.type, a.source_id, e.gene_name
             FROM alignment a
             JOIN overlapping ov ON ov.alignment_id = a.id
             JOIN exon e ON e.id = ov.exon_id
             WHERE a.type != 0
             GROUP BY a.id, e.gene_name
             ORDER BY a.chr ASC, e.gene_name ASC, a.pos ASC",
        )?;
        let rows = stmt
            .query_map([], |r| {
                let chr: String = r.get(3)?;
                let gene_name: String = r.get(13)?;
                Ok((
                    Alignment {
                        id: r.get(0)?,
                        qname: r.get(1)?,
                        flag: r.get(2)?,
                        chr: chr.clone(),
                        pos: r.get(4)?,
                        mapq: r.get(5)?,
                        cigar: r.get(6)?,
                        qlen: r.get(7)?,
                        rlen: r.get(8)?,
                        chr_next: r.get(9)?,
                        pos_next: r.get(10)?,
                        r#type: crate::model::AbnormalType(r.get(11)?),
                        source_id: r.get(12)?,
                    },
                    chr,
                    gene_name,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The union span (chr, min(start), max(end)) of each gene's exons,
    /// used by the resolver to test parental-gene overlap/proximity.
    pub fn fetch_gene_windows(&self) -> Result<std::collections::HashMap<String, (String, i64, i64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT gene_name, chr, MIN(start), MAX(end) FROM exon GROUP BY gene_name, chr",
        )?;
        let rows = stmt
            .query_map([], |r| {
                let gene: String = r.get(0)?;
                let chr: String = r.get(1)?;
                let start: i64 = r.get(2)?;
                let end: i64 = r.get(3)?;
                Ok((gene, (chr, start, end)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().collect())
    }

    // --- clustering / cluster ------------------------------------------

    pub fn insert_clustering_row(
        &self,
        cluster_id: i64,
        cluster_sid: i64,
        alignment_id: i64,
        label: i32,
        neighbors: i64,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO clustering (cluster_id, cluster_sid, alignment_id, label, neighbors)
             VALUES (?1,?2,?3,?4,?5)",
            params![cluster_id, cluster_sid, alignment_id, label, neighbors],
        )?;
        Ok(())
    }

    pub fn insert_cluster(&self, c: &Cluster) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO cluster (id, sid, chr, start, end, gene_name, filter)
             VALUES (?1,?2,?3,?4,?5,?6,?7)
             ON CONFLICT(id, sid) DO UPDATE SET
                chr=excluded.chr, start=excluded.start, end=excluded.end,
                gene_name=excluded.gene_name, filter=excluded.filter",
            params![c.id, c.sid, c.chr, c.start, c.end, c.gene_name, c.filter.0],
        )?;
        Ok(())
    }

    pub fn update_cluster_filter(&self, id: i64, sid: i64, filter: ClusterFilter) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE cluster SET filter = ?1 WHERE id = ?2 AND sid = ?3",
            params![filter.0, id, sid],
        )?;
        Ok(())
    }

    pub fn fetch_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, sid, chr, start, end, gene_name, filter FROM cluster ORDER BY chr, start, end")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Cluster {
                    id: r.get(0)?,
                    sid: r.get(1)?,
                    chr: r.get(2)?,
                    start: r.get(3)?,
                    end: r.get(4)?,
                    gene_name: r.get(5)?,
                    filter: ClusterFilter(r.get(6)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn fetch_passing_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        Ok(self
            .fetch_clusters()?
            .into_iter()
            .filter(|c| c.filter.is_passing())
            .collect())
    }

    /// Alignment ids belonging to `(cluster_id, cluster_sid)`.
    pub fn fetch_cluster_alignments(&self, id: i64, sid: i64) -> Result<Vec<Alignment>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.qname, a.flag, a.chr, a.pos, a.mapq, a.cigar, a.qlen, a.rlen,
                    a.chr_next, a.pos_next, a.type, a.source_id
             FROM alignment a
             JOIN clustering cl ON cl.alignment_id = a.id
             WHERE cl.cluster_id = ?1 AND cl.cluster_sid = ?2
             ORDER BY a.pos",
        )?;
        let rows = stmt
            .query_map(params![id, sid], |r| {
                Ok(Alignment {
                    id: r.get(0)?,
                    qname: r.get(1)?,
                    flag: r.get(2)?,
                    chr: r.get(3)?,
                    pos: r.get(4)?,
                    mapq: r.get(5)?,
                    cigar: r.get(6)?,
                    qlen: r.get(7)?,
                    rlen: r.get(8)?,
                    chr_next: r.get(9)?,
                    pos_next: r.get(10)?,
                    r#type: crate::model::AbnormalType(r.get(11)?),
                    source_id: r.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Per-source alignment counts for a cluster, used by the pass-2
    /// support filter.
    pub fn fetch_cluster_support(&self, id: i64, sid: i64) -> Result<Vec<(i64, i64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.source_id, COUNT(*)
             FROM alignment a
             JOIN clustering cl ON cl.alignment_id = a.id
             WHERE cl.cluster_id = ?1 AND cl.cluster_sid = ?2
             GROUP BY a.source_id",
        )?;
        let rows = stmt
            .query_map(params![id, sid], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn clear_clustering(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("DELETE FROM clustering; DELETE FROM cluster;")?;
        Ok(())
    }

    /// Move a clustering row onto the sub-cluster id reclustering assigned it.
    pub fn update_clustering_sid(&self, cluster_id: i64, alignment_id: i64, new_sid: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE clustering SET cluster_sid = ?3 WHERE cluster_id = ?1 AND alignment_id = ?2",
            params![cluster_id, alignment_id, new_sid],
        )?;
        Ok(())
    }

    /// Drop a clustering row, used when reclustering demotes a member to noise.
    pub fn delete_clustering_row(&self, cluster_id: i64, alignment_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM clustering WHERE cluster_id = ?1 AND alignment_id = ?2",
            params![cluster_id, alignment_id],
        )?;
        Ok(())
    }

    // --- blacklist -------------------------------------------------------

    pub fn insert_blacklist(&self, name: &str, chr: &str, start: i64, end: i64) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO blacklist (name, chr, start, end) VALUES (?1,?2,?3,?4)",
            params![name, chr, start, end],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn fetch_blacklist(&self) -> Result<Vec<(i64, String, String, i64, i64)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, chr, start, end FROM blacklist")?;
        let rows = stmt
            .query_map([], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn insert_overlapping_blacklist(
        &self,
        blacklist_id: i64,
        cluster_id: i64,
        cluster_sid: i64,
        pos: i64,
        len: i64,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO overlapping_blacklist (blacklist_id, cluster_id, cluster_sid, pos, len)
             VALUES (?1,?2,?3,?4,?5)",
            params![blacklist_id, cluster_id, cluster_sid, pos, len],
        )?;
        Ok(())
    }

    /// The exon id a given alignment overlaps, if any (first match by id).
    pub fn fetch_alignment_exon(&self, alignment_id: i64) -> Result<Option<i64>, StoreError> {
        self.conn
            .query_row(
                "SELECT exon_id FROM overlapping WHERE alignment_id = ?1 ORDER BY exon_id LIMIT 1",
                params![alignment_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(StoreError::from)
    }

    /// Ordinal rank (1-based, ascending `start`) of every exon belonging to `gene_name`.
    pub fn fetch_gene_exon_ranks(&self, gene_name: &str) -> Result<std::collections::HashMap<i64, i64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM exon WHERE gene_name = ?1 ORDER BY start ASC")?;
        let ids: Vec<i64> = stmt
            .query_map(params![gene_name], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, (i + 1) as i64))
            .collect())
    }

    // --- retrocopy / genotype ---------------------------------------------

    pub fn insert_cluster_merging(&self, retrocopy_id: i64, cluster_id: i64, cluster_sid: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO cluster_merging (retrocopy_id, cluster_id, cluster_sid) VALUES (?1,?2,?3)",
            params![retrocopy_id, cluster_id, cluster_sid],
        )?;
        Ok(())
    }

    pub fn insert_retrocopy(&self, rc: &Retrocopy) -> Result<i64, StoreError> {
        let ip_type = match rc.insertion_point_type {
            InsertionPointType::WindowMean => 1,
            InsertionPointType::SupplementaryMode => 2,
        };
        self.conn.execute(
            "INSERT INTO retrocopy
                (chr, window_start, window_end, parental_gene_name, level, insertion_point,
                 insertion_point_type, orientation_rho, orientation_p_value)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                rc.chr,
                rc.window_start,
                rc.window_end,
                rc.parental_gene_name,
                rc.level.0,
                rc.insertion_point,
                ip_type,
                rc.orientation_rho,
                rc.orientation_p_value
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn fetch_retrocopies(&self) -> Result<Vec<Retrocopy>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, chr, window_start, window_end, parental_gene_name, level, insertion_point,
                    insertion_point_type, orientation_rho, orientation_p_value
             FROM retrocopy ORDER BY chr, window_start",
        )?;
        let rows = stmt
            .query_map([], |r| {
                let ip_type: i64 = r.get(7)?;
                Ok(Retrocopy {
                    id: r.get(0)?,
                    chr: r.get(1)?,
                    window_start: r.get(2)?,
                    window_end: r.get(3)?,
                    parental_gene_name: r.get(4)?,
                    level: RetrocopyLevel(r.get(5)?),
                    insertion_point: r.get(6)?,
                    insertion_point_type: if ip_type == 2 {
                        InsertionPointType::SupplementaryMode
                    } else {
                        InsertionPointType::WindowMean
                    },
                    orientation_rho: r.get(8)?,
                    orientation_p_value: r.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Mapqs of the alignments (from a single `source_id`) backing the
    /// clusters merged into `retrocopy_id` — the alternate-allele support
    /// used by the genotype caller.
    pub fn fetch_cluster_merging_alignments_mapqs(
        &self,
        retrocopy_id: i64,
        source_id: i64,
    ) -> Result<Vec<u8>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.mapq
             FROM cluster_merging cm
             JOIN clustering cl ON cl.cluster_id = cm.cluster_id AND cl.cluster_sid = cm.cluster_sid
             JOIN alignment a ON a.id = cl.alignment_id
             WHERE cm.retrocopy_id = ?1 AND a.source_id = ?2",
        )?;
        let rows = stmt
            .query_map(params![retrocopy_id, source_id], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn insert_genotype(&self, g: &Genotype) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO genotype
                (source_id, retrocopy_id, reference_depth, alternate_depth,
                 ho_ref_likelihood, he_likelihood, ho_alt_likelihood)
             VALUES (?1,?2,?3,?4,?5,?6,?7)
             ON CONFLICT(source_id, retrocopy_id) DO UPDATE SET
                reference_depth=excluded.reference_depth,
                alternate_depth=excluded.alternate_depth,
                ho_ref_likelihood=excluded.ho_ref_likelihood,
                he_likelihood=excluded.he_likelihood,
                ho_alt_likelihood=excluded.ho_alt_likelihood",
            params![
                g.source_id,
                g.retrocopy_id,
                g.reference_depth,
                g.alternate_depth,
                g.ho_ref_likelihood,
                g.he_likelihood,
                g.ho_alt_likelihood
            ],
        )?;
        Ok(())
    }

    pub fn fetch_genotypes_for_retrocopy(&self, retrocopy_id: i64) -> Result<Vec<Genotype>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, retrocopy_id, reference_depth, alternate_depth,
                    ho_ref_likelihood, he_likelihood, ho_alt_likelihood
             FROM genotype WHERE retrocopy_id = ?1 ORDER BY source_id",
        )?;
        let rows = stmt
            .query_map(params![retrocopy_id], |r| {
                Ok(Genotype {
                    source_id: r.get(0)?,
                    retrocopy_id: r.get(1)?,
                    reference_depth: r.get(2)?,
                    alternate_depth: r.get(3)?,
                    ho_ref_likelihood: r.get(4)?,
                    he_likelihood: r.get(5)?,
                    ho_alt_likelihood: r.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Total abnormal-read depth (`DP`) backing a retrocopy, across all
    /// clusters merged into it.
    pub fn fetch_retrocopy_dp(&self, retrocopy_id: i64) -> Result<i64, StoreError> {
        self.conn
            .query_row(
                "SELECT COUNT(*)
                 FROM cluster_merging cm
                 JOIN clustering cl ON cl.cluster_id = cm.cluster_id AND cl.cluster_sid = cm.cluster_sid
                 WHERE cm.retrocopy_id = ?1",
                params![retrocopy_id],
                |r| r.get(0),
            )
            .optional()
            .map(|v| v.unwrap_or(0))
            .map_err(StoreError::from)
    }

    /// Supplementary reads crossing the insertion point (`SR`, precise calls only).
    pub fn fetch_retrocopy_sr(&self, retrocopy_id: i64, insertion_point: i64) -> Result<i64, StoreError> {
        self.conn
            .query_row(
                "SELECT COUNT(*)
                 FROM cluster_merging cm
                 JOIN clustering cl ON cl.cluster_id = cm.cluster_id AND cl.cluster_sid = cm.cluster_sid
                 JOIN alignment a ON a.id = cl.alignment_id
                 WHERE cm.retrocopy_id = ?1
                   AND (a.flag & 2048) != 0
                   AND a.pos <= ?2 AND (a.pos + a.rlen - 1) >= ?2",
                params![retrocopy_id, insertion_point],
                |r| r.get(0),
            )
            .optional()
            .map(|v| v.unwrap_or(0))
            .map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AbnormalType, Exon};

    fn sample_alignment(id: &str, pos: i64, source_id: i64) -> Alignment {
        Alignment {
            id: 0,
            qname: id.to_string(),
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
    fn round_trips_alignments_and_dedup_order() {
        let store = Store::open_in_memory().unwrap();
        let batch_id = store.insert_batch(chrono::Utc::now()).unwrap();
        let source_id = store.insert_source(batch_id, "a.bam").unwrap();
        store.insert_alignment(&sample_alignment("r1", 200, source_id)).unwrap();
        store.insert_alignment(&sample_alignment("r2", 100, source_id)).unwrap();

        let rows = store.fetch_alignments_for_dedup().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pos, 100);
        assert_eq!(rows[1].pos, 200);
    }

    #[test]
    fn mark_none_removes_from_dedup_stream() {
        let store = Store::open_in_memory().unwrap();
        let batch_id = store.insert_batch(chrono::Utc::now()).unwrap();
        let source_id = store.insert_source(batch_id, "a.bam").unwrap();
        let id = store.insert_alignment(&sample_alignment("r1", 200, source_id)).unwrap();
        store.mark_alignment_none(id).unwrap();
        assert!(store.fetch_alignments_for_dedup().unwrap().is_empty());
    }

    #[test]
    fn exon_and_overlap_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let exon_id = store
            .insert_exon(&Exon {
                id: 0,
                gene_name: "BRCA1".into(),
                chr: "chr17".into(),
                start: 100,
                end: 200,
                strand_forward: true,
                ensg: "ENSG1".into(),
                ense: "ENSE1".into(),
            })
            .unwrap();
        let batch_id = store.insert_batch(chrono::Utc::now()).unwrap();
        let source_id = store.insert_source(batch_id, "a.bam").unwrap();
        let aln_id = store
            .insert_alignment(&sample_alignment("r1", 150, source_id))
            .unwrap();
        store
            .insert_overlap(&Overlap {
                exon_id,
                alignment_id: aln_id,
                pos: 150,
                len: 10,
            })
            .unwrap();
        let candidates = store.fetch_pass1_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].2, "BRCA1");
    }
}
