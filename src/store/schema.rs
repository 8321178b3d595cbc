//! Table DDL for the relational store (§6). Kept as plain SQL strings per
//! `original_source/src/db.h`'s design: the schema *is* the contract.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS batch (
    id        INTEGER PRIMARY KEY,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS source (
    id       INTEGER PRIMARY KEY,
    batch_id INTEGER NOT NULL REFERENCES batch(id),
    path     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS exon (
    id        INTEGER PRIMARY KEY,
    gene_name TEXT NOT NULL,
    chr       TEXT NOT NULL,
    start     INTEGER NOT NULL,
    end       INTEGER NOT NULL,
    strand    INTEGER NOT NULL,
    ensg      TEXT NOT NULL,
    ense      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_exon_chr_gene ON exon(chr, gene_name);

CREATE TABLE IF NOT EXISTS alignment (
    id        INTEGER PRIMARY KEY,
    qname     TEXT NOT NULL,
    flag      INTEGER NOT NULL,
    chr       TEXT NOT NULL,
    pos       INTEGER NOT NULL,
    mapq      INTEGER NOT NULL,
    cigar     TEXT NOT NULL,
    qlen      INTEGER NOT NULL,
    rlen      INTEGER NOT NULL,
    chr_next  TEXT NOT NULL,
    pos_next  INTEGER NOT NULL,
    type      INTEGER NOT NULL,
    source_id INTEGER NOT NULL REFERENCES source(id)
);
CREATE INDEX IF NOT EXISTS idx_alignment_dedup
    ON alignment(source_id, chr, pos, chr_next, pos_next, qname);
CREATE INDEX IF NOT EXISTS idx_alignment_qname ON alignment(qname, source_id);

CREATE TABLE IF NOT EXISTS overlapping (
    exon_id       INTEGER NOT NULL REFERENCES exon(id),
    alignment_id  INTEGER NOT NULL REFERENCES alignment(id),
    pos           INTEGER NOT NULL,
    len           INTEGER NOT NULL,
    PRIMARY KEY (exon_id, alignment_id)
);
CREATE INDEX IF NOT EXISTS idx_overlapping_alignment ON overlapping(alignment_id);

CREATE TABLE IF NOT EXISTS clustering (
    cluster_id     INTEGER NOT NULL,
    cluster_sid    INTEGER NOT NULL,
    alignment_id   INTEGER NOT NULL REFERENCES alignment(id),
    label          INTEGER NOT NULL,
    neighbors      INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_clustering_cluster ON clustering(cluster_id, cluster_sid);

CREATE TABLE IF NOT EXISTS cluster (
    id        INTEGER NOT NULL,
    sid       INTEGER NOT NULL,
    chr       TEXT NOT NULL,
    start     INTEGER NOT NULL,
    end       INTEGER NOT NULL,
    gene_name TEXT NOT NULL,
    filter    INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (id, sid)
);

CREATE TABLE IF NOT EXISTS blacklist (
    id    INTEGER PRIMARY KEY,
    name  TEXT NOT NULL,
    chr   TEXT NOT NULL,
    start INTEGER NOT NULL,
    end   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_blacklist_chr ON blacklist(chr);

CREATE TABLE IF NOT EXISTS overlapping_blacklist (
    blacklist_id INTEGER NOT NULL REFERENCES blacklist(id),
    cluster_id   INTEGER NOT NULL,
    cluster_sid  INTEGER NOT NULL,
    pos          INTEGER NOT NULL,
    len          INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS cluster_merging (
    retrocopy_id INTEGER NOT NULL,
    cluster_id   INTEGER NOT NULL,
    cluster_sid  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cluster_merging_retrocopy ON cluster_merging(retrocopy_id);

CREATE TABLE IF NOT EXISTS retrocopy (
    id                    INTEGER PRIMARY KEY,
    chr                   TEXT NOT NULL,
    window_start          INTEGER NOT NULL,
    window_end            INTEGER NOT NULL,
    parental_gene_name    TEXT NOT NULL,
    level                 INTEGER NOT NULL,
    insertion_point       INTEGER NOT NULL,
    insertion_point_type  INTEGER NOT NULL,
    orientation_rho       REAL,
    orientation_p_value   REAL
);

CREATE TABLE IF NOT EXISTS genotype (
    source_id          INTEGER NOT NULL REFERENCES source(id),
    retrocopy_id       INTEGER NOT NULL REFERENCES retrocopy(id),
    reference_depth    INTEGER NOT NULL,
    alternate_depth    INTEGER NOT NULL,
    ho_ref_likelihood  REAL NOT NULL,
    he_likelihood      REAL NOT NULL,
    ho_alt_likelihood  REAL NOT NULL,
    PRIMARY KEY (source_id, retrocopy_id)
);
"#;
