//! `merge-call` sub command (§4.11), grounded on
//! `original_source/src/merge_call.c`/`db_merge.c`: merges per-sample
//! databases produced by `process-sample` into one cohort database, then
//! runs dedup, clustering, the retrocopy resolver and the genotype caller.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;

use crate::blacklist::Blacklist;
use crate::clustering::{cluster, ClusteringConfig};
use crate::dedup::dedup;
use crate::genotype_caller::{genotype, GenotypeConfig};
use crate::model::Overlap;
use crate::resolver::resolve;
use crate::store::Store;

/// Command line arguments for the `merge-call` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Merge per-sample databases and call retrocopies", long_about = None)]
pub struct Args {
    /// Per-sample databases produced by `process-sample`.
    #[arg(long = "input-file", required = true, num_args = 1..)]
    pub input_files: Vec<PathBuf>,
    /// Output directory for the cohort database.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Output file prefix.
    #[arg(long, default_value = "out")]
    pub prefix: String,
    /// Sqlite page cache size, in KiB.
    #[arg(long, default_value_t = 2_000)]
    pub cache_size: i64,
    /// DBSCAN neighbourhood radius.
    #[arg(long, default_value_t = 300)]
    pub eps: i64,
    /// DBSCAN minimum points for a core point.
    #[arg(long, default_value_t = 10)]
    pub min_pts: usize,
    /// Minimum per-source alignment count to trigger re-clustering.
    #[arg(long, default_value_t = 1)]
    pub support: usize,
    /// Chromosomes excluded entirely (e.g. mitochondrial).
    #[arg(long = "blacklist-chr", default_value = "chrM")]
    pub blacklist_chr: Vec<String>,
    /// Maximum distance between a cluster and its parental gene.
    #[arg(long, default_value_t = 1_000_000)]
    pub parental_distance: i64,
    /// Optional BED file of blacklisted regions.
    #[arg(long)]
    pub blacklist_bed: Option<PathBuf>,
    /// Optional GFF/GTF file of blacklisted regions (e.g. pseudogenes).
    #[arg(long)]
    pub blacklist_gff: Option<PathBuf>,
    /// Phred quality threshold for genotyping.
    #[arg(long, default_value_t = 8)]
    pub phred_quality: u8,
    /// Worker threads for BAM re-scans.
    #[arg(long, default_value_t = 1)]
    pub threads: usize,
}

/// Copy every row of `input`'s `exon`/`alignment`/`overlapping` tables into
/// `cohort`, remapping exon/alignment ids (`db_merge.c`'s per-table copy
/// loop). Exons are deduplicated across every merged input by their
/// Ensembl exon id (`ense`), mirroring `db_merge.c`'s `ense_h` cache, since
/// every per-sample database was indexed from the same annotation file and
/// would otherwise contribute duplicate exon rows. Each input database
/// retains its own `source` rows already tagged by `process-sample`; those
/// are copied too, under a freshly minted `batch`.
fn merge_one(
    cohort: &Store,
    input: &Store,
    batch_id: i64,
    ense_cache: &mut HashMap<String, i64>,
) -> Result<(), anyhow::Error> {
    let mut exon_id_map: HashMap<i64, i64> = HashMap::new();
    for (old_id, exon) in input.fetch_all_exons()? {
        let new_id = match ense_cache.get(&exon.ense) {
            Some(&id) => id,
            None => {
                let id = cohort.insert_exon(&exon)?;
                ense_cache.insert(exon.ense.clone(), id);
                id
            }
        };
        exon_id_map.insert(old_id, new_id);
    }

    for (old_source_id, path) in input.fetch_all_source_paths()? {
        let new_source_id = cohort.insert_source(batch_id, &path)?;

        let mut alignment_id_map: HashMap<i64, i64> = HashMap::new();
        for (old_id, mut alignment) in input.fetch_alignments_for_source(old_source_id)? {
            alignment.source_id = new_source_id;
            let new_id = cohort.insert_alignment(&alignment)?;
            alignment_id_map.insert(old_id, new_id);
        }

        for (old_exon_id, old_alignment_id, overlap) in
            input.fetch_overlaps_for_source(old_source_id)?
        {
            let (Some(&exon_id), Some(&alignment_id)) = (
                exon_id_map.get(&old_exon_id),
                alignment_id_map.get(&old_alignment_id),
            ) else {
                continue;
            };
            cohort.insert_overlap(&Overlap {
                exon_id,
                alignment_id,
                pos: overlap.pos,
                len: overlap.len,
            })?;
        }
    }

    Ok(())
}

pub fn run(_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!(">>> Merge Call step <<<");
    std::fs::create_dir_all(&args.output_dir)?;

    let db_path = args.output_dir.join(format!("{}.db", args.prefix));
    tracing::info!(db_path = %db_path.display(), "create cohort database");
    let cohort = Store::open(&db_path)?;
    cohort.set_cache_size_kib(args.cache_size)?;

    let batch_id = cohort.insert_batch(chrono::Utc::now())?;
    let mut ense_cache: HashMap<String, i64> = HashMap::new();
    cohort.begin_transaction()?;
    for input_path in &args.input_files {
        tracing::info!(input = %input_path.display(), "merge per-sample database");
        let input = Store::open(input_path)?;
        merge_one(&cohort, &input, batch_id, &mut ense_cache)?;
    }
    cohort.end_transaction()?;

    tracing::info!("deduplicate abnormal alignments");
    let marked = dedup(&cohort)?;
    tracing::info!(marked, "alignments demoted to type=NONE");

    let mut blacklist = Blacklist::new();
    if let Some(path) = &args.blacklist_bed {
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        blacklist.load_bed(reader, &cohort)?;
    }
    if let Some(path) = &args.blacklist_gff {
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        blacklist.load_gff(
            reader,
            "gene",
            Some(("gene_type", "processed_pseudogene")),
            &cohort,
        )?;
    }

    let clustering_config = ClusteringConfig {
        eps: args.eps,
        min_pts: args.min_pts,
        support: args.support,
        blacklist_chr: args.blacklist_chr.iter().cloned().collect(),
        parental_distance: args.parental_distance,
    };

    tracing::info!("run clustering engine");
    let n_clusters = cluster(&cohort, &clustering_config, &blacklist)?;
    tracing::info!(n_clusters, "pass-1 clusters discovered");

    tracing::info!("resolve retrocopies");
    let retrocopy_ids = resolve(&cohort)?;
    tracing::info!(n = retrocopy_ids.len(), "retrocopies resolved");

    let retrocopies = cohort.fetch_retrocopies()?;
    let genotype_config = GenotypeConfig {
        phred_quality: args.phred_quality,
        threads: args.threads.max(1),
    };
    tracing::info!("call genotypes");
    genotype(&cohort, &retrocopies, &genotype_config)?;

    Ok(())
}
