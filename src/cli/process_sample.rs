//! `process-sample` sub command (§4.11), grounded on
//! `original_source/src/process_sample.c`.

use std::path::PathBuf;

use clap::Parser;

use crate::ingest::{process_sample, IngestConfig};
use crate::store::Store;

/// Command line arguments for the `process-sample` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Index abnormal alignments from one or more BAMs", long_about = None)]
pub struct Args {
    /// Queryname-sorted (or to-be-sorted) input BAM files.
    #[arg(long = "input-file", required = true, num_args = 1..)]
    pub input_files: Vec<PathBuf>,
    /// Annotation file (GFF3/GTF) used to index protein-coding exons.
    #[arg(long)]
    pub annotation_file: PathBuf,
    /// Output directory for the per-sample database.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Output file prefix.
    #[arg(long, default_value = "out")]
    pub prefix: String,
    /// Sqlite page cache size, in KiB.
    #[arg(long, default_value_t = 2_000)]
    pub cache_size: i64,
    /// Maximum same-chromosome mate distance before a pair is abnormal.
    #[arg(long, default_value_t = 10_000)]
    pub max_distance: i64,
    /// Minimum fraction of the exon that must be covered by the alignment.
    #[arg(long, default_value_t = 1e-9)]
    pub exon_frac: f64,
    /// Minimum fraction of the alignment that must be covered by the exon.
    #[arg(long, default_value_t = 1e-9)]
    pub alignment_frac: f64,
    /// Relax the overlap-fraction AND to OR.
    #[arg(long, default_value_t = false)]
    pub either: bool,
}

pub fn run(_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!(">>> Process Sample step <<<");
    std::fs::create_dir_all(&args.output_dir)?;

    let db_path = args.output_dir.join(format!("{}.db", args.prefix));
    tracing::info!(db_path = %db_path.display(), "create and connect to database");
    let store = Store::open(&db_path)?;
    store.set_cache_size_kib(args.cache_size)?;

    let config = IngestConfig {
        max_distance: args.max_distance,
        exon_frac: args.exon_frac,
        alignment_frac: args.alignment_frac,
        either: args.either,
    };

    let batch_id = process_sample(&store, &args.annotation_file, &args.input_files, &config)?;
    tracing::info!(batch_id, files = args.input_files.len(), "ingest complete");

    Ok(())
}
