//! `make-vcf` sub command (§4.11), grounded on
//! `original_source/src/make_vcf.c`/`vcf.c`.

use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;

use crate::store::Store;
use crate::vcf::{build_header, write_records};

/// Command line arguments for the `make-vcf` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Emit a VCF of called retrocopies", long_about = None)]
pub struct Args {
    /// Cohort database produced by `merge-call`.
    #[arg(long)]
    pub input_file: PathBuf,
    /// Output directory for the VCF.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Output file prefix.
    #[arg(long, default_value = "out")]
    pub prefix: String,
}

pub fn run(_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!(">>> Make VCF step <<<");
    std::fs::create_dir_all(&args.output_dir)?;

    let store = Store::open(&args.input_file)?;
    let sources = store.fetch_sources()?;
    let sample_names: Vec<String> = sources.iter().map(|s| s.path.clone()).collect();
    let header = build_header(&sample_names);

    let vcf_path = args.output_dir.join(format!("{}.vcf", args.prefix));
    tracing::info!(vcf_path = %vcf_path.display(), "write retrocopy calls");
    let file = std::fs::File::create(&vcf_path)?;
    let mut writer = noodles_vcf::io::Writer::new(BufWriter::new(file));
    writer.write_header(&header)?;
    write_records(&mut writer, &header, &store)?;

    Ok(())
}
