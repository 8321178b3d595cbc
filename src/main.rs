//! Retrocopy insertion caller main executable.

pub mod blacklist;
pub mod cli;
pub mod clustering;
pub mod common;
pub mod correlation;
pub mod dedup;
pub mod err;
pub mod genotype_caller;
pub mod ingest;
pub mod interval;
pub mod model;
pub mod resolver;
pub mod store;
pub mod vcf;

use clap::{Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Detect and genotype retrocopy insertions from DNA sequencing",
    long_about = "Indexes abnormal alignments from BAMs, clusters them into\
 candidate insertions, resolves retrocopies and genotypes them across a\
 cohort."
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Subcommand)]
enum Commands {
    /// Index abnormal alignments from one or more BAMs into a per-sample database.
    ProcessSample(cli::process_sample::Args),
    /// Merge per-sample databases, cluster and genotype retrocopies.
    MergeCall(cli::merge_call::Args),
    /// Emit a VCF of called retrocopies from a cohort database.
    MakeVcf(cli::make_vcf::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::ProcessSample(args) => {
                cli::process_sample::run(&cli.common, args)?;
            }
            Commands::MergeCall(args) => {
                cli::merge_call::run(&cli.common, args)?;
            }
            Commands::MakeVcf(args) => {
                cli::make_vcf::run(&cli.common, args)?;
            }
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
