//! Typed error taxonomy for the parts of the pipeline that can reasonably
//! recover (skip a record, warn) rather than aborting the whole process.
//! Everything else propagates as `anyhow::Error` out of `main`.

use std::{
    num::ParseIntError,
    process::{ExitCode, Termination},
};

/// Errors that abort the current command but are specific enough to map to
/// a distinct exit code.
#[derive(thiserror::Error, Debug, Clone)]
pub enum AppError {
    #[error("unknown contig: {0}")]
    UnknownContig(String),

    #[error("schema invariant violated: {0}")]
    InvariantViolated(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),
}

impl Termination for AppError {
    fn report(self) -> ExitCode {
        match self {
            AppError::UnknownContig(_) => ExitCode::from(1),
            AppError::MalformedInput(_) => ExitCode::from(1),
            AppError::InvariantViolated(_) => ExitCode::from(2),
        }
    }
}

/// Errors from parsing user-supplied CLI scalars (genomic intervals, etc.).
#[derive(thiserror::Error, Debug, Clone)]
pub enum ArgError {
    #[error("invalid format in interval")]
    IntervalInvalidFormat,
    #[error("invalid integer coordinates in interval")]
    IntervalInvalidInts(#[from] ParseIntError),
}

/// Errors surfaced by the relational store façade.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("schema invariant violated: {0}")]
    Invariant(String),
}

/// Errors surfaced while parsing CIGAR/GFF/BED/BAM records during ingest.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("CIGAR error: {0}")]
    Cigar(#[from] crate::common::cigar::CigarError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("malformed GFF/BED record: {0}")]
    MalformedAnnotation(String),
}
