//! CLI subcommands (§4.11): `process-sample`, `merge-call`, `make-vcf`.

pub mod make_vcf;
pub mod merge_call;
pub mod process_sample;
