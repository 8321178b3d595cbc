//! Domain types shared across the pipeline: the entities of §3 (DATA MODEL)
//! and the bitsets/enums that tag them.

pub mod abnormal;
pub mod alignment;
pub mod cluster;
pub mod exon;
pub mod genotype;
pub mod overlap;
pub mod retrocopy;
pub mod source;

pub use abnormal::AbnormalType;
pub use alignment::Alignment;
pub use cluster::{Cluster, ClusterFilter};
pub use exon::Exon;
pub use genotype::{Genotype, Ploidy, ZygosityCall};
pub use overlap::Overlap;
pub use retrocopy::{InsertionPointType, Retrocopy, RetrocopyLevel};
pub use source::{Batch, Source};
