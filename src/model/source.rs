//! The `Batch`/`Source` entities (§3): an input BAM and the ingest run that
//! produced it.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub id: i64,
    pub batch_id: i64,
    pub path: String,
}
