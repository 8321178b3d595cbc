//! The `Overlap` entity (§3): links an `Alignment` to an overlapping `Exon`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    pub exon_id: i64,
    pub alignment_id: i64,
    pub pos: i64,
    pub len: i64,
}
