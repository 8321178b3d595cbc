//! `AbnormalType` bitset: why an alignment was flagged for clustering.
//!
//! Grounded on `original_source/src/process_sample.c`'s abnormal-read
//! classification; kept as a plain bitset over `u8` rather than a crate
//! dependency since it is combined with `|=` the same way the `alignment`
//! table's `type` column is.

use std::ops::{BitOr, BitOrAssign};

/// Bits set on an `alignment` row's `type` column. `NONE` means the row is
/// not eligible for clustering (either never abnormal, or marked as a
/// duplicate by the deduplicator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AbnormalType(pub u8);

impl AbnormalType {
    pub const NONE: AbnormalType = AbnormalType(0);
    pub const DISTANCE: AbnormalType = AbnormalType(1);
    pub const CHROMOSOME: AbnormalType = AbnormalType(2);
    pub const SUPPLEMENTARY: AbnormalType = AbnormalType(4);
    pub const EXONIC: AbnormalType = AbnormalType(8);

    pub fn contains(self, other: AbnormalType) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_eligible(self) -> bool {
        self.0 != Self::NONE.0
    }
}

impl BitOr for AbnormalType {
    type Output = AbnormalType;
    fn bitor(self, rhs: Self) -> Self::Output {
        AbnormalType(self.0 | rhs.0)
    }
}

impl BitOrAssign for AbnormalType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combines_and_tests_bits() {
        let t = AbnormalType::DISTANCE | AbnormalType::SUPPLEMENTARY;
        assert!(t.contains(AbnormalType::DISTANCE));
        assert!(t.contains(AbnormalType::SUPPLEMENTARY));
        assert!(!t.contains(AbnormalType::CHROMOSOME));
        assert!(t.is_eligible());
        assert!(!AbnormalType::NONE.is_eligible());
    }
}
