//! The `Retrocopy` entity and its level bitset / insertion-point tag (§3/§4.6).

use std::ops::{BitOr, BitOrAssign};

/// Classification bits assigned by the resolver's merge walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetrocopyLevel(pub u8);

impl RetrocopyLevel {
    pub const PASS: RetrocopyLevel = RetrocopyLevel(1);
    pub const OVERLAPPED_PARENTALS: RetrocopyLevel = RetrocopyLevel(2);
    pub const NEAR_PARENTALS: RetrocopyLevel = RetrocopyLevel(4);
    pub const HOTSPOT: RetrocopyLevel = RetrocopyLevel(8);
    pub const AMBIGUOUS: RetrocopyLevel = RetrocopyLevel(16);

    pub fn contains(self, other: RetrocopyLevel) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RetrocopyLevel {
    type Output = RetrocopyLevel;
    fn bitor(self, rhs: Self) -> Self::Output {
        RetrocopyLevel(self.0 | rhs.0)
    }
}

impl BitOrAssign for RetrocopyLevel {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for RetrocopyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Self::PASS) {
            parts.push("PASS");
        }
        if self.contains(Self::OVERLAPPED_PARENTALS) {
            parts.push("OVERLAPPED_PARENTALS");
        }
        if self.contains(Self::NEAR_PARENTALS) {
            parts.push("NEAR_PARENTALS");
        }
        if self.contains(Self::HOTSPOT) {
            parts.push("HOTSPOT");
        }
        if self.contains(Self::AMBIGUOUS) {
            parts.push("AMBIGUOUS");
        }
        write!(f, "{}", parts.join(","))
    }
}

/// How `insertion_point` was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionPointType {
    WindowMean,
    SupplementaryMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Retrocopy {
    pub id: i64,
    pub chr: String,
    pub window_start: i64,
    pub window_end: i64,
    pub parental_gene_name: String,
    pub level: RetrocopyLevel,
    pub insertion_point: i64,
    pub insertion_point_type: InsertionPointType,
    pub orientation_rho: Option<f64>,
    pub orientation_p_value: Option<f64>,
}

impl Retrocopy {
    /// Invariant #5: the insertion point must lie within the cluster window.
    pub fn insertion_point_in_window(&self) -> bool {
        self.insertion_point >= self.window_start && self.insertion_point <= self.window_end
    }

    /// Whether orientation is confident enough to emit POLARITY/ORHO in the VCF (§4.8).
    pub fn has_confident_orientation(&self) -> bool {
        self.level.contains(RetrocopyLevel::PASS)
            && self
                .orientation_p_value
                .map(|p| p <= 0.05)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_display_lists_set_bits() {
        let l = RetrocopyLevel::PASS | RetrocopyLevel::AMBIGUOUS;
        assert_eq!(l.to_string(), "PASS,AMBIGUOUS");
    }
}
