//! The `Cluster` entity and its filter bitset (§3/§4.4).

use std::ops::{BitOr, BitOrAssign};

/// Which predicates a cluster has satisfied. Only clusters for which
/// `filter.is_passing()` survive to the retrocopy resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClusterFilter(pub u8);

impl ClusterFilter {
    pub const NONE: ClusterFilter = ClusterFilter(0);
    pub const CHR: ClusterFilter = ClusterFilter(1);
    pub const DIST: ClusterFilter = ClusterFilter(2);
    pub const REGION: ClusterFilter = ClusterFilter(4);
    pub const SUPPORT: ClusterFilter = ClusterFilter(8);

    /// The set of bits that must all be set for a cluster to pass.
    pub const ALL: ClusterFilter =
        ClusterFilter(Self::CHR.0 | Self::DIST.0 | Self::REGION.0 | Self::SUPPORT.0);

    pub fn contains(self, other: ClusterFilter) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_passing(self) -> bool {
        self.contains(Self::ALL)
    }
}

impl BitOr for ClusterFilter {
    type Output = ClusterFilter;
    fn bitor(self, rhs: Self) -> Self::Output {
        ClusterFilter(self.0 | rhs.0)
    }
}

impl BitOrAssign for ClusterFilter {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub id: i64,
    pub sid: i64,
    pub chr: String,
    pub start: i64,
    pub end: i64,
    pub gene_name: String,
    pub filter: ClusterFilter,
}

impl Cluster {
    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passing_requires_every_bit() {
        let mut f = ClusterFilter::NONE;
        assert!(!f.is_passing());
        f |= ClusterFilter::CHR | ClusterFilter::DIST | ClusterFilter::REGION;
        assert!(!f.is_passing());
        f |= ClusterFilter::SUPPORT;
        assert!(f.is_passing());
    }
}
