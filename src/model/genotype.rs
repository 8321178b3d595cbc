//! The `Genotype` entity (§3/§4.7): per-(retrocopy, source) zygosity call.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ploidy {
    Haploid,
    Diploid,
}

impl Ploidy {
    pub fn as_u8(self) -> u8 {
        match self {
            Ploidy::Haploid => 1,
            Ploidy::Diploid => 2,
        }
    }

    /// Ploidy for a chromosome, per SPEC_FULL §4.7: haploid on chrY/chrM.
    pub fn for_chrom(chr: &str) -> Ploidy {
        if crate::common::chrom::is_haploid(chr) {
            Ploidy::Haploid
        } else {
            Ploidy::Diploid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Genotype {
    pub source_id: i64,
    pub retrocopy_id: i64,
    pub reference_depth: u32,
    pub alternate_depth: u32,
    pub ho_ref_likelihood: f64,
    pub he_likelihood: f64,
    pub ho_alt_likelihood: f64,
}

/// The three possible calls, chosen by argmax of the stored likelihoods
/// (SPEC_FULL §9 Open Question resolution — the VCF emitter computes this,
/// it is not itself persisted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZygosityCall {
    HomRef,
    Het,
    HomAlt,
}

impl Genotype {
    pub fn call(&self) -> ZygosityCall {
        if self.ho_ref_likelihood >= self.he_likelihood
            && self.ho_ref_likelihood >= self.ho_alt_likelihood
        {
            ZygosityCall::HomRef
        } else if self.he_likelihood >= self.ho_alt_likelihood {
            ZygosityCall::Het
        } else {
            ZygosityCall::HomAlt
        }
    }

    pub fn depth(&self) -> u32 {
        self.reference_depth + self.alternate_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_picks_argmax() {
        let g = Genotype {
            source_id: 1,
            retrocopy_id: 1,
            reference_depth: 0,
            alternate_depth: 4,
            ho_ref_likelihood: -10.0,
            he_likelihood: -3.0,
            ho_alt_likelihood: -0.5,
        };
        assert_eq!(g.call(), ZygosityCall::HomAlt);
    }
}
