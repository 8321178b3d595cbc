//! Chromosome name standardization.
//!
//! Folds GRCh-style chromosome aliases ("1", "chr1", "MT", "chrX", ...) to a
//! single canonical spelling. Grounded on `chr.c`/`chr.h` from the reference
//! implementation: a case-insensitive lookup table, falling back to the
//! original (unfolded) spelling for anything it does not recognize.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Canonical autosome/sex/mito chromosome names, `chr1`..`chr22`, `chrX`, `chrY`, `chrM`.
fn alias_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m = HashMap::new();
        for n in 1..=22 {
            let canonical: &'static str = Box::leak(format!("chr{n}").into_boxed_str());
            let bare: &'static str = Box::leak(format!("{n}").into_boxed_str());
            let prefixed: &'static str = Box::leak(format!("chr{n}").to_lowercase().into_boxed_str());
            m.insert(bare, canonical);
            m.insert(prefixed, canonical);
        }
        m.insert("x", "chrX");
        m.insert("chrx", "chrX");
        m.insert("y", "chrY");
        m.insert("chry", "chrY");
        m.insert("m", "chrM");
        m.insert("chrm", "chrM");
        m.insert("mt", "chrM");
        m.insert("chrmt", "chrM");
        m
    })
}

/// Standardize a single chromosome name.
///
/// Lookup is case-insensitive; an unrecognized name is returned unchanged
/// (same spelling the caller passed in, not the lowercased form used for
/// the lookup itself).
pub fn standardize(raw: &str) -> String {
    let lower = raw.to_lowercase();
    match alias_table().get(lower.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => raw.to_string(),
    }
}

/// `true` if `chr` standardizes to one of the two haploid-in-males contigs
/// used by the genotype caller's ploidy selection (`chrY`, `chrM`).
pub fn is_haploid(chr: &str) -> bool {
    matches!(standardize(chr).as_str(), "chrY" | "chrM")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("10", "chr10")]
    #[case("chrMT", "chrM")]
    #[case("CHr11", "chr11")]
    #[case("Chrx", "chrX")]
    #[case("chr21", "chr21")]
    #[case("ponga1", "ponga1")]
    #[case("", "")]
    fn standardize_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(standardize(input), expected);
    }

    #[test]
    fn haploid_contigs() {
        assert!(is_haploid("Y"));
        assert!(is_haploid("MT"));
        assert!(is_haploid("chrM"));
        assert!(!is_haploid("chr1"));
        assert!(!is_haploid("X"));
    }
}
