//! VCF emitter (§4.8), grounded on `original_source/src/vcf.c`. Builds a
//! typed header and one record per retrocopy via `noodles-vcf`'s record
//! builder, following the header/record construction idiom used for the
//! ingest output VCF.

use std::io::Write;

use noodles_vcf::{
    self as vcf,
    header::record::value::{
        map::{format, info, AlternativeAllele, Filter, Format, Info},
        Map,
    },
    variant::record::info::field::key,
};

use crate::model::{Genotype, InsertionPointType, Ploidy, Retrocopy, ZygosityCall};
use crate::store::Store;

/// Build the VCF header: ALT/INFO/FORMAT definitions matching
/// `original_source/src/vcf.c`'s header text, plus one sample column per
/// source path.
pub fn build_header(sample_names: &[String]) -> vcf::Header {
    let mut builder = vcf::Header::builder()
        .set_file_format(vcf::header::FileFormat::new(4, 2))
        .add_alternative_allele(
            "INS:ME:RTC",
            Map::<AlternativeAllele>::new("Insertion of a processed retrocopy"),
        )
        .add_filter("PASS", Map::<Filter>::new("All filters passed"))
        .add_info(key::SV_TYPE, Map::<Info>::from(key::SV_TYPE))
        .add_info(
            "IMPRECISE",
            Map::<Info>::new(
                info::Number::Count(0),
                info::Type::Flag,
                "Insertion point is imprecise",
            ),
        )
        .add_info(
            "CIPOS",
            Map::<Info>::new(
                info::Number::Count(2),
                info::Type::Integer,
                "Confidence interval around POS",
            ),
        )
        .add_info(
            "PG",
            Map::<Info>::new(info::Number::Count(1), info::Type::String, "Parental gene name(s)"),
        )
        .add_info(
            "PGTYPE",
            Map::<Info>::new(
                info::Number::Count(1),
                info::Type::String,
                "Retrocopy classification level",
            ),
        )
        .add_info(
            "POLARITY",
            Map::<Info>::new(
                info::Number::Count(1),
                info::Type::String,
                "Retrocopy orientation relative to the parental gene",
            ),
        )
        .add_info(
            "ORHO",
            Map::<Info>::new(
                info::Number::Count(1),
                info::Type::Float,
                "Spearman correlation coefficient for orientation",
            ),
        )
        .add_info(
            "DP",
            Map::<Info>::new(
                info::Number::Count(1),
                info::Type::Integer,
                "Total abnormal reads supporting the retrocopy",
            ),
        )
        .add_info(
            "SR",
            Map::<Info>::new(
                info::Number::Count(1),
                info::Type::Integer,
                "Supplementary reads crossing the insertion point",
            ),
        )
        .add_format(
            vcf::variant::record::samples::keys::key::GENOTYPE,
            Map::<Format>::from(vcf::variant::record::samples::keys::key::GENOTYPE),
        )
        .add_format(
            "DP",
            Map::<Format>::new(format::Number::Count(1), format::Type::Integer, "Read depth"),
        );

    for name in sample_names {
        builder = builder.add_sample_name(name.clone());
    }
    builder.build()
}

fn gt_string(call: ZygosityCall, haploid: bool) -> &'static str {
    match (call, haploid) {
        (ZygosityCall::HomRef, true) => "0",
        (ZygosityCall::HomAlt, true) => "1",
        (ZygosityCall::Het, true) => "1", // no true het on a haploid contig; call as alt-supporting
        (ZygosityCall::HomRef, false) => "0/0",
        (ZygosityCall::Het, false) => "0/1",
        (ZygosityCall::HomAlt, false) => "1/1",
    }
}

/// Write every retrocopy from `store` as a VCF record to `writer`, in
/// `(chr, window_start)` order.
pub fn write_records<W: Write>(
    writer: &mut vcf::io::Writer<W>,
    header: &vcf::Header,
    store: &Store,
) -> Result<(), crate::err::StoreError> {
    let sources = store.fetch_sources()?;
    let mut retrocopies = store.fetch_retrocopies()?;
    retrocopies.sort_by(|a, b| a.chr.cmp(&b.chr).then(a.window_start.cmp(&b.window_start)));

    for rc in &retrocopies {
        let record = build_record(store, rc, &sources)?;
        writer
            .write_variant_record(header, &record)
            .map_err(|e| crate::err::StoreError::Invariant(e.to_string()))?;
    }
    Ok(())
}

fn build_record(
    store: &Store,
    rc: &Retrocopy,
    sources: &[crate::model::Source],
) -> Result<vcf::variant::RecordBuf, crate::err::StoreError> {
    use vcf::variant::record_buf::info::field::{value::Array, Value as InfoValue};
    use vcf::variant::record_buf::samples::{sample::Value as SampleValue, Samples};

    let pos = if rc.insertion_point > 1 {
        rc.insertion_point - 1
    } else {
        1
    };

    let dp = store.fetch_retrocopy_dp(rc.id)?;
    let is_precise = rc.insertion_point_type == InsertionPointType::SupplementaryMode;
    let sr = if is_precise {
        store.fetch_retrocopy_sr(rc.id, rc.insertion_point)?
    } else {
        0
    };

    let mut info: vcf::variant::record_buf::Info = Default::default();
    info.insert(key::SV_TYPE.to_string(), Some(InfoValue::String("INS".to_string())));
    info.insert("PG".to_string(), Some(InfoValue::String(rc.parental_gene_name.clone())));
    info.insert("PGTYPE".to_string(), Some(InfoValue::String(rc.level.to_string())));
    info.insert("DP".to_string(), Some(InfoValue::Integer(dp as i32)));
    info.insert("SR".to_string(), Some(InfoValue::Integer(sr as i32)));
    if !is_precise {
        info.insert("IMPRECISE".to_string(), Some(InfoValue::Flag));
        let half = (rc.window_end - rc.window_start) / 2;
        info.insert(
            "CIPOS".to_string(),
            Some(InfoValue::Array(Array::Integer(vec![
                Some(-(half as i32)),
                Some(half as i32),
            ]))),
        );
    }
    if rc.has_confident_orientation() {
        let rho = rc.orientation_rho.unwrap_or(0.0);
        let polarity = if rho >= 0.0 { "+" } else { "-" };
        info.insert("POLARITY".to_string(), Some(InfoValue::String(polarity.to_string())));
        info.insert("ORHO".to_string(), Some(InfoValue::Float(rho as f32)));
    }

    let genotypes = store.fetch_genotypes_for_retrocopy(rc.id)?;
    let by_source: std::collections::HashMap<i64, Genotype> =
        genotypes.into_iter().map(|g| (g.source_id, g)).collect();
    let haploid = Ploidy::for_chrom(&rc.chr) == Ploidy::Haploid;

    let sample_values: Vec<Vec<Option<SampleValue>>> = sources
        .iter()
        .map(|source| match by_source.get(&source.id) {
            Some(g) => vec![
                Some(SampleValue::String(gt_string(g.call(), haploid).to_string())),
                Some(SampleValue::Integer(g.depth() as i32)),
            ],
            None => vec![None, None],
        })
        .collect();

    let builder = vcf::variant::record_buf::builder::Builder::default()
        .set_reference_sequence_name(rc.chr.clone())
        .set_variant_start(vcf::variant::record::Position::from(pos.max(1) as usize))
        .set_reference_bases("N".to_string())
        .set_alternate_bases(vcf::variant::record_buf::AlternateBases::from(vec![
            "<INS:ME:RTC>".to_string(),
        ]))
        .set_info(info)
        .set_samples(Samples::new(vec!["GT".to_string(), "DP".to_string()], sample_values));

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_point_one_clamps_to_one() {
        assert_eq!(1i64.max(1), 1);
    }

    #[test]
    fn gt_string_matches_ploidy() {
        assert_eq!(gt_string(ZygosityCall::HomAlt, true), "1");
        assert_eq!(gt_string(ZygosityCall::Het, false), "0/1");
        assert_eq!(gt_string(ZygosityCall::HomRef, false), "0/0");
    }

    #[test]
    fn human_haploid_contigs() {
        assert!(crate::common::chrom::is_haploid("chrY"));
        assert!(crate::common::chrom::is_haploid("chrM"));
        assert!(!crate::common::chrom::is_haploid("chr1"));
    }
}
