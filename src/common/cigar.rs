//! CIGAR string grammar: `(<len><op>)+` with soft/hard clips only at read ends.

use thiserror::Error;

/// A single CIGAR operation, see the SAM spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    Match,
    Ins,
    Del,
    RefSkip,
    SoftClip,
    HardClip,
    Pad,
    SeqMatch,
    SeqMismatch,
    Back,
}

impl CigarOp {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'M' => CigarOp::Match,
            'I' => CigarOp::Ins,
            'D' => CigarOp::Del,
            'N' => CigarOp::RefSkip,
            'S' => CigarOp::SoftClip,
            'H' => CigarOp::HardClip,
            'P' => CigarOp::Pad,
            '=' => CigarOp::SeqMatch,
            'X' => CigarOp::SeqMismatch,
            'B' => CigarOp::Back,
            _ => return None,
        })
    }

    /// Whether this operation consumes reference bases.
    fn consumes_ref(self) -> bool {
        matches!(
            self,
            CigarOp::Match
                | CigarOp::Del
                | CigarOp::RefSkip
                | CigarOp::SeqMatch
                | CigarOp::SeqMismatch
        )
    }

    fn is_clip(self) -> bool {
        matches!(self, CigarOp::SoftClip | CigarOp::HardClip)
    }

    /// Whether this operation consumes query (read) bases.
    fn consumes_query(self) -> bool {
        matches!(
            self,
            CigarOp::Match
                | CigarOp::Ins
                | CigarOp::SoftClip
                | CigarOp::SeqMatch
                | CigarOp::SeqMismatch
        )
    }
}

/// A parsed CIGAR string as a sequence of `(length, op)` tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cigar(pub Vec<(u32, CigarOp)>);

#[derive(Debug, Error, Clone)]
pub enum CigarError {
    #[error("empty CIGAR string")]
    Empty,
    #[error("invalid CIGAR token at byte offset {0}")]
    InvalidToken(usize),
    #[error("soft/hard clip not at a read end")]
    ClipNotAtEnd,
}

impl Cigar {
    /// Parse and validate a CIGAR string, rejecting clips that are not at
    /// the beginning or end of the read.
    pub fn parse(raw: &str) -> Result<Self, CigarError> {
        if raw.is_empty() || raw == "*" {
            return Err(CigarError::Empty);
        }
        let mut tokens = Vec::new();
        let mut len_start = 0usize;
        let bytes = raw.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            let c = bytes[i] as char;
            if c.is_ascii_digit() {
                i += 1;
                continue;
            }
            let op = CigarOp::from_char(c).ok_or(CigarError::InvalidToken(i))?;
            let len: u32 = raw[len_start..i]
                .parse()
                .map_err(|_| CigarError::InvalidToken(len_start))?;
            tokens.push((len, op));
            i += 1;
            len_start = i;
        }
        if tokens.is_empty() || len_start != bytes.len() {
            return Err(CigarError::InvalidToken(len_start));
        }
        let cigar = Cigar(tokens);
        cigar.validate_clips()?;
        Ok(cigar)
    }

    fn validate_clips(&self) -> Result<(), CigarError> {
        for (idx, (_, op)) in self.0.iter().enumerate() {
            if op.is_clip() && idx != 0 && idx != self.0.len() - 1 {
                return Err(CigarError::ClipNotAtEnd);
            }
        }
        Ok(())
    }

    /// Reference length consumed by this CIGAR.
    pub fn ref_len(&self) -> u32 {
        self.0
            .iter()
            .filter(|(_, op)| op.consumes_ref())
            .map(|(len, _)| len)
            .sum()
    }

    /// Query (read) length consumed by this CIGAR, as used for the `qlen`
    /// column (`original_source/src/abnormal.c`'s `bam_cigar2qlen`).
    pub fn query_len(&self) -> u32 {
        self.0
            .iter()
            .filter(|(_, op)| op.consumes_query())
            .map(|(len, _)| len)
            .sum()
    }

    /// `true` if the CIGAR ends with an M operation followed by a soft/hard
    /// clip (e.g. `80M20S`), the "forward supplementary" shape used by the
    /// insertion-point mode calculation.
    pub fn ends_with_clip(&self) -> bool {
        self.0.len() >= 2
            && !self.0[self.0.len() - 2].1.is_clip()
            && matches!(self.0[self.0.len() - 2].1, CigarOp::Match)
            && self.0.last().map(|(_, op)| op.is_clip()).unwrap_or(false)
    }

    /// `true` if the CIGAR starts with a soft/hard clip followed by an M
    /// operation (e.g. `20S80M`), the "reverse supplementary" shape.
    pub fn starts_with_clip(&self) -> bool {
        self.0.len() >= 2
            && self.0[0].1.is_clip()
            && matches!(self.0[1].1, CigarOp::Match)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_simple_match() {
        let c = Cigar::parse("100M").unwrap();
        assert_eq!(c.0, vec![(100, CigarOp::Match)]);
        assert_eq!(c.ref_len(), 100);
    }

    #[test]
    fn parses_with_clips_at_ends() {
        let c = Cigar::parse("20S80M").unwrap();
        assert_eq!(c.ref_len(), 80);
        assert!(c.starts_with_clip());
        assert!(!c.ends_with_clip());

        let c = Cigar::parse("80M20S").unwrap();
        assert!(c.ends_with_clip());
        assert!(!c.starts_with_clip());
    }

    #[test]
    fn rejects_clip_in_middle() {
        assert!(matches!(
            Cigar::parse("10M5S10M"),
            Err(CigarError::ClipNotAtEnd)
        ));
    }

    #[test]
    fn rejects_malformed() {
        assert!(Cigar::parse("").is_err());
        assert!(Cigar::parse("*").is_err());
        assert!(Cigar::parse("10Q").is_err());
    }

    #[test]
    fn ref_len_ignores_insertions_and_clips() {
        let c = Cigar::parse("10S5M2I5M10H").unwrap();
        assert_eq!(c.ref_len(), 10);
    }

    #[test]
    fn query_len_counts_matches_insertions_and_soft_clips() {
        let c = Cigar::parse("10S5M2I5M10H").unwrap();
        assert_eq!(c.query_len(), 10 + 5 + 2 + 5);
    }
}
