//! Common functionality shared by all CLI sub commands.

pub mod chrom;
pub mod cigar;

use byte_unit::Byte;
use clap_verbosity_flag::Verbosity;

use clap::Parser;

/// Version of the crate, used in VCF headers and `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used command line arguments, flattened into every sub command.
#[derive(Parser, Debug, Clone)]
pub struct Args {
    /// Verbosity of the program.
    #[clap(flatten)]
    pub verbose: Verbosity,
}

/// Log the current memory resident set size at `DEBUG` level.
pub fn trace_rss_now() {
    let me = match procfs::process::Process::myself() {
        Ok(me) => me,
        Err(_) => return,
    };
    let page_size = procfs::page_size();
    if let Ok(stat) = me.stat() {
        tracing::debug!(
            "RSS now: {}",
            Byte::from_bytes((stat.rss * page_size) as u128).get_appropriate_unit(true)
        );
    }
}

/// Print the current memory resident set size to a `Term`, used for the "all done" banner.
pub fn print_rss_now(term: &console::Term) -> Result<(), anyhow::Error> {
    let me = procfs::process::Process::myself()?;
    let page_size = procfs::page_size();
    term.write_line(&format!(
        "RSS now: {}",
        Byte::from_bytes((me.stat()?.rss * page_size) as u128).get_appropriate_unit(true)
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
