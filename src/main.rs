use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{Level, info, warn};

mod emit;
mod packer;
mod premap;
mod reader;
mod record;
mod search;
mod tables;
mod trie;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IndexKind {
    SingleByte,
    MultiByte,
    RangeLbound,
}

/// Every index the WHATWG encoding standard defines, with the crate
/// subdirectory its generated table belongs to. The listing is the single
/// source of truth; nothing else hard-codes an index name.
const INDICES: &[(&str, &str, IndexKind)] = &[
    ("singlebyte", "armscii-8", IndexKind::SingleByte),
    ("singlebyte", "ibm866", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-2", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-3", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-4", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-5", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-6", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-7", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-8", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-10", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-13", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-14", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-15", IndexKind::SingleByte),
    ("singlebyte", "iso-8859-16", IndexKind::SingleByte),
    ("singlebyte", "koi8-r", IndexKind::SingleByte),
    ("singlebyte", "koi8-u", IndexKind::SingleByte),
    ("singlebyte", "macintosh", IndexKind::SingleByte),
    ("singlebyte", "windows-874", IndexKind::SingleByte),
    ("singlebyte", "windows-1250", IndexKind::SingleByte),
    ("singlebyte", "windows-1251", IndexKind::SingleByte),
    ("singlebyte", "windows-1252", IndexKind::SingleByte),
    ("singlebyte", "windows-1253", IndexKind::SingleByte),
    ("singlebyte", "windows-1254", IndexKind::SingleByte),
    ("singlebyte", "windows-1255", IndexKind::SingleByte),
    ("singlebyte", "windows-1256", IndexKind::SingleByte),
    ("singlebyte", "windows-1257", IndexKind::SingleByte),
    ("singlebyte", "windows-1258", IndexKind::SingleByte),
    ("singlebyte", "x-mac-cyrillic", IndexKind::SingleByte),
    ("tradchinese", "big5", IndexKind::MultiByte),
    ("korean", "euc-kr", IndexKind::MultiByte),
    ("simpchinese", "gb18030", IndexKind::MultiByte),
    ("japanese", "jis0208", IndexKind::MultiByte),
    ("japanese", "jis0212", IndexKind::MultiByte),
    ("simpchinese", "gb18030-ranges", IndexKind::RangeLbound),
];

/// Settings shared by every generator run.
pub struct Options {
    pub flush_cache: bool,
    pub cache_dir: PathBuf,
    pub out_dir: PathBuf,
    pub max_backward_search: u32,
    pub premapping: bool,
}

fn c_style_int(s: &str) -> Result<u32, String> {
    reader::parse_int(s).map_err(|e| e.to_string())
}

/// Regenerate the lookup tables for the WHATWG legacy encoding indices
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// be quiet (only warnings and errors are printed).
    #[arg(short, long)]
    quiet: bool,

    /// redownload index sources even if a cached copy exists
    #[arg(short = 'f', long, help_heading = "Source Acquisition")]
    flush_cache: bool,

    /// directory holding downloaded index sources [default: <OUT_DIR>/.cache]
    #[arg(long, help_heading = "Source Acquisition")]
    cache_dir: Option<PathBuf>,

    /// directory the generated table sources are written to
    #[arg(short, long, default_value_os_t = PathBuf::from("src/index"))]
    out_dir: PathBuf,

    /// generate only single-byte indices
    #[arg(long, conflicts_with = "multibyte", help_heading = "Index Selection")]
    singlebyte: bool,

    /// generate only multi-byte indices
    #[arg(long, help_heading = "Index Selection")]
    multibyte: bool,

    /// max linear-scan budget of the unoptimized backward mapping for
    /// multi-byte indices
    #[arg(long, value_parser = c_style_int, default_value = "0x200", help_heading = "Table Layout")]
    max_backward_search_multibyte: u32,

    /// disable pre-mapping; trades table size for decoder performance
    #[arg(long, help_heading = "Table Layout")]
    no_premapping: bool,

    /// substrings of index names to regenerate (all indices when empty)
    filters: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet { Level::WARN } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let kind_filter = if cli.singlebyte {
        Some(IndexKind::SingleByte)
    } else if cli.multibyte {
        Some(IndexKind::MultiByte)
    } else {
        None
    };
    let opts = Options {
        flush_cache: cli.flush_cache,
        cache_dir: cli.cache_dir.unwrap_or_else(|| cli.out_dir.join(".cache")),
        out_dir: cli.out_dir,
        max_backward_search: cli.max_backward_search_multibyte,
        premapping: !cli.no_premapping,
    };

    let mut total = 0;
    let mut total_slow = 0;
    let mut generated = 0;
    for &(crate_dir, name, kind) in INDICES {
        if !cli.filters.is_empty() && !cli.filters.iter().any(|s| name.contains(s.as_str())) {
            continue;
        }
        if kind_filter.is_some_and(|k| k != kind) {
            continue;
        }
        info!("generating index {name}");
        let sizes = match kind {
            IndexKind::SingleByte => tables::generate_single_byte(&opts, crate_dir, name)?,
            IndexKind::MultiByte => tables::generate_multi_byte(&opts, crate_dir, name)?,
            IndexKind::RangeLbound => tables::generate_range_lbound(&opts, crate_dir, name)?,
        };
        info!(
            "index {name}: {} + {} ({}) = {} ({}) bytes",
            sizes.forward,
            sizes.backward,
            sizes.backward_slow,
            sizes.forward + sizes.backward,
            sizes.forward + sizes.backward_slow,
        );
        total += sizes.forward + sizes.backward;
        total_slow += sizes.forward + sizes.backward_slow;
        generated += 1;
    }
    if generated == 0 {
        warn!("no index matched the given filters");
    }
    info!("total {total} ({total_slow}) bytes");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_matches_the_standard() {
        assert_eq!(INDICES.len(), 34);
        let single = INDICES
            .iter()
            .filter(|&&(_, _, k)| k == IndexKind::SingleByte)
            .count();
        assert_eq!(single, 28);
        assert!(
            INDICES
                .iter()
                .any(|&(dir, name, _)| dir == "simpchinese" && name == "gb18030-ranges")
        );
    }

    #[test]
    fn cli_parses_the_generation_flags() {
        let cli = Cli::try_parse_from([
            "encoding-index-gen",
            "--flush-cache",
            "--multibyte",
            "--max-backward-search-multibyte",
            "0x100",
            "--no-premapping",
            "jis",
            "big5",
        ])
        .unwrap();
        assert!(cli.flush_cache && cli.multibyte && cli.no_premapping);
        assert_eq!(cli.max_backward_search_multibyte, 0x100);
        assert_eq!(cli.filters, vec!["jis", "big5"]);
    }

    #[test]
    fn kind_filters_are_mutually_exclusive() {
        assert!(
            Cli::try_parse_from(["encoding-index-gen", "--singlebyte", "--multibyte"]).is_err()
        );
    }
}
