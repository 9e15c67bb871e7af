use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use tracing::info;

use crate::Options;

/// A parsed `index-<name>.txt`: the (pointer, code point) entries in file
/// order, plus the `#` header comments converted to `//` lines for the
/// generated file.
#[derive(Debug)]
pub struct IndexSource {
    pub entries: Vec<(u32, u32)>,
    pub comments: Vec<String>,
}

/// Parses an integer with an optional C-style `0x` prefix.
pub fn parse_int(s: &str) -> Result<u32> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.with_context(|| format!("`{s}` can't be parsed as a number"))
}

/// What the per-line validator may assume about the index being read.
///
/// Pointer-to-code-point indices carry one Unicode scalar per line and
/// never reach outside the BMP except into the SIP; the range-lbound
/// index instead spans all planes with pointers past 0xFFFE, so only the
/// universal rules apply to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexShape {
    PointerToScalar,
    RangeLbound,
}

fn parse_entry(line: &str, shape: IndexShape, seen: &mut HashSet<u32>) -> Result<(u32, u32)> {
    let mut parts = line.split_whitespace();
    let key = parse_int(parts.next().context("missing pointer column")?)?;
    let value = parse_int(parts.next().context("missing code point column")?)?;
    // anything after the two columns is commentary
    if shape == IndexShape::PointerToScalar {
        ensure!(key < 0xffff, "pointer {key:#x} out of range");
        ensure!(
            value < 0x110000 && value != 0xffff,
            "code point {value:#x} out of range"
        );
        if value >= 0x10000 {
            ensure!(
                value >> 16 == 2,
                "astral code point {value:#x} is outside the SIP"
            );
        }
    }
    ensure!(seen.insert(key), "duplicate pointer {key}");
    Ok((key, value))
}

pub fn parse_index(path: &Path, shape: IndexShape) -> Result<IndexSource> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot open index file {}", path.display()))?;
    let mut entries = Vec::new();
    let mut comments = Vec::new();
    let mut seen = HashSet::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            comments.push(format!("//{rest}"));
            continue;
        }
        let entry = parse_entry(line, shape, &mut seen)
            .with_context(|| format!("{}:{}: malformed index entry", path.display(), idx + 1))?;
        entries.push(entry);
    }
    Ok(IndexSource { entries, comments })
}

fn fetch(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::blocking::get(url)?.error_for_status()?;
    let mut file = fs::File::create(dest)
        .with_context(|| format!("cannot create cache file {}", dest.display()))?;
    io::copy(&mut response, &mut file)?;
    Ok(())
}

/// Locates and parses the source for one index: a committed copy next to
/// the generated output wins, then the download cache, then a fetch from
/// the WHATWG site (which populates the cache).
pub fn read_index(
    opts: &Options,
    crate_dir: &str,
    name: &str,
    shape: IndexShape,
) -> Result<IndexSource> {
    let committed = opts
        .out_dir
        .join(crate_dir)
        .join(format!("index-{name}.txt"));
    if committed.is_file() {
        return parse_index(&committed, shape);
    }

    fs::create_dir_all(&opts.cache_dir)
        .with_context(|| format!("cannot create cache directory {}", opts.cache_dir.display()))?;
    let cached = opts.cache_dir.join(format!("{name}.txt"));
    if opts.flush_cache || !cached.exists() {
        let url = format!("https://encoding.spec.whatwg.org/index-{name}.txt");
        info!("fetching {url}");
        if let Err(e) = fetch(&url, &cached) {
            // never leave a truncated download behind
            let _ = fs::remove_file(&cached);
            return Err(e.context(format!("failed to fetch index {name}")));
        }
    } else {
        info!("using cached {}", cached.display());
    }
    parse_index(&cached, shape)
}
