use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Banner plus the propagated header comments of the source index.
pub fn push_header(out: &mut String, name: &str, comments: &[String]) {
    out.push_str(&format!(
        "// AUTOGENERATED FROM index-{name}.txt, ORIGINAL COMMENT FOLLOWS:\n//\n"
    ));
    for line in comments {
        out.push_str(line);
        out.push('\n');
    }
}

/// Emits `items` comma-wrapped at 80 columns under the given indent. The
/// items carry their own separators (`"161, "` and the like).
pub fn push_wrapped<I>(out: &mut String, prefix: &str, items: I)
where
    I: IntoIterator<Item = String>,
{
    const WIDTH: usize = 80;
    let mut buffered = String::new();
    for item in items {
        if prefix.len() + buffered.len() + item.len() <= WIDTH {
            buffered.push_str(&item);
        } else {
            out.push_str(prefix);
            out.push_str(buffered.trim_end());
            out.push('\n');
            buffered = item;
        }
    }
    if !buffered.is_empty() {
        out.push_str(prefix);
        out.push_str(buffered.trim_end());
        out.push('\n');
    }
}

/// Writes the finished table source in one shot, creating the crate
/// subdirectory on demand. Building the text first and writing it last
/// means a failed index never leaves a half-generated file.
pub fn write_output(out_dir: &Path, crate_dir: &str, name: &str, contents: &str) -> Result<PathBuf> {
    let dir = out_dir.join(crate_dir);
    fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create output directory {}", dir.display()))?;
    let path = dir.join(format!("{}.rs", name.replace('-', "_")));
    fs::write(&path, contents)
        .with_context(|| format!("cannot write generated index {}", path.display()))?;
    Ok(path)
}
