//! Embedding arbitrary files as C byte arrays.
//!
//! `schema.json` becomes a translation unit defining
//! `unsigned char const schema_json_content[]` (NUL-terminated) and
//! `unsigned int const schema_json_size`.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// C identifier prefix derived from a file name.
pub fn symbol_name(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut name: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// C source text embedding `content` under `var`.
pub fn render_c_source(var: &str, content: &[u8]) -> String {
    let mut out = String::with_capacity(content.len() * 6 + 128);
    out.push_str("#include <stddef.h>\n");
    let _ = writeln!(out, "unsigned char const {}_content[] = {{", var);
    for chunk in content.chunks(16) {
        out.push(' ');
        for byte in chunk {
            let _ = write!(out, "0x{:02x}, ", byte);
        }
        out.push('\n');
    }
    out.push_str(" 0\n};\n");
    let _ = writeln!(
        out,
        "unsigned int const {var}_size = sizeof({var}_content) - 1;"
    );
    out
}

/// Write the generated C file for `input` into `dir`, returning its path.
pub fn write_c_source(input: &Path, dir: &Path) -> Result<PathBuf> {
    let content =
        fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let file_name = input
        .file_name()
        .context("Embedded resource has no file name")?
        .to_string_lossy();
    let c_path = dir.join(format!("{}.c", file_name));
    fs::create_dir_all(dir)?;
    fs::write(&c_path, render_c_source(&symbol_name(input), &content))
        .with_context(|| format!("Failed to write {}", c_path.display()))?;
    Ok(c_path)
}
