//! Build artifact cleanup (`cxxpy clean`).
//!
//! Removes the build directory and the compilation database of a project root.

use super::compile_commands::COMPILE_COMMANDS_FILE;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

/// Returns whether anything was removed.
pub fn clean(root: &Path) -> Result<bool> {
    let mut cleaned = false;

    let build_dir = root.join("build");
    if build_dir.exists() {
        fs::remove_dir_all(&build_dir).context("Failed to remove build directory")?;
        cleaned = true;
    }

    let compile_commands = root.join(COMPILE_COMMANDS_FILE);
    if compile_commands.exists() {
        fs::remove_file(&compile_commands).context("Failed to remove compile commands")?;
        cleaned = true;
    }

    if cleaned {
        println!("{} Clean complete.", "✓".green());
    } else {
        println!("{} Nothing to clean", "!".yellow());
    }
    Ok(cleaned)
}
