//! `compile_commands.json` emission.
//!
//! One entry per translation unit in registration order (entry point last), with the
//! exact argv handed to the compiler.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const COMPILE_COMMANDS_FILE: &str = "compile_commands.json";

/// How one translation unit was compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRecord {
    pub directory: PathBuf,
    pub arguments: Vec<String>,
    pub file: PathBuf,
    pub output: PathBuf,
}

pub struct CompileCommandsEmitter;

impl CompileCommandsEmitter {
    pub fn render(records: &[CompileRecord]) -> Result<String> {
        Ok(serde_json::to_string_pretty(records)?)
    }

    /// Write the database into `root`, returning its path.
    pub fn emit(records: &[CompileRecord], root: &Path) -> Result<PathBuf> {
        let path = root.join(COMPILE_COMMANDS_FILE);
        fs::write(&path, Self::render(records)?)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Vec<CompileRecord>> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
