//! `pyproject.toml` parsing.
//!
//! Only `[project]` (name, version) and `[tool.cxxpy]` are read; every other table is
//! ignored.

use crate::error::{BuildError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const MANIFEST_FILE: &str = "pyproject.toml";

#[derive(Deserialize, Debug, Default)]
pub struct Manifest {
    pub project: ProjectConfig,
    #[serde(default)]
    pub tool: ToolTable,
}

#[derive(Deserialize, Debug, Default)]
pub struct ProjectConfig {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ToolTable {
    pub cxxpy: Option<BuildSection>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct BuildSection {
    pub main: Option<String>,
    pub sources: Vec<String>,
    /// Walked recursively for C/C++ (and, under MSVC, `.asm`) sources.
    pub source_dirs: Vec<String>,
    pub embed: Vec<String>,
    pub include_dirs: Vec<String>,
    pub lib_dirs: Vec<String>,
    pub libs: Vec<String>,
    pub static_libs: Vec<String>,
    pub macros: BTreeMap<String, MacroValue>,
    pub extra_compile_args: Vec<String>,
    pub extra_link_args: Vec<String>,
    pub std: Option<String>,
    pub jobs: Option<usize>,
    pub detect: Vec<DetectConfig>,
}

/// `NAME = true` defines without a value, `false` leaves it undefined.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum MacroValue {
    Flag(bool),
    Int(i64),
    Text(String),
}

impl MacroValue {
    /// `None` = skip, `Some(None)` = defined without value.
    pub fn definition(&self) -> Option<Option<String>> {
        match self {
            MacroValue::Flag(false) => None,
            MacroValue::Flag(true) => Some(None),
            MacroValue::Int(i) => Some(Some(i.to_string())),
            MacroValue::Text(s) => Some(Some(s.clone())),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct DetectConfig {
    pub header: String,
    pub lib: Option<String>,
    #[serde(default)]
    pub macros: BTreeMap<String, MacroValue>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            BuildError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(text).map_err(|e| {
            BuildError::config(format!("Failed to parse {}: {}", MANIFEST_FILE, e))
        })?;
        if manifest.project.name.trim().is_empty() {
            return Err(BuildError::config("[project].name must not be empty"));
        }
        Ok(manifest)
    }

    pub fn section(&self) -> BuildSection {
        self.tool.cxxpy.clone().unwrap_or_default()
    }
}
