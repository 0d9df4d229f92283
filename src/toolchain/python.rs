//! Target interpreter discovery.
//!
//! Asks the interpreter itself (through `sysconfig`) where its headers live and what
//! suffix extension modules must carry.

use crate::error::{BuildError, Result};
use serde::Deserialize;
use std::process::Command;

const SYSCONFIG_SCRIPT: &str = r#"import json, sys, sysconfig, os
paths = sysconfig.get_paths()
inc = [paths.get("include"), paths.get("platinclude")]
libdir = os.path.join(sys.base_prefix, "libs") if os.name == "nt" else (sysconfig.get_config_var("LIBDIR") or "")
ldlib = sysconfig.get_config_var("LDLIBRARY") or ""
print(json.dumps({
    "include_dirs": [p for p in dict.fromkeys(inc) if p],
    "ext_suffix": sysconfig.get_config_var("EXT_SUFFIX") or (".pyd" if os.name == "nt" else ".so"),
    "version": "%d.%d" % sys.version_info[:2],
    "lib_dirs": [libdir] if os.name == "nt" and libdir else [],
    "libpython": os.path.join(libdir, ldlib) if os.name != "nt" and libdir and ldlib else None,
}))"#;

/// Facts about the Python the module is built for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PythonEnv {
    pub include_dirs: Vec<String>,
    /// e.g. `.cpython-312-x86_64-linux-gnu.so` or `.cp312-win_amd64.pyd`
    pub ext_suffix: String,
    /// `major.minor`
    pub version: String,
    /// Directories holding the import library (`pythonXY.lib`), MSVC only.
    #[serde(default)]
    pub lib_dirs: Vec<String>,
    /// `LIBDIR/LDLIBRARY` on POSIX; resolves interpreter symbols in the check link.
    #[serde(default)]
    pub libpython: Option<String>,
}

impl PythonEnv {
    /// Query `$PYTHON`, else `python3`, else `python`.
    pub fn detect() -> Result<Self> {
        let mut candidates = Vec::new();
        if let Ok(explicit) = std::env::var("PYTHON") {
            candidates.push(explicit);
        }
        candidates.push("python3".to_string());
        candidates.push("python".to_string());

        for interpreter in &candidates {
            let Ok(output) = Command::new(interpreter).args(["-c", SYSCONFIG_SCRIPT]).output() else {
                continue;
            };
            if !output.status.success() {
                continue;
            }
            return Self::parse(&String::from_utf8_lossy(&output.stdout));
        }

        Err(BuildError::Configuration(format!(
            "No Python interpreter found (tried {})",
            candidates.join(", ")
        )))
    }

    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json.trim())
            .map_err(|e| BuildError::config(format!("Unreadable interpreter sysconfig output: {}", e)))
    }
}
