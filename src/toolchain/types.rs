use crate::types::{Library, Macro};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Supported compiler families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum CompilerFamily {
    /// Microsoft Visual C++ (cl.exe, lib.exe, link.exe)
    MSVC,
    /// GNU-style drivers (gcc/g++, ar)
    GCC,
}

impl CompilerFamily {
    /// The family used on the host platform.
    pub fn host() -> Self {
        if cfg!(windows) {
            CompilerFamily::MSVC
        } else {
            CompilerFamily::GCC
        }
    }

    /// Macros every build of this family starts out with.
    pub fn default_macros(&self) -> Vec<Macro> {
        match self {
            CompilerFamily::MSVC => [
                "_CRT_SECURE_NO_WARNINGS",
                "_CRT_NONSTDC_NO_DEPRECATE",
                "UNICODE",
                "_UNICODE",
                "_DISABLE_CONSTEXPR_MUTEX_CONSTRUCTOR",
            ]
            .iter()
            .map(|name| Macro::new(*name, Some("1".to_string())))
            .collect(),
            CompilerFamily::GCC => Vec::new(),
        }
    }

    /// Libraries appended after the user's, lowest link priority.
    pub fn system_libs(&self) -> Vec<Library> {
        match self {
            CompilerFamily::MSVC => ["gdi32", "user32", "advapi32", "ws2_32", "ntdll"]
                .iter()
                .map(|name| Library::new(*name))
                .collect(),
            CompilerFamily::GCC => Vec::new(),
        }
    }

    pub fn object_ext(&self) -> &'static str {
        match self {
            CompilerFamily::MSVC => ".obj",
            CompilerFamily::GCC => ".o",
        }
    }
}

impl fmt::Display for CompilerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilerFamily::MSVC => write!(f, "msvc"),
            CompilerFamily::GCC => write!(f, "gcc"),
        }
    }
}

/// Build-wide facts a profile needs to render flags.
#[derive(Debug, Clone)]
pub struct ProfileSettings {
    /// Language standard, e.g. `c++20`; normalised per family.
    pub standard: String,
    pub build_dir: PathBuf,
    /// `major.minor` of the target interpreter.
    pub python_version: String,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            standard: "c++20".to_string(),
            build_dir: PathBuf::from("build"),
            python_version: "3".to_string(),
        }
    }
}

/// Everything the final link of the shared module consumes.
#[derive(Debug, Clone)]
pub struct LinkRequest<'a> {
    pub module: &'a str,
    /// Objects linked directly (the entry-point object).
    pub objects: &'a [PathBuf],
    /// Static library pulled in whole.
    pub archive: Option<&'a Path>,
    pub lib_dirs: &'a [String],
    pub libs: &'a [Library],
    pub extra_link_args: &'a [String],
    /// Symbol export script written by the link stage, when the profile wants one.
    pub export_script: Option<&'a Path>,
    pub output: &'a Path,
}
