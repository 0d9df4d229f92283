//! Compile-time feature detection.

use super::utils::run_captured;
use crate::toolchain::{CompilerFamily, CompilerProfile, ProfileSettings, profile_for};
use crate::types::MacroSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Answers "does `#include <header>` compile with these flags?".
pub struct FeatureDetector {
    profile: Box<dyn CompilerProfile>,
    scratch_dir: PathBuf,
}

impl FeatureDetector {
    pub fn new(family: CompilerFamily, settings: ProfileSettings, scratch_dir: PathBuf) -> Self {
        Self {
            profile: profile_for(family, settings),
            scratch_dir,
        }
    }

    /// Compile a one-line `#include <header>` unit. Any failure along the way means
    /// "not available": an unwritable scratch dir, a missing compiler or a compile error.
    pub fn has_header(
        &self,
        header: &str,
        macros: &MacroSet,
        include_dirs: &[String],
        extra_compile_args: &[String],
    ) -> bool {
        let header = header.trim();
        if header.is_empty() {
            return false;
        }
        if fs::create_dir_all(&self.scratch_dir).is_err() {
            return false;
        }

        let stem = format!("check_{}", sanitize(header));
        let source = self.scratch_dir.join(format!("{}.cpp", stem));
        let object = self
            .scratch_dir
            .join(format!("{}{}", stem, self.profile.object_ext()));
        if fs::write(&source, check_source(header)).is_err() {
            return false;
        }

        let args = self
            .profile
            .compile_args(&source, &object, macros, include_dirs, extra_compile_args);
        let found = run_captured(&args, &self.profile.command_env())
            .map(|output| output.status.success())
            .unwrap_or(false);

        cleanup(&[&source, &object]);
        found
    }
}

fn check_source(header: &str) -> String {
    format!(
        "#include <{}>\n\nint cxxpy_feature_check() {{ return 0; }}\n",
        header
    )
}

fn sanitize(header: &str) -> String {
    header
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn cleanup(paths: &[&Path]) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}
