//! Compiler profiles
//!
//! A profile turns an abstract compile/link intent (macros, include paths, standard,
//! libraries) into the concrete argument vectors of one compiler family. The family is
//! picked once per build from the host platform; nothing else in the crate branches on
//! the platform.

pub mod gcc;
pub mod msvc;
pub mod python;
pub mod types;

pub use gcc::GccProfile;
pub use msvc::MsvcProfile;
pub use python::PythonEnv;
pub use types::{CompilerFamily, LinkRequest, ProfileSettings};

use crate::types::MacroSet;
use std::path::{Path, PathBuf};

pub trait CompilerProfile: Send + Sync {
    fn family(&self) -> CompilerFamily;

    /// Environment variables set on every compiler/linker invocation.
    fn command_env(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Full argv (program first) compiling `source` into `object`.
    fn compile_args(
        &self,
        source: &Path,
        object: &Path,
        macros: &MacroSet,
        include_dirs: &[String],
        extra_compile_args: &[String],
    ) -> Vec<String>;

    /// Argv compiling a generated plain-C translation unit (embedded resources).
    fn embed_compile_args(&self, source: &Path, object: &Path) -> Vec<String>;

    /// Where the intermediate static library named `name` lives.
    fn static_lib_path(&self, build_dir: &Path, name: &str) -> PathBuf;

    fn static_lib_args(&self, objects: &[PathBuf], archive: &Path) -> Vec<String>;

    /// Contents of a linker script restricting exports to the module entry point.
    fn export_script(&self, _module: &str) -> Option<String> {
        None
    }

    fn link_args(&self, request: &LinkRequest<'_>) -> Vec<String>;

    /// Argv of a throwaway link that must resolve every symbol the module references.
    /// `None` when the module link already rejects unresolved symbols.
    fn check_link_args(
        &self,
        _request: &LinkRequest<'_>,
        _libpython: Option<&Path>,
    ) -> Option<Vec<String>> {
        None
    }

    fn object_ext(&self) -> &'static str {
        self.family().object_ext()
    }
}

/// Instantiate the profile for `family`.
pub fn profile_for(family: CompilerFamily, settings: ProfileSettings) -> Box<dyn CompilerProfile> {
    match family {
        CompilerFamily::MSVC => Box::new(MsvcProfile::new(settings)),
        CompilerFamily::GCC => Box::new(GccProfile::new(settings)),
    }
}

/// Render an argv as a single shell-like line for logs and error reports.
pub fn render_command(args: &[String]) -> String {
    args.iter()
        .map(|a| {
            if a.is_empty() || a.contains(char::is_whitespace) {
                format!("\"{}\"", a)
            } else {
                a.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
