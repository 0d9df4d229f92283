//! GCC-family profile (`gcc`/`g++`, `ar`).

use super::{CompilerFamily, CompilerProfile, LinkRequest, ProfileSettings};
use crate::build::utils::get_std_flag_gcc;
use crate::types::{Library, MacroSet};
use std::path::{Path, PathBuf};
use std::process::Command;

const CXX_WARNINGS: &[&str] = &[
    "-Wno-unknown-pragmas",
    "-Wno-unused-result",
    "-Wno-sign-compare",
];

pub struct GccProfile {
    settings: ProfileSettings,
    /// Directories searched for `lib<name>.a` when a library prefers static linking.
    static_search_dirs: Vec<PathBuf>,
}

impl GccProfile {
    pub fn new(settings: ProfileSettings) -> Self {
        Self::with_search_dirs(settings, default_static_search_dirs())
    }

    pub fn with_search_dirs(settings: ProfileSettings, static_search_dirs: Vec<PathBuf>) -> Self {
        Self {
            settings,
            static_search_dirs,
        }
    }

    fn is_c(source: &Path) -> bool {
        source.extension().is_some_and(|ext| ext == "c")
    }

    /// `lib<name>.a` from the system dirs, else `-l<name>`.
    fn library_arg(&self, lib: &Library) -> String {
        if lib.prefer_static {
            for dir in &self.static_search_dirs {
                let candidate = dir.join(format!("lib{}.a", lib.name));
                if candidate.is_file() {
                    return candidate.display().to_string();
                }
            }
        }
        format!("-l{}", lib.name)
    }
}

fn is_shared_library(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().contains(".so"))
        .unwrap_or(false)
}

/// `/usr/lib`, `/usr/lib/<triple>` (with and without `-pc-`), `/usr/local/lib`.
fn default_static_search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from("/usr/lib")];
    if let Ok(output) = Command::new("gcc").arg("-dumpmachine").output()
        && output.status.success()
    {
        let machine = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let mut triples = vec![machine.clone()];
        let stripped = machine.replace("-pc-", "-");
        if stripped != machine {
            triples.push(stripped);
        }
        for triple in triples {
            let dir = PathBuf::from("/usr/lib").join(triple);
            if dir.is_dir() {
                dirs.push(dir);
            }
        }
    }
    dirs.push(PathBuf::from("/usr/local/lib"));
    dirs
}

impl CompilerProfile for GccProfile {
    fn family(&self) -> CompilerFamily {
        CompilerFamily::GCC
    }

    fn compile_args(
        &self,
        source: &Path,
        object: &Path,
        macros: &MacroSet,
        include_dirs: &[String],
        extra_compile_args: &[String],
    ) -> Vec<String> {
        let is_c = Self::is_c(source);
        let driver = if is_c { "gcc" } else { "g++" };

        let mut args = vec![driver.to_string(), "-c".to_string()];
        args.extend(include_dirs.iter().map(|d| format!("-I{}", d)));
        args.extend(macros.iter().map(|m| format!("-D{}", m.definition())));
        args.extend(["-g", "-O2", "-fpic"].iter().map(|s| s.to_string()));
        args.extend(CXX_WARNINGS.iter().map(|s| s.to_string()));
        if !is_c {
            args.push(get_std_flag_gcc(&self.settings.standard));
        }
        args.push("-ffunction-sections".to_string());
        args.push("-fdata-sections".to_string());
        args.extend(extra_compile_args.iter().cloned());
        args.push("-o".to_string());
        args.push(object.display().to_string());
        args.push(source.display().to_string());
        args
    }

    fn embed_compile_args(&self, source: &Path, object: &Path) -> Vec<String> {
        vec![
            "gcc".to_string(),
            "-c".to_string(),
            "-fpic".to_string(),
            source.display().to_string(),
            "-o".to_string(),
            object.display().to_string(),
        ]
    }

    fn static_lib_path(&self, build_dir: &Path, name: &str) -> PathBuf {
        build_dir.join(format!("lib{}.a", name))
    }

    fn static_lib_args(&self, objects: &[PathBuf], archive: &Path) -> Vec<String> {
        let mut sorted: Vec<String> = objects.iter().map(|o| o.display().to_string()).collect();
        sorted.sort();

        let mut args = vec![
            "ar".to_string(),
            "rcs".to_string(),
            archive.display().to_string(),
        ];
        args.extend(sorted);
        args
    }

    fn export_script(&self, module: &str) -> Option<String> {
        if cfg!(target_os = "macos") {
            return None;
        }
        Some(format!(
            "{{\n global: PyInit_{};\n local: *;\n}};\n",
            module
        ))
    }

    fn check_link_args(
        &self,
        request: &LinkRequest<'_>,
        libpython: Option<&Path>,
    ) -> Option<Vec<String>> {
        if cfg!(target_os = "macos") {
            return None;
        }
        // only an existing shared libpython can join a shared link
        if let Some(lib) = libpython
            && !(is_shared_library(lib) && lib.is_file())
        {
            return None;
        }
        let mut args = self.link_args(request);
        args.push("-Wl,--no-undefined".to_string());
        args.extend(libpython.map(|lib| lib.display().to_string()));
        Some(args)
    }

    fn link_args(&self, request: &LinkRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "g++".to_string(),
            "-shared".to_string(),
            "-o".to_string(),
            request.output.display().to_string(),
        ];
        args.extend(request.objects.iter().map(|o| o.display().to_string()));
        if let Some(archive) = request.archive {
            if cfg!(target_os = "macos") {
                args.push(format!("-Wl,-force_load,{}", archive.display()));
            } else {
                args.push("-Wl,--whole-archive".to_string());
                args.push(archive.display().to_string());
                args.push("-Wl,--no-whole-archive".to_string());
            }
        }
        args.extend(request.lib_dirs.iter().map(|d| format!("-L{}", d)));
        args.extend(request.libs.iter().map(|lib| self.library_arg(lib)));
        args.push("-g".to_string());
        if cfg!(target_os = "macos") {
            args.extend(
                ["-Wl,-dead_strip", "-undefined", "dynamic_lookup"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        } else {
            args.push("-static-libstdc++".to_string());
            args.push("-Wl,--gc-sections".to_string());
            if let Some(script) = request.export_script {
                args.push(format!("-Wl,--version-script={}", script.display()));
            }
        }
        args.extend(request.extra_link_args.iter().cloned());
        args
    }
}
