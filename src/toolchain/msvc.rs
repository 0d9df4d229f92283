//! MSVC profile (`cl`, `lib`, `link`, `ml64`).
//!
//! Expects the Visual Studio developer environment (vcvars) to already be active.

use super::{CompilerFamily, CompilerProfile, LinkRequest, ProfileSettings};
use crate::build::utils::get_std_flag_msvc;
use crate::types::MacroSet;
use std::path::{Path, PathBuf};

pub struct MsvcProfile {
    settings: ProfileSettings,
}

impl MsvcProfile {
    pub fn new(settings: ProfileSettings) -> Self {
        Self { settings }
    }

    fn is_asm(source: &Path) -> bool {
        source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("asm"))
    }

    fn default_flags(&self) -> Vec<String> {
        let pdb = self
            .settings
            .build_dir
            .join(format!("{}.pdb", self.settings.python_version));
        vec![
            format!("/Fd{}", pdb.display()),
            "/FS".to_string(),
            "/Zi".to_string(),
            "/O2".to_string(),
            "/MD".to_string(),
            "/EHsc".to_string(),
            "/utf-8".to_string(),
            get_std_flag_msvc(&self.settings.standard),
        ]
    }
}

impl CompilerProfile for MsvcProfile {
    fn family(&self) -> CompilerFamily {
        CompilerFamily::MSVC
    }

    fn command_env(&self) -> Vec<(String, String)> {
        // English diagnostics regardless of the installed UI language
        vec![("VSLANG".to_string(), "1033".to_string())]
    }

    fn compile_args(
        &self,
        source: &Path,
        object: &Path,
        macros: &MacroSet,
        include_dirs: &[String],
        extra_compile_args: &[String],
    ) -> Vec<String> {
        if Self::is_asm(source) {
            return vec![
                "ml64".to_string(),
                "/nologo".to_string(),
                "/c".to_string(),
                format!("/Fo{}", object.display()),
                source.display().to_string(),
            ];
        }

        let mut args = vec!["cl".to_string(), "/nologo".to_string(), "/c".to_string()];
        args.extend(include_dirs.iter().map(|d| format!("/I{}", d)));
        args.extend(macros.iter().map(|m| format!("/D{}", m.definition())));
        args.push(format!("/Fo{}", object.display()));
        args.push(source.display().to_string());
        args.extend(self.default_flags());
        args.extend(extra_compile_args.iter().cloned());
        args
    }

    fn embed_compile_args(&self, source: &Path, object: &Path) -> Vec<String> {
        vec![
            "cl".to_string(),
            "/nologo".to_string(),
            "/c".to_string(),
            source.display().to_string(),
            format!("/Fo{}", object.display()),
        ]
    }

    fn static_lib_path(&self, build_dir: &Path, name: &str) -> PathBuf {
        build_dir.join(format!("{}.lib", name))
    }

    fn static_lib_args(&self, objects: &[PathBuf], archive: &Path) -> Vec<String> {
        let mut args = vec![
            "lib".to_string(),
            "/nologo".to_string(),
            format!("/OUT:{}", archive.display()),
        ];
        args.extend(objects.iter().map(|o| o.display().to_string()));
        args
    }

    fn link_args(&self, request: &LinkRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "link".to_string(),
            "/nologo".to_string(),
            "/DLL".to_string(),
            format!("/OUT:{}", request.output.display()),
        ];
        args.extend(request.objects.iter().map(|o| o.display().to_string()));
        if let Some(archive) = request.archive {
            args.push(format!("/WHOLEARCHIVE:{}", archive.display()));
        }
        args.extend(request.lib_dirs.iter().map(|d| format!("/LIBPATH:{}", d)));
        for lib in request.libs {
            if lib.name.ends_with(".lib") {
                args.push(lib.name.clone());
            } else {
                args.push(format!("{}.lib", lib.name));
            }
        }
        args.extend(
            ["/debug", "/nodefaultlib:LIBCMT", "/opt:ref", "/opt:icf"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.extend(request.extra_link_args.iter().cloned());
        args
    }
}
