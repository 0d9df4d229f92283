//! Build configuration.
//!
//! [`BuilderConfig`] accumulates macros, paths, libraries and the file set. A build
//! freezes it into a [`ResolvedConfig`] (auto-detected Python paths merged in, version
//! macros added, paths made absolute) which the pipeline shares read-only with every
//! worker.

use crate::build::{self, BuildResult, FeatureDetector};
use crate::build::utils::{dedupe, normalize_path};
use crate::config::{BuildSection, MANIFEST_FILE, Manifest};
use crate::error::{BuildError, Result};
use crate::toolchain::{CompilerFamily, ProfileSettings, PythonEnv};
use crate::types::{FileKind, Library, Macro, MacroSet, SourceFile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const SOURCE_EXTENSIONS: &[&str] = &["cpp", "cc", "cxx", "c"];

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Module name; the entry point is `PyInit_<name>`.
    pub name: String,
    /// Project version, exposed as `PROJ_{MAJOR,MINOR,PATCH}_VERSION`.
    pub version: Option<String>,
    pub root: PathBuf,
    pub build_dir: PathBuf,
    pub include_dirs: Vec<String>,
    pub lib_dirs: Vec<String>,
    pub macros: MacroSet,
    pub libs: Vec<Library>,
    pub extra_compile_args: Vec<String>,
    pub extra_link_args: Vec<String>,
    /// Language standard, e.g. `c++20`.
    pub standard: String,
    pub verbose: bool,
    /// Target interpreter; detected on first use when unset.
    pub python: Option<PythonEnv>,
    family: CompilerFamily,
    files: Vec<SourceFile>,
    main_file: Option<PathBuf>,
}

/// Frozen view of a [`BuilderConfig`] for one build.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub name: String,
    pub root: PathBuf,
    pub build_dir: PathBuf,
    pub obj_dir: PathBuf,
    pub family: CompilerFamily,
    pub settings: ProfileSettings,
    /// Python include dirs first, then the user's, absolute and de-duplicated.
    pub include_dirs: Vec<String>,
    /// User include dirs only; the dependency scanner ignores interpreter headers.
    pub scan_dirs: Vec<PathBuf>,
    pub lib_dirs: Vec<String>,
    pub macros: MacroSet,
    /// User libraries followed by the family's system libraries.
    pub libs: Vec<Library>,
    pub extra_compile_args: Vec<String>,
    pub extra_link_args: Vec<String>,
    /// Registered files minus the entry point, in registration order.
    pub files: Vec<SourceFile>,
    pub main_file: PathBuf,
    pub module_output: PathBuf,
    /// Shared interpreter library for the undefined-symbol check, when the platform has one.
    pub libpython: Option<PathBuf>,
    pub verbose: bool,
}

impl BuilderConfig {
    /// Configuration for the host compiler family.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self::for_family(name, root, CompilerFamily::host())
    }

    pub fn for_family(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        family: CompilerFamily,
    ) -> Self {
        let root = absolute(&root.into());
        let mut macros = MacroSet::new();
        macros.extend(family.default_macros());
        Self {
            name: name.into(),
            version: None,
            build_dir: root.join("build"),
            root,
            include_dirs: Vec::new(),
            lib_dirs: Vec::new(),
            macros,
            libs: Vec::new(),
            extra_compile_args: Vec::new(),
            extra_link_args: Vec::new(),
            standard: "c++20".to_string(),
            verbose: false,
            python: None,
            family,
            files: Vec::new(),
            main_file: None,
        }
    }

    /// Load `pyproject.toml` from `root` and apply its `[tool.cxxpy]` section.
    /// The section is returned so the caller can run its `[[detect]]` entries.
    pub fn from_manifest(root: impl Into<PathBuf>) -> Result<(Self, BuildSection)> {
        let root = absolute(&root.into());
        let manifest = Manifest::load(&root.join(MANIFEST_FILE))?;
        let section = manifest.section();

        let mut config = Self::new(manifest.project.name, &root);
        config.version = manifest.project.version;
        config.apply_section(&section);
        Ok((config, section))
    }

    fn apply_section(&mut self, section: &BuildSection) {
        self.include_dirs.extend(section.include_dirs.iter().cloned());
        self.lib_dirs.extend(section.lib_dirs.iter().cloned());
        self.libs
            .extend(section.libs.iter().map(|l| Library::new(l.as_str())));
        self.libs
            .extend(section.static_libs.iter().map(|l| Library::prefer_static(l.as_str())));
        for (name, value) in &section.macros {
            if let Some(definition) = value.definition() {
                self.macros.insert(name.clone(), definition);
            }
        }
        self.extra_compile_args
            .extend(section.extra_compile_args.iter().cloned());
        self.extra_link_args
            .extend(section.extra_link_args.iter().cloned());
        if let Some(std) = &section.std {
            self.standard = std.clone();
        }

        self.add_files(&section.sources, None, None);
        for dir in &section.source_dirs {
            let sources = discover_sources(&self.root.join(dir), self.family);
            self.add_files(&sources, None, None);
        }
        self.add_files(&section.embed, None, Some(FileKind::Embed));
        if let Some(main) = &section.main {
            self.set_main_file(main, None);
        }
    }

    pub fn family(&self) -> CompilerFamily {
        self.family
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn main_file(&self) -> Option<&Path> {
        self.main_file.as_deref()
    }

    /// Upsert a macro. `None` defines it without a value.
    pub fn add_macro(&mut self, name: &str, value: Option<&str>) {
        self.macros.insert(name, value.map(str::to_string));
    }

    /// Register source files. Relative paths resolve against `directory`, then the root.
    /// Registering a path again updates its kind and keeps its position.
    pub fn add_files<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        directory: Option<&Path>,
        kind: Option<FileKind>,
    ) {
        let kind = kind.unwrap_or_default();
        for path in paths {
            let path = path.as_ref();
            if path.as_os_str().is_empty() {
                continue;
            }
            let full = self.full_path(path, directory);
            match self.files.iter_mut().find(|f| f.path == full) {
                Some(existing) => existing.kind = kind.clone(),
                None => self.files.push(SourceFile::new(full, kind.clone())),
            }
        }
    }

    /// Unregister files; unknown paths are ignored.
    pub fn remove_files<P: AsRef<Path>>(&mut self, paths: &[P], directory: Option<&Path>) {
        for path in paths {
            let path = path.as_ref();
            if path.as_os_str().is_empty() {
                continue;
            }
            let full = self.full_path(path, directory);
            self.files.retain(|f| f.path != full);
        }
    }

    /// Designate the entry-point file, replacing any previous one.
    pub fn set_main_file(&mut self, path: impl AsRef<Path>, directory: Option<&Path>) {
        let full = self.full_path(path.as_ref(), directory);
        self.main_file = Some(full);
    }

    /// Check whether `header` compiles with the current flags. On success `lib` is added
    /// to the link libraries (once) and `macros` are merged in. Never fails the caller.
    pub fn detect(&mut self, header: &str, lib: Option<&str>, macros: &[Macro]) -> bool {
        let python = self.python_env().ok();
        let settings = self.profile_settings(python.as_ref());
        let include_dirs = self.merged_include_dirs(python.as_ref());

        // a malformed version is reported by resolve
        let active = self.build_macros().unwrap_or_else(|_| self.macros.clone());

        let detector = FeatureDetector::new(self.family, settings, self.build_dir.join("detect"));
        if !detector.has_header(header, &active, &include_dirs, &self.extra_compile_args) {
            return false;
        }

        if let Some(lib) = lib.filter(|l| !l.is_empty())
            && !self.libs.iter().any(|l| l.name == lib)
        {
            self.libs.push(Library::new(lib));
        }
        self.macros.extend(macros.iter().cloned());
        true
    }

    /// Run the full pipeline: scan, compile what is stale, archive, link, emit
    /// `compile_commands.json`.
    pub fn build(&mut self, max_workers: Option<usize>) -> BuildResult {
        let resolved = self.resolve()?;
        build::build_module(Arc::new(resolved), max_workers)
    }

    /// Freeze the configuration. Fails before any compiler runs when it is unusable.
    pub fn resolve(&mut self) -> Result<ResolvedConfig> {
        if self.name.trim().is_empty() {
            return Err(BuildError::config("module name must not be empty"));
        }
        let main_file = self
            .main_file
            .clone()
            .ok_or_else(|| BuildError::config("no main file designated"))?;
        if !main_file.is_file() {
            return Err(BuildError::config(format!(
                "main file {} does not exist",
                main_file.display()
            )));
        }

        let python = self.python_env()?;
        let settings = self.profile_settings(Some(&python));

        let macros = self.build_macros()?;

        let mut libs = self.libs.clone();
        libs.extend(self.family.system_libs());

        let lib_dirs = dedupe(
            self.lib_dirs
                .iter()
                .map(|d| self.absolute_dir(d))
                .filter(|d| Path::new(d).is_dir())
                .chain(python.lib_dirs.iter().cloned()),
        );

        let files = self
            .files
            .iter()
            .filter(|f| f.path != main_file)
            .cloned()
            .collect();

        Ok(ResolvedConfig {
            name: self.name.clone(),
            root: self.root.clone(),
            build_dir: self.build_dir.clone(),
            obj_dir: self.build_dir.join(format!("objs{}", python.version)),
            family: self.family,
            include_dirs: self.merged_include_dirs(Some(&python)),
            scan_dirs: self
                .include_dirs
                .iter()
                .map(|d| PathBuf::from(self.absolute_dir(d)))
                .collect(),
            lib_dirs,
            macros,
            libs,
            extra_compile_args: self.extra_compile_args.clone(),
            extra_link_args: self.extra_link_args.clone(),
            files,
            main_file,
            module_output: self
                .build_dir
                .join(format!("{}{}", self.name, python.ext_suffix)),
            libpython: python.libpython.as_ref().map(PathBuf::from),
            verbose: self.verbose,
            settings,
        })
    }

    /// User macros plus the `PROJ_*_VERSION` macros, as every compile sees them.
    fn build_macros(&self) -> Result<MacroSet> {
        let mut macros = self.macros.clone();
        if let Some(version) = &self.version {
            macros.extend(version_macros(version)?);
        }
        Ok(macros)
    }

    fn python_env(&mut self) -> Result<PythonEnv> {
        if let Some(env) = &self.python {
            return Ok(env.clone());
        }
        let env = PythonEnv::detect()?;
        self.python = Some(env.clone());
        Ok(env)
    }

    fn profile_settings(&self, python: Option<&PythonEnv>) -> ProfileSettings {
        ProfileSettings {
            standard: self.standard.clone(),
            build_dir: self.build_dir.clone(),
            python_version: python
                .map(|p| p.version.clone())
                .unwrap_or_else(|| "3".to_string()),
        }
    }

    fn merged_include_dirs(&self, python: Option<&PythonEnv>) -> Vec<String> {
        let python_dirs = python.map(|p| p.include_dirs.clone()).unwrap_or_default();
        dedupe(
            python_dirs
                .into_iter()
                .chain(self.include_dirs.iter().map(|d| self.absolute_dir(d))),
        )
    }

    fn absolute_dir(&self, dir: &str) -> String {
        if dir.is_empty() {
            return String::new();
        }
        normalize_path(&self.root.join(dir)).display().to_string()
    }

    fn full_path(&self, path: &Path, directory: Option<&Path>) -> PathBuf {
        let joined = match directory {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        };
        normalize_path(&self.root.join(joined))
    }
}

/// `PROJ_MAJOR_VERSION` / `PROJ_MINOR_VERSION` / `PROJ_PATCH_VERSION`.
fn version_macros(version: &str) -> Result<Vec<Macro>> {
    let parsed = semver::Version::parse(version.trim()).map_err(|e| {
        BuildError::config(format!("project version '{}' is not MAJOR.MINOR.PATCH: {}", version, e))
    })?;
    Ok(vec![
        Macro::new("PROJ_MAJOR_VERSION", Some(parsed.major.to_string())),
        Macro::new("PROJ_MINOR_VERSION", Some(parsed.minor.to_string())),
        Macro::new("PROJ_PATCH_VERSION", Some(parsed.patch.to_string())),
    ])
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize_path(path);
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    normalize_path(&cwd.join(path))
}

/// Source files under `dir`, sorted by path.
fn discover_sources(dir: &Path, family: CompilerFamily) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension().is_some_and(|ext| {
                let ext = ext.to_string_lossy();
                SOURCE_EXTENSIONS.contains(&ext.as_ref())
                    || (family == CompilerFamily::MSVC && ext.eq_ignore_ascii_case("asm"))
            })
        })
        .collect();
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_python() -> PythonEnv {
        PythonEnv {
            include_dirs: vec!["/opt/python/include".into()],
            ext_suffix: ".cpython-312-x86_64-linux-gnu.so".into(),
            version: "3.12".into(),
            lib_dirs: Vec::new(),
            libpython: None,
        }
    }

    fn config(root: &Path) -> BuilderConfig {
        let mut config = BuilderConfig::for_family("fastmod", root, CompilerFamily::GCC);
        config.python = Some(fake_python());
        config
    }

    #[test]
    fn test_add_files_resolves_and_dedupes() {
        let mut cfg = config(Path::new("/proj"));
        cfg.add_files(&["a.cpp", "", "b.cpp"], Some(Path::new("src")), None);
        cfg.add_files(&["src/a.cpp"], None, Some(FileKind::from("generated")));

        let paths: Vec<&Path> = cfg.files().iter().map(|f| f.path.as_path()).collect();
        assert_eq!(
            paths,
            vec![Path::new("/proj/src/a.cpp"), Path::new("/proj/src/b.cpp")]
        );
        assert_eq!(cfg.files()[0].kind, FileKind::Other("generated".into()));
    }

    #[test]
    fn test_remove_files_ignores_unknown() {
        let mut cfg = config(Path::new("/proj"));
        cfg.add_files(&["src/a.cpp", "src/b.cpp"], None, None);
        cfg.remove_files(&["b.cpp", "nope.cpp"], Some(Path::new("src")));
        assert_eq!(cfg.files().len(), 1);
        assert_eq!(cfg.files()[0].path, Path::new("/proj/src/a.cpp"));
    }

    #[test]
    fn test_set_main_file_replaces() {
        let mut cfg = config(Path::new("/proj"));
        cfg.set_main_file("old.cpp", Some(Path::new("src")));
        cfg.set_main_file("src/new.cpp", None);
        assert_eq!(cfg.main_file(), Some(Path::new("/proj/src/new.cpp")));
    }

    #[test]
    fn test_add_macro_upserts() {
        let mut cfg = config(Path::new("/proj"));
        cfg.add_macro("LEVEL", Some("1"));
        cfg.add_macro("LEVEL", Some("2"));
        cfg.add_macro("FLAG", None);
        assert_eq!(cfg.macros.get("LEVEL").unwrap().value.as_deref(), Some("2"));
        assert_eq!(cfg.macros.get("FLAG").unwrap().value, None);
    }

    #[test]
    fn test_build_macros_carry_project_version() {
        let mut cfg = config(Path::new("/proj"));
        cfg.version = Some("2.5.1".into());
        cfg.add_macro("LEVEL", Some("1"));
        let macros = cfg.build_macros().unwrap();
        assert_eq!(macros.get("PROJ_MAJOR_VERSION").unwrap().value.as_deref(), Some("2"));
        assert_eq!(macros.get("PROJ_PATCH_VERSION").unwrap().value.as_deref(), Some("1"));
        assert!(macros.contains("LEVEL"));
        assert!(!cfg.macros.contains("PROJ_MAJOR_VERSION"), "user macros stay untouched");
    }

    #[test]
    fn test_msvc_family_starts_with_platform_macros() {
        let cfg = BuilderConfig::for_family("m", "/proj", CompilerFamily::MSVC);
        assert!(cfg.macros.contains("_CRT_SECURE_NO_WARNINGS"));
        assert!(cfg.macros.contains("UNICODE"));
    }

    #[test]
    fn test_resolve_requires_main_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.add_files(&["a.cpp"], None, None);
        assert!(matches!(cfg.resolve(), Err(BuildError::Configuration(_))));

        cfg.set_main_file("missing.cpp", None);
        assert!(matches!(cfg.resolve(), Err(BuildError::Configuration(_))));
    }

    #[test]
    fn test_resolve_merges_paths_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("libs")).unwrap();
        fs::write(root.join("src/module.cpp"), "").unwrap();

        let mut cfg = config(root);
        cfg.version = Some("2.5.1".into());
        cfg.include_dirs = vec!["include".into(), "/opt/python/include".into()];
        cfg.lib_dirs = vec!["libs".into(), "does-not-exist".into()];
        cfg.add_files(&["src/a.cpp", "src/module.cpp"], None, None);
        cfg.set_main_file("src/module.cpp", None);

        let resolved = cfg.resolve().unwrap();
        let root = normalize_path(root);
        assert_eq!(
            resolved.include_dirs,
            vec![
                "/opt/python/include".to_string(),
                root.join("include").display().to_string()
            ]
        );
        assert_eq!(resolved.lib_dirs, vec![root.join("libs").display().to_string()]);
        assert_eq!(resolved.files.len(), 1, "main file is not an archive member");
        assert_eq!(
            resolved.macros.get("PROJ_MINOR_VERSION").unwrap().value.as_deref(),
            Some("5")
        );
        assert!(
            cfg.macros.get("PROJ_MINOR_VERSION").is_none(),
            "version macros do not leak back into the mutable config"
        );
        assert_eq!(resolved.obj_dir, root.join("build").join("objs3.12"));
        assert!(
            resolved
                .module_output
                .ends_with("fastmod.cpython-312-x86_64-linux-gnu.so")
        );
    }

    #[test]
    fn test_bad_version_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("m.cpp"), "").unwrap();
        let mut cfg = config(dir.path());
        cfg.version = Some("one".into());
        cfg.set_main_file("m.cpp", None);
        assert!(matches!(cfg.resolve(), Err(BuildError::Configuration(_))));
    }

    #[test]
    fn test_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/core")).unwrap();
        fs::write(root.join("src/core/b.cpp"), "").unwrap();
        fs::write(root.join("src/core/a.c"), "").unwrap();
        fs::write(root.join("src/core/notes.txt"), "").unwrap();
        fs::write(
            root.join(MANIFEST_FILE),
            r#"
[project]
name = "fastmod"
version = "0.3.0"

[tool.cxxpy]
main = "src/module.cpp"
source_dirs = ["src/core"]
embed = ["assets/schema.json"]
libs = ["z"]
static_libs = ["ssl"]
macros = { FAST = true, LEVEL = 3 }
std = "c++17"
"#,
        )
        .unwrap();

        let (cfg, section) = BuilderConfig::from_manifest(root).unwrap();
        let root = normalize_path(root);
        assert_eq!(cfg.name, "fastmod");
        assert_eq!(cfg.version.as_deref(), Some("0.3.0"));
        assert_eq!(cfg.standard, "c++17");
        assert_eq!(cfg.main_file(), Some(root.join("src/module.cpp").as_path()));
        let names: Vec<PathBuf> = cfg.files().iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            names,
            vec![
                root.join("src/core/a.c"),
                root.join("src/core/b.cpp"),
                root.join("assets/schema.json"),
            ]
        );
        assert_eq!(cfg.files()[2].kind, FileKind::Embed);
        assert_eq!(cfg.libs, vec![Library::new("z"), Library::prefer_static("ssl")]);
        assert_eq!(cfg.macros.get("LEVEL").unwrap().value.as_deref(), Some("3"));
        assert!(section.detect.is_empty());
    }
}
