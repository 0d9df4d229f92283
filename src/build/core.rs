use super::compile_commands::{CompileCommandsEmitter, CompileRecord};
use super::feedback::FeedbackAnalyzer;
use super::link::{LinkInputs, LinkStage, remove_output};
use super::scan::DependencyScanner;
use super::scheduler::{BuildScheduler, CompileJob, EmbedStep};
use super::stale::StalenessOracle;
use crate::builder::ResolvedConfig;
use crate::error::{BuildError, Result};
use crate::toolchain::{CompilerProfile, profile_for};
use crate::types::FileKind;
use colored::*;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// What a successful build produced.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub module: PathBuf,
    pub compile_commands: PathBuf,
    /// One record per translation unit, entry point last.
    pub records: Vec<CompileRecord>,
    /// Registered files that were recompiled by this build, in registration order.
    pub compiled: Vec<PathBuf>,
    /// Whether the linker ran.
    pub linked: bool,
}

pub type BuildResult = Result<BuildOutput>;

// One registered file, planned: what the compiler reads, where the object goes.
struct Unit {
    registered: PathBuf,
    input: PathBuf,
    object: PathBuf,
    args: Vec<String>,
    embed: Option<EmbedStep>,
    stale: bool,
}

// --- CORE: Build Module ---
pub fn build_module(config: Arc<ResolvedConfig>, max_workers: Option<usize>) -> BuildResult {
    let start_time = Instant::now();
    println!(
        "{} Project: {} ({})",
        "🚀".green(),
        config.name.bold(),
        config.family
    );

    let result = run_pipeline(&config, max_workers);
    match &result {
        Ok(output) if output.compiled.is_empty() && !output.linked => {
            println!("{} Up to date", "⚡".green());
        }
        Ok(_) => {
            println!(
                "{} Build finished in {:.2?}",
                "✓".green(),
                start_time.elapsed()
            );
        }
        Err(e) => {
            remove_output(&config.module_output);
            report_failure(e);
        }
    }
    result
}

fn run_pipeline(config: &ResolvedConfig, max_workers: Option<usize>) -> BuildResult {
    let profile = profile_for(config.family, config.settings.clone());
    fs::create_dir_all(&config.obj_dir)?;

    // 1. Scan headers of every real translation unit
    let scanned: Vec<PathBuf> = config
        .files
        .iter()
        .filter(|f| f.kind != FileKind::Embed)
        .map(|f| f.path.clone())
        .chain(std::iter::once(config.main_file.clone()))
        .collect();
    let graph = DependencyScanner::new(&config.scan_dirs).scan_all(&scanned);

    // 2. Plan every unit, entry point last
    let mut units: Vec<Unit> = Vec::with_capacity(config.files.len() + 1);
    for file in &config.files {
        let object = object_path(config, &file.path, profile.object_ext());
        let unit = if file.kind == FileKind::Embed {
            plan_embed(profile.as_ref(), &file.path, object)
        } else {
            let deps = graph.headers_of(&file.path).into_iter().flatten();
            let stale = StalenessOracle::is_stale(&file.path, &object, deps);
            plan_compile(profile.as_ref(), config, &file.path, object, stale)
        };
        units.push(unit);
    }
    let main_object = object_path(config, &config.main_file, profile.object_ext());
    let main_stale = StalenessOracle::is_stale(
        &config.main_file,
        &main_object,
        graph.headers_of(&config.main_file).into_iter().flatten(),
    );
    units.push(plan_compile(
        profile.as_ref(),
        config,
        &config.main_file,
        main_object.clone(),
        main_stale,
    ));

    // 3. Compile stale units
    let env = profile.command_env();
    let stale: Vec<&Unit> = units.iter().filter(|u| u.stale).collect();
    let jobs: Vec<CompileJob> = stale
        .iter()
        .map(|u| CompileJob {
            source: u.input.clone(),
            object: u.object.clone(),
            args: u.args.clone(),
            env: env.clone(),
            embed: u.embed.clone(),
        })
        .collect();

    let mut scheduler = BuildScheduler::new(config.verbose);
    let done = scheduler.run(&jobs, max_workers).into_result()?;
    let compiled: Vec<PathBuf> = done
        .into_iter()
        .map(|i| stale[i].registered.clone())
        .collect();

    // 4. Archive + link
    let stage = LinkStage::new(profile.as_ref(), &config.build_dir, config.verbose);
    let members: Vec<PathBuf> = units[..units.len() - 1]
        .iter()
        .map(|u| u.object.clone())
        .collect();
    let force = !compiled.is_empty();
    let archive_name = format!("objs-static{}", config.settings.python_version);
    let archive = stage.archive(&archive_name, &members, force)?;
    let relink = force || archive.changed;

    let direct = [main_object];
    let inputs = LinkInputs {
        module: &config.name,
        objects: &direct,
        lib_dirs: &config.lib_dirs,
        libs: &config.libs,
        extra_link_args: &config.extra_link_args,
        output: &config.module_output,
        libpython: config.libpython.as_deref(),
    };
    let linked = stage.link(&inputs, archive.path.as_deref(), relink)?;

    // 5. Compilation database
    let records: Vec<CompileRecord> = units
        .into_iter()
        .map(|u| CompileRecord {
            directory: config.root.clone(),
            arguments: u.args,
            file: u.input,
            output: u.object,
        })
        .collect();
    let compile_commands = CompileCommandsEmitter::emit(&records, &config.root)?;

    Ok(BuildOutput {
        module: config.module_output.clone(),
        compile_commands,
        records,
        compiled,
        linked,
    })
}

fn plan_compile(
    profile: &dyn CompilerProfile,
    config: &ResolvedConfig,
    source: &Path,
    object: PathBuf,
    stale: bool,
) -> Unit {
    let args = profile.compile_args(
        source,
        &object,
        &config.macros,
        &config.include_dirs,
        &config.extra_compile_args,
    );
    Unit {
        registered: source.to_path_buf(),
        input: source.to_path_buf(),
        object,
        args,
        embed: None,
        stale,
    }
}

// Embedded resources depend on nothing but the resource itself.
fn plan_embed(profile: &dyn CompilerProfile, resource: &Path, object: PathBuf) -> Unit {
    let out_dir = object
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let file_name = resource
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let input = out_dir.join(format!("{}.c", file_name));
    let stale = StalenessOracle::is_outdated(&object, [resource]);
    Unit {
        registered: resource.to_path_buf(),
        args: profile.embed_compile_args(&input, &object),
        input,
        object,
        embed: Some(EmbedStep {
            input: resource.to_path_buf(),
            out_dir,
        }),
        stale,
    }
}

const EXTERNAL_DIR: &str = "_external";

/// `<obj_dir>/<path relative to root><ext>`. Files outside the root mirror their absolute
/// path under `_external/abs/`; in-root paths that start with `_external` move to
/// `_external/root/` so the two never meet.
fn object_path(config: &ResolvedConfig, source: &Path, ext: &str) -> PathBuf {
    let rel = match source.strip_prefix(&config.root) {
        Ok(rel) if rel.starts_with(EXTERNAL_DIR) => Path::new(EXTERNAL_DIR).join("root").join(rel),
        Ok(rel) => rel.to_path_buf(),
        Err(_) => Path::new(EXTERNAL_DIR).join("abs").join(mirrored(source)),
    };
    let mut name: OsString = config.obj_dir.join(rel).into_os_string();
    name.push(ext);
    PathBuf::from(name)
}

// Absolute path as a relative one: drive prefixes become a plain segment, `..` becomes `__`.
fn mirrored(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|component| match component {
            Component::Prefix(prefix) => Some(
                prefix
                    .as_os_str()
                    .to_string_lossy()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .into(),
            ),
            Component::RootDir | Component::CurDir => None,
            Component::ParentDir => Some(OsString::from("__")),
            Component::Normal(part) => Some(part.to_os_string()),
        })
        .collect()
}

fn report_failure(error: &BuildError) {
    match error {
        BuildError::Compile { failure, .. } => {
            println!(
                "{} Error compiling {}:\n{}",
                "x".red(),
                failure.file.display(),
                failure.output
            );
        }
        BuildError::Link(failure) => {
            println!("{}", failure.output);
            println!("{} Linking failed", "x".red());
        }
        other => println!("{} {}", "x".red(), other),
    }
    if let Some(command) = error.command() {
        println!("   {} {}", "command:".dimmed(), command);
    }
    if let Some(hint) = error.diagnostics().and_then(FeedbackAnalyzer::analyze) {
        println!("\n{} {}", "💡 Hint:".yellow().bold(), hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{CompilerFamily, ProfileSettings};
    use crate::types::MacroSet;

    fn resolved(root: &Path) -> ResolvedConfig {
        ResolvedConfig {
            name: "m".into(),
            root: root.to_path_buf(),
            build_dir: root.join("build"),
            obj_dir: root.join("build/objs3.12"),
            family: CompilerFamily::GCC,
            settings: ProfileSettings::default(),
            include_dirs: Vec::new(),
            scan_dirs: Vec::new(),
            lib_dirs: Vec::new(),
            macros: MacroSet::new(),
            libs: Vec::new(),
            extra_compile_args: Vec::new(),
            extra_link_args: Vec::new(),
            files: Vec::new(),
            main_file: root.join("src/m.cpp"),
            module_output: root.join("build/m.so"),
            libpython: None,
            verbose: false,
        }
    }

    #[test]
    fn test_object_path_mirrors_source_tree() {
        let config = resolved(Path::new("/proj"));
        assert_eq!(
            object_path(&config, Path::new("/proj/src/a.cpp"), ".o"),
            PathBuf::from("/proj/build/objs3.12/src/a.cpp.o")
        );
        assert_eq!(
            object_path(&config, Path::new("/elsewhere/b.c"), ".obj"),
            PathBuf::from("/proj/build/objs3.12/_external/abs/elsewhere/b.c.obj")
        );
    }

    #[test]
    fn test_object_paths_are_distinct_for_same_file_names() {
        let config = resolved(Path::new("/proj"));
        let sources = [
            "/x/util.cpp",
            "/y/util.cpp",
            "/proj/util.cpp",
            "/proj/src/util.cpp",
            "/proj/_external/abs/x/util.cpp",
            "/proj/_external/root/util.cpp",
        ];
        let objects: std::collections::HashSet<PathBuf> = sources
            .iter()
            .map(|s| object_path(&config, Path::new(s), ".o"))
            .collect();
        assert_eq!(objects.len(), sources.len());
    }

    #[test]
    fn test_embed_unit_compiles_generated_source() {
        let profile = profile_for(CompilerFamily::GCC, ProfileSettings::default());
        let unit = plan_embed(
            profile.as_ref(),
            Path::new("/proj/assets/schema.json"),
            PathBuf::from("/proj/build/objs3.12/assets/schema.json.o"),
        );
        assert_eq!(
            unit.input,
            PathBuf::from("/proj/build/objs3.12/assets/schema.json.c")
        );
        assert!(unit.stale, "missing object is stale");
        assert!(unit.args.contains(&unit.input.display().to_string()));
        assert_eq!(
            unit.embed.unwrap().out_dir,
            PathBuf::from("/proj/build/objs3.12/assets")
        );
    }
}
