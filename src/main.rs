//! # cxxpy CLI Entry Point
//!
//! Routes `build`, `embed` and `clean` to the library.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use cxxpy::build::{self, embed, utils};
use cxxpy::builder::BuilderConfig;
use cxxpy::config::DetectConfig;
use cxxpy::toolchain::{CompilerFamily, ProfileSettings, profile_for, render_command};
use cxxpy::types::Macro;

#[cfg(windows)]
#[link(name = "kernel32")]
unsafe extern "system" {
    fn SetConsoleOutputCP(wCodePageID: u32) -> i32;
    fn SetConsoleCP(wCodePageID: u32) -> i32;
}

#[cfg(windows)]
fn enable_windows_utf8_console() {
    unsafe {
        SetConsoleOutputCP(65001);
        SetConsoleCP(65001);
    }
}

#[cfg(not(windows))]
fn enable_windows_utf8_console() {}

#[derive(Parser)]
#[command(name = "cxxpy")]
#[command(about = "Build C/C++ Python extension modules", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile, archive and link the extension module
    Build {
        /// Project root containing pyproject.toml
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Maximum parallel compiler processes [default: CPU count]
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Echo every compiler, archiver and linker command
        #[arg(short, long)]
        verbose: bool,
    },
    /// Compile an arbitrary file into an object exposing it as a byte array
    Embed {
        /// File to embed
        input: PathBuf,
        /// Object file to produce
        output: PathBuf,
    },
    /// Remove build/ and compile_commands.json
    Clean {
        /// Project root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() -> Result<()> {
    enable_windows_utf8_console();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            root,
            jobs,
            verbose,
        } => run_build(&root, jobs, verbose),
        Commands::Embed { input, output } => run_embed(&input, &output),
        Commands::Clean { root } => build::clean(&root).map(|_| ()),
    }
}

fn run_build(root: &Path, jobs: Option<usize>, verbose: bool) -> Result<()> {
    let (mut config, section) = BuilderConfig::from_manifest(root)
        .with_context(|| format!("Failed to load project at {}", root.display()))?;
    config.verbose = verbose;

    for check in &section.detect {
        run_detect(&mut config, check);
    }

    let output = config.build(jobs.or(section.jobs))?;
    println!(
        "   {} {}",
        "Module:".dimmed(),
        output.module.display().to_string().bold()
    );
    Ok(())
}

fn run_detect(config: &mut BuilderConfig, check: &DetectConfig) {
    let macros: Vec<Macro> = check
        .macros
        .iter()
        .filter_map(|(name, value)| value.definition().map(|v| Macro::new(name.clone(), v)))
        .collect();
    if config.detect(&check.header, check.lib.as_deref(), &macros) {
        println!("{} Found {}", "✓".green(), check.header.bold());
    } else {
        println!("{} {} not available", "!".yellow(), check.header);
    }
}

fn run_embed(input: &Path, output: &Path) -> Result<()> {
    let out_dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let c_source = embed::write_c_source(input, out_dir)?;

    let profile = profile_for(CompilerFamily::host(), ProfileSettings::default());
    let args = profile.embed_compile_args(&c_source, output);
    let result = utils::run_captured(&args, &profile.command_env())
        .with_context(|| format!("Failed to run '{}'", render_command(&args)))?;
    if !result.status.success() {
        println!("{}", utils::captured_text(&result));
        bail!("Embedding {} failed", input.display());
    }

    println!(
        "{} Embedded {} as {}_content",
        "✓".green(),
        input.display(),
        embed::symbol_name(input)
    );
    Ok(())
}
