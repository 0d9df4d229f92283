//! Archive and link.
//!
//! Every non-entry object goes into one intermediate static library first; the shared
//! module is then linked from the entry-point object plus that archive pulled in whole.
//! The command line stays the same length no matter how many objects there are.
//!
//! The archive's member list is kept next to it (`<archive>.members`): `ar rcs` never drops
//! members, so a file leaving the build must force a fresh archive even when every
//! remaining object is older than it.

use super::stale::StalenessOracle;
use super::utils::{captured_text, run_captured};
use crate::error::{BuildError, LinkFailure, Result};
use crate::toolchain::{CompilerProfile, LinkRequest, render_command};
use crate::types::Library;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Inputs of the final link beyond the archive.
#[derive(Debug, Clone, Copy)]
pub struct LinkInputs<'a> {
    pub module: &'a str,
    pub objects: &'a [PathBuf],
    pub lib_dirs: &'a [String],
    pub libs: &'a [Library],
    pub extra_link_args: &'a [String],
    pub output: &'a Path,
    /// Interpreter library resolving `Py*` symbols in the check link.
    pub libpython: Option<&'a Path>,
}

/// What [`LinkStage::archive`] left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    /// `None` when there is nothing to archive.
    pub path: Option<PathBuf>,
    /// The archive was rewritten or removed, so the module must be relinked.
    pub changed: bool,
}

pub struct LinkStage<'a> {
    profile: &'a dyn CompilerProfile,
    build_dir: &'a Path,
    verbose: bool,
}

impl<'a> LinkStage<'a> {
    pub fn new(profile: &'a dyn CompilerProfile, build_dir: &'a Path, verbose: bool) -> Self {
        Self {
            profile,
            build_dir,
            verbose,
        }
    }

    /// Archive `objects` into the static library `name`. Skipped when the member list is
    /// unchanged, the archive is newer than every object and `force` is false.
    pub fn archive(&self, name: &str, objects: &[PathBuf], force: bool) -> Result<ArchiveOutcome> {
        let archive = self.profile.static_lib_path(self.build_dir, name);
        let members = members_path(&archive);

        if objects.is_empty() {
            let existed = archive.exists();
            remove_output(&archive);
            remove_output(&members);
            return Ok(ArchiveOutcome {
                path: None,
                changed: existed,
            });
        }

        let listing = member_listing(objects);
        let same_members = fs::read_to_string(&members).is_ok_and(|known| known == listing);
        if !force
            && same_members
            && !StalenessOracle::is_outdated(&archive, objects.iter().map(PathBuf::as_path))
        {
            return Ok(ArchiveOutcome {
                path: Some(archive),
                changed: false,
            });
        }

        if archive.exists() {
            fs::remove_file(&archive)?;
        }
        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)?;
        }

        println!("   {} Archiving {} object(s)...", "📦".blue(), objects.len());
        let args = self.profile.static_lib_args(objects, &archive);
        if let Err(e) = self.invoke(&args) {
            remove_output(&members);
            return Err(e);
        }
        fs::write(&members, listing)?;
        Ok(ArchiveOutcome {
            path: Some(archive),
            changed: true,
        })
    }

    /// Link the shared module. Returns whether the linker actually ran. On failure the
    /// module output is removed.
    pub fn link(&self, inputs: &LinkInputs<'_>, archive: Option<&Path>, force: bool) -> Result<bool> {
        let mut link_inputs: Vec<&Path> = inputs.objects.iter().map(PathBuf::as_path).collect();
        link_inputs.extend(archive);
        if !force && !StalenessOracle::is_outdated(inputs.output, link_inputs) {
            return Ok(false);
        }

        let export_script = match self.profile.export_script(inputs.module) {
            Some(content) => {
                let path = self.build_dir.join(format!("{}.ver", inputs.module));
                fs::create_dir_all(self.build_dir)?;
                fs::write(&path, content)?;
                Some(path)
            }
            None => None,
        };

        let request = LinkRequest {
            module: inputs.module,
            objects: inputs.objects,
            archive,
            lib_dirs: inputs.lib_dirs,
            libs: inputs.libs,
            extra_link_args: inputs.extra_link_args,
            export_script: export_script.as_deref(),
            output: inputs.output,
        };

        let check_output = self.build_dir.join(format!("{}.linkcheck", inputs.module));
        let check_request = LinkRequest {
            output: &check_output,
            ..request
        };
        if let Some(args) = self.profile.check_link_args(&check_request, inputs.libpython) {
            println!("   {} Checking symbols...", "🔍".cyan());
            let checked = self.invoke(&args);
            remove_output(&check_output);
            if let Err(e) = checked {
                remove_output(inputs.output);
                return Err(e);
            }
        }

        let args = self.profile.link_args(&request);
        println!("   {} Linking {}...", "🔗".cyan(), inputs.output.display());
        if let Err(e) = self.invoke(&args) {
            remove_output(inputs.output);
            return Err(e);
        }
        Ok(true)
    }

    fn invoke(&self, args: &[String]) -> Result<()> {
        let command = render_command(args);
        if self.verbose {
            eprintln!("{} {}", "→".dimmed(), command);
        }
        let output = match run_captured(args, &self.profile.command_env()) {
            Ok(output) => output,
            Err(e) => {
                return Err(BuildError::Link(LinkFailure {
                    command,
                    status: None,
                    output: format!("could not run '{}': {}", args[0], e),
                }));
            }
        };
        if !output.status.success() {
            return Err(BuildError::Link(LinkFailure {
                command,
                status: output.status.code(),
                output: captured_text(&output),
            }));
        }
        Ok(())
    }
}

fn members_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_os_string();
    name.push(".members");
    PathBuf::from(name)
}

fn member_listing(objects: &[PathBuf]) -> String {
    let mut names: Vec<String> = objects.iter().map(|o| o.display().to_string()).collect();
    names.sort();
    names.join("\n")
}

/// Best effort: a failed build must not leave a module that looks built.
pub fn remove_output(output: &Path) {
    if output.exists() {
        let _ = fs::remove_file(output);
    }
}
