//! Modification-time staleness checks.
//!
//! Every check errs toward rebuilding: a missing output, an unreadable timestamp or an
//! input whose mtime is not strictly older than the output all count as stale.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub struct StalenessOracle;

impl StalenessOracle {
    /// Whether `object` must be recompiled from `source` given its header set.
    pub fn is_stale<'a, I>(source: &'a Path, object: &Path, deps: I) -> bool
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        let inputs = std::iter::once(source).chain(deps.into_iter().map(PathBuf::as_path));
        Self::is_outdated(object, inputs)
    }

    /// Whether `output` is missing or not strictly newer than every input.
    pub fn is_outdated<'a, I>(output: &Path, inputs: I) -> bool
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let Some(output_time) = mtime(output) else {
            return true;
        };
        inputs.into_iter().any(|input| match mtime(input) {
            Some(input_time) => input_time >= output_time,
            None => true,
        })
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
