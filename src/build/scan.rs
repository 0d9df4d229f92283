//! Header dependency scanning.
//!
//! A best-effort look at `#include` directives, good enough to decide staleness. It does
//! not preprocess: conditional includes are always followed and headers that cannot be
//! found locally (system headers) are silently dropped.

use super::utils::normalize_path;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*[<"]([^>"\r\n]+)[>"]"#)
        .expect("include pattern is valid")
});

/// Source path -> every header it transitively includes.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    deps: HashMap<PathBuf, BTreeSet<PathBuf>>,
}

impl DependencyGraph {
    pub fn insert(&mut self, source: PathBuf, headers: BTreeSet<PathBuf>) {
        self.deps.insert(source, headers);
    }

    pub fn headers_of(&self, source: &Path) -> Option<&BTreeSet<PathBuf>> {
        self.deps.get(source)
    }
}

pub struct DependencyScanner {
    include_dirs: Vec<PathBuf>,
}

impl DependencyScanner {
    pub fn new<S: AsRef<Path>>(include_dirs: &[S]) -> Self {
        Self {
            include_dirs: include_dirs
                .iter()
                .map(|d| d.as_ref().to_path_buf())
                .collect(),
        }
    }

    /// Transitive header set of `source`. Never fails; unreadable files contribute nothing.
    pub fn scan(&self, source: &Path) -> BTreeSet<PathBuf> {
        let mut headers = BTreeSet::new();
        let mut visited = HashSet::new();
        visited.insert(normalize_path(source));

        let mut stack = vec![source.to_path_buf()];
        while let Some(current) = stack.pop() {
            let Ok(text) = fs::read_to_string(&current) else {
                continue;
            };
            let base = current.parent().unwrap_or_else(|| Path::new("."));
            for name in include_names(&text) {
                let Some(resolved) = self.resolve(base, name) else {
                    continue;
                };
                if visited.insert(resolved.clone()) {
                    headers.insert(resolved.clone());
                    stack.push(resolved);
                }
            }
        }
        headers
    }

    /// Scan every source in parallel.
    pub fn scan_all(&self, sources: &[PathBuf]) -> DependencyGraph {
        let scanned: Vec<(PathBuf, BTreeSet<PathBuf>)> = sources
            .par_iter()
            .map(|src| (src.clone(), self.scan(src)))
            .collect();

        let mut graph = DependencyGraph::default();
        for (source, headers) in scanned {
            graph.insert(source, headers);
        }
        graph
    }

    /// Including file's directory first, then the search path; first hit wins.
    fn resolve(&self, base: &Path, name: &str) -> Option<PathBuf> {
        std::iter::once(base)
            .chain(self.include_dirs.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
            .map(|found| normalize_path(&found))
    }
}

fn include_names(text: &str) -> impl Iterator<Item = &str> {
    INCLUDE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}
