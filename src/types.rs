use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A preprocessor definition. `value == None` means "defined, no value".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub name: String,
    pub value: Option<String>,
}

impl Macro {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// `NAME` or `NAME=VALUE`, the part after `-D` / `/D`.
    pub fn definition(&self) -> String {
        match &self.value {
            Some(v) => format!("{}={}", self.name, v),
            None => self.name.clone(),
        }
    }
}

/// Macro set keyed by name. Redefinition overwrites the value in place, so the
/// argv order stays the order of first definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroSet {
    entries: Vec<Macro>,
}

impl MacroSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        if let Some(existing) = self.entries.iter_mut().find(|m| m.name == name) {
            existing.value = value;
        } else {
            self.entries.push(Macro::new(name, value));
        }
    }

    pub fn extend<I: IntoIterator<Item = Macro>>(&mut self, macros: I) {
        for m in macros {
            self.insert(m.name, m.value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.entries.iter().find(|m| m.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Macro> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a MacroSet {
    type Item = &'a Macro;
    type IntoIter = std::slice::Iter<'a, Macro>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Logical grouping of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FileKind {
    #[default]
    Normal,
    /// Arbitrary file compiled into a byte array (`<var>_content` / `<var>_size`).
    Embed,
    /// User bookkeeping label, no effect on the build.
    Other(String),
}

impl From<&str> for FileKind {
    fn from(s: &str) -> Self {
        match s {
            "" | "normal" => FileKind::Normal,
            "embed" => FileKind::Embed,
            other => FileKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Normal => write!(f, "normal"),
            FileKind::Embed => write!(f, "embed"),
            FileKind::Other(label) => write!(f, "{}", label),
        }
    }
}

/// A registered translation unit, identified by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: FileKind,
}

impl SourceFile {
    pub fn new(path: PathBuf, kind: FileKind) -> Self {
        Self { path, kind }
    }
}

/// A library to link against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    /// Link `lib<name>.a` directly when one is found on the system (GCC family).
    #[serde(default)]
    pub prefer_static: bool,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefer_static: false,
        }
    }

    pub fn prefer_static(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefer_static: true,
        }
    }
}

impl From<&str> for Library {
    fn from(name: &str) -> Self {
        Library::new(name)
    }
}
