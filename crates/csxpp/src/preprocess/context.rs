//
// preprocess/context.rs
//
// Accumulator for one top-level preprocessing call and its rendered result
//

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::Serialize;

/// A `#load` target that did not exist when it was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingScript {
    /// Absolute path the directive resolved to
    pub path: PathBuf,
    /// File containing the directive; `None` for in-memory script text
    pub loaded_from: Option<PathBuf>,
}

/// Mutable state shared by every file reached from one entry script.
///
/// Never share a context between entry scripts: the loaded set would
/// suppress files a sibling entry still needs.
#[derive(Debug, Default, Clone)]
pub struct ParseContext {
    pub namespaces: IndexSet<String>,
    pub references: IndexSet<String>,
    /// Absolute paths already visited; the only cycle guard
    pub loaded_scripts: IndexSet<PathBuf>,
    /// Depth-first, pre-order concatenation of every file's body
    pub body_lines: Vec<String>,
    pub missing_scripts: Vec<MissingScript>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the namespace was not yet known.
    pub fn add_namespace(&mut self, namespace: &str) -> bool {
        if namespace.is_empty() {
            return false;
        }
        self.namespaces.insert(namespace.to_string())
    }

    /// Returns `true` if the reference was not yet known.
    pub fn add_reference(&mut self, reference: &str) -> bool {
        if reference.trim().is_empty() {
            return false;
        }
        self.references.insert(reference.to_string())
    }

    /// Record `path` as visited. Returns `false` when it already was, in which
    /// case the caller must not process it again.
    pub fn mark_loaded(&mut self, path: &Path) -> bool {
        self.loaded_scripts.insert(path.to_path_buf())
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        self.loaded_scripts.contains(path)
    }

    pub fn push_body_line(&mut self, line: impl Into<String>) {
        self.body_lines.push(line.into());
    }

    pub fn note_missing(&mut self, path: PathBuf, loaded_from: Option<PathBuf>) {
        let missing = MissingScript { path, loaded_from };
        if !self.missing_scripts.contains(&missing) {
            self.missing_scripts.push(missing);
        }
    }

    /// Consume the context into the immutable result, joining the body with `new_line`.
    pub fn into_result(self, new_line: &str) -> PreprocessResult {
        PreprocessResult {
            code: self.body_lines.join(new_line),
            namespaces: self.namespaces.into_iter().collect(),
            references: self.references.into_iter().collect(),
            loaded_scripts: self.loaded_scripts.into_iter().collect(),
            missing_scripts: self.missing_scripts,
        }
    }
}

/// Output of one top-level preprocessing call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessResult {
    /// Merged body with directive and using lines removed and one `#line`
    /// marker per file
    pub code: String,
    pub namespaces: Vec<String>,
    /// Absolute paths for references that resolved to a file, bare names otherwise
    pub references: Vec<String>,
    /// Entry file first, then every `#load`ed file in visiting order
    pub loaded_scripts: Vec<PathBuf>,
    pub missing_scripts: Vec<MissingScript>,
}

impl PreprocessResult {
    /// Loaded scripts other than `entry`.
    pub fn dependencies_of<'a>(&'a self, entry: &'a Path) -> impl Iterator<Item = &'a Path> + 'a {
        self.loaded_scripts
            .iter()
            .map(PathBuf::as_path)
            .filter(move |p| *p != entry)
    }

    pub fn code_lines(&self) -> impl Iterator<Item = &str> {
        self.code.lines()
    }
}
