//
// preprocess/error.rs
//
// Errors raised while preprocessing a script
//

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure of a single top-level preprocessing call.
///
/// Each variant is fatal to the entry script being processed. Batch callers
/// report it against that entry and continue with the rest.
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// A directive whose placement policy forbids it appeared after code.
    #[error(
        "Encountered directive '{directive}' after the start of code{}. Please move this directive to the beginning of the file.",
        location(.file, .line)
    )]
    InvalidDirectivePlacement {
        directive: String,
        file: Option<PathBuf>,
        /// 1-based line in the file as read, before the line marker is inserted
        line: usize,
    },

    /// A `#load` target does not exist and strict loading is enabled.
    #[error("Cannot #load '{}' from {}: file not found", display_path(.path), display_origin(.loaded_from))]
    MissingLoadTarget {
        path: PathBuf,
        loaded_from: Option<PathBuf>,
    },

    #[error("Failed to read {}: {}", display_path(.path), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn location(file: &Option<PathBuf>, line: &usize) -> String {
    match file {
        Some(file) => format!(" ({}:{})", file.display(), line),
        None => format!(" (line {})", line),
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

fn display_origin(origin: &Option<PathBuf>) -> String {
    origin
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "script text".to_string())
}

impl PreprocessError {
    pub fn is_placement(&self) -> bool {
        matches!(self, Self::InvalidDirectivePlacement { .. })
    }
}
