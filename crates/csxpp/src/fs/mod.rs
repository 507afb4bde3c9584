//
// fs/mod.rs
//
// File system collaborator for the preprocessor
//

pub mod cache;
pub mod memory;
pub mod physical;

pub use cache::{CachedFileSystem, FileStamp};
pub use memory::MemoryFileSystem;
pub use physical::PhysicalFileSystem;

use std::io;
use std::path::{Path, PathBuf};

use crate::path_resolve;

/// The narrow file system contract the preprocessor consumes.
///
/// There is no setter for the current directory: callers pass the
/// directory a relative argument resolves against, so independent entry
/// scripts can be preprocessed on separate threads.
pub trait FileSystem: Send + Sync {
    /// Read a whole file as lines. A trailing line break does not produce a
    /// trailing empty line.
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>>;

    fn file_exists(&self, path: &Path) -> bool;

    /// Directory relative paths resolve against when no file is being parsed.
    fn current_directory(&self) -> PathBuf;

    /// List files with `extension` (case-insensitive) under `dir`, sorted.
    fn enumerate_files(&self, dir: &Path, extension: &str, recursive: bool)
        -> io::Result<Vec<PathBuf>>;

    /// Line separator used when rendering the merged buffer.
    fn new_line(&self) -> &str {
        if cfg!(windows) {
            "\r\n"
        } else {
            "\n"
        }
    }

    /// Absolute, lexically normalized form of `path`.
    fn full_path(&self, path: &Path, base_dir: &Path) -> PathBuf {
        path_resolve::resolve_against(path, base_dir)
    }

    fn directory_of(&self, path: &Path) -> PathBuf {
        path_resolve::parent_directory(path)
    }

    /// Split script text on `\r\n` or `\n`. Unlike [`FileSystem::read_lines`]
    /// a trailing separator yields a trailing empty line.
    fn split_lines(&self, text: &str) -> Vec<String> {
        split_lines(text)
    }
}

pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Split file content into lines the way whole-file reads do: a leading BOM
/// is dropped and a final line break does not start a new line.
pub(crate) fn content_lines(content: &str) -> Vec<String> {
    content
        .strip_prefix('\u{feff}')
        .unwrap_or(content)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Check whether a directory should be skipped during recursive discovery.
pub fn should_skip_directory(name: &str) -> bool {
    matches!(
        name,
        ".git" | ".svn" | ".hg" | "node_modules" | "bin" | "obj" | ".vscode" | ".idea" | "target"
    )
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_mixed_endings() {
        assert_eq!(split_lines("a\r\nb\nc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_lines_keeps_trailing_empty() {
        assert_eq!(split_lines("a\n"), vec!["a", ""]);
        assert_eq!(split_lines(""), vec![""]);
    }

    #[test]
    fn test_content_lines_drops_bom_and_final_break() {
        assert_eq!(content_lines("\u{feff}a\r\nb\r\n"), vec!["a", "b"]);
        assert!(content_lines("").is_empty());
    }

    #[test]
    fn test_should_skip_directory() {
        assert!(should_skip_directory(".git"));
        assert!(should_skip_directory("bin"));
        assert!(should_skip_directory("obj"));
        assert!(!should_skip_directory("scripts"));
        assert!(!should_skip_directory("lib"));
    }

    #[test]
    fn test_has_extension_case_insensitive() {
        assert!(has_extension(Path::new("/a/Main.CSX"), "csx"));
        assert!(!has_extension(Path::new("/a/main.cs"), "csx"));
        assert!(!has_extension(Path::new("/a/csx"), "csx"));
    }
}
