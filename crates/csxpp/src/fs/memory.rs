//
// fs/memory.rs
//
// In-memory file system for tests and embedders
//

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{content_lines, has_extension, FileSystem};
use crate::path_resolve;

/// File system backed by a map of absolute path to file text.
///
/// Every read is recorded so callers can assert how often a file was loaded.
#[derive(Debug)]
pub struct MemoryFileSystem {
    files: BTreeMap<PathBuf, String>,
    current_directory: PathBuf,
    new_line: String,
    reads: Mutex<Vec<PathBuf>>,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            current_directory: PathBuf::from("/"),
            new_line: "\n".to_string(),
            reads: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. Relative paths are anchored at the current directory.
    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn with_current_directory(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_directory = path_resolve::resolve_against(dir.as_ref(), Path::new("/"));
        self
    }

    pub fn with_new_line(mut self, new_line: &str) -> Self {
        self.new_line = new_line.to_string();
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        let key = path_resolve::resolve_against(path.as_ref(), &self.current_directory);
        self.files.insert(key, text.into());
    }

    /// Number of times `path` has been read.
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        let key = path_resolve::resolve_against(path.as_ref(), &self.current_directory);
        self.reads
            .lock()
            .map(|reads| reads.iter().filter(|p| **p == key).count())
            .unwrap_or(0)
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        let key = path_resolve::resolve_against(path, &self.current_directory);
        if let Ok(mut reads) = self.reads.lock() {
            reads.push(key.clone());
        }
        self.files
            .get(&key)
            .map(|text| content_lines(text))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist", key.display()),
                )
            })
    }

    fn file_exists(&self, path: &Path) -> bool {
        let key = path_resolve::resolve_against(path, &self.current_directory);
        self.files.contains_key(&key)
    }

    fn current_directory(&self) -> PathBuf {
        self.current_directory.clone()
    }

    fn enumerate_files(
        &self,
        dir: &Path,
        extension: &str,
        recursive: bool,
    ) -> io::Result<Vec<PathBuf>> {
        let dir = path_resolve::resolve_against(dir, &self.current_directory);
        // BTreeMap keys are already sorted
        Ok(self
            .files
            .keys()
            .filter(|path| has_extension(path, extension))
            .filter(|path| {
                if recursive {
                    path.starts_with(&dir)
                } else {
                    path.parent() == Some(dir.as_path())
                }
            })
            .cloned()
            .collect())
    }

    fn new_line(&self) -> &str {
        &self.new_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_files_anchor_at_current_directory() {
        let fs = MemoryFileSystem::new()
            .with_current_directory("/proj")
            .with_file("main.csx", "var x = 1;");
        assert!(fs.file_exists(Path::new("/proj/main.csx")));
        assert!(fs.file_exists(Path::new("main.csx")));
        assert!(!fs.file_exists(Path::new("/main.csx")));
    }

    #[test]
    fn test_read_lines_and_count() {
        let fs = MemoryFileSystem::new().with_file("/a.csx", "one\ntwo\n");
        assert_eq!(fs.read_lines(Path::new("/a.csx")).unwrap(), vec!["one", "two"]);
        assert_eq!(fs.read_count("/a.csx"), 1);
        assert!(fs.read_lines(Path::new("/b.csx")).is_err());
        assert_eq!(fs.read_count("/b.csx"), 1);
    }

    #[test]
    fn test_enumerate_files() {
        let fs = MemoryFileSystem::new()
            .with_file("/proj/b.csx", "")
            .with_file("/proj/a.csx", "")
            .with_file("/proj/lib/c.csx", "")
            .with_file("/proj/readme.md", "");

        let top = fs.enumerate_files(Path::new("/proj"), "csx", false).unwrap();
        assert_eq!(
            top,
            vec![PathBuf::from("/proj/a.csx"), PathBuf::from("/proj/b.csx")]
        );

        let all = fs.enumerate_files(Path::new("/proj"), "csx", true).unwrap();
        assert_eq!(all.len(), 3);
    }
}
