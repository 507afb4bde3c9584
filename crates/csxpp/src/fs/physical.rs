//
// fs/physical.rs
//
// Disk-backed file system
//

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{content_lines, has_extension, should_skip_directory, FileSystem};

#[derive(Debug, Clone, Default)]
pub struct PhysicalFileSystem;

impl PhysicalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

/// Read a file as text, replacing invalid UTF-8 rather than failing the script.
pub(crate) fn read_text(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    crate::perf::increment_files_read();
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("{} is not valid UTF-8; decoding lossily", path.display());
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    })
}

impl FileSystem for PhysicalFileSystem {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        let content = read_text(path)?;
        Ok(content_lines(&content))
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn current_directory(&self) -> PathBuf {
        std::env::current_dir().unwrap_or_else(|e| {
            log::warn!("Cannot read the process working directory: {}", e);
            PathBuf::from(".")
        })
    }

    fn enumerate_files(
        &self,
        dir: &Path,
        extension: &str,
        recursive: bool,
    ) -> io::Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", dir.display()),
            ));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| {
                !entry.file_type().is_dir()
                    || entry
                        .file_name()
                        .to_str()
                        .map(|name| !should_skip_directory(name))
                        .unwrap_or(true)
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable entry during discovery: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| has_extension(path, extension))
            .collect();

        // Deterministic order regardless of directory iteration order
        files.sort();
        Ok(files)
    }
}
