//
// fs/cache.rs
//
// Disk file cache shared by every entry script in a batch
//

use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;

use lru::LruCache;

use super::physical::{read_text, PhysicalFileSystem};
use super::{content_lines, FileSystem};

/// Default number of files kept in the cache
pub const DEFAULT_FILE_CACHE_CAPACITY: usize = 256;

/// What a cached entry was read against. An entry is stale once either
/// field differs from the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub modified: SystemTime,
    pub len: u64,
}

impl From<&std::fs::Metadata> for FileStamp {
    fn from(metadata: &std::fs::Metadata) -> Self {
        Self {
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            len: metadata.len(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedFile {
    stamp: FileStamp,
    lines: Vec<String>,
}

/// Physical file system whose reads go through an LRU cache.
///
/// Reads use `peek()` under the read lock and writes use `push()` under the
/// write lock, so eviction is by insertion time and concurrent readers never
/// contend with each other.
pub struct CachedFileSystem {
    disk: PhysicalFileSystem,
    inner: RwLock<LruCache<PathBuf, CachedFile>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for CachedFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFileSystem")
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for CachedFileSystem {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_FILE_CACHE_CAPACITY)
    }
}

impl CachedFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        let cap = NonZeroUsize::new(cap).unwrap_or(NonZeroUsize::MIN);
        Self {
            disk: PhysicalFileSystem::new(),
            inner: RwLock::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lookup(&self, path: &Path, stamp: FileStamp) -> Option<Vec<String>> {
        let guard = self.inner.read().ok()?;
        let cached = guard.peek(path)?;
        (cached.stamp == stamp).then(|| cached.lines.clone())
    }

    fn store(&self, path: PathBuf, stamp: FileStamp, lines: Vec<String>) {
        if let Ok(mut guard) = self.inner.write() {
            guard.push(path, CachedFile { stamp, lines });
        }
    }

    /// Drop one entry, e.g. after an editor saved the file.
    pub fn invalidate(&self, path: &Path) {
        if let Ok(mut guard) = self.inner.write() {
            guard.pop(path);
        }
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl FileSystem for CachedFileSystem {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        let stamp = FileStamp::from(&std::fs::metadata(path)?);

        if let Some(lines) = self.lookup(path, stamp) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("File cache hit: {}", path.display());
            return Ok(lines);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let lines = content_lines(&read_text(path)?);
        self.store(path.to_path_buf(), stamp, lines.clone());
        Ok(lines)
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.disk.file_exists(path)
    }

    fn current_directory(&self) -> PathBuf {
        self.disk.current_directory()
    }

    fn enumerate_files(
        &self,
        dir: &Path,
        extension: &str,
        recursive: bool,
    ) -> io::Result<Vec<PathBuf>> {
        self.disk.enumerate_files(dir, extension, recursive)
    }
}
