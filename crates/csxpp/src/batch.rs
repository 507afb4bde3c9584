//
// batch.rs
//
// Batch driver: preprocess every entry script in a directory
//

use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use rayon::prelude::*;
use serde::Serialize;
use url::Url;

use crate::config::PreprocessorConfig;
use crate::fs::{CachedFileSystem, FileSystem};
use crate::path_resolve::path_to_uri;
use crate::perf::{self, TimingGuard};
use crate::preprocess::{FilePreprocessor, MissingScript, PreprocessError};

/// A file path together with the URI editor clients address it by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptDocument {
    pub path: PathBuf,
    pub uri: Option<Url>,
}

impl ScriptDocument {
    fn new(path: PathBuf) -> Self {
        let uri = path_to_uri(&path);
        Self { path, uri }
    }
}

/// Compilation inputs for one entry script.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryScript {
    /// Entry file name
    pub name: String,
    pub entry: ScriptDocument,
    pub code: String,
    /// Default namespaces followed by the script's own, without duplicates
    pub usings: Vec<String>,
    /// Implicit references followed by resolved `#r` references
    pub references: Vec<String>,
    /// Every `#load`ed file other than the entry, in visiting order
    pub dependencies: Vec<ScriptDocument>,
    pub missing_scripts: Vec<MissingScript>,
}

/// An entry script that could not be preprocessed and was left out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptFailure {
    pub entry: PathBuf,
    pub message: String,
    pub is_placement: bool,
}

impl ScriptFailure {
    fn new(entry: PathBuf, error: &PreprocessError) -> Self {
        Self {
            entry,
            message: error.to_string(),
            is_placement: error.is_placement(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub root: PathBuf,
    /// In discovery order
    pub scripts: Vec<EntryScript>,
    pub failures: Vec<ScriptFailure>,
}

impl BatchReport {
    /// Every file any entry compiles: entries and their dependencies.
    pub fn script_files(&self) -> Vec<PathBuf> {
        let mut files = IndexSet::new();
        for script in &self.scripts {
            files.insert(script.entry.path.clone());
            files.extend(script.dependencies.iter().map(|d| d.path.clone()));
        }
        files.into_iter().collect()
    }

    /// Union of every entry's references.
    pub fn references(&self) -> Vec<String> {
        let mut references = IndexSet::new();
        for script in &self.scripts {
            references.extend(script.references.iter().cloned());
        }
        references.into_iter().collect()
    }

    /// Union of every entry's usings.
    pub fn usings(&self) -> Vec<String> {
        let mut usings = IndexSet::new();
        for script in &self.scripts {
            usings.extend(script.usings.iter().cloned());
        }
        usings.into_iter().collect()
    }

    pub fn script(&self, entry: &Path) -> Option<&EntryScript> {
        self.scripts.iter().find(|s| s.entry.path == entry)
    }
}

/// Preprocesses a directory of entry scripts into a [`BatchReport`].
///
/// Each entry gets its own parse context; only the file system (and so the
/// file cache) is shared, which lets entries run on the rayon pool.
#[derive(Debug)]
pub struct BatchPreprocessor<F: FileSystem = CachedFileSystem> {
    preprocessor: FilePreprocessor<F>,
    config: PreprocessorConfig,
}

impl BatchPreprocessor<CachedFileSystem> {
    pub fn new(config: PreprocessorConfig) -> Self {
        let fs = CachedFileSystem::with_capacity(config.file_cache_capacity);
        Self::with_file_system(fs, config)
    }
}

impl<F: FileSystem> BatchPreprocessor<F> {
    pub fn with_file_system(fs: F, config: PreprocessorConfig) -> Self {
        let preprocessor =
            FilePreprocessor::with_default_processors(fs, config.preprocess_options());
        Self {
            preprocessor,
            config,
        }
    }

    pub fn preprocessor(&self) -> &FilePreprocessor<F> {
        &self.preprocessor
    }

    /// Entry scripts directly in `dir` (or below it with recursive discovery).
    pub fn discover(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let timing = TimingGuard::new("batch:discover");
        let entries = self.preprocessor.fs().enumerate_files(
            dir,
            &self.config.script_extension,
            self.config.recursive_discovery,
        )?;
        perf::record_discovery(timing.finish(), entries.len());
        Ok(entries)
    }

    /// Discover and preprocess every entry script in `dir`.
    pub fn run(&self, dir: &Path) -> io::Result<BatchReport> {
        let fs = self.preprocessor.fs();
        let root = fs.full_path(dir, &fs.current_directory());
        log::info!("Detecting {} files in '{}'", self.config.script_extension, root.display());

        let entries = self.discover(&root)?;
        if entries.is_empty() {
            log::info!("Could not find any {} files", self.config.script_extension);
        } else {
            log::info!("Found {} {} files", entries.len(), self.config.script_extension);
        }
        Ok(self.run_entries(root, &entries))
    }

    /// Preprocess `entries` in parallel. Failures are logged and collected,
    /// never propagated.
    pub fn run_entries(&self, root: PathBuf, entries: &[PathBuf]) -> BatchReport {
        let timing = TimingGuard::with_threshold("batch:preprocess", 1000);

        let outcomes: Vec<Result<EntryScript, ScriptFailure>> = entries
            .par_iter()
            .map(|entry| {
                self.preprocess_entry(entry).map_err(|e| {
                    log::error!(
                        "{} will be ignored due to the following error: {}",
                        entry.display(),
                        e
                    );
                    ScriptFailure::new(entry.clone(), &e)
                })
            })
            .collect();

        let mut report = BatchReport {
            root,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(script) => report.scripts.push(script),
                Err(failure) => report.failures.push(failure),
            }
        }

        perf::record_preprocess(timing.finish(), report.scripts.len(), report.failures.len());
        log::info!(
            "Preprocessed {} entry script(s), {} failed",
            report.scripts.len(),
            report.failures.len()
        );
        report
    }

    /// Preprocess a single entry script into its compilation inputs.
    pub fn preprocess_entry(&self, entry: &Path) -> Result<EntryScript, PreprocessError> {
        let fs = self.preprocessor.fs();
        let entry = fs.full_path(entry, &fs.current_directory());
        let result = self.preprocessor.process_file(&entry)?;

        let mut usings: IndexSet<String> = self.config.default_namespaces.iter().cloned().collect();
        usings.extend(result.namespaces.iter().cloned());

        let mut references = IndexSet::new();
        references.extend(self.import_references(&self.config.implicit_references));
        references.extend(self.import_references(&result.references));

        let dependencies = result
            .dependencies_of(&entry)
            .map(|path| ScriptDocument::new(path.to_path_buf()))
            .collect();

        let name = entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.display().to_string());
        log::debug!(
            "{}: {} usings, {} references",
            name,
            usings.len(),
            references.len()
        );

        Ok(EntryScript {
            name,
            entry: ScriptDocument::new(entry),
            code: result.code,
            usings: usings.into_iter().collect(),
            references: references.into_iter().collect(),
            dependencies,
            missing_scripts: result.missing_scripts,
        })
    }

    /// Turn preprocessor references into assembly paths.
    ///
    /// Excluded references are dropped. Rooted references survive only if the
    /// file exists. Bare names go into the base assembly directory with a
    /// `.dll` suffix.
    pub fn import_references(&self, references: &[String]) -> Vec<String> {
        references
            .iter()
            .filter(|r| !self.config.is_excluded_reference(r))
            .filter_map(|r| self.import_reference(r))
            .collect()
    }

    fn import_reference(&self, reference: &str) -> Option<String> {
        let path = Path::new(reference);
        if path.is_absolute() {
            if self.preprocessor.fs().file_exists(path) {
                return Some(reference.to_string());
            }
            log::warn!("Referenced assembly '{}' does not exist; skipping", reference);
            return None;
        }

        let file_name = if reference.to_lowercase().ends_with(".dll") {
            reference.to_string()
        } else {
            format!("{}.dll", reference)
        };
        Some(match &self.config.base_assembly_path {
            Some(base) => base.join(file_name).to_string_lossy().into_owned(),
            None => file_name,
        })
    }
}
