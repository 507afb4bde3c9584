//
// preprocess/loader.rs
//
// Recursive file loader and top-level preprocessor
//

use std::path::Path;

use super::context::{ParseContext, PreprocessResult};
use super::directive::{default_processors, FileParser, LineProcessor, LineScope, ScriptLine};
use super::error::PreprocessError;
use crate::fs::FileSystem;
use crate::perf::TimingGuard;

/// What to do when a `#load` target does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingLoadBehavior {
    /// Skip the directive and record the path in `missing_scripts`
    #[default]
    Note,
    /// Fail the entry script with [`PreprocessError::MissingLoadTarget`]
    Error,
}

/// Knobs that change how directives are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessOptions {
    pub missing_load: MissingLoadBehavior,
    /// Expand `%NAME%` in `#r`/`#load` arguments
    pub expand_environment_variables: bool,
    /// Insert a `#line` marker before each file's first line of code
    pub emit_line_directives: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            missing_load: MissingLoadBehavior::Note,
            expand_environment_variables: true,
            emit_line_directives: true,
        }
    }
}

/// Turns an entry script and everything it `#load`s into one compilable unit.
pub struct FilePreprocessor<F: FileSystem> {
    fs: F,
    processors: Vec<Box<dyn LineProcessor>>,
    options: PreprocessOptions,
}

impl<F: FileSystem> std::fmt::Debug for FilePreprocessor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePreprocessor")
            .field("processors", &self.processors.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<F: FileSystem> FilePreprocessor<F> {
    pub fn new(fs: F, processors: Vec<Box<dyn LineProcessor>>, options: PreprocessOptions) -> Self {
        Self {
            fs,
            processors,
            options,
        }
    }

    /// Preprocessor with the standard chain: usings, `#load`, `#r`.
    pub fn with_default_processors(fs: F, options: PreprocessOptions) -> Self {
        Self::new(fs, default_processors(), options)
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Preprocess the file at `path`, resolving a relative path against the
    /// file system's current directory.
    pub fn process_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<PreprocessResult, PreprocessError> {
        let _guard = TimingGuard::new("preprocess:file");
        let base_dir = self.fs.current_directory();
        let mut context = ParseContext::new();
        self.parse_file(path.as_ref(), &mut context, &base_dir)?;
        Ok(self.render(context))
    }

    /// Preprocess in-memory script text. Relative directive arguments resolve
    /// against the current directory.
    pub fn process_script(&self, script: &str) -> Result<PreprocessResult, PreprocessError> {
        let base_dir = self.fs.current_directory();
        self.process_script_in(script, &base_dir)
    }

    /// Preprocess in-memory script text as if it lived in `base_dir`.
    pub fn process_script_in(
        &self,
        script: &str,
        base_dir: &Path,
    ) -> Result<PreprocessResult, PreprocessError> {
        let _guard = TimingGuard::new("preprocess:script");
        let lines = self.fs.split_lines(script);
        let mut context = ParseContext::new();
        self.parse_script(lines, &mut context, &LineScope::for_text(base_dir))?;
        Ok(self.render(context))
    }

    fn render(&self, context: ParseContext) -> PreprocessResult {
        let result = context.into_result(self.fs.new_line());
        log::debug!(
            "Preprocessed {} script(s): {} namespaces, {} references, {} missing",
            result.loaded_scripts.len(),
            result.namespaces.len(),
            result.references.len(),
            result.missing_scripts.len()
        );
        result
    }

    /// Index of the first line that is not blank and not part of the header
    /// (directives and using statements). `None` if the file has no code.
    pub fn code_boundary(&self, lines: &[String]) -> Option<usize> {
        lines.iter().position(|line| self.starts_code(line))
    }

    fn starts_code(&self, line: &str) -> bool {
        !line.trim().is_empty() && !self.processors.iter().any(|p| p.is_preamble(line))
    }

    /// Insert `#line <n> "<path>"` before the first line of code so the
    /// compiler maps merged-buffer positions back to `path`. Returns the index
    /// of the inserted line.
    fn insert_line_directive(&self, path: &Path, lines: &mut Vec<String>) -> Option<usize> {
        if !self.options.emit_line_directives {
            return None;
        }
        let body_index = self.code_boundary(lines)?;
        lines.insert(body_index, line_directive(body_index + 1, path));
        Some(body_index)
    }
}

/// Positional remap marker understood by the C# compiler.
pub fn line_directive(line: usize, path: &Path) -> String {
    format!("#line {} \"{}\"", line, path.display())
}

impl<F: FileSystem> FileParser for FilePreprocessor<F> {
    fn file_system(&self) -> &dyn FileSystem {
        &self.fs
    }

    fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    fn parse_file(
        &self,
        path: &Path,
        context: &mut ParseContext,
        base_dir: &Path,
    ) -> Result<(), PreprocessError> {
        let full_path = self.fs.full_path(path, base_dir);

        // Marked before recursing so that mutual #load chains terminate
        if !context.mark_loaded(&full_path) {
            log::trace!("Already loaded, skipping: {}", full_path.display());
            return Ok(());
        }

        let mut lines = self
            .fs
            .read_lines(&full_path)
            .map_err(|source| PreprocessError::Io {
                path: full_path.clone(),
                source,
            })?;
        log::debug!("Parsing {} ({} lines)", full_path.display(), lines.len());

        let marker_index = self.insert_line_directive(&full_path, &mut lines);
        let file_dir = self.fs.directory_of(&full_path);
        let scope = LineScope {
            base_dir: &file_dir,
            file: Some(&full_path),
            marker_index,
        };
        self.parse_script(lines, context, &scope)
    }

    fn parse_script(
        &self,
        lines: Vec<String>,
        context: &mut ParseContext,
        scope: &LineScope<'_>,
    ) -> Result<(), PreprocessError> {
        let code_index = self.code_boundary(&lines);

        for (index, text) in lines.into_iter().enumerate() {
            let line = ScriptLine {
                text: &text,
                is_before_code: code_index.map_or(true, |code| index < code),
                line_number: scope.source_line_number(index),
            };

            let mut consumed = false;
            for processor in &self.processors {
                if processor.process_line(self, context, &line, scope)? {
                    consumed = true;
                    break;
                }
            }

            if !consumed {
                context.push_body_line(text);
            }
        }
        Ok(())
    }
}
