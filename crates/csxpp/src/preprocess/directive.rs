//
// preprocess/directive.rs
//
// Line processors: `#r`, `#load` and using-statement extraction
//
// Processors are tried in a fixed priority order for every line; the first one
// that claims a line consumes it. Unclaimed lines become body lines.
//

use std::borrow::Cow;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::context::ParseContext;
use super::error::PreprocessError;
use super::loader::{MissingLoadBehavior, PreprocessOptions};
use crate::fs::FileSystem;
use crate::path_resolve;

/// What a directive does when it appears after the first line of code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BehaviorAfterCode {
    /// Process normally
    Allow,
    /// Consume the line without effect
    #[default]
    Ignore,
    /// Fail with [`PreprocessError::InvalidDirectivePlacement`]
    Throw,
}

/// Where the lines being classified came from.
#[derive(Debug, Clone, Copy)]
pub struct LineScope<'a> {
    /// Directory relative directive arguments resolve against
    pub base_dir: &'a Path,
    /// File being parsed; `None` for in-memory script text
    pub file: Option<&'a Path>,
    /// Index at which a `#line` marker was inserted into the lines
    pub marker_index: Option<usize>,
}

impl<'a> LineScope<'a> {
    pub fn for_text(base_dir: &'a Path) -> Self {
        Self {
            base_dir,
            file: None,
            marker_index: None,
        }
    }

    /// 1-based line number in the file as written, undoing the marker shift.
    pub fn source_line_number(&self, index: usize) -> usize {
        match self.marker_index {
            Some(marker) if index > marker => index,
            _ => index + 1,
        }
    }
}

/// One line handed to the processor chain.
#[derive(Debug, Clone, Copy)]
pub struct ScriptLine<'a> {
    pub text: &'a str,
    pub is_before_code: bool,
    /// 1-based, see [`LineScope::source_line_number`]
    pub line_number: usize,
}

/// Recursion entry points the `#load` directive calls back into.
pub trait FileParser {
    fn file_system(&self) -> &dyn FileSystem;

    fn options(&self) -> &PreprocessOptions;

    /// Parse `path` (relative to `base_dir`) into `context`. A path that is
    /// already in the loaded set is a no-op.
    fn parse_file(
        &self,
        path: &Path,
        context: &mut ParseContext,
        base_dir: &Path,
    ) -> Result<(), PreprocessError>;

    /// Classify `lines` into `context` without any file I/O of its own.
    fn parse_script(
        &self,
        lines: Vec<String>,
        context: &mut ParseContext,
        scope: &LineScope<'_>,
    ) -> Result<(), PreprocessError>;
}

/// A member of the classification chain.
pub trait LineProcessor: Send + Sync {
    /// Returns `Ok(true)` when the line was consumed.
    fn process_line(
        &self,
        parser: &dyn FileParser,
        context: &mut ParseContext,
        line: &ScriptLine<'_>,
        scope: &LineScope<'_>,
    ) -> Result<bool, PreprocessError>;

    /// `true` if this processor owns a `#keyword` directive matching `line`.
    fn matches_directive(&self, _line: &str) -> bool {
        false
    }

    /// `true` if `line` belongs to the header that may precede code.
    fn is_preamble(&self, line: &str) -> bool {
        self.matches_directive(line)
    }
}

/// The effect of one `#keyword` directive.
pub trait Directive: Send + Sync {
    /// Keyword without the leading `#`
    fn name(&self) -> &'static str;

    fn behavior_after_code(&self) -> BehaviorAfterCode {
        BehaviorAfterCode::Ignore
    }

    fn apply(
        &self,
        parser: &dyn FileParser,
        context: &mut ParseContext,
        argument: &str,
        scope: &LineScope<'_>,
    ) -> Result<(), PreprocessError>;
}

/// Adapts a [`Directive`] into the chain: token matching, argument extraction
/// and the placement policy live here so directives only implement their effect.
#[derive(Debug)]
pub struct DirectiveLineProcessor<D> {
    directive: D,
    token: String,
}

impl<D: Directive> DirectiveLineProcessor<D> {
    pub fn new(directive: D) -> Self {
        let token = format!("#{}", directive.name());
        Self { directive, token }
    }

    /// The directive as written, e.g. `#load`
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl<D: Directive> LineProcessor for DirectiveLineProcessor<D> {
    fn process_line(
        &self,
        parser: &dyn FileParser,
        context: &mut ParseContext,
        line: &ScriptLine<'_>,
        scope: &LineScope<'_>,
    ) -> Result<bool, PreprocessError> {
        if !self.matches_directive(line.text) {
            return Ok(false);
        }

        if !line.is_before_code {
            match self.directive.behavior_after_code() {
                BehaviorAfterCode::Throw => {
                    return Err(PreprocessError::InvalidDirectivePlacement {
                        directive: self.token.clone(),
                        file: scope.file.map(Path::to_path_buf),
                        line: line.line_number,
                    });
                }
                BehaviorAfterCode::Ignore => {
                    log::debug!(
                        "Ignoring '{}' after start of code at line {}",
                        self.token,
                        line.line_number
                    );
                    return Ok(true);
                }
                BehaviorAfterCode::Allow => {}
            }
        }

        let argument = directive_argument(line.text, &self.token);
        log::trace!(
            "  {} '{}' at line {} (base_dir='{}')",
            self.token,
            argument,
            line.line_number,
            scope.base_dir.display()
        );
        self.directive.apply(parser, context, &argument, scope)?;
        Ok(true)
    }

    fn matches_directive(&self, line: &str) -> bool {
        line.split_whitespace().next() == Some(self.token.as_str())
    }
}

/// Argument of a directive line: the token is stripped, quotes removed and
/// trailing `;` terminators dropped.
pub fn directive_argument(line: &str, token: &str) -> String {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix(token).unwrap_or(trimmed);
    let unquoted = rest.trim().replace('"', "");
    unquoted.trim_end_matches(';').trim().to_string()
}

fn expand_argument<'a>(parser: &dyn FileParser, argument: &'a str) -> Cow<'a, str> {
    if parser.options().expand_environment_variables {
        path_resolve::expand_environment_variables(argument)
    } else {
        Cow::Borrowed(argument)
    }
}

/// `#r <path-or-name>`
///
/// Records the absolute path when the argument names an existing file
/// relative to the current scope, otherwise the argument as written, which
/// downstream resolvers treat as an assembly name.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceDirective;

impl Directive for ReferenceDirective {
    fn name(&self) -> &'static str {
        "r"
    }

    fn behavior_after_code(&self) -> BehaviorAfterCode {
        BehaviorAfterCode::Throw
    }

    fn apply(
        &self,
        parser: &dyn FileParser,
        context: &mut ParseContext,
        argument: &str,
        scope: &LineScope<'_>,
    ) -> Result<(), PreprocessError> {
        if argument.is_empty() {
            return Ok(());
        }
        let fs = parser.file_system();
        let expanded = expand_argument(parser, argument);
        let full_path = fs.full_path(Path::new(expanded.as_ref()), scope.base_dir);

        let reference = if fs.file_exists(&full_path) {
            full_path.to_string_lossy().into_owned()
        } else {
            argument.to_string()
        };

        if context.add_reference(&reference) {
            log::trace!("  Added reference '{}'", reference);
        }
        Ok(())
    }
}

/// `#load <path>`
///
/// Parses the target into the same context, so nested files share the
/// growing namespace, reference and loaded sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadDirective;

impl Directive for LoadDirective {
    fn name(&self) -> &'static str {
        "load"
    }

    fn behavior_after_code(&self) -> BehaviorAfterCode {
        BehaviorAfterCode::Throw
    }

    fn apply(
        &self,
        parser: &dyn FileParser,
        context: &mut ParseContext,
        argument: &str,
        scope: &LineScope<'_>,
    ) -> Result<(), PreprocessError> {
        if argument.is_empty() {
            log::warn!(
                "Empty #load directive in {}",
                scope
                    .file
                    .map(|f| f.display().to_string())
                    .unwrap_or_else(|| "script text".to_string())
            );
            return Ok(());
        }
        let fs = parser.file_system();
        let expanded = expand_argument(parser, argument);
        let full_path = fs.full_path(Path::new(expanded.as_ref()), scope.base_dir);

        if !fs.file_exists(&full_path) {
            match parser.options().missing_load {
                MissingLoadBehavior::Note => {
                    log::warn!(
                        "#load target '{}' does not exist; skipping",
                        full_path.display()
                    );
                    context.note_missing(full_path, scope.file.map(Path::to_path_buf));
                    return Ok(());
                }
                MissingLoadBehavior::Error => {
                    return Err(PreprocessError::MissingLoadTarget {
                        path: full_path,
                        loaded_from: scope.file.map(Path::to_path_buf),
                    });
                }
            }
        }

        parser.parse_file(&full_path, context, scope.base_dir)
    }
}

const USING_KEYWORD: &str = "using ";

/// `using [static] A.B.C;` with an optional trailing line comment.
fn import_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*using\s+(?:static\s+)?@?\w+(?:\s*\.\s*@?\w+)*\s*;\s*(?://.*)?$")
            .unwrap()
    })
}

/// `using Alias = A.B.C;` or `using Alias = A.B<C>;`. A right-hand side with
/// parentheses is an initializer, not a type name.
fn alias_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^\s*using\s+@?\w+\s*=\s*@?\w+(?:\s*\.\s*@?\w+)*(?:\s*<[^;()]*>)?\s*;\s*(?://.*)?$",
        )
        .unwrap()
    })
}

/// Extracts `using Namespace;` statements into the namespace set.
///
/// Aliases (`using X = Y;`) stay in the body but still count as header.
/// Using declarations and statements (`using var x = ...;`,
/// `using (...) ...;`) are code.
#[derive(Debug, Default, Clone, Copy)]
pub struct UsingLineProcessor;

impl UsingLineProcessor {
    /// A namespace import, `using static` included.
    pub fn is_using_line(line: &str) -> bool {
        import_pattern().is_match(line)
    }

    /// An import or an alias.
    fn is_using_directive(line: &str) -> bool {
        Self::is_using_line(line) || alias_pattern().is_match(line)
    }

    pub fn namespace_of(line: &str) -> String {
        let trimmed = line.trim();
        let rest = trimmed.strip_prefix(USING_KEYWORD).unwrap_or(trimmed);
        let statement = rest.split(';').next().unwrap_or(rest);
        statement.replace('"', "").trim().to_string()
    }
}

impl LineProcessor for UsingLineProcessor {
    fn process_line(
        &self,
        _parser: &dyn FileParser,
        context: &mut ParseContext,
        line: &ScriptLine<'_>,
        _scope: &LineScope<'_>,
    ) -> Result<bool, PreprocessError> {
        if !Self::is_using_line(line.text) {
            return Ok(false);
        }
        let namespace = Self::namespace_of(line.text);
        if context.add_namespace(&namespace) {
            log::trace!("  Added namespace '{}'", namespace);
        }
        Ok(true)
    }

    fn is_preamble(&self, line: &str) -> bool {
        Self::is_using_directive(line)
    }
}

/// The default chain in priority order: usings, `#load`, `#r`.
pub fn default_processors() -> Vec<Box<dyn LineProcessor>> {
    vec![
        Box::new(UsingLineProcessor),
        Box::new(DirectiveLineProcessor::new(LoadDirective)),
        Box::new(DirectiveLineProcessor::new(ReferenceDirective)),
    ]
}
