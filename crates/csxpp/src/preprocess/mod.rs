//
// preprocess/mod.rs
//
// Directive preprocessor for C# scripts
//

pub mod context;
pub mod directive;
pub mod error;
pub mod loader;

#[cfg(test)]
mod property_tests;

pub use context::{MissingScript, ParseContext, PreprocessResult};
pub use directive::{
    default_processors, directive_argument, BehaviorAfterCode, Directive, DirectiveLineProcessor,
    FileParser, LineProcessor, LineScope, LoadDirective, ReferenceDirective, ScriptLine,
    UsingLineProcessor,
};
pub use error::PreprocessError;
pub use loader::{line_directive, FilePreprocessor, MissingLoadBehavior, PreprocessOptions};
