// lib.rs - Library surface of the csxpp preprocessor.
//
// The binary entry point lives in main.rs and drives these modules through
// `cli`. Benches and integration tests import from here.

pub mod batch;
pub mod cli;
pub mod config;
pub mod fs;
pub mod path_resolve;
pub mod perf;
pub mod preprocess;
// test_utils is available in test builds and when the `test-support` feature is enabled.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use batch::{BatchPreprocessor, BatchReport};
pub use preprocess::{FilePreprocessor, PreprocessError, PreprocessOptions, PreprocessResult};
