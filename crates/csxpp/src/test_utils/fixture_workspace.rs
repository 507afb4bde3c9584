//! Deterministic fixture workspace generator for benchmarks and tests.
//!
//! Generates synthetic script directories: entry scripts at the top level and
//! a `lib/` directory of `#load`ed libraries forming a chain, with every
//! library also loading `lib/shared.csx` so the load graph reconverges.
//!
//! All output is deterministic so benchmarks are reproducible.

use std::fmt::Write;
use std::path::Path;
use tempfile::TempDir;

/// Configuration for generating a fixture workspace.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub entry_count: usize,
    pub library_count: usize,
    /// Library `k` loads library `k + 1` while `k + 1 < load_chain_depth`
    pub load_chain_depth: usize,
    pub usings_per_file: usize,
    pub references_per_file: usize,
    pub body_lines_per_file: usize,
}

/// Namespaces cycled through deterministically in generated usings.
const NAMESPACES: &[&str] = &[
    "System",
    "System.Linq",
    "System.Text",
    "System.IO",
    "System.Collections.Generic",
    "System.Threading.Tasks",
    "System.Net.Http",
    "System.Xml.Linq",
];

/// Name of the library every other library loads
pub const SHARED_LIBRARY: &str = "shared.csx";

impl FixtureConfig {
    /// Small workspace: 5 entries over 4 libraries, chain depth 3.
    pub fn small() -> Self {
        Self {
            entry_count: 5,
            library_count: 4,
            load_chain_depth: 3,
            usings_per_file: 2,
            references_per_file: 1,
            body_lines_per_file: 10,
        }
    }

    /// Medium workspace: 25 entries over 20 libraries, chain depth 10.
    pub fn medium() -> Self {
        Self {
            entry_count: 25,
            library_count: 20,
            load_chain_depth: 10,
            usings_per_file: 3,
            references_per_file: 2,
            body_lines_per_file: 40,
        }
    }

    /// Large workspace: 100 entries over 60 libraries, chain depth 25.
    pub fn large() -> Self {
        Self {
            entry_count: 100,
            library_count: 60,
            load_chain_depth: 25,
            usings_per_file: 4,
            references_per_file: 3,
            body_lines_per_file: 100,
        }
    }
}

fn write_header(content: &mut String, index: usize, config: &FixtureConfig) {
    for u in 0..config.usings_per_file {
        let ns = NAMESPACES[(index * config.usings_per_file + u) % NAMESPACES.len()];
        writeln!(content, "using {};", ns).unwrap();
    }
}

fn write_body(content: &mut String, prefix: &str, index: usize, config: &FixtureConfig) {
    for line_i in 0..config.body_lines_per_file {
        writeln!(content, "var {}_{}_{} = {};", prefix, index, line_i, line_i + 1).unwrap();
    }
}

/// Content of entry script `index`.
fn generate_entry_content(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::new();
    write_header(&mut content, index, config);
    if config.library_count > 0 {
        writeln!(content, "#load \"lib/lib_{}.csx\"", index % config.library_count).unwrap();
    }
    for r in 0..config.references_per_file {
        writeln!(content, "#r \"Fixture.Ref{}\"", (index + r) % 5).unwrap();
    }
    content.push('\n');
    write_body(&mut content, "entry", index, config);
    writeln!(content, "Console.WriteLine(\"entry {}\");", index).unwrap();
    content
}

/// Content of library `index` under `lib/`.
fn generate_library_content(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::new();
    write_header(&mut content, index + 1, config);
    if index + 1 < config.load_chain_depth.min(config.library_count) {
        writeln!(content, "#load \"lib_{}.csx\"", index + 1).unwrap();
    }
    writeln!(content, "#load \"{}\"", SHARED_LIBRARY).unwrap();
    for r in 0..config.references_per_file {
        writeln!(content, "#r \"Fixture.Lib{}\"", (index + r) % 7).unwrap();
    }
    content.push('\n');
    write_body(&mut content, "lib", index, config);
    content
}

fn generate_shared_content() -> String {
    "using System.Text;\n\nvar shared = new StringBuilder();\n".to_string()
}

/// Create a temporary fixture workspace from the given configuration.
///
/// The directory is cleaned up when the `TempDir` is dropped. Calling this
/// twice with the same `FixtureConfig` produces byte-identical files.
pub fn create_fixture_workspace(config: &FixtureConfig) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory for fixture workspace");
    write_fixture_workspace(temp_dir.path(), config);
    temp_dir
}

/// Write fixture files into an existing directory.
pub fn write_fixture_workspace(dir: &Path, config: &FixtureConfig) {
    let lib_dir = dir.join("lib");
    std::fs::create_dir_all(&lib_dir)
        .unwrap_or_else(|e| panic!("Failed to create {}: {}", lib_dir.display(), e));

    let write = |path: &Path, content: &str| {
        std::fs::write(path, content)
            .unwrap_or_else(|e| panic!("Failed to write fixture file {}: {}", path.display(), e));
    };

    for i in 0..config.entry_count {
        write(&dir.join(format!("entry_{}.csx", i)), &generate_entry_content(i, config));
    }
    for k in 0..config.library_count {
        write(&lib_dir.join(format!("lib_{}.csx", k)), &generate_library_content(k, config));
    }
    write(&lib_dir.join(SHARED_LIBRARY), &generate_shared_content());
}
