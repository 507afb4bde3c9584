//
// preprocess/property_tests.rs
//
// Property-based tests for the load graph and directive extraction
//

#![cfg(test)]

use proptest::prelude::*;
use std::path::PathBuf;

use super::loader::{FilePreprocessor, PreprocessOptions};
use crate::fs::MemoryFileSystem;

// ============================================================================
// Generators
// ============================================================================

/// A random load graph over `n` scripts: for each script, the indices it loads.
fn load_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..7usize).prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0..n, 0..4), n))
}

fn script_name(i: usize) -> String {
    format!("s{}.csx", i)
}

fn script_path(i: usize) -> PathBuf {
    PathBuf::from(format!("/g/{}", script_name(i)))
}

/// Build a workspace where script `i` loads `edges[i]`, imports `Ns{i}`,
/// references `Ref{i % 3}` and has one body line `var v{i} = {i};`.
fn graph_fs(edges: &[Vec<usize>]) -> MemoryFileSystem {
    let mut fs = MemoryFileSystem::new().with_current_directory("/g");
    for (i, targets) in edges.iter().enumerate() {
        let mut text = String::new();
        text.push_str(&format!("using Ns{};\n", i));
        for t in targets {
            text.push_str(&format!("#load \"{}\"\n", script_name(*t)));
        }
        text.push_str(&format!("#r \"Ref{}\"\n", i % 3));
        text.push_str(&format!("var v{} = {};\n", i, i));
        fs.insert(script_path(i), text);
    }
    fs
}

fn reachable(edges: &[Vec<usize>]) -> Vec<usize> {
    let mut seen = vec![false; edges.len()];
    let mut stack = vec![0];
    while let Some(i) = stack.pop() {
        if std::mem::replace(&mut seen[i], true) {
            continue;
        }
        stack.extend(edges[i].iter().copied());
    }
    (0..edges.len()).filter(|i| seen[*i]).collect()
}

fn directive_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(|p| format!("#r \"{}.dll\"", p)),
        "[a-z]{1,8}".prop_map(|p| format!("  #load \"{}.csx\"", p)),
        "[A-Z][a-z]{0,6}".prop_map(|n| format!("using {};", n)),
        Just(String::new()),
    ]
}

fn preprocessor(fs: MemoryFileSystem) -> FilePreprocessor<MemoryFileSystem> {
    FilePreprocessor::with_default_processors(fs, PreprocessOptions::default())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every reachable script is visited exactly once, however the graph
    /// cycles or reconverges, and the entry is visited first.
    #[test]
    fn prop_each_reachable_script_loaded_once(edges in load_graph()) {
        let pre = preprocessor(graph_fs(&edges));
        let result = pre.process_file(script_path(0)).unwrap();

        let expected = reachable(&edges);
        prop_assert_eq!(result.loaded_scripts.len(), expected.len());
        prop_assert_eq!(&result.loaded_scripts[0], &script_path(0));
        for i in &expected {
            prop_assert!(result.loaded_scripts.contains(&script_path(*i)));
            prop_assert_eq!(pre.fs().read_count(script_path(*i)), 1);
            let body = format!("var v{} = {};", i, i);
            prop_assert_eq!(result.code_lines().filter(|l| *l == body).count(), 1);
        }
        prop_assert!(result.missing_scripts.is_empty());
    }

    /// Namespaces and references are duplicate-free and only contain what
    /// reachable scripts declared.
    #[test]
    fn prop_collected_sets_have_no_duplicates(edges in load_graph()) {
        let pre = preprocessor(graph_fs(&edges));
        let result = pre.process_file(script_path(0)).unwrap();
        let expected = reachable(&edges);

        let mut namespaces = result.namespaces.clone();
        namespaces.sort();
        namespaces.dedup();
        prop_assert_eq!(namespaces.len(), result.namespaces.len());
        prop_assert_eq!(result.namespaces.len(), expected.len());

        let mut references = result.references.clone();
        references.sort();
        references.dedup();
        prop_assert_eq!(references.len(), result.references.len());
        prop_assert!(result.references.len() <= 3);
    }

    /// No directive or plain using line survives into the merged body.
    #[test]
    fn prop_header_lines_never_reach_body(
        header in prop::collection::vec(directive_line(), 0..8),
        body in "[a-z]{1,8}",
    ) {
        let mut script = header.join("\n");
        script.push_str(&format!("\nvar {} = 0;", body));

        let pre = preprocessor(MemoryFileSystem::new());
        let result = pre.process_script(&script).unwrap();
        for line in result.code_lines() {
            let t = line.trim_start();
            prop_assert!(!t.starts_with("#r ") && !t.starts_with("#load "));
            prop_assert!(!t.starts_with("using "));
        }
        let expected_body = format!("var {} = 0;", body);
        prop_assert_eq!(result.code_lines().last(), Some(expected_body.as_str()));
    }

    /// Preprocessing the same graph twice yields identical results.
    #[test]
    fn prop_deterministic(edges in load_graph()) {
        let first = preprocessor(graph_fs(&edges)).process_file(script_path(0)).unwrap();
        let second = preprocessor(graph_fs(&edges)).process_file(script_path(0)).unwrap();
        prop_assert_eq!(first, second);
    }
}
