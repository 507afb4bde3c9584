//
// path_resolve.rs
//
// Path helpers for directive arguments
//
// Directive arguments are resolved against an explicit base directory that the
// loader threads through the recursion. Nothing in this module reads or writes
// the process working directory.
//

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use url::Url;

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"%([^%\s]+)%").unwrap())
}

/// Expand `%NAME%` references in a directive argument from the process environment.
///
/// Unset variables are left verbatim, so `%NOPE%\lib.dll` stays as written.
pub fn expand_environment_variables(text: &str) -> Cow<'_, str> {
    expand_with(text, |name| std::env::var(name).ok())
}

/// Expand `%NAME%` references using an arbitrary lookup.
pub fn expand_with<F>(text: &str, lookup: F) -> Cow<'_, str>
where
    F: Fn(&str) -> Option<String>,
{
    if !text.contains('%') {
        return Cow::Borrowed(text);
    }
    env_var_pattern().replace_all(text, |caps: &Captures| {
        let name = &caps[1];
        match lookup(name) {
            Some(value) => {
                log::trace!("Expanded %{}% in directive argument", name);
                value
            }
            None => caps[0].to_string(),
        }
    })
}

/// Resolve `path` against `base_dir` and fold `.`/`..` lexically.
///
/// Absolute inputs ignore `base_dir`. The result is only as canonical as the
/// input allows: symlinks are not followed and the file need not exist.
pub fn resolve_against(path: &Path, base_dir: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    normalize_path(&joined).unwrap_or(joined)
}

/// Fold `.` and `..` out of `path` without touching the disk.
///
/// `..` never climbs above the root or a drive prefix. Returns `None` when
/// nothing is left.
pub fn normalize_path(path: &Path) -> Option<PathBuf> {
    let mut kept: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = kept.last() {
                    kept.pop();
                }
            }
            other => kept.push(other),
        }
    }
    (!kept.is_empty()).then(|| kept.iter().collect())
}

/// Directory containing `path`, or `path` itself when it has no parent.
pub fn parent_directory(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}

/// `file://` URI for an absolute path; `None` for relative ones.
pub fn path_to_uri(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,10}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_leading_parents_cannot_escape_root(
            climbs in 1_usize..5,
            segments in prop::collection::vec(segment(), 1..5)
        ) {
            let text = format!("/{}{}", "../".repeat(climbs), segments.join("/"));
            let normalized = normalize_path(Path::new(&text));
            prop_assert_eq!(normalized, Some(PathBuf::from(format!("/{}", segments.join("/")))));
        }

        #[test]
        fn prop_resolved_paths_have_no_dot_segments(
            base in prop::collection::vec(segment(), 1..4),
            rel in prop::collection::vec(prop_oneof![
                Just("..".to_string()),
                Just(".".to_string()),
                segment(),
            ], 1..6)
        ) {
            let base = PathBuf::from(format!("/{}", base.join("/")));
            let resolved = resolve_against(Path::new(&rel.join("/")), &base);
            prop_assert!(resolved.is_absolute());
            prop_assert!(resolved
                .components()
                .all(|c| !matches!(c, Component::CurDir | Component::ParentDir)));
        }
    }
}
