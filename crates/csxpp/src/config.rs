//
// config.rs
//
// Preprocessor and batch configuration
//

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::fs::cache::DEFAULT_FILE_CACHE_CAPACITY;
use crate::preprocess::{MissingLoadBehavior, PreprocessOptions};

/// Name of the per-directory settings file
pub const CONFIG_FILE_NAME: &str = "csxpp.json";

/// Namespaces every script compiles with, in addition to its own usings
pub const DEFAULT_NAMESPACES: &[&str] = &[
    "System",
    "System.Collections.Generic",
    "System.Linq",
    "System.Text",
    "System.Threading.Tasks",
    "System.IO",
    "System.Net.Http",
    "System.Dynamic",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessorConfig {
    pub default_namespaces: Vec<String>,
    /// Case-insensitive substrings; a matching `#r` is dropped from batch output
    pub excluded_reference_patterns: Vec<String>,
    /// Directory bare assembly names resolve into. `None` leaves them as names.
    pub base_assembly_path: Option<PathBuf>,
    /// References every entry script gets before its own `#r` references
    pub implicit_references: Vec<String>,
    pub script_extension: String,
    pub recursive_discovery: bool,
    pub missing_load: MissingLoadBehavior,
    pub expand_environment_variables: bool,
    pub emit_line_directives: bool,
    pub file_cache_capacity: usize,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            default_namespaces: DEFAULT_NAMESPACES.iter().map(|s| s.to_string()).collect(),
            excluded_reference_patterns: vec!["scriptcs.contracts".to_string()],
            base_assembly_path: None,
            implicit_references: Vec::new(),
            script_extension: "csx".to_string(),
            recursive_discovery: false,
            missing_load: MissingLoadBehavior::Note,
            expand_environment_variables: true,
            emit_line_directives: true,
            file_cache_capacity: DEFAULT_FILE_CACHE_CAPACITY,
        }
    }
}

impl PreprocessorConfig {
    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            missing_load: self.missing_load,
            expand_environment_variables: self.expand_environment_variables,
            emit_line_directives: self.emit_line_directives,
        }
    }

    /// `true` if `reference` matches any excluded pattern.
    pub fn is_excluded_reference(&self, reference: &str) -> bool {
        let lower = reference.to_lowercase();
        self.excluded_reference_patterns
            .iter()
            .any(|pattern| lower.contains(&pattern.to_lowercase()))
    }
}

fn string_list(value: &serde_json::Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
    )
}

fn parse_missing_load(value: &str) -> MissingLoadBehavior {
    match value.to_lowercase().as_str() {
        "error" => MissingLoadBehavior::Error,
        "note" | "warn" | "warning" => MissingLoadBehavior::Note,
        other => {
            log::warn!("Unknown missingLoad value '{}'; using 'note'", other);
            MissingLoadBehavior::Note
        }
    }
}

/// Build a config from a JSON settings object. Absent keys keep their defaults.
pub fn parse_config(settings: &serde_json::Value) -> PreprocessorConfig {
    let mut config = PreprocessorConfig::default();

    if let Some(v) = settings.get("defaultNamespaces").and_then(string_list) {
        config.default_namespaces = v;
    }
    if let Some(v) = settings
        .get("excludedReferencePatterns")
        .and_then(string_list)
    {
        config.excluded_reference_patterns = v;
    }
    if let Some(v) = settings.get("baseAssemblyPath").and_then(|v| v.as_str()) {
        config.base_assembly_path = if v.is_empty() {
            None
        } else {
            Some(PathBuf::from(v))
        };
    }
    if let Some(v) = settings.get("implicitReferences").and_then(string_list) {
        config.implicit_references = v;
    }
    if let Some(v) = settings.get("scriptExtension").and_then(|v| v.as_str()) {
        config.script_extension = v.trim_start_matches('.').to_string();
    }
    if let Some(v) = settings.get("recursiveDiscovery").and_then(|v| v.as_bool()) {
        config.recursive_discovery = v;
    }
    if let Some(v) = settings.get("missingLoad").and_then(|v| v.as_str()) {
        config.missing_load = parse_missing_load(v);
    }
    if let Some(v) = settings
        .get("expandEnvironmentVariables")
        .and_then(|v| v.as_bool())
    {
        config.expand_environment_variables = v;
    }
    if let Some(v) = settings
        .get("emitLineDirectives")
        .and_then(|v| v.as_bool())
    {
        config.emit_line_directives = v;
    }
    if let Some(v) = settings.get("fileCacheCapacity").and_then(|v| v.as_u64()) {
        config.file_cache_capacity = v as usize;
    }

    log::info!("Preprocessor configuration:");
    log::info!("  default_namespaces: {:?}", config.default_namespaces);
    log::info!(
        "  excluded_reference_patterns: {:?}",
        config.excluded_reference_patterns
    );
    log::info!("  base_assembly_path: {:?}", config.base_assembly_path);
    log::info!("  implicit_references: {:?}", config.implicit_references);
    log::info!("  script_extension: {}", config.script_extension);
    log::info!("  recursive_discovery: {}", config.recursive_discovery);
    log::info!("  missing_load: {:?}", config.missing_load);
    log::info!(
        "  expand_environment_variables: {}",
        config.expand_environment_variables
    );
    log::info!("  emit_line_directives: {}", config.emit_line_directives);
    log::info!("  file_cache_capacity: {}", config.file_cache_capacity);

    config
}

/// Settings file that applies to `script_dir`: its own `csxpp.json`, else the
/// user-level `$XDG_CONFIG_HOME/csxpp/config.json` on unix.
pub fn config_file_for(script_dir: &Path) -> Option<PathBuf> {
    let local = script_dir.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    user_config_file()
}

#[cfg(unix)]
fn user_config_file() -> Option<PathBuf> {
    xdg::BaseDirectories::with_prefix("csxpp")
        .ok()?
        .find_config_file("config.json")
}

#[cfg(not(unix))]
fn user_config_file() -> Option<PathBuf> {
    None
}

/// Load the config that applies to `script_dir`, or defaults when no
/// settings file exists. A settings file that exists but does not parse is an
/// error.
pub fn load_config(script_dir: &Path) -> anyhow::Result<PreprocessorConfig> {
    match config_file_for(script_dir) {
        Some(path) => load_config_file(&path),
        None => {
            log::debug!("No settings file for {}; using defaults", script_dir.display());
            Ok(PreprocessorConfig::default())
        }
    }
}

pub fn load_config_file(path: &Path) -> anyhow::Result<PreprocessorConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    let settings: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in settings file {}", path.display()))?;
    log::info!("Loaded settings from {}", path.display());
    Ok(parse_config(&settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = PreprocessorConfig::default();
        assert_eq!(config.default_namespaces.len(), 8);
        assert_eq!(config.default_namespaces[0], "System");
        assert_eq!(config.script_extension, "csx");
        assert!(!config.recursive_discovery);
        assert_eq!(config.missing_load, MissingLoadBehavior::Note);
        assert_eq!(config.file_cache_capacity, 256);
        assert_eq!(config.preprocess_options(), PreprocessOptions::default());
    }

    #[test]
    fn test_empty_settings_keep_defaults() {
        assert_eq!(parse_config(&json!({})), PreprocessorConfig::default());
    }

    #[test]
    fn test_present_keys_override() {
        let config = parse_config(&json!({
            "defaultNamespaces": ["System"],
            "baseAssemblyPath": "/opt/dotnet",
            "implicitReferences": ["System.Runtime"],
            "scriptExtension": ".CSX",
            "recursiveDiscovery": true,
            "missingLoad": "error",
            "expandEnvironmentVariables": false,
            "fileCacheCapacity": 8
        }));
        assert_eq!(config.default_namespaces, vec!["System"]);
        assert_eq!(config.base_assembly_path, Some(PathBuf::from("/opt/dotnet")));
        assert_eq!(config.implicit_references, vec!["System.Runtime"]);
        assert_eq!(config.script_extension, "CSX");
        assert!(config.recursive_discovery);
        assert_eq!(config.missing_load, MissingLoadBehavior::Error);
        assert!(!config.preprocess_options().expand_environment_variables);
        assert_eq!(config.file_cache_capacity, 8);
        assert_eq!(config.excluded_reference_patterns, vec!["scriptcs.contracts"]);
    }

    #[test]
    fn test_wrong_types_ignored() {
        let config = parse_config(&json!({
            "recursiveDiscovery": "yes",
            "fileCacheCapacity": -1,
            "defaultNamespaces": "System"
        }));
        assert_eq!(config, PreprocessorConfig::default());
    }

    #[test]
    fn test_unknown_missing_load_falls_back_to_note() {
        let config = parse_config(&json!({ "missingLoad": "explode" }));
        assert_eq!(config.missing_load, MissingLoadBehavior::Note);
    }

    #[test]
    fn test_excluded_reference_case_insensitive() {
        let config = PreprocessorConfig::default();
        assert!(config.is_excluded_reference("/lib/ScriptCs.Contracts.dll"));
        assert!(!config.is_excluded_reference("Newtonsoft.Json.dll"));
    }

    #[test]
    fn test_load_config_from_directory_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "recursiveDiscovery": true }"#,
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert!(config.recursive_discovery);
    }

    #[test]
    fn test_invalid_settings_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ nope").unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }
}
