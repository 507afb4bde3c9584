// cli/analysis_stats.rs - `csxpp analysis-stats` subcommand
//
// Loads a script directory and reports timing metrics for each phase.
//
// Phases measured:
//   1. scan       - discovering entry scripts
//   2. preprocess - preprocessing every entry sequentially, uncached
//   3. batch      - the parallel, cached batch driver

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::BatchPreprocessor;
use crate::config::{self, PreprocessorConfig};
use crate::fs::{FileSystem, PhysicalFileSystem};
use crate::perf::{peak_rss_bytes, TimingGuard};
use crate::preprocess::FilePreprocessor;

#[derive(Debug)]
pub struct AnalysisStatsArgs {
    pub path: PathBuf,
    pub csv: bool,
    pub only: Option<String>,
}

/// Timing and a one-line summary for one phase.
pub struct PhaseResult {
    pub name: String,
    pub duration: Duration,
    pub peak_rss_bytes: Option<u64>,
    pub detail: String,
}

const VALID_PHASES: &[&str] = &["scan", "preprocess", "batch"];

/// `csxpp analysis-stats <dir> [--csv] [--only <phase>]`
pub fn parse_args(args: &mut impl Iterator<Item = String>) -> Result<AnalysisStatsArgs, String> {
    let mut path: Option<PathBuf> = None;
    let mut csv = false;
    let mut only: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--csv" => csv = true,
            "--only" => {
                let phase = args
                    .next()
                    .ok_or_else(|| "--only requires a phase name".to_string())?;
                if !VALID_PHASES.contains(&phase.as_str()) {
                    return Err(format!(
                        "Unknown phase '{}'. Valid phases: {}",
                        phase,
                        VALID_PHASES.join(", ")
                    ));
                }
                only = Some(phase);
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown flag: '{}'", other));
            }
            _ => {
                if path.is_some() {
                    return Err("Multiple paths provided; expected exactly one".to_string());
                }
                path = Some(PathBuf::from(arg));
            }
        }
    }

    let path = path.ok_or_else(|| "Missing required <dir> argument".to_string())?;
    if !path.is_dir() {
        return Err(format!("Not a directory: {}", path.display()));
    }

    Ok(AnalysisStatsArgs { path, csv, only })
}

/// Time each requested phase against the settings for `args.path`.
pub fn run_analysis_stats(args: &AnalysisStatsArgs) -> anyhow::Result<Vec<PhaseResult>> {
    let config = config::load_config(&args.path)?;
    Ok(run_with_config(args, &config))
}

fn run_with_config(args: &AnalysisStatsArgs, config: &PreprocessorConfig) -> Vec<PhaseResult> {
    let wanted = |phase: &str| args.only.as_deref().map_or(true, |only| only == phase);
    let mut results = Vec::new();

    let mut entries = Vec::new();
    if wanted("scan") {
        results.push(measure("scan", || {
            entries = discover_entries(&args.path, config);
            format!("{} entry scripts", entries.len())
        }));
    } else if wanted("preprocess") {
        entries = discover_entries(&args.path, config);
    }

    if wanted("preprocess") {
        results.push(measure("preprocess", || preprocess_sequentially(&entries, config)));
    }

    if wanted("batch") {
        results.push(measure("batch", || {
            let batch = BatchPreprocessor::new(config.clone());
            match batch.run(&args.path) {
                Ok(report) => {
                    let (hits, misses) = batch.preprocessor().fs().stats();
                    format!(
                        "{} scripts, {} failed, {} references, cache {} hits / {} misses",
                        report.scripts.len(),
                        report.failures.len(),
                        report.references().len(),
                        hits,
                        misses
                    )
                }
                Err(e) => format!("batch failed: {}", e),
            }
        }));
    }

    results
}

fn measure(phase: &'static str, run: impl FnOnce() -> String) -> PhaseResult {
    let timing = TimingGuard::new(phase);
    let detail = run();
    PhaseResult {
        name: phase.to_string(),
        duration: timing.finish(),
        peak_rss_bytes: peak_rss_bytes(),
        detail,
    }
}

/// Every entry on one thread with no file cache, as a baseline for `batch`.
fn preprocess_sequentially(entries: &[PathBuf], config: &PreprocessorConfig) -> String {
    let preprocessor = FilePreprocessor::with_default_processors(
        PhysicalFileSystem::new(),
        config.preprocess_options(),
    );
    let (mut loaded, mut lines, mut failed) = (0usize, 0usize, 0usize);
    for entry in entries {
        match preprocessor.process_file(entry) {
            Ok(result) => {
                loaded += result.loaded_scripts.len();
                lines += result.code_lines().count();
            }
            Err(e) => {
                log::debug!("{}: {}", entry.display(), e);
                failed += 1;
            }
        }
    }
    format!(
        "{} entries, {} files loaded, {} body lines, {} failed",
        entries.len(),
        loaded,
        lines,
        failed
    )
}

fn discover_entries(root: &Path, config: &PreprocessorConfig) -> Vec<PathBuf> {
    PhysicalFileSystem::new()
        .enumerate_files(root, &config.script_extension, config.recursive_discovery)
        .unwrap_or_else(|e| {
            log::warn!("Failed to scan {}: {}", root.display(), e);
            Vec::new()
        })
}

/// Aligned table of phases, with a total row when more than one phase ran.
pub fn print_results(results: &[PhaseResult]) {
    println!("csxpp analysis-stats\n");
    for phase in results {
        let rss = phase.peak_rss_bytes.map(format_bytes);
        println!(
            "  {:<12} {:>10.2?}   RSS: {:<10}  ({})",
            phase.name,
            phase.duration,
            rss.as_deref().unwrap_or("n/a"),
            phase.detail
        );
    }
    if let [_, _, ..] = results {
        let total: Duration = results.iter().map(|r| r.duration).sum();
        println!("\n  {:<12} {:>10.2?}", "total", total);
    }
    println!();
}

pub fn print_results_csv(results: &[PhaseResult]) {
    println!("phase,duration_ms,peak_rss_bytes,detail");
    for phase in results {
        println!("{}", csv_row(phase));
    }
}

fn csv_row(phase: &PhaseResult) -> String {
    let millis = phase.duration.as_secs_f64() * 1000.0;
    let rss = phase.peak_rss_bytes.map(|b| b.to_string()).unwrap_or_default();
    let detail = phase.detail.replace('"', "\"\"");
    format!("{},{:.3},{},\"{}\"", phase.name, millis, rss, detail)
}

/// `1536` becomes `1.5 KB`; whole bytes below 1 KiB.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> impl Iterator<Item = String> {
        items
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_parse_args_basic() {
        let result = parse_args(&mut args(&["."])).unwrap();
        assert_eq!(result.path, PathBuf::from("."));
        assert!(!result.csv);
        assert!(result.only.is_none());
    }

    #[test]
    fn test_parse_args_all_flags() {
        let result = parse_args(&mut args(&[".", "--csv", "--only", "batch"])).unwrap();
        assert!(result.csv);
        assert_eq!(result.only.as_deref(), Some("batch"));
    }

    #[test]
    fn test_parse_args_errors() {
        let missing = parse_args(&mut args(&["--csv"])).unwrap_err();
        assert!(missing.contains("Missing required <dir>"));

        let phase = parse_args(&mut args(&[".", "--only", "parse"])).unwrap_err();
        assert!(phase.contains("Unknown phase"));

        let no_value = parse_args(&mut args(&[".", "--only"])).unwrap_err();
        assert!(no_value.contains("--only requires a phase name"));

        let flag = parse_args(&mut args(&[".", "--unknown"])).unwrap_err();
        assert!(flag.contains("Unknown flag"));

        let two = parse_args(&mut args(&[".", "."])).unwrap_err();
        assert!(two.contains("Multiple paths"));
    }

    #[test]
    fn test_parse_args_rejects_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.csx");
        std::fs::write(&file, "var x = 1;").unwrap();
        let err = parse_args(&mut args(&[file.to_str().unwrap()])).unwrap_err();
        assert!(err.contains("Not a directory"));
    }

    #[test]
    fn test_run_on_empty_dir_reports_every_phase() {
        let dir = tempfile::tempdir().unwrap();
        let stats_args = AnalysisStatsArgs {
            path: dir.path().to_path_buf(),
            csv: false,
            only: None,
        };
        let results = run_with_config(&stats_args, &PreprocessorConfig::default());
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, VALID_PHASES);
    }

    #[test]
    fn test_run_with_scripts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.csx"), "#load \"lib.csx\"\nvar m = 1;\n").unwrap();
        std::fs::write(dir.path().join("lib.csx"), "var l = 1;\n").unwrap();
        std::fs::write(dir.path().join("bad.csx"), "var b = 1;\n#r \"x.dll\"\n").unwrap();

        let stats_args = AnalysisStatsArgs {
            path: dir.path().to_path_buf(),
            csv: false,
            only: None,
        };
        let results = run_with_config(&stats_args, &PreprocessorConfig::default());
        assert!(results[0].detail.contains("3 entry scripts"));
        assert!(results[1].detail.contains("1 failed"));
        assert!(results[2].detail.contains("2 scripts, 1 failed"));
    }

    #[test]
    fn test_only_preprocess_still_discovers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csx"), "var a = 1;\n").unwrap();
        let stats_args = AnalysisStatsArgs {
            path: dir.path().to_path_buf(),
            csv: false,
            only: Some("preprocess".to_string()),
        };
        let results = run_with_config(&stats_args, &PreprocessorConfig::default());
        assert_eq!(results.len(), 1);
        assert!(results[0].detail.starts_with("1 entries"));
    }

    #[test]
    fn test_csv_row_escapes_quotes() {
        let result = PhaseResult {
            name: "scan".to_string(),
            duration: Duration::from_millis(10),
            peak_rss_bytes: None,
            detail: "say \"hi\"".to_string(),
        };
        assert_eq!(csv_row(&result), "scan,10.000,,\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_format_bytes_picks_unit() {
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }
}
