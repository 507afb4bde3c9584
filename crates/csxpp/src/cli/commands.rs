// cli/commands.rs - `preprocess`, `script` and `batch` subcommands

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::batch::{BatchPreprocessor, BatchReport};
use crate::config;
use crate::fs::{FileSystem, PhysicalFileSystem};
use crate::preprocess::{FilePreprocessor, PreprocessResult};

/// Arguments shared by the subcommands: one optional path plus flags.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommandArgs {
    pub path: Option<PathBuf>,
    pub json: bool,
    pub recursive: bool,
}

/// Parse `[<path>] [--json] [--recursive]`. `allow_recursive` gates the
/// `--recursive` flag, which only `batch` understands.
pub fn parse_args(
    args: &mut impl Iterator<Item = String>,
    allow_recursive: bool,
) -> Result<CommandArgs, String> {
    let mut parsed = CommandArgs::default();
    for arg in args {
        match arg.as_str() {
            "--json" => parsed.json = true,
            "--recursive" if allow_recursive => parsed.recursive = true,
            other if other.starts_with('-') => {
                return Err(format!("Unknown flag: '{}'", other));
            }
            _ => {
                if parsed.path.is_some() {
                    return Err("Multiple paths provided; expected exactly one".to_string());
                }
                parsed.path = Some(PathBuf::from(arg));
            }
        }
    }
    Ok(parsed)
}

fn require_path(args: &CommandArgs, what: &str) -> anyhow::Result<PathBuf> {
    args.path
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Missing required <{}> argument", what))
}

/// `csxpp preprocess <file> [--json]`
pub fn run_preprocess(args: &CommandArgs) -> anyhow::Result<()> {
    let fs = PhysicalFileSystem::new();
    let path = fs.full_path(&require_path(args, "file")?, &fs.current_directory());
    let config = config::load_config(&fs.directory_of(&path))?;
    let preprocessor = FilePreprocessor::with_default_processors(fs, config.preprocess_options());
    let result = preprocessor
        .process_file(&path)
        .with_context(|| format!("Failed to preprocess {}", path.display()))?;
    println!("{}", render_result(&result, args.json)?);
    Ok(())
}

/// `csxpp script [--json]`, reading script text from stdin
pub fn run_script(args: &CommandArgs) -> anyhow::Result<()> {
    if let Some(path) = &args.path {
        anyhow::bail!("script reads from stdin; use `preprocess {}`", path.display());
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read script from stdin")?;

    let fs = PhysicalFileSystem::new();
    let base_dir = fs.current_directory();
    let config = config::load_config(&base_dir)?;
    let preprocessor = FilePreprocessor::with_default_processors(fs, config.preprocess_options());
    let result = preprocessor.process_script_in(&text, &base_dir)?;
    println!("{}", render_result(&result, args.json)?);
    Ok(())
}

/// `csxpp batch <dir> [--json] [--recursive]`
pub fn run_batch(args: &CommandArgs) -> anyhow::Result<()> {
    let dir = require_path(args, "dir")?;
    let mut config = config::load_config(&dir)?;
    if args.recursive {
        config.recursive_discovery = true;
    }
    let report = BatchPreprocessor::new(config)
        .run(&dir)
        .with_context(|| format!("Failed to load scripts from {}", dir.display()))?;
    if let Ok(metrics) = crate::perf::batch_metrics().lock() {
        metrics.log_summary();
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

pub fn render_result(result: &PreprocessResult, json: bool) -> anyhow::Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(result)?)
    } else {
        Ok(result.code.clone())
    }
}

/// Human-readable batch summary.
pub fn render_report(report: &BatchReport) -> String {
    let mut out = format!("Scripts in {}\n", report.root.display());
    for script in &report.scripts {
        out.push_str(&format!(
            "  {}  ({} usings, {} references, {} loaded)\n",
            script.name,
            script.usings.len(),
            script.references.len(),
            script.dependencies.len()
        ));
        for missing in &script.missing_scripts {
            out.push_str(&format!("    missing #load: {}\n", display(&missing.path)));
        }
    }
    for failure in &report.failures {
        out.push_str(&format!(
            "  {}  FAILED: {}\n",
            display(&failure.entry),
            failure.message
        ));
    }
    out.push_str(&format!(
        "{} script(s), {} failed, {} file(s) compiled, {} reference(s)\n",
        report.scripts.len(),
        report.failures.len(),
        report.script_files().len(),
        report.references().len()
    ));
    out
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
