//
// main.rs
//

use std::env;

use csxpp::cli::{analysis_stats, commands};

fn print_usage() {
    println!(
        "csxpp {}, a directive preprocessor for C# scripts.",
        env!("CARGO_PKG_VERSION")
    );
    print!(
        r#"
Usage: csxpp <COMMAND> [OPTIONS]

Commands:

preprocess <file> [--json]               Print the merged code (or the full result as JSON)
script [--json]                          Preprocess script text read from stdin
batch <dir> [--json] [--recursive]       Preprocess every .csx entry script in <dir>
analysis-stats <dir> [--csv] [--only <phase>]
                                         Time the scan, preprocess and batch phases

Available options:

--version                                Print the version
--help                                   Print this help message

Set RUST_LOG=debug for logs and CSXPP_PERF=1 for timings.

"#
    );
}

fn main() -> anyhow::Result<()> {
    let mut argv = env::args();
    argv.next(); // skip executable name

    let Some(command) = argv.next() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "--version" => {
            println!("csxpp {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        "--help" | "help" => {
            print_usage();
            return Ok(());
        }
        _ => {}
    }

    env_logger::init();

    match command.as_str() {
        "preprocess" => {
            let args = commands::parse_args(&mut argv, false).map_err(anyhow::Error::msg)?;
            commands::run_preprocess(&args)
        }
        "script" => {
            let args = commands::parse_args(&mut argv, false).map_err(anyhow::Error::msg)?;
            commands::run_script(&args)
        }
        "batch" => {
            let args = commands::parse_args(&mut argv, true).map_err(anyhow::Error::msg)?;
            commands::run_batch(&args)
        }
        "analysis-stats" => {
            let args = analysis_stats::parse_args(&mut argv).map_err(anyhow::Error::msg)?;
            let results = analysis_stats::run_analysis_stats(&args)?;
            if args.csv {
                analysis_stats::print_results_csv(&results);
            } else {
                analysis_stats::print_results(&results);
            }
            Ok(())
        }
        other => Err(anyhow::anyhow!("Unknown command: '{other}'")),
    }
}
