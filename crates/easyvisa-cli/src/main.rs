use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

mod commands;

use commands::benchmark::{run_benchmark_command, BenchmarkArgs};
use commands::describe::run_describe;
use easyvisa_classifiers::benchmark::BenchmarkConfig;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("EASYVISA_LOG", "error,easyvisa=info"))
        .init();

    let matches = Command::new("easyvisa")
        .version(clap::crate_version!())
        .about("EasyVisa classifier benchmark")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("describe")
                .about("Print summary statistics of an applications CSV")
                .arg(
                    Arg::new("csv")
                        .help("Path to the EasyVisa CSV file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("benchmark")
                .about("Fit, tune and compare every classifier family")
                .arg(
                    Arg::new("csv")
                        .help("Path to the EasyVisa CSV file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("config")
                        .help("Path to the benchmark JSON configuration file")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help("Path of the HTML report. Defaults to easyvisa_benchmark.html.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("tables_dir")
                        .long("tables-dir")
                        .help("Directory to write the train and test comparison tables (CSV) to.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("n_jobs")
                        .short('j')
                        .long("n-jobs")
                        .help("Worker threads for cross-validation. Overrides the configuration file; 0 uses all cores.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("no_report")
                        .long("no-report")
                        .help("Disable HTML report generation.")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config").about("Print the default benchmark configuration as JSON"),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("describe", sub_m)) => {
            let csv: &PathBuf = sub_m
                .get_one("csv")
                .ok_or_else(|| anyhow::anyhow!("missing CSV path"))?;
            run_describe(csv)
        }
        Some(("benchmark", sub_m)) => handle_benchmark(sub_m),
        Some(("config", _)) => {
            println!("{}", serde_json::to_string_pretty(&BenchmarkConfig::default())?);
            Ok(())
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_benchmark(matches: &ArgMatches) -> Result<()> {
    let csv: PathBuf = matches
        .get_one::<PathBuf>("csv")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing CSV path"))?;
    log::info!("[EasyVisa::Benchmark] Benchmarking classifiers on {:?}", csv);

    let report = if matches.get_flag("no_report") {
        None
    } else {
        Some(
            matches
                .get_one::<PathBuf>("output_file")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("easyvisa_benchmark.html")),
        )
    };

    let args = BenchmarkArgs {
        csv,
        config: matches.get_one::<PathBuf>("config").cloned(),
        report,
        tables_dir: matches.get_one::<PathBuf>("tables_dir").cloned(),
        n_jobs: matches.get_one::<usize>("n_jobs").copied(),
    };

    match run_benchmark_command(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("Benchmark failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
