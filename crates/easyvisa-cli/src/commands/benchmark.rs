//! `easyvisa benchmark`: run every classifier family and write the results.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use easyvisa_classifiers::benchmark::{
    load_benchmark_config, run_from_csv, BenchmarkConfig, BenchmarkResults,
};
use easyvisa_classifiers::importance::ImportanceListing;
use easyvisa_classifiers::report::build_benchmark_report;
use easyvisa_classifiers::tuning::CancelFlag;

pub struct BenchmarkArgs {
    pub csv: PathBuf,
    pub config: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub tables_dir: Option<PathBuf>,
    pub n_jobs: Option<usize>,
}

fn resolve_config(args: &BenchmarkArgs) -> Result<BenchmarkConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("[EasyVisa::Benchmark] Using config: {:?}", path);
            load_benchmark_config(path)?
        }
        None => {
            log::info!("[EasyVisa::Benchmark] No config provided; using defaults.");
            BenchmarkConfig::default()
        }
    };
    if let Some(n_jobs) = args.n_jobs {
        config.n_jobs = n_jobs;
    }
    Ok(config)
}

fn write_tables(results: &BenchmarkResults, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    results.train_table.write_csv(dir.join("train_performance.csv"))?;
    results.test_table.write_csv(dir.join("test_performance.csv"))?;
    Ok(())
}

pub fn run_benchmark_command(args: &BenchmarkArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let (summary, results) = run_from_csv(&args.csv, &config, &CancelFlag::new())?;

    println!("Training performance comparison:\n{}\n", results.train_table);
    println!("Test set performance comparison:\n{}\n", results.test_table);
    if let Some(final_model) = &results.final_model {
        println!("Feature importances of {}:", final_model);
        println!("{}", ImportanceListing(&results.importances));
    }

    if let Some(dir) = &args.tables_dir {
        write_tables(&results, dir)?;
    }

    if let Some(path) = &args.report {
        let report = build_benchmark_report(&results, &config, Some(&summary))?;
        report.save_to_file(path)?;
        log::info!("[EasyVisa::Benchmark] Report written to {}", path.display());
    }
    Ok(())
}
