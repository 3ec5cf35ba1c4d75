use std::path::Path;

use anyhow::Result;

use easyvisa_classifiers::io::read_visa_csv;
use easyvisa_classifiers::stats::describe;

/// Print the summary statistics of an applications CSV.
pub fn run_describe(csv_path: &Path) -> Result<()> {
    let records = read_visa_csv(csv_path)?;
    let summary = describe(&records);
    println!("{}", summary);
    Ok(())
}
