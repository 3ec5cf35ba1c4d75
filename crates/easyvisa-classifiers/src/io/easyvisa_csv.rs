//! EasyVisa CSV reader.
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// One row of the EasyVisa dataset, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisaApplication {
    pub case_id: String,
    pub continent: String,
    pub education_of_employee: String,
    /// `Y` or `N`.
    pub has_job_experience: String,
    /// `Y` or `N`.
    pub requires_job_training: String,
    pub no_of_employees: i64,
    pub yr_of_estab: i64,
    pub region_of_employment: String,
    pub prevailing_wage: f64,
    /// `Hour`, `Week`, `Month` or `Year`.
    pub unit_of_wage: String,
    /// `Y` or `N`.
    pub full_time_position: String,
    /// `Certified` or `Denied`.
    pub case_status: String,
}

/// Outcome of a visa application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStatus {
    Certified,
    Denied,
}

impl CaseStatus {
    /// Binary label: certified is the positive class.
    pub fn label(self) -> usize {
        match self {
            CaseStatus::Certified => 1,
            CaseStatus::Denied => 0,
        }
    }
}

impl FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "certified" => Ok(CaseStatus::Certified),
            "denied" => Ok(CaseStatus::Denied),
            other => Err(format!("Unknown case status: {}", other)),
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Certified => write!(f, "Certified"),
            CaseStatus::Denied => write!(f, "Denied"),
        }
    }
}

impl VisaApplication {
    pub fn status(&self) -> Result<CaseStatus> {
        self.case_status
            .parse::<CaseStatus>()
            .map_err(|e| anyhow!("case {}: {}", self.case_id, e))
    }

    /// Value of a numeric column by name.
    pub fn numeric(&self, column: &str) -> Option<f64> {
        match column {
            "no_of_employees" => Some(self.no_of_employees as f64),
            "yr_of_estab" => Some(self.yr_of_estab as f64),
            "prevailing_wage" => Some(self.prevailing_wage),
            _ => None,
        }
    }

    /// Value of a categorical column by name.
    pub fn categorical(&self, column: &str) -> Option<&str> {
        match column {
            "continent" => Some(&self.continent),
            "education_of_employee" => Some(&self.education_of_employee),
            "has_job_experience" => Some(&self.has_job_experience),
            "requires_job_training" => Some(&self.requires_job_training),
            "region_of_employment" => Some(&self.region_of_employment),
            "unit_of_wage" => Some(&self.unit_of_wage),
            "full_time_position" => Some(&self.full_time_position),
            "case_status" => Some(&self.case_status),
            _ => None,
        }
    }
}

/// Read an EasyVisa CSV file (header row required).
pub fn read_visa_csv<P: AsRef<Path>>(path: P) -> Result<Vec<VisaApplication>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&path)
        .with_context(|| format!("Failed to open EasyVisa file: {}", path.as_ref().display()))?;

    let mut records = Vec::new();
    for (row_idx, result) in reader.deserialize::<VisaApplication>().enumerate() {
        let record = result.with_context(|| format!("Failed to parse row {}", row_idx + 1))?;
        records.push(record);
    }

    if records.is_empty() {
        return Err(anyhow!(
            "No rows found in EasyVisa file: {}",
            path.as_ref().display()
        ));
    }

    log::info!(
        "Loaded {} visa applications from {}",
        records.len(),
        path.as_ref().display()
    );
    Ok(records)
}

/// Write applications back out in the EasyVisa column layout.
pub fn write_visa_csv<P: AsRef<Path>>(path: P, records: &[VisaApplication]) -> Result<()> {
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
