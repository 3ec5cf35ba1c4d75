pub mod easyvisa_csv;

pub use easyvisa_csv::{read_visa_csv, write_visa_csv, CaseStatus, VisaApplication};
