//! Naming convention and schema constants shared by the validators and the orchestrator.

// Filename convention: CLINICALDATA + 14 digits + .CSV, case-insensitive
pub const FILENAME_PREFIX: &str = "CLINICALDATA";
pub const FILENAME_DIGITS: usize = 14;
pub const FILENAME_EXTENSION: &str = "CSV";
pub const FILENAME_HINT: &str = "CLINICALDATAYYYYMMDDHHMMSS.CSV";

/// Exact column order of a clinical data file
pub const EXPECTED_COLUMNS: [&str; 9] = [
    "PatientID",
    "TrialCode",
    "DrugCode",
    "Dosage_mg",
    "StartDate",
    "EndDate",
    "Outcome",
    "SideEffects",
    "Analyst",
];

pub const FIELD_COUNT: usize = EXPECTED_COLUMNS.len();

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const ARCHIVE_DATE_FORMAT: &str = "%Y%m%d";
pub const ERROR_LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Durable file names inside the configured directories
pub const LEDGER_FILE_NAME: &str = "processed_files.txt";
pub const ERROR_LOG_FILE_NAME: &str = "error_report.log";

pub const DEFAULT_UUID_API_URL: &str = "https://www.uuidtools.com/api/generate/v4";

/// Number of diagnostics copied into the error report for a quarantined file
pub const QUARANTINE_SUMMARY_ERRORS: usize = 3;
