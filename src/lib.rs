pub mod config;
pub mod constants;
pub mod correlation;
pub mod error;
pub mod error_report;
pub mod ledger;
pub mod logging;
pub mod status;
pub mod validation;

// Use cases and the seams they depend on
pub mod app;
// Adapters: FTP, drop directory, disk storage, UUID service
pub mod infra;
