use chrono::{Local, NaiveDate};
use metrics::{counter, histogram};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::app::ports::{ArtifactStore, TransferGateway};
use crate::constants::{ARCHIVE_DATE_FORMAT, FILENAME_EXTENSION, QUARANTINE_SUMMARY_ERRORS};
use crate::error::Result;
use crate::error_report::ErrorReporter;
use crate::ledger::ProcessedLedger;
use crate::status::{StatusLevel, StatusLine, StatusSink};
use crate::validation::filename::strip_extension;
use crate::validation::{validate_content, validate_filename};

const SEPARATOR: &str = "============================================================";

/// What a batch does with each candidate file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchMode {
    /// Only list candidates
    List,
    /// Fetch and validate; no storage, ledger or error-report side effects
    Validate,
    /// Full pipeline: validate, then archive or quarantine
    Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuarantineReason {
    Filename,
    Content,
}

/// Terminal state of one file within a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FileOutcome {
    /// Already in the ledger; nothing fetched
    Skipped,
    Listed { already_processed: bool },
    Archived { archive_name: String, records: usize, sha256: String },
    Quarantined { reason: QuarantineReason, error_count: usize, correlation_id: String },
    Valid { records: usize },
    Invalid { error_count: usize, records: usize },
    /// Transfer, storage or ledger failure contained at file level
    Failed { error: String, correlation_id: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub name: String,
    pub outcome: FileOutcome,
}

/// Result of one batch, delivered to the interactive surface on completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub mode: BatchMode,
    pub files: Vec<FileReport>,
    /// Set when the batch could not run at all (connect or listing failure)
    pub halted: Option<String>,
}

impl BatchReport {
    pub fn new(mode: BatchMode) -> Self {
        Self { mode, files: Vec::new(), halted: None }
    }

    pub fn halted(mode: BatchMode, reason: impl Into<String>) -> Self {
        Self { mode, files: Vec::new(), halted: Some(reason.into()) }
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }

    pub fn archived(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Archived { .. }))
    }

    pub fn quarantined(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Quarantined { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    pub fn valid(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Valid { .. }))
    }

    pub fn invalid(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Invalid { .. }))
    }

    pub fn outcome_of(&self, name: &str) -> Option<&FileOutcome> {
        self.files.iter().find(|f| f.name == name).map(|f| &f.outcome)
    }

    /// Names listed by a `List` batch
    pub fn listed_names(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Listed { .. }))
            .map(|f| f.name.as_str())
            .collect()
    }

    /// True when nothing was rejected, failed or halted
    pub fn is_clean(&self) -> bool {
        self.halted.is_none() && self.quarantined() == 0 && self.failed() == 0 && self.invalid() == 0
    }
}

/// `<name without extension>_<YYYYMMDD>.CSV`
pub fn archive_name_for(name: &str, date: NaiveDate) -> String {
    format!(
        "{}_{}.{}",
        strip_extension(name),
        date.format(ARCHIVE_DATE_FORMAT),
        FILENAME_EXTENSION
    )
}

/// First three diagnostics joined by ` | `, plus a count of the rest
pub fn quarantine_summary(diagnostics: &[String]) -> String {
    let shown = diagnostics.len().min(QUARANTINE_SUMMARY_ERRORS);
    let mut summary = diagnostics[..shown].join(" | ");
    if diagnostics.len() > shown {
        summary.push_str(&format!(" ... and {} more", diagnostics.len() - shown));
    }
    summary
}

/// Case-insensitive substring filter used by the listing
pub fn filter_names(names: Vec<String>, term: Option<&str>) -> Vec<String> {
    match term.map(str::to_lowercase) {
        Some(term) if !term.is_empty() => names
            .into_iter()
            .filter(|n| n.to_lowercase().contains(&term))
            .collect(),
        _ => names,
    }
}

/// Drives the per-file pipeline over a batch, strictly one file at a time.
///
/// Owns the ledger; it is the only writer of ledger, archive and quarantine.
pub struct IngestUseCase {
    store: Arc<dyn ArtifactStore>,
    ledger: ProcessedLedger,
    reporter: ErrorReporter,
}

impl IngestUseCase {
    pub fn new(store: Arc<dyn ArtifactStore>, ledger: ProcessedLedger, reporter: ErrorReporter) -> Self {
        Self { store, ledger, reporter }
    }

    pub fn ledger(&self) -> &ProcessedLedger {
        &self.ledger
    }

    /// Run one batch. With no selection every remote candidate is used.
    pub async fn run(
        &mut self,
        gateway: &dyn TransferGateway,
        mode: BatchMode,
        selection: Option<Vec<String>>,
        filter: Option<&str>,
        sink: &dyn StatusSink,
    ) -> BatchReport {
        let names = match selection {
            Some(names) => names,
            None => match gateway.list_remote_files().await {
                Ok(names) => {
                    if names.is_empty() {
                        sink.warning("No CSV files found");
                    } else {
                        sink.success(&format!("Found {} CSV files", names.len()));
                    }
                    names
                }
                Err(e) => {
                    let reason = format!("Failed to retrieve file list: {}", e);
                    sink.error(&format!("❌ {}", reason));
                    return BatchReport::halted(mode, reason);
                }
            },
        };
        let names = filter_names(names, filter);

        match mode {
            BatchMode::List => self.list(names, filter, sink),
            BatchMode::Validate => self.validate_batch(gateway, &names, sink).await,
            BatchMode::Process => self.process_batch(gateway, &names, sink).await,
        }
    }

    fn list(&self, names: Vec<String>, filter: Option<&str>, sink: &dyn StatusSink) -> BatchReport {
        let mut report = BatchReport::new(BatchMode::List);
        if let Some(term) = filter.filter(|t| !t.is_empty()) {
            if names.is_empty() {
                sink.error(&format!("❌ No files found matching '{}'", term));
            } else {
                sink.info(&format!("🔍 Filtered: showing {} files matching '{}'", names.len(), term));
            }
        }
        for name in names {
            let already_processed = self.ledger.contains(&name);
            if already_processed {
                sink.info(&format!("  {} (already processed)", name));
            } else {
                sink.info(&format!("  {}", name));
            }
            report.files.push(FileReport { name, outcome: FileOutcome::Listed { already_processed } });
        }
        sink.push(StatusLine::new(
            StatusLevel::Summary,
            format!("📁 Loaded {} files from server", report.files.len()),
        ));
        report
    }

    /// Fetch and validate each file without touching storage or the ledger.
    pub async fn validate_batch(
        &self,
        gateway: &dyn TransferGateway,
        names: &[String],
        sink: &dyn StatusSink,
    ) -> BatchReport {
        let mut report = BatchReport::new(BatchMode::Validate);
        for name in names {
            let outcome = self.validate_file(gateway, name, sink).await;
            report.files.push(FileReport { name: name.clone(), outcome });
        }
        sink.success("✅ Validation complete!");
        sink.push(StatusLine::new(
            StatusLevel::Summary,
            format!(
                "📊 Results: {} valid, {} invalid",
                report.valid(),
                report.invalid() + report.failed()
            ),
        ));
        report
    }

    async fn validate_file(&self, gateway: &dyn TransferGateway, name: &str, sink: &dyn StatusSink) -> FileOutcome {
        if self.ledger.contains(name) {
            sink.warning(&format!("⏭️ Skipping: {} (already processed)", name));
            return FileOutcome::Skipped;
        }
        sink.info(SEPARATOR);
        sink.info(&format!("🔍 Validating: {}", name));

        let bytes = match gateway.fetch(name).await {
            Ok(bytes) => bytes,
            Err(e) => {
                sink.error(&format!("❌ Error validating {}: {}", name, e));
                return FileOutcome::Failed { error: e.to_string(), correlation_id: None };
            }
        };

        if !validate_filename(name, Some(sink)) {
            sink.error(&format!("❌ INVALID: {} (filename)", name));
            return FileOutcome::Invalid { error_count: 1, records: 0 };
        }

        let result = validate_content(bytes.as_slice(), Some(sink));
        if result.is_valid {
            sink.success(&format!("✅ VALID: {} ({} records)", name, result.valid_record_count));
            FileOutcome::Valid { records: result.valid_record_count }
        } else {
            sink.error(&format!("❌ INVALID: {} ({} errors)", name, result.diagnostics.len()));
            FileOutcome::Invalid {
                error_count: result.diagnostics.len(),
                records: result.valid_record_count,
            }
        }
    }

    /// Full ingestion over `names`. No single file's failure stops the batch.
    pub async fn process_batch(
        &mut self,
        gateway: &dyn TransferGateway,
        names: &[String],
        sink: &dyn StatusSink,
    ) -> BatchReport {
        let mut report = BatchReport::new(BatchMode::Process);
        for name in names {
            let outcome = self.process_file(gateway, name, sink).await;
            report.files.push(FileReport { name: name.clone(), outcome });
        }
        sink.success("✅ Processing complete!");
        sink.push(StatusLine::new(
            StatusLevel::Summary,
            format!(
                "📊 Summary: {} archived, {} quarantined, {} failed, {} skipped",
                report.archived(),
                report.quarantined(),
                report.failed(),
                report.skipped()
            ),
        ));
        info!(
            archived = report.archived(),
            quarantined = report.quarantined(),
            failed = report.failed(),
            skipped = report.skipped(),
            "batch finished"
        );
        report
    }

    #[instrument(skip(self, gateway, sink), fields(file = %name))]
    async fn process_file(&mut self, gateway: &dyn TransferGateway, name: &str, sink: &dyn StatusSink) -> FileOutcome {
        if self.ledger.contains(name) {
            sink.warning(&format!("⏭️ Skipping: {} (already processed)", name));
            counter!("clinical_files_total", "outcome" => "skipped").increment(1);
            return FileOutcome::Skipped;
        }
        sink.info(SEPARATOR);
        sink.info(&format!("Processing: {}", name));
        let started = Instant::now();

        let outcome = match self.ingest(gateway, name, sink).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "file failed");
                self.discard_partial(name).await;
                let correlation_id = self.reporter.log(name, &format!("Fatal error: {}", e)).await;
                sink.error(&format!("  ❌ Fatal error: {} (GUID: {})", e, correlation_id));
                FileOutcome::Failed { error: e.to_string(), correlation_id: Some(correlation_id) }
            }
        };

        let label = match &outcome {
            FileOutcome::Archived { .. } => "archived",
            FileOutcome::Quarantined { .. } => "quarantined",
            _ => "failed",
        };
        counter!("clinical_files_total", "outcome" => label).increment(1);
        histogram!("clinical_file_processing_seconds").record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn ingest(&mut self, gateway: &dyn TransferGateway, name: &str, sink: &dyn StatusSink) -> Result<FileOutcome> {
        let bytes = gateway.fetch(name).await?;
        self.store.stage(name, &bytes).await?;
        sink.success("  📥 Downloaded successfully");

        if !validate_filename(name, Some(sink)) {
            self.store.quarantine(name).await?;
            let correlation_id = self.reporter.log(name, "Invalid filename pattern").await;
            sink.error(&format!("  ❌ Rejected - Invalid pattern (GUID: {})", correlation_id));
            return Ok(FileOutcome::Quarantined {
                reason: QuarantineReason::Filename,
                error_count: 1,
                correlation_id,
            });
        }

        let result = validate_content(bytes.as_slice(), Some(sink));
        if !result.is_valid {
            self.store.quarantine(name).await?;
            let summary = quarantine_summary(&result.diagnostics);
            let correlation_id = self.reporter.log(name, &summary).await;
            sink.error(&format!(
                "  ❌ Rejected ({} errors) (GUID: {})",
                result.diagnostics.len(),
                correlation_id
            ));
            for diagnostic in result.diagnostics.iter().take(QUARANTINE_SUMMARY_ERRORS) {
                sink.error(&format!("    • {}", diagnostic));
            }
            return Ok(FileOutcome::Quarantined {
                reason: QuarantineReason::Content,
                error_count: result.diagnostics.len(),
                correlation_id,
            });
        }

        match self.archive(name, &bytes, result.valid_record_count, sink).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(error = %e, "archival failed");
                self.discard_partial(name).await;
                let correlation_id = self.reporter.log(name, &format!("Archival failed: {}", e)).await;
                sink.error(&format!("  ❌ Archival error (GUID: {})", correlation_id));
                Ok(FileOutcome::Failed { error: e.to_string(), correlation_id: Some(correlation_id) })
            }
        }
    }

    async fn archive(&mut self, name: &str, bytes: &[u8], records: usize, sink: &dyn StatusSink) -> Result<FileOutcome> {
        let archive_name = self.free_archive_name(name, Local::now().date_naive()).await?;
        self.store.archive(name, &archive_name).await?;
        if let Err(e) = self.ledger.record(name) {
            // An archived file must always have a ledger entry
            if let Err(undo) = self.store.remove_archived(&archive_name).await {
                warn!(archive = %archive_name, error = %undo, "failed to roll back archived file");
            }
            return Err(e);
        }

        let sha256 = hex::encode(Sha256::digest(bytes));
        info!(archive = %archive_name, records, sha256 = %sha256, "file archived");
        sink.success(&format!("  ✅ Archived as: {} ({} records)", archive_name, records));
        Ok(FileOutcome::Archived { archive_name, records, sha256 })
    }

    // Never overwrite an archived file: add _2, _3, ... on collision
    async fn free_archive_name(&self, name: &str, date: NaiveDate) -> Result<String> {
        let base = archive_name_for(name, date);
        if !self.store.archive_exists(&base).await? {
            return Ok(base);
        }
        let stem = strip_extension(&base).to_string();
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}.{}", stem, n, FILENAME_EXTENSION);
            if !self.store.archive_exists(&candidate).await? {
                warn!(wanted = %base, using = %candidate, "archive name taken");
                return Ok(candidate);
            }
            n += 1;
        }
    }

    async fn discard_partial(&self, name: &str) {
        if let Err(e) = self.store.discard(name).await {
            warn!(file = name, error = %e, "failed to remove partial download");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_name_for() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(
            archive_name_for("CLINICALDATA20250101120000.CSV", date),
            "CLINICALDATA20250101120000_20250307.CSV"
        );
        assert_eq!(
            archive_name_for("clinicaldata20250101120000.csv", date),
            "clinicaldata20250101120000_20250307.CSV"
        );
    }

    #[test]
    fn test_quarantine_summary() {
        let one = vec!["Row 2: a".to_string()];
        assert_eq!(quarantine_summary(&one), "Row 2: a");

        let five: Vec<String> = (2..7).map(|i| format!("Row {}: x", i)).collect();
        assert_eq!(
            quarantine_summary(&five),
            "Row 2: x | Row 3: x | Row 4: x ... and 2 more"
        );
    }

    #[test]
    fn test_filter_names() {
        let names = vec!["CLINICALDATA1.CSV".to_string(), "other.csv".to_string()];
        assert_eq!(filter_names(names.clone(), Some("clinical")), vec!["CLINICALDATA1.CSV"]);
        assert_eq!(filter_names(names.clone(), Some("")), names);
        assert_eq!(filter_names(names.clone(), None), names);
        assert!(filter_names(names, Some("zzz")).is_empty());
    }

    #[test]
    fn test_report_counts() {
        let mut report = BatchReport::new(BatchMode::Process);
        report.files.push(FileReport { name: "a".into(), outcome: FileOutcome::Skipped });
        report.files.push(FileReport {
            name: "b".into(),
            outcome: FileOutcome::Failed { error: "x".into(), correlation_id: None },
        });
        assert_eq!((report.skipped(), report.failed(), report.archived()), (1, 1, 0));
        assert!(!report.is_clean());
        assert_eq!(report.outcome_of("a"), Some(&FileOutcome::Skipped));
    }
}
