#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use clinical_ingest::app::ingest_use_case::IngestUseCase;
use clinical_ingest::app::ports::{csv_candidates, GatewayConnector, TransferGateway};
use clinical_ingest::correlation::CorrelationIdGenerator;
use clinical_ingest::error::{IngestError, Result};
use clinical_ingest::error_report::ErrorReporter;
use clinical_ingest::infra::memory_store::MemoryArtifactStore;
use clinical_ingest::ledger::ProcessedLedger;
use clinical_ingest::status::StatusSink;
use tempfile::TempDir;

pub const HEADER: &str = "PatientID,TrialCode,DrugCode,Dosage_mg,StartDate,EndDate,Outcome,SideEffects,Analyst";
pub const GOOD_NAME: &str = "CLINICALDATA20250101120000.CSV";

pub fn csv_of(rows: &[&str]) -> Vec<u8> {
    let mut s = String::from(HEADER);
    for row in rows {
        s.push('\n');
        s.push_str(row);
    }
    s.push('\n');
    s.into_bytes()
}

pub fn good_csv() -> Vec<u8> {
    csv_of(&[
        "P1,T1,D1,10,2024-01-01,2024-01-02,Improved,None,A",
        "P2,T1,D1,20,2024-01-01,2024-02-01,No Change,Nausea,B",
    ])
}

/// Remote server scripted in memory; counts fetches per name.
#[derive(Default)]
pub struct FakeGateway {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    fetches: Mutex<Vec<String>>,
    fail_listing: AtomicBool,
    disconnects: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, name: &str, bytes: Vec<u8>) -> Self {
        self.files.lock().unwrap().insert(name.to_string(), bytes);
        self
    }

    pub fn failing_fetch(self, name: &str) -> Self {
        self.failing.lock().unwrap().insert(name.to_string());
        self
    }

    pub fn failing_listing(self) -> Self {
        self.fail_listing.store(true, Ordering::SeqCst);
        self
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferGateway for FakeGateway {
    async fn list_remote_files(&self) -> Result<Vec<String>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(IngestError::transfer("550 listing refused"));
        }
        Ok(csv_candidates(self.files.lock().unwrap().keys().cloned()))
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        self.fetches.lock().unwrap().push(name.to_string());
        if self.failing.lock().unwrap().contains(name) {
            return Err(IngestError::transfer(format!("transfer of '{}' aborted", name)));
        }
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| IngestError::transfer(format!("550 {}: no such file", name)))
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "fake://remote".to_string()
    }
}

/// Hands out one shared gateway, fails every attempt, or panics.
pub struct FakeConnector {
    pub gateway: Option<Arc<FakeGateway>>,
    pub attempts: AtomicUsize,
    panics: bool,
}

impl FakeConnector {
    pub fn serving(gateway: Arc<FakeGateway>) -> Self {
        Self { gateway: Some(gateway), attempts: AtomicUsize::new(0), panics: false }
    }

    pub fn refusing() -> Self {
        Self { gateway: None, attempts: AtomicUsize::new(0), panics: false }
    }

    pub fn panicking() -> Self {
        Self { gateway: None, attempts: AtomicUsize::new(0), panics: true }
    }
}

#[async_trait]
impl GatewayConnector for FakeConnector {
    async fn connect(&self, sink: &dyn StatusSink) -> Result<Arc<dyn TransferGateway>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("connector blew up");
        }
        match &self.gateway {
            Some(gateway) => {
                sink.success("✅ connected");
                Ok(gateway.clone())
            }
            None => Err(IngestError::transfer("connection refused")),
        }
    }
}

/// Use case wired to a memory store, a ledger and error report in `dir`.
pub fn use_case_in(dir: &TempDir, store: &MemoryArtifactStore) -> IngestUseCase {
    let ledger = ProcessedLedger::load(dir.path().join("processed_files.txt")).unwrap();
    let reporter = ErrorReporter::new(
        dir.path().join("error_report.log"),
        CorrelationIdGenerator::local_only(),
    );
    IngestUseCase::new(Arc::new(store.clone()), ledger, reporter)
}

pub fn error_log(dir: &TempDir) -> String {
    std::fs::read_to_string(dir.path().join("error_report.log")).unwrap_or_default()
}
