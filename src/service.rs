//! Service layer API for file ingestion and reconciliation
use crate::archive::ReportSink;
use crate::error::ParseError;
use crate::engine::ReconciliationEngine;
use crate::ingest;
use crate::record::{ParsedRecord, RecordKind};
use crate::report::ReconciliationReport;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

/// What happened to a single processed file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub source_id: String,
    pub kind: RecordKind,
    pub parse_error: Option<String>,
    pub archive_error: Option<String>,
    pub report: Option<ReconciliationReport>, // None when no parser matched the file
}

pub struct ReconciliationService {
    engine: Mutex<ReconciliationEngine>,
    archive: Option<Box<dyn ReportSink>>,
    max_file_size: u64,
    failed_files: AtomicUsize,
    archive_failures: AtomicUsize,
}

impl Default for ReconciliationService {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationService {
    pub fn new() -> Self {
        Self {
            engine: Mutex::new(ReconciliationEngine::new()),
            archive: None,
            max_file_size: ingest::DEFAULT_MAX_FILE_SIZE,
            failed_files: AtomicUsize::new(0),
            archive_failures: AtomicUsize::new(0),
        }
    }

    pub fn with_archive(mut self, archive: impl ReportSink + 'static) -> Self {
        self.archive = Some(Box::new(archive));
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, ReconciliationEngine>> {
        self.engine
            .lock()
            .map_err(|_| anyhow::anyhow!("reconciliation engine lock poisoned"))
    }

    /// Put a record and recompute, as one critical section. A failing archive
    /// does not undo the ingest; it is logged and counted instead.
    pub fn ingest(&self, record: ParsedRecord) -> anyhow::Result<ReconciliationReport> {
        Ok(self.ingest_and_archive(record)?.0)
    }

    fn ingest_and_archive(
        &self,
        record: ParsedRecord,
    ) -> anyhow::Result<(ReconciliationReport, Option<String>)> {
        let mut engine = self.lock()?;
        let report = engine.ingest(record);

        // archived while still locked so archive order matches history order
        let archive_error = match &self.archive {
            Some(archive) => match archive.append(&report) {
                Ok(_) => None,
                Err(e) => {
                    self.archive_failures.fetch_add(1, Ordering::Relaxed);
                    error!(error = %e, "failed to archive reconciliation report");
                    Some(e.to_string())
                }
            },
            None => None,
        };

        Ok((report, archive_error))
    }

    /// Classify and parse a file, then ingest it. Files with no matching
    /// parser are counted and skipped. A classified file that fails to parse
    /// still triggers a recomputation but never reaches the store.
    pub fn process_file(&self, path: &Path) -> anyhow::Result<FileOutcome> {
        let source_id = path.to_string_lossy().to_string();
        let kind = ingest::classify(path);

        if kind == RecordKind::Unknown {
            self.failed_files.fetch_add(1, Ordering::Relaxed);
            warn!(source = %source_id, "no parser found for file");
            return Ok(FileOutcome {
                parse_error: Some(ParseError::Unclassified(path.to_path_buf()).to_string()),
                source_id,
                kind,
                archive_error: None,
                report: None,
            });
        }

        let record = match ingest::parse_file(path, self.max_file_size) {
            Ok(record) => record,
            Err(e) => {
                self.failed_files.fetch_add(1, Ordering::Relaxed);
                error!(source = %source_id, error = %e, "error processing file");
                ParsedRecord::failed(source_id.clone(), kind, e.to_string())
            }
        };
        let parse_error = record.error().map(str::to_string);

        let (report, archive_error) = self.ingest_and_archive(record)?;
        info!(
            source = %source_id,
            %kind,
            status = %report.status(),
            "processed file for reconciliation"
        );

        Ok(FileOutcome {
            source_id,
            kind,
            parse_error,
            archive_error,
            report: Some(report),
        })
    }

    /// Process each file in turn. A file that errors is logged and dropped
    /// from the result; the files after it are still processed.
    pub fn process_files<I>(&self, paths: I) -> Vec<FileOutcome>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        paths
            .into_iter()
            .filter_map(|path| match self.process_file(path.as_ref()) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!(path = %path.as_ref().display(), error = %e, "error processing file");
                    None
                }
            })
            .collect()
    }

    pub fn latest(&self) -> anyhow::Result<Option<ReconciliationReport>> {
        Ok(self.lock()?.latest().cloned())
    }

    pub fn history(&self) -> anyhow::Result<Vec<ReconciliationReport>> {
        Ok(self.lock()?.history().all().to_vec())
    }

    /// Clears the store only. History and archive keep their reports.
    pub fn clear(&self) -> anyhow::Result<()> {
        self.lock()?.clear_data();
        Ok(())
    }

    pub fn failed_files(&self) -> usize {
        self.failed_files.load(Ordering::Relaxed)
    }

    pub fn archive_failures(&self) -> usize {
        self.archive_failures.load(Ordering::Relaxed)
    }
}
