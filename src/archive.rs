//! Disk-backed archive of reconciliation reports
use crate::error::ArchiveError;
use crate::report::ReconciliationReport;
use crate::utils;
use sled::IVec;
use std::sync::Arc;
use tracing::info;

const TREE: &str = "reports";
const DOC_HRP: &str = "recon";

#[derive(Debug, minicbor::Encode, minicbor::Decode)]
struct Envelope {
    #[n(0)]
    digest: String, // sha256 of `report`
    #[n(1)]
    report: Vec<u8>, // cbor encoded ReconciliationReport
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedReport {
    pub id: String, // bech32 document id
    pub report: ReconciliationReport,
}

/// Destination for every report the service produces.
pub trait ReportSink: Send + Sync {
    fn append(&self, report: &ReconciliationReport) -> Result<String, ArchiveError>;
}

#[derive(Clone)]
pub struct ReportArchive {
    instance: Arc<sled::Db>,
    tree: sled::Tree,
}

impl ReportArchive {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, ArchiveError> {
        let tree = instance.open_tree(TREE)?;
        Ok(Self { instance, tree })
    }

    /// Store a report under a fresh time-ordered key and return its document id.
    pub fn append(&self, report: &ReconciliationReport) -> Result<String, ArchiveError> {
        let encoded = minicbor::to_vec(report).map_err(|e| ArchiveError::Encode(e.to_string()))?;
        let envelope = Envelope {
            digest: sha256::digest(encoded.as_slice()),
            report: encoded,
        };
        let value = minicbor::to_vec(&envelope).map_err(|e| ArchiveError::Encode(e.to_string()))?;

        let key = utils::new_report_key();
        self.tree.insert(key, value)?;
        self.instance.flush()?;

        let id = document_id(&key)?;
        info!(id = %id, status = %report.status(), "archived reconciliation report");
        Ok(id)
    }

    pub fn latest(&self) -> Result<Option<ArchivedReport>, ArchiveError> {
        match self.tree.last()? {
            Some((key, value)) => Ok(Some(decode_entry(&key, &value)?)),
            None => Ok(None),
        }
    }

    /// Every archived report, oldest first.
    pub fn all(&self) -> Result<Vec<ArchivedReport>, ArchiveError> {
        self.tree
            .iter()
            .map(|entry| {
                let (key, value) = entry?;
                decode_entry(&key, &value)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl ReportSink for ReportArchive {
    fn append(&self, report: &ReconciliationReport) -> Result<String, ArchiveError> {
        ReportArchive::append(self, report)
    }
}

fn document_id(key: &[u8]) -> Result<String, ArchiveError> {
    utils::key_to_bech32(DOC_HRP, key).map_err(|e| ArchiveError::DocumentId(e.to_string()))
}

fn decode_entry(key: &IVec, value: &IVec) -> Result<ArchivedReport, ArchiveError> {
    let id = document_id(key)?;
    let envelope: Envelope = minicbor::decode(value)?;

    if sha256::digest(envelope.report.as_slice()) != envelope.digest {
        return Err(ArchiveError::DigestMismatch(id));
    }

    let report: ReconciliationReport = minicbor::decode(&envelope.report)?;
    Ok(ArchivedReport { id, report })
}
