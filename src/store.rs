//! Per-source accumulation of parsed records
use crate::record::{Ack, Issue, ParsedRecord, RecordBody, Trade, TransformFailure};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Error-report payloads share one mapping in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorReport {
    Transform(TransformFailure),
    Ore(Vec<Issue>),
}

// Sorted maps keep source listings stable between recomputations.
#[derive(Debug, Default)]
pub struct ReconciliationStore {
    trade_extracts: BTreeMap<String, Vec<Trade>>,
    acknowledgments: BTreeMap<String, Vec<Ack>>,
    issues: BTreeMap<String, ErrorReport>,
}

impl ReconciliationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a record into the mapping for its kind, replacing any earlier
    /// entry for the same source. Returns `false` without touching the store
    /// when the record carries a parse error.
    pub fn put(&mut self, record: ParsedRecord) -> bool {
        let ParsedRecord { source_id, body } = record;

        let kind = match body {
            RecordBody::TradeExtract(trades) => {
                self.trade_extracts.insert(source_id.clone(), trades);
                "trade_extract"
            }
            RecordBody::Acknowledgment(acks) => {
                self.acknowledgments.insert(source_id.clone(), acks);
                "acknowledgment"
            }
            RecordBody::TransformFailure(failure) => {
                self.issues
                    .insert(source_id.clone(), ErrorReport::Transform(failure));
                "transform_failure"
            }
            RecordBody::ReconciliationIssue(issues) => {
                self.issues.insert(source_id.clone(), ErrorReport::Ore(issues));
                "ore_error"
            }
            RecordBody::Failed { kind, reason } => {
                warn!(source = %source_id, %kind, %reason, "file has parsing errors, not stored");
                return false;
            }
        };

        info!(source = %source_id, kind, "added file data");
        true
    }

    pub fn clear(&mut self) {
        self.trade_extracts.clear();
        self.acknowledgments.clear();
        self.issues.clear();
        info!("cleared all reconciliation data");
    }

    pub fn trade_extracts(&self) -> &BTreeMap<String, Vec<Trade>> {
        &self.trade_extracts
    }
    pub fn acknowledgments(&self) -> &BTreeMap<String, Vec<Ack>> {
        &self.acknowledgments
    }
    pub fn issues(&self) -> &BTreeMap<String, ErrorReport> {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.trade_extracts.is_empty() && self.acknowledgments.is_empty() && self.issues.is_empty()
    }
}
