//! Cross-file reconciliation over the store
use crate::record::{AckStatus, Issue, LineError, ParsedRecord};
use crate::report::{
    Discrepancy, DiscrepancyKind, ErrorGroup, ReconciliationReport, ReconciliationStatus,
    SourceFiles, Summary, TimeStamp,
};
use crate::store::{ErrorReport, ReconciliationStore};
use std::collections::BTreeSet;
use tracing::debug;

/// First matching rule wins.
pub fn classify_status(
    trades_sent: u64,
    missing_acks: u64,
    transform_errors: u64,
    ore_errors: u64,
) -> ReconciliationStatus {
    if trades_sent == 0 {
        ReconciliationStatus::NoTrades
    } else if missing_acks == 0 && transform_errors == 0 && ore_errors == 0 {
        ReconciliationStatus::FullyReconciled
    } else if missing_acks > 0 {
        ReconciliationStatus::MissingAcknowledgments
    } else if transform_errors > 0 {
        ReconciliationStatus::TransformErrors
    } else if ore_errors > 0 {
        ReconciliationStatus::OreErrors
    } else {
        // unreachable under the rules above, kept for future partial matching
        ReconciliationStatus::PartiallyReconciled
    }
}

/// Recompute the full report from the store's current contents. Total over
/// every store state, including an empty one.
pub fn reconcile(store: &ReconciliationStore) -> ReconciliationReport {
    let mut total_trades_sent = 0u64;
    let mut trade_universe = BTreeSet::new();

    for trades in store.trade_extracts().values() {
        total_trades_sent += trades.len() as u64;
        trade_universe.extend(
            trades
                .iter()
                .filter(|t| !t.trade_id.is_empty())
                .map(|t| t.trade_id.as_str()),
        );
    }

    let mut total_acks = 0u64;
    let mut total_nacks = 0u64;
    let mut acknowledged = BTreeSet::new();
    let mut nacked = BTreeSet::new();

    for acks in store.acknowledgments().values() {
        for ack in acks {
            // counts are per record, the sets are per trade id
            let set = match ack.status {
                AckStatus::Ack => {
                    total_acks += 1;
                    &mut acknowledged
                }
                AckStatus::Nack => {
                    total_nacks += 1;
                    &mut nacked
                }
            };
            if !ack.trade_id.is_empty() {
                set.insert(ack.trade_id.as_str());
            }
        }
    }

    let missing: Vec<String> = trade_universe
        .iter()
        .filter(|id| !acknowledged.contains(*id) && !nacked.contains(*id))
        .map(|id| id.to_string())
        .collect();
    let unexpected: Vec<String> = acknowledged
        .union(&nacked)
        .filter(|id| !trade_universe.contains(*id))
        .map(|id| id.to_string())
        .collect();

    let mut transform_errors: Vec<LineError> = vec![];
    let mut ore_errors: Vec<Issue> = vec![];

    for report in store.issues().values() {
        match report {
            ErrorReport::Transform(failure) => transform_errors.extend(failure.errors.iter().cloned()),
            ErrorReport::Ore(issues) => ore_errors.extend(issues.iter().cloned()),
        }
    }

    let summary = Summary {
        total_trades_sent,
        total_acknowledgments: total_acks,
        total_nacknowledgments: total_nacks,
        missing_acknowledgments: missing.len() as u64,
        transform_errors: transform_errors.len() as u64,
        ore_errors: ore_errors.len() as u64,
        reconciliation_status: classify_status(
            total_trades_sent,
            missing.len() as u64,
            transform_errors.len() as u64,
            ore_errors.len() as u64,
        ),
    };

    let mut discrepancies = vec![];
    for (kind, trade_ids) in [
        (DiscrepancyKind::MissingAcknowledgments, missing),
        (DiscrepancyKind::UnexpectedAcknowledgments, unexpected),
    ] {
        if !trade_ids.is_empty() {
            discrepancies.push(Discrepancy {
                kind,
                count: trade_ids.len() as u64,
                trade_ids,
            });
        }
    }

    let mut error_groups = vec![];
    if !transform_errors.is_empty() {
        error_groups.push(ErrorGroup::TransformFailures {
            count: transform_errors.len() as u64,
            errors: transform_errors,
        });
    }
    if !ore_errors.is_empty() {
        error_groups.push(ErrorGroup::OreErrors {
            count: ore_errors.len() as u64,
            errors: ore_errors,
        });
    }

    debug!(
        status = %summary.reconciliation_status,
        trades = summary.total_trades_sent,
        missing = summary.missing_acknowledgments,
        "reconciled"
    );

    ReconciliationReport {
        timestamp: TimeStamp::new(),
        source_files: SourceFiles {
            trade_files: store.trade_extracts().keys().cloned().collect(),
            ack_files: store.acknowledgments().keys().cloned().collect(),
            error_files: store.issues().keys().cloned().collect(),
        },
        summary,
        discrepancies,
        error_groups,
    }
}

/// Append-only log of computed reports.
#[derive(Debug, Default)]
pub struct ReportHistory {
    reports: Vec<ReconciliationReport>,
}

impl ReportHistory {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn append(&mut self, report: ReconciliationReport) {
        self.reports.push(report);
    }
    /// `None` until the first report is appended.
    pub fn latest(&self) -> Option<&ReconciliationReport> {
        self.reports.last()
    }
    pub fn all(&self) -> &[ReconciliationReport] {
        &self.reports
    }
    pub fn len(&self) -> usize {
        self.reports.len()
    }
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

/// Owns the store and the report history. Callers that share an engine
/// across threads must hold one lock around `ingest`.
#[derive(Debug, Default)]
pub struct ReconciliationEngine {
    store: ReconciliationStore,
    history: ReportHistory,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, record: ParsedRecord) -> bool {
        self.store.put(record)
    }

    /// Recompute over the whole store and record the result in history.
    pub fn reconcile_all(&mut self) -> ReconciliationReport {
        let report = reconcile(&self.store);
        self.history.append(report.clone());
        report
    }

    /// One `put` followed by one full recomputation.
    pub fn ingest(&mut self, record: ParsedRecord) -> ReconciliationReport {
        self.put(record);
        self.reconcile_all()
    }

    /// Empties the store. History is left untouched.
    pub fn clear_data(&mut self) {
        self.store.clear();
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }
    pub fn history(&self) -> &ReportHistory {
        &self.history
    }
    pub fn latest(&self) -> Option<&ReconciliationReport> {
        self.history.latest()
    }
}
