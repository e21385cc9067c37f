use anyhow::Context;
use im_reconciliation::{
    archive::{ReportArchive, ReportSink},
    error::ArchiveError,
    record::{Ack, AckStatus, LineError, ParsedRecord, RecordKind, Trade, TransformFailure},
    report::{DiscrepancyKind, ReconciliationReport, ReconciliationStatus},
    service::ReconciliationService,
};
use sled::open;
use std::sync::Arc;

use tempfile::tempdir; // Use for test db cleanup.

fn sample_trades() -> ParsedRecord {
    ParsedRecord::trade_extract(
        "outgoing/trade_extract.csv",
        vec![
            Trade::new("T001", 1_000_000.0, "USD", "ABC_BANK"),
            Trade::new("T002", 2_500_000.0, "EUR", "DEF_BANK"),
        ],
    )
}

#[test]
fn trades_then_ack_and_nack_fully_reconcile() -> anyhow::Result<()> {
    let service = ReconciliationService::new();

    let report = service.ingest(sample_trades())?;
    assert_eq!(report.status(), ReconciliationStatus::MissingAcknowledgments);

    let report = service.ingest(ParsedRecord::acknowledgment(
        "incoming/out/ack.csv",
        vec![
            Ack::new("T001", AckStatus::Ack),
            Ack::new("T002", AckStatus::Nack),
        ],
    ))?;

    assert_eq!(report.summary().total_trades_sent, 2);
    assert_eq!(report.summary().total_acknowledgments, 1);
    assert_eq!(report.summary().total_nacknowledgments, 1);
    assert_eq!(report.summary().missing_acknowledgments, 0);
    assert_eq!(report.status(), ReconciliationStatus::FullyReconciled);
    assert!(report.discrepancies().is_empty());

    // one history entry per ingested file
    assert_eq!(service.history()?.len(), 2);
    Ok(())
}

#[test]
fn trades_without_acks_are_missing() -> anyhow::Result<()> {
    let service = ReconciliationService::new();

    let report = service.ingest(sample_trades())?;

    assert_eq!(report.summary().missing_acknowledgments, 2);
    assert_eq!(report.discrepancies().len(), 1);
    let missing = report
        .discrepancy(DiscrepancyKind::MissingAcknowledgments)
        .context("missing discrepancy")?;
    assert_eq!(missing.trade_ids, vec!["T001", "T002"]);
    assert_eq!(missing.count, 2);
    assert_eq!(report.status(), ReconciliationStatus::MissingAcknowledgments);
    Ok(())
}

#[test]
fn ack_for_unsent_trade_is_unexpected() -> anyhow::Result<()> {
    let service = ReconciliationService::new();

    let report = service.ingest(ParsedRecord::acknowledgment(
        "incoming/out/ack.csv",
        vec![Ack::new("T999", AckStatus::Ack)],
    ))?;

    assert_eq!(report.discrepancies().len(), 1);
    let unexpected = &report.discrepancies()[0];
    assert_eq!(unexpected.kind, DiscrepancyKind::UnexpectedAcknowledgments);
    assert_eq!(unexpected.trade_ids, vec!["T999"]);
    assert_eq!(unexpected.count, 1);
    // no trades were sent, unexpected acks do not change that
    assert_eq!(report.status(), ReconciliationStatus::NoTrades);
    Ok(())
}

#[test]
fn transform_errors_outrank_partial_reconciliation() -> anyhow::Result<()> {
    let service = ReconciliationService::new();
    service.ingest(sample_trades())?;
    service.ingest(ParsedRecord::acknowledgment(
        "incoming/out/ack.csv",
        vec![
            Ack::new("T001", AckStatus::Ack),
            Ack::new("T002", AckStatus::Ack),
        ],
    ))?;

    let report = service.ingest(ParsedRecord::transform_failure(
        "incoming/error/partial.json",
        TransformFailure {
            source_file: "trade_extract.csv".into(),
            errors: vec![
                LineError {
                    line: 4,
                    message: "Notional is not a number".into(),
                },
                LineError {
                    line: 9,
                    message: "Unknown currency".into(),
                },
            ],
        },
    ))?;

    assert_eq!(report.summary().transform_errors, 2);
    assert_eq!(report.status(), ReconciliationStatus::TransformErrors);
    assert_eq!(report.error_groups().len(), 1);
    assert_eq!(report.error_groups()[0].as_str(), "transform_failures");
    Ok(())
}

#[test]
fn process_folder_files_and_archive_reports() -> anyhow::Result<()> {
    // Sled uses file-based locking, so each test gets its own database on temp.
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("test_archive.db"))?);
    let archive = ReportArchive::new(db)?;
    let service = ReconciliationService::new().with_archive(archive.clone());

    let trades = temp_dir.path().join("trade_extract_20240601.csv");
    std::fs::write(
        &trades,
        "TradeID,Notional,Currency,Counterparty\nT001,1000000,USD,ABC_BANK\nT002,2500000,EUR,DEF_BANK\n",
    )?;
    let acks = temp_dir.path().join("ack_20240601.csv");
    std::fs::write(&acks, "TradeID,Status\nT001,ACK\n")?;
    let ore = temp_dir.path().join("ore_errors.csv");
    std::fs::write(&ore, "TradeID,Issue\nT001,Missing yield curve\n")?;

    service.process_file(&trades)?;
    service.process_file(&acks)?;
    let outcome = service.process_file(&ore)?;

    assert!(outcome.parse_error.is_none());
    assert!(outcome.archive_error.is_none());
    let report = outcome.report.context("report for classified file")?;
    assert_eq!(report.summary().missing_acknowledgments, 1);
    assert_eq!(report.summary().ore_errors, 1);
    assert_eq!(report.status(), ReconciliationStatus::MissingAcknowledgments);
    assert_eq!(report.source_files().trade_files, vec![trades.to_string_lossy().to_string()]);

    assert_eq!(archive.len(), 3);
    let archived = archive.all()?;
    assert!(archived[0].id.starts_with("recon1"));
    assert_eq!(archived[2].report, report);
    assert_eq!(archive.latest()?.context("latest archived")?.report, report);
    Ok(())
}

#[test]
fn malformed_file_is_counted_but_not_stored() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = ReconciliationService::new();

    // no Status column
    let acks = temp_dir.path().join("ack.csv");
    std::fs::write(&acks, "TradeID\nT001\n")?;

    let outcome = service.process_file(&acks)?;
    assert!(outcome.parse_error.is_some());
    let report = outcome.report.context("report for classified file")?;
    assert!(report.source_files().ack_files.is_empty());

    assert_eq!(service.failed_files(), 1);
    assert_eq!(service.history()?.len(), 1);
    Ok(())
}

#[test]
fn unclassified_files_are_counted_without_reconciling() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = ReconciliationService::new();

    let unknown = temp_dir.path().join(".DS_Store");
    std::fs::write(&unknown, "junk")?;
    let notes = temp_dir.path().join("notes.txt");
    std::fs::write(&notes, "hello")?;

    for path in [&unknown, &notes, &unknown] {
        let outcome = service.process_file(path)?;
        assert_eq!(outcome.kind, RecordKind::Unknown);
        assert!(outcome.parse_error.is_some());
        assert!(outcome.report.is_none());
    }

    assert_eq!(service.failed_files(), 3);
    assert!(service.history()?.is_empty());
    assert!(service.latest()?.is_none());
    Ok(())
}

#[test]
fn unknown_ack_status_rows_are_skipped() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = ReconciliationService::new();
    service.ingest(sample_trades())?;

    let acks = temp_dir.path().join("ack.csv");
    std::fs::write(&acks, "TradeID,Status\nT001,ACK\nT002,PENDING\nT003,ack\n")?;

    let outcome = service.process_file(&acks)?;

    assert!(outcome.parse_error.is_none());
    let report = outcome.report.context("report for classified file")?;
    assert_eq!(report.summary().total_acknowledgments, 1);
    assert_eq!(report.summary().total_nacknowledgments, 0);
    let missing = report
        .discrepancy(DiscrepancyKind::MissingAcknowledgments)
        .context("missing discrepancy")?;
    assert_eq!(missing.trade_ids, vec!["T002"]);
    // lowercase statuses are not recognised, so T003 is not unexpected either
    assert!(report.discrepancy(DiscrepancyKind::UnexpectedAcknowledgments).is_none());
    assert_eq!(service.failed_files(), 0);
    Ok(())
}

struct FailingSink;

impl ReportSink for FailingSink {
    fn append(&self, _report: &ReconciliationReport) -> Result<String, ArchiveError> {
        Err(ArchiveError::Encode("disk full".into()))
    }
}

#[test]
fn archive_failure_does_not_undo_ingest() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = ReconciliationService::new().with_archive(FailingSink);

    let report = service.ingest(sample_trades())?;
    assert_eq!(report.summary().total_trades_sent, 2);

    let acks = temp_dir.path().join("ack.csv");
    std::fs::write(&acks, "TradeID,Status\nT001,ACK\nT002,NACK\n")?;
    let outcome = service.process_file(&acks)?;

    assert!(outcome.archive_error.is_some());
    assert!(outcome.parse_error.is_none());
    let report = outcome.report.context("report for classified file")?;
    assert_eq!(report.status(), ReconciliationStatus::FullyReconciled);

    // both records applied and reported even though neither was archived
    assert_eq!(service.history()?.len(), 2);
    assert_eq!(service.archive_failures(), 2);
    assert_eq!(service.failed_files(), 0);
    Ok(())
}

#[test]
fn batch_processing_continues_past_bad_files() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = ReconciliationService::new();

    let vanished = temp_dir.path().join("trades_gone.csv");
    let unknown = temp_dir.path().join("notes.txt");
    std::fs::write(&unknown, "hello")?;
    let trades = temp_dir.path().join("trade_extract.csv");
    std::fs::write(
        &trades,
        "TradeID,Notional,Currency,Counterparty\nT001,1000000,USD,ABC_BANK\n",
    )?;

    let outcomes = service.process_files([&vanished, &unknown, &trades]);

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].parse_error.is_some());
    assert!(outcomes[1].report.is_none());
    let report = outcomes[2].report.as_ref().context("report for trades")?;
    assert_eq!(report.summary().total_trades_sent, 1);
    assert_eq!(service.failed_files(), 2);
    assert_eq!(service.history()?.len(), 2);
    Ok(())
}

#[test]
fn oversized_file_is_rejected() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let service = ReconciliationService::new().with_max_file_size(16);

    let trades = temp_dir.path().join("trades.csv");
    std::fs::write(
        &trades,
        "TradeID,Notional,Currency,Counterparty\nT001,1000000,USD,ABC_BANK\n",
    )?;

    let outcome = service.process_file(&trades)?;

    assert!(outcome.parse_error.is_some());
    let report = outcome.report.context("report for classified file")?;
    assert_eq!(report.summary().total_trades_sent, 0);
    Ok(())
}

#[test]
fn concurrent_ingestion_never_loses_a_file() -> anyhow::Result<()> {
    let service = Arc::new(ReconciliationService::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || {
                service.ingest(ParsedRecord::trade_extract(
                    format!("outgoing/trades_{i}.csv"),
                    vec![Trade::new(&format!("T{i:03}"), 1.0, "USD", "ABC_BANK")],
                ))
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("ingest thread panicked")?;
    }

    let latest = service.latest()?.context("latest report")?;
    assert_eq!(latest.summary().total_trades_sent, 8);
    assert_eq!(service.history()?.len(), 8);
    Ok(())
}

#[test]
fn clear_resets_store_but_keeps_history() -> anyhow::Result<()> {
    let service = ReconciliationService::new();
    service.ingest(sample_trades())?;

    service.clear()?;
    let report = service.ingest(ParsedRecord::acknowledgment("incoming/out/ack.csv", vec![]))?;

    assert_eq!(report.status(), ReconciliationStatus::NoTrades);
    assert_eq!(service.history()?.len(), 2);
    Ok(())
}
