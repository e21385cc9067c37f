//! File classification and parsing
//!
//! Turns a raw file into a typed [`ParsedRecord`]. Classification is a plain
//! function of the file name so the reconciliation core only ever sees
//! records that are already typed.
use crate::error::ParseError;
use crate::record::{Ack, AckStatus, Issue, ParsedRecord, RecordKind, Trade, TransformFailure};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Pick a record kind from the extension and the tokens of the file stem.
pub fn classify(path: &Path) -> RecordKind {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    let tokens: Vec<&str> = stem
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(t));

    match extension.as_str() {
        "json" => RecordKind::TransformFailure,
        "csv" if has(&["ore"]) => RecordKind::ReconciliationIssue,
        "csv" if has(&["ack", "acks", "nack", "nacks", "acknowledgment", "acknowledgments"]) => {
            RecordKind::Acknowledgment
        }
        "csv" if has(&["trade", "trades", "extract"]) => RecordKind::TradeExtract,
        _ => RecordKind::Unknown,
    }
}

/// Classify, size-check and parse a file. The path is the record's source id.
pub fn parse_file(path: &Path, max_size: u64) -> Result<ParsedRecord, ParseError> {
    let kind = classify(path);
    if kind == RecordKind::Unknown {
        return Err(ParseError::Unclassified(path.to_path_buf()));
    }

    let size = std::fs::metadata(path)
        .map_err(|e| ParseError::Io(path.to_path_buf(), e))?
        .len();
    if size > max_size {
        return Err(ParseError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit: max_size,
        });
    }

    let text =
        std::fs::read_to_string(path).map_err(|e| ParseError::Io(path.to_path_buf(), e))?;

    parse_str(kind, &path.to_string_lossy(), &text)
}

/// Parse in-memory file contents of a known kind.
pub fn parse_str(kind: RecordKind, source_id: &str, text: &str) -> Result<ParsedRecord, ParseError> {
    let record = match kind {
        RecordKind::TradeExtract => ParsedRecord::trade_extract(source_id, read_rows::<Trade>(text)?),
        RecordKind::Acknowledgment => ParsedRecord::acknowledgment(source_id, read_acks(text)?),
        RecordKind::TransformFailure => {
            let failure: TransformFailure = serde_json::from_str(text)?;
            ParsedRecord::transform_failure(source_id, failure)
        }
        RecordKind::ReconciliationIssue => {
            ParsedRecord::reconciliation_issue(source_id, read_rows::<Issue>(text)?)
        }
        RecordKind::Unknown => return Err(ParseError::Unclassified(source_id.into())),
    };

    debug!(source = source_id, %kind, "parsed file");
    Ok(record)
}

fn read_rows<T: for<'de> Deserialize<'de>>(text: &str) -> Result<Vec<T>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = vec![];
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

#[derive(Deserialize)]
struct AckRow {
    #[serde(rename = "TradeID")]
    trade_id: String,
    #[serde(rename = "Status")]
    status: String,
}

/// Rows whose status is neither `ACK` nor `NACK` are dropped with a warning.
fn read_acks(text: &str) -> Result<Vec<Ack>, ParseError> {
    let acks = read_rows::<AckRow>(text)?
        .into_iter()
        .filter_map(|row| match row.status.parse::<AckStatus>() {
            Ok(status) => Some(Ack {
                trade_id: row.trade_id,
                status,
            }),
            Err(status) => {
                warn!(trade_id = %row.trade_id, %status, "skipping row with unknown acknowledgment status");
                None
            }
        })
        .collect();
    Ok(acks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_stem_tokens() {
        assert_eq!(classify(Path::new("outgoing/trade_extract_0601.csv")), RecordKind::TradeExtract);
        assert_eq!(classify(Path::new("incoming/out/NACK-20240601.csv")), RecordKind::Acknowledgment);
        assert_eq!(classify(Path::new("incoming/error/ore_errors.csv")), RecordKind::ReconciliationIssue);
        assert_eq!(classify(Path::new("incoming/error/partial.json")), RecordKind::TransformFailure);
        // "score" must not be read as an ORE report
        assert_eq!(classify(Path::new("score.csv")), RecordKind::Unknown);
        assert_eq!(classify(Path::new("trades.txt")), RecordKind::Unknown);
    }

    #[test]
    fn parses_trade_extract() {
        let text = "TradeID,Notional,Currency,Counterparty\nT001,1000000,USD,ABC_BANK\nT002,2500000,EUR,DEF_BANK\n";

        let record = parse_str(RecordKind::TradeExtract, "trades.csv", text).unwrap();

        assert_eq!(
            record,
            ParsedRecord::trade_extract(
                "trades.csv",
                vec![
                    Trade::new("T001", 1_000_000.0, "USD", "ABC_BANK"),
                    Trade::new("T002", 2_500_000.0, "EUR", "DEF_BANK"),
                ]
            )
        );
    }

    #[test]
    fn unknown_ack_status_rows_are_skipped() {
        let text = "TradeID,Status\nT001,ACK\nT002,PENDING\nT003,nack\nT004, NACK \n";

        let record = parse_str(RecordKind::Acknowledgment, "ack.csv", text).unwrap();

        assert_eq!(
            record,
            ParsedRecord::acknowledgment(
                "ack.csv",
                vec![
                    Ack::new("T001", AckStatus::Ack),
                    Ack::new("T004", AckStatus::Nack),
                ]
            )
        );
    }

    #[test]
    fn transform_failure_accepts_legacy_field_names() {
        let text = r#"{"file_name": "trades.csv", "errors": [{"line": 3, "error": "bad notional"}]}"#;

        let record = parse_str(RecordKind::TransformFailure, "err.json", text).unwrap();

        match record.body {
            crate::record::RecordBody::TransformFailure(failure) => {
                assert_eq!(failure.source_file, "trades.csv");
                assert_eq!(failure.errors[0].line, 3);
                assert_eq!(failure.errors[0].message, "bad notional");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn missing_column_is_a_parse_error() {
        let text = "TradeID,Currency\nT001,USD\n";

        assert!(parse_str(RecordKind::TradeExtract, "trades.csv", text).is_err());
    }
}
