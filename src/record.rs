//! Parsed file records handed to the reconciliation store
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    TradeExtract,
    Acknowledgment,
    TransformFailure,
    #[serde(rename = "ore_error")]
    ReconciliationIssue,
    Unknown,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::TradeExtract => "trade_extract",
            RecordKind::Acknowledgment => "acknowledgment",
            RecordKind::TransformFailure => "transform_failure",
            RecordKind::ReconciliationIssue => "ore_error",
            RecordKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(rename = "TradeID")]
    pub trade_id: String,
    #[serde(rename = "Notional")]
    pub notional: f64,
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Counterparty")]
    pub counterparty: String,
}

impl Trade {
    pub fn new(trade_id: &str, notional: f64, currency: &str, counterparty: &str) -> Self {
        Self {
            trade_id: trade_id.into(),
            notional,
            currency: currency.into(),
            counterparty: counterparty.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AckStatus {
    #[serde(rename = "ACK")]
    Ack,
    #[serde(rename = "NACK")]
    Nack,
}

impl FromStr for AckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACK" => Ok(AckStatus::Ack),
            "NACK" => Ok(AckStatus::Nack),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    #[serde(rename = "TradeID")]
    pub trade_id: String,
    #[serde(rename = "Status")]
    pub status: AckStatus,
}

impl Ack {
    pub fn new(trade_id: &str, status: AckStatus) -> Self {
        Self {
            trade_id: trade_id.into(),
            status,
        }
    }
}

/// A single failed line reported by the upstream transform step.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
pub struct LineError {
    #[n(0)]
    pub line: u64,
    #[n(1)]
    #[serde(alias = "error")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformFailure {
    #[serde(default, alias = "sourceFile", alias = "file_name")]
    pub source_file: String,
    #[serde(default)]
    pub errors: Vec<LineError>,
}

/// A trade-level issue raised by the downstream risk engine (ORE).
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
pub struct Issue {
    #[n(0)]
    #[serde(rename = "TradeID")]
    pub trade_id: String,
    #[n(1)]
    #[serde(rename = "Issue")]
    pub issue: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    TradeExtract(Vec<Trade>),
    Acknowledgment(Vec<Ack>),
    TransformFailure(TransformFailure),
    ReconciliationIssue(Vec<Issue>),
    // the file could not be turned into a typed payload
    Failed { kind: RecordKind, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub source_id: String, // originating file identifier
    pub body: RecordBody,
}

impl ParsedRecord {
    pub fn new(source_id: impl Into<String>, body: RecordBody) -> Self {
        Self {
            source_id: source_id.into(),
            body,
        }
    }
    pub fn trade_extract(source_id: impl Into<String>, trades: Vec<Trade>) -> Self {
        Self::new(source_id, RecordBody::TradeExtract(trades))
    }
    pub fn acknowledgment(source_id: impl Into<String>, acks: Vec<Ack>) -> Self {
        Self::new(source_id, RecordBody::Acknowledgment(acks))
    }
    pub fn transform_failure(source_id: impl Into<String>, failure: TransformFailure) -> Self {
        Self::new(source_id, RecordBody::TransformFailure(failure))
    }
    pub fn reconciliation_issue(source_id: impl Into<String>, issues: Vec<Issue>) -> Self {
        Self::new(source_id, RecordBody::ReconciliationIssue(issues))
    }
    pub fn failed(source_id: impl Into<String>, kind: RecordKind, reason: impl Into<String>) -> Self {
        Self::new(
            source_id,
            RecordBody::Failed {
                kind,
                reason: reason.into(),
            },
        )
    }
    pub fn kind(&self) -> RecordKind {
        match &self.body {
            RecordBody::TradeExtract(_) => RecordKind::TradeExtract,
            RecordBody::Acknowledgment(_) => RecordKind::Acknowledgment,
            RecordBody::TransformFailure(_) => RecordKind::TransformFailure,
            RecordBody::ReconciliationIssue(_) => RecordKind::ReconciliationIssue,
            RecordBody::Failed { kind, .. } => *kind,
        }
    }
    pub fn error(&self) -> Option<&str> {
        match &self.body {
            RecordBody::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
