//! Reconciliation report snapshots
use crate::record::{Issue, LineError};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Serialize, Serializer};
use std::fmt::{self, Write};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl Serialize for TimeStamp<Utc> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    #[n(0)]
    NoTrades,
    #[n(1)]
    FullyReconciled,
    #[n(2)]
    MissingAcknowledgments,
    #[n(3)]
    TransformErrors,
    #[n(4)]
    OreErrors,
    #[n(5)]
    PartiallyReconciled,
}

impl ReconciliationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationStatus::NoTrades => "NO_TRADES",
            ReconciliationStatus::FullyReconciled => "FULLY_RECONCILED",
            ReconciliationStatus::MissingAcknowledgments => "MISSING_ACKNOWLEDGMENTS",
            ReconciliationStatus::TransformErrors => "TRANSFORM_ERRORS",
            ReconciliationStatus::OreErrors => "ORE_ERRORS",
            ReconciliationStatus::PartiallyReconciled => "PARTIALLY_RECONCILED",
        }
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, minicbor::Encode, minicbor::Decode,
)]
pub struct SourceFiles {
    #[n(0)]
    pub trade_files: Vec<String>,
    #[n(1)]
    pub ack_files: Vec<String>,
    #[n(2)]
    pub error_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, minicbor::Encode, minicbor::Decode)]
pub struct Summary {
    #[n(0)]
    pub total_trades_sent: u64, // trade rows, duplicates across files included
    #[n(1)]
    pub total_acknowledgments: u64,
    #[n(2)]
    pub total_nacknowledgments: u64,
    #[n(3)]
    pub missing_acknowledgments: u64,
    #[n(4)]
    pub transform_errors: u64,
    #[n(5)]
    pub ore_errors: u64,
    #[n(6)]
    pub reconciliation_status: ReconciliationStatus,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    #[n(0)]
    MissingAcknowledgments,
    #[n(1)]
    UnexpectedAcknowledgments,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::MissingAcknowledgments => "missing_acknowledgments",
            DiscrepancyKind::UnexpectedAcknowledgments => "unexpected_acknowledgments",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, minicbor::Encode, minicbor::Decode)]
pub struct Discrepancy {
    #[n(0)]
    #[serde(rename = "type")]
    pub kind: DiscrepancyKind,
    #[n(1)]
    pub trade_ids: Vec<String>, // sorted
    #[n(2)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, minicbor::Encode, minicbor::Decode)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorGroup {
    #[n(0)]
    TransformFailures {
        #[n(0)]
        errors: Vec<LineError>,
        #[n(1)]
        count: u64,
    },
    #[n(1)]
    OreErrors {
        #[n(0)]
        errors: Vec<Issue>,
        #[n(1)]
        count: u64,
    },
}

impl ErrorGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorGroup::TransformFailures { .. } => "transform_failures",
            ErrorGroup::OreErrors { .. } => "ore_errors",
        }
    }
    pub fn count(&self) -> u64 {
        match self {
            ErrorGroup::TransformFailures { count, .. } | ErrorGroup::OreErrors { count, .. } => {
                *count
            }
        }
    }
}

/// One immutable snapshot of the full reconciliation state. Only the engine
/// builds these; everything else reads through the accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, minicbor::Encode, minicbor::Decode)]
pub struct ReconciliationReport {
    #[n(0)]
    pub(crate) timestamp: TimeStamp<Utc>,
    #[n(1)]
    pub(crate) source_files: SourceFiles,
    #[n(2)]
    pub(crate) summary: Summary,
    #[n(3)]
    pub(crate) discrepancies: Vec<Discrepancy>,
    #[n(4)]
    pub(crate) error_groups: Vec<ErrorGroup>,
}

impl ReconciliationReport {
    pub fn timestamp(&self) -> &TimeStamp<Utc> {
        &self.timestamp
    }
    pub fn source_files(&self) -> &SourceFiles {
        &self.source_files
    }
    pub fn summary(&self) -> &Summary {
        &self.summary
    }
    pub fn discrepancies(&self) -> &[Discrepancy] {
        &self.discrepancies
    }
    pub fn error_groups(&self) -> &[ErrorGroup] {
        &self.error_groups
    }

    pub fn status(&self) -> ReconciliationStatus {
        self.summary.reconciliation_status
    }

    pub fn discrepancy(&self, kind: DiscrepancyKind) -> Option<&Discrepancy> {
        self.discrepancies.iter().find(|d| d.kind == kind)
    }

    /// Plain-text rendering used as the searchable document for this report.
    pub fn to_document(&self) -> String {
        let s = &self.summary;
        let mut doc = String::new();

        // writing into a String cannot fail
        let _ = writeln!(doc, "Reconciliation Status: {}", s.reconciliation_status);
        let _ = writeln!(doc, "Timestamp: {}", self.timestamp.to_datetime_utc().to_rfc3339());
        let _ = writeln!(doc, "Total Trades Sent: {}", s.total_trades_sent);
        let _ = writeln!(doc, "Total Acknowledgments: {}", s.total_acknowledgments);
        let _ = writeln!(doc, "Total Nacknowledgments: {}", s.total_nacknowledgments);
        let _ = writeln!(doc, "Missing Acknowledgments: {}", s.missing_acknowledgments);
        let _ = writeln!(doc, "Transform Errors: {}", s.transform_errors);
        let _ = writeln!(doc, "ORE Errors: {}", s.ore_errors);

        for d in &self.discrepancies {
            let _ = writeln!(
                doc,
                "Discrepancy: {} - {} items ({})",
                d.kind.as_str(),
                d.count,
                d.trade_ids.join(", ")
            );
        }
        for group in &self.error_groups {
            let _ = writeln!(doc, "Error: {} - {} items", group.as_str(), group.count());
        }

        doc
    }
}
