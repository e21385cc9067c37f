//! Keyword routing of reconciliation questions
use crate::report::{DiscrepancyKind, ErrorGroup, ReconciliationReport};
use std::fmt::Write;

const NO_DATA: &str =
    "No recent reconciliation data available. Please ensure files have been processed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    FailedTrades,
    MissingConfirmations,
    TradeCountComparison,
    ReconciliationStatus,
    TransformErrors,
    OreErrors,
    General,
}

impl QueryKind {
    /// First matching phrase group wins.
    pub fn classify(question: &str) -> Self {
        let q = question.to_lowercase();
        let any = |phrases: &[&str]| phrases.iter().any(|p| q.contains(p));

        if any(&["trades failed", "failed trades"]) {
            QueryKind::FailedTrades
        } else if any(&["missing trade confirmations", "missing confirmations", "missing acks"]) {
            QueryKind::MissingConfirmations
        } else if any(&["total trade count", "ack vs outgoing", "trade count"]) {
            QueryKind::TradeCountComparison
        } else if any(&["reconciliation status", "latest status"]) {
            QueryKind::ReconciliationStatus
        } else if any(&["transform errors", "transformation failures", "transform failures"]) {
            QueryKind::TransformErrors
        } else if any(&["ore errors", "reconciliation errors"]) {
            QueryKind::OreErrors
        } else {
            QueryKind::General
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub kind: QueryKind,
    pub text: String,
}

/// Answer a question from the most recent report, if there is one.
pub fn answer(latest: Option<&ReconciliationReport>, question: &str) -> Answer {
    let kind = QueryKind::classify(question);
    let text = match latest {
        None => NO_DATA.to_string(),
        Some(report) => render(kind, report),
    };
    Answer { kind, text }
}

fn render(kind: QueryKind, report: &ReconciliationReport) -> String {
    let s = &report.summary;
    let mut out = String::new();

    match kind {
        QueryKind::FailedTrades => {
            let failed = s.total_nacknowledgments + s.transform_errors + s.ore_errors;
            if failed == 0 {
                out.push_str("No failed trades found. All reconciliations appear to be successful.");
            } else {
                let _ = write!(
                    out,
                    "{failed} failures: {} NACKs, {} transform errors, {} ORE errors.",
                    s.total_nacknowledgments, s.transform_errors, s.ore_errors
                );
            }
        }
        QueryKind::MissingConfirmations => {
            match report.discrepancy(DiscrepancyKind::MissingAcknowledgments) {
                Some(d) => {
                    let _ = write!(
                        out,
                        "{} trades are missing confirmations: {}",
                        d.count,
                        d.trade_ids.join(", ")
                    );
                }
                None => out.push_str(
                    "No missing trade confirmations found. All trades appear to be acknowledged.",
                ),
            }
        }
        QueryKind::TradeCountComparison => {
            let _ = write!(
                out,
                "Trades sent: {}, ACKs: {}, NACKs: {}, missing: {}",
                s.total_trades_sent,
                s.total_acknowledgments,
                s.total_nacknowledgments,
                s.missing_acknowledgments
            );
            if let Some(d) = report.discrepancy(DiscrepancyKind::UnexpectedAcknowledgments) {
                let _ = write!(out, ", unexpected: {}", d.count);
            }
        }
        QueryKind::ReconciliationStatus | QueryKind::General => {
            out.push_str(&report.to_document());
        }
        QueryKind::TransformErrors => {
            let errors = report.error_groups.iter().find_map(|g| match g {
                ErrorGroup::TransformFailures { errors, .. } => Some(errors),
                _ => None,
            });
            match errors {
                Some(errors) => {
                    let _ = writeln!(out, "Transform errors ({}):", errors.len());
                    for e in errors {
                        let _ = writeln!(out, "- line {}: {}", e.line, e.message);
                    }
                }
                None => out.push_str(
                    "No transform errors found. All files appear to have been processed successfully.",
                ),
            }
        }
        QueryKind::OreErrors => {
            let errors = report.error_groups.iter().find_map(|g| match g {
                ErrorGroup::OreErrors { errors, .. } => Some(errors),
                _ => None,
            });
            match errors {
                Some(errors) => {
                    let _ = writeln!(out, "ORE errors ({}):", errors.len());
                    for e in errors {
                        let _ = writeln!(out, "- {}: {}", e.trade_id, e.issue);
                    }
                }
                None => out.push_str("No ORE errors found. All reconciliations appear to be successful."),
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_phrases() {
        assert_eq!(QueryKind::classify("How many trades failed today?"), QueryKind::FailedTrades);
        assert_eq!(QueryKind::classify("Any missing acks?"), QueryKind::MissingConfirmations);
        assert_eq!(QueryKind::classify("ACK vs outgoing"), QueryKind::TradeCountComparison);
        assert_eq!(QueryKind::classify("latest status please"), QueryKind::ReconciliationStatus);
        assert_eq!(QueryKind::classify("Show transform errors"), QueryKind::TransformErrors);
        assert_eq!(QueryKind::classify("Show ORE errors"), QueryKind::OreErrors);
        assert_eq!(QueryKind::classify("hello"), QueryKind::General);
    }

    #[test]
    fn empty_history_answers_no_data() {
        let answer = answer(None, "What's the latest reconciliation status?");

        assert_eq!(answer.kind, QueryKind::ReconciliationStatus);
        assert_eq!(answer.text, NO_DATA);
    }
}
