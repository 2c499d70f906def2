//! Tab-separated interchange format
//!
//! One header line followed by one row per event:
//!
//! ```text
//! timestamp\tcategory\tconfidence\treasons
//! 2025-10-13 19:50:51\tobserve\t0.8\t{"category":"观望","confidence":0.8,"reasons":"..."}
//! ```
//!
//! The last column is the reason block as compact JSON. Rows are split on the
//! first three tabs only, so the block itself may contain tabs.

use crate::error::FluxError;
use crate::extractor::Extractor;
use crate::types::{Event, EventSource, EventTimestamp, ReasonBlock};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Header line written and recognized by this module
pub const TSV_HEADER: &str = "timestamp\tcategory\tconfidence\treasons";

/// A row that could not be imported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportFailure {
    /// 1-based line number in the input
    pub line: usize,
    pub reason: String,
}

/// Counters of a TSV import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStats {
    /// Non-blank data rows seen
    pub total: usize,
    pub imported: usize,
    pub failed: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportStats {
    /// Share of rows imported, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.imported as f64 / self.total as f64 * 100.0
        }
    }
}

/// An imported event and its data row ordinal (1-based, header excluded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedRecord {
    pub row: usize,
    pub event: Event,
}

/// Result of reading a TSV document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TsvImport {
    pub records: Vec<ImportedRecord>,
    pub stats: ImportStats,
}

impl TsvImport {
    pub fn events(&self) -> Vec<Event> {
        self.records.iter().map(|r| r.event.clone()).collect()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.records.into_iter().map(|r| r.event).collect()
    }
}

/// Serialize events as TSV, header included
pub fn write_tsv(events: &[Event]) -> Result<String, FluxError> {
    let mut out = String::with_capacity(64 * (events.len() + 1));
    out.push_str(TSV_HEADER);
    out.push('\n');

    for event in events {
        let block_json = serde_json::to_string(&event.reason_block())?;
        if event.category.contains('\t') {
            return Err(FluxError::EncodingError(format!(
                "category `{}` contains a tab",
                event.category
            )));
        }
        if !event.confidence.is_finite() {
            return Err(FluxError::EncodingError(format!(
                "confidence {} of `{}` is not finite",
                event.confidence, event.category
            )));
        }
        writeln!(
            out,
            "{}\t{}\t{:?}\t{}",
            event.timestamp.document_string(),
            event.category,
            event.confidence,
            block_json
        )
        .map_err(|e| FluxError::EncodingError(e.to_string()))?;
    }

    Ok(out)
}

/// Read a TSV document. Failing rows are counted and skipped.
///
/// The first line is treated as the header when it matches [`TSV_HEADER`];
/// blank lines are ignored.
pub fn read_tsv(text: &str, extractor: &Extractor) -> TsvImport {
    let mut import = TsvImport::default();
    let mut lines = text.lines().enumerate().peekable();

    if let Some((_, first)) = lines.peek() {
        if first.trim() == TSV_HEADER {
            lines.next();
        }
    }

    for (index, line) in lines {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        import.stats.total += 1;
        let row = import.stats.total;

        match parse_row(line, index + 1, extractor) {
            Ok(event) => {
                import.stats.imported += 1;
                import.records.push(ImportedRecord { row, event });
            }
            Err(FluxError::InterchangeError { line, reason }) => {
                warn!("tsv line {} rejected: {}", line, reason);
                import.stats.failed += 1;
                import.stats.failures.push(ImportFailure { line, reason });
            }
            Err(e) => {
                warn!("tsv line {} rejected: {}", index + 1, e);
                import.stats.failed += 1;
                import.stats.failures.push(ImportFailure {
                    line: index + 1,
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(
        "tsv import: {} rows, {} imported, {} failed",
        import.stats.total, import.stats.imported, import.stats.failed
    );
    import
}

fn parse_row(line: &str, line_no: usize, extractor: &Extractor) -> Result<Event, FluxError> {
    let reject = |reason: String| FluxError::InterchangeError {
        line: line_no,
        reason,
    };

    let parts: Vec<&str> = line.splitn(4, '\t').collect();
    let &[timestamp, category, confidence, block] = parts.as_slice() else {
        return Err(reject(format!("expected 4 columns, found {}", parts.len())));
    };

    let category = category.trim();
    if category.is_empty() {
        return Err(reject("empty category".to_string()));
    }

    let confidence: f64 = confidence
        .trim()
        .parse()
        .map_err(|e| reject(format!("confidence `{}`: {}", confidence.trim(), e)))?;
    if !confidence.is_finite() {
        return Err(reject(format!("confidence `{}` is not finite", confidence)));
    }

    let block: ReasonBlock =
        serde_json::from_str(block.trim()).map_err(|e| reject(format!("reasons: {}", e)))?;

    Ok(extractor.build_event(
        EventTimestamp::parse(timestamp),
        category,
        confidence,
        block,
        EventSource::Tsv,
    ))
}
