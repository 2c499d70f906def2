//! Core types for the Pawflux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: extracted events, their metadata, and the aggregated report.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp layout used by generated activity documents
pub const DOCUMENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// ISO 8601 layout used in reports and timelines
pub const ISO_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Point in time of an event.
///
/// Documents are not guaranteed to carry valid calendar values, so a timestamp
/// that fails to parse is kept verbatim instead of failing the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EventTimestamp {
    Parsed(NaiveDateTime),
    Raw(String),
}

impl EventTimestamp {
    /// Parse either the document layout or the ISO layout, falling back to raw
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        NaiveDateTime::parse_from_str(trimmed, DOCUMENT_TIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, ISO_TIME_FORMAT))
            .map(EventTimestamp::Parsed)
            .unwrap_or_else(|_| EventTimestamp::Raw(text.to_string()))
    }

    pub fn as_datetime(&self) -> Option<&NaiveDateTime> {
        match self {
            EventTimestamp::Parsed(dt) => Some(dt),
            EventTimestamp::Raw(_) => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, EventTimestamp::Parsed(_))
    }

    /// ISO form for parsed values, the original text otherwise
    pub fn iso_string(&self) -> String {
        match self {
            EventTimestamp::Parsed(dt) => dt.format(ISO_TIME_FORMAT).to_string(),
            EventTimestamp::Raw(raw) => raw.clone(),
        }
    }

    /// Document layout for parsed values, the original text otherwise
    pub fn document_string(&self) -> String {
        match self {
            EventTimestamp::Parsed(dt) => dt.format(DOCUMENT_TIME_FORMAT).to_string(),
            EventTimestamp::Raw(raw) => raw.clone(),
        }
    }

    /// Hour of day (0-23), only for parsed timestamps
    pub fn hour(&self) -> Option<u32> {
        self.as_datetime().map(|dt| dt.hour())
    }

    /// Calendar date key (YYYY-MM-DD), only for parsed timestamps
    pub fn date_key(&self) -> Option<String> {
        self.as_datetime()
            .map(|dt| dt.format("%Y-%m-%d").to_string())
    }
}

impl fmt::Display for EventTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.iso_string())
    }
}

impl From<EventTimestamp> for String {
    fn from(ts: EventTimestamp) -> Self {
        ts.iso_string()
    }
}

impl From<String> for EventTimestamp {
    fn from(text: String) -> Self {
        EventTimestamp::parse(&text)
    }
}

/// Where an event was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Document,
    Tsv,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Document => "document",
            EventSource::Tsv => "tsv",
        }
    }
}

/// Auxiliary fields attached to every event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Source marker
    pub source: EventSource,
    /// Short reconstruction of the matched label block
    pub original_text: String,
    /// Best-effort location ("室内" or "未知" with the default configuration)
    pub location: String,
    /// Human-readable category label from the JSON block
    pub label: String,
    /// Confidence reported inside the JSON block, if any
    pub label_confidence: Option<f64>,
}

/// A single pet activity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: EventTimestamp,
    /// Machine-readable category code (open set)
    pub category: String,
    /// Confidence as a fraction in [0, 1]; not validated
    pub confidence: f64,
    /// Display title, the label followed by the activity suffix
    pub title: String,
    pub reasons: String,
    /// Ordered, de-duplicated tags
    pub tags: Vec<String>,
    pub metadata: EventMetadata,
}

impl Event {
    /// Rebuild the reason block this event was read from
    pub fn reason_block(&self) -> ReasonBlock {
        ReasonBlock {
            category: self.metadata.label.clone(),
            confidence: self.metadata.label_confidence,
            reasons: self.reasons.clone(),
        }
    }
}

/// The `{category, confidence, reasons}` block that accompanies each record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonBlock {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasons: String,
}

// ============================================================================
// Report types
// ============================================================================

/// Producer metadata embedded in every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Inclusive range of ISO timestamp strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

/// Global figures of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_events: usize,
    pub category_count: usize,
    pub avg_confidence: f64,
    pub date_range: Option<TimeRange>,
    /// Events whose timestamp kept its raw form; excluded from hour and day buckets
    pub unparsed_timestamps: usize,
    /// Records dropped during extraction or import
    pub skipped_records: usize,
}

/// Hour bucket with its event count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: usize,
}

/// One event formatted for display inside a category breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub time: String,
    pub title: String,
    pub content: String,
    pub confidence: f64,
    pub tags: Vec<String>,
    pub location: String,
    pub raw_category: String,
}

/// Statistics for a single category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub code: String,
    pub label: String,
    pub count: usize,
    /// Share of all events (0-100)
    pub percentage: f64,
    pub avg_confidence: f64,
    pub time_range: TimeRange,
    pub hour_distribution: BTreeMap<u32, usize>,
    pub peak_hours: Vec<HourCount>,
    /// Mean length of `reasons` in characters
    pub avg_description_length: f64,
    pub events: Vec<EventRow>,
}

/// Statistics for a single calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStatistics {
    pub total_activities: usize,
    pub categories: BTreeMap<String, usize>,
    pub avg_confidence: f64,
}

/// Aggregated view over a sequence of events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub producer: Producer,
    pub generated_at: String,
    pub summary: ReportSummary,
    /// Per-category breakdown in first-encountered order
    pub categories: Vec<CategoryBreakdown>,
    pub hourly_distribution: BTreeMap<u32, usize>,
    pub category_distribution: BTreeMap<String, usize>,
    pub daily_statistics: BTreeMap<String, DailyStatistics>,
    pub transitions: BTreeMap<String, usize>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Report {
    /// False for the zeroed report produced from an empty event sequence
    pub fn has_data(&self) -> bool {
        self.summary.total_events > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_document_layout() {
        let ts = EventTimestamp::parse("2025-10-13 19:50:51");
        let expected = NaiveDate::from_ymd_opt(2025, 10, 13)
            .unwrap()
            .and_hms_opt(19, 50, 51)
            .unwrap();
        assert_eq!(ts, EventTimestamp::Parsed(expected));
        assert_eq!(ts.iso_string(), "2025-10-13T19:50:51");
        assert_eq!(ts.hour(), Some(19));
        assert_eq!(ts.date_key().as_deref(), Some("2025-10-13"));
    }

    #[test]
    fn test_parse_iso_layout() {
        let ts = EventTimestamp::parse("2025-10-13T08:00:00");
        assert!(ts.is_parsed());
        assert_eq!(ts.document_string(), "2025-10-13 08:00:00");
    }

    #[test]
    fn test_invalid_timestamp_kept_raw() {
        let ts = EventTimestamp::parse("2025-13-45 99:00:00");
        assert_eq!(ts, EventTimestamp::Raw("2025-13-45 99:00:00".to_string()));
        assert_eq!(ts.hour(), None);
        assert_eq!(ts.date_key(), None);
        assert_eq!(ts.iso_string(), "2025-13-45 99:00:00");
    }

    #[test]
    fn test_timestamp_serializes_as_string() {
        let ts = EventTimestamp::parse("2025-10-13 19:50:51");
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2025-10-13T19:50:51\"");

        let back: EventTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
