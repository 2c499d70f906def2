//! Output encoding
//!
//! This module renders reports and events into the JSON documents consumed
//! downstream: the report itself, app-history import records and a timeline.
//!
//! Confidence stays a fraction everywhere else in the crate. The percent
//! figures of the app-history and timeline layouts are derived here.

use crate::config::CategoryTable;
use crate::error::FluxError;
use crate::interchange::ImportedRecord;
use crate::types::{Event, ReasonBlock, Report};
use chrono::Duration;
use log::warn;
use serde::{Deserialize, Serialize};

/// `mode` value of app-history records
pub const APP_HISTORY_MODE: &str = "pet_activity";

/// Prefix of app-history record ids
pub const APP_HISTORY_ID_PREFIX: &str = "import_";

/// Result block of an app-history record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppHistoryResult {
    pub title: String,
    /// Integer percent (0-100)
    pub confidence: u8,
    /// Reason block serialized as a JSON string
    pub sub_info: String,
}

/// One record of the app-history import file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppHistoryRecord {
    pub id: String,
    pub timestamp: String,
    pub result: AppHistoryResult,
    pub mode: String,
    pub image_path: Option<String>,
}

/// One entry of a timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    pub timestamp: String,
    /// `%H:%M:%S`, absent when the timestamp did not parse
    pub time_formatted: Option<String>,
    /// `%Y年%m月%d日`, absent when the timestamp did not parse
    pub date_formatted: Option<String>,
    pub category: String,
    pub category_label: String,
    pub confidence: f64,
    pub confidence_percentage: u8,
    pub description: String,
    pub metadata: ReasonBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSummary {
    pub total_events: usize,
    /// Elapsed time between the first and last event, e.g. `2:15:04`
    pub duration: Option<String>,
    /// Distinct category codes in first-encountered order
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub timeline: Vec<TimelineItem>,
    pub summary: TimelineSummary,
}

/// Encoder for report, app-history and timeline documents
pub struct Encoder {
    categories: CategoryTable,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(CategoryTable::default())
    }
}

impl Encoder {
    pub fn new(categories: CategoryTable) -> Self {
        Self { categories }
    }

    /// Encode a report to JSON
    pub fn encode_report(&self, report: &Report, pretty: bool) -> Result<String, FluxError> {
        let json = if pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(json)
    }

    /// Build app-history records, one per imported row
    pub fn app_history(
        &self,
        records: &[ImportedRecord],
    ) -> Result<Vec<AppHistoryRecord>, FluxError> {
        records
            .iter()
            .map(|record| {
                let event = &record.event;
                Ok(AppHistoryRecord {
                    id: format!("{}{}", APP_HISTORY_ID_PREFIX, record.row),
                    timestamp: event.timestamp.document_string(),
                    result: AppHistoryResult {
                        title: format!("宠物{}行为", event.category),
                        confidence: confidence_to_percent(event.confidence),
                        sub_info: serde_json::to_string(&event.reason_block())?,
                    },
                    mode: APP_HISTORY_MODE.to_string(),
                    image_path: None,
                })
            })
            .collect()
    }

    pub fn app_history_to_json(&self, records: &[ImportedRecord]) -> Result<String, FluxError> {
        let history = self.app_history(records)?;
        serde_json::to_string_pretty(&history).map_err(FluxError::JsonError)
    }

    /// Build a timeline in event order
    pub fn timeline(&self, events: &[Event]) -> Timeline {
        let timeline: Vec<TimelineItem> = events
            .iter()
            .map(|event| {
                let dt = event.timestamp.as_datetime();
                TimelineItem {
                    timestamp: event.timestamp.iso_string(),
                    time_formatted: dt.map(|dt| dt.format("%H:%M:%S").to_string()),
                    date_formatted: dt.map(|dt| dt.format("%Y年%m月%d日").to_string()),
                    category: event.category.clone(),
                    category_label: self.categories.short_label(&event.category).to_string(),
                    confidence: event.confidence,
                    confidence_percentage: confidence_to_percent(event.confidence),
                    description: event.reasons.clone(),
                    metadata: event.reason_block(),
                }
            })
            .collect();

        let mut categories: Vec<String> = Vec::new();
        for event in events {
            if !categories.contains(&event.category) {
                categories.push(event.category.clone());
            }
        }

        let duration = match (
            events.first().and_then(|e| e.timestamp.as_datetime()),
            events.last().and_then(|e| e.timestamp.as_datetime()),
        ) {
            (Some(first), Some(last)) => Some(format_duration(*last - *first)),
            _ => None,
        };

        Timeline {
            summary: TimelineSummary {
                total_events: timeline.len(),
                duration,
                categories,
            },
            timeline,
        }
    }

    pub fn timeline_to_json(&self, events: &[Event]) -> Result<String, FluxError> {
        serde_json::to_string_pretty(&self.timeline(events)).map_err(FluxError::JsonError)
    }
}

/// Convert a fractional confidence to a rounded integer percent.
///
/// Values outside [0, 1] (including NaN) are logged and clamped.
pub fn confidence_to_percent(confidence: f64) -> u8 {
    let clamped = if confidence.is_nan() {
        warn!("confidence is NaN, using 0");
        0.0
    } else if !(0.0..=1.0).contains(&confidence) {
        warn!("confidence {} outside [0, 1], clamping", confidence);
        confidence.clamp(0.0, 1.0)
    } else {
        confidence
    };
    (clamped * 100.0).round() as u8
}

/// `H:MM:SS`, prefixed with the day count when it is not zero.
///
/// Days are floored, so a negative span reads `-1 day, 23:59:00` for minus one
/// minute.
fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds();
    let days = total.div_euclid(86_400);
    let rest = total.rem_euclid(86_400);
    let hours = rest / 3_600;
    let minutes = (rest % 3_600) / 60;
    let seconds = rest % 60;

    match days {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        1 | -1 => format!("{days} day, {hours}:{minutes:02}:{seconds:02}"),
        n => format!("{n} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}
