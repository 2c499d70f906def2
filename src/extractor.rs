//! Record extraction
//!
//! Scans loosely structured activity documents for repeated
//! `<timestamp><category><confidence>` prefixes, each followed by a fenced
//! ```` ```json ```` block carrying `{category, confidence, reasons}`, and turns
//! every match into an [`Event`].
//!
//! A malformed record never aborts the scan: it is reported as a
//! [`SkippedRecord`] and extraction continues with the next match.

use crate::config::ExtractorConfig;
use crate::error::FluxError;
use crate::types::{Event, EventMetadata, EventSource, EventTimestamp, ReasonBlock};
use log::{debug, warn};
use regex::{Captures, Regex};
use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// Record pattern. The JSON body may span lines but never contains a backtick,
/// so one malformed block cannot swallow the record after it.
const RECORD_PATTERN: &str = r"([0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2})([a-z_]+)([0-9.]+)```json\s*(\{[^`]+\})\s*```";

/// Start of a record, whether or not its block is well formed
const PREFIX_PATTERN: &str =
    r"([0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2})([a-z_]+)([0-9.]+)```json";

/// Characters of an offending fragment included in log lines
const LOG_PREVIEW_CHARS: usize = 120;

/// Why a matched record was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The fenced block is not valid JSON for a reason block
    InvalidJson,
    /// The confidence prefix is not a number (e.g. `0.8.1`)
    InvalidConfidence,
    /// The fenced block has no closing brace before the fence, or contains a backtick
    UnterminatedBlock,
}

/// A record that matched the pattern but could not be turned into an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    /// Ordinal of the match within the document (0-based)
    pub index: usize,
    /// Byte offset of the match within the document
    pub offset: usize,
    pub reason: SkipReason,
    pub detail: String,
    /// The offending text
    pub fragment: String,
}

/// The captured pieces of one record, before interpretation
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    pub timestamp: &'a str,
    pub category: &'a str,
    pub confidence: &'a str,
    pub block: &'a str,
}

/// Result of interpreting a single record
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentOutcome {
    Parsed(Event),
    Rejected { reason: SkipReason, detail: String },
}

/// Events in document order plus the records that were dropped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub events: Vec<Event>,
    pub skipped: Vec<SkippedRecord>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Regex-based document extractor
pub struct Extractor {
    config: ExtractorConfig,
    pattern: Regex,
    prefix: Regex,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, FluxError> {
        Ok(Self {
            config,
            pattern: Regex::new(RECORD_PATTERN)?,
            prefix: Regex::new(PREFIX_PATTERN)?,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract every record from `text`, left to right, without overlap.
    ///
    /// Every record prefix is accounted for: it either becomes an event or a
    /// [`SkippedRecord`]. Text with no record prefix yields an empty [`Extraction`].
    pub fn extract(&self, text: &str) -> Extraction {
        let mut extraction = Extraction::default();

        let mut records: HashMap<usize, Captures<'_>> = self
            .pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(0).map(|whole| (whole.start(), caps)))
            .collect();

        for (index, prefix) in self.prefix.find_iter(text).enumerate() {
            let offset = prefix.start();

            let Some(caps) = records.remove(&offset) else {
                let fragment = preview(&text[offset..], LOG_PREVIEW_CHARS);
                warn!(
                    "skipping record {} at offset {}: unterminated block fragment={}",
                    index, offset, fragment
                );
                extraction.skipped.push(SkippedRecord {
                    index,
                    offset,
                    reason: SkipReason::UnterminatedBlock,
                    detail: "no complete `{...}` object before the closing fence".to_string(),
                    fragment,
                });
                continue;
            };

            let (Some(whole), Some(ts), Some(code), Some(conf), Some(block)) =
                (caps.get(0), caps.get(1), caps.get(2), caps.get(3), caps.get(4))
            else {
                continue;
            };

            let raw = RawRecord {
                timestamp: ts.as_str(),
                category: code.as_str(),
                confidence: conf.as_str(),
                block: block.as_str(),
            };

            match self.parse_fragment(&raw) {
                FragmentOutcome::Parsed(event) => extraction.events.push(event),
                FragmentOutcome::Rejected { reason, detail } => {
                    warn!(
                        "skipping record {} at offset {}: {:?} ({}) fragment={}",
                        index,
                        offset,
                        reason,
                        detail,
                        preview(raw.block, LOG_PREVIEW_CHARS)
                    );
                    extraction.skipped.push(SkippedRecord {
                        index,
                        offset,
                        reason,
                        detail,
                        fragment: whole.as_str().to_string(),
                    });
                }
            }
        }

        debug!(
            "extracted {} events, skipped {}",
            extraction.events.len(),
            extraction.skipped.len()
        );
        extraction
    }

    /// Interpret one captured record
    pub fn parse_fragment(&self, raw: &RawRecord<'_>) -> FragmentOutcome {
        let confidence = match raw.confidence.parse::<f64>() {
            Ok(value) => value,
            Err(e) => {
                return FragmentOutcome::Rejected {
                    reason: SkipReason::InvalidConfidence,
                    detail: format!("`{}`: {}", raw.confidence, e),
                }
            }
        };

        let block: ReasonBlock = match serde_json::from_str(raw.block) {
            Ok(block) => block,
            Err(e) => {
                return FragmentOutcome::Rejected {
                    reason: SkipReason::InvalidJson,
                    detail: e.to_string(),
                }
            }
        };

        FragmentOutcome::Parsed(self.build_event(
            EventTimestamp::parse(raw.timestamp),
            raw.category,
            confidence,
            block,
            EventSource::Document,
        ))
    }

    /// Assemble an event and its derived fields
    pub(crate) fn build_event(
        &self,
        timestamp: EventTimestamp,
        category: &str,
        confidence: f64,
        block: ReasonBlock,
        source: EventSource,
    ) -> Event {
        let label = if block.category.is_empty() {
            category.to_string()
        } else {
            block.category.clone()
        };

        let location = if block.reasons.contains(self.config.indoor_marker.as_str()) {
            self.config.indoor_location.clone()
        } else {
            self.config.unknown_location.clone()
        };

        let original_text = match block.confidence {
            Some(c) => format!("category: {}, confidence: {}", label, c),
            None => format!("category: {}", label),
        };

        Event {
            timestamp,
            category: category.to_string(),
            confidence,
            title: format!("{}{}", label, self.config.title_suffix),
            tags: self.derive_tags(&label, &block.reasons),
            metadata: EventMetadata {
                source,
                original_text,
                location,
                label,
                label_confidence: block.confidence,
            },
            reasons: block.reasons,
        }
    }

    /// Label first, then every rule whose keywords hit, each tag at most once
    fn derive_tags(&self, label: &str, reasons: &str) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        if !label.is_empty() {
            tags.push(label.to_string());
        }

        for rule in &self.config.tag_rules {
            if rule.matches(reasons) && !tags.iter().any(|t| t == &rule.tag) {
                tags.push(rule.tag.clone());
            }
        }

        tags
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn extractor() -> Extractor {
        Extractor::new(ExtractorConfig::default()).unwrap()
    }

    fn record(ts: &str, code: &str, conf: &str, label: &str, reasons: &str) -> String {
        format!(
            "{ts}{code}{conf}```json\n{{\n  \"category\": \"{label}\",\n  \"confidence\": {conf},\n  \"reasons\": \"{reasons}\"\n}}\n```\n"
        )
    }

    #[test]
    fn test_single_record() {
        let text = "2025-10-13 19:50:51observe0.8```json\n{\"category\": \"观望\", \"confidence\": 0.8, \"reasons\": \"测试数据\"}\n```";
        let extraction = extractor().extract(text);

        assert_eq!(extraction.events.len(), 1);
        assert!(extraction.skipped.is_empty());

        let event = &extraction.events[0];
        let expected = NaiveDate::from_ymd_opt(2025, 10, 13)
            .unwrap()
            .and_hms_opt(19, 50, 51)
            .unwrap();
        assert_eq!(event.timestamp, EventTimestamp::Parsed(expected));
        assert_eq!(event.category, "observe");
        assert_eq!(event.confidence, 0.8);
        assert_eq!(event.reasons, "测试数据");
        assert_eq!(event.title, "观望行为");
        assert_eq!(event.metadata.source, EventSource::Document);
        assert_eq!(event.metadata.original_text, "category: 观望, confidence: 0.8");
        assert_eq!(event.metadata.location, "未知");
    }

    #[test]
    fn test_document_order_preserved() {
        let text = [
            record("2025-10-13 19:50:51", "observe", "0.8", "观望", "a"),
            "noise between records\n".to_string(),
            record("2025-10-13 19:51:00", "explore", "0.9", "探索", "b"),
            record("2025-10-13 19:51:10", "play", "0.7", "玩耍", "c"),
        ]
        .concat();

        let events = extractor().extract(&text).events;
        let codes: Vec<&str> = events.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(codes, vec!["observe", "explore", "play"]);
        assert_eq!(events[2].confidence, 0.7);
    }

    #[test]
    fn test_no_match_is_empty() {
        let extraction = extractor().extract("just some notes about the cat");
        assert!(extraction.is_empty());
        assert!(extraction.skipped.is_empty());

        assert!(extractor().extract("").is_empty());
    }

    #[test]
    fn test_malformed_json_skipped_and_scan_continues() {
        let text = [
            record("2025-10-13 19:50:51", "observe", "0.8", "观望", "a"),
            "2025-10-13 19:50:55explore0.6```json\n{\"category\": \"探索\", \"confidence\": , \"reasons\": \"x\"}\n```\n".to_string(),
            record("2025-10-13 19:51:10", "rest", "0.7", "休息", "c"),
        ]
        .concat();

        let extraction = extractor().extract(&text);
        assert_eq!(extraction.events.len(), 2);
        assert_eq!(extraction.skipped.len(), 1);

        let skipped = &extraction.skipped[0];
        assert_eq!(skipped.index, 1);
        assert_eq!(skipped.reason, SkipReason::InvalidJson);
        assert!(skipped.fragment.starts_with("2025-10-13 19:50:55explore"));
        assert_eq!(extraction.events[1].category, "rest");
    }

    #[test]
    fn test_unterminated_blocks_counted_as_skipped() {
        let text = [
            record("2025-10-13 19:50:51", "observe", "0.8", "观望", "a"),
            "2025-10-13 19:50:55explore0.6```json\n{\"category\": \"探索\", \"reasons\": \"x\"\n```\n".to_string(),
            "2025-10-13 19:51:00play0.7```json\n{\"category\": \"玩耍\", \"reasons\": \"a`b\"}\n```\n".to_string(),
            record("2025-10-13 19:51:10", "rest", "0.7", "休息", "c"),
        ]
        .concat();

        let extraction = extractor().extract(&text);
        let codes: Vec<&str> = extraction.events.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(codes, vec!["observe", "rest"]);

        let skipped: Vec<(usize, SkipReason)> = extraction
            .skipped
            .iter()
            .map(|s| (s.index, s.reason))
            .collect();
        assert_eq!(
            skipped,
            vec![
                (1, SkipReason::UnterminatedBlock),
                (2, SkipReason::UnterminatedBlock),
            ]
        );
        assert!(extraction.skipped[0]
            .fragment
            .starts_with("2025-10-13 19:50:55explore"));
        assert_eq!(extraction.events.len() + extraction.skipped.len(), 4);
    }

    #[test]
    fn test_invalid_confidence_prefix_skipped() {
        let text = record("2025-10-13 19:50:51", "observe", "0.8.1", "观望", "a");
        let extraction = extractor().extract(&text);

        assert!(extraction.events.is_empty());
        assert_eq!(extraction.skipped[0].reason, SkipReason::InvalidConfidence);
    }

    #[test]
    fn test_invalid_calendar_value_kept_raw() {
        let text = record("2025-13-40 19:50:51", "observe", "0.8", "观望", "a");
        let events = extractor().extract(&text).events;

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].timestamp,
            EventTimestamp::Raw("2025-13-40 19:50:51".to_string())
        );
    }

    #[test]
    fn test_uppercase_category_not_matched() {
        let text = record("2025-10-13 19:50:51", "Observe", "0.8", "观望", "a");
        assert!(extractor().extract(&text).is_empty());
    }

    #[test]
    fn test_unknown_category_passes_through() {
        let text = record("2025-10-13 19:50:51", "zoomies", "0.5", "疯跑", "a");
        let events = extractor().extract(&text).events;
        assert_eq!(events[0].category, "zoomies");
        assert_eq!(events[0].title, "疯跑行为");
    }

    #[test]
    fn test_tags_and_location() {
        let text = record(
            "2025-10-13 19:50:51",
            "observe",
            "0.8",
            "观望",
            "室内一只猫在蓝色床单上注视窗外，保持警觉，房间安静",
        );
        let event = &extractor().extract(&text).events[0];

        assert_eq!(event.metadata.location, "室内");
        // "观望" is both the label and a rule tag; it appears once
        assert_eq!(event.tags, vec!["观望", "猫", "室内", "床单", "蓝色"]);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let text = "2025-10-13 19:50:51rest0.4```json\n{\"reasons\": \"躺着\"}\n```";
        let event = &extractor().extract(text).events[0];

        assert_eq!(event.title, "rest行为");
        assert_eq!(event.metadata.label_confidence, None);
        assert_eq!(event.metadata.original_text, "category: rest");
        assert_eq!(event.tags, vec!["rest", "休息"]);
    }

    #[test]
    fn test_custom_config() {
        let config = ExtractorConfig {
            indoor_marker: "indoors".to_string(),
            indoor_location: "indoor".to_string(),
            unknown_location: "unknown".to_string(),
            title_suffix: " activity".to_string(),
            tag_rules: vec![],
        };
        let extractor = Extractor::new(config).unwrap();
        let text = record("2025-10-13 19:50:51", "observe", "0.8", "Watching", "cat indoors");
        let event = &extractor.extract(&text).events[0];

        assert_eq!(event.title, "Watching activity");
        assert_eq!(event.metadata.location, "indoor");
        assert_eq!(event.tags, vec!["Watching"]);
    }

    #[test]
    fn test_preview_is_char_safe() {
        assert_eq!(preview("观望观望", 2), "观望...");
        assert_eq!(preview("ab", 5), "ab");
    }
}
