//! Event aggregation
//!
//! Computes grouped statistics over an ordered event sequence: per-category
//! breakdowns, hour-of-day and per-day histograms, category transitions, and
//! the insight/recommendation text built on top of them.
//!
//! The input slice is only read. Categories are kept in first-encountered
//! order, which is also the tie-break order for the insights.

use crate::config::AggregatorConfig;
use crate::insights::{generate_insights, generate_recommendations};
use crate::types::{
    CategoryBreakdown, DailyStatistics, Event, EventRow, HourCount, Producer, Report,
    ReportSummary, TimeRange,
};
use crate::{PAWFLUX_VERSION, PRODUCER_NAME};
use chrono::Utc;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Aggregator producing [`Report`]s from event sequences
pub struct Aggregator {
    config: AggregatorConfig,
    instance_id: String,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}

impl Aggregator {
    /// Create an aggregator with a unique instance ID
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an aggregator with a specific instance ID
    pub fn with_instance_id(config: AggregatorConfig, instance_id: String) -> Self {
        Self {
            config,
            instance_id,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Aggregate `events` into a report.
    ///
    /// An empty slice yields a zeroed report: all counts are zero, the average
    /// confidence is `0.0`, the date range is absent and no insight or
    /// recommendation is produced.
    pub fn aggregate(&self, events: &[Event]) -> Report {
        let total = events.len();
        let groups = group_by_category(events);

        let categories: Vec<CategoryBreakdown> = groups
            .iter()
            .map(|group| self.build_breakdown(group, total))
            .collect();

        let mut hourly_distribution: BTreeMap<u32, usize> = BTreeMap::new();
        let mut unparsed_timestamps = 0;
        for event in events {
            match event.timestamp.hour() {
                Some(hour) => *hourly_distribution.entry(hour).or_insert(0) += 1,
                None => unparsed_timestamps += 1,
            }
        }

        let category_distribution: BTreeMap<String, usize> = categories
            .iter()
            .map(|c| (c.code.clone(), c.count))
            .collect();

        let summary = ReportSummary {
            total_events: total,
            category_count: categories.len(),
            avg_confidence: mean(events.iter().map(|e| e.confidence)),
            date_range: time_range(events.iter()),
            unparsed_timestamps,
            skipped_records: 0,
        };

        let insights = generate_insights(&categories, &hourly_distribution);
        let recommendations = generate_recommendations(&categories, &self.config);

        debug!(
            "aggregated {} events into {} categories ({} unparsed timestamps)",
            total,
            categories.len(),
            unparsed_timestamps
        );

        Report {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: PAWFLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            generated_at: Utc::now().to_rfc3339(),
            summary,
            categories,
            hourly_distribution,
            category_distribution,
            daily_statistics: daily_statistics(events),
            transitions: transitions(events),
            insights,
            recommendations,
        }
    }

    fn build_breakdown(&self, group: &CategoryGroup<'_>, total: usize) -> CategoryBreakdown {
        let count = group.events.len();

        let mut hour_distribution: BTreeMap<u32, usize> = BTreeMap::new();
        for hour in group.events.iter().filter_map(|e| e.timestamp.hour()) {
            *hour_distribution.entry(hour).or_insert(0) += 1;
        }

        let mut peak_hours: Vec<HourCount> = hour_distribution
            .iter()
            .map(|(&hour, &count)| HourCount { hour, count })
            .collect();
        peak_hours.sort_by(|a, b| b.count.cmp(&a.count).then(a.hour.cmp(&b.hour)));
        peak_hours.truncate(self.config.peak_hour_limit);

        let events: Vec<EventRow> = group
            .events
            .iter()
            .map(|e| EventRow {
                time: e.timestamp.iso_string(),
                title: e.title.clone(),
                content: e.reasons.clone(),
                confidence: e.confidence,
                tags: e.tags.clone(),
                location: e.metadata.location.clone(),
                raw_category: e.category.clone(),
            })
            .collect();

        CategoryBreakdown {
            code: group.code.to_string(),
            label: self.config.categories.display_label(group.code).to_string(),
            count,
            percentage: count as f64 / total as f64 * 100.0,
            avg_confidence: mean(group.events.iter().map(|e| e.confidence)),
            // groups are never empty
            time_range: time_range(group.events.iter().copied()).unwrap_or_else(|| TimeRange {
                start: String::new(),
                end: String::new(),
            }),
            hour_distribution,
            peak_hours,
            avg_description_length: mean(
                group.events.iter().map(|e| e.reasons.chars().count() as f64),
            ),
            events,
        }
    }
}

/// Events sharing one category code, in document order
struct CategoryGroup<'a> {
    code: &'a str,
    events: Vec<&'a Event>,
}

fn group_by_category(events: &[Event]) -> Vec<CategoryGroup<'_>> {
    let mut groups: Vec<CategoryGroup<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for event in events {
        let slot = *index.entry(event.category.as_str()).or_insert_with(|| {
            groups.push(CategoryGroup {
                code: event.category.as_str(),
                events: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].events.push(event);
    }

    groups
}

/// Count of `"<a> -> <b>"` over adjacent event pairs
fn transitions(events: &[Event]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for pair in events.windows(2) {
        let key = format!("{} -> {}", pair[0].category, pair[1].category);
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

fn daily_statistics(events: &[Event]) -> BTreeMap<String, DailyStatistics> {
    let mut sums: BTreeMap<String, (DailyStatistics, f64)> = BTreeMap::new();

    for event in events {
        let Some(date) = event.timestamp.date_key() else {
            continue;
        };
        let (stats, confidence_sum) = sums.entry(date).or_insert_with(|| {
            (
                DailyStatistics {
                    total_activities: 0,
                    categories: BTreeMap::new(),
                    avg_confidence: 0.0,
                },
                0.0,
            )
        });
        stats.total_activities += 1;
        *stats.categories.entry(event.category.clone()).or_insert(0) += 1;
        *confidence_sum += event.confidence;
    }

    sums.into_iter()
        .map(|(date, (mut stats, confidence_sum))| {
            stats.avg_confidence = confidence_sum / stats.total_activities as f64;
            (date, stats)
        })
        .collect()
}

/// Min/max over the ISO string form of the timestamps
fn time_range<'a, I>(events: I) -> Option<TimeRange>
where
    I: Iterator<Item = &'a Event>,
{
    let mut range: Option<TimeRange> = None;
    for ts in events.map(|e| e.timestamp.iso_string()) {
        range = Some(match range {
            None => TimeRange {
                start: ts.clone(),
                end: ts,
            },
            Some(r) => TimeRange {
                start: if ts < r.start { ts.clone() } else { r.start },
                end: if ts > r.end { ts } else { r.end },
            },
        });
    }
    range
}

/// Arithmetic mean, `0.0` for an empty sequence
fn mean<I>(values: I) -> f64
where
    I: Iterator<Item = f64>,
{
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventMetadata, EventSource, EventTimestamp};
    use pretty_assertions::assert_eq;

    fn event(ts: &str, category: &str, confidence: f64, reasons: &str) -> Event {
        Event {
            timestamp: EventTimestamp::parse(ts),
            category: category.to_string(),
            confidence,
            title: format!("{}行为", category),
            reasons: reasons.to_string(),
            tags: vec![category.to_string()],
            metadata: EventMetadata {
                source: EventSource::Document,
                original_text: String::new(),
                location: "未知".to_string(),
                label: category.to_string(),
                label_confidence: Some(confidence),
            },
        }
    }

    fn sample_events() -> Vec<Event> {
        vec![
            event("2025-10-13 19:50:51", "observe", 0.8, "注视窗外"),
            event("2025-10-13 19:51:00", "explore", 0.9, "嗅探地面"),
            event("2025-10-13 20:05:10", "observe", 0.7, "观察"),
        ]
    }

    fn aggregator() -> Aggregator {
        Aggregator::with_instance_id(AggregatorConfig::default(), "test-instance".to_string())
    }

    #[test]
    fn test_counts_and_transitions() {
        let report = aggregator().aggregate(&sample_events());

        assert_eq!(
            report.category_distribution,
            BTreeMap::from([("explore".to_string(), 1), ("observe".to_string(), 2)])
        );
        assert_eq!(
            report.transitions,
            BTreeMap::from([
                ("explore -> observe".to_string(), 1),
                ("observe -> explore".to_string(), 1),
            ])
        );
    }

    #[test]
    fn test_summary() {
        let events = sample_events();
        let report = aggregator().aggregate(&events);
        let summary = &report.summary;

        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.category_count, 2);
        let expected = (0.8 + 0.9 + 0.7) / 3.0;
        assert!((summary.avg_confidence - expected).abs() < 1e-9);
        assert_eq!(
            summary.date_range,
            Some(TimeRange {
                start: "2025-10-13T19:50:51".to_string(),
                end: "2025-10-13T20:05:10".to_string(),
            })
        );
        assert_eq!(summary.unparsed_timestamps, 0);
        assert!(report.has_data());
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.producer.name, PRODUCER_NAME);
    }

    #[test]
    fn test_category_breakdown_in_first_encountered_order() {
        let report = aggregator().aggregate(&sample_events());
        let codes: Vec<&str> = report.categories.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["observe", "explore"]);

        let observe = &report.categories[0];
        assert_eq!(observe.label, "观望行为");
        assert_eq!(observe.count, 2);
        assert!((observe.avg_confidence - 0.75).abs() < 1e-9);
        assert!((observe.percentage - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(observe.time_range.start, "2025-10-13T19:50:51");
        assert_eq!(observe.time_range.end, "2025-10-13T20:05:10");
        assert_eq!(observe.hour_distribution, BTreeMap::from([(19, 1), (20, 1)]));
        assert_eq!(
            observe.peak_hours,
            vec![HourCount { hour: 19, count: 1 }, HourCount { hour: 20, count: 1 }]
        );
        // "注视窗外" and "观察"
        assert!((observe.avg_description_length - 3.0).abs() < 1e-9);
        assert_eq!(observe.events.len(), 2);
        assert_eq!(observe.events[1].time, "2025-10-13T20:05:10");
        assert_eq!(observe.events[1].raw_category, "observe");
    }

    #[test]
    fn test_unknown_category_uses_code_as_label() {
        let report = aggregator().aggregate(&[event("2025-10-13 08:00:00", "zoomies", 0.5, "")]);
        assert_eq!(report.categories[0].label, "zoomies");
    }

    #[test]
    fn test_histogram_sums() {
        let events = sample_events();
        let report = aggregator().aggregate(&events);

        let hour_sum: usize = report.hourly_distribution.values().sum();
        assert_eq!(hour_sum, events.len());
        assert_eq!(report.hourly_distribution, BTreeMap::from([(19, 2), (20, 1)]));

        let per_category: usize = report.categories.iter().map(|c| c.count).sum();
        assert_eq!(per_category, events.len());

        let transitions: usize = report.transitions.values().sum();
        assert_eq!(transitions, events.len() - 1);
    }

    #[test]
    fn test_daily_statistics() {
        let mut events = sample_events();
        events.push(event("2025-10-14 07:00:00", "rest", 0.5, "躺着"));
        let report = aggregator().aggregate(&events);

        assert_eq!(report.daily_statistics.len(), 2);
        let day = &report.daily_statistics["2025-10-13"];
        assert_eq!(day.total_activities, 3);
        assert_eq!(day.categories["observe"], 2);
        assert!((day.avg_confidence - (0.8 + 0.9 + 0.7) / 3.0).abs() < 1e-9);
        assert_eq!(report.daily_statistics["2025-10-14"].total_activities, 1);
    }

    #[test]
    fn test_unparsed_timestamps_excluded_from_buckets() {
        let events = vec![
            event("2025-10-13 19:50:51", "observe", 0.8, ""),
            event("2025-13-40 19:50:51", "observe", 0.8, ""),
        ];
        let report = aggregator().aggregate(&events);

        assert_eq!(report.summary.unparsed_timestamps, 1);
        let hour_sum: usize = report.hourly_distribution.values().sum();
        assert_eq!(hour_sum + report.summary.unparsed_timestamps, 2);
        assert_eq!(report.daily_statistics.len(), 1);
        // raw strings still take part in the string-ordered range
        assert_eq!(
            report.summary.date_range.as_ref().map(|r| r.end.as_str()),
            Some("2025-13-40 19:50:51")
        );
    }

    #[test]
    fn test_insights_and_recommendations() {
        let report = aggregator().aggregate(&sample_events());

        assert_eq!(
            report.insights,
            vec![
                "最常见的行为是'observe'，占总活动的66.7%".to_string(),
                "置信度最高的行为是'explore'，平均置信度为0.90".to_string(),
                "最活跃的时段是19:00-19:59，共有2次活动".to_string(),
            ]
        );
        assert_eq!(
            report.recommendations,
            vec!["宠物更倾向于观察，建议创造安全的观察环境".to_string()]
        );
    }

    #[test]
    fn test_empty_input_yields_zeroed_report() {
        let report = aggregator().aggregate(&[]);

        assert!(!report.has_data());
        assert_eq!(report.summary.total_events, 0);
        assert_eq!(report.summary.category_count, 0);
        assert_eq!(report.summary.avg_confidence, 0.0);
        assert_eq!(report.summary.date_range, None);
        assert!(report.categories.is_empty());
        assert!(report.hourly_distribution.is_empty());
        assert!(report.transitions.is_empty());
        assert!(report.insights.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_single_event_has_no_transitions() {
        let report = aggregator().aggregate(&[event("2025-10-13 08:00:00", "rest", 0.9, "")]);
        assert!(report.transitions.is_empty());
    }

    #[test]
    fn test_input_not_mutated() {
        let events = sample_events();
        let before = events.clone();
        let _ = aggregator().aggregate(&events);
        assert_eq!(events, before);
    }

    #[test]
    fn test_report_round_trip() {
        let report = aggregator().aggregate(&sample_events());
        let json = serde_json::to_string(&report).unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
