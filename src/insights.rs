//! Insight and recommendation text
//!
//! Sentences are derived deterministically from a report's category breakdown
//! and hour histogram. Ties go to the first-encountered category and to the
//! lowest hour.

use crate::config::AggregatorConfig;
use crate::types::CategoryBreakdown;
use std::collections::BTreeMap;

/// Observations about the most common category, the most confidently
/// recognized category and the busiest hour.
pub fn generate_insights(
    categories: &[CategoryBreakdown],
    hourly: &BTreeMap<u32, usize>,
) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(most_common) = first_max_by(categories, |c| c.count as f64) {
        insights.push(format!(
            "最常见的行为是'{}'，占总活动的{:.1}%",
            most_common.code, most_common.percentage
        ));
    }

    if let Some(most_confident) = first_max_by(categories, |c| c.avg_confidence) {
        insights.push(format!(
            "置信度最高的行为是'{}'，平均置信度为{:.2}",
            most_confident.code, most_confident.avg_confidence
        ));
    }

    if let Some((hour, count)) = busiest_hour(hourly) {
        insights.push(format!(
            "最活跃的时段是{}:00-{}:59，共有{}次活动",
            hour, hour, count
        ));
    }

    insights
}

/// Fixed threshold rules over the category breakdown
pub fn generate_recommendations(
    categories: &[CategoryBreakdown],
    config: &AggregatorConfig,
) -> Vec<String> {
    if categories.is_empty() {
        return Vec::new();
    }

    let count_of = |code: &str| {
        categories
            .iter()
            .find(|c| c.code == code)
            .map_or(0, |c| c.count)
    };

    let mut recommendations = Vec::new();

    if count_of(config.comparison_focus.as_str()) > count_of(config.comparison_baseline.as_str()) {
        recommendations.push(config.focus_recommendation.clone());
    } else {
        recommendations.push(config.baseline_recommendation.clone());
    }

    let low_confidence: Vec<&str> = categories
        .iter()
        .filter(|c| c.avg_confidence < config.low_confidence_threshold)
        .map(|c| c.code.as_str())
        .collect();

    if !low_confidence.is_empty() {
        recommendations.push(format!(
            "以下行为的识别置信度较低，建议改善监控条件: {}",
            low_confidence.join(", ")
        ));
    }

    recommendations
}

/// Busiest hour; the map iterates in ascending order so the lowest hour wins ties
pub fn busiest_hour(hourly: &BTreeMap<u32, usize>) -> Option<(u32, usize)> {
    let mut best: Option<(u32, usize)> = None;
    for (&hour, &count) in hourly {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((hour, count));
        }
    }
    best
}

fn first_max_by<F>(categories: &[CategoryBreakdown], key: F) -> Option<&CategoryBreakdown>
where
    F: Fn(&CategoryBreakdown) -> f64,
{
    let mut best: Option<&CategoryBreakdown> = None;
    for category in categories {
        if best.map_or(true, |b| key(category) > key(b)) {
            best = Some(category);
        }
    }
    best
}
