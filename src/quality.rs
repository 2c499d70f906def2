//! Data quality assessment of an imported event set

use crate::interchange::ImportStats;
use crate::types::Event;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;

const COMPLETENESS_WEIGHT: f64 = 30.0;
const CONFIDENCE_WEIGHT: f64 = 25.0;
const DESCRIPTION_WEIGHT: f64 = 25.0;
const DIVERSITY_WEIGHT: f64 = 20.0;

/// Reasons longer than this many characters count as detailed
const DETAILED_DESCRIPTION_CHARS: usize = 50;

/// Number of distinct categories that earns the full diversity score
const DIVERSITY_TARGET: usize = 10;

/// Overall judgement derived from the total score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Excellent,
    Good,
    NeedsWork,
}

impl Verdict {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Verdict::Excellent
        } else if score >= 60.0 {
            Verdict::Good
        } else {
            Verdict::NeedsWork
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Excellent => "数据质量优秀，可以直接用于统计分析和行为分析",
            Verdict::Good => "数据质量良好，建议优化描述质量",
            Verdict::NeedsWork => "数据质量需要改进，建议重新处理",
        }
    }
}

/// Weighted score components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    /// Imported share of rows (max 30)
    pub completeness: f64,
    /// Mean confidence (max 25)
    pub confidence: f64,
    /// Share of detailed descriptions (max 25)
    pub description: f64,
    /// Category diversity (max 20)
    pub diversity: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_records: usize,
    pub imported_records: usize,
    pub category_count: usize,
    pub avg_confidence: f64,
    pub min_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
    /// Mean `reasons` length in characters
    pub avg_description_length: f64,
    /// Share of descriptions containing CJK ideographs (0-100)
    pub chinese_description_pct: f64,
    /// Share of detailed descriptions (0-100)
    pub detailed_description_pct: f64,
    pub scores: QualityScores,
    pub verdict: Verdict,
}

impl QualityReport {
    /// Score `events` against the stats of the import that produced them
    pub fn assess(events: &[Event], stats: &ImportStats) -> Self {
        let n = events.len();
        let ratio = |count: usize| if n == 0 { 0.0 } else { count as f64 / n as f64 };

        let avg_confidence = if n == 0 {
            0.0
        } else {
            events.iter().map(|e| e.confidence).sum::<f64>() / n as f64
        };
        let min_confidence = events.iter().map(|e| e.confidence).reduce(f64::min);
        let max_confidence = events.iter().map(|e| e.confidence).reduce(f64::max);

        let lengths: Vec<usize> = events.iter().map(|e| e.reasons.chars().count()).collect();
        let avg_description_length = if n == 0 {
            0.0
        } else {
            lengths.iter().sum::<usize>() as f64 / n as f64
        };
        let detailed = lengths
            .iter()
            .filter(|&&len| len > DETAILED_DESCRIPTION_CHARS)
            .count();
        let chinese = events.iter().filter(|e| contains_cjk(&e.reasons)).count();

        let category_count = events
            .iter()
            .map(|e| e.category.as_str())
            .collect::<HashSet<_>>()
            .len();

        let completeness = if stats.total == 0 {
            0.0
        } else {
            stats.imported as f64 / stats.total as f64
        };

        let mut scores = QualityScores {
            completeness: completeness * COMPLETENESS_WEIGHT,
            confidence: avg_confidence * CONFIDENCE_WEIGHT,
            description: ratio(detailed) * DESCRIPTION_WEIGHT,
            diversity: (category_count as f64 / DIVERSITY_TARGET as f64).min(1.0)
                * DIVERSITY_WEIGHT,
            total: 0.0,
        };
        scores.total =
            scores.completeness + scores.confidence + scores.description + scores.diversity;

        QualityReport {
            total_records: stats.total,
            imported_records: stats.imported,
            category_count,
            avg_confidence,
            min_confidence,
            max_confidence,
            avg_description_length,
            chinese_description_pct: ratio(chinese) * 100.0,
            detailed_description_pct: ratio(detailed) * 100.0,
            verdict: Verdict::from_score(scores.total),
            scores,
        }
    }

    /// Human-readable rendering
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let s = &self.scores;
        let _ = writeln!(out, "records:            {}/{}", self.imported_records, self.total_records);
        let _ = writeln!(out, "categories:         {}", self.category_count);
        let _ = writeln!(out, "avg confidence:     {:.3}", self.avg_confidence);
        let _ = writeln!(out, "avg description:    {:.1} chars", self.avg_description_length);
        let _ = writeln!(out, "chinese share:      {:.1}%", self.chinese_description_pct);
        let _ = writeln!(out, "detailed share:     {:.1}%", self.detailed_description_pct);
        let _ = writeln!(out, "completeness:       {:.1}/30", s.completeness);
        let _ = writeln!(out, "confidence:         {:.1}/25", s.confidence);
        let _ = writeln!(out, "description:        {:.1}/25", s.description);
        let _ = writeln!(out, "diversity:          {:.1}/20", s.diversity);
        let _ = writeln!(out, "total:              {:.1}/100", s.total);
        let _ = writeln!(out, "verdict:            {}", self.verdict.message());
        out
    }
}

fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}
