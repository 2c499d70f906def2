//! Immutable configuration injected into the extractor and aggregator
//!
//! Category labels, tag keywords and recommendation thresholds live here rather
//! than in module globals, so a different category set or localization can be
//! loaded from a JSON file and exercised in tests.

use crate::dispatch::DispatchConfig;
use crate::error::FluxError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Display labels for a category code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryLabel {
    /// Machine code, e.g. `observe`
    pub code: String,
    /// Short label used by timelines, e.g. `观望`
    pub short: String,
    /// Group label used by reports, e.g. `观望行为`
    pub display: String,
}

impl CategoryLabel {
    fn new(code: &str, short: &str, display: &str) -> Self {
        Self {
            code: code.to_string(),
            short: short.to_string(),
            display: display.to_string(),
        }
    }
}

/// Known category codes. Membership only affects display; unknown codes fall
/// back to the code itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTable {
    pub entries: Vec<CategoryLabel>,
}

impl CategoryTable {
    pub fn get(&self, code: &str) -> Option<&CategoryLabel> {
        self.entries.iter().find(|entry| entry.code == code)
    }

    /// Report label for a code, or the code itself when unmapped
    pub fn display_label<'a>(&'a self, code: &'a str) -> &'a str {
        self.get(code).map(|e| e.display.as_str()).unwrap_or(code)
    }

    /// Short label for a code, or the code itself when unmapped
    pub fn short_label<'a>(&'a self, code: &'a str) -> &'a str {
        self.get(code).map(|e| e.short.as_str()).unwrap_or(code)
    }

    pub fn is_known(&self, code: &str) -> bool {
        self.get(code).is_some()
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            entries: vec![
                CategoryLabel::new("observe", "观望", "观望行为"),
                CategoryLabel::new("explore", "探索", "探索行为"),
                CategoryLabel::new("rest", "休息", "休息行为"),
                CategoryLabel::new("occupy", "占据", "领地行为"),
                CategoryLabel::new("feeding", "进食", "进食行为"),
                CategoryLabel::new("exercise", "运动", "运动行为"),
                CategoryLabel::new("grooming", "清洁", "清洁行为"),
                CategoryLabel::new("training", "训练", "训练行为"),
                CategoryLabel::new("social", "社交", "社交行为"),
                CategoryLabel::new("elimination", "如厕", "如厕行为"),
                CategoryLabel::new("abnormal", "异常", "异常行为"),
                CategoryLabel::new("other", "其他", "其他行为"),
                CategoryLabel::new("no_pet", "无宠物", "无宠物"),
                CategoryLabel::new("neutral", "中性", "无特定行为"),
                CategoryLabel::new("attack", "攻击", "攻击行为"),
                CategoryLabel::new("play", "玩耍", "玩耍行为"),
                CategoryLabel::new("sleep", "睡觉", "睡觉行为"),
                CategoryLabel::new("eat", "进食", "进食行为"),
                CategoryLabel::new("drink", "饮水", "饮水行为"),
                CategoryLabel::new("groom", "梳理", "梳理行为"),
            ],
        }
    }
}

/// A tag emitted when any of its keywords occurs in the reasons text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRule {
    pub tag: String,
    pub keywords: Vec<String>,
}

impl TagRule {
    fn new(tag: &str, keywords: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

fn default_tag_rules() -> Vec<TagRule> {
    vec![
        TagRule::new("猫", &["猫"]),
        TagRule::new("狗", &["狗"]),
        TagRule::new("室内", &["室内", "房间", "家庭"]),
        TagRule::new("观望", &["观望", "注视", "观察", "警觉"]),
        TagRule::new("探索", &["探索", "嗅探", "巡视", "移动"]),
        TagRule::new("休息", &["休息", "躺", "放松", "静止"]),
        TagRule::new("床单", &["床单", "垫子", "毛绒"]),
        TagRule::new("蓝色", &["蓝色"]),
    ]
}

/// Settings for the record extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Keyword table for tag derivation, applied in order
    pub tag_rules: Vec<TagRule>,
    /// Substring of `reasons` that marks an indoor event
    pub indoor_marker: String,
    pub indoor_location: String,
    pub unknown_location: String,
    /// Appended to the JSON label to build the event title
    pub title_suffix: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            tag_rules: default_tag_rules(),
            indoor_marker: "室内".to_string(),
            indoor_location: "室内".to_string(),
            unknown_location: "未知".to_string(),
            title_suffix: "行为".to_string(),
        }
    }
}

/// Settings for the aggregator and its recommendation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub categories: CategoryTable,
    /// Categories whose average confidence falls below this are flagged
    pub low_confidence_threshold: f64,
    /// Category whose count is compared against `comparison_baseline`
    pub comparison_focus: String,
    pub comparison_baseline: String,
    /// Recommendation when the focus category strictly outnumbers the baseline
    pub focus_recommendation: String,
    /// Recommendation otherwise
    pub baseline_recommendation: String,
    /// Number of peak hours listed per category
    pub peak_hour_limit: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            categories: CategoryTable::default(),
            low_confidence_threshold: 0.7,
            comparison_focus: "explore".to_string(),
            comparison_baseline: "observe".to_string(),
            focus_recommendation: "宠物表现出较强的探索欲望，建议提供更多新环境和玩具".to_string(),
            baseline_recommendation: "宠物更倾向于观察，建议创造安全的观察环境".to_string(),
            peak_hour_limit: 3,
        }
    }
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PawfluxConfig {
    pub extractor: ExtractorConfig,
    pub aggregator: AggregatorConfig,
    pub dispatch: DispatchConfig,
}

impl PawfluxConfig {
    pub fn from_json(json: &str) -> Result<Self, FluxError> {
        let config: PawfluxConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, FluxError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            FluxError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, FluxError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), FluxError> {
        let threshold = self.aggregator.low_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(FluxError::ConfigError(format!(
                "low_confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if let Some(rule) = self
            .extractor
            .tag_rules
            .iter()
            .find(|r| r.keywords.iter().any(|k| k.is_empty()))
        {
            return Err(FluxError::ConfigError(format!(
                "tag `{}` has an empty keyword",
                rule.tag
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_code_falls_back_to_code() {
        let table = CategoryTable::default();
        assert_eq!(table.display_label("observe"), "观望行为");
        assert_eq!(table.short_label("neutral"), "中性");
        assert_eq!(table.display_label("zoomies"), "zoomies");
        assert!(!table.is_known("zoomies"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = PawfluxConfig::from_json(
            r#"{ "aggregator": { "low_confidence_threshold": 0.5 } }"#,
        )
        .unwrap();

        assert_eq!(config.aggregator.low_confidence_threshold, 0.5);
        assert_eq!(config.aggregator.comparison_focus, "explore");
        assert_eq!(config.extractor.indoor_marker, "室内");
        assert!(config.aggregator.categories.is_known("observe"));
        assert_eq!(config.dispatch.max_attempts, 1);
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let result =
            PawfluxConfig::from_json(r#"{ "aggregator": { "low_confidence_threshold": 70 } }"#);
        assert!(matches!(result, Err(FluxError::ConfigError(_))));
    }

    #[test]
    fn test_empty_keyword_rejected() {
        let result = PawfluxConfig::from_json(
            r#"{ "extractor": { "tag_rules": [{ "tag": "x", "keywords": [""] }] } }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let config = PawfluxConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(PawfluxConfig::from_json(&json).unwrap(), config);
    }
}
