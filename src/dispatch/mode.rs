//! Analysis modes of the camera endpoints

use crate::error::DispatchError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of analysis modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Normal,
    Pet,
    Health,
    Travel,
    History,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 5] = [
        AnalysisMode::Normal,
        AnalysisMode::Pet,
        AnalysisMode::Health,
        AnalysisMode::Travel,
        AnalysisMode::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Normal => "normal",
            AnalysisMode::Pet => "pet",
            AnalysisMode::Health => "health",
            AnalysisMode::Travel => "travel",
            AnalysisMode::History => "history",
        }
    }

    /// Parse a mode name, falling back to [`AnalysisMode::Normal`] for unknown names
    pub fn resolve(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("invalid mode `{}`, using `normal`", name);
            AnalysisMode::Normal
        })
    }

    /// Result title shown by the client
    pub fn title(&self) -> &'static str {
        match self {
            AnalysisMode::Normal => "Scene Recognition",
            AnalysisMode::Pet => "Pet Recognition",
            AnalysisMode::Health => "Health Analysis",
            AnalysisMode::Travel => "Travel Assistant",
            AnalysisMode::History => "History Analysis",
        }
    }

    pub fn sub_info(&self) -> &'static str {
        match self {
            AnalysisMode::Normal => "AI Vision Analysis",
            AnalysisMode::Pet => "Pet Behavior Recognition",
            AnalysisMode::Health => "Health Status Assessment",
            AnalysisMode::Travel => "Travel Perspective",
            AnalysisMode::History => "Historical Data Processing",
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| DispatchError::UnknownMode(s.to_string()))
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_modes() {
        for mode in AnalysisMode::ALL {
            assert_eq!(mode.as_str().parse::<AnalysisMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_unknown_mode_resolves_to_normal() {
        assert!("Pet".parse::<AnalysisMode>().is_err());
        assert_eq!(AnalysisMode::resolve("karaoke"), AnalysisMode::Normal);
        assert_eq!(AnalysisMode::resolve("travel"), AnalysisMode::Travel);
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AnalysisMode::Health).unwrap(),
            "\"health\""
        );
    }
}
