//! Completion dispatch
//!
//! Turns camera uploads and free-text documents into chat-completion requests,
//! sends them through a [`CompletionClient`] and wraps the answer in the
//! response shapes the mobile client expects.
//!
//! Malformed input is rejected with a [`DispatchError`](crate::error::DispatchError).
//! Upstream failures are not: the caller gets placeholder text so the UI always
//! has something to render.

mod client;
mod dispatcher;
mod mode;
mod prompts;

pub use client::{
    ChatMessage, CompletionClient, CompletionRequest, ContentPart, ImageUrl, MessageContent, Role,
};
#[cfg(feature = "ark")]
pub use client::{ArkClient, DEFAULT_BASE_URL};
pub use dispatcher::{
    Analysis, AnalysisEnvelope, DocumentResult, Dispatcher, HealthStatus, ImageUpload, UserInput,
};
pub use mode::AnalysisMode;
pub use prompts::PromptSet;

use serde::{Deserialize, Serialize};

/// Model and sampling settings of one endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointProfile {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl EndpointProfile {
    fn new(model: &str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }
}

const VISION_MODEL: &str = "doubao-seed-1-6-250615";
const THINKING_MODEL: &str = "doubao-seed-1-6-thinking-250715";

/// Profiles of the four endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointProfiles {
    pub analyze: EndpointProfile,
    pub history: EndpointProfile,
    pub document: EndpointProfile,
    pub history_text: EndpointProfile,
}

impl Default for EndpointProfiles {
    fn default() -> Self {
        Self {
            analyze: EndpointProfile::new(VISION_MODEL, 300, 0.7),
            history: EndpointProfile::new(THINKING_MODEL, 500, 0.3),
            document: EndpointProfile::new(VISION_MODEL, 3000, 0.3),
            history_text: EndpointProfile::new(THINKING_MODEL, 2000, 0.3),
        }
    }
}

/// Settings for the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub prompts: PromptSet,
    pub profiles: EndpointProfiles,
    /// Upstream attempts per request; values below 1 behave as 1
    pub max_attempts: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prompts: PromptSet::default(),
            profiles: EndpointProfiles::default(),
            max_attempts: 1,
        }
    }
}
