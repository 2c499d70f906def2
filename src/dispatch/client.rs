//! Chat-completion client seam
//!
//! The dispatcher only sees [`CompletionClient`]. [`ArkClient`] talks to an
//! OpenAI-compatible `/chat/completions` endpoint and is compiled with the
//! `ark` feature.

use crate::error::DispatchError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multi-part user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message carrying a prompt and an image data URL
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }
}

/// Request body of a chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Trait for chat-completion backends
pub trait CompletionClient {
    /// Run one completion and return the trimmed text of the first choice
    fn complete(&self, request: &CompletionRequest) -> Result<String, DispatchError>;

    /// Whether credentials are present
    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Extract the first choice's text from a raw response body
pub(crate) fn first_choice_text(body: &str) -> Result<String, DispatchError> {
    let response: CompletionResponse =
        serde_json::from_str(body).map_err(|e| DispatchError::InvalidResponse(e.to_string()))?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(DispatchError::EmptyCompletion);
    }
    Ok(text)
}

#[cfg(feature = "ark")]
pub use ark::{ArkClient, DEFAULT_BASE_URL};

#[cfg(feature = "ark")]
mod ark {
    use super::{first_choice_text, CompletionClient, CompletionRequest};
    use crate::error::DispatchError;
    use log::{debug, info};
    use std::time::Duration;

    pub const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    /// Blocking client for the Ark chat-completions API
    pub struct ArkClient {
        http: reqwest::blocking::Client,
        api_key: String,
        base_url: String,
    }

    impl ArkClient {
        pub fn new(api_key: &str, base_url: &str) -> Result<Self, DispatchError> {
            let http = reqwest::blocking::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| DispatchError::Transport(e.to_string()))?;
            Ok(Self {
                http,
                api_key: api_key.to_string(),
                base_url: base_url.trim_end_matches('/').to_string(),
            })
        }

        /// Configure from `ARK_API_KEY` and, optionally, `ARK_BASE_URL`
        pub fn from_env() -> Result<Self, DispatchError> {
            let api_key = std::env::var("ARK_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or(DispatchError::MissingApiKey)?;
            let base_url =
                std::env::var("ARK_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
            Self::new(&api_key, &base_url)
        }
    }

    impl CompletionClient for ArkClient {
        fn complete(&self, request: &CompletionRequest) -> Result<String, DispatchError> {
            let url = format!("{}/chat/completions", self.base_url);
            debug!("POST {} model={}", url, request.model);

            let resp = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .map_err(|e| DispatchError::Transport(e.to_string()))?;

            let status = resp.status();
            let body = resp
                .text()
                .map_err(|e| DispatchError::Transport(e.to_string()))?;

            if !status.is_success() {
                return Err(DispatchError::Upstream {
                    status: status.as_u16(),
                    body,
                });
            }

            let text = first_choice_text(&body)?;
            info!("completion ok, {} chars", text.chars().count());
            Ok(text)
        }

        fn is_configured(&self) -> bool {
            !self.api_key.is_empty()
        }
    }
}
