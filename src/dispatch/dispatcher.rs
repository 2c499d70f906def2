use super::client::{ChatMessage, CompletionClient, CompletionRequest};
use super::mode::AnalysisMode;
use super::{DispatchConfig, EndpointProfile};
use crate::error::DispatchError;
use base64::Engine;
use chrono::Utc;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

const ANALYZE_CONFIDENCE: f64 = 0.85;
const HISTORY_CONFIDENCE: f64 = 0.92;

/// Keywords looked up in history records to derive tags
const HISTORY_TAG_KEYWORDS: [&str; 9] = [
    "宠物", "健康", "行为", "食物", "玩具", "睡觉", "运动", "医疗", "出行",
];

/// Record categories and their trigger words, checked in order
const HISTORY_CATEGORIES: [(&str, &[&str]); 4] = [
    ("健康记录", &["健康", "医疗", "体检", "病"]),
    ("行为记录", &["行为", "玩耍", "睡觉", "活动"]),
    ("饮食记录", &["食物", "喂食", "饮食"]),
    ("出行记录", &["出行", "旅行", "外出"]),
];
const DEFAULT_HISTORY_CATEGORY: &str = "日常记录";

/// An uploaded image as received from the client
#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    pub content_type: Option<&'a str>,
    pub bytes: &'a [u8],
}

impl<'a> ImageUpload<'a> {
    pub fn new(content_type: Option<&'a str>, bytes: &'a [u8]) -> Self {
        Self {
            content_type,
            bytes,
        }
    }

    /// Validate the upload and encode it as a base64 data URL
    fn to_data_url(&self) -> Result<String, DispatchError> {
        let content_type = match self.content_type {
            Some(ct) if ct.starts_with("image/") => ct,
            other => {
                error!("invalid content type: {:?}", other);
                return Err(DispatchError::InvalidContentType(
                    other.unwrap_or("<none>").to_string(),
                ));
            }
        };
        if self.bytes.is_empty() {
            error!("empty image payload");
            return Err(DispatchError::EmptyImage);
        }
        info!("image size: {} bytes", self.bytes.len());

        let encoded = base64::engine::general_purpose::STANDARD.encode(self.bytes);
        Ok(format!("data:{};base64,{}", content_type, encoded))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInput {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub sub_info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<UserInput>,
}

/// Response of the image endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    pub success: bool,
    pub mode: AnalysisMode,
    pub analysis: Analysis,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Response of the document endpoints; `result` is the model's raw text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub api_configured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Request dispatcher over a completion backend
pub struct Dispatcher<C: CompletionClient> {
    client: C,
    config: DispatchConfig,
}

impl<C: CompletionClient> Dispatcher<C> {
    pub fn new(client: C, config: DispatchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Analyze a camera image in the given mode.
    ///
    /// Unknown mode names fall back to `normal`.
    pub fn analyze_image(
        &self,
        image: ImageUpload<'_>,
        mode: &str,
    ) -> Result<AnalysisEnvelope, DispatchError> {
        info!(
            "analyze request: content_type={:?} mode={}",
            image.content_type, mode
        );
        let mode = AnalysisMode::resolve(mode);
        let data_url = image.to_data_url()?;

        let request = self.request(
            &self.config.profiles.analyze,
            vec![ChatMessage::user_with_image(
                self.config.prompts.for_mode(mode),
                data_url,
            )],
        );

        let description = self.complete(&request).unwrap_or_else(|e| {
            error!("analysis upstream failed: {}", e);
            format!(
                "This is an image analysis result in {} mode. Returning mock data due to API configuration issues.",
                mode
            )
        });

        info!("analysis completed: mode={}", mode);
        Ok(AnalysisEnvelope {
            success: true,
            mode,
            analysis: Analysis {
                title: mode.title().to_string(),
                description,
                confidence: ANALYZE_CONFIDENCE,
                sub_info: mode.sub_info().to_string(),
                tags: None,
                category: None,
                user_input: None,
            },
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// Analyze an image against a user-provided history entry
    pub fn analyze_history(
        &self,
        image: ImageUpload<'_>,
        title: &str,
        description: &str,
    ) -> Result<AnalysisEnvelope, DispatchError> {
        info!("history analysis request: title={}", title);
        let data_url = image.to_data_url()?;

        let request = self.request(
            &self.config.profiles.history,
            vec![ChatMessage::user_with_image(
                self.config.prompts.history_record(title, description),
                data_url,
            )],
        );

        let analysis = self.complete(&request).unwrap_or_else(|e| {
            error!("history upstream failed: {}", e);
            format!(
                "基于历史记录分析：{}。{} 图片内容已记录并分类用于历史追踪。",
                title, description
            )
        });

        let sub_info = if description.is_empty() {
            "历史数据分析".to_string()
        } else {
            format!("记录时间：{}", description)
        };

        Ok(AnalysisEnvelope {
            success: true,
            mode: AnalysisMode::History,
            analysis: Analysis {
                title: format!("历史记录：{}", title),
                tags: Some(history_tags(&analysis, title, description)),
                category: Some(history_category(title, description).to_string()),
                user_input: Some(UserInput {
                    title: title.to_string(),
                    description: description.to_string(),
                }),
                description: analysis,
                confidence: HISTORY_CONFIDENCE,
                sub_info,
            },
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// Ask the model to split a free-text document into timeline events
    pub fn analyze_document(&self, text: &str) -> DocumentResult {
        self.parse_text(
            text,
            &self.config.prompts.document_system,
            &self.config.profiles.document,
        )
    }

    /// Same as [`analyze_document`](Self::analyze_document) with the history-record profile
    pub fn analyze_history_text(&self, text: &str) -> DocumentResult {
        self.parse_text(
            text,
            &self.config.prompts.history_text_system,
            &self.config.profiles.history_text,
        )
    }

    pub fn health(&self) -> HealthStatus {
        if self.client.is_configured() {
            HealthStatus {
                status: "healthy".to_string(),
                api_configured: true,
                model: Some(self.config.profiles.analyze.model.clone()),
                message: None,
            }
        } else {
            HealthStatus {
                status: "error".to_string(),
                api_configured: false,
                model: None,
                message: Some("ARK_API_KEY is not set".to_string()),
            }
        }
    }

    fn parse_text(&self, text: &str, system: &str, profile: &EndpointProfile) -> DocumentResult {
        info!("document request: {} chars", text.chars().count());

        let request = self.request(
            profile,
            vec![
                ChatMessage::system(system),
                ChatMessage::user(self.config.prompts.document_user(text)),
            ],
        );

        let result = match self.complete(&request) {
            Ok(result) => result,
            Err(e) => {
                error!("document upstream failed: {}", e);
                return DocumentResult {
                    result: placeholder_document(&e),
                };
            }
        };

        match serde_json::from_str::<serde_json::Value>(&result) {
            Ok(parsed) => {
                let count = parsed
                    .get("events")
                    .and_then(|events| events.as_array())
                    .map_or(0, |events| events.len());
                info!("model returned {} events", count);
            }
            Err(e) => warn!("model response is not valid JSON: {}", e),
        }

        DocumentResult { result }
    }

    fn request(&self, profile: &EndpointProfile, messages: Vec<ChatMessage>) -> CompletionRequest {
        CompletionRequest {
            model: profile.model.clone(),
            messages,
            max_tokens: profile.max_tokens,
            temperature: profile.temperature,
        }
    }

    /// Run the request, retrying up to `max_attempts` times
    fn complete(&self, request: &CompletionRequest) -> Result<String, DispatchError> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.client.complete(request) {
                Ok(text) => return Ok(text),
                Err(e) if attempt < attempts => {
                    warn!("attempt {}/{} failed: {}", attempt, attempts, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Empty event list in the layout the document prompt asks for
fn placeholder_document(error: &DispatchError) -> String {
    serde_json::json!({
        "events": [],
        "summary": {
            "total_events": 0,
            "parsing_notes": format!("upstream unavailable: {}", error),
        }
    })
    .to_string()
}

/// Title first, then every keyword found in the combined text, each once
fn history_tags(analysis: &str, title: &str, description: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    if !title.is_empty() {
        tags.push(title.to_lowercase());
    }

    let text = format!("{} {} {}", title, description, analysis).to_lowercase();
    for keyword in HISTORY_TAG_KEYWORDS {
        if text.contains(keyword) && !tags.iter().any(|t| t == keyword) {
            tags.push(keyword.to_string());
        }
    }
    tags
}

fn history_category(title: &str, description: &str) -> &'static str {
    let text = format!("{} {}", title, description).to_lowercase();
    HISTORY_CATEGORIES
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map_or(DEFAULT_HISTORY_CATEGORY, |&(category, _)| category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::client::{ContentPart, MessageContent};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays scripted answers and records every request
    struct ScriptedClient {
        answers: RefCell<VecDeque<Result<String, DispatchError>>>,
        requests: RefCell<Vec<CompletionRequest>>,
        configured: bool,
    }

    impl ScriptedClient {
        fn new(answers: Vec<Result<String, DispatchError>>) -> Self {
            Self {
                answers: RefCell::new(answers.into()),
                requests: RefCell::new(Vec::new()),
                configured: true,
            }
        }
    }

    impl CompletionClient for ScriptedClient {
        fn complete(&self, request: &CompletionRequest) -> Result<String, DispatchError> {
            self.requests.borrow_mut().push(request.clone());
            self.answers
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(DispatchError::EmptyCompletion))
        }

        fn is_configured(&self) -> bool {
            self.configured
        }
    }

    fn dispatcher(answers: Vec<Result<String, DispatchError>>) -> Dispatcher<ScriptedClient> {
        Dispatcher::new(ScriptedClient::new(answers), DispatchConfig::default())
    }

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G'];

    #[test]
    fn test_analyze_image_success() {
        let d = dispatcher(vec![Ok("一只橘猫在睡觉".to_string())]);
        let envelope = d
            .analyze_image(ImageUpload::new(Some("image/png"), PNG), "pet")
            .unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.mode, AnalysisMode::Pet);
        assert_eq!(envelope.analysis.title, "Pet Recognition");
        assert_eq!(envelope.analysis.sub_info, "Pet Behavior Recognition");
        assert_eq!(envelope.analysis.description, "一只橘猫在睡觉");
        assert_eq!(envelope.analysis.confidence, 0.85);
        assert!(envelope.timestamp > 0);

        let requests = d.client.requests.borrow();
        let request = &requests[0];
        assert_eq!(request.model, "doubao-seed-1-6-250615");
        assert_eq!(request.max_tokens, 300);
        let MessageContent::Parts(parts) = &request.messages[0].content else {
            panic!("expected a multi-part message");
        };
        assert_eq!(
            parts[0],
            ContentPart::Text {
                text: d.config().prompts.pet.clone()
            }
        );
        let ContentPart::ImageUrl { image_url } = &parts[1] else {
            panic!("expected an image part");
        };
        assert_eq!(image_url.url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_unknown_mode_falls_back_to_normal() {
        let d = dispatcher(vec![Ok("scene".to_string())]);
        let envelope = d
            .analyze_image(ImageUpload::new(Some("image/jpeg"), PNG), "karaoke")
            .unwrap();
        assert_eq!(envelope.mode, AnalysisMode::Normal);
        assert_eq!(envelope.analysis.title, "Scene Recognition");
    }

    #[test]
    fn test_invalid_uploads_are_hard_errors() {
        let d = dispatcher(vec![]);

        let err = d
            .analyze_image(ImageUpload::new(Some("text/plain"), PNG), "pet")
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidContentType(_)));
        assert!(err.is_input_error());

        let err = d
            .analyze_image(ImageUpload::new(None, PNG), "pet")
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidContentType(_)));

        let err = d
            .analyze_history(ImageUpload::new(Some("image/png"), &[]), "t", "")
            .unwrap_err();
        assert!(matches!(err, DispatchError::EmptyImage));

        // nothing reached the upstream
        assert!(d.client.requests.borrow().is_empty());
    }

    #[test]
    fn test_upstream_failure_becomes_placeholder() {
        let d = dispatcher(vec![Err(DispatchError::Transport("timeout".to_string()))]);
        let envelope = d
            .analyze_image(ImageUpload::new(Some("image/png"), PNG), "travel")
            .unwrap();

        assert!(envelope.success);
        assert_eq!(
            envelope.analysis.description,
            "This is an image analysis result in travel mode. Returning mock data due to API configuration issues."
        );
    }

    #[test]
    fn test_retry_until_success() {
        let mut config = DispatchConfig::default();
        config.max_attempts = 3;
        let client = ScriptedClient::new(vec![
            Err(DispatchError::Transport("reset".to_string())),
            Err(DispatchError::EmptyCompletion),
            Ok("third time".to_string()),
        ]);
        let d = Dispatcher::new(client, config);

        let envelope = d
            .analyze_image(ImageUpload::new(Some("image/png"), PNG), "normal")
            .unwrap();
        assert_eq!(envelope.analysis.description, "third time");
        assert_eq!(d.client.requests.borrow().len(), 3);
    }

    #[test]
    fn test_single_attempt_by_default() {
        let d = dispatcher(vec![
            Err(DispatchError::EmptyCompletion),
            Ok("unused".to_string()),
        ]);
        let _ = d.analyze_document("x");
        assert_eq!(d.client.requests.borrow().len(), 1);
    }

    #[test]
    fn test_analyze_history() {
        let d = dispatcher(vec![Ok("狗狗在公园运动，精神很好".to_string())]);
        let envelope = d
            .analyze_history(ImageUpload::new(Some("image/png"), PNG), "Walk", "下午散步玩耍")
            .unwrap();

        assert_eq!(envelope.mode, AnalysisMode::History);
        let analysis = &envelope.analysis;
        assert_eq!(analysis.title, "历史记录：Walk");
        assert_eq!(analysis.confidence, 0.92);
        assert_eq!(analysis.sub_info, "记录时间：下午散步玩耍");
        assert_eq!(
            analysis.tags,
            Some(vec!["walk".to_string(), "运动".to_string()])
        );
        assert_eq!(analysis.category.as_deref(), Some("行为记录"));
        assert_eq!(
            analysis.user_input,
            Some(UserInput {
                title: "Walk".to_string(),
                description: "下午散步玩耍".to_string(),
            })
        );

        let requests = d.client.requests.borrow();
        let request = &requests[0];
        assert_eq!(request.model, "doubao-seed-1-6-thinking-250715");
        assert_eq!(request.max_tokens, 500);
    }

    #[test]
    fn test_history_placeholder() {
        let d = dispatcher(vec![Err(DispatchError::MissingApiKey)]);
        let envelope = d
            .analyze_history(ImageUpload::new(Some("image/png"), PNG), "体检", "")
            .unwrap();

        assert_eq!(
            envelope.analysis.description,
            "基于历史记录分析：体检。 图片内容已记录并分类用于历史追踪。"
        );
        assert_eq!(envelope.analysis.sub_info, "历史数据分析");
        assert_eq!(envelope.analysis.category.as_deref(), Some("健康记录"));
    }

    #[test]
    fn test_history_category_rules() {
        assert_eq!(history_category("喂食", ""), "饮食记录");
        assert_eq!(history_category("周末", "外出旅行"), "出行记录");
        assert_eq!(history_category("周末", ""), "日常记录");
        // earlier rules win
        assert_eq!(history_category("玩耍后体检", ""), "健康记录");
    }

    #[test]
    fn test_analyze_document() {
        let answer = r#"{"events":[{"title":"a"},{"title":"b"}],"summary":{}}"#;
        let d = dispatcher(vec![Ok(answer.to_string())]);
        let result = d.analyze_document("今天早上喂了猫");
        assert_eq!(result.result, answer);

        let requests = d.client.requests.borrow();
        let request = &requests[0];
        assert_eq!(request.model, "doubao-seed-1-6-250615");
        assert_eq!(request.max_tokens, 3000);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(
            request.messages[1],
            ChatMessage::user("请解析以下宠物活动文档内容：\n\n今天早上喂了猫")
        );
    }

    #[test]
    fn test_document_placeholder_is_valid_json() {
        let d = dispatcher(vec![Err(DispatchError::Upstream {
            status: 502,
            body: "bad gateway".to_string(),
        })]);
        let result = d.analyze_history_text("text");
        let parsed: serde_json::Value = serde_json::from_str(&result.result).unwrap();

        assert_eq!(parsed["events"], serde_json::json!([]));
        assert_eq!(parsed["summary"]["total_events"], 0);

        let requests = d.client.requests.borrow();
        let request = &requests[0];
        assert_eq!(request.max_tokens, 2000);
        assert_eq!(request.model, "doubao-seed-1-6-thinking-250715");
    }

    #[test]
    fn test_health() {
        let d = dispatcher(vec![]);
        assert_eq!(d.health().status, "healthy");
        assert_eq!(d.health().model.as_deref(), Some("doubao-seed-1-6-250615"));

        let mut client = ScriptedClient::new(vec![]);
        client.configured = false;
        let d = Dispatcher::new(client, DispatchConfig::default());
        let health = d.health();
        assert_eq!(health.status, "error");
        assert!(!health.api_configured);
    }

    #[test]
    fn test_envelope_omits_absent_fields() {
        let d = dispatcher(vec![Ok("ok".to_string())]);
        let envelope = d
            .analyze_image(ImageUpload::new(Some("image/png"), PNG), "health")
            .unwrap();
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["mode"], "health");
        assert!(value["analysis"].get("tags").is_none());
        assert!(value["analysis"].get("user_input").is_none());
    }
}
