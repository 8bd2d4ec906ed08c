//! Upstream multimodal completion transport.
//!
//! One call to [`DetectionTransport::send`] performs exactly one outbound
//! request. There is no retry, caching or batching at this layer.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::credential::ApiKey;
use super::encoder::EncodedImage;
use super::error::DetectError;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const UNKNOWN_ERROR: &str = "Unknown error";

/// Sends an encoded image plus instruction upstream and returns the raw
/// completion text.
pub trait DetectionTransport: Send + Sync {
    /// Transport identifier.
    fn name(&self) -> &'static str;

    /// Fails with `DetectError::Network` when no response is obtained and
    /// `DetectError::Transport` on a non-success status or empty content.
    fn send(&self, image: &EncodedImage, instruction: &str) -> Result<String, DetectError>;
}

/// Fidelity hint sent with the image part.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    #[default]
    Low,
    High,
    Auto,
}

impl FromStr for ImageDetail {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "high" => Ok(Self::High),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "unknown image detail '{}'; expected low, high or auto",
                other
            )),
        }
    }
}

impl fmt::Display for ImageDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Auto => "auto",
        };
        f.write_str(value)
    }
}

/// Request shaping for the upstream endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamSettings {
    pub url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub image_detail: ImageDetail,
    pub timeout: Duration,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            image_detail: ImageDetail::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: [ContentPart<'a>; 2],
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: ImageDetail,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn build_request<'a>(
    settings: &'a UpstreamSettings,
    image: &EncodedImage,
    instruction: &'a str,
) -> ChatRequest<'a> {
    ChatRequest {
        model: &settings.model,
        messages: [ChatMessage {
            role: "user",
            content: [
                ContentPart::Text { text: instruction },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_uri(),
                        detail: settings.image_detail,
                    },
                },
            ],
        }],
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    }
}

fn first_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.is_empty())
}

fn upstream_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty())
}

/// Bearer-authenticated JSON-over-HTTPS transport.
pub struct HttpTransport {
    agent: ureq::Agent,
    settings: UpstreamSettings,
    api_key: ApiKey,
}

impl HttpTransport {
    pub fn new(settings: UpstreamSettings, api_key: ApiKey) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(settings.timeout).build();
        Self {
            agent,
            settings,
            api_key,
        }
    }

    pub fn settings(&self) -> &UpstreamSettings {
        &self.settings
    }
}

impl DetectionTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn send(&self, image: &EncodedImage, instruction: &str) -> Result<String, DetectError> {
        let body = build_request(&self.settings, image, instruction);
        let response = match self
            .agent
            .post(&self.settings.url)
            .set("Authorization", &self.api_key.bearer())
            .send_json(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let message = response
                    .into_string()
                    .ok()
                    .and_then(|body| upstream_error_message(&body))
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
                return Err(DetectError::status(code, message));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(DetectError::network(transport.to_string()));
            }
        };

        let envelope: ChatResponse = response.into_json().map_err(|e| DetectError::Transport {
            status: None,
            message: format!("undecodable response envelope: {}", e),
        })?;
        first_content(envelope).ok_or_else(DetectError::empty_content)
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("settings", &self.settings)
            .field("api_key", &self.api_key)
            .finish()
    }
}
