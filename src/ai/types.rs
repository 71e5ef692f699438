//! Generative AI request/response types

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the generative AI provider
#[derive(Debug, Clone)]
pub struct GenAiConfig {
    /// API key; checked at first use, not at startup
    pub api_key: Option<String>,

    /// Base URL for API (default: https://generativelanguage.googleapis.com/v1beta)
    pub base_url: String,

    /// Image models, tried in order
    pub image_models: Vec<String>,

    /// Video models, tried in order
    pub video_models: Vec<String>,

    /// Video job polling schedule
    pub poll: PollPolicy,
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            image_models: vec![
                "gemini-2.5-flash-image".to_string(),
                "gemini-2.5-flash-image-preview".to_string(),
            ],
            video_models: vec![
                "veo-2.0-generate-001".to_string(),
                "veo-3.0-fast-generate-001".to_string(),
            ],
            poll: PollPolicy::default(),
        }
    }
}

/// Exponential backoff under a total time budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: u32,
    /// Give up once waiting longer would exceed this
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(60),
            multiplier: 2,
            timeout: Duration::from_secs(10 * 60),
        }
    }
}

impl PollPolicy {
    pub fn next_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.multiplier.max(1))
            .min(self.max_interval)
    }
}

/// Image sent inline with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 (standard alphabet)
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Generated still image
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Model that produced it
    pub model: String,
}

impl GeneratedImage {
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    pub fn as_inline(&self) -> InlineImage {
        InlineImage::from_bytes(&self.bytes, self.mime_type.clone())
    }
}

/// Generated video clip
#[derive(Debug, Clone)]
pub struct GeneratedVideo {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub model: String,
}

// Wire types for the generateContent endpoint

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

// Wire types for long-running video jobs

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoImage {
    pub bytes_base64_encoded: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoInstance {
    pub prompt: String,
    pub image: VideoImage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParameters {
    pub sample_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictLongRunningRequest {
    pub instances: Vec<VideoInstance>,
    pub parameters: VideoParameters,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoRef {
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedSample {
    pub video: Option<VideoRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub error: Option<OperationError>,
    pub response: Option<OperationResponse>,
}

impl Operation {
    /// First produced video's download URI
    pub fn video_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()?
            .video
            .as_ref()?
            .uri
            .as_deref()
    }
}
