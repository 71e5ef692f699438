//! Generative AI client
//!
//! Handles communication with the Gemini API, including:
//! - Costume transforms via generateContent with inline images
//! - Video generation as a long-running job, polled with backoff
//! - Model fallback in configured order

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::error::GenerationError;
use super::http_client::genai_client;
use super::types::*;

/// Anything that can dress up a photo
#[async_trait]
pub trait CostumeGenerator: Send + Sync {
    async fn transform_image(
        &self,
        images: &[InlineImage],
        prompt: &str,
    ) -> Result<GeneratedImage, GenerationError>;

    async fn generate_video(
        &self,
        image: &InlineImage,
        prompt: &str,
    ) -> Result<GeneratedVideo, GenerationError>;
}

/// Gemini API client
pub struct GenAiClient {
    client: Client,
    config: GenAiConfig,
}

impl GenAiClient {
    pub fn new(config: GenAiConfig) -> Self {
        Self::with_client(genai_client().clone(), config)
    }

    pub fn with_client(client: Client, config: GenAiConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &GenAiConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, GenerationError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(GenerationError::MissingApiKey)
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(GenerationError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// One generateContent attempt against a single model
    async fn transform_with_model(
        &self,
        model: &str,
        images: &[InlineImage],
        prompt: &str,
    ) -> Result<GeneratedImage, GenerationError> {
        let api_key = self.api_key()?;

        let mut parts: Vec<Part> = images
            .iter()
            .map(|image| Part {
                inline_data: Some(InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                }),
                ..Default::default()
            })
            .collect();
        parts.push(Part {
            text: Some(prompt.to_string()),
            ..Default::default()
        });

        let request = GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        };

        let resp = self
            .client
            .post(self.model_url(model, "generateContent"))
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;
        let response: GenerateContentResponse = Self::check_status(resp).await?.json().await?;

        let parts = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default();
        debug!(model, parts = parts.len(), "Received generateContent response");

        let mut text = String::new();
        for part in parts {
            if let Some(inline) = part.inline_data {
                let bytes = base64::engine::general_purpose::STANDARD.decode(inline.data)?;
                return Ok(GeneratedImage {
                    mime_type: inline.mime_type,
                    bytes,
                    model: model.to_string(),
                });
            }
            if let Some(t) = part.text {
                text.push_str(&t);
            }
        }

        if text.trim().is_empty() {
            Err(GenerationError::NoImage)
        } else {
            Err(GenerationError::TextOnly(text))
        }
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, GenerationError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), name);
        let resp = self
            .client
            .get(url)
            .header("x-goog-api-key", api_key)
            .send()
            .await?;
        Ok(Self::check_status(resp).await?.json().await?)
    }

    /// Poll until done or the budget runs out
    async fn wait_for_operation(&self, mut operation: Operation) -> Result<Operation, GenerationError> {
        let policy = self.config.poll;
        let started = Instant::now();
        let mut interval = policy.initial_interval;

        while !operation.done {
            let elapsed = started.elapsed();
            if elapsed + interval > policy.timeout {
                warn!(
                    operation = %operation.name,
                    elapsed_secs = elapsed.as_secs(),
                    "Video job exceeded polling budget"
                );
                return Err(GenerationError::TimedOut { elapsed });
            }

            debug!(operation = %operation.name, wait_ms = interval.as_millis() as u64, "Polling for video result");
            tokio::time::sleep(interval).await;
            operation = self.get_operation(&operation.name).await?;
            interval = policy.next_interval(interval);
        }

        Ok(operation)
    }

    /// One video job against a single model, through to the downloaded bytes
    async fn video_with_model(
        &self,
        model: &str,
        image: &InlineImage,
        prompt: &str,
    ) -> Result<GeneratedVideo, GenerationError> {
        let api_key = self.api_key()?;

        let request = PredictLongRunningRequest {
            instances: vec![VideoInstance {
                prompt: prompt.to_string(),
                image: VideoImage {
                    bytes_base64_encoded: image.data.clone(),
                    mime_type: image.mime_type.clone(),
                },
            }],
            parameters: VideoParameters { sample_count: 1 },
        };

        let resp = self
            .client
            .post(self.model_url(model, "predictLongRunning"))
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;
        let operation: Operation = Self::check_status(resp).await?.json().await?;
        info!(model, operation = %operation.name, "Video operation started");

        let operation = self.wait_for_operation(operation).await?;

        if let Some(error) = operation.error {
            return Err(GenerationError::JobFailed(
                error
                    .message
                    .unwrap_or_else(|| "Video generation failed".to_string()),
            ));
        }

        let uri = operation
            .video_uri()
            .ok_or(GenerationError::NoDownloadLink)?
            .to_string();
        debug!(model, uri = %uri, "Video generated, downloading");

        let resp = self
            .client
            .get(&uri)
            .header("x-goog-api-key", api_key)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        let mime_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("video/"))
            .unwrap_or("video/mp4")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();

        Ok(GeneratedVideo {
            mime_type,
            bytes,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl CostumeGenerator for GenAiClient {
    async fn transform_image(
        &self,
        images: &[InlineImage],
        prompt: &str,
    ) -> Result<GeneratedImage, GenerationError> {
        self.api_key()?;
        let mut last_error = GenerationError::NoModels("image");

        for model in &self.config.image_models {
            info!(model = %model, images = images.len(), "Attempting image model");
            match self.transform_with_model(model, images, prompt).await {
                Ok(image) => {
                    info!(model = %model, size = image.bytes.len(), "Image generated");
                    return Ok(image);
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Image model failed");
                    let try_next = e.try_next_model();
                    last_error = e;
                    if !try_next {
                        break;
                    }
                }
            }
        }

        Err(last_error)
    }

    async fn generate_video(
        &self,
        image: &InlineImage,
        prompt: &str,
    ) -> Result<GeneratedVideo, GenerationError> {
        self.api_key()?;
        let mut last_error = GenerationError::NoModels("video");

        for model in &self.config.video_models {
            info!(model = %model, "Attempting video model");
            match self.video_with_model(model, image, prompt).await {
                Ok(video) => {
                    info!(model = %model, size = video.bytes.len(), "Video downloaded");
                    return Ok(video);
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Video model failed");
                    let try_next = e.try_next_model();
                    last_error = e;
                    if !try_next {
                        break;
                    }
                }
            }
        }

        Err(last_error)
    }
}
