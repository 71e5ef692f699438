//! Generative AI failure taxonomy

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("No {0} models configured")]
    NoModels(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Model could not generate image: {0}")]
    TextOnly(String),

    #[error("No image was generated by the model")]
    NoImage,

    #[error("Failed to decode generated media: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Video generation failed: {0}")]
    JobFailed(String),

    #[error("Video generation completed, but no download link was provided")]
    NoDownloadLink,

    #[error("Video generation timed out after {}s", .elapsed.as_secs())]
    TimedOut { elapsed: Duration },
}

impl GenerationError {
    /// Whether the next model in the fallback list is worth trying
    pub fn try_next_model(&self) -> bool {
        !matches!(self, Self::MissingApiKey | Self::TimedOut { .. })
    }

    /// Themed message safe to show the user
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingApiKey | Self::NoModels(_) => {
                "The spirits are not configured yet. The studio needs its API key before it can conjure anything."
            }
            Self::TimedOut { .. } => {
                "The séance ran too long and the spirits drifted away. Your tokens are safe, try again in a moment."
            }
            Self::TextOnly(_) | Self::NoImage => {
                "The spirits refused this costume. Try a different photo or a different costume idea."
            }
            _ => "Something spooky went wrong in the cauldron. Your tokens are safe, please try again.",
        }
    }
}
