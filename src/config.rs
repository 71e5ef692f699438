//! Environment-driven configuration
//!
//! Everything comes from the process environment (after `.env` is loaded).
//! The `VITE_`-prefixed names written by the web build are accepted as
//! fallbacks so one `.env` serves both.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::ai::{GenAiConfig, PollPolicy};
use crate::backend::BackendConfig;
use crate::billing::{default_data_dir, Tier, TokenPack};
use crate::payment::CheckoutLinks;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { name: &'static str, value: String },

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },

    #[error("Could not determine data directory; set COSTUME_STUDIO_DATA_DIR")]
    NoDataDir,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub genai: GenAiConfig,
    pub backend: BackendConfig,
    pub checkout: CheckoutLinks,
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |names: &[&str]| -> Option<String> {
            names
                .iter()
                .find_map(|&n| lookup(n))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut genai = GenAiConfig {
            api_key: get(&["GEMINI_API_KEY", "API_KEY", "VITE_GEMINI_API_KEY"]),
            ..GenAiConfig::default()
        };
        if let Some(base_url) = get(&["GEMINI_BASE_URL"]) {
            genai.base_url = base_url;
        }
        if let Some(models) = get(&["GEMINI_IMAGE_MODELS"]).map(|v| parse_model_list(&v)) {
            if !models.is_empty() {
                genai.image_models = models;
            }
        }
        if let Some(models) = get(&["GEMINI_VIDEO_MODELS"]).map(|v| parse_model_list(&v)) {
            if !models.is_empty() {
                genai.video_models = models;
            }
        }

        let defaults = PollPolicy::default();
        genai.poll = PollPolicy {
            initial_interval: seconds(
                "VIDEO_POLL_INITIAL_SECS",
                get(&["VIDEO_POLL_INITIAL_SECS"]),
                defaults.initial_interval,
            )?,
            max_interval: seconds(
                "VIDEO_POLL_MAX_SECS",
                get(&["VIDEO_POLL_MAX_SECS"]),
                defaults.max_interval,
            )?,
            multiplier: defaults.multiplier,
            timeout: seconds(
                "VIDEO_POLL_TIMEOUT_SECS",
                get(&["VIDEO_POLL_TIMEOUT_SECS"]),
                defaults.timeout,
            )?,
        };

        let backend = BackendConfig {
            url: get(&["SUPABASE_URL", "VITE_SUPABASE_URL"]),
            anon_key: get(&["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"]),
        };

        let mut checkout = CheckoutLinks::with_defaults();
        for tier in [Tier::Basic, Tier::Pro, Tier::Magic] {
            let name = format!("CHECKOUT_URL_{}", tier.as_str().to_uppercase());
            if let Some(url) = get(&[name.as_str()]) {
                checkout.set_tier(tier, url);
            }
        }
        for pack in [TokenPack::Small, TokenPack::Medium, TokenPack::Large] {
            let name = format!("CHECKOUT_URL_PACK_{}", pack.id().to_uppercase());
            if let Some(url) = get(&[name.as_str()]) {
                checkout.set_pack(pack, url);
            }
        }

        let data_dir = match get(&["COSTUME_STUDIO_DATA_DIR"]) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir().ok_or(ConfigError::NoDataDir)?,
        };

        Ok(Self {
            genai,
            backend,
            checkout,
            data_dir,
        })
    }
}

/// Comma-separated model ids, trimmed, blanks dropped
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

fn seconds(
    name: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let secs: u64 = raw
        .parse()
        .map_err(|_| ConfigError::InvalidSeconds { name, value: raw.clone() })?;
    if secs == 0 {
        return Err(ConfigError::Zero { name });
    }
    Ok(Duration::from_secs(secs))
}
