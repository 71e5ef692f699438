//! Hosted backend wrappers
//!
//! Thin request/response wrappers over the hosted backend's REST surface:
//! PostgREST tables and RPCs for the gallery, object storage for uploaded
//! media, and the auth endpoints. Nothing here caches or retries.

pub mod auth;
pub mod gallery;

pub use auth::*;
pub use gallery::*;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::ai::http_client::backend_client;

/// Connection settings for the hosted backend
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

impl BackendConfig {
    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
            && self.anon_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend is not configured (SUPABASE_URL / SUPABASE_ANON_KEY)")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Already voted")]
    AlreadyVoted,

    #[error("No user or IP provided")]
    MissingVoter,

    #[error("Not signed in")]
    NotSignedIn,
}

impl BackendError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotConfigured => {
                "The haunted gallery is closed tonight. The backend has not been configured."
            }
            Self::AlreadyVoted => "You already cast your spell on this one. One vote per ghoul!",
            Self::MissingVoter => "We couldn't tell who is voting. Sign in to cast your vote.",
            Self::NotSignedIn => "You need to sign in before entering the crypt.",
            Self::Api { status: 401 | 403, .. } => {
                "The crypt door won't open. Check your sign-in and try again."
            }
            _ => "The spirits of the gallery are restless. Please try again in a moment.",
        }
    }
}

/// Pull a readable message out of a backend error body
///
/// PostgREST answers with `message`, the auth service with `msg` or
/// `error_description`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

/// Authenticated handle on the hosted backend
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl SupabaseClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Self::with_client(backend_client().clone(), config)
    }

    pub fn with_client(http: Client, config: &BackendConfig) -> Result<Self, BackendError> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(BackendError::NotConfigured)?;
        let anon_key = config
            .anon_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(BackendError::NotConfigured)?;
        Ok(Self {
            http,
            base_url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: None,
        })
    }

    /// Act as a signed-in user instead of the anonymous role
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "Backend request");
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    pub(crate) async fn check(resp: Response) -> Result<Response, BackendError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(BackendError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let resp = Self::check(request.send().await?).await?;
        Ok(resp.json().await?)
    }

    pub(crate) async fn send_empty(request: RequestBuilder) -> Result<(), BackendError> {
        Self::check(request.send().await?).await?;
        Ok(())
    }

    /// Call a database function through `/rest/v1/rpc/<name>`
    pub(crate) fn rpc(&self, name: &str, args: serde_json::Value) -> RequestBuilder {
        self.request(Method::POST, &format!("/rest/v1/rpc/{}", name))
            .json(&args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured() {
        let err = SupabaseClient::new(&BackendConfig::default()).unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured));

        let half = BackendConfig {
            url: Some("https://x.supabase.co".to_string()),
            anon_key: Some(String::new()),
        };
        assert!(!half.is_configured());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key value"}"#),
            "duplicate key value"
        );
        assert_eq!(error_message(r#"{"msg":"Invalid login credentials"}"#), "Invalid login credentials");
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_user_messages_are_themed() {
        assert!(BackendError::AlreadyVoted.user_message().contains("One vote"));
        let err = BackendError::Api {
            status: 500,
            message: "relation \"gallery\" does not exist".to_string(),
        };
        assert!(!err.user_message().contains("relation"));
    }
}
