//! Hosted auth: email/password, OAuth, and the tier kept in user metadata

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::{BackendError, SupabaseClient};
use crate::billing::Tier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    pub fn display_name(&self) -> Option<&str> {
        self.user_metadata.get("name").and_then(|v| v.as_str())
    }

    /// Tier stored on the account, if any
    pub fn tier(&self) -> Option<Tier> {
        self.user_metadata
            .get("subscription_tier")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: AuthUser,
}

/// Result of a sign-up: a live session when the project auto-confirms,
/// otherwise a user waiting on the confirmation email
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationSent(AuthUser),
}

/// Default display name: the local part of the email
fn default_name(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

pub struct AuthClient {
    rest: SupabaseClient,
}

impl AuthClient {
    pub fn new(rest: SupabaseClient) -> Self {
        Self { rest }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<SignUpOutcome, BackendError> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "name": name.unwrap_or_else(|| default_name(email)) },
        });
        let value: serde_json::Value = SupabaseClient::send_json(
            self.rest.request(Method::POST, "/auth/v1/signup").json(&body),
        )
        .await?;

        let outcome = if value.get("access_token").is_some() {
            SignUpOutcome::SignedIn(decode(value)?)
        } else {
            // Unconfirmed sign-ups return the bare user (or `{ user }`)
            let user = value.get("user").cloned().unwrap_or(value);
            SignUpOutcome::ConfirmationSent(decode(user)?)
        };
        info!(email, "Signed up");
        Ok(outcome)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let session: Session = SupabaseClient::send_json(
            self.rest
                .request(Method::POST, "/auth/v1/token")
                .query(&[("grant_type", "password")])
                .json(&json!({ "email": email, "password": password })),
        )
        .await?;
        info!(user = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Browser URL that starts an OAuth sign-in with `provider`
    pub fn oauth_url(&self, provider: &str, redirect_to: &str) -> Result<String, String> {
        let url = Url::parse_with_params(
            &format!("{}/auth/v1/authorize", self.rest.base_url()),
            &[("provider", provider), ("redirect_to", redirect_to)],
        )
        .map_err(|e| format!("Invalid backend URL: {}", e))?;
        Ok(url.into())
    }

    fn authed(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, BackendError> {
        if self.rest.access_token().is_none() {
            return Err(BackendError::NotSignedIn);
        }
        Ok(self.rest.request(method, path))
    }

    pub async fn get_user(&self) -> Result<AuthUser, BackendError> {
        SupabaseClient::send_json(self.authed(Method::GET, "/auth/v1/user")?).await
    }

    pub async fn update_tier(&self, tier: Tier) -> Result<AuthUser, BackendError> {
        let user: AuthUser = SupabaseClient::send_json(
            self.authed(Method::PUT, "/auth/v1/user")?
                .json(&json!({ "data": { "subscription_tier": tier } })),
        )
        .await?;
        info!(user = %user.id, tier = %tier, "Updated account tier");
        Ok(user)
    }

    pub async fn update_profile(&self, name: &str) -> Result<AuthUser, BackendError> {
        SupabaseClient::send_json(
            self.authed(Method::PUT, "/auth/v1/user")?
                .json(&json!({ "data": { "name": name } })),
        )
        .await
    }

    pub async fn sign_out(&self) -> Result<(), BackendError> {
        SupabaseClient::send_empty(self.authed(Method::POST, "/auth/v1/logout")?).await
    }

    pub async fn reset_password(&self, email: &str, redirect_to: &str) -> Result<(), BackendError> {
        SupabaseClient::send_empty(
            self.rest
                .request(Method::POST, "/auth/v1/recover")
                .query(&[("redirect_to", redirect_to)])
                .json(&json!({ "email": email })),
        )
        .await?;
        info!(email, "Password reset requested");
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, BackendError> {
    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "Unexpected auth response shape");
        BackendError::Api {
            status: 200,
            message: format!("Unexpected auth response: {}", e),
        }
    })
}
