//! Account commands; the session lives in the local store

use tracing::{info, warn};

use super::cli::AuthCommand;
use super::{backend_failure, AppState};
use crate::backend::{AuthClient, SignUpOutcome};
use crate::billing::Tier;

/// Keep the local tier in step with the one on the account
fn sync_tier(state: &AppState, account_tier: Option<Tier>) {
    let Some(tier) = account_tier else {
        return;
    };
    if state.ledger.selected_tier() != tier {
        if let Err(e) = state.ledger.select_tier(tier) {
            warn!(error = %e, "Failed to apply account tier locally");
        }
    }
}

/// Record a purchased tier on the account so other devices pick it up.
/// Best-effort: the local ledger already has it.
pub async fn push_tier(state: &AppState, tier: Tier) {
    if state.session().is_none() {
        return;
    }
    let result = match state.backend() {
        Ok(rest) => AuthClient::new(rest).update_tier(tier).await.map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(error = %e, tier = %tier, "Failed to save tier to account");
    }
}

pub async fn run(state: &AppState, command: AuthCommand) -> Result<String, String> {
    let rest = state
        .backend()
        .map_err(|e| backend_failure("Backend setup", e))?;
    let auth = AuthClient::new(rest);

    match command {
        AuthCommand::SignUp {
            email,
            password,
            name,
        } => {
            let outcome = auth
                .sign_up(&email, &password, name.as_deref())
                .await
                .map_err(|e| backend_failure("Sign up", e))?;
            match outcome {
                SignUpOutcome::SignedIn(session) => {
                    state.save_session(&session)?;
                    Ok(format!("Welcome, {}! You're signed in.", email))
                }
                SignUpOutcome::ConfirmationSent(_) => Ok(format!(
                    "Check {} for a confirmation link, then sign in.",
                    email
                )),
            }
        }

        AuthCommand::SignIn { email, password } => {
            let session = auth
                .sign_in(&email, &password)
                .await
                .map_err(|e| backend_failure("Sign in", e))?;
            state.save_session(&session)?;
            sync_tier(state, session.user.tier());
            Ok(format!(
                "Signed in as {}",
                session.user.display_name().unwrap_or(&email)
            ))
        }

        AuthCommand::Google { redirect_to } => auth.oauth_url("google", &redirect_to),

        AuthCommand::Whoami => {
            if state.session().is_none() {
                return Ok("Not signed in.".to_string());
            }
            let user = auth
                .get_user()
                .await
                .map_err(|e| backend_failure("Get user", e))?;
            sync_tier(state, user.tier());
            Ok(format!(
                "{} ({}), {} plan",
                user.display_name().unwrap_or("ghoul"),
                user.email.as_deref().unwrap_or("no email"),
                state.ledger.selected_tier()
            ))
        }

        AuthCommand::SignOut => {
            if state.session().is_some() {
                // Local sign-out still happens if the server call fails
                if let Err(e) = auth.sign_out().await {
                    warn!(error = %e, "Server sign-out failed");
                }
            }
            state.clear_session()?;
            info!("Signed out");
            Ok("Signed out.".to_string())
        }

        AuthCommand::ResetPassword { email, redirect_to } => {
            auth.reset_password(&email, &redirect_to)
                .await
                .map_err(|e| backend_failure("Password reset", e))?;
            Ok(format!("If {} has an account, a reset link is on its way.", email))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendConfig;
    use crate::billing::{FixedClock, MemoryStore};
    use crate::config::AppConfig;
    use chrono::{TimeZone, Utc};
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;
    use std::sync::Arc;

    fn state(server: &MockServer) -> AppState {
        let mut config = AppConfig::from_lookup(|name| {
            (name == "COSTUME_STUDIO_DATA_DIR").then(|| "/tmp/costume-studio-test".to_string())
        })
        .unwrap();
        config.backend = BackendConfig {
            url: Some(server.base_url()),
            anon_key: Some("anon".to_string()),
        };
        let now = Utc.with_ymd_and_hms(2025, 10, 19, 12, 0, 0).unwrap();
        AppState::new(config, Arc::new(MemoryStore::new()), Arc::new(FixedClock::new(now)))
    }

    #[tokio::test]
    async fn test_sign_in_saves_session_and_syncs_tier() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/token");
                then.status(200).json_body(json!({
                    "access_token": "jwt-9",
                    "user": {
                        "id": "user-9",
                        "email": "ghoul@example.com",
                        "user_metadata": { "subscription_tier": "magic" }
                    }
                }));
            })
            .await;
        let state = state(&server);

        let out = run(
            &state,
            AuthCommand::SignIn {
                email: "ghoul@example.com".to_string(),
                password: "boo".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(out, "Signed in as ghoul@example.com");
        assert_eq!(state.session().unwrap().access_token, "jwt-9");
        assert_eq!(state.ledger.selected_tier(), Tier::Magic);
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_even_if_server_fails() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/logout");
                then.status(500);
            })
            .await;
        let state = state(&server);
        state
            .save_session(
                &serde_json::from_value(json!({
                    "access_token": "jwt-9",
                    "user": { "id": "user-9" }
                }))
                .unwrap(),
            )
            .unwrap();

        run(&state, AuthCommand::SignOut).await.unwrap();
        assert!(state.session().is_none());
    }

    #[tokio::test]
    async fn test_whoami_without_session() {
        let server = MockServer::start_async().await;
        let state = state(&server);
        assert_eq!(run(&state, AuthCommand::Whoami).await.unwrap(), "Not signed in.");
    }
}
