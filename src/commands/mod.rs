//! User-facing command handlers
//!
//! Every handler returns `Result<String, String>`: the text to print on
//! success, or a message fit to show the user on failure. Raw errors are
//! logged before they are turned into those messages.

pub mod auth;
pub mod checkout;
pub mod cli;
pub mod gallery;
pub mod generate;
pub mod usage;

use std::sync::Arc;
use tracing::warn;

use crate::ai::GenAiClient;
use crate::backend::{BackendError, Session, SupabaseClient};
use crate::billing::{Clock, SqliteStore, SystemClock, UsageLedger, UsageStore};
use crate::config::AppConfig;
use crate::payment::PaymentReturn;
use cli::Command;

/// Store key holding the signed-in session
pub const SESSION_KEY: &str = "auth_session";

/// Shared state handed to every command
pub struct AppState {
    pub config: AppConfig,
    pub ledger: UsageLedger,
    store: Arc<dyn UsageStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn UsageStore>, clock: Arc<dyn Clock>) -> Self {
        let ledger = UsageLedger::new(store.clone(), clock);
        Self {
            config,
            ledger,
            store,
        }
    }

    /// Open the on-disk store under the configured data directory
    pub fn open(config: AppConfig) -> Result<Self, String> {
        let store = SqliteStore::open(&config.data_dir)
            .map_err(|e| format!("Failed to open local state: {}", e))?;
        Ok(Self::new(config, Arc::new(store), Arc::new(SystemClock)))
    }

    pub fn session(&self) -> Option<Session> {
        let raw = match self.store.get(SESSION_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read session");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .inspect_err(|e| warn!(error = %e, "Stored session is corrupt, ignoring"))
            .ok()
    }

    pub fn save_session(&self, session: &Session) -> Result<(), String> {
        let json = serde_json::to_string(session).map_err(|e| e.to_string())?;
        self.store
            .set(SESSION_KEY, &json)
            .map_err(|e| format!("Failed to save session: {}", e))
    }

    pub fn clear_session(&self) -> Result<(), String> {
        self.store
            .remove(SESSION_KEY)
            .map_err(|e| format!("Failed to clear session: {}", e))
    }

    /// Backend handle, acting as the signed-in user when there is one
    pub fn backend(&self) -> Result<SupabaseClient, BackendError> {
        let client = SupabaseClient::new(&self.config.backend)?;
        Ok(match self.session() {
            Some(session) => client.with_access_token(session.access_token),
            None => client,
        })
    }

    pub fn generator(&self) -> GenAiClient {
        GenAiClient::new(self.config.genai.clone())
    }
}

/// Log the raw error and hand back the themed message
pub(crate) fn backend_failure(context: &str, e: BackendError) -> String {
    warn!(error = %e, "{} failed", context);
    e.user_message().to_string()
}

pub async fn dispatch(state: &AppState, command: Command) -> Result<String, String> {
    match command {
        Command::Usage { json } => usage::show_usage(&state.ledger, json),
        Command::Tier { tier } => usage::select_tier(&state.ledger, tier),
        Command::Reset => usage::reset_usage(&state.ledger),
        Command::Presets => Ok(usage::list_presets()),
        Command::Transform(args) => {
            generate::transform(&state.ledger, &state.generator(), args).await
        }
        Command::Video(args) => generate::video(&state.ledger, &state.generator(), args).await,
        Command::Checkout { item } => checkout::checkout_link(&state.config.checkout, &item),
        Command::Redeem { url } => {
            let message = checkout::redeem(&state.ledger, &url)?;
            if let Ok(Some(PaymentReturn::TierPurchased { tier })) = PaymentReturn::parse(&url) {
                auth::push_tier(state, tier).await;
            }
            Ok(message)
        }
        Command::Gallery(cmd) => gallery::run(state, cmd).await,
        Command::Auth(cmd) => auth::run(state, cmd).await,
    }
}
