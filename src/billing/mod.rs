//! Billing module for tiers, tokens and usage accounting
//!
//! This module handles:
//! - Tier catalog (token allotments, action costs, token packs)
//! - The usage ledger with monthly rollover and lifetime semantics
//! - Affordability checks before, and consumption after, billable actions
//! - Derived display metrics

mod catalog;
mod clock;
mod display;
mod store;
mod types;
mod usage;

pub use catalog::{
    dollars_to_tokens, format_tokens_display, max_actions, token_value_display, tokens_breakdown,
    tokens_needed, tokens_to_dollars, TierTokens, TokenPack, TOKEN_RATE,
};
pub use clock::{days_until_reset, next_period_start, period_start, Clock, FixedClock, SystemClock};
pub use display::{remaining_actions, remaining_tokens, snapshot, summary, usage_percentage};
pub use store::{default_data_dir, MemoryStore, SqliteStore, StoreError, UsageStore};
pub use types::{Action, ConsumeError, Tier, UsageRecord, UsageSnapshot};
pub use usage::{apply_consume, resolve_record, UsageLedger, TIER_KEY, USAGE_KEY};
