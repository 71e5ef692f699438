//! Token ledger over the local key-value store
//!
//! One `UsageRecord` per installation, persisted as JSON under a single key.
//! Recurring tiers roll over at calendar month boundaries and on tier change;
//! the free tier is a lifetime allowance and never resets. Bonus tokens carry
//! across every rollover and tier change.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::catalog::TierTokens;
use super::clock::{period_start, Clock, SystemClock};
use super::display;
use super::store::{SqliteStore, StoreError, UsageStore};
use super::types::{Action, ConsumeError, Tier, UsageRecord, UsageSnapshot};

/// Storage key holding the serialized usage record
pub const USAGE_KEY: &str = "usage_record";
/// Storage key holding the last-selected tier
pub const TIER_KEY: &str = "user_tier";

/// Reconcile a stored record with the tier now in effect.
///
/// Pure: the same inputs always produce the same record.
pub fn resolve_record(stored: Option<UsageRecord>, tier: Tier, now: DateTime<Utc>) -> UsageRecord {
    let current_period = period_start(now);
    let info = TierTokens::for_tier(tier);

    let Some(stored) = stored else {
        return UsageRecord::fresh(tier, current_period);
    };

    if info.is_lifetime {
        if stored.tier == tier {
            return stored;
        }
        // Switching down to the lifetime tier keeps prior consumption
        return UsageRecord {
            tokens_used: stored.tokens_used.min(info.allotment),
            bonus_tokens: stored.bonus_tokens,
            last_reset_date: current_period,
            tier,
        };
    }

    if stored.tier != tier || current_period > stored.last_reset_date {
        return UsageRecord {
            tokens_used: 0,
            bonus_tokens: stored.bonus_tokens,
            last_reset_date: current_period,
            tier,
        };
    }

    stored
}

/// Deduct the cost of `action`, regular allotment first, then bonus tokens.
///
/// Refuses without touching the record when the balance can't cover it.
pub fn apply_consume(record: &UsageRecord, action: Action) -> Result<UsageRecord, ConsumeError> {
    let cost = action.cost();
    let available = display::remaining_tokens(record);
    if available < cost {
        return Err(ConsumeError::InsufficientTokens {
            action,
            cost,
            available,
        });
    }

    let allotment = TierTokens::for_tier(record.tier).allotment;
    let regular_available = display::regular_remaining(record);

    let mut next = record.clone();
    if regular_available >= cost {
        next.tokens_used += cost;
    } else {
        next.tokens_used = allotment;
        next.bonus_tokens -= cost - regular_available;
    }
    Ok(next)
}

/// Usage ledger service with injected storage and clock
#[derive(Clone)]
pub struct UsageLedger {
    store: Arc<dyn UsageStore>,
    clock: Arc<dyn Clock>,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn UsageStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Ledger over `state.db` in the platform config dir, on wall-clock time
    pub fn open_default() -> Result<Self, StoreError> {
        let store = SqliteStore::open_default()?;
        Ok(Self::new(Arc::new(store), Arc::new(SystemClock)))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Read the persisted record; unreadable or corrupt state counts as absent
    fn read_stored(&self) -> Option<UsageRecord> {
        let raw = match self.store.get(USAGE_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read usage record, starting fresh");
                return None;
            }
        };

        match serde_json::from_str::<UsageRecord>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Stored usage record is corrupt, starting fresh");
                None
            }
        }
    }

    /// Current record for `tier`, applying any rollover. Does not persist.
    pub fn load(&self, tier: Tier) -> UsageRecord {
        resolve_record(self.read_stored(), tier, self.clock.now())
    }

    /// Overwrite the persisted record
    pub fn save(&self, record: &UsageRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        self.store.set(USAGE_KEY, &json)?;
        debug!(
            tier = %record.tier,
            tokens_used = record.tokens_used,
            bonus_tokens = record.bonus_tokens,
            "Saved usage record"
        );
        Ok(())
    }

    /// Persist, logging failures. The caller keeps the in-memory record.
    fn save_or_log(&self, record: &UsageRecord) {
        if let Err(e) = self.save(record) {
            warn!(error = %e, "Failed to persist usage record; change is not durable");
        }
    }

    pub fn can_afford(&self, tier: Tier, action: Action) -> bool {
        display::remaining_tokens(&self.load(tier)) >= action.cost()
    }

    /// Charge for an action that has already succeeded
    pub fn consume(&self, tier: Tier, action: Action) -> Result<UsageRecord, ConsumeError> {
        let record = self.load(tier);
        let next = apply_consume(&record, action).inspect_err(|e| {
            warn!(tier = %tier, error = %e, "Refused to consume tokens");
        })?;

        self.save_or_log(&next);
        info!(
            tier = %tier,
            action = %action,
            tokens_used = next.tokens_used,
            bonus_tokens = next.bonus_tokens,
            "Consumed tokens"
        );
        Ok(next)
    }

    /// Credit purchased tokens. They survive every rollover and tier change.
    pub fn add_bonus_tokens(&self, tier: Tier, tokens: u64) -> UsageRecord {
        let mut record = self.load(tier);
        record.bonus_tokens = record.bonus_tokens.saturating_add(tokens);
        self.save_or_log(&record);
        info!(
            added = tokens,
            total = record.bonus_tokens,
            "Added bonus tokens"
        );
        record
    }

    /// Persist a pending rollover. Returns true if the stored record changed.
    pub fn reset_if_needed(&self, tier: Tier) -> bool {
        let stored = self.read_stored();
        let resolved = resolve_record(stored.clone(), tier, self.clock.now());
        if stored.as_ref() == Some(&resolved) {
            return false;
        }
        info!(tier = %tier, "Resetting usage for new billing period");
        self.save_or_log(&resolved);
        true
    }

    /// Forget all usage. Bonus tokens are lost too.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.store.remove(USAGE_KEY)?;
        info!("Usage record cleared");
        Ok(())
    }

    /// Last-selected tier; free if none or unrecognized
    pub fn selected_tier(&self) -> Tier {
        match self.store.get(TIER_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring stored tier");
                Tier::Free
            }),
            Ok(None) => Tier::Free,
            Err(e) => {
                warn!(error = %e, "Failed to read stored tier");
                Tier::Free
            }
        }
    }

    pub fn select_tier(&self, tier: Tier) -> Result<(), StoreError> {
        self.store.set(TIER_KEY, tier.as_str())?;
        info!(tier = %tier, "Tier selected");
        Ok(())
    }

    pub fn snapshot(&self, tier: Tier) -> UsageSnapshot {
        display::snapshot(&self.load(tier), self.clock.now())
    }

    pub fn summary(&self, tier: Tier) -> String {
        display::summary(&self.load(tier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::clock::FixedClock;
    use crate::billing::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn ledger_at(now: DateTime<Utc>) -> (UsageLedger, Arc<MemoryStore>, Arc<FixedClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(now));
        let ledger = UsageLedger::new(store.clone(), clock.clone());
        (ledger, store, clock)
    }

    fn store_record(store: &MemoryStore, record: &UsageRecord) {
        store
            .set(USAGE_KEY, &serde_json::to_string(record).unwrap())
            .unwrap();
    }

    /// Only consume after a passing affordability check
    fn checked_consume(ledger: &UsageLedger, tier: Tier, action: Action) -> UsageRecord {
        assert!(ledger.can_afford(tier, action));
        ledger.consume(tier, action).unwrap()
    }

    #[test]
    fn test_load_fresh_when_absent() {
        let (ledger, _, _) = ledger_at(at(2025, 10, 19));
        let record = ledger.load(Tier::Basic);
        assert_eq!(record.tokens_used, 0);
        assert_eq!(record.bonus_tokens, 0);
        assert_eq!(record.tier, Tier::Basic);
        assert_eq!(
            record.last_reset_date,
            Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_corrupt_state_falls_back_to_fresh() {
        let (ledger, store, _) = ledger_at(at(2025, 10, 19));
        store.set(USAGE_KEY, "{not json").unwrap();

        let record = ledger.load(Tier::Pro);
        assert_eq!(record, UsageRecord::fresh(Tier::Pro, period_start(ledger.now())));

        // And consumption still works on top of it
        checked_consume(&ledger, Tier::Pro, Action::Image);
        assert_eq!(ledger.load(Tier::Pro).tokens_used, 100);
    }

    #[test]
    fn test_load_is_idempotent() {
        let (ledger, store, _) = ledger_at(at(2025, 10, 19));
        store_record(
            &store,
            &UsageRecord {
                tokens_used: 400,
                bonus_tokens: 30,
                last_reset_date: Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap(),
                tier: Tier::Pro,
            },
        );

        let first = ledger.load(Tier::Pro);
        let second = ledger.load(Tier::Pro);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_consume_deducts_exact_cost() {
        let (ledger, _, _) = ledger_at(at(2025, 10, 19));

        for tier in Tier::ALL {
            ledger.reset().unwrap();
            ledger.add_bonus_tokens(tier, 750);
            for action in [Action::Image, Action::Video] {
                if !ledger.can_afford(tier, action) {
                    continue;
                }
                let before = display::remaining_tokens(&ledger.load(tier));
                let after = ledger.consume(tier, action).unwrap();
                assert_eq!(display::remaining_tokens(&after), before - action.cost());
                assert_eq!(
                    display::remaining_tokens(&ledger.load(tier)),
                    before - action.cost()
                );
            }
        }
    }

    #[test]
    fn test_can_afford_boundary() {
        let (ledger, store, _) = ledger_at(at(2025, 10, 19));
        let period = period_start(ledger.now());

        // available == cost - 1
        store_record(
            &store,
            &UsageRecord {
                tokens_used: 1250 - 99,
                bonus_tokens: 0,
                last_reset_date: period,
                tier: Tier::Basic,
            },
        );
        assert!(!ledger.can_afford(Tier::Basic, Action::Image));

        // available == cost
        store_record(
            &store,
            &UsageRecord {
                tokens_used: 1250 - 100,
                bonus_tokens: 0,
                last_reset_date: period,
                tier: Tier::Basic,
            },
        );
        assert!(ledger.can_afford(Tier::Basic, Action::Image));

        // Split across regular and bonus
        store_record(
            &store,
            &UsageRecord {
                tokens_used: 1250 - 40,
                bonus_tokens: 60,
                last_reset_date: period,
                tier: Tier::Basic,
            },
        );
        assert!(ledger.can_afford(Tier::Basic, Action::Image));
    }

    #[test]
    fn test_consume_refused_without_funds() {
        let (ledger, store, _) = ledger_at(at(2025, 10, 19));
        let record = UsageRecord {
            tokens_used: 300,
            bonus_tokens: 50,
            last_reset_date: period_start(ledger.now()),
            tier: Tier::Free,
        };
        store_record(&store, &record);

        assert!(!ledger.can_afford(Tier::Free, Action::Image));
        let err = ledger.consume(Tier::Free, Action::Image).unwrap_err();
        assert_eq!(
            err,
            ConsumeError::InsufficientTokens {
                action: Action::Image,
                cost: 100,
                available: 50,
            }
        );
        // Nothing was written
        assert_eq!(ledger.load(Tier::Free), record);
    }

    #[test]
    fn test_basic_tier_twelve_images() {
        let (ledger, _, _) = ledger_at(at(2025, 10, 19));
        for _ in 0..12 {
            checked_consume(&ledger, Tier::Basic, Action::Image);
        }

        let record = ledger.load(Tier::Basic);
        assert_eq!(display::remaining_tokens(&record), 50);
        assert!(!ledger.can_afford(Tier::Basic, Action::Image));
        assert!(!ledger.can_afford(Tier::Basic, Action::Video));
    }

    #[test]
    fn test_magic_tier_spills_into_bonus() {
        let (ledger, _, _) = ledger_at(at(2025, 10, 19));
        ledger.add_bonus_tokens(Tier::Magic, 500);

        for _ in 0..7 {
            checked_consume(&ledger, Tier::Magic, Action::Video);
        }
        for _ in 0..5 {
            checked_consume(&ledger, Tier::Magic, Action::Image);
        }

        let record = ledger.load(Tier::Magic);
        assert_eq!(record.tokens_used, 7500);
        assert_eq!(record.bonus_tokens, 500);

        let record = checked_consume(&ledger, Tier::Magic, Action::Image);
        assert_eq!(record.tokens_used, 7500);
        assert_eq!(record.bonus_tokens, 400);
    }

    #[test]
    fn test_partial_spill_caps_regular_usage() {
        let record = UsageRecord {
            tokens_used: 7450,
            bonus_tokens: 500,
            last_reset_date: at(2025, 10, 1),
            tier: Tier::Magic,
        };
        let next = apply_consume(&record, Action::Image).unwrap();
        assert_eq!(next.tokens_used, 7500);
        assert_eq!(next.bonus_tokens, 450);
    }

    #[test]
    fn test_free_tier_never_resets() {
        let (ledger, _, clock) = ledger_at(at(2025, 10, 19));
        for _ in 0..3 {
            checked_consume(&ledger, Tier::Free, Action::Image);
        }

        for _ in 0..14 {
            clock.advance(Duration::days(31));
            let record = ledger.load(Tier::Free);
            assert_eq!(record.tokens_used, 300);
            assert_eq!(display::remaining_tokens(&record), 0);
            assert!(!ledger.reset_if_needed(Tier::Free));
        }
    }

    #[test]
    fn test_recurring_tier_rolls_over_and_keeps_bonus() {
        let (ledger, store, _) = ledger_at(at(2025, 10, 19));
        store_record(
            &store,
            &UsageRecord {
                tokens_used: 3000,
                bonus_tokens: 120,
                last_reset_date: Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap(),
                tier: Tier::Pro,
            },
        );

        let record = ledger.load(Tier::Pro);
        assert_eq!(record.tokens_used, 0);
        assert_eq!(record.bonus_tokens, 120);
        assert_eq!(record.last_reset_date, period_start(ledger.now()));
    }

    #[test]
    fn test_no_rollover_within_period() {
        let (ledger, _, clock) = ledger_at(at(2025, 10, 2));
        checked_consume(&ledger, Tier::Pro, Action::Video);
        clock.set(at(2025, 10, 31));
        assert_eq!(ledger.load(Tier::Pro).tokens_used, 1000);

        clock.set(at(2025, 11, 1));
        assert_eq!(ledger.load(Tier::Pro).tokens_used, 0);
    }

    #[test]
    fn test_switch_pro_to_basic_resets_usage() {
        let (ledger, _, _) = ledger_at(at(2025, 10, 19));
        ledger.add_bonus_tokens(Tier::Pro, 200);
        checked_consume(&ledger, Tier::Pro, Action::Video);
        checked_consume(&ledger, Tier::Pro, Action::Video);
        assert_eq!(ledger.load(Tier::Pro).tokens_used, 2000);

        let record = ledger.load(Tier::Basic);
        assert_eq!(record.tokens_used, 0);
        assert_eq!(record.bonus_tokens, 200);
        assert_eq!(record.tier, Tier::Basic);
    }

    #[test]
    fn test_switch_to_free_keeps_consumption() {
        let (ledger, _, _) = ledger_at(at(2025, 10, 19));
        ledger.add_bonus_tokens(Tier::Pro, 750);
        checked_consume(&ledger, Tier::Pro, Action::Image);
        checked_consume(&ledger, Tier::Pro, Action::Image);

        let record = ledger.load(Tier::Free);
        assert_eq!(record.tokens_used, 200);
        assert_eq!(record.bonus_tokens, 750);
        assert_eq!(record.tier, Tier::Free);

        // More than the lifetime allowance is clamped, never forgiven
        checked_consume(&ledger, Tier::Pro, Action::Video);
        let record = ledger.load(Tier::Free);
        assert_eq!(record.tokens_used, 300);
        assert_eq!(record.bonus_tokens, 750);
        assert_eq!(display::remaining_tokens(&record), 750);
    }

    #[test]
    fn test_huge_stored_bonus_saturates() {
        let (ledger, store, _) = ledger_at(at(2025, 10, 19));
        store_record(
            &store,
            &UsageRecord {
                tokens_used: 0,
                bonus_tokens: u64::MAX,
                last_reset_date: period_start(ledger.now()),
                tier: Tier::Basic,
            },
        );

        assert!(ledger.can_afford(Tier::Basic, Action::Image));
        assert_eq!(display::remaining_tokens(&ledger.load(Tier::Basic)), u64::MAX);

        let record = ledger.add_bonus_tokens(Tier::Basic, 750);
        assert_eq!(record.bonus_tokens, u64::MAX);

        let record = checked_consume(&ledger, Tier::Basic, Action::Video);
        assert_eq!(record.tokens_used, 1000);
        assert_eq!(record.bonus_tokens, u64::MAX);
    }

    #[test]
    fn test_overdrawn_bonus_keeps_lifetime_usage() {
        let (ledger, store, _) = ledger_at(at(2025, 10, 19));
        store
            .set(
                USAGE_KEY,
                r#"{"tokensUsed":300,"bonusTokens":-100,"lastResetDate":"2025-10-01T00:00:00Z","tier":"free"}"#,
            )
            .unwrap();

        let record = ledger.load(Tier::Free);
        assert_eq!(record.tokens_used, 300);
        assert_eq!(record.bonus_tokens, 0);
        assert!(!ledger.can_afford(Tier::Free, Action::Image));
    }

    #[test]
    fn test_reset_if_needed_persists_rollover() {
        let (ledger, store, clock) = ledger_at(at(2025, 10, 19));
        checked_consume(&ledger, Tier::Basic, Action::Image);
        assert!(!ledger.reset_if_needed(Tier::Basic));

        clock.set(at(2025, 11, 3));
        assert!(ledger.reset_if_needed(Tier::Basic));

        let raw = store.get(USAGE_KEY).unwrap().unwrap();
        let stored: UsageRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.tokens_used, 0);
        assert_eq!(stored.last_reset_date, period_start(at(2025, 11, 3)));
    }

    #[test]
    fn test_manual_reset_clears_record() {
        let (ledger, _, _) = ledger_at(at(2025, 10, 19));
        ledger.add_bonus_tokens(Tier::Basic, 750);
        checked_consume(&ledger, Tier::Basic, Action::Image);

        ledger.reset().unwrap();
        let record = ledger.load(Tier::Basic);
        assert_eq!(record.tokens_used, 0);
        assert_eq!(record.bonus_tokens, 0);
    }

    #[test]
    fn test_selected_tier_round_trip() {
        let (ledger, store, _) = ledger_at(at(2025, 10, 19));
        assert_eq!(ledger.selected_tier(), Tier::Free);

        ledger.select_tier(Tier::Magic).unwrap();
        assert_eq!(ledger.selected_tier(), Tier::Magic);

        store.set(TIER_KEY, "platinum").unwrap();
        assert_eq!(ledger.selected_tier(), Tier::Free);
    }

    #[test]
    fn test_snapshot_and_summary() {
        let (ledger, _, _) = ledger_at(at(2025, 10, 19));
        checked_consume(&ledger, Tier::Basic, Action::Image);

        let snapshot = ledger.snapshot(Tier::Basic);
        assert_eq!(snapshot.remaining_tokens, 1150);
        assert_eq!(snapshot.remaining_images, 11);
        assert_eq!(snapshot.days_until_reset, Some(13));
        assert_eq!(
            ledger.summary(Tier::Basic),
            "100/1250 tokens used (Up to 11 images OR 1 video left)"
        );
    }
}
