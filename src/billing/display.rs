//! Derived views over a usage record

use chrono::{DateTime, Utc};

use super::catalog::{max_actions, tokens_breakdown, TierTokens};
use super::clock::days_until_reset;
use super::types::{Action, UsageRecord, UsageSnapshot};

/// Regular allotment left in the current period
pub fn regular_remaining(record: &UsageRecord) -> u64 {
    TierTokens::for_tier(record.tier)
        .allotment
        .saturating_sub(record.tokens_used)
}

/// Regular allotment left plus bonus tokens
pub fn remaining_tokens(record: &UsageRecord) -> u64 {
    regular_remaining(record).saturating_add(record.bonus_tokens)
}

pub fn remaining_actions(record: &UsageRecord, action: Action) -> u64 {
    max_actions(remaining_tokens(record), action)
}

/// Share of the regular allotment consumed, 0..=100
pub fn usage_percentage(record: &UsageRecord) -> f64 {
    let allotment = TierTokens::for_tier(record.tier).allotment;
    if allotment == 0 {
        return 0.0;
    }
    (record.tokens_used as f64 / allotment as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn snapshot(record: &UsageRecord, now: DateTime<Utc>) -> UsageSnapshot {
    let info = TierTokens::for_tier(record.tier);
    UsageSnapshot {
        tier: record.tier,
        tier_name: info.name.to_string(),
        allotment: info.allotment,
        is_lifetime: info.is_lifetime,
        tokens_used: record.tokens_used,
        bonus_tokens: record.bonus_tokens,
        remaining_tokens: remaining_tokens(record),
        remaining_images: remaining_actions(record, Action::Image),
        remaining_videos: remaining_actions(record, Action::Video),
        usage_percentage: usage_percentage(record),
        days_until_reset: (!info.is_lifetime).then(|| days_until_reset(now)),
    }
}

/// One-line human summary, e.g.
/// "200/1250 tokens used + 50 bonus tokens (Up to 11 images OR 1 video left)"
pub fn summary(record: &UsageRecord) -> String {
    let info = TierTokens::for_tier(record.tier);
    let period = if info.is_lifetime { " lifetime" } else { "" };

    let bonus = if record.bonus_tokens > 0 {
        format!(" + {} bonus tokens", record.bonus_tokens)
    } else {
        String::new()
    };

    format!(
        "{}/{}{} tokens used{} ({} left)",
        record.tokens_used,
        info.allotment,
        period,
        bonus,
        tokens_breakdown(remaining_tokens(record))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::types::Tier;
    use chrono::TimeZone;

    fn record(tier: Tier, used: u64, bonus: u64) -> UsageRecord {
        UsageRecord {
            tokens_used: used,
            bonus_tokens: bonus,
            last_reset_date: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
            tier,
        }
    }

    #[test]
    fn test_remaining_includes_bonus() {
        let r = record(Tier::Basic, 1200, 500);
        assert_eq!(regular_remaining(&r), 50);
        assert_eq!(remaining_tokens(&r), 550);
        assert_eq!(remaining_actions(&r, Action::Image), 5);
        assert_eq!(remaining_actions(&r, Action::Video), 0);
    }

    #[test]
    fn test_remaining_saturates_when_over_allotment() {
        let r = record(Tier::Free, 450, 0);
        assert_eq!(remaining_tokens(&r), 0);
    }

    #[test]
    fn test_usage_percentage_clamped() {
        assert_eq!(usage_percentage(&record(Tier::Pro, 0, 0)), 0.0);
        assert!((usage_percentage(&record(Tier::Pro, 1875, 0)) - 50.0).abs() < 1e-9);
        assert_eq!(usage_percentage(&record(Tier::Free, 900, 0)), 100.0);
    }

    #[test]
    fn test_snapshot_lifetime_has_no_reset() {
        let now = Utc.with_ymd_and_hms(2025, 10, 19, 12, 0, 0).unwrap();

        let free = snapshot(&record(Tier::Free, 100, 0), now);
        assert!(free.is_lifetime);
        assert_eq!(free.days_until_reset, None);
        assert_eq!(free.remaining_images, 2);

        let magic = snapshot(&record(Tier::Magic, 1000, 0), now);
        assert_eq!(magic.days_until_reset, Some(13));
        assert_eq!(magic.remaining_videos, 6);
        assert_eq!(magic.tier_name, "Magic");
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            summary(&record(Tier::Basic, 200, 50)),
            "200/1250 tokens used + 50 bonus tokens (Up to 11 images OR 1 video left)"
        );
        assert_eq!(
            summary(&record(Tier::Free, 300, 0)),
            "300/300 lifetime tokens used (0 images left)"
        );
    }
}
