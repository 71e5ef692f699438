//! Billing data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Subscription tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Pro,
    Magic,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Basic, Tier::Pro, Tier::Magic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Magic => "magic",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            "magic" => Ok(Self::Magic),
            other => Err(format!("Unknown tier: {}", other)),
        }
    }
}

/// A billable action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Costume transformation of a photo
    Image,
    /// Short animated clip generated from a photo
    Video,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Persisted usage state for one installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Tokens consumed in the current billing period
    pub tokens_used: u64,
    /// Purchased tokens; never expire, never reset
    #[serde(default, deserialize_with = "balance_floor_zero")]
    pub bonus_tokens: u64,
    /// Start of the billing period this record reflects
    pub last_reset_date: DateTime<Utc>,
    /// Tier the record was last computed against
    pub tier: Tier,
}

/// Older records could overdraw bonus tokens below zero; read those as empty
fn balance_floor_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Balance {
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match Balance::deserialize(deserializer)? {
        Balance::Unsigned(n) => n,
        Balance::Signed(n) => n.max(0) as u64,
    })
}

impl UsageRecord {
    /// Fresh zeroed record starting at `period_start`
    pub fn fresh(tier: Tier, period_start: DateTime<Utc>) -> Self {
        Self {
            tokens_used: 0,
            bonus_tokens: 0,
            last_reset_date: period_start,
            tier,
        }
    }
}

/// Why a consume call was refused
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "type")]
pub enum ConsumeError {
    #[error("Not enough tokens for {action}: {available} available, {cost} needed")]
    #[serde(rename = "insufficientTokens")]
    InsufficientTokens {
        action: Action,
        cost: u64,
        available: u64,
    },
}

/// Derived view over a loaded record, for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub tier: Tier,
    pub tier_name: String,
    pub allotment: u64,
    pub is_lifetime: bool,
    pub tokens_used: u64,
    pub bonus_tokens: u64,
    pub remaining_tokens: u64,
    pub remaining_images: u64,
    pub remaining_videos: u64,
    pub usage_percentage: f64,
    /// None for the lifetime tier, which never resets
    pub days_until_reset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tier_parse_and_display() {
        for tier in Tier::ALL {
            assert_eq!(tier.to_string().parse::<Tier>().unwrap(), tier);
        }
        assert_eq!(" Magic ".parse::<Tier>().unwrap(), Tier::Magic);
        assert!("platinum".parse::<Tier>().is_err());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = UsageRecord {
            tokens_used: 200,
            bonus_tokens: 50,
            last_reset_date: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
            tier: Tier::Pro,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["tokensUsed"], 200);
        assert_eq!(json["bonusTokens"], 50);
        assert_eq!(json["tier"], "pro");
        assert!(json["lastResetDate"].as_str().unwrap().starts_with("2025-10-01"));
    }

    #[test]
    fn test_record_missing_bonus_defaults_to_zero() {
        let json = r#"{"tokensUsed":100,"lastResetDate":"2025-10-01T00:00:00Z","tier":"basic"}"#;
        let record: UsageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.bonus_tokens, 0);
        assert_eq!(record.tier, Tier::Basic);
    }

    #[test]
    fn test_record_negative_bonus_reads_as_zero() {
        let json = r#"{"tokensUsed":300,"bonusTokens":-100,"lastResetDate":"2025-10-01T00:00:00Z","tier":"free"}"#;
        let record: UsageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.tokens_used, 300);
        assert_eq!(record.bonus_tokens, 0);
        assert_eq!(record.tier, Tier::Free);
    }
}
