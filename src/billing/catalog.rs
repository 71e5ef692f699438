//! Static tier and pricing tables
//!
//! $1 = 250 tokens. Every billable action is priced in tokens.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::types::{Action, Tier};

/// Tokens per dollar
pub const TOKEN_RATE: u64 = 250;

/// Token allowance and pricing for a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierTokens {
    /// Tokens granted per period (or once, for lifetime tiers)
    pub allotment: u64,
    /// Lifetime allowance that never resets
    pub is_lifetime: bool,
    pub name: &'static str,
    /// Monthly price in cents
    pub price_cents: u32,
    /// Dollar value of the allotment in cents
    pub value_cents: u32,
}

impl TierTokens {
    /// Get the allowance for a given tier
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            // 3 images, no videos
            Tier::Free => Self {
                allotment: 300,
                is_lifetime: true,
                name: "Free",
                price_cents: 0,
                value_cents: 120,
            },
            Tier::Basic => Self {
                allotment: 1250,
                is_lifetime: false,
                name: "Basic",
                price_cents: 499,
                value_cents: 500,
            },
            Tier::Pro => Self {
                allotment: 3750,
                is_lifetime: false,
                name: "Pro",
                price_cents: 1499,
                value_cents: 1500,
            },
            Tier::Magic => Self {
                allotment: 7500,
                is_lifetime: false,
                name: "Magic",
                price_cents: 2999,
                value_cents: 3000,
            },
        }
    }
}

impl Action {
    /// Token cost of one action
    pub fn cost(&self) -> u64 {
        match self {
            Self::Image => 100,
            // 3-second clip
            Self::Video => 1000,
        }
    }
}

/// One-time token packs, credited as bonus tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPack {
    Small,
    Medium,
    Large,
}

impl TokenPack {
    pub const ALL: [TokenPack; 3] = [TokenPack::Small, TokenPack::Medium, TokenPack::Large];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    pub fn tokens(&self) -> u64 {
        match self {
            Self::Small => 750,
            Self::Medium => 2000,
            Self::Large => 4000,
        }
    }

    pub fn price_cents(&self) -> u32 {
        match self {
            Self::Small => 299,
            Self::Medium => 799,
            Self::Large => 1499,
        }
    }

    pub fn savings(&self) -> &'static str {
        match self {
            Self::Small | Self::Medium => "0%",
            Self::Large => "6%",
        }
    }

    /// Look up a pack by the number of tokens it grants
    pub fn from_tokens(tokens: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.tokens() == tokens)
    }
}

impl FromStr for TokenPack {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(pack) = Self::ALL.into_iter().find(|p| p.id().eq_ignore_ascii_case(s)) {
            return Ok(pack);
        }
        s.parse::<u64>()
            .ok()
            .and_then(Self::from_tokens)
            .ok_or_else(|| format!("Unknown token pack: {}", s))
    }
}

pub fn tokens_to_dollars(tokens: u64) -> f64 {
    tokens as f64 / TOKEN_RATE as f64
}

pub fn dollars_to_tokens(dollars: f64) -> u64 {
    if dollars <= 0.0 {
        return 0;
    }
    (dollars * TOKEN_RATE as f64).floor() as u64
}

pub fn tokens_needed(images: u64, videos: u64) -> u64 {
    images * Action::Image.cost() + videos * Action::Video.cost()
}

/// How many times `action` fits into `tokens`
pub fn max_actions(tokens: u64, action: Action) -> u64 {
    tokens / action.cost()
}

/// "1 token", "750 tokens", "1.5k tokens", "12k tokens"
pub fn format_tokens_display(tokens: u64) -> String {
    if tokens == 1 {
        return "1 token".to_string();
    }
    if tokens < 1000 {
        return format!("{} tokens", tokens);
    }
    if tokens < 10_000 {
        // Round half up to one decimal
        let tenths = (tokens + 50) / 100;
        return format!("{}.{}k tokens", tenths / 10, tenths % 10);
    }
    format!("{}k tokens", (tokens + 500) / 1000)
}

fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// What a token balance buys, e.g. "Up to 12 images OR 1 video"
pub fn tokens_breakdown(tokens: u64) -> String {
    let images = max_actions(tokens, Action::Image);
    let videos = max_actions(tokens, Action::Video);

    if videos == 0 {
        return plural(images, "image");
    }
    if images == 0 {
        return plural(videos, "video");
    }
    format!("Up to {} images OR {}", images, plural(videos, "video"))
}

pub fn token_value_display(tokens: u64) -> String {
    format!("${:.2} value", tokens_to_dollars(tokens))
}
