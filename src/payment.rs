//! Hosted checkout links and checkout return handling
//!
//! Purchases happen on the payment provider's hosted pages. On completion the
//! provider redirects back with `payment=success|canceled` plus either
//! `tier=<tier>` (subscription) or `pack=<pack>` (one-time token pack).

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::billing::{StoreError, Tier, TokenPack, UsageLedger};

/// Static checkout link per tier and per token pack
#[derive(Debug, Clone, Default)]
pub struct CheckoutLinks {
    tiers: HashMap<Tier, String>,
    packs: HashMap<TokenPack, String>,
}

impl CheckoutLinks {
    /// Hosted subscription links for the paid tiers
    pub fn with_defaults() -> Self {
        let mut links = Self::default();
        links.set_tier(Tier::Basic, "https://buy.stripe.com/28E14n4rYeqafJNbDz73G02");
        links.set_tier(Tier::Pro, "https://buy.stripe.com/9B67sL4rY3Lw0OT4b773G05");
        links.set_tier(Tier::Magic, "https://buy.stripe.com/eVqeVd8Ie3Lw2X1ePL73G06");
        links
    }

    pub fn set_tier(&mut self, tier: Tier, url: impl Into<String>) {
        self.tiers.insert(tier, url.into());
    }

    pub fn set_pack(&mut self, pack: TokenPack, url: impl Into<String>) {
        self.packs.insert(pack, url.into());
    }

    /// Free has no checkout
    pub fn tier_link(&self, tier: Tier) -> Option<&str> {
        self.tiers.get(&tier).map(String::as_str)
    }

    pub fn pack_link(&self, pack: TokenPack) -> Option<&str> {
        self.packs.get(&pack).map(String::as_str)
    }
}

/// What a checkout return URL reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "type")]
pub enum PaymentReturn {
    TierPurchased { tier: Tier },
    PackPurchased { pack: TokenPack },
    Canceled,
}

impl PaymentReturn {
    /// Parse a return URL (absolute, or just `?query`).
    ///
    /// `Ok(None)` when the URL carries no actionable payment result.
    pub fn parse(input: &str) -> Result<Option<Self>, String> {
        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(_) => Url::parse("http://localhost/")
                .and_then(|base| base.join(input))
                .map_err(|e| format!("Invalid return URL: {}", e))?,
        };

        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        match params.get("payment").map(String::as_str) {
            Some("canceled") => Ok(Some(Self::Canceled)),
            Some("success") => {
                if let Some(raw) = params.get("tier") {
                    return match raw.parse::<Tier>() {
                        Ok(tier) => Ok(Some(Self::TierPurchased { tier })),
                        Err(e) => {
                            warn!(tier = %raw, "Ignoring checkout return: {}", e);
                            Ok(None)
                        }
                    };
                }
                if let Some(raw) = params.get("pack") {
                    let pack = raw.parse::<TokenPack>()?;
                    return Ok(Some(Self::PackPurchased { pack }));
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Record the purchase in the ledger
    pub fn apply(&self, ledger: &UsageLedger) -> Result<(), StoreError> {
        match *self {
            Self::TierPurchased { tier } => {
                ledger.select_tier(tier)?;
                info!(tier = %tier, "Payment successful, tier updated");
            }
            Self::PackPurchased { pack } => {
                let tier = ledger.selected_tier();
                let record = ledger.add_bonus_tokens(tier, pack.tokens());
                info!(
                    pack = pack.id(),
                    bonus_tokens = record.bonus_tokens,
                    "Token pack purchased"
                );
            }
            Self::Canceled => info!("Checkout canceled"),
        }
        Ok(())
    }
}
