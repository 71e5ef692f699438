//! Checkout links and checkout returns

use tracing::error;

use crate::billing::{
    format_tokens_display, token_value_display, Tier, TierTokens, TokenPack, UsageLedger,
};
use crate::payment::{CheckoutLinks, PaymentReturn};

fn dollars(cents: u32) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

/// Link to the hosted checkout for a tier or token pack
pub fn checkout_link(links: &CheckoutLinks, item: &str) -> Result<String, String> {
    if let Ok(tier) = item.parse::<Tier>() {
        let info = TierTokens::for_tier(tier);
        let url = links
            .tier_link(tier)
            .ok_or_else(|| format!("{} has no checkout, it's already yours.", info.name))?;
        return Ok(format!(
            "{} plan, {}/month for {} ({})\n{}",
            info.name,
            dollars(info.price_cents),
            format_tokens_display(info.allotment),
            token_value_display(info.allotment),
            url
        ));
    }

    let pack: TokenPack = item.parse()?;
    let url = links.pack_link(pack).ok_or_else(|| {
        format!(
            "The {} pack isn't on sale yet. Check back soon!",
            pack.id()
        )
    })?;
    Ok(format!(
        "{} token pack, {} for {} (save {})\n{}",
        pack.id(),
        dollars(pack.price_cents()),
        format_tokens_display(pack.tokens()),
        pack.savings(),
        url
    ))
}

/// Apply a checkout return URL to the local ledger
pub fn redeem(ledger: &UsageLedger, url: &str) -> Result<String, String> {
    let Some(ret) = PaymentReturn::parse(url)? else {
        return Ok("No payment result in that link.".to_string());
    };

    ret.apply(ledger).map_err(|e| {
        error!(error = %e, "Failed to record purchase");
        "Your payment went through but we couldn't save it locally. Please try again.".to_string()
    })?;

    let tier = ledger.selected_tier();
    Ok(match ret {
        PaymentReturn::TierPurchased { tier } => format!(
            "Welcome to {}! {}",
            TierTokens::for_tier(tier).name,
            ledger.summary(tier)
        ),
        PaymentReturn::PackPurchased { pack } => format!(
            "Added {} bonus tokens. {}",
            pack.tokens(),
            ledger.summary(tier)
        ),
        PaymentReturn::Canceled => "Checkout canceled. No charge was made.".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{FixedClock, MemoryStore};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn ledger() -> UsageLedger {
        let now = Utc.with_ymd_and_hms(2025, 10, 19, 12, 0, 0).unwrap();
        UsageLedger::new(Arc::new(MemoryStore::new()), Arc::new(FixedClock::new(now)))
    }

    #[test]
    fn test_checkout_link_for_tier() {
        let links = CheckoutLinks::with_defaults();
        let out = checkout_link(&links, "pro").unwrap();
        assert!(out.starts_with("Pro plan, $14.99/month for 3.8k tokens ($15.00 value)"));
        assert!(out.ends_with(links.tier_link(Tier::Pro).unwrap()));
        assert!(checkout_link(&links, "free").is_err());
    }

    #[test]
    fn test_checkout_link_for_pack() {
        let mut links = CheckoutLinks::with_defaults();
        assert!(checkout_link(&links, "small").is_err());
        links.set_pack(TokenPack::Small, "https://pay.example/small");
        let out = checkout_link(&links, "750").unwrap();
        assert!(out.starts_with("small token pack, $2.99 for 750 tokens"));
        assert!(checkout_link(&links, "jumbo").is_err());
    }

    #[test]
    fn test_redeem_pack_and_tier() {
        let ledger = ledger();
        let out = redeem(&ledger, "?payment=success&tier=basic").unwrap();
        assert!(out.starts_with("Welcome to Basic!"));
        assert_eq!(ledger.selected_tier(), Tier::Basic);

        let out = redeem(&ledger, "?payment=success&pack=small").unwrap();
        assert!(out.starts_with("Added 750 bonus tokens."));
        assert_eq!(ledger.load(Tier::Basic).bonus_tokens, 750);

        assert_eq!(
            redeem(&ledger, "https://costumes.example/").unwrap(),
            "No payment result in that link."
        );
        assert!(redeem(&ledger, "?payment=success&pack=999").is_err());
    }
}
