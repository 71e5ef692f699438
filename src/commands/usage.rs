//! Commands for token usage and tier selection

use tracing::error;

use crate::ai::COSTUME_PRESETS;
use crate::billing::{
    format_tokens_display, tokens_breakdown, Action, Tier, TierTokens, UsageLedger,
};

/// Show usage for the selected tier, applying any pending rollover first
pub fn show_usage(ledger: &UsageLedger, json: bool) -> Result<String, String> {
    let tier = ledger.selected_tier();
    ledger.reset_if_needed(tier);
    let snap = ledger.snapshot(tier);

    if json {
        return serde_json::to_string_pretty(&snap).map_err(|e| e.to_string());
    }

    let mut out = format!(
        "{} plan: {} of {} {}used ({:.0}%)\n",
        snap.tier_name,
        snap.tokens_used,
        snap.allotment,
        if snap.is_lifetime { "lifetime tokens " } else { "tokens " },
        snap.usage_percentage
    );
    if snap.bonus_tokens > 0 {
        out.push_str(&format!(
            "Bonus: {}\n",
            format_tokens_display(snap.bonus_tokens)
        ));
    }
    out.push_str(&format!(
        "Remaining: {} ({})",
        format_tokens_display(snap.remaining_tokens),
        tokens_breakdown(snap.remaining_tokens)
    ));
    if let Some(days) = snap.days_until_reset {
        out.push_str(&format!("\nResets in {} day{}", days, if days == 1 { "" } else { "s" }));
    }
    Ok(out)
}

pub fn select_tier(ledger: &UsageLedger, tier: Tier) -> Result<String, String> {
    ledger.select_tier(tier).map_err(|e| {
        error!(error = %e, "Failed to save tier");
        "Couldn't save your plan choice. Please try again.".to_string()
    })?;
    ledger.reset_if_needed(tier);

    let info = TierTokens::for_tier(tier);
    Ok(format!(
        "Switched to {} ({} {})\n{}",
        info.name,
        format_tokens_display(info.allotment),
        if info.is_lifetime { "total" } else { "per month" },
        ledger.summary(tier)
    ))
}

pub fn reset_usage(ledger: &UsageLedger) -> Result<String, String> {
    ledger.reset().map_err(|e| {
        error!(error = %e, "Failed to reset usage");
        "Couldn't reset usage. Please try again.".to_string()
    })?;
    Ok("Usage reset.".to_string())
}

pub fn list_presets() -> String {
    let mut out = format!(
        "Costumes ({} per image, {} per video):\n",
        format_tokens_display(Action::Image.cost()),
        format_tokens_display(Action::Video.cost())
    );
    for preset in COSTUME_PRESETS {
        out.push_str(&format!(
            "  {} {:<18} {}\n",
            preset.emoji, preset.id, preset.description
        ));
    }
    out
}
