//! Costume transform and video commands
//!
//! Both follow the same contract: check the balance before anything leaves
//! the machine, call the provider, write the result, and only then charge.

use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::cli::{TransformArgs, VideoArgs};
use crate::ai::media::{extension_for, load_image, write_output};
use crate::ai::{build_transform_prompt, build_video_prompt, find_preset, CostumeGenerator};
use crate::billing::{format_tokens_display, remaining_tokens, Action, Tier, UsageLedger};

/// Costume label and the description sent to the model
fn resolve_costume(costume: Option<&str>, prompt: Option<&str>) -> Result<(String, String), String> {
    if let Some(custom) = prompt.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(("custom".to_string(), custom.to_string()));
    }
    let Some(costume) = costume.map(str::trim).filter(|c| !c.is_empty()) else {
        return Err("Pick a costume first! Run `presets` to see the options.".to_string());
    };
    Ok(match find_preset(costume) {
        Some(preset) => (preset.id.to_string(), format!("{}. {}", preset.name, preset.prompt)),
        None => (costume.to_lowercase().replace(' ', "_"), costume.to_string()),
    })
}

/// Refuse before calling the provider when the balance can't cover it
fn ensure_affordable(ledger: &UsageLedger, tier: Tier, action: Action) -> Result<(), String> {
    if ledger.can_afford(tier, action) {
        return Ok(());
    }
    let available = remaining_tokens(&ledger.load(tier));
    info!(tier = %tier, action = %action, available, "Blocked: not enough tokens");
    Err(format!(
        "Out of magic! A {} costs {} and you have {} left. Run `checkout <tier|pack>` to get more tokens.",
        action,
        format_tokens_display(action.cost()),
        format_tokens_display(available)
    ))
}

fn default_output(input: &Path, label: &str, mime: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("photo");
    input.with_file_name(format!("{}-{}.{}", stem, label, extension_for(mime)))
}

/// Charge after success; a refusal here means the balance changed mid-flight
fn charge(ledger: &UsageLedger, tier: Tier, action: Action) -> String {
    match ledger.consume(tier, action) {
        Ok(_) => ledger.summary(tier),
        Err(e) => {
            warn!(error = %e, "Generation succeeded but could not be charged");
            ledger.summary(tier)
        }
    }
}

pub async fn transform<G>(ledger: &UsageLedger, generator: &G, args: TransformArgs) -> Result<String, String>
where
    G: CostumeGenerator + ?Sized,
{
    let tier = ledger.selected_tier();
    ensure_affordable(ledger, tier, Action::Image)?;

    let (label, costume) = resolve_costume(args.costume.as_deref(), args.prompt.as_deref())?;

    let mut images = vec![load_image(&args.image).await?];
    for extra in &args.extra_images {
        images.push(load_image(extra).await?);
    }

    let prompt = build_transform_prompt(&costume);
    let image = generator
        .transform_image(&images, &prompt)
        .await
        .map_err(|e| {
            error!(error = %e, costume = %label, "Transform failed");
            e.user_message().to_string()
        })?;

    let out = args
        .out
        .unwrap_or_else(|| default_output(&args.image, &label, &image.mime_type));
    write_output(&out, &image.bytes).await?;

    let summary = charge(ledger, tier, Action::Image);
    info!(costume = %label, model = %image.model, out = %out.display(), "Transform complete");
    Ok(format!("Saved {}\n{}", out.display(), summary))
}

pub async fn video<G>(ledger: &UsageLedger, generator: &G, args: VideoArgs) -> Result<String, String>
where
    G: CostumeGenerator + ?Sized,
{
    let tier = ledger.selected_tier();
    ensure_affordable(ledger, tier, Action::Video)?;

    let (label, costume) = resolve_costume(args.costume.as_deref(), args.prompt.as_deref())?;
    let image = load_image(&args.image).await?;

    let prompt = build_video_prompt(&costume);
    let clip = generator
        .generate_video(&image, &prompt)
        .await
        .map_err(|e| {
            error!(error = %e, costume = %label, "Video generation failed");
            e.user_message().to_string()
        })?;

    let out = args
        .out
        .unwrap_or_else(|| default_output(&args.image, &label, &clip.mime_type));
    write_output(&out, &clip.bytes).await?;

    let summary = charge(ledger, tier, Action::Video);
    info!(costume = %label, model = %clip.model, out = %out.display(), "Video complete");
    Ok(format!("Saved {}\n{}", out.display(), summary))
}
