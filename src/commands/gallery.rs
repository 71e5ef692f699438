//! Gallery and weekly contest commands

use std::path::Path;
use tracing::info;

use super::cli::GalleryCommand;
use super::{backend_failure, AppState};
use crate::ai::media::detect_image_mime;
use crate::backend::{
    BackendError, GalleryClient, GalleryItem, NewGalleryItem, VoterIdentity,
};

fn format_item(item: &GalleryItem) -> String {
    let kind = if item.is_video { "🎬" } else { "📸" };
    let winner = if item.is_winner { " 🏆" } else { "" };
    format!(
        "{} {:<36} {:<18} {:>4} votes {:>5} views{}",
        kind,
        item.id,
        item.costume_name.as_deref().unwrap_or("mystery"),
        item.votes_count,
        item.views_count,
        winner
    )
}

fn format_items(items: &[GalleryItem], empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items.iter().map(format_item).collect::<Vec<_>>().join("\n")
}

fn signed_in_user(state: &AppState) -> Result<(String, Option<String>), String> {
    state
        .session()
        .map(|s| (s.user.id, s.user.email))
        .ok_or_else(|| BackendError::NotSignedIn.user_message().to_string())
}

fn voter(state: &AppState, ip: Option<String>) -> Result<VoterIdentity, String> {
    // An explicit IP means an anonymous vote even when signed in
    let user = if ip.is_some() {
        None
    } else {
        state.session().map(|s| s.user.id)
    };
    VoterIdentity::from_parts(user, ip).map_err(|e| e.user_message().to_string())
}

async fn upload(
    gallery: &GalleryClient,
    user_id: &str,
    file: &Path,
) -> Result<(String, bool), String> {
    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;

    let mime = detect_image_mime(&bytes)
        .map(str::to_string)
        .or_else(|| {
            mime_guess::from_path(file)
                .first()
                .filter(|m| m.type_() == mime_guess::mime::IMAGE || m.type_() == mime_guess::mime::VIDEO)
                .map(|m| m.essence_str().to_string())
        })
        .ok_or_else(|| format!("{} is not an image or video", file.display()))?;
    let is_video = mime.starts_with("video/");

    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("costume");
    let url = gallery
        .upload_media(user_id, bytes, name, &mime)
        .await
        .map_err(|e| backend_failure("Upload", e))?;
    Ok((url, is_video))
}

pub async fn run(state: &AppState, command: GalleryCommand) -> Result<String, String> {
    let rest = state
        .backend()
        .map_err(|e| backend_failure("Backend setup", e))?;
    let gallery = GalleryClient::new(rest);

    match command {
        GalleryCommand::List {
            filter,
            limit,
            offset,
        } => {
            let items = gallery
                .fetch_items(filter, limit, offset)
                .await
                .map_err(|e| backend_failure("Gallery fetch", e))?;
            Ok(format_items(&items, "The gallery is empty. Be the first to haunt it!"))
        }

        GalleryCommand::Vote { id, ip } => {
            let voter = voter(state, ip)?;
            gallery
                .vote(&id, &voter)
                .await
                .map_err(|e| backend_failure("Vote", e))?;
            Ok("🎃 Vote cast!".to_string())
        }

        GalleryCommand::Unvote { id, ip } => {
            let voter = voter(state, ip)?;
            gallery
                .remove_vote(&id, &voter)
                .await
                .map_err(|e| backend_failure("Vote removal", e))?;
            Ok("Vote removed.".to_string())
        }

        GalleryCommand::Submit {
            file,
            costume,
            prompt,
        } => {
            let (user_id, email) = signed_in_user(state)?;
            let (url, is_video) = upload(&gallery, &user_id, &file).await?;
            let item = gallery
                .submit(&NewGalleryItem {
                    user_id,
                    user_email: email,
                    image_url: url,
                    costume_name: costume,
                    prompt,
                    is_video,
                    ..Default::default()
                })
                .await
                .map_err(|e| backend_failure("Gallery submit", e))?;
            info!(item = %item.id, "Entered the weekly contest");
            Ok(format!(
                "Entered into the {} contest! Share it: {}",
                item.contest_week.as_deref().unwrap_or("weekly"),
                item.image_url
            ))
        }

        GalleryCommand::Contest { limit } => {
            let contest = gallery
                .current_contest()
                .await
                .map_err(|e| backend_failure("Contest fetch", e))?;
            let Some(contest) = contest else {
                return Ok("No contest is running this week.".to_string());
            };
            let leaders = gallery
                .weekly_top_entries(Some(&contest.contest_week), limit)
                .await
                .map_err(|e| backend_failure("Contest leaders", e))?;
            Ok(format!(
                "Contest {} ({} to {}), prize: {} plan\n{} entries, {} votes\n{}",
                contest.contest_week,
                contest.start_date,
                contest.end_date,
                contest.prize_tier,
                contest.total_entries,
                contest.total_votes,
                format_items(&leaders, "No entries yet.")
            ))
        }

        GalleryCommand::Winners { limit } => {
            let items = gallery
                .contest_winners(limit)
                .await
                .map_err(|e| backend_failure("Winners fetch", e))?;
            Ok(format_items(&items, "No winners crowned yet."))
        }

        GalleryCommand::Mine => {
            let (user_id, _) = signed_in_user(state)?;
            let items = gallery
                .user_items(&user_id)
                .await
                .map_err(|e| backend_failure("User gallery fetch", e))?;
            Ok(format_items(&items, "You haven't shared anything yet."))
        }

        GalleryCommand::Delete { id } => {
            let (user_id, _) = signed_in_user(state)?;
            gallery
                .delete_item(&id, &user_id)
                .await
                .map_err(|e| backend_failure("Gallery delete", e))?;
            Ok("Deleted.".to_string())
        }

        GalleryCommand::Report {
            id,
            reason,
            details,
        } => {
            let (user_id, _) = signed_in_user(state)?;
            gallery
                .report_item(&id, &user_id, &reason, details.as_deref())
                .await
                .map_err(|e| backend_failure("Report", e))?;
            Ok("Thanks, a moderator will take a look.".to_string())
        }

        GalleryCommand::Stats => {
            let stats = gallery
                .stats()
                .await
                .map_err(|e| backend_failure("Gallery stats", e))?;
            Ok(format!(
                "{} transformations, {} votes, {} winners, {} creators",
                stats.total_transformations,
                stats.total_votes,
                stats.total_winners,
                stats.total_users
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthUser, BackendConfig, Session};
    use crate::billing::{FixedClock, MemoryStore};
    use crate::config::AppConfig;
    use chrono::{TimeZone, Utc};
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;
    use std::sync::Arc;

    fn state(backend: BackendConfig) -> AppState {
        let mut config = AppConfig::from_lookup(|name| {
            (name == "COSTUME_STUDIO_DATA_DIR").then(|| "/tmp/costume-studio-test".to_string())
        })
        .unwrap();
        config.backend = backend;
        let now = Utc.with_ymd_and_hms(2025, 10, 19, 12, 0, 0).unwrap();
        AppState::new(config, Arc::new(MemoryStore::new()), Arc::new(FixedClock::new(now)))
    }

    fn session(user_id: &str) -> Session {
        Session {
            access_token: "jwt-1".to_string(),
            refresh_token: None,
            expires_in: None,
            token_type: None,
            user: AuthUser {
                id: user_id.to_string(),
                email: Some("ghoul@example.com".to_string()),
                user_metadata: serde_json::Value::Null,
            },
        }
    }

    #[tokio::test]
    async fn test_unconfigured_backend_is_themed() {
        let state = state(BackendConfig::default());
        let err = run(&state, GalleryCommand::Stats).await.unwrap_err();
        assert!(err.contains("haunted gallery is closed"));
    }

    #[tokio::test]
    async fn test_vote_needs_identity() {
        let server = MockServer::start_async().await;
        let state = state(BackendConfig {
            url: Some(server.base_url()),
            anon_key: Some("anon".to_string()),
        });

        let err = run(
            &state,
            GalleryCommand::Vote {
                id: "item-1".to_string(),
                ip: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.contains("Sign in to cast your vote"));
    }

    #[tokio::test]
    async fn test_signed_in_vote_uses_user_and_token() {
        let server = MockServer::start_async().await;
        let state = state(BackendConfig {
            url: Some(server.base_url()),
            anon_key: Some("anon".to_string()),
        });
        state.save_session(&session("user-7")).unwrap();

        let check = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/gallery_votes")
                    .header("Authorization", "Bearer jwt-1")
                    .query_param("user_id", "eq.user-7");
                then.status(200).json_body(json!([{ "id": "v1" }]));
            })
            .await;

        let err = run(
            &state,
            GalleryCommand::Vote {
                id: "item-1".to_string(),
                ip: None,
            },
        )
        .await
        .unwrap_err();

        check.assert_async().await;
        assert!(err.contains("One vote per ghoul"));
    }

    #[tokio::test]
    async fn test_list_formats_items() {
        let server = MockServer::start_async().await;
        let state = state(BackendConfig {
            url: Some(server.base_url()),
            anon_key: Some("anon".to_string()),
        });
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/gallery");
                then.status(200).json_body(json!([{
                    "id": "item-1",
                    "user_id": "u",
                    "image_url": "https://cdn.example/a.png",
                    "costume_name": "Mummy",
                    "votes_count": 12,
                    "is_winner": true,
                    "created_at": "2025-10-19T12:00:00Z"
                }]));
            })
            .await;

        let out = run(
            &state,
            GalleryCommand::List {
                filter: Default::default(),
                limit: 20,
                offset: 0,
            },
        )
        .await
        .unwrap();
        assert!(out.contains("Mummy"));
        assert!(out.contains("12 votes"));
        assert!(out.ends_with("🏆"));
    }

    #[tokio::test]
    async fn test_submit_requires_sign_in() {
        let server = MockServer::start_async().await;
        let state = state(BackendConfig {
            url: Some(server.base_url()),
            anon_key: Some("anon".to_string()),
        });
        let upload = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200);
            })
            .await;

        let err = run(
            &state,
            GalleryCommand::Submit {
                file: "me-vampire.png".into(),
                costume: "Vampire".to_string(),
                prompt: None,
            },
        )
        .await
        .unwrap_err();

        assert!(err.contains("sign in"));
        upload.assert_calls_async(0).await;
    }
}
