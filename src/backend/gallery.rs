//! Public gallery, votes and the weekly contest

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use super::{BackendError, SupabaseClient};

const STORAGE_BUCKET: &str = "gallery";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    #[default]
    Approved,
    Rejected,
}

/// One row of the `gallery` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_email: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub before_image_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub costume_name: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub votes_count: i64,
    #[serde(default)]
    pub views_count: i64,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub contest_week: Option<String>,
    #[serde(default)]
    pub is_winner: bool,
    #[serde(default)]
    pub winner_tier: Option<String>,
    #[serde(default)]
    pub moderation_status: ModerationStatus,
    #[serde(default)]
    pub reported_count: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyContest {
    pub id: String,
    pub contest_week: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub winner_id: Option<String>,
    #[serde(default)]
    pub winner_announced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_entries: i64,
    #[serde(default)]
    pub total_votes: i64,
    pub prize_tier: String,
    #[serde(default)]
    pub prize_claimed: bool,
    pub created_at: DateTime<Utc>,
}

/// New submission; moderation is auto-approved
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewGalleryItem {
    pub user_id: String,
    pub user_email: Option<String>,
    pub image_url: String,
    pub before_image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub costume_name: String,
    pub prompt: Option<String>,
    pub is_video: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GalleryFilter {
    #[default]
    Trending,
    Recent,
    Winners,
    Contest,
}

impl GalleryFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trending => "trending",
            Self::Recent => "recent",
            Self::Winners => "winners",
            Self::Contest => "contest",
        }
    }
}

impl fmt::Display for GalleryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GalleryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trending" => Ok(Self::Trending),
            "recent" => Ok(Self::Recent),
            "winners" => Ok(Self::Winners),
            "contest" => Ok(Self::Contest),
            other => Err(format!("Unknown gallery filter: {}", other)),
        }
    }
}

/// Who is voting: a signed-in user, or an anonymous visitor by IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoterIdentity {
    User(String),
    Ip(String),
}

impl VoterIdentity {
    /// User id wins over IP when both are known
    pub fn from_parts(user_id: Option<String>, voter_ip: Option<String>) -> Result<Self, BackendError> {
        match (user_id.filter(|s| !s.is_empty()), voter_ip.filter(|s| !s.is_empty())) {
            (Some(user), _) => Ok(Self::User(user)),
            (None, Some(ip)) => Ok(Self::Ip(ip)),
            (None, None) => Err(BackendError::MissingVoter),
        }
    }

    fn filter(&self) -> (&'static str, String) {
        match self {
            Self::User(id) => ("user_id", format!("eq.{}", id)),
            Self::Ip(ip) => ("voter_ip", format!("eq.{}", ip)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryStats {
    pub total_transformations: u64,
    pub total_votes: u64,
    pub total_winners: u64,
    pub total_users: u64,
}

/// Object path inside the gallery bucket
pub fn storage_path(user_id: &str, millis: i64, file_name: &str) -> String {
    format!("{}/{}-{}", user_id, millis, file_name)
}

/// Parse the total out of a `Content-Range` header (`0-24/3573`, `*/0`)
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

fn eq(value: impl fmt::Display) -> String {
    format!("eq.{}", value)
}

pub struct GalleryClient {
    rest: SupabaseClient,
}

impl GalleryClient {
    pub fn new(rest: SupabaseClient) -> Self {
        Self { rest }
    }

    /// Public, approved items ordered for the requested view
    pub async fn fetch_items(
        &self,
        filter: GalleryFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<GalleryItem>, BackendError> {
        let mut query: Vec<(&str, String)> = vec![
            ("select", "*".to_string()),
            ("is_public", eq(true)),
            ("moderation_status", eq("approved")),
        ];

        match filter {
            GalleryFilter::Trending => {
                query.push(("order", "votes_count.desc,created_at.desc".to_string()))
            }
            GalleryFilter::Recent => query.push(("order", "created_at.desc".to_string())),
            GalleryFilter::Winners => {
                query.push(("is_winner", eq(true)));
                query.push(("order", "created_at.desc".to_string()));
            }
            GalleryFilter::Contest => {
                let week = self.current_contest_week().await?;
                query.push(("contest_week", eq(week)));
                query.push(("order", "votes_count.desc".to_string()));
            }
        }
        query.push(("offset", offset.to_string()));
        query.push(("limit", limit.to_string()));

        SupabaseClient::send_json(self.rest.request(Method::GET, "/rest/v1/gallery").query(&query))
            .await
    }

    pub async fn submit(&self, item: &NewGalleryItem) -> Result<GalleryItem, BackendError> {
        #[derive(Serialize)]
        struct Insert<'a> {
            #[serde(flatten)]
            item: &'a NewGalleryItem,
            is_public: bool,
            moderation_status: ModerationStatus,
        }

        let body = Insert {
            item,
            is_public: true,
            moderation_status: ModerationStatus::Approved,
        };

        let rows: Vec<GalleryItem> = SupabaseClient::send_json(
            self.rest
                .request(Method::POST, "/rest/v1/gallery")
                .header("Prefer", "return=representation")
                .json(&body),
        )
        .await?;

        let created = rows.into_iter().next().ok_or_else(|| BackendError::Api {
            status: 201,
            message: "Insert returned no rows".to_string(),
        })?;
        info!(item = %created.id, costume = ?created.costume_name, "Submitted to gallery");
        Ok(created)
    }

    pub async fn has_voted(&self, gallery_id: &str, voter: &VoterIdentity) -> Result<bool, BackendError> {
        let (column, value) = voter.filter();
        let rows: Vec<serde_json::Value> = SupabaseClient::send_json(
            self.rest
                .request(Method::GET, "/rest/v1/gallery_votes")
                .query(&[
                    ("select", "id".to_string()),
                    ("gallery_id", eq(gallery_id)),
                    (column, value),
                    ("limit", "1".to_string()),
                ]),
        )
        .await?;
        Ok(!rows.is_empty())
    }

    /// One vote per item per voter; the counter bump is best-effort
    pub async fn vote(&self, gallery_id: &str, voter: &VoterIdentity) -> Result<(), BackendError> {
        if self.has_voted(gallery_id, voter).await? {
            return Err(BackendError::AlreadyVoted);
        }

        let (user_id, voter_ip) = match voter {
            VoterIdentity::User(id) => (Some(id.as_str()), None),
            VoterIdentity::Ip(ip) => (None, Some(ip.as_str())),
        };
        SupabaseClient::send_empty(
            self.rest
                .request(Method::POST, "/rest/v1/gallery_votes")
                .header("Prefer", "return=minimal")
                .json(&json!({
                    "gallery_id": gallery_id,
                    "user_id": user_id,
                    "voter_ip": voter_ip,
                })),
        )
        .await?;

        if let Err(e) = SupabaseClient::send_empty(
            self.rest
                .rpc("increment_gallery_votes", json!({ "gallery_item_id": gallery_id })),
        )
        .await
        {
            warn!(item = gallery_id, error = %e, "Failed to increment vote count");
        }
        Ok(())
    }

    pub async fn remove_vote(&self, gallery_id: &str, voter: &VoterIdentity) -> Result<(), BackendError> {
        let (column, value) = voter.filter();
        SupabaseClient::send_empty(
            self.rest
                .request(Method::DELETE, "/rest/v1/gallery_votes")
                .query(&[("gallery_id", eq(gallery_id)), (column, value)]),
        )
        .await?;

        if let Err(e) = SupabaseClient::send_empty(
            self.rest
                .rpc("decrement_gallery_votes", json!({ "gallery_item_id": gallery_id })),
        )
        .await
        {
            warn!(item = gallery_id, error = %e, "Failed to decrement vote count");
        }
        Ok(())
    }

    pub async fn increment_views(&self, gallery_id: &str) -> Result<(), BackendError> {
        SupabaseClient::send_empty(
            self.rest
                .rpc("increment_gallery_views", json!({ "gallery_item_id": gallery_id })),
        )
        .await
    }

    /// Contest week label as computed by the database (e.g. `2025-W43`)
    pub async fn current_contest_week(&self) -> Result<String, BackendError> {
        let week: Option<String> =
            SupabaseClient::send_json(self.rest.rpc("get_current_contest_week", json!({}))).await?;
        Ok(week.unwrap_or_default())
    }

    pub async fn current_contest(&self) -> Result<Option<WeeklyContest>, BackendError> {
        let week = self.current_contest_week().await?;
        let rows: Vec<WeeklyContest> = SupabaseClient::send_json(
            self.rest
                .request(Method::GET, "/rest/v1/weekly_contests")
                .query(&[
                    ("select", "*".to_string()),
                    ("contest_week", eq(&week)),
                    ("limit", "1".to_string()),
                ]),
        )
        .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn weekly_top_entries(
        &self,
        week: Option<&str>,
        limit: usize,
    ) -> Result<Vec<GalleryItem>, BackendError> {
        let week = match week {
            Some(w) => w.to_string(),
            None => self.current_contest_week().await?,
        };
        SupabaseClient::send_json(self.rest.rpc(
            "get_weekly_top_entries",
            json!({ "week": week, "limit_count": limit }),
        ))
        .await
    }

    pub async fn user_items(&self, user_id: &str) -> Result<Vec<GalleryItem>, BackendError> {
        SupabaseClient::send_json(
            self.rest
                .request(Method::GET, "/rest/v1/gallery")
                .query(&[
                    ("select", "*".to_string()),
                    ("user_id", eq(user_id)),
                    ("order", "created_at.desc".to_string()),
                ]),
        )
        .await
    }

    /// Delete an item, scoped to its owner
    pub async fn delete_item(&self, item_id: &str, user_id: &str) -> Result<(), BackendError> {
        SupabaseClient::send_empty(
            self.rest
                .request(Method::DELETE, "/rest/v1/gallery")
                .query(&[("id", eq(item_id)), ("user_id", eq(user_id))]),
        )
        .await?;
        info!(item = item_id, "Deleted gallery item");
        Ok(())
    }

    pub async fn report_item(
        &self,
        gallery_id: &str,
        reporter_id: &str,
        reason: &str,
        details: Option<&str>,
    ) -> Result<(), BackendError> {
        SupabaseClient::send_empty(
            self.rest
                .request(Method::POST, "/rest/v1/gallery_reports")
                .header("Prefer", "return=minimal")
                .json(&json!({
                    "gallery_id": gallery_id,
                    "reporter_id": reporter_id,
                    "reason": reason,
                    "details": details,
                    "status": "pending",
                })),
        )
        .await?;

        #[derive(Deserialize)]
        struct ReportedCount {
            reported_count: i64,
        }

        let rows: Vec<ReportedCount> = SupabaseClient::send_json(
            self.rest
                .request(Method::GET, "/rest/v1/gallery")
                .query(&[("select", "reported_count".to_string()), ("id", eq(gallery_id))]),
        )
        .await?;

        if let Some(current) = rows.first() {
            SupabaseClient::send_empty(
                self.rest
                    .request(Method::PATCH, "/rest/v1/gallery")
                    .query(&[("id", eq(gallery_id))])
                    .json(&json!({ "reported_count": current.reported_count + 1 })),
            )
            .await?;
        }
        warn!(item = gallery_id, reason, "Gallery item reported");
        Ok(())
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.rest.base_url(),
            STORAGE_BUCKET,
            path
        )
    }

    /// Upload media to the gallery bucket and return its public URL
    pub async fn upload_media(
        &self,
        user_id: &str,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let millis = Utc::now().timestamp_millis();
        self.upload_media_at(user_id, millis, bytes, file_name, content_type)
            .await
    }

    pub async fn upload_media_at(
        &self,
        user_id: &str,
        millis: i64,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let path = storage_path(user_id, millis, file_name);
        let size = bytes.len();
        SupabaseClient::send_empty(
            self.rest
                .request(
                    Method::POST,
                    &format!("/storage/v1/object/{}/{}", STORAGE_BUCKET, path),
                )
                .header("Content-Type", content_type)
                .header("cache-control", "3600")
                .header("x-upsert", "false")
                .body(bytes),
        )
        .await?;
        info!(path = %path, size, "Uploaded media");
        Ok(self.public_url(&path))
    }

    pub async fn contest_winners(&self, limit: usize) -> Result<Vec<GalleryItem>, BackendError> {
        SupabaseClient::send_json(
            self.rest
                .request(Method::GET, "/rest/v1/gallery")
                .query(&[
                    ("select", "*".to_string()),
                    ("is_winner", eq(true)),
                    ("order", "created_at.desc".to_string()),
                    ("limit", limit.to_string()),
                ]),
        )
        .await
    }

    async fn count(&self, table: &str, filters: &[(&str, String)]) -> Result<u64, BackendError> {
        let resp = SupabaseClient::check(
            self.rest
                .request(Method::HEAD, &format!("/rest/v1/{}", table))
                .header("Prefer", "count=exact")
                .query(&[("select", "*")])
                .query(filters)
                .send()
                .await?,
        )
        .await?;

        Ok(resp
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total)
            .unwrap_or(0))
    }

    pub async fn stats(&self) -> Result<GalleryStats, BackendError> {
        let visible = [("is_public", eq(true)), ("moderation_status", eq("approved"))];

        let total_transformations = self.count("gallery", &visible).await?;
        let total_votes = self.count("gallery_votes", &[]).await?;
        let total_winners = self.count("gallery", &[("is_winner", eq(true))]).await?;

        #[derive(Deserialize)]
        struct Owner {
            user_id: String,
        }

        let owners: Vec<Owner> = SupabaseClient::send_json(
            self.rest
                .request(Method::GET, "/rest/v1/gallery")
                .query(&[("select", "user_id".to_string())])
                .query(&visible),
        )
        .await?;
        let total_users = owners
            .into_iter()
            .map(|o| o.user_id)
            .collect::<HashSet<_>>()
            .len() as u64;

        Ok(GalleryStats {
            total_transformations,
            total_votes,
            total_winners,
            total_users,
        })
    }
}
