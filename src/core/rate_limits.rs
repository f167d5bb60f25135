use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::credentials::CredentialSource;
use crate::core::error::UsageError;
use crate::core::models::limits::{ExtraUsage, RateLimitSnapshot, RateLimitWindow};

const USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";
const CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct WindowRaw {
    utilization: f64,
    resets_at: Option<String>,
}

#[derive(Deserialize)]
struct ExtraUsageRaw {
    is_enabled: Option<bool>,
    monthly_limit: Option<f64>,
    used_credits: Option<f64>,
    utilization: Option<f64>,
}

#[derive(Deserialize)]
struct UsageResponse {
    five_hour: Option<WindowRaw>,
    seven_day: Option<WindowRaw>,
    seven_day_sonnet: Option<WindowRaw>,
    seven_day_opus: Option<WindowRaw>,
    seven_day_oauth_apps: Option<WindowRaw>,
    extra_usage: Option<ExtraUsageRaw>,
}

fn parse_window(raw: WindowRaw) -> RateLimitWindow {
    let resets_at = raw
        .resets_at
        .as_deref()
        .and_then(|s| s.parse::<DateTime<Utc>>().ok());
    // The API reports utilization either as a fraction (0.0-1.0) or as a
    // percentage (0-100). Values above 1.0 are already percentages.
    let utilization = if raw.utilization > 1.0 {
        raw.utilization
    } else {
        raw.utilization * 100.0
    };
    RateLimitWindow {
        utilization,
        resets_at,
    }
}

fn parse_snapshot(data: UsageResponse) -> Result<RateLimitSnapshot> {
    let five_hour = data
        .five_hour
        .map(parse_window)
        .context("response missing five_hour window")?;
    let seven_day = data
        .seven_day
        .map(parse_window)
        .context("response missing seven_day window")?;
    Ok(RateLimitSnapshot {
        five_hour,
        seven_day,
        seven_day_sonnet: data.seven_day_sonnet.map(parse_window),
        seven_day_opus: data.seven_day_opus.map(parse_window),
        seven_day_oauth_apps: data.seven_day_oauth_apps.map(parse_window),
        extra_usage: data.extra_usage.map(|raw| ExtraUsage {
            is_enabled: raw.is_enabled.unwrap_or(false),
            // Credit values from the API are in cents
            monthly_limit: raw.monthly_limit.map(|c| c / 100.0),
            used_credits: raw.used_credits.map(|c| c / 100.0),
            utilization: raw.utilization,
        }),
        is_available: true,
    })
}

struct CacheSlot {
    fetched_at: Instant,
    snapshot: RateLimitSnapshot,
}

/// Fetches and caches the remote rate-limit snapshot.
///
/// Fails soft: every failure path returns `None` and logs. Successful
/// fetches are held for 30 seconds; within that window no credential
/// lookup or network call happens.
pub struct RateLimitClient {
    credentials: Arc<dyn CredentialSource>,
    http: reqwest::Client,
    endpoint: String,
    cache: Mutex<Option<CacheSlot>>,
}

impl RateLimitClient {
    pub fn new(credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            credentials,
            http: reqwest::Client::new(),
            endpoint: USAGE_URL.to_string(),
            cache: Mutex::new(None),
        }
    }

    pub async fn get_usage_data(&self) -> Option<RateLimitSnapshot> {
        // Holding the lock across the fetch coalesces concurrent misses
        // into a single outbound call.
        let mut cache = self.cache.lock().await;
        if let Some(slot) = cache.as_ref() {
            if slot.fetched_at.elapsed() < CACHE_TTL {
                return Some(slot.snapshot.clone());
            }
        }
        match self.fetch().await {
            Ok(snapshot) => {
                *cache = Some(CacheSlot {
                    fetched_at: Instant::now(),
                    snapshot: snapshot.clone(),
                });
                Some(snapshot)
            }
            Err(UsageError::CredentialUnavailable) => {
                debug!("no credential available, skipping rate limit fetch");
                None
            }
            Err(err) => {
                warn!(error = %err, "rate limit fetch failed");
                None
            }
        }
    }

    /// Drop the cached snapshot, forcing the next read to refetch. Used
    /// when credentials are known to have changed.
    pub async fn clear_cache(&self) {
        *self.cache.lock().await = None;
    }

    async fn fetch(&self) -> Result<RateLimitSnapshot, UsageError> {
        let token = self
            .credentials
            .get_token()
            .ok_or(UsageError::CredentialUnavailable)?;
        self.fetch_with_token(&token)
            .await
            .map_err(|err| UsageError::RemoteFetchFailed(format!("{err:#}")))
    }

    async fn fetch_with_token(&self, token: &str) -> Result<RateLimitSnapshot> {
        let response = self
            .http
            .get(&self.endpoint)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/json")
            .header("anthropic-beta", "oauth-2025-04-20")
            .send()
            .await
            .context("failed to send request to usage API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status.as_u16(), body);
        }

        let data: UsageResponse = response
            .json()
            .await
            .context("failed to parse usage API response")?;
        parse_snapshot(data)
    }
}

/// Format the time remaining until a reset deadline, relative to `now`.
/// Pure and deterministic; no I/O.
pub fn format_time_remaining(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = resets_at - now;
    if remaining.num_seconds() <= 0 {
        return "Resetting...".to_string();
    }

    let total_minutes = remaining.num_minutes();
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours > 24 {
        format!("{}d {}h", hours / 24, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
