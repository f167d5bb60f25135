use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One rolling rate-limit window as reported by the OAuth usage API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    /// Percentage of the window quota already consumed (0.0 - 100.0).
    pub utilization: f64,
    /// When the window rolls over, if the API reported it.
    pub resets_at: Option<DateTime<Utc>>,
}

/// Pay-as-you-go credit pool attached to a subscription.
///
/// `monthly_limit` and `used_credits` are dollar amounts; the API reports
/// cents and the client converts on parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraUsage {
    pub is_enabled: bool,
    pub monthly_limit: Option<f64>,
    pub used_credits: Option<f64>,
    pub utilization: Option<f64>,
}

/// Aggregate of all tracked rate-limit windows from one API fetch.
///
/// `five_hour` and `seven_day` are mandatory; a response missing either is
/// treated as a failed fetch. The remaining windows appear only on plans
/// that track them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub five_hour: RateLimitWindow,
    pub seven_day: RateLimitWindow,
    pub seven_day_sonnet: Option<RateLimitWindow>,
    pub seven_day_opus: Option<RateLimitWindow>,
    pub seven_day_oauth_apps: Option<RateLimitWindow>,
    pub extra_usage: Option<ExtraUsage>,
    pub is_available: bool,
}
