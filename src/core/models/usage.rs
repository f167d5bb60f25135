use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::models::limits::RateLimitSnapshot;

/// Utilization at or above this percentage is a warning.
pub const WARNING_PERCENT: f64 = 70.0;
/// Utilization at or above this percentage is critical.
pub const CRITICAL_PERCENT: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Safe,
    Warning,
    Critical,
}

impl UsageStatus {
    /// Bucket a utilization percentage. Total over all inputs: anything
    /// below the warning threshold is safe, including negatives.
    pub fn from_percent(percent: f64) -> Self {
        if percent >= CRITICAL_PERCENT {
            UsageStatus::Critical
        } else if percent >= WARNING_PERCENT {
            UsageStatus::Warning
        } else {
            UsageStatus::Safe
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UsageStatus::Safe => "safe",
            UsageStatus::Warning => "warning",
            UsageStatus::Critical => "critical",
        }
    }
}

/// Token and cost totals for a single model within one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cost: f64,
}

impl ModelUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_creation_tokens
    }
}

/// Aggregated usage for one calendar day.
///
/// `models` excludes synthetic entries; `total_tokens` and `total_cost`
/// cover everything the ledger recorded for the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub models: HashMap<String, ModelUsage>,
}

impl DailyUsage {
    pub fn zero(date: NaiveDate) -> Self {
        Self {
            date,
            total_tokens: 0,
            total_cost: 0.0,
            models: HashMap::new(),
        }
    }
}

/// The merged view of local ledger data and remote rate limits.
/// Replaced wholesale on every refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub today: DailyUsage,
    pub this_week: Vec<DailyUsage>,
    pub rate_limits: Option<RateLimitSnapshot>,
}

/// Compact view derived for the menu bar on every read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuBarSnapshot {
    pub percentage_used: f64,
    pub cost: f64,
    pub status: UsageStatus,
    pub rate_limits: Option<RateLimitSnapshot>,
}
