use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contiguous 5-hour usage window segmented from the local ledger.
///
/// Gap blocks mark periods of no activity between sessions; they carry no
/// cost and must be skipped in window-cost computations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBlock {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub is_gap: bool,
    pub cost_usd: f64,
}
