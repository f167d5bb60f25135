use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::core::config::{ConfigUpdate, Configuration, CostSource};
use crate::core::ledger::{LedgerDay, UsageLedgerPort};
use crate::core::models::limits::RateLimitSnapshot;
use crate::core::models::session::SessionBlock;
use crate::core::models::usage::{
    DailyUsage, MenuBarSnapshot, ModelUsage, UsageSnapshot, UsageStatus,
};
use crate::core::rate_limits::RateLimitClient;

const SNAPSHOT_TTL: Duration = Duration::from_secs(3);
const SESSION_WINDOW_HOURS: i64 = 5;
const LEDGER_DAYS: u32 = 8;

/// Internal model identifier excluded from user-facing breakdowns.
const SYNTHETIC_MODEL: &str = "<synthetic>";

fn is_synthetic_model(name: &str) -> bool {
    name == SYNTHETIC_MODEL
}

struct CachedAggregate {
    fetched_at: Instant,
    snapshot: UsageSnapshot,
    blocks: Vec<SessionBlock>,
}

/// Merges ledger output and rate-limit data into one staleness-bounded
/// snapshot.
///
/// All reads fail soft: a source failure degrades that field only, and a
/// total failure yields an all-zero snapshot. The combined result is cached
/// for 3 seconds; concurrent cache misses coalesce into a single refresh.
pub struct UsageAggregator {
    rate_limits: Arc<RateLimitClient>,
    ledger: Arc<dyn UsageLedgerPort>,
    config: StdMutex<Configuration>,
    cache: Mutex<Option<CachedAggregate>>,
}

impl UsageAggregator {
    pub fn new(
        rate_limits: Arc<RateLimitClient>,
        ledger: Arc<dyn UsageLedgerPort>,
        config: Configuration,
    ) -> Self {
        Self {
            rate_limits,
            ledger,
            config: StdMutex::new(config),
            cache: Mutex::new(None),
        }
    }

    pub async fn get_snapshot(&self) -> UsageSnapshot {
        self.aggregate().await.0
    }

    pub async fn get_menu_bar_snapshot(&self) -> MenuBarSnapshot {
        let (snapshot, blocks) = self.aggregate().await;
        let cost_source = self.config.lock().unwrap().cost_source;
        derive_menu_bar(&snapshot, &blocks, cost_source, Utc::now())
    }

    /// Merge a partial configuration update and invalidate the snapshot
    /// cache so the change is reflected on the next read.
    pub async fn update_configuration(&self, update: ConfigUpdate) {
        self.config.lock().unwrap().apply(update);
        *self.cache.lock().await = None;
    }

    pub fn configuration(&self) -> Configuration {
        self.config.lock().unwrap().clone()
    }

    async fn aggregate(&self) -> (UsageSnapshot, Vec<SessionBlock>) {
        // The cache lock is held across the refresh so simultaneous misses
        // produce exactly one underlying fetch of each source.
        let mut cache = self.cache.lock().await;
        if let Some(slot) = cache.as_ref() {
            if slot.fetched_at.elapsed() < SNAPSHOT_TTL {
                return (slot.snapshot.clone(), slot.blocks.clone());
            }
        }
        let fresh = self.refresh().await;
        let result = (fresh.snapshot.clone(), fresh.blocks.clone());
        *cache = Some(fresh);
        result
    }

    async fn refresh(&self) -> CachedAggregate {
        let ledger = Arc::clone(&self.ledger);
        let blocks_task = tokio::task::spawn_blocking(move || ledger.session_blocks());
        let ledger = Arc::clone(&self.ledger);
        let daily_task = tokio::task::spawn_blocking(move || ledger.daily_usage(LEDGER_DAYS));

        let (blocks_result, daily_result, rate_limits) = tokio::join!(
            blocks_task,
            daily_task,
            self.rate_limits.get_usage_data()
        );

        let blocks = match blocks_result {
            Ok(Ok(blocks)) => blocks,
            Ok(Err(err)) => {
                warn!(error = %err, "session block read failed");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "session block task failed");
                Vec::new()
            }
        };
        let days = match daily_result {
            Ok(Ok(days)) => days,
            Ok(Err(err)) => {
                warn!(error = %err, "daily usage read failed");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "daily usage task failed");
                Vec::new()
            }
        };

        let snapshot = merge_snapshot(days, rate_limits, Utc::now().date_naive());
        CachedAggregate {
            fetched_at: Instant::now(),
            snapshot,
            blocks,
        }
    }
}

fn to_daily_usage(day: LedgerDay) -> DailyUsage {
    let mut total_tokens = 0u64;
    let mut total_cost = 0.0f64;
    let mut models: HashMap<String, ModelUsage> = HashMap::new();

    for row in day.rows {
        total_tokens += row.input_tokens
            + row.output_tokens
            + row.cache_read_tokens
            + row.cache_creation_tokens;
        total_cost += row.cost;
        if !is_synthetic_model(&row.model) {
            models.insert(
                row.model,
                ModelUsage {
                    input_tokens: row.input_tokens,
                    output_tokens: row.output_tokens,
                    cache_read_tokens: row.cache_read_tokens,
                    cache_creation_tokens: row.cache_creation_tokens,
                    cost: row.cost,
                },
            );
        }
    }

    DailyUsage {
        date: day.date,
        total_tokens,
        total_cost,
        models,
    }
}

fn merge_snapshot(
    days: Vec<LedgerDay>,
    rate_limits: Option<RateLimitSnapshot>,
    today_date: NaiveDate,
) -> UsageSnapshot {
    let processed: Vec<DailyUsage> = days.into_iter().map(to_daily_usage).collect();

    let today = processed
        .iter()
        .find(|d| d.date == today_date)
        .cloned()
        .unwrap_or_else(|| DailyUsage::zero(today_date));

    let week_start = today_date - chrono::Duration::days(6);
    // Ledger order is preserved; no re-sort.
    let this_week = processed
        .into_iter()
        .filter(|d| d.date >= week_start && d.date <= today_date)
        .collect();

    UsageSnapshot {
        today,
        this_week,
        rate_limits,
    }
}

/// Sum of non-gap session block costs whose start falls within the
/// trailing 5 hours from `now`.
pub fn session_window_cost(blocks: &[SessionBlock], now: DateTime<Utc>) -> f64 {
    let cutoff = now - chrono::Duration::hours(SESSION_WINDOW_HOURS);
    blocks
        .iter()
        .filter(|b| !b.is_gap && b.start_time >= cutoff)
        .map(|b| b.cost_usd)
        .sum()
}

fn derive_menu_bar(
    snapshot: &UsageSnapshot,
    blocks: &[SessionBlock],
    cost_source: CostSource,
    now: DateTime<Utc>,
) -> MenuBarSnapshot {
    let percentage_used = snapshot
        .rate_limits
        .as_ref()
        .filter(|limits| limits.is_available)
        .map(|limits| limits.five_hour.utilization)
        .unwrap_or(0.0);

    let cost = match cost_source {
        CostSource::Today => snapshot.today.total_cost,
        CostSource::SessionWindow => session_window_cost(blocks, now),
    };

    MenuBarSnapshot {
        percentage_used,
        cost,
        status: UsageStatus::from_percent(percentage_used),
        rate_limits: snapshot.rate_limits.clone(),
    }
}
