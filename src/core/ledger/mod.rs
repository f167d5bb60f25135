pub mod blocks;
pub mod cache;
pub mod pricing;
pub mod scanner;

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};

use crate::core::error::LedgerError;
use crate::core::models::session::SessionBlock;
use scanner::ParsedRecord;

/// One model's token/cost row within a ledger day.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerModelRow {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cost: f64,
}

/// Per-day aggregate rows derived from raw local records.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerDay {
    pub date: NaiveDate,
    pub rows: Vec<LedgerModelRow>,
}

/// Read side of the local usage ledger. Both operations derive values from
/// raw session records rather than returning precomputed summaries.
pub trait UsageLedgerPort: Send + Sync {
    /// Per-day per-model aggregates for the trailing `days` days,
    /// chronologically ordered.
    fn daily_usage(&self, days: u32) -> Result<Vec<LedgerDay>, LedgerError>;

    /// 5-hour-granularity session blocks covering recent activity.
    fn session_blocks(&self) -> Result<Vec<SessionBlock>, LedgerError>;
}

/// Production ledger backed by the session JSONL logs on disk.
pub struct JsonlLedger;

impl JsonlLedger {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonlLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageLedgerPort for JsonlLedger {
    fn daily_usage(&self, days: u32) -> Result<Vec<LedgerDay>, LedgerError> {
        let records = scanner::scan(days)?;
        Ok(group_daily(records))
    }

    fn session_blocks(&self) -> Result<Vec<SessionBlock>, LedgerError> {
        // Two days of records is ample for the trailing 5-hour window.
        let records = scanner::scan(2)?;
        Ok(blocks::build_blocks(&records, Utc::now()))
    }
}

fn group_daily(records: Vec<ParsedRecord>) -> Vec<LedgerDay> {
    let mut by_day: BTreeMap<NaiveDate, BTreeMap<String, LedgerModelRow>> = BTreeMap::new();

    for record in records {
        let date = record.timestamp.date_naive();
        let cost = record.cost();
        let row = by_day
            .entry(date)
            .or_default()
            .entry(record.model.clone())
            .or_insert_with(|| LedgerModelRow {
                model: record.model.clone(),
                input_tokens: 0,
                output_tokens: 0,
                cache_read_tokens: 0,
                cache_creation_tokens: 0,
                cost: 0.0,
            });
        row.input_tokens += record.input_tokens;
        row.output_tokens += record.output_tokens;
        row.cache_read_tokens += record.cache_read_tokens;
        row.cache_creation_tokens += record.cache_creation_tokens;
        row.cost += cost;
    }

    by_day
        .into_iter()
        .map(|(date, rows)| LedgerDay {
            date,
            rows: rows.into_values().collect(),
        })
        .collect()
}
