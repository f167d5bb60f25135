pub mod config_cmd;
pub mod output;
pub mod render;
pub mod usage_cmd;
pub mod watch_cmd;

use std::sync::Arc;

use crate::core::aggregator::UsageAggregator;
use crate::core::config::Configuration;
use crate::core::credentials::ClaudeCredentialFile;
use crate::core::ledger::JsonlLedger;
use crate::core::rate_limits::RateLimitClient;

/// Wire up the full aggregation stack with production sources.
pub fn build_aggregator() -> UsageAggregator {
    let config = Configuration::load().unwrap_or_default();
    let credentials = Arc::new(ClaudeCredentialFile::new());
    let rate_limits = Arc::new(RateLimitClient::new(credentials));
    let ledger = Arc::new(JsonlLedger::new());
    UsageAggregator::new(rate_limits, ledger, config)
}
