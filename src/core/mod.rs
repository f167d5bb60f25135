pub mod aggregator;
pub mod config;
pub mod credentials;
pub mod error;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod rate_limits;
