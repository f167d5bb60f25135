use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::render;
use crate::core::notify::{DesktopNotifier, NotificationGate, Trigger};

/// Poll the aggregator on a fixed interval, printing a status line and
/// feeding each reading through the notification gate. Runs until
/// interrupted.
pub async fn run(interval_secs: u64, opts: &OutputOptions) -> Result<()> {
    let aggregator = crate::cli::build_aggregator();
    let gate = NotificationGate::new(Arc::new(DesktopNotifier::new()));

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let menu_bar = aggregator.get_menu_bar_snapshot().await;
        let decision = gate.check_and_notify(menu_bar.percentage_used, Trigger::Auto);
        debug!(?decision, percent = menu_bar.percentage_used, "poll");

        match opts.format {
            OutputFormat::Text => {
                let mode = aggregator.configuration().display_mode;
                println!("{}", render::status_line(&menu_bar, mode, opts.use_color));
            }
            OutputFormat::Json => {
                let json = if opts.pretty {
                    serde_json::to_string_pretty(&menu_bar)?
                } else {
                    serde_json::to_string(&menu_bar)?
                };
                println!("{}", json);
            }
        }
    }
}
