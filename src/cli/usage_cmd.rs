use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::render;
use crate::core::models::usage::{MenuBarSnapshot, UsageSnapshot};

#[derive(Serialize)]
struct UsagePayload {
    #[serde(flatten)]
    usage: UsageSnapshot,
    menu_bar: MenuBarSnapshot,
}

pub async fn run(opts: &OutputOptions) -> Result<()> {
    let aggregator = crate::cli::build_aggregator();

    let snapshot = aggregator.get_snapshot().await;
    // Served from the snapshot cache, no second fetch.
    let menu_bar = aggregator.get_menu_bar_snapshot().await;

    match opts.format {
        OutputFormat::Text => {
            let text = render::render_usage(&snapshot, opts.verbose, opts.use_color);
            println!("{}", text);
        }
        OutputFormat::Json => {
            let payload = UsagePayload {
                usage: snapshot,
                menu_bar,
            };
            let json = if opts.pretty {
                serde_json::to_string_pretty(&payload)?
            } else {
                serde_json::to_string(&payload)?
            };
            println!("{}", json);
        }
    }

    Ok(())
}

/// Fire a one-off summary notification with the current reading.
pub async fn summary() -> Result<()> {
    use crate::core::notify::{DesktopNotifier, NotificationGate};
    use std::sync::Arc;

    let aggregator = crate::cli::build_aggregator();
    let menu_bar = aggregator.get_menu_bar_snapshot().await;

    let gate = NotificationGate::new(Arc::new(DesktopNotifier::new()));
    gate.notify_summary(menu_bar.percentage_used, menu_bar.cost);

    println!(
        "5h window at {:.0}%, ${:.2} spent",
        menu_bar.percentage_used, menu_bar.cost
    );
    Ok(())
}
