use chrono::Utc;
use colored::{control, ColoredString, Colorize};

use crate::core::config::DisplayMode;
use crate::core::models::limits::{RateLimitSnapshot, RateLimitWindow};
use crate::core::models::usage::{MenuBarSnapshot, UsageSnapshot, UsageStatus};
use crate::core::rate_limits::format_time_remaining;

const BAR_WIDTH: usize = 12;

/// Returns "[████████░░░░]" where █ = remaining portion, ░ = used portion.
pub fn format_usage_bar(used_percent: f64, width: usize) -> String {
    let used_percent = used_percent.clamp(0.0, 100.0);
    let used_blocks = ((used_percent / 100.0) * width as f64).round() as usize;
    let remaining_blocks = width.saturating_sub(used_blocks);

    let filled: String = "█".repeat(remaining_blocks);
    let empty: String = "░".repeat(used_blocks);

    format!("[{}{}]", filled, empty)
}

fn format_tokens(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        format!("{}", count)
    }
}

fn status_color(status: UsageStatus, text: &str) -> ColoredString {
    match status {
        UsageStatus::Safe => text.green(),
        UsageStatus::Warning => text.yellow(),
        UsageStatus::Critical => text.red(),
    }
}

fn render_window(lines: &mut Vec<String>, label: &str, window: &RateLimitWindow) {
    let remaining = (100.0 - window.utilization).max(0.0).round() as u64;
    let status = UsageStatus::from_percent(window.utilization);
    let bar = format_usage_bar(window.utilization, BAR_WIDTH);
    lines.push(format!(
        "  {:<9} {} {}",
        label.cyan(),
        status_color(status, &format!("{}% remaining", remaining)),
        bar
    ));
    if let Some(resets_at) = window.resets_at {
        lines.push(format!(
            "            Resets in {}",
            format_time_remaining(resets_at, Utc::now())
        ));
    }
}

fn render_limits(lines: &mut Vec<String>, limits: &RateLimitSnapshot) {
    render_window(lines, "Session", &limits.five_hour);
    render_window(lines, "Weekly", &limits.seven_day);
    if let Some(window) = &limits.seven_day_sonnet {
        render_window(lines, "Sonnet", window);
    }
    if let Some(window) = &limits.seven_day_opus {
        render_window(lines, "Opus", window);
    }
    if let Some(window) = &limits.seven_day_oauth_apps {
        render_window(lines, "Apps", window);
    }
    if let Some(extra) = &limits.extra_usage {
        if extra.is_enabled {
            if let (Some(used), Some(limit)) = (extra.used_credits, extra.monthly_limit) {
                lines.push(format!(
                    "  {}     ${:.2} / ${:.2} used",
                    "Extra".cyan(),
                    used,
                    limit
                ));
            }
        }
    }
}

/// Render the full usage view as a colored (or plain) string.
///
/// Layout:
/// ```text
///  Claude usage
///   Session   28% remaining [████████░░░░]
///             Resets in 2h 15m
///   Weekly    59% remaining [█████░░░░░░░]
///             Resets in 1d 6h
///   Today     $4.20 (1.2M tokens)
///   This Week $18.75
/// ```
pub fn render_usage(snapshot: &UsageSnapshot, verbose: bool, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(" Claude usage".bold().to_string());

    match &snapshot.rate_limits {
        Some(limits) if limits.is_available => render_limits(&mut lines, limits),
        _ => lines.push(format!(
            "  {}    {}",
            "Limits".cyan(),
            "unavailable".dimmed()
        )),
    }

    lines.push(format!(
        "  {}     ${:.2} ({} tokens)",
        "Today".cyan(),
        snapshot.today.total_cost,
        format_tokens(snapshot.today.total_tokens)
    ));

    let week_cost: f64 = snapshot.this_week.iter().map(|d| d.total_cost).sum();
    lines.push(format!("  {} ${:.2}", "This Week".cyan(), week_cost));

    if verbose {
        for day in &snapshot.this_week {
            lines.push(format!(
                "    {:<12} ${:<8.2} {}",
                day.date.format("%b %d"),
                day.total_cost,
                format_tokens(day.total_tokens)
            ));
            let mut models: Vec<_> = day.models.iter().collect();
            models.sort_by(|a, b| a.0.cmp(b.0));
            for (model, usage) in models {
                lines.push(format!(
                    "      {:<24} ${:<8.2} ({} in / {} out)",
                    model,
                    usage.cost,
                    format_tokens(usage.input_tokens),
                    format_tokens(usage.output_tokens)
                ));
            }
        }
    }

    lines.join("\n")
}

/// One-line rendering for the watch loop, shaped by the display mode.
pub fn status_line(menu: &MenuBarSnapshot, mode: DisplayMode, use_color: bool) -> String {
    control::set_override(use_color);

    let percent = format!("{:.0}%", menu.percentage_used);
    let cost = format!("${:.2}", menu.cost);
    let body = match mode {
        DisplayMode::Both => format!("{} {}", percent, cost),
        DisplayMode::Percentage => percent,
        DisplayMode::Cost => cost,
    };
    format!(
        "{} {}",
        status_color(menu.status, &body),
        format_usage_bar(menu.percentage_used, BAR_WIDTH)
    )
}
