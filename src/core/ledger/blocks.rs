use chrono::{DateTime, Duration, DurationRound, Utc};

use crate::core::ledger::scanner::ParsedRecord;
use crate::core::models::session::SessionBlock;

const BLOCK_HOURS: i64 = 5;

fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::hours(1)).unwrap_or(ts)
}

struct OpenBlock {
    start: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    cost: f64,
}

impl OpenBlock {
    fn new(record: &ParsedRecord) -> Self {
        Self {
            start: floor_to_hour(record.timestamp),
            last_activity: record.timestamp,
            cost: record.cost(),
        }
    }

    fn add(&mut self, record: &ParsedRecord) {
        self.last_activity = record.timestamp;
        self.cost += record.cost();
    }

    fn close(self, is_active: bool) -> SessionBlock {
        SessionBlock {
            id: self.start.to_rfc3339(),
            start_time: self.start,
            end_time: self.start + Duration::hours(BLOCK_HOURS),
            is_active,
            is_gap: false,
            cost_usd: self.cost,
        }
    }
}

fn gap_block(start: DateTime<Utc>, end: DateTime<Utc>) -> SessionBlock {
    SessionBlock {
        id: format!("gap-{}", start.to_rfc3339()),
        start_time: start,
        end_time: end,
        is_active: false,
        is_gap: true,
        cost_usd: 0.0,
    }
}

/// Segment ledger records into 5-hour session blocks, in chronological
/// order. Block starts are floored to the hour. A gap block is inserted
/// between sessions separated by at least a full block of silence; gap
/// blocks carry no cost.
pub fn build_blocks(records: &[ParsedRecord], now: DateTime<Utc>) -> Vec<SessionBlock> {
    let mut sorted: Vec<&ParsedRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let block_len = Duration::hours(BLOCK_HOURS);
    let mut blocks: Vec<SessionBlock> = Vec::new();
    let mut current: Option<OpenBlock> = None;

    for record in sorted {
        match current.as_mut() {
            None => current = Some(OpenBlock::new(record)),
            Some(open) => {
                let past_block_end = record.timestamp >= open.start + block_len;
                let idle = record.timestamp - open.last_activity >= block_len;
                if past_block_end || idle {
                    let finished = current.take().unwrap();
                    let gap_start = finished.last_activity;
                    blocks.push(finished.close(false));
                    if idle {
                        blocks.push(gap_block(gap_start, floor_to_hour(record.timestamp)));
                    }
                    current = Some(OpenBlock::new(record));
                } else {
                    open.add(record);
                }
            }
        }
    }

    if let Some(open) = current {
        let is_active = now - open.last_activity < block_len && now < open.start + block_len;
        blocks.push(open.close(is_active));
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: DateTime<Utc>, output_tokens: u64) -> ParsedRecord {
        ParsedRecord {
            model: "claude-sonnet-4-5".to_string(),
            timestamp,
            input_tokens: 0,
            output_tokens,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn single_record_makes_one_active_block() {
        let now = at("2026-08-25T10:30:00Z");
        let records = vec![record(at("2026-08-25T10:12:00Z"), 1000)];
        let blocks = build_blocks(&records, now);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start_time, at("2026-08-25T10:00:00Z"));
        assert_eq!(blocks[0].end_time, at("2026-08-25T15:00:00Z"));
        assert!(blocks[0].is_active);
        assert!(!blocks[0].is_gap);
        // 1000 output tokens at 1.5e-5 per token
        assert!((blocks[0].cost_usd - 0.015).abs() < 1e-9);
    }

    #[test]
    fn records_within_window_share_a_block() {
        let now = at("2026-08-26T00:00:00Z");
        let records = vec![
            record(at("2026-08-25T10:00:00Z"), 1000),
            record(at("2026-08-25T12:30:00Z"), 1000),
        ];
        let blocks = build_blocks(&records, now);
        assert_eq!(blocks.len(), 1);
        assert!((blocks[0].cost_usd - 0.03).abs() < 1e-9);
        assert!(!blocks[0].is_active);
    }

    #[test]
    fn idle_sessions_are_split_with_a_gap() {
        let now = at("2026-08-25T18:30:00Z");
        let records = vec![
            record(at("2026-08-25T06:15:00Z"), 1000),
            record(at("2026-08-25T18:20:00Z"), 1000),
        ];
        let blocks = build_blocks(&records, now);

        assert_eq!(blocks.len(), 3);
        assert!(!blocks[0].is_gap);
        assert_eq!(blocks[0].start_time, at("2026-08-25T06:00:00Z"));

        assert!(blocks[1].is_gap);
        assert_eq!(blocks[1].start_time, at("2026-08-25T06:15:00Z"));
        assert_eq!(blocks[1].end_time, at("2026-08-25T18:00:00Z"));
        assert_eq!(blocks[1].cost_usd, 0.0);

        assert!(!blocks[2].is_gap);
        assert_eq!(blocks[2].start_time, at("2026-08-25T18:00:00Z"));
        assert!(blocks[2].is_active);
    }

    #[test]
    fn record_past_block_end_opens_new_block_without_gap() {
        // Second record is 5h10m after the block start but only 4h10m after
        // the last activity, so the block rolls over with no gap inserted.
        let now = at("2026-08-26T00:00:00Z");
        let records = vec![
            record(at("2026-08-25T06:00:00Z"), 1000),
            record(at("2026-08-25T07:00:00Z"), 1000),
            record(at("2026-08-25T11:10:00Z"), 1000),
        ];
        let blocks = build_blocks(&records, now);

        assert_eq!(blocks.len(), 2);
        assert!(!blocks[0].is_gap);
        assert!(!blocks[1].is_gap);
        assert_eq!(blocks[1].start_time, at("2026-08-25T11:00:00Z"));
    }

    #[test]
    fn stale_last_block_is_not_active() {
        let now = at("2026-08-25T20:00:00Z");
        let records = vec![record(at("2026-08-25T10:00:00Z"), 1000)];
        let blocks = build_blocks(&records, now);
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].is_active);
    }

    #[test]
    fn empty_records_make_no_blocks() {
        let blocks = build_blocks(&[], Utc::now());
        assert!(blocks.is_empty());
    }

    #[test]
    fn unsorted_input_is_ordered_chronologically() {
        let now = at("2026-08-26T00:00:00Z");
        let records = vec![
            record(at("2026-08-25T18:20:00Z"), 1000),
            record(at("2026-08-25T06:15:00Z"), 1000),
        ];
        let blocks = build_blocks(&records, now);
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].start_time < blocks[2].start_time);
    }
}
