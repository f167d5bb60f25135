use std::collections::HashMap;
use std::io::{BufRead, Seek, SeekFrom};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::core::error::LedgerError;
use crate::core::ledger::cache::{CachedRecord, ScanCache};
use crate::core::ledger::pricing;

#[derive(Deserialize)]
struct JsonlMessage {
    model: Option<String>,
    usage: Option<JsonlUsage>,
    id: Option<String>,
}

#[derive(Deserialize)]
struct JsonlUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cache_read_input_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct JsonlLine {
    #[serde(rename = "type")]
    line_type: Option<String>,
    message: Option<JsonlMessage>,
    #[serde(rename = "requestId")]
    request_id: Option<String>,
    timestamp: Option<String>,
}

/// One assistant turn's token usage as read from the session logs.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}

impl ParsedRecord {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_creation_tokens
    }

    pub fn cost(&self) -> f64 {
        pricing::cost_for(
            &self.model,
            self.input_tokens,
            self.output_tokens,
            self.cache_read_tokens,
            self.cache_creation_tokens,
        )
    }
}

fn to_cached(records: &[ParsedRecord]) -> Vec<CachedRecord> {
    records
        .iter()
        .map(|r| CachedRecord {
            model: r.model.clone(),
            timestamp: r.timestamp.to_rfc3339(),
            input_tokens: r.input_tokens,
            output_tokens: r.output_tokens,
            cache_read_tokens: r.cache_read_tokens,
            cache_creation_tokens: r.cache_creation_tokens,
        })
        .collect()
}

fn from_cached(cached: Vec<CachedRecord>) -> Vec<ParsedRecord> {
    cached
        .into_iter()
        .filter_map(|c| {
            let timestamp = c
                .timestamp
                .parse::<DateTime<Utc>>()
                .ok()?;
            Some(ParsedRecord {
                model: c.model,
                timestamp,
                input_tokens: c.input_tokens,
                output_tokens: c.output_tokens,
                cache_read_tokens: c.cache_read_tokens,
                cache_creation_tokens: c.cache_creation_tokens,
            })
        })
        .collect()
}

/// Discover session log files under the known roots:
/// `~/.claude/projects`, `$CLAUDE_CONFIG_DIR/projects`, and the XDG config
/// equivalent, including per-session `subagents` subdirectories.
fn discover_ledger_files() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();

    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".claude"));
    }
    if let Ok(config_dir) = std::env::var("CLAUDE_CONFIG_DIR") {
        roots.push(PathBuf::from(config_dir));
    }
    if let Some(config_home) = dirs::config_dir() {
        roots.push(config_home.join("claude"));
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for root in roots {
        let projects_dir = root.join("projects");
        if !projects_dir.is_dir() {
            continue;
        }
        let Ok(projects) = std::fs::read_dir(&projects_dir) else {
            continue;
        };
        for project_entry in projects.flatten() {
            let project_path = project_entry.path();
            if !project_path.is_dir() {
                continue;
            }

            // {project-dir}/*.jsonl
            if let Ok(entries) = std::fs::read_dir(&project_path) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("jsonl")
                    {
                        files.push(path);
                    }
                }
            }

            // {project-dir}/{session-dir}/subagents/*.jsonl
            if let Ok(subdirs) = std::fs::read_dir(&project_path) {
                for subdir in subdirs.flatten() {
                    let subagents_dir = subdir.path().join("subagents");
                    if !subagents_dir.is_dir() {
                        continue;
                    }
                    if let Ok(sa_entries) = std::fs::read_dir(&subagents_dir) {
                        for sa_entry in sa_entries.flatten() {
                            let path = sa_entry.path();
                            if path.is_file()
                                && path.extension().and_then(|e| e.to_str()) == Some("jsonl")
                            {
                                files.push(path);
                            }
                        }
                    }
                }
            }
        }
    }

    files
}

/// Fast ASCII check: does this line look like it contains usage data?
fn is_candidate_line(line: &str) -> bool {
    line.contains("\"type\":\"assistant\"") && line.contains("\"usage\"")
}

/// Parse a single session JSONL file, optionally resuming from a byte offset.
/// Streaming chunks of the same message are deduplicated by (message id,
/// request id), keeping the last occurrence.
fn parse_ledger_file(path: &PathBuf, offset: u64) -> Result<(Vec<ParsedRecord>, u64), LedgerError> {
    let file = std::fs::File::open(path)?;
    let file_size = file.metadata().map(|m| m.len()).unwrap_or(0);

    let mut reader = std::io::BufReader::new(file);
    if offset > 0 {
        reader.seek(SeekFrom::Start(offset))?;
    }

    let mut records: Vec<ParsedRecord> = Vec::new();
    let mut dedup: HashMap<(String, String), usize> = HashMap::new();
    let mut line_buf = String::new();

    loop {
        line_buf.clear();
        let bytes_read = reader.read_line(&mut line_buf)?;
        if bytes_read == 0 {
            break;
        }

        let line = line_buf.trim();
        if line.is_empty() || !is_candidate_line(line) {
            continue;
        }

        let parsed: JsonlLine = match serde_json::from_str(line) {
            Ok(p) => p,
            Err(_) => continue,
        };

        if parsed.line_type.as_deref() != Some("assistant") {
            continue;
        }
        let Some(message) = parsed.message else {
            continue;
        };
        let Some(model) = message.model else {
            continue;
        };
        let Some(usage) = message.usage else {
            continue;
        };

        let timestamp = parsed
            .timestamp
            .as_deref()
            .and_then(|ts| ts.parse::<DateTime<Utc>>().ok())
            .unwrap_or_else(Utc::now);

        let record = ParsedRecord {
            model,
            timestamp,
            input_tokens: usage.input_tokens.unwrap_or(0),
            output_tokens: usage.output_tokens.unwrap_or(0),
            cache_read_tokens: usage.cache_read_input_tokens.unwrap_or(0),
            cache_creation_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
        };

        let msg_id = message.id.unwrap_or_default();
        let req_id = parsed.request_id.unwrap_or_default();
        if !msg_id.is_empty() || !req_id.is_empty() {
            let key = (msg_id, req_id);
            if let Some(idx) = dedup.get(&key) {
                records[*idx] = record;
            } else {
                let idx = records.len();
                dedup.insert(key, idx);
                records.push(record);
            }
        } else {
            records.push(record);
        }
    }

    Ok((records, file_size))
}

fn file_mtime_ms(path: &PathBuf) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| {
            t.duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64
        })
        .unwrap_or(0)
}

/// Scan all session files and return records from the trailing `days` days.
/// Individual unreadable files are skipped; only the record set is returned.
pub fn scan(days: u32) -> Result<Vec<ParsedRecord>, LedgerError> {
    let mut cache = ScanCache::load();
    let cutoff = Utc::now() - chrono::Duration::days(days as i64);

    let mut all_records: Vec<ParsedRecord> = Vec::new();

    for file_path in &discover_ledger_files() {
        let path_str = file_path.to_string_lossy().to_string();
        let mtime_ms = file_mtime_ms(file_path);
        let file_size = std::fs::metadata(file_path).map(|m| m.len()).unwrap_or(0);

        if cache.is_unchanged(&path_str, mtime_ms, file_size) {
            let cached = cache.get_records(&path_str);
            if !cached.is_empty() {
                all_records.extend(from_cached(cached));
                continue;
            }
            // Empty records mean a stale entry; fall through to re-parse.
        }

        let offset = cache.resume_offset(&path_str, mtime_ms);

        match parse_ledger_file(file_path, offset) {
            Ok((records, parsed_bytes)) => {
                let cached = to_cached(&records);
                all_records.extend(records);
                cache.update(&path_str, mtime_ms, file_size, parsed_bytes, cached);
            }
            Err(err) => {
                debug!(path = %file_path.display(), error = %err, "skipping unreadable ledger file");
                continue;
            }
        }
    }

    if let Err(err) = cache.save() {
        debug!(error = %err, "failed to persist ledger cache");
    }

    Ok(all_records
        .into_iter()
        .filter(|r| r.timestamp >= cutoff)
        .collect())
}
