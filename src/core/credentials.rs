use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

/// Supplies a bearer credential on demand. Absence is not an error; the
/// caller degrades to an unavailable rate-limit snapshot.
pub trait CredentialSource: Send + Sync {
    fn get_token(&self) -> Option<String>;
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(rename = "claudeAiOauth")]
    claude_ai_oauth: Option<OAuthEntry>,
}

#[derive(Deserialize)]
struct OAuthEntry {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
}

/// Reads the OAuth access token from ~/.claude/.credentials.json.
pub struct ClaudeCredentialFile {
    path: PathBuf,
}

impl ClaudeCredentialFile {
    pub fn new() -> Self {
        Self {
            path: default_credentials_path(),
        }
    }

    /// Override the credentials path (tests, non-standard installs).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ClaudeCredentialFile {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialSource for ClaudeCredentialFile {
    fn get_token(&self) -> Option<String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "credentials file unreadable");
                return None;
            }
        };
        let file: CredentialsFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "credentials file malformed");
                return None;
            }
        };
        let token = file.claude_ai_oauth?.access_token?;
        if token.is_empty() {
            debug!(path = %self.path.display(), "credentials file has empty access token");
            return None;
        }
        Some(token)
    }
}

fn default_credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("~"))
        .join(".claude")
        .join(".credentials.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_credentials(dir: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(dir);
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join(".credentials.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_token_from_file() {
        let path = write_credentials(
            "usagebar_test_creds_ok",
            r#"{"claudeAiOauth":{"accessToken":"tok_abc123"}}"#,
        );
        let source = ClaudeCredentialFile::at(&path);
        assert_eq!(source.get_token().as_deref(), Some("tok_abc123"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_yields_none() {
        let source = ClaudeCredentialFile::at("/nonexistent/usagebar/.credentials.json");
        assert!(source.get_token().is_none());
    }

    #[test]
    fn malformed_json_yields_none() {
        let path = write_credentials("usagebar_test_creds_bad", "not json at all");
        let source = ClaudeCredentialFile::at(&path);
        assert!(source.get_token().is_none());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn empty_token_yields_none() {
        let path = write_credentials(
            "usagebar_test_creds_empty",
            r#"{"claudeAiOauth":{"accessToken":""}}"#,
        );
        let source = ClaudeCredentialFile::at(&path);
        assert!(source.get_token().is_none());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_oauth_entry_yields_none() {
        let path = write_credentials("usagebar_test_creds_noauth", r#"{}"#);
        let source = ClaudeCredentialFile::at(&path);
        assert!(source.get_token().is_none());
        let _ = std::fs::remove_file(&path);
    }
}
