use thiserror::Error;

/// Failures from the local usage ledger. Malformed individual records are
/// skipped during scanning, not surfaced; only I/O failures abort a read.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger data: {0}")]
    Io(#[from] std::io::Error),
}

/// Degradation taxonomy for the engine. Every variant is caught at its
/// origin and converted to an absent or zeroed value; callers only ever see
/// these through logs.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("no credential available")]
    CredentialUnavailable,
    #[error("rate limit fetch failed: {0}")]
    RemoteFetchFailed(String),
    #[error("notifications are not supported on this platform")]
    NotifierUnsupported,
    #[error("notification delivery failed: {0}")]
    NotifyFailed(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_error_wraps_io() {
        let err: LedgerError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(err.to_string().contains("read ledger data"));
    }

    #[test]
    fn usage_error_wraps_io() {
        let err: UsageError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(err.to_string().contains("notification delivery failed"));
    }
}
