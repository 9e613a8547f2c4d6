//! Error types for sdnflowd

use thiserror::Error;

/// Daemon errors
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A line of the event feed is not a valid event
    #[error("Event parse error at line {line}: {source}")]
    EventParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Metrics registry setup failed
    #[error("Metrics error: {0}")]
    Metrics(String),
}

/// Result type for sdnflowd operations
pub type Result<T> = std::result::Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DaemonError::Config("stats_interval_secs must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: stats_interval_secs must be > 0"
        );
    }

    #[test]
    fn test_event_parse_display() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = DaemonError::EventParse { line: 3, source };
        assert!(err.to_string().starts_with("Event parse error at line 3:"));
    }
}
