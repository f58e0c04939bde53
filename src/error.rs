//! Error types for media-grab

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad failure families, used to decide retry and HTTP mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Bad input, caught before any subprocess runs
    Validation,
    /// The fetch tool ran and exited non-zero
    ToolExec,
    /// The tool succeeded but no output file could be identified
    Discovery,
    /// Tool output could not be parsed
    Parse,
    /// Filesystem, spawn or task-runtime failures
    Infrastructure,
}

/// Classified reason behind a non-zero tool exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    AuthOrRateLimit,
    Unavailable,
    /// Soft classification: the requested format could not be matched
    FormatNotice,
    Private,
    Blocked,
    Unknown,
}

/// Main error type for media-grab
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{0}")]
    Validation(String),

    /// `message` is user-facing, `raw_detail` is the tool's stderr
    #[error("{message}")]
    Tool {
        category: ErrorCategory,
        message: String,
        raw_detail: String,
    },

    #[error("Download finished but no output file was found in {0}")]
    Discovery(String),

    #[error("Failed to parse tool output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Download task aborted: {0}")]
    TaskAborted(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl FetchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::Tool { .. } => ErrorCode::ToolExec,
            Self::Discovery(_) => ErrorCode::Discovery,
            Self::Parse(_) => ErrorCode::Parse,
            Self::File(_) | Self::Spawn(_) | Self::TaskAborted(_) | Self::Config(_) => {
                ErrorCode::Infrastructure
            }
        }
    }

    /// Whether another attempt could reasonably succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Tool { .. } | Self::Discovery(_) | Self::TaskAborted(_)
        )
    }

    /// Classified category, only present for tool failures
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Tool { category, .. } => Some(*category),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_retry() {
        let tool = FetchError::Tool {
            category: ErrorCategory::Private,
            message: "private".into(),
            raw_detail: "ERROR: Private video".into(),
        };
        assert_eq!(tool.code(), ErrorCode::ToolExec);
        assert!(tool.is_retryable());
        assert_eq!(tool.category(), Some(ErrorCategory::Private));
        assert_eq!(tool.to_string(), "private");

        let invalid = FetchError::Validation("URL is required".into());
        assert_eq!(invalid.code(), ErrorCode::Validation);
        assert!(!invalid.is_retryable());

        let spawn = FetchError::Spawn("yt-dlp".into());
        assert_eq!(spawn.code(), ErrorCode::Infrastructure);
        assert!(!spawn.is_retryable());
        assert!(FetchError::Discovery("dir".into()).is_retryable());
    }

    #[test]
    fn test_category_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCategory::AuthOrRateLimit).unwrap();
        assert_eq!(json, "\"AUTH_OR_RATE_LIMIT\"");
    }
}
