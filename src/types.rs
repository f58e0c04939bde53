//! Type definitions for media-grab
//!
//! Source of truth for all data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format value meaning "let the platform pick the best streams"
pub const BEST_FORMAT: &str = "best";

// ============================================
// Download Types
// ============================================

/// One download attempt's input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    BEST_FORMAT.into()
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: default_format(),
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }
}

/// Result of a successful download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutcome {
    pub success: bool,
    /// Filename without its extension
    pub title: String,
    /// Servable path, e.g. "/downloads/My%20Clip.mp4"
    pub download_url: String,
    pub filename: String,
}

// ============================================
// Metadata Types
// ============================================

/// Compact description of a remote video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub thumbnail: String,
    /// Seconds, when the site reports one
    pub duration: Option<f64>,
    pub uploader: String,
    /// At most ten entries, in the tool's order
    pub formats: Vec<FormatSummary>,
}

/// One selectable format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatSummary {
    pub format_id: String,
    /// The tool's format note, e.g. "720p" or "medium"
    pub quality: String,
    pub ext: String,
    /// "12.3 MB" or "Unknown"
    pub filesize: String,
    /// "1080p" or "Audio"
    pub resolution: String,
}

// ============================================
// Batch Types
// ============================================

/// Immediate acknowledgement of a batch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAck {
    pub success: bool,
    pub message: String,
    pub total: usize,
    pub job_id: String,
}

/// Progress of a single batch entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Overall state of a batch, derived from its items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub url: String,
    pub status: ItemStatus,
    pub filename: Option<String>,
    pub error: Option<String>,
}

/// Snapshot of a batch job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub items: Vec<BatchItem>,
}

impl BatchJob {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn state(&self) -> JobState {
        if self.finished_at.is_some() {
            return JobState::Completed;
        }
        if self.items.iter().all(|i| i.status == ItemStatus::Pending) {
            JobState::Pending
        } else {
            JobState::Running
        }
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }
}

// ============================================
// Config Types
// ============================================

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fetch tool executable, used as-is (may contain spaces)
    pub tool: String,
    /// Leading arguments for the tool, e.g. `["-m", "yt_dlp"]` with `tool = "python3"`
    pub tool_args: Vec<String>,
    /// Where downloads land
    pub download_dir: String,
    /// URL prefix the download directory is served under
    pub public_path: String,
    /// Total attempts per download, including the first
    pub max_attempts: u32,
    pub retry_base_delay_secs: u64,
    pub retry_max_delay_secs: u64,
    /// Ceiling on concurrently running tool processes
    pub max_concurrent_downloads: usize,
    pub download_socket_timeout_secs: u64,
    pub info_socket_timeout_secs: u64,
    /// Finished batch jobs kept for status queries
    pub max_retained_jobs: usize,
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tool: "yt-dlp".into(),
            tool_args: Vec::new(),
            download_dir: "public/downloads".into(),
            public_path: "/downloads".into(),
            max_attempts: 3,
            retry_base_delay_secs: 1,
            retry_max_delay_secs: 30,
            max_concurrent_downloads: 3,
            download_socket_timeout_secs: 30,
            info_socket_timeout_secs: 15,
            max_retained_jobs: 50,
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_best() {
        let req: DownloadRequest =
            serde_json::from_str(r#"{"url":"https://youtu.be/abc"}"#).unwrap();
        assert_eq!(req.format, BEST_FORMAT);
        assert_eq!(DownloadRequest::new("u").with_format("18").format, "18");
    }

    #[test]
    fn test_outcome_uses_camel_case() {
        let outcome = DownloadOutcome {
            success: true,
            title: "Clip".into(),
            download_url: "/downloads/Clip.mp4".into(),
            filename: "Clip.mp4".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["downloadUrl"], "/downloads/Clip.mp4");
    }

    #[test]
    fn test_job_state_derivation() {
        let mut job = BatchJob {
            id: "j".into(),
            created_at: Utc::now(),
            finished_at: None,
            items: vec![
                BatchItem {
                    url: "a".into(),
                    status: ItemStatus::Pending,
                    filename: None,
                    error: None,
                },
                BatchItem {
                    url: "b".into(),
                    status: ItemStatus::Pending,
                    filename: None,
                    error: None,
                },
            ],
        };
        assert_eq!(job.state(), JobState::Pending);
        job.items[0].status = ItemStatus::Failed;
        assert_eq!(job.state(), JobState::Running);
        job.finished_at = Some(Utc::now());
        assert_eq!(job.state(), JobState::Completed);
        assert_eq!(job.count(ItemStatus::Failed), 1);
        assert_eq!(job.total(), 2);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: AppConfig = serde_json::from_str(r#"{"port": 8080}"#).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.tool, "yt-dlp");
        assert_eq!(cfg.max_attempts, 3);
    }
}
