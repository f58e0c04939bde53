//! Video metadata via the tool's JSON dump mode

use crate::core::invoker::{ToolCommand, tool_failure};
use crate::error::Result;
use crate::types::{FormatSummary, VideoInfo};
use serde_json::Value;
use tracing::{info, instrument};

/// Formats reported back to callers
const MAX_FORMATS: usize = 10;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// `--dump-single-json --no-warnings --no-check-certificate --socket-timeout <n> --no-playlist -- <url>`
pub fn build_info_args(url: &str, socket_timeout_secs: u64) -> Vec<String> {
    vec![
        "--dump-single-json".into(),
        "--no-warnings".into(),
        "--no-check-certificate".into(),
        "--socket-timeout".into(),
        socket_timeout_secs.to_string(),
        "--no-playlist".into(),
        "--".into(),
        url.into(),
    ]
}

/// Fetch and project metadata for `url`
#[instrument(skip(tool))]
pub async fn fetch_info(tool: &ToolCommand, url: &str, socket_timeout_secs: u64) -> Result<VideoInfo> {
    let output = tool.run(&build_info_args(url, socket_timeout_secs)).await?;

    if !output.success {
        return Err(tool_failure(&output.stderr));
    }

    let raw: Value = serde_json::from_str(&output.stdout.join("\n"))?;
    let info = project_info(&raw);
    info!(title = %info.title, formats = info.formats.len(), "Fetched video info");
    Ok(info)
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string()
}

/// Reduce the tool's JSON dump to a [`VideoInfo`]
pub fn project_info(raw: &Value) -> VideoInfo {
    let formats = raw
        .get("formats")
        .and_then(|f| f.as_array())
        .map(|list| project_formats(list))
        .unwrap_or_default();

    VideoInfo {
        title: str_field(raw, "title"),
        thumbnail: str_field(raw, "thumbnail"),
        duration: raw.get("duration").and_then(|d| d.as_f64()),
        uploader: str_field(raw, "uploader"),
        formats,
    }
}

/// Keep entries with both `ext` and `format_note`, first ten only
pub fn project_formats(list: &[Value]) -> Vec<FormatSummary> {
    list.iter()
        .filter_map(|f| {
            let ext = f.get("ext")?.as_str()?.to_string();
            let quality = f.get("format_note")?.as_str()?.to_string();

            let format_id = f
                .get("format_id")
                .and_then(|id| id.as_str())
                .unwrap_or("")
                .to_string();

            let filesize = f
                .get("filesize")
                .and_then(|s| s.as_f64())
                .filter(|&b| b > 0.0)
                .map(format_filesize)
                .unwrap_or_else(|| "Unknown".into());

            let resolution = f
                .get("height")
                .and_then(|h| h.as_u64())
                .filter(|&h| h > 0)
                .map(|h| format!("{}p", h))
                .unwrap_or_else(|| "Audio".into());

            Some(FormatSummary {
                format_id,
                quality,
                ext,
                filesize,
                resolution,
            })
        })
        .take(MAX_FORMATS)
        .collect()
}

/// Bytes as megabytes with one decimal, e.g. "2.0 MB"
pub fn format_filesize(bytes: f64) -> String {
    format!("{:.1} MB", bytes / BYTES_PER_MB)
}
