//! Request/response contract for an HTTP routing layer
//!
//! Handlers take already-decoded JSON bodies and return either a
//! serialisable success body or an [`ApiError`] carrying the HTTP status to
//! send. Transport is left to the caller.

use crate::core::batch::BatchRunner;
use crate::core::platform;
use crate::core::service::DownloadService;
use crate::error::{ErrorCode, FetchError};
use crate::types::{BatchAck, BatchJob, DownloadOutcome, DownloadRequest, VideoInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const GENERIC_TIP: &str = "Check the link and try again in a few minutes.";

/// Error body: `{ "error": ..., "tip": ... }` plus the status to send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: u16,
    pub error: String,
    pub tip: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            error: message.into(),
            tip: "Provide a valid media URL.".into(),
        }
    }

    /// Map a service error for `url` onto a response
    pub fn from_fetch(err: &FetchError, url: &str) -> Self {
        match err.code() {
            ErrorCode::Validation => Self::bad_request(err.to_string()),
            _ => Self {
                status: 500,
                error: err.to_string(),
                tip: if url.is_empty() {
                    GENERIC_TIP.into()
                } else {
                    platform::classify(url).tip.into()
                },
            },
        }
    }
}

/// Body of a single-download request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadBody {
    pub url: Option<String>,
    pub format: Option<String>,
}

/// Body of a metadata request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InfoBody {
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoResponse {
    pub success: bool,
    pub info: VideoInfo,
}

fn required_url(url: Option<String>) -> Result<String, ApiError> {
    match url {
        Some(url) if !url.trim().is_empty() => Ok(url),
        _ => Err(ApiError::bad_request("URL is required")),
    }
}

/// `POST /api/download`
pub async fn handle_download(
    service: &DownloadService,
    body: DownloadBody,
) -> Result<DownloadOutcome, ApiError> {
    let url = required_url(body.url)?;
    let mut request = DownloadRequest::new(url);
    if let Some(format) = body.format.filter(|f| !f.trim().is_empty()) {
        request = request.with_format(format);
    }

    service
        .download(&request)
        .await
        .map_err(|e| ApiError::from_fetch(&e, &request.url))
}

/// `POST /api/batch`; accepts the raw body so a non-array `urls` can be rejected
pub fn handle_batch(runner: &BatchRunner, body: &Value) -> Result<BatchAck, ApiError> {
    let urls = match body.get("urls") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ApiError::bad_request("URLs must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(_) => return Err(ApiError::bad_request("URLs must be an array")),
    };

    runner
        .start_batch(urls)
        .map_err(|e| ApiError::from_fetch(&e, ""))
}

/// `POST /api/info`
pub async fn handle_info(
    service: &DownloadService,
    body: InfoBody,
) -> Result<InfoResponse, ApiError> {
    let url = required_url(body.url)?;
    let info = service
        .info(&url)
        .await
        .map_err(|e| ApiError::from_fetch(&e, &url))?;
    Ok(InfoResponse {
        success: true,
        info,
    })
}

/// `GET /api/batch/:id`
pub fn handle_job(runner: &BatchRunner, id: &str) -> Result<BatchJob, ApiError> {
    runner.store().get(id).ok_or_else(|| ApiError {
        status: 404,
        error: format!("No batch job with id {}", id),
        tip: "Batch jobs are kept in memory only while the service runs.".into(),
    })
}
