//! Download service: validation, retries, and bounded tool slots

use crate::core::invoker::{FetchInvoker, ToolCommand};
use crate::core::retry::{RetryPolicy, with_retry};
use crate::core::{metadata, platform};
use crate::error::{FetchError, Result};
use crate::types::{AppConfig, DownloadOutcome, DownloadRequest, VideoInfo};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, instrument, warn};

/// Entry point for single downloads and metadata lookups.
///
/// Cheap to clone; clones share the same tool slots.
#[derive(Debug, Clone)]
pub struct DownloadService {
    invoker: Arc<FetchInvoker>,
    policy: RetryPolicy,
    slots: Arc<Semaphore>,
    info_socket_timeout_secs: u64,
}

impl DownloadService {
    pub fn new(config: &AppConfig) -> Result<Self> {
        if config.max_concurrent_downloads == 0 {
            return Err(FetchError::Config(
                "max_concurrent_downloads must be at least 1".into(),
            ));
        }

        let tool = ToolCommand::new(&config.tool, config.tool_args.clone())?;
        let invoker = FetchInvoker::new(
            tool,
            &config.download_dir,
            &config.public_path,
            config.download_socket_timeout_secs,
        );

        Ok(Self {
            invoker: Arc::new(invoker),
            policy: RetryPolicy::from_config(config),
            slots: Arc::new(Semaphore::new(config.max_concurrent_downloads)),
            info_socket_timeout_secs: config.info_socket_timeout_secs,
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn invoker(&self) -> &FetchInvoker {
        &self.invoker
    }

    /// Free tool slots right now
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Download with retries; the last failure is returned unchanged
    #[instrument(skip(self, request), fields(url = %request.url, format = %request.format))]
    pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadOutcome> {
        let url = validate_url(&request.url)?;
        let profile = platform::classify(url);
        let selector = profile.selector_for(&request.format);
        let options = profile.options();

        info!(platform = ?profile.platform, %selector, "Download requested");

        with_retry(&self.policy, url, |_| {
            let invoker = Arc::clone(&self.invoker);
            let url = url.to_string();
            let selector = selector.clone();
            let options = options.clone();
            self.isolated(async move { invoker.invoke(&url, &selector, &options).await })
        })
        .await
    }

    /// Fetch metadata without downloading
    #[instrument(skip(self))]
    pub async fn info(&self, url: &str) -> Result<VideoInfo> {
        let url = validate_url(url)?.to_string();
        let invoker = Arc::clone(&self.invoker);
        let timeout = self.info_socket_timeout_secs;
        self.isolated(async move { metadata::fetch_info(invoker.tool(), &url, timeout).await })
            .await
    }

    /// Run one tool job in its own task while holding a slot.
    ///
    /// A panic inside the job becomes an error for this job alone.
    async fn isolated<T, Fut>(&self, job: Fut) -> Result<T>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let permit = self.acquire_slot().await?;
        let handle = tokio::spawn(async move {
            let result = job.await;
            drop(permit);
            result
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Download task ended abnormally: {}", e);
                Err(FetchError::TaskAborted(e.to_string()))
            }
        }
    }

    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit> {
        if self.slots.available_permits() == 0 {
            info!("All tool slots busy, waiting");
        }
        Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| FetchError::TaskAborted(format!("tool slots closed: {}", e)))
    }
}

/// Reject blank or option-like URLs before anything runs
pub fn validate_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(FetchError::Validation("URL is required".into()));
    }
    if url.starts_with('-') {
        return Err(FetchError::Validation(format!("Not a URL: {}", url)));
    }
    Ok(url)
}
