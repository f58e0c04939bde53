//! Background batch downloads with a queryable job store

use crate::core::service::DownloadService;
use crate::error::{FetchError, Result};
use crate::types::{BatchAck, BatchItem, BatchJob, DownloadRequest, ItemStatus};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// In-memory record of batch jobs
#[derive(Debug, Clone)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, BatchJob>>>,
    max_retained: usize,
}

impl JobStore {
    pub fn new(max_retained: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            max_retained,
        }
    }

    /// Register a new job with every item pending
    pub fn create(&self, urls: &[String]) -> BatchJob {
        let job = BatchJob {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            finished_at: None,
            items: urls
                .iter()
                .map(|url| BatchItem {
                    url: url.clone(),
                    status: ItemStatus::Pending,
                    filename: None,
                    error: None,
                })
                .collect(),
        };

        let mut jobs = self.jobs.write();
        evict_finished(&mut jobs, self.max_retained);
        jobs.insert(job.id.clone(), job.clone());
        job
    }

    pub fn get(&self, id: &str) -> Option<BatchJob> {
        self.jobs.read().get(id).cloned()
    }

    /// All jobs, oldest first
    pub fn list(&self) -> Vec<BatchJob> {
        let mut all: Vec<BatchJob> = self.jobs.read().values().cloned().collect();
        all.sort_by_key(|j| j.created_at);
        all
    }

    fn update_item(&self, id: &str, index: usize, f: impl FnOnce(&mut BatchItem)) {
        if let Some(item) = self
            .jobs
            .write()
            .get_mut(id)
            .and_then(|job| job.items.get_mut(index))
        {
            f(item);
        }
    }

    fn finish(&self, id: &str) {
        if let Some(job) = self.jobs.write().get_mut(id) {
            job.finished_at = Some(Utc::now());
        }
    }
}

/// Drop the oldest finished jobs so at most `max_retained` remain
fn evict_finished(jobs: &mut HashMap<String, BatchJob>, max_retained: usize) {
    let mut finished: Vec<(String, chrono::DateTime<Utc>)> = jobs
        .values()
        .filter_map(|j| j.finished_at.map(|t| (j.id.clone(), t)))
        .collect();

    if finished.len() <= max_retained {
        return;
    }

    finished.sort_by_key(|(_, t)| *t);
    let excess = finished.len() - max_retained;
    for (id, _) in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
}

/// Starts batches and works through them one URL at a time
#[derive(Debug, Clone)]
pub struct BatchRunner {
    service: DownloadService,
    store: JobStore,
}

impl BatchRunner {
    pub fn new(service: DownloadService, store: JobStore) -> Self {
        Self { service, store }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Validate, register and acknowledge a batch, then process it in the background.
    ///
    /// Returns before any download starts. Must be called from within a
    /// Tokio runtime.
    pub fn start_batch(&self, urls: Option<Vec<String>>) -> Result<BatchAck> {
        let urls = match urls {
            Some(urls) if !urls.is_empty() => urls,
            _ => {
                return Err(FetchError::Validation(
                    "URLs array is required and must not be empty".into(),
                ));
            }
        };

        let job = self.store.create(&urls);
        let total = job.total();
        info!(job_id = %job.id, total, "Batch accepted");

        let runner = self.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            runner.process(&job_id, urls).await;
        });

        Ok(BatchAck {
            success: true,
            message: format!("Batch download started for {} URLs", total),
            total,
            job_id: job.id,
        })
    }

    async fn process(&self, job_id: &str, urls: Vec<String>) {
        let total = urls.len();
        for (index, url) in urls.into_iter().enumerate() {
            self.store
                .update_item(job_id, index, |item| item.status = ItemStatus::Running);

            match self.service.download(&DownloadRequest::new(&url)).await {
                Ok(outcome) => {
                    info!(job_id, item = index + 1, total, %url, filename = %outcome.filename, "Batch item downloaded");
                    self.store.update_item(job_id, index, |item| {
                        item.status = ItemStatus::Succeeded;
                        item.filename = Some(outcome.filename);
                    });
                }
                Err(e) => {
                    warn!(job_id, item = index + 1, total, %url, "Batch item failed: {}", e);
                    self.store.update_item(job_id, index, |item| {
                        item.status = ItemStatus::Failed;
                        item.error = Some(e.to_string());
                    });
                }
            }
        }

        self.store.finish(job_id);
        info!(job_id, total, "Batch finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryPolicy;
    use crate::types::{AppConfig, JobState};
    use std::time::Duration;

    fn runner() -> BatchRunner {
        let cfg = AppConfig {
            tool: "definitely-not-a-real-fetch-tool-4821".into(),
            download_dir: std::env::temp_dir()
                .join("media-grab-batch-test")
                .to_string_lossy()
                .into_owned(),
            ..AppConfig::default()
        };
        let service = DownloadService::new(&cfg)
            .unwrap()
            .with_policy(RetryPolicy::new(1, Duration::ZERO, Duration::ZERO));
        BatchRunner::new(service, JobStore::new(10))
    }

    async fn wait_until_done(store: &JobStore, id: &str) -> BatchJob {
        for _ in 0..200 {
            let job = store.get(id).unwrap();
            if job.state() == JobState::Completed {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("batch {id} did not finish");
    }

    #[tokio::test]
    async fn test_ack_is_immediate() {
        let runner = runner();
        let ack = runner
            .start_batch(Some(vec!["u1".into(), "u2".into()]))
            .unwrap();
        assert!(ack.success);
        assert_eq!(ack.total, 2);

        let job = runner.store().get(&ack.job_id).unwrap();
        assert_eq!(job.total(), 2);
        assert_ne!(job.state(), JobState::Completed);
    }

    #[tokio::test]
    async fn test_empty_or_missing_is_rejected() {
        let runner = runner();
        assert!(matches!(runner.start_batch(Some(vec![])), Err(FetchError::Validation(_))));
        assert!(matches!(runner.start_batch(None), Err(FetchError::Validation(_))));
        assert!(runner.store().list().is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_the_batch() {
        let runner = runner();
        let ack = runner
            .start_batch(Some(vec![
                "https://example.org/a".into(),
                "".into(),
                "https://example.org/c".into(),
            ]))
            .unwrap();

        let job = wait_until_done(runner.store(), &ack.job_id).await;
        assert_eq!(job.count(ItemStatus::Failed), 3);
        assert!(job.items.iter().all(|i| i.error.is_some()));
        assert!(job.items[1].error.as_deref().unwrap().contains("URL is required"));
    }

    fn finish_at(store: &JobStore, id: &str, secs: i64) {
        store.jobs.write().get_mut(id).unwrap().finished_at =
            chrono::DateTime::from_timestamp(secs, 0);
    }

    #[test]
    fn test_store_evicts_oldest_finished() {
        let store = JobStore::new(1);
        let first = store.create(&["a".into()]);
        finish_at(&store, &first.id, 100);
        let second = store.create(&["b".into()]);
        finish_at(&store, &second.id, 200);

        // Creating a third leaves room for only one finished job
        let third = store.create(&["c".into()]);
        assert!(store.get(&first.id).is_none());
        assert!(store.get(&second.id).is_some());
        assert!(store.get(&third.id).is_some());
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_update_unknown_job_is_ignored() {
        let store = JobStore::new(5);
        store.update_item("missing", 0, |item| item.status = ItemStatus::Failed);
        store.finish("missing");
        assert!(store.list().is_empty());
    }
}
