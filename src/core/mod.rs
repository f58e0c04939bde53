//! Download orchestration: platforms, the fetch tool, retries, batches

pub mod batch;
pub mod classifier;
pub mod invoker;
pub mod metadata;
pub mod platform;
pub mod retry;
pub mod service;
pub mod snapshot;
