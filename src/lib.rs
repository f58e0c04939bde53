//! media-grab library
//!
//! Core functionality for the media-grab CLI and any routing layer that
//! wants to expose downloads over HTTP.

pub mod api;
pub mod core;
pub mod error;
pub mod storage;
pub mod types;
pub mod utils;

pub use crate::core::batch::{BatchRunner, JobStore};
pub use crate::core::service::DownloadService;
pub use crate::error::{ErrorCategory, ErrorCode, FetchError, Result};
