//! Concurrent archive fetching.
//!
//! This module streams bulk data archives from HTTP(S) URLs to local files.
//!
//! # Features
//!
//! - Streaming downloads (bodies are never held in memory)
//! - Bounded concurrency with FIFO queuing beyond the cap
//! - Retry with exponential backoff for transient failures
//! - Per-item outcomes; one failure never affects its siblings
//! - Fire-and-forget progress events over a bounded channel

pub mod constants;
mod client;
mod engine;
mod error;
mod filename;
mod progress;
mod retry;

pub use client::{HttpClient, ItemProgress};
pub use constants::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
pub use engine::{EngineError, FetchEngine, FetchOutcome, FetchRequest, FetchedArchive};
pub use error::FetchError;
pub use progress::{
    DEFAULT_PROGRESS_CAPACITY, FetchProgress, ProgressEvent, ProgressSender, progress_channel,
};
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureClass, RetryDecision, RetryPolicy, classify_error};
