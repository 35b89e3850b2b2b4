//! Fetch engine for concurrent archive downloads with retry support.
//!
//! The engine fetches a batch of [`FetchRequest`]s, each in its own Tokio
//! task, bounded by a semaphore. Every task is joined before `fetch_all`
//! returns, and the outcomes come back in request order.
//!
//! # Example
//!
//! ```no_run
//! use mtgdb_core::fetch::{FetchEngine, FetchRequest, HttpClient, RetryPolicy};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = FetchEngine::new(4, RetryPolicy::default())?;
//! let client = HttpClient::new();
//! let requests = vec![FetchRequest::new(
//!     "AllPrintings",
//!     "https://mtgjson.com/api/v5/AllPrintings.json.zip",
//! )];
//! for outcome in engine.fetch_all(&client, requests, Path::new("./work"), None).await {
//!     match outcome.result {
//!         Ok(archive) => println!("{} -> {}", archive.category, archive.path.display()),
//!         Err(e) => eprintln!("{}: {e}", outcome.category),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::client::ItemProgress;
use super::constants::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::filename::destination_path;
use super::progress::{ProgressEvent, ProgressSender};
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::{FetchError, HttpClient};

/// Error type for fetch engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// One archive to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Source category tag (e.g. `AllPrintings`).
    pub category: String,
    /// Absolute HTTP(S) URL.
    pub url: String,
}

impl FetchRequest {
    /// Creates a request.
    pub fn new(category: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            url: url.into(),
        }
    }
}

/// A successfully fetched archive on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArchive {
    /// Category of the originating request.
    pub category: String,
    /// URL the bytes came from.
    pub url: String,
    /// Local file holding the archive.
    pub path: PathBuf,
    /// Size on disk.
    pub bytes: u64,
}

/// Result for one request of a batch.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Position of the request in the submitted batch.
    pub index: usize,
    /// Category of the request.
    pub category: String,
    /// URL of the request.
    pub url: String,
    /// The fetched archive or the error that ended the final attempt.
    pub result: Result<FetchedArchive, FetchError>,
}

impl FetchOutcome {
    /// Returns true when the archive was fetched.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Bounded-parallel archive fetcher.
///
/// # Concurrency Model
///
/// - Each fetch runs in its own Tokio task
/// - A semaphore permit is acquired, in request order, before spawning each task
/// - Permits are released automatically when a task completes (RAII)
/// - A failed or panicking task never affects its siblings
#[derive(Debug)]
pub struct FetchEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_policy: RetryPolicy,
}

impl FetchEngine {
    /// Creates a new fetch engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `concurrency` is outside
    /// `1..=32`.
    ///
    /// # Example
    ///
    /// ```
    /// use mtgdb_core::fetch::{FetchEngine, RetryPolicy};
    ///
    /// let engine = FetchEngine::new(4, RetryPolicy::default()).unwrap();
    /// assert_eq!(engine.concurrency(), 4);
    /// ```
    #[instrument(level = "debug", skip(retry_policy))]
    pub fn new(concurrency: usize, retry_policy: RetryPolicy) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            "creating fetch engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Fetches every request into `dest_dir`, returning one outcome per request
    /// in request order.
    ///
    /// Individual failures never fail the batch; they are reported in the
    /// corresponding [`FetchOutcome`]. Progress events, if a sender is given,
    /// are published without ever waiting on the consumer.
    #[instrument(skip(self, client, requests, progress), fields(count = requests.len(), dest_dir = %dest_dir.display()))]
    pub async fn fetch_all(
        &self,
        client: &HttpClient,
        requests: Vec<FetchRequest>,
        dest_dir: &Path,
        progress: Option<ProgressSender>,
    ) -> Vec<FetchOutcome> {
        info!("starting fetch batch");

        let mut pending = Vec::with_capacity(requests.len());

        for (index, request) in requests.into_iter().enumerate() {
            let item_progress = ItemProgress::new(progress.clone(), index, &request.category);

            let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                let error = FetchError::TaskPanicked {
                    url: request.url.clone(),
                    message: "fetch semaphore closed".to_string(),
                };
                pending.push((request, Err(error)));
                continue;
            };

            let client = client.clone();
            let policy = self.retry_policy.clone();
            let dest = destination_path(dest_dir, index, &request.url);
            let task_request = request.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let result = fetch_with_retry(&client, &task_request, &dest, &policy, &item_progress).await;
                if let Err(e) = &result {
                    item_progress.emit(ProgressEvent::Failed {
                        reason: e.to_string(),
                    });
                }
                result
            });
            pending.push((request, Ok(handle)));
        }

        debug!(task_count = pending.len(), "waiting for fetches to complete");

        let mut outcomes = Vec::with_capacity(pending.len());
        for (index, (request, spawned)) in pending.into_iter().enumerate() {
            let result = match spawned {
                Ok(handle) => match handle.await {
                    Ok(result) => result,
                    Err(join_error) => {
                        warn!(url = %request.url, error = %join_error, "fetch task panicked");
                        Err(FetchError::TaskPanicked {
                            url: request.url.clone(),
                            message: join_error.to_string(),
                        })
                    }
                },
                Err(error) => Err(error),
            };

            outcomes.push(FetchOutcome {
                index,
                category: request.category,
                url: request.url,
                result,
            });
        }

        let fetched = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            fetched,
            failed = outcomes.len() - fetched,
            "fetch batch complete"
        );
        outcomes
    }
}

/// Fetches one request, retrying transient failures per `policy`.
#[instrument(skip(client, request, dest, policy, progress), fields(category = %request.category, url = %request.url))]
async fn fetch_with_retry(
    client: &HttpClient,
    request: &FetchRequest,
    dest: &Path,
    policy: &RetryPolicy,
    progress: &ItemProgress,
) -> Result<FetchedArchive, FetchError> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(attempt, "attempting fetch");

        match client
            .fetch_to_file_with_progress(&request.url, dest, progress)
            .await
        {
            Ok(bytes) => {
                return Ok(FetchedArchive {
                    category: request.category.clone(),
                    url: request.url.clone(),
                    path: dest.to_path_buf(),
                    bytes,
                });
            }
            Err(e) => match policy.decide(classify_error(&e), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        attempt = next_attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "retrying fetch"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp { reason } => {
                    warn!(error = %e, attempts = attempt, %reason, "fetch failed");
                    return Err(e);
                }
            },
        }
    }
}
