//! End-to-end ingestion: fetch, unpack, parse and store.
//!
//! Fetching is bounded-parallel and fully joined before anything is written.
//! Each fetched archive then runs unpack → parse → upsert in its own task with
//! its own transaction, so archives are ingested in parallel and a failing
//! archive never affects the others.
//!
//! `SQLite` admits one writer at a time. An archive whose write finds the
//! database locked by a sibling's longer transaction backs off and tries
//! again instead of failing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::dataset::{DatasetError, ParsedDataset, SkipCounts, parse_dataset_file};
use crate::fetch::{
    FailureClass, FetchEngine, FetchError, FetchRequest, FetchedArchive, HttpClient,
    ProgressSender, RetryDecision, RetryPolicy,
};
use crate::store::{CardStore, StoreError, UpsertSummary};
use crate::unpack::{UnpackError, unpack_archive};

/// Write attempts per archive while the database is locked by another writer.
/// Each attempt already waits out the connection busy timeout.
const STORE_WRITE_ATTEMPTS: u32 = 12;
const STORE_WRITE_BASE_DELAY: Duration = Duration::from_millis(500);
const STORE_WRITE_MAX_DELAY: Duration = Duration::from_secs(10);

/// Why one archive was not ingested.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Fetching failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Unpacking failed.
    #[error("unpack failed: {0}")]
    Unpack(#[from] UnpackError),

    /// A data file could not be parsed.
    #[error("parse failed: {0}")]
    Parse(#[from] DatasetError),

    /// The store transaction failed and was rolled back.
    #[error("store write failed: {0}")]
    Store(#[from] StoreError),

    /// The archive contained no `.json` data file.
    #[error("archive {archive} contains no JSON data file")]
    NoDataFile {
        /// The archive (or local file) concerned.
        archive: PathBuf,
    },

    /// Copying a local archive into the work directory failed.
    #[error("failed to stage {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The ingestion task panicked.
    #[error("ingest task panicked: {message}")]
    TaskPanicked {
        /// Join error text.
        message: String,
    },
}

/// What one archive contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// JSON data files found in the archive.
    pub data_files: usize,
    /// Sets inserted or updated.
    pub sets_written: u64,
    /// Cards inserted or updated.
    pub cards_written: u64,
    /// Records skipped by the parser.
    pub skipped: SkipCounts,
}

/// Outcome for one archive.
#[derive(Debug)]
pub struct ArchiveReport {
    /// Category of the source.
    pub category: String,
    /// URL (or local path) of the source.
    pub url: String,
    /// Summary or the error that stopped this archive.
    pub result: Result<IngestSummary, IngestError>,
}

/// Outcome of an ingestion run, one entry per request in request order.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Per-archive outcomes.
    pub archives: Vec<ArchiveReport>,
}

impl IngestReport {
    /// Archives ingested successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.archives.iter().filter(|a| a.result.is_ok()).count()
    }

    /// Archives that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.archives.len() - self.succeeded()
    }

    /// Sum of all successful summaries.
    #[must_use]
    pub fn totals(&self) -> IngestSummary {
        let mut totals = IngestSummary::default();
        for summary in self.archives.iter().filter_map(|a| a.result.as_ref().ok()) {
            totals.data_files += summary.data_files;
            totals.sets_written += summary.sets_written;
            totals.cards_written += summary.cards_written;
            totals.skipped.merge(summary.skipped);
        }
        totals
    }
}

/// Coordinates fetch, unpack, parse and store for a batch of sources.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    store: CardStore,
    engine: Arc<FetchEngine>,
    client: HttpClient,
    work_dir: PathBuf,
    write_retry: RetryPolicy,
}

impl IngestPipeline {
    /// Creates a pipeline. Archives are staged under `work_dir`.
    #[must_use]
    pub fn new(
        store: CardStore,
        engine: FetchEngine,
        client: HttpClient,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            engine: Arc::new(engine),
            client,
            work_dir: work_dir.into(),
            write_retry: RetryPolicy::new(
                STORE_WRITE_ATTEMPTS,
                STORE_WRITE_BASE_DELAY,
                STORE_WRITE_MAX_DELAY,
                2.0,
            ),
        }
    }

    /// Replaces the backoff used when an archive's write finds the database
    /// locked.
    #[must_use]
    pub fn with_write_retry(mut self, policy: RetryPolicy) -> Self {
        self.write_retry = policy;
        self
    }

    /// Directory where archives are staged.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Fetches and ingests every request.
    pub async fn run(&self, requests: Vec<FetchRequest>) -> IngestReport {
        self.run_with_progress(requests, None).await
    }

    /// Like [`run`](Self::run), publishing fetch progress to `progress`.
    #[instrument(skip(self, requests, progress), fields(count = requests.len()))]
    pub async fn run_with_progress(
        &self,
        requests: Vec<FetchRequest>,
        progress: Option<ProgressSender>,
    ) -> IngestReport {
        if let Err(e) = tokio::fs::create_dir_all(&self.work_dir).await {
            warn!(dir = %self.work_dir.display(), error = %e, "failed to create work directory");
        }

        let outcomes = self
            .engine
            .fetch_all(&self.client, requests, &self.work_dir, progress)
            .await;

        let mut pending = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome.result {
                Ok(archive) => {
                    let store = self.store.clone();
                    let work_dir = self.work_dir.clone();
                    let write_retry = self.write_retry.clone();
                    let handle = tokio::spawn(async move {
                        ingest_archive(&store, &archive, &work_dir, &write_retry).await
                    });
                    pending.push((outcome.category, outcome.url, Ok(handle)));
                }
                Err(e) => pending.push((outcome.category, outcome.url, Err(IngestError::from(e)))),
            }
        }

        let mut report = IngestReport::default();
        for (category, url, spawned) in pending {
            let result = match spawned {
                Ok(handle) => match handle.await {
                    Ok(result) => result,
                    Err(join_error) => Err(IngestError::TaskPanicked {
                        message: join_error.to_string(),
                    }),
                },
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                warn!(%category, %url, error = %e, "archive not ingested");
            }
            report.archives.push(ArchiveReport {
                category,
                url,
                result,
            });
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "ingestion run complete"
        );
        report
    }

    /// Ingests a local archive or JSON file under `category`.
    ///
    /// The file is copied into the work directory first; the caller's file
    /// is left untouched.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn ingest_local(&self, path: &Path, category: &str) -> ArchiveReport {
        let result = self.stage_local(path).await;
        let result = match result {
            Ok(staged) => {
                let archive = FetchedArchive {
                    category: category.to_string(),
                    url: path.display().to_string(),
                    bytes: staged.1,
                    path: staged.0,
                };
                ingest_archive(&self.store, &archive, &self.work_dir, &self.write_retry).await
            }
            Err(e) => Err(e),
        };

        ArchiveReport {
            category: category.to_string(),
            url: path.display().to_string(),
            result,
        }
    }

    async fn stage_local(&self, path: &Path) -> Result<(PathBuf, u64), IngestError> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|source| IngestError::Io {
                path: self.work_dir.clone(),
                source,
            })?;

        let name = path
            .file_name()
            .map_or_else(|| "local".to_string(), |n| n.to_string_lossy().into_owned());
        let staged = self
            .work_dir
            .join(format!("local-{:08x}-{name}", rand::random::<u32>()));

        let bytes = tokio::fs::copy(path, &staged)
            .await
            .map_err(|source| IngestError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok((staged, bytes))
    }
}

/// Unpack → parse → upsert for one archive, in one store transaction.
#[instrument(skip_all, fields(category = %archive.category, path = %archive.path.display()))]
async fn ingest_archive(
    store: &CardStore,
    archive: &FetchedArchive,
    work_dir: &Path,
    write_retry: &RetryPolicy,
) -> Result<IngestSummary, IngestError> {
    let unpacked = unpack_archive(&archive.path, work_dir).await?;

    let result = async {
        let data_files = unpacked.data_files();
        if data_files.is_empty() {
            return Err(IngestError::NoDataFile {
                archive: archive.path.clone(),
            });
        }

        let mut combined = ParsedDataset::default();
        for file in &data_files {
            let parsed = parse_dataset_file(file).await?;
            combined.sets.extend(parsed.sets);
            combined.cards.extend(parsed.cards);
            combined.skipped.merge(parsed.skipped);
        }

        let written = upsert_when_unlocked(store, &combined, &archive.category, write_retry).await?;
        Ok(IngestSummary {
            data_files: data_files.len(),
            sets_written: written.sets_written,
            cards_written: written.cards_written,
            skipped: combined.skipped,
        })
    }
    .await;

    if let Err(e) = unpacked.cleanup().await {
        warn!(error = %e, "failed to remove extraction directory");
    }
    result
}

/// Runs the upsert, backing off while another writer holds the database.
async fn upsert_when_unlocked(
    store: &CardStore,
    dataset: &ParsedDataset,
    category: &str,
    policy: &RetryPolicy,
) -> Result<UpsertSummary, StoreError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let error = match store.upsert_dataset(dataset, category).await {
            Ok(summary) => return Ok(summary),
            Err(error) if error.is_busy_or_locked() => error,
            Err(error) => return Err(error),
        };

        match policy.decide(FailureClass::Transient, attempt) {
            RetryDecision::Retry { delay, attempt: next } => {
                warn!(
                    category,
                    attempt = next,
                    delay_ms = delay.as_millis(),
                    "database locked by another writer, retrying archive write"
                );
                tokio::time::sleep(delay).await;
            }
            RetryDecision::GiveUp { reason } => {
                warn!(category, %reason, "giving up on archive write");
                return Err(error);
            }
        }
    }
}
