//! Constants for the fetch module (timeouts, concurrency bounds).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default overall request timeout (10 minutes; `AllPrintings` is several hundred MB).
pub const READ_TIMEOUT_SECS: u64 = 600;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 32;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Bytes between two `Advanced` progress events for one transfer.
pub(crate) const PROGRESS_STEP_BYTES: u64 = 512 * 1024;
