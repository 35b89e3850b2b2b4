//! How an ingestion run ends the process.

use mtgdb_core::pipeline::IngestReport;

use crate::ProcessExit;

/// Every archive stored is a success, none stored is a failure, anything in
/// between is partial. A run with no archives has nothing to report as failed.
pub(crate) fn ingest_exit(report: &IngestReport) -> ProcessExit {
    match (report.succeeded(), report.failed()) {
        (_, 0) => ProcessExit::Success,
        (0, _) => ProcessExit::Failure,
        _ => ProcessExit::Partial,
    }
}
