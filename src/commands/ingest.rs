//! Ingest command handler: fetch, unpack and load archives.

use anyhow::{Context, Result, bail};
use mtgdb_core::fetch::{FetchEngine, FetchRequest, HttpClient, RetryPolicy};
use mtgdb_core::pipeline::{IngestPipeline, IngestReport};
use mtgdb_core::store::{CardStore, LinkRegistry};
use tracing::info;

use super::open_database;
use crate::ProcessExit;
use crate::app::config_runtime::Settings;
use crate::app::{exit_handler, progress_manager};
use crate::cli::IngestArgs;

const LOCAL_CATEGORY: &str = "Local";

pub(crate) async fn run_ingest_command(
    args: &IngestArgs,
    settings: &Settings,
    use_progress_bars: bool,
) -> Result<ProcessExit> {
    let db = open_database(settings).await?;
    let store = CardStore::new(db.clone());

    let engine = FetchEngine::new(
        settings.concurrency,
        RetryPolicy::with_max_attempts(settings.max_retries),
    )?;
    let client =
        HttpClient::new_with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs);
    let pipeline = IngestPipeline::new(store, engine, client, &settings.work_dir);

    let report = if let Some(file) = &args.file {
        let category = args
            .category
            .first()
            .map_or(LOCAL_CATEGORY, String::as_str);
        IngestReport {
            archives: vec![pipeline.ingest_local(file, category).await],
        }
    } else {
        let requests = if args.registry {
            let links = LinkRegistry::new(db)
                .list()
                .await
                .context("Failed to read link registry")?;
            if links.is_empty() {
                bail!(
                    "Link registry is empty\n  Suggestion: Import links first with `mtgdb links import <file>`"
                );
            }
            links.iter().map(mtgdb_core::store::Link::to_fetch_request).collect()
        } else {
            build_url_requests(&args.url, &args.category)?
        };

        info!(archives = requests.len(), work_dir = %settings.work_dir.display(), "Starting ingestion");
        let (progress, ui_handle) = progress_manager::spawn_progress_ui(use_progress_bars);
        let report = pipeline.run_with_progress(requests, progress).await;
        progress_manager::finish_progress_ui(ui_handle).await;
        report
    };

    print_report(&report);
    Ok(exit_handler::ingest_exit(&report))
}

/// Pairs `--url` values with `--category` values in order.
///
/// URLs without an explicit category use the archive file stem.
fn build_url_requests(urls: &[String], categories: &[String]) -> Result<Vec<FetchRequest>> {
    if categories.len() > urls.len() {
        bail!(
            "Got {} --category values for {} --url values\n  Suggestion: Pass at most one --category per --url",
            categories.len(),
            urls.len()
        );
    }

    Ok(urls
        .iter()
        .enumerate()
        .map(|(index, url)| {
            let category = categories
                .get(index)
                .cloned()
                .unwrap_or_else(|| category_from_url(url));
            FetchRequest::new(category, url)
        })
        .collect())
}

/// `https://host/api/v5/AllPrintings.json.zip` → `AllPrintings`.
fn category_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|last| last.split('.').next().map(str::to_string))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| LOCAL_CATEGORY.to_string())
}

fn print_report(report: &IngestReport) {
    for archive in &report.archives {
        match &archive.result {
            Ok(summary) => println!(
                "ok     {:<20} {} sets, {} cards ({} skipped)",
                archive.category,
                summary.sets_written,
                summary.cards_written,
                summary.skipped.total()
            ),
            Err(error) => println!("failed {:<20} {error}", archive.category),
        }
    }

    let totals = report.totals();
    println!(
        "{} of {} archives ingested: {} sets, {} cards written, {} records skipped",
        report.succeeded(),
        report.archives.len(),
        totals.sets_written,
        totals.cards_written,
        totals.skipped.total()
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_url_uses_file_stem() {
        assert_eq!(
            category_from_url("https://mtgjson.com/api/v5/AllPrintings.json.zip"),
            "AllPrintings"
        );
        assert_eq!(category_from_url("https://example.com/"), LOCAL_CATEGORY);
        assert_eq!(category_from_url("not a url"), LOCAL_CATEGORY);
    }

    #[test]
    fn test_build_url_requests_pairs_in_order() {
        let urls = vec![
            "https://a.test/One.json.zip".to_string(),
            "https://b.test/Two.zip".to_string(),
        ];
        let requests = build_url_requests(&urls, &["Custom".to_string()]).unwrap();

        assert_eq!(requests[0].category, "Custom");
        assert_eq!(requests[1].category, "Two");
        assert_eq!(requests[1].url, "https://b.test/Two.zip");
    }

    #[test]
    fn test_build_url_requests_rejects_extra_categories() {
        let urls = vec!["https://a.test/One.zip".to_string()];
        let categories = vec!["A".to_string(), "B".to_string()];
        assert!(build_url_requests(&urls, &categories).is_err());
    }
}
