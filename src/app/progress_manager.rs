//! Progress UI (one bar per archive) for ingestion runs.

use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use mtgdb_core::fetch::{
    DEFAULT_PROGRESS_CAPACITY, FetchProgress, ProgressEvent, ProgressSender, progress_channel,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Spawns the progress UI when requested.
///
/// Returns the sender to hand to the pipeline and the UI task handle. The
/// task ends once every sender clone is dropped. When `use_bars` is false,
/// returns `(None, None)`.
pub(crate) fn spawn_progress_ui(
    use_bars: bool,
) -> (Option<ProgressSender>, Option<JoinHandle<()>>) {
    if !use_bars {
        return (None, None);
    }
    let (sender, receiver) = progress_channel(DEFAULT_PROGRESS_CAPACITY);
    let handle = tokio::spawn(render_progress(receiver, MultiProgress::new()));
    (Some(sender), Some(handle))
}

/// Waits for the UI task to drain; a crashed task is logged, not propagated.
pub(crate) async fn finish_progress_ui(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else {
        return;
    };
    if let Err(error) = handle.await {
        warn!(%error, "progress display task failed");
    }
}

async fn render_progress(mut receiver: mpsc::Receiver<FetchProgress>, multi: MultiProgress) {
    let mut bars: HashMap<usize, ProgressBar> = HashMap::new();

    while let Some(update) = receiver.recv().await {
        let bar = bars
            .entry(update.index)
            .or_insert_with(|| new_bar(&multi, &update.category));

        match update.event {
            ProgressEvent::Started { total } => {
                if let Some(total) = total {
                    bar.set_length(total);
                }
                bar.set_position(0);
            }
            ProgressEvent::Advanced { bytes, total } => {
                if let Some(total) = total {
                    bar.set_length(total);
                }
                bar.set_position(bytes);
            }
            ProgressEvent::Finished { bytes } => {
                bar.set_length(bytes);
                bar.finish_with_message(format!("{} done", update.category));
            }
            ProgressEvent::Failed { reason } => {
                bar.abandon_with_message(format!("{} failed: {reason}", update.category));
            }
        }
    }

    for bar in bars.values() {
        if !bar.is_finished() {
            bar.finish_and_clear();
        }
    }
}

fn new_bar(multi: &MultiProgress, category: &str) -> ProgressBar {
    let bar = multi.add(ProgressBar::new(0));
    bar.set_style(
        ProgressStyle::with_template("{msg:20} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message(category.to_string());
    bar
}
