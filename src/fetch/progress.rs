//! Fire-and-forget progress reporting for archive fetches.
//!
//! Progress flows over a bounded channel. Senders only ever call `try_send`,
//! so a slow or absent consumer drops events instead of stalling a transfer.

use tokio::sync::mpsc;
use tracing::trace;

/// Default channel capacity for [`progress_channel`].
pub const DEFAULT_PROGRESS_CAPACITY: usize = 256;

/// What happened to one fetch item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Response headers received; `total` is the Content-Length when known.
    Started {
        /// Expected body size.
        total: Option<u64>,
    },
    /// More bytes were written to disk.
    Advanced {
        /// Bytes written so far.
        bytes: u64,
        /// Expected body size.
        total: Option<u64>,
    },
    /// Body fully written.
    Finished {
        /// Final size on disk.
        bytes: u64,
    },
    /// The item failed (after retries).
    Failed {
        /// Error text.
        reason: String,
    },
}

/// A progress update for the item at `index` in the fetch batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchProgress {
    /// Position of the item in the submitted batch.
    pub index: usize,
    /// Category of the item (e.g. `AllPrintings`).
    pub category: String,
    /// The update itself.
    pub event: ProgressEvent,
}

/// Sending half handed to the fetch engine.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<FetchProgress>,
}

impl ProgressSender {
    /// Publishes an update without waiting. Full or closed channels drop it.
    pub fn publish(&self, index: usize, category: &str, event: ProgressEvent) {
        let update = FetchProgress {
            index,
            category: category.to_string(),
            event,
        };
        if let Err(error) = self.tx.try_send(update) {
            trace!(index, %error, "progress update dropped");
        }
    }
}

/// Creates a bounded progress channel.
#[must_use]
pub fn progress_channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<FetchProgress>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSender { tx }, rx)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_delivered_in_order() {
        let (sender, mut rx) = progress_channel(8);
        sender.publish(0, "AllPrintings", ProgressEvent::Started { total: Some(10) });
        sender.publish(0, "AllPrintings", ProgressEvent::Finished { bytes: 10 });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, ProgressEvent::Started { total: Some(10) });
        let second = rx.recv().await.unwrap();
        assert_eq!(second.event, ProgressEvent::Finished { bytes: 10 });
    }

    #[test]
    fn test_publish_on_full_channel_does_not_block() {
        let (sender, _rx) = progress_channel(1);
        for bytes in 0..100 {
            sender.publish(0, "Full", ProgressEvent::Advanced { bytes, total: None });
        }
    }

    #[test]
    fn test_publish_on_closed_channel_is_ignored() {
        let (sender, rx) = progress_channel(4);
        drop(rx);
        sender.publish(3, "Closed", ProgressEvent::Finished { bytes: 1 });
    }
}
