use tokio::sync::mpsc;
use webinsight_core::{ProgressEvent, ProgressSink};

/// Channel-backed progress sink for streaming consumers (a UI, a log tail).
///
/// Delivery is best-effort: the pipeline never awaits acknowledgement, and a
/// closed receiver is silently ignored so a departed consumer can never
/// affect pipeline correctness.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgress {
    fn notify(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webinsight_core::ProgressStage;

    #[tokio::test]
    async fn delivers_events_in_order() {
        let (sink, mut rx) = ChannelProgress::new();
        sink.notify(ProgressEvent::new(ProgressStage::Search, "one"));
        sink.notify(ProgressEvent::new(ProgressStage::Extract, "two"));
        assert_eq!(rx.recv().await.unwrap().message, "one");
        assert_eq!(rx.recv().await.unwrap().message, "two");
    }

    #[tokio::test]
    async fn closed_receiver_is_ignored() {
        let (sink, rx) = ChannelProgress::new();
        drop(rx);
        // Must not panic or block.
        sink.notify(ProgressEvent::new(ProgressStage::Aggregate, "late"));
    }
}
