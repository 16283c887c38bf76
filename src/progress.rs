// src/progress.rs
//! Progress sinks. Reporting is advisory: a sink must never block or fail the run.

use tokio::sync::watch;

pub trait ProgressSink: Send + Sync {
    /// `percent` is already clamped to 0..=100.
    fn report(&self, percent: u8);
}

/// Discards every report.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _percent: u8) {}
}

/// Writes each report as a tracing event.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, percent: u8) {
        tracing::info!(target: "funnel::pipeline", percent, "progress");
    }
}

/// Publishes the latest value on a `watch` channel; a UI polls or awaits changes.
/// Sending never blocks and a dropped receiver is ignored.
pub struct WatchProgress {
    tx: watch::Sender<u8>,
}

impl WatchProgress {
    pub fn channel() -> (Self, watch::Receiver<u8>) {
        let (tx, rx) = watch::channel(0u8);
        (Self { tx }, rx)
    }
}

impl ProgressSink for WatchProgress {
    fn report(&self, percent: u8) {
        self.tx.send_replace(percent);
    }
}

pub(crate) fn report(sink: &dyn ProgressSink, percent: u32) {
    sink.report(percent.min(100) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_keeps_latest_and_survives_dropped_receiver() {
        let (sink, rx) = WatchProgress::channel();
        report(&sink, 25);
        report(&sink, 250);
        assert_eq!(*rx.borrow(), 100);
        drop(rx);
        sink.report(50);
    }
}
