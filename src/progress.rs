use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Interval between progress refreshes.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

const PROGRESS_TEMPLATE: &str = "[Progress] {pos}/{len} ports ({percent}%)";

/// Completion counter shared by every probe task of one scan.
#[derive(Clone, Debug, Default)]
pub struct ProgressState {
    completed: Arc<AtomicUsize>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished probe and return the new count.
    pub fn record(&self) -> usize {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}

/// Periodically copies the completion counter into a progress bar on stderr until stopped.
///
/// Only reads the shared counter, so it never contends with probe tasks.
pub struct ProgressReporter {
    bar: ProgressBar,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn start(state: ProgressState, total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        Self::start_with_bar(state, bar, PROGRESS_INTERVAL)
    }

    pub fn start_with_bar(state: ProgressState, bar: ProgressBar, every: Duration) -> Self {
        if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            bar.set_style(style);
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let pb = bar.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => pb.set_position(state.completed() as u64),
                }
            }
        });
        Self {
            bar,
            cancel,
            handle,
        }
    }

    /// Stop refreshing and leave the last drawn readout, which may be stale.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
        self.bar.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;

    fn hidden_bar(len: u64) -> ProgressBar {
        ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::hidden())
    }

    #[test]
    fn counter_is_shared_between_clones() {
        let a = ProgressState::new();
        let b = a.clone();
        assert_eq!(a.record(), 1);
        assert_eq!(b.record(), 2);
        assert_eq!(a.completed(), 2);
    }

    #[tokio::test]
    async fn bar_follows_counter() {
        let state = ProgressState::new();
        let bar = hidden_bar(10);
        let reporter =
            ProgressReporter::start_with_bar(state.clone(), bar.clone(), Duration::from_millis(5));
        state.record();
        state.record();
        state.record();
        time::sleep(Duration::from_millis(30)).await;
        assert_eq!(bar.position(), 3);
        assert_eq!(bar.length(), Some(10));
        reporter.stop().await;
        assert!(bar.is_finished());
    }

    #[tokio::test]
    async fn reporter_stops_promptly() {
        let state = ProgressState::new();
        let reporter =
            ProgressReporter::start_with_bar(state.clone(), hidden_bar(10), Duration::from_millis(5));
        state.record();
        time::sleep(Duration::from_millis(20)).await;
        time::timeout(Duration::from_secs(1), reporter.stop())
            .await
            .expect("reporter stop should not hang");
    }
}
