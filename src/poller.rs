
use std::{
    sync::{Arc, atomic::{AtomicU64, Ordering}},
    time::Duration,
};
use chrono::Local;
use tokio::{
    spawn,
    sync::{oneshot, watch},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info, warn};

use crate::{config::MIN_POLL_INTERVAL_MS, download_client::DownloadSource, models::ViewState};

/// Keeps a [`ViewState`] up to date by polling a [`DownloadSource`].</br>
/// Cloning is cheap and every clone drives the same state.
/// # Example
/// ```
/// # use kafkasync_dashboard::download_client::DownloadSource;
/// # use kafkasync_dashboard::error::FetchError;
/// # use kafkasync_dashboard::models::DownloadRecord;
/// # use kafkasync_dashboard::poller::Poller;
/// # use std::time::Duration;
/// # struct Nothing;
/// # impl DownloadSource for Nothing {
/// #     async fn fetch_downloads(&self) -> Result<Vec<DownloadRecord>, FetchError> { Ok(vec![]) }
/// # }
/// # tokio_test::block_on(async {
/// let poller = Poller::new(Nothing, Duration::from_secs(2));
/// poller.fetch_once().await;
///
/// let state = poller.subscribe();
/// assert!(!state.borrow().is_loading);
/// # })
/// ```
pub struct Poller<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    source: S,
    interval: Duration,
    state: watch::Sender<ViewState>,
    /// Last sequence number handed out to a fetch.
    issued: AtomicU64,
}

impl<S> Clone for Poller<S> {
    fn clone(&self) -> Self {
        return Self { inner: Arc::clone(&self.inner) };
    }
}

impl<S: DownloadSource> Poller<S> {

    /// Intervals below [`MIN_POLL_INTERVAL_MS`] are raised to it.
    pub fn new(source: S, interval: Duration) -> Self {
        let floor = Duration::from_millis(MIN_POLL_INTERVAL_MS);
        if interval < floor {
            warn!(
                requested_ms = interval.as_millis() as u64,
                min_ms = MIN_POLL_INTERVAL_MS,
                "poll interval raised to minimum"
            );
        }
        let (state, _) = watch::channel(ViewState::default());
        return Self {
            inner: Arc::new(Inner {
                source,
                interval: interval.max(floor),
                state,
                issued: AtomicU64::new(0),
            }),
        };
    }

    pub fn interval(&self) -> Duration {
        return self.inner.interval;
    }

    /// Receiver that observes every applied update.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        return self.inner.state.subscribe();
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ViewState {
        return self.inner.state.borrow().clone();
    }

    /// Number of fetches started so far.
    pub fn fetches_issued(&self) -> u64 {
        return self.inner.issued.load(Ordering::SeqCst);
    }

    /// Fetches once and applies the outcome as a single state update.</br>
    /// Returns `false` if a fetch issued after this one was applied first; the outcome is then dropped.
    pub async fn fetch_once(&self) -> bool {
        let seq = self.inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self.inner.source.fetch_downloads().await;

        if let Err(e) = &outcome {
            error!(seq, error = %e, status = ?e.status(), "failed to fetch downloads");
        }

        let applied = self.inner.state.send_if_modified(|state| state.apply(seq, &outcome, Local::now()));
        if applied {
            debug!(seq, ok = outcome.is_ok(), "applied fetch");
        } else {
            debug!(seq, "discarded stale fetch");
        }
        return applied;
    }

    /// Manual retry, outside the timer cadence.
    pub fn retry(&self) -> JoinHandle<bool> {
        info!("manual retry requested");
        let poller = self.clone();
        return spawn(async move { poller.fetch_once().await });
    }

    /// Fetches immediately and then once per interval until the handle is stopped or dropped.</br>
    /// Ticks never wait for an earlier fetch, so slow responses may overlap.
    pub fn start(&self) -> PollHandle {
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        let poller = self.clone();

        let task = spawn(async move {
            let mut ticker = interval(poller.inner.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = poller.inner.interval.as_millis() as u64, "polling started");

            loop {
                tokio::select! {
                    _ = &mut kill_rx => break,
                    _ = ticker.tick() => {
                        let poller = poller.clone();
                        spawn(async move { poller.fetch_once().await });
                    }
                }
            }
            info!("polling stopped");
        });

        return PollHandle { kill_switch: Some(kill_tx), task: Some(task) };
    }
}

/// Owns the recurring poll. Dropping it stops the timer as well.
#[derive(Debug)]
pub struct PollHandle {
    /// Stops the ticker
    kill_switch: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Stops future ticks and waits for the ticker to exit.</br>
    /// Fetches that are already in flight still complete.
    pub async fn stop(mut self) {
        if let Some(kill_switch) = self.kill_switch.take() {
            let _ = kill_switch.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "poll task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        return self.task.as_ref().is_some_and(|task| !task.is_finished());
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(kill_switch) = self.kill_switch.take() {
            let _ = kill_switch.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::FetchError,
        models::{CONNECTION_ERROR_MESSAGE, DownloadRecord, DownloadStatus},
    };
    use reqwest::StatusCode;
    use std::{collections::VecDeque, sync::{Mutex, atomic::AtomicUsize}};
    use tokio::time::sleep;

    fn record(id: i64) -> DownloadRecord {
        DownloadRecord {
            id,
            filename: format!("file-{id}"),
            hash: None,
            remote_location: format!("/srv/file-{id}"),
            status: DownloadStatus::Completed,
            downloaded_at: None,
        }
    }

    /// Serves scripted responses in order, each after its own delay.</br>
    /// Once the script runs out every call fails with a 500.
    #[derive(Default)]
    struct ScriptedSource {
        script: Mutex<VecDeque<(Duration, Option<Vec<DownloadRecord>>)>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn with(script: Vec<(Duration, Option<Vec<DownloadRecord>>)>) -> Self {
            Self { script: Mutex::new(script.into()), calls: AtomicUsize::new(0) }
        }
    }

    impl DownloadSource for ScriptedSource {
        async fn fetch_downloads(&self) -> Result<Vec<DownloadRecord>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some((delay, records)) => {
                    sleep(delay).await;
                    records.ok_or(FetchError::Status { status: StatusCode::BAD_GATEWAY })
                }
                None => Err(FetchError::Status { status: StatusCode::INTERNAL_SERVER_ERROR }),
            }
        }
    }

    fn calls(poller: &Poller<ScriptedSource>) -> usize {
        poller.inner.source.calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_fetch_once_success() {
        let records = vec![record(2), record(1)];
        let poller = Poller::new(
            ScriptedSource::with(vec![(Duration::ZERO, Some(records.clone()))]),
            Duration::from_secs(2),
        );
        assert!(poller.snapshot().is_loading);

        assert!(poller.fetch_once().await);
        let state = poller.snapshot();
        assert_eq!(state.records, records);
        assert_eq!(state.last_error, None);
        assert!(!state.is_loading);
        assert_eq!(state.applied_seq(), 1);
    }

    #[tokio::test]
    async fn test_fetch_once_failure_keeps_records() {
        let records = vec![record(1)];
        let poller = Poller::new(
            ScriptedSource::with(vec![(Duration::ZERO, Some(records.clone())), (Duration::ZERO, None)]),
            Duration::from_secs(2),
        );
        poller.fetch_once().await;
        let first_update = poller.snapshot().last_updated;

        assert!(poller.fetch_once().await);
        let state = poller.snapshot();
        assert_eq!(state.records, records);
        assert_eq!(state.last_error.as_deref(), Some(CONNECTION_ERROR_MESSAGE));
        assert!(!state.is_loading);
        assert!(state.last_updated >= first_update);
    }

    #[tokio::test]
    async fn test_subscriber_sees_update() {
        let poller = Poller::new(ScriptedSource::default(), Duration::from_secs(2));
        let mut rx = poller.subscribe();
        poller.fetch_once().await;
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_older_response_is_discarded() {
        let poller = Poller::new(
            ScriptedSource::with(vec![
                (Duration::from_secs(5), Some(vec![record(1)])),
                (Duration::from_millis(10), Some(vec![record(2)])),
            ]),
            Duration::from_secs(2),
        );

        let (old, new) = tokio::join!(poller.fetch_once(), async {
            sleep(Duration::from_millis(1)).await;
            poller.fetch_once().await
        });
        assert!(new);
        assert!(!old);
        assert_eq!(poller.snapshot().records, vec![record(2)]);
        assert_eq!(poller.snapshot().applied_seq(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fetches_immediately_then_every_interval() {
        let poller = Poller::new(ScriptedSource::default(), Duration::from_millis(2000));
        let handle = poller.start();

        sleep(Duration::from_millis(100)).await;
        assert_eq!(calls(&poller), 1);
        assert!(!poller.snapshot().is_loading);

        sleep(Duration::from_millis(4000)).await;
        assert_eq!(calls(&poller), 3);

        assert!(handle.is_running());
        handle.stop().await;
        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls(&poller), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let poller = Poller::new(ScriptedSource::default(), Duration::ZERO);
        assert_eq!(poller.interval(), Duration::from_millis(MIN_POLL_INTERVAL_MS));

        let handle = poller.start();
        sleep(Duration::from_millis(50)).await;
        assert!(handle.is_running());
        assert_eq!(calls(&poller), 1);
        assert!(!poller.snapshot().is_loading);

        sleep(Duration::from_millis(MIN_POLL_INTERVAL_MS)).await;
        assert_eq!(calls(&poller), 2);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_polling() {
        let poller = Poller::new(ScriptedSource::default(), Duration::from_millis(2000));
        let handle = poller.start();
        sleep(Duration::from_millis(100)).await;
        drop(handle);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls(&poller), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_retry_is_one_extra_fetch() {
        let poller = Poller::new(ScriptedSource::default(), Duration::from_millis(2000));
        let handle = poller.start();

        sleep(Duration::from_millis(100)).await;
        assert_eq!(calls(&poller), 1);
        assert!(poller.snapshot().last_error.is_some());

        assert!(poller.retry().await.unwrap());
        assert_eq!(calls(&poller), 2);
        assert_eq!(poller.fetches_issued(), 2);
        assert_eq!(poller.snapshot().applied_seq(), 2);

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(calls(&poller), 2);

        handle.stop().await;
    }
}
