use crate::api::transcription::RemotePage;
use crate::api::{ApiClient, ApiError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Server value meaning the presenter has no live session.
pub const NO_ACTIVE_SESSION: i64 = -1;

/// Where the presenter's current slide is published and read back.
#[async_trait]
pub trait PageIndexChannel: Send + Sync {
    async fn publish(&self, lecture_id: &str, index: i64) -> Result<(), ApiError>;
    async fn fetch(&self, lecture_id: &str) -> Result<RemotePage, ApiError>;
}

#[async_trait]
impl PageIndexChannel for ApiClient {
    async fn publish(&self, lecture_id: &str, index: i64) -> Result<(), ApiError> {
        self.set_current_page_index(lecture_id, index).await
    }

    async fn fetch(&self, lecture_id: &str) -> Result<RemotePage, ApiError> {
        self.current_page_index(lecture_id).await
    }
}

/// Teacher side. Publishing is fire-and-forget: failures are logged only.
pub struct PagePublisher<C: ?Sized> {
    channel: Arc<C>,
    lecture_id: String,
}

impl<C: PageIndexChannel + ?Sized> PagePublisher<C> {
    pub fn new(channel: Arc<C>, lecture_id: impl Into<String>) -> Self {
        Self {
            channel,
            lecture_id: lecture_id.into(),
        }
    }

    /// `page` is 1-based; the server stores a 0-based index.
    pub async fn page_changed(&self, page: u32) -> bool {
        let index = i64::from(page.max(1)) - 1;
        match self.channel.publish(&self.lecture_id, index).await {
            Ok(()) => {
                log::debug!("Published page index {} for {}", index, self.lecture_id);
                true
            }
            Err(e) => {
                log::warn!("Failed to publish page index {}: {}", index, e);
                false
            }
        }
    }
}

/// A page change the student view should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PageJump {
    /// 1-based page to display.
    pub page: u32,
}

/// Student side reconciliation of polled indexes against the displayed page.
///
/// Only the staleness state lives here; the displayed page and page count are
/// passed in on every poll so local navigation is always taken into account.
#[derive(Debug, Clone, Default)]
pub struct PageFollower {
    last_sequence: Option<u64>,
}

impl PageFollower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile(
        &mut self,
        remote: RemotePage,
        displayed_page: u32,
        page_count: u32,
    ) -> Option<PageJump> {
        if remote.index == NO_ACTIVE_SESSION {
            return None;
        }
        if let Some(seq) = remote.sequence {
            if self.last_sequence.is_some_and(|last| seq <= last) {
                log::debug!("Dropping stale page update (sequence {})", seq);
                return None;
            }
            self.last_sequence = Some(seq);
        }
        if remote.index < 0 || remote.index >= i64::from(page_count) {
            return None;
        }
        let page = u32::try_from(remote.index + 1).ok()?;
        if page == displayed_page {
            return None;
        }
        Some(PageJump { page })
    }
}

/// Handle to the polling task. Dropping it stops the loop.
pub struct FollowerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FollowerHandle {
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.task.take();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for FollowerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Poll the presenter's page every `interval` and forward each answer on
/// `polls`. The receiver reconciles it against the page it displays. The loop
/// ends on cancellation or when the receiver goes away.
pub fn spawn_follower<C>(
    channel: Arc<C>,
    lecture_id: String,
    interval: Duration,
    polls: mpsc::UnboundedSender<RemotePage>,
) -> FollowerHandle
where
    C: PageIndexChannel + ?Sized + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let remote = tokio::select! {
                _ = token.cancelled() => break,
                res = channel.fetch(&lecture_id) => res,
            };
            match remote {
                Ok(remote) => {
                    if polls.send(remote).is_err() {
                        break;
                    }
                }
                Err(e) => log::debug!("Page poll failed for {}: {}", lecture_id, e),
            }
        }
        log::debug!("Page follower for {} stopped", lecture_id);
    });

    FollowerHandle {
        cancel,
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeChannel {
        published: Mutex<Vec<i64>>,
        replies: Mutex<VecDeque<RemotePage>>,
        fetches: Mutex<usize>,
        fail_publish: bool,
    }

    #[async_trait]
    impl PageIndexChannel for FakeChannel {
        async fn publish(&self, _lecture_id: &str, index: i64) -> Result<(), ApiError> {
            if self.fail_publish {
                return Err(ApiError::Api {
                    status: 500,
                    message: "down".into(),
                });
            }
            self.published.lock().unwrap().push(index);
            Ok(())
        }

        async fn fetch(&self, _lecture_id: &str) -> Result<RemotePage, ApiError> {
            *self.fetches.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ApiError::Parse("no reply queued".into()))
        }
    }

    fn page(index: i64) -> RemotePage {
        RemotePage {
            index,
            sequence: None,
        }
    }

    #[test]
    fn test_follower_ignores_sentinel() {
        let mut follower = PageFollower::new();
        assert_eq!(follower.reconcile(page(NO_ACTIVE_SESSION), 3, 10), None);
    }

    #[test]
    fn test_follower_bounds_and_same_page() {
        let mut follower = PageFollower::new();
        assert_eq!(follower.reconcile(page(0), 1, 5), None);
        assert_eq!(follower.reconcile(page(5), 1, 5), None);
        assert_eq!(follower.reconcile(page(-4), 1, 5), None);
        assert_eq!(follower.reconcile(page(4), 1, 5), Some(PageJump { page: 5 }));
        assert_eq!(follower.reconcile(page(4), 5, 5), None);
    }

    #[test]
    fn test_follower_compares_against_displayed_page() {
        let mut follower = PageFollower::new();
        assert_eq!(follower.reconcile(page(2), 1, 10), Some(PageJump { page: 3 }));
        // The student browsed to page 5; the presenter is still on page 3.
        assert_eq!(follower.reconcile(page(2), 5, 10), Some(PageJump { page: 3 }));
        // Page count not known yet, then known.
        assert_eq!(follower.reconcile(page(6), 1, 0), None);
        assert_eq!(follower.reconcile(page(6), 1, 12), Some(PageJump { page: 7 }));
    }

    #[test]
    fn test_follower_rejects_stale_sequences() {
        let mut follower = PageFollower::new();
        let at = |index, seq| RemotePage {
            index,
            sequence: Some(seq),
        };
        assert_eq!(follower.reconcile(at(3, 7), 1, 10), Some(PageJump { page: 4 }));
        assert_eq!(follower.reconcile(at(1, 6), 4, 10), None);
        assert_eq!(follower.reconcile(at(1, 7), 4, 10), None);
        assert_eq!(follower.reconcile(at(1, 8), 4, 10), Some(PageJump { page: 2 }));
        // Without a sequence the newest poll wins.
        assert_eq!(follower.reconcile(page(5), 2, 10), Some(PageJump { page: 6 }));
    }

    #[tokio::test]
    async fn test_publisher_converts_to_zero_based() {
        let channel = Arc::new(FakeChannel::default());
        let publisher = PagePublisher::new(channel.clone(), "l1");
        assert!(publisher.page_changed(1).await);
        assert!(publisher.page_changed(7).await);
        assert_eq!(*channel.published.lock().unwrap(), vec![0, 6]);
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let channel = Arc::new(FakeChannel {
            fail_publish: true,
            ..FakeChannel::default()
        });
        let publisher = PagePublisher::new(channel, "l1");
        assert!(!publisher.page_changed(2).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_follower_polls_and_stops() {
        let channel = Arc::new(FakeChannel::default());
        channel
            .replies
            .lock()
            .unwrap()
            .extend([page(-1), page(2), page(2), page(0)]);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = spawn_follower(channel.clone(), "l1".into(), Duration::from_secs(1), tx);

        let mut follower = PageFollower::new();
        let mut displayed = 1;
        let mut jumps = Vec::new();
        for _ in 0..4 {
            let remote = rx.recv().await.unwrap();
            if let Some(jump) = follower.reconcile(remote, displayed, 10) {
                displayed = jump.page;
                jumps.push(jump.page);
            }
        }
        assert_eq!(jumps, vec![3, 1]);

        handle.stop();
        assert!(!handle.is_running());
        let polled = *channel.fetches.lock().unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*channel.fetches.lock().unwrap(), polled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels_loop() {
        let channel = Arc::new(FakeChannel::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = spawn_follower(channel.clone(), "l1".into(), Duration::from_secs(1), tx);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        drop(handle);
        let polled = *channel.fetches.lock().unwrap();
        assert!(polled >= 2);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(*channel.fetches.lock().unwrap(), polled);
    }
}
