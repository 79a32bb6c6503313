//! Change feed listener.
//!
//! Every notice on the room's feed is a wake-up call for its cache; payloads
//! are never inspected. Reconnection is the transport's job, the listener
//! only refetches once the transport reports it is back. If the feed closes
//! for good, the cache's view reports the room as unavailable.

use std::sync::Arc;

use agora_shared::backend::{ChangeFeed, FeedSubscription};
use agora_shared::{BackendError, FeedNotice, FeedTopic};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::MessageCache;
use crate::error::{Result, SyncError};

/// Owns the listening task. Dropping it closes the subscription.
pub struct ChangeListener {
    task: JoinHandle<()>,
}

impl ChangeListener {
    /// Subscribe to `topic` and start forwarding notices to `cache`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(feed: &dyn ChangeFeed, topic: FeedTopic, cache: Arc<MessageCache>) -> Result<Self> {
        let subscription = feed.subscribe(topic).map_err(SyncError::StoreUnavailable)?;
        debug!(
            room = %cache.room(),
            table = %subscription.topic().table,
            "change listener started"
        );
        let task = tokio::spawn(listen(subscription, cache));
        Ok(Self { task })
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ChangeListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn listen(mut subscription: FeedSubscription, cache: Arc<MessageCache>) {
    let mut disconnected = false;

    while let Some(notice) = subscription.next().await {
        match notice {
            FeedNotice::Change(_) => cache.invalidate(),
            FeedNotice::Missed(skipped) => {
                warn!(room = %cache.room(), skipped, "change feed lagged, refetching");
                cache.invalidate();
            }
            FeedNotice::Disconnected => {
                info!(room = %cache.room(), "change feed disconnected");
                disconnected = true;
            }
            FeedNotice::Reconnected => {
                info!(room = %cache.room(), "change feed reconnected");
                if std::mem::take(&mut disconnected) {
                    cache.invalidate();
                }
            }
        }
    }

    warn!(room = %cache.room(), "change feed closed, listener stopped");
    cache.report_failure(SyncError::StoreUnavailable(BackendError::unavailable(
        "change feed closed",
    )));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::fakes::{eventually, FakeBackend};
    use agora_shared::constants::MESSAGES_TABLE;
    use agora_shared::RoomId;

    fn setup() -> (Arc<FakeBackend>, Arc<MessageCache>) {
        let fake = FakeBackend::new();
        let cache = MessageCache::new(
            RoomId::community(),
            fake.clone(),
            fake.clone(),
            &SyncConfig::default(),
        );
        (fake, cache)
    }

    #[tokio::test]
    async fn any_change_triggers_refetch() {
        let (fake, cache) = setup();
        let _listener =
            ChangeListener::spawn(&*fake, FeedTopic::all(MESSAGES_TABLE), cache.clone())
                .unwrap();

        fake.push_row("a1", "written elsewhere");
        fake.notify_change();

        eventually(|| cache.snapshot().map(|s| s.len()) == Some(1)).await;
        assert_eq!(fake.fetches(), 1);
    }

    #[tokio::test]
    async fn reconnect_after_disconnect_refetches_once() {
        let (fake, cache) = setup();
        let _listener =
            ChangeListener::spawn(&*fake, FeedTopic::all(MESSAGES_TABLE), cache.clone())
                .unwrap();

        // Reconnected without a prior disconnect is ignored.
        fake.notify(FeedNotice::Reconnected);
        fake.notify(FeedNotice::Disconnected);
        fake.push_row("a1", "missed while offline");
        fake.notify(FeedNotice::Reconnected);

        eventually(|| cache.snapshot().is_some()).await;
        cache.settled().await;
        assert_eq!(fake.fetches(), 1);
        assert_eq!(cache.snapshot().map(|s| s.len()), Some(1));
    }

    #[tokio::test]
    async fn missed_notices_trigger_refetch() {
        let (fake, cache) = setup();
        let _listener =
            ChangeListener::spawn(&*fake, FeedTopic::all(MESSAGES_TABLE), cache.clone())
                .unwrap();

        fake.push_row("a1", "announced in a dropped notice");
        fake.notify(FeedNotice::Missed(7));

        eventually(|| cache.snapshot().map(|s| s.len()) == Some(1)).await;
        assert_eq!(fake.fetches(), 1);
    }

    #[tokio::test]
    async fn feed_burst_during_refetch_runs_one_follow_up() {
        let (fake, cache) = setup();
        let _listener =
            ChangeListener::spawn(&*fake, FeedTopic::all(MESSAGES_TABLE), cache.clone())
                .unwrap();

        let release = fake.hold_next_fetch();
        fake.notify_change();
        eventually(|| fake.fetches() == 1).await;

        for _ in 0..20 {
            fake.notify_change();
        }
        fake.push_row("a1", "arrived meanwhile");
        // Every notice has reached the listener before the fetch completes.
        eventually(|| fake.backlog() == 0).await;
        release.send(()).unwrap();

        let view = cache.settled().await;
        assert_eq!(fake.fetches(), 2);
        assert_eq!(view.messages.map(|s| s.len()), Some(1));
    }

    #[tokio::test]
    async fn closed_feed_is_reported_in_view() {
        let (fake, cache) = setup();
        let listener =
            ChangeListener::spawn(&*fake, FeedTopic::all(MESSAGES_TABLE), cache.clone())
                .unwrap();

        fake.close_feed();

        eventually(|| !listener.is_running()).await;
        assert!(matches!(
            cache.view().error,
            Some(SyncError::StoreUnavailable(BackendError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn dropping_listener_closes_subscription() {
        let (fake, cache) = setup();
        let listener =
            ChangeListener::spawn(&*fake, FeedTopic::all(MESSAGES_TABLE), cache).unwrap();
        assert_eq!(fake.subscribers(), 1);
        assert!(listener.is_running());

        drop(listener);
        eventually(|| fake.subscribers() == 0).await;
    }

    #[tokio::test]
    async fn subscribe_failure_is_store_unavailable() {
        let (fake, cache) = setup();
        fake.fail_reads(true);
        let err = ChangeListener::spawn(&*fake, FeedTopic::all(MESSAGES_TABLE), cache)
            .err()
            .unwrap();
        assert!(matches!(err, SyncError::StoreUnavailable(_)));
    }
}
