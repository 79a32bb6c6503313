//! Async backend over the local database.
//!
//! [`LocalBackend`] plays the hosted database: it serves the message and
//! profile tables through the `agora_shared` backend traits, enforces the
//! author-only delete policy, and pushes a [`FeedNotice`] for every committed
//! row change. Blocking SQLite work runs on the tokio blocking pool.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use agora_shared::backend::{ChangeFeed, FeedSubscription, MessageStore, ProfileResolver};
use agora_shared::constants::{FEED_CAPACITY, MESSAGES_TABLE, PROFILES_TABLE};
use agora_shared::{
    BackendError, ChangeEvent, ChangeKind, FeedNotice, FeedTopic, Message, MessageId,
    NewMessage, Profile, RoomId, UserId,
};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Cloneable handle; all clones share one connection and one feed.
#[derive(Clone)]
pub struct LocalBackend {
    inner: Arc<Inner>,
}

struct Inner {
    db: Mutex<Database>,
    feed: broadcast::Sender<FeedNotice>,
    online: AtomicBool,
}

impl LocalBackend {
    pub fn new(db: Database) -> Self {
        Self::with_feed_capacity(db, FEED_CAPACITY)
    }

    pub fn with_feed_capacity(db: Database, capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                db: Mutex::new(db),
                feed,
                online: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate the transport going down or coming back.
    ///
    /// While offline every read and write fails with
    /// [`BackendError::Unavailable`]. Transitions are announced on the feed.
    pub fn set_online(&self, online: bool) {
        let was = self.inner.online.swap(online, Ordering::SeqCst);
        if was == online {
            return;
        }

        info!(online, "backend connectivity changed");
        let notice = if online {
            FeedNotice::Reconnected
        } else {
            FeedNotice::Disconnected
        };
        let _ = self.inner.feed.send(notice);
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Number of live feed subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.feed.receiver_count()
    }

    /// Synchronous access for setup code (seeding, migrations checks).
    pub fn with_database<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let db = self.inner.db.lock().map_err(|_| StoreError::Poisoned)?;
        f(&db)
    }

    /// Create or replace a profile and announce it on the `profiles` table.
    pub async fn upsert_profile(
        &self,
        user: UserId,
        profile: Profile,
    ) -> std::result::Result<(), BackendError> {
        let record = json!({ "id": user.as_str() });
        self.run(move |db| db.upsert_profile(&user, &profile)).await?;
        self.publish(PROFILES_TABLE, ChangeKind::Update, record);
        Ok(())
    }

    /// The stored profile of `user`. `NotFound` when there is no row.
    pub async fn get_profile(&self, user: &UserId) -> std::result::Result<Profile, BackendError> {
        let user = user.clone();
        self.run(move |db| db.get_profile(&user)).await
    }

    async fn run<T, F>(&self, f: F) -> std::result::Result<T, BackendError>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if !self.is_online() {
            return Err(BackendError::unavailable("backend offline"));
        }

        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let db = inner.db.lock().map_err(|_| StoreError::Poisoned)?;
            f(&db)
        })
        .await
        .map_err(BackendError::unavailable)?
        .map_err(BackendError::from)
    }

    fn publish(&self, table: &str, kind: ChangeKind, record: serde_json::Value) {
        let event = ChangeEvent {
            table: table.to_string(),
            kind,
            record: Some(record),
        };
        // No subscribers is fine.
        let delivered = self.inner.feed.send(FeedNotice::Change(event)).unwrap_or(0);
        debug!(table, ?kind, delivered, "change published");
    }
}

#[async_trait]
impl MessageStore for LocalBackend {
    async fn fetch_recent(
        &self,
        room: &RoomId,
        limit: usize,
    ) -> std::result::Result<Vec<Message>, BackendError> {
        let room = room.clone();
        self.run(move |db| db.get_recent_messages(&room, limit)).await
    }

    async fn insert(&self, draft: NewMessage) -> std::result::Result<Message, BackendError> {
        let message = self.run(move |db| db.insert_message(&draft)).await?;
        self.publish(
            MESSAGES_TABLE,
            ChangeKind::Insert,
            json!({ "id": message.id, "room_id": message.room }),
        );
        Ok(message)
    }

    async fn delete(&self, caller: &UserId, id: MessageId) -> std::result::Result<(), BackendError> {
        let caller = caller.clone();
        self.run(move |db| db.delete_message_as(&caller, id)).await?;
        self.publish(MESSAGES_TABLE, ChangeKind::Delete, json!({ "id": id }));
        Ok(())
    }
}

#[async_trait]
impl ProfileResolver for LocalBackend {
    async fn resolve(
        &self,
        ids: &HashSet<UserId>,
    ) -> std::result::Result<HashMap<UserId, Profile>, BackendError> {
        let ids: Vec<UserId> = ids.iter().cloned().collect();
        self.run(move |db| db.get_profiles(&ids)).await
    }
}

impl ChangeFeed for LocalBackend {
    fn subscribe(&self, topic: FeedTopic) -> std::result::Result<FeedSubscription, BackendError> {
        if !self.is_online() {
            return Err(BackendError::unavailable("backend offline"));
        }
        debug!(table = %topic.table, "feed subscription opened");
        Ok(FeedSubscription::new(topic, self.inner.feed.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> LocalBackend {
        LocalBackend::new(Database::open_in_memory().unwrap())
    }

    fn draft(author: &str, text: &str) -> NewMessage {
        NewMessage {
            room: RoomId::community(),
            author_id: UserId::new(author),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_delete_are_announced() {
        let backend = backend();
        let mut sub = backend
            .subscribe(FeedTopic::all(MESSAGES_TABLE))
            .unwrap();

        let msg = backend.insert(draft("a1", "hello")).await.unwrap();
        backend.delete(&UserId::new("a1"), msg.id).await.unwrap();

        match sub.next().await {
            Some(FeedNotice::Change(ev)) => assert_eq!(ev.kind, ChangeKind::Insert),
            other => panic!("unexpected notice: {other:?}"),
        }
        match sub.next().await {
            Some(FeedNotice::Change(ev)) => assert_eq!(ev.kind, ChangeKind::Delete),
            other => panic!("unexpected notice: {other:?}"),
        }
    }

    #[tokio::test]
    async fn foreign_delete_is_refused_and_not_announced() {
        let backend = backend();
        let msg = backend.insert(draft("a1", "mine")).await.unwrap();
        let mut sub = backend
            .subscribe(FeedTopic::all(MESSAGES_TABLE))
            .unwrap();

        let err = backend.delete(&UserId::new("b2"), msg.id).await.unwrap_err();
        assert_eq!(err, BackendError::Unauthorized);

        backend.set_online(false);
        assert_eq!(sub.next().await, Some(FeedNotice::Disconnected));
    }

    #[tokio::test]
    async fn offline_backend_fails_reads_until_reconnected() {
        let backend = backend();
        backend.insert(draft("a1", "before")).await.unwrap();
        let mut sub = backend
            .subscribe(FeedTopic::all(MESSAGES_TABLE))
            .unwrap();

        backend.set_online(false);
        backend.set_online(false);
        let err = backend
            .fetch_recent(&RoomId::community(), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
        assert!(backend.subscribe(FeedTopic::all(MESSAGES_TABLE)).is_err());

        backend.set_online(true);
        assert_eq!(sub.next().await, Some(FeedNotice::Disconnected));
        assert_eq!(sub.next().await, Some(FeedNotice::Reconnected));

        let rows = backend.fetch_recent(&RoomId::community(), 100).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn resolves_profiles_in_batch() {
        let backend = backend();
        backend
            .upsert_profile(
                UserId::new("a1"),
                Profile {
                    display_name: Some("Ada".into()),
                    avatar_url: Some("https://cdn.example/ada.png".into()),
                },
            )
            .await
            .unwrap();

        let ids: HashSet<UserId> = [UserId::new("a1"), UserId::new("b2")].into();
        let found = backend.resolve(&ids).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[&UserId::new("a1")].display_name.as_deref(),
            Some("Ada")
        );
    }

    #[tokio::test]
    async fn profile_read_goes_through_backend() {
        let backend = backend();
        let user = UserId::new("a1");
        assert_eq!(backend.get_profile(&user).await, Err(BackendError::NotFound));

        let ada = Profile {
            display_name: Some("Ada".into()),
            avatar_url: None,
        };
        backend.upsert_profile(user.clone(), ada.clone()).await.unwrap();
        assert_eq!(backend.get_profile(&user).await, Ok(ada));

        backend.set_online(false);
        assert!(matches!(
            backend.get_profile(&user).await,
            Err(BackendError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn subscriber_count_tracks_receivers() {
        let backend = backend();
        assert_eq!(backend.subscriber_count(), 0);
        let sub = backend.subscribe(FeedTopic::all(MESSAGES_TABLE)).unwrap();
        assert_eq!(backend.subscriber_count(), 1);
        drop(sub);
        assert_eq!(backend.subscriber_count(), 0);
    }
}
