//! In-memory backend with counters and gates for exercising the core.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agora_shared::backend::{ChangeFeed, FeedSubscription, MessageStore, ProfileResolver};
use agora_shared::constants::MESSAGES_TABLE;
use agora_shared::{
    BackendError, ChangeEvent, ChangeKind, FeedNotice, FeedTopic, Message, MessageId,
    NewMessage, Profile, RoomId, UserId,
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, oneshot};

use crate::registry::Backend;

#[derive(Default)]
struct Counters {
    fetches: AtomicUsize,
    lookups: AtomicUsize,
    inserts: AtomicUsize,
    deletes: AtomicUsize,
}

pub(crate) struct FakeBackend {
    rows: Mutex<Vec<Message>>,
    profiles: Mutex<HashMap<UserId, Profile>>,
    feed: Mutex<broadcast::Sender<FeedNotice>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    counters: Counters,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_profiles: AtomicBool,
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        let (feed, _) = broadcast::channel(64);
        Arc::new(Self {
            rows: Mutex::new(Vec::new()),
            profiles: Mutex::new(HashMap::new()),
            feed: Mutex::new(feed),
            gate: Mutex::new(None),
            counters: Counters::default(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_profiles: AtomicBool::new(false),
        })
    }

    pub(crate) fn backend(self: &Arc<Self>) -> Backend {
        Backend::from_shared(self.clone())
    }

    /// The next fetch reads its rows, then blocks until the sender fires.
    pub(crate) fn hold_next_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub(crate) fn add_profile(&self, user: &str, name: &str) {
        self.profiles.lock().unwrap().insert(
            UserId::new(user),
            Profile {
                display_name: Some(name.to_string()),
                avatar_url: None,
            },
        );
    }

    /// Write a row behind the core's back, without a feed notice.
    pub(crate) fn push_row(&self, author: &str, text: &str) -> Message {
        let message = Message {
            id: MessageId::new(),
            room: RoomId::community(),
            author_id: UserId::new(author),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(message.clone());
        message
    }

    pub(crate) fn notify(&self, notice: FeedNotice) {
        let _ = self.feed.lock().unwrap().send(notice);
    }

    /// Drop the feed's sender so live subscriptions end. Later subscribers
    /// get a fresh channel.
    pub(crate) fn close_feed(&self) {
        let (fresh, _) = broadcast::channel(64);
        *self.feed.lock().unwrap() = fresh;
    }

    /// Notices not yet received by every subscriber.
    pub(crate) fn backlog(&self) -> usize {
        self.feed.lock().unwrap().len()
    }

    pub(crate) fn notify_change(&self) {
        self.notify(FeedNotice::Change(ChangeEvent {
            table: MESSAGES_TABLE.to_string(),
            kind: ChangeKind::Update,
            record: None,
        }));
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_profiles(&self, fail: bool) {
        self.fail_profiles.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fetches(&self) -> usize {
        self.counters.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn lookups(&self) -> usize {
        self.counters.lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn inserts(&self) -> usize {
        self.counters.inserts.load(Ordering::SeqCst)
    }

    pub(crate) fn deletes(&self) -> usize {
        self.counters.deletes.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribers(&self) -> usize {
        self.feed.lock().unwrap().receiver_count()
    }

    fn announce(&self, kind: ChangeKind) {
        self.notify(FeedNotice::Change(ChangeEvent {
            table: MESSAGES_TABLE.to_string(),
            kind,
            record: None,
        }));
    }
}

#[async_trait]
impl MessageStore for FakeBackend {
    async fn fetch_recent(&self, room: &RoomId, limit: usize) -> Result<Vec<Message>, BackendError> {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);

        let mut rows: Vec<Message> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| &m.room == room)
            .cloned()
            .collect();
        let failing = self.fail_reads.load(Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if failing {
            return Err(BackendError::unavailable("read failed"));
        }

        rows.sort_by_key(|m| m.created_at);
        let skip = rows.len().saturating_sub(limit);
        Ok(rows.split_off(skip))
    }

    async fn insert(&self, draft: NewMessage) -> Result<Message, BackendError> {
        self.counters.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::unavailable("write failed"));
        }

        let message = Message {
            id: MessageId::new(),
            room: draft.room,
            author_id: draft.author_id,
            text: draft.text,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(message.clone());
        self.announce(ChangeKind::Insert);
        Ok(message)
    }

    async fn delete(&self, caller: &UserId, id: MessageId) -> Result<(), BackendError> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::unavailable("write failed"));
        }

        {
            let mut rows = self.rows.lock().unwrap();
            let pos = rows
                .iter()
                .position(|m| m.id == id)
                .ok_or(BackendError::NotFound)?;
            if &rows[pos].author_id != caller {
                return Err(BackendError::Unauthorized);
            }
            rows.remove(pos);
        }
        self.announce(ChangeKind::Delete);
        Ok(())
    }
}

#[async_trait]
impl ProfileResolver for FakeBackend {
    async fn resolve(
        &self,
        ids: &HashSet<UserId>,
    ) -> Result<HashMap<UserId, Profile>, BackendError> {
        self.counters.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_profiles.load(Ordering::SeqCst) {
            return Err(BackendError::unavailable("profiles down"));
        }

        let profiles = self.profiles.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| profiles.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}

impl ChangeFeed for FakeBackend {
    fn subscribe(&self, topic: FeedTopic) -> Result<FeedSubscription, BackendError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BackendError::unavailable("feed down"));
        }
        Ok(FeedSubscription::new(topic, self.feed.lock().unwrap().subscribe()))
    }
}

/// Poll `cond` until it holds, letting spawned tasks run in between.
pub(crate) async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
