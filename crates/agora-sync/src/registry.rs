//! Per-room registry of caches and their change feed subscriptions.
//!
//! Observers of the same room share one [`MessageCache`] and one
//! [`ChangeListener`]. The subscription opens with the first observer and
//! closes when the last [`RoomObserver`] is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agora_shared::backend::{ChangeFeed, IdentityProvider, MessageStore, ProfileResolver};
use agora_shared::constants::MESSAGES_TABLE;
use agora_shared::{FeedTopic, RoomId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::{MessageCache, RoomView};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::gateway::MutationGateway;
use crate::listener::ChangeListener;

/// The remote capabilities the core runs against.
#[derive(Clone)]
pub struct Backend {
    pub messages: Arc<dyn MessageStore>,
    pub profiles: Arc<dyn ProfileResolver>,
    pub feed: Arc<dyn ChangeFeed>,
}

impl Backend {
    /// One object serving all three roles.
    pub fn from_shared<B>(backend: Arc<B>) -> Self
    where
        B: MessageStore + ProfileResolver + ChangeFeed + 'static,
    {
        Self {
            messages: backend.clone(),
            profiles: backend.clone(),
            feed: backend,
        }
    }
}

struct RoomEntry {
    cache: Arc<MessageCache>,
    observers: usize,
    // Dropping it closes the subscription.
    listener: ChangeListener,
}

pub struct RoomRegistry {
    backend: Backend,
    config: SyncConfig,
    rooms: Mutex<HashMap<RoomId, RoomEntry>>,
}

impl RoomRegistry {
    pub fn new(backend: Backend, config: SyncConfig) -> Arc<Self> {
        Arc::new(Self {
            backend,
            config,
            rooms: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Start watching `room`.
    ///
    /// The first observer opens the subscription and schedules the initial
    /// load; later observers share both, resubscribing first if the feed
    /// closed. Must be called from within a tokio runtime.
    pub fn observe(self: &Arc<Self>, room: RoomId) -> Result<RoomObserver> {
        let mut rooms = self.lock_rooms();

        let cache = match rooms.get_mut(&room) {
            Some(entry) => {
                self.ensure_listening(&room, entry)?;
                entry.observers += 1;
                debug!(room = %room, observers = entry.observers, "room observer added");
                entry.cache.clone()
            }
            None => {
                let cache = MessageCache::new(
                    room.clone(),
                    self.backend.messages.clone(),
                    self.backend.profiles.clone(),
                    &self.config,
                );
                // Subscribe before the first load so no change slips between.
                let listener = ChangeListener::spawn(
                    self.backend.feed.as_ref(),
                    FeedTopic::all(MESSAGES_TABLE),
                    cache.clone(),
                )?;
                cache.invalidate();

                info!(room = %room, "room opened");
                rooms.insert(
                    room.clone(),
                    RoomEntry {
                        cache: cache.clone(),
                        observers: 1,
                        listener,
                    },
                );
                cache
            }
        };

        let view = cache.subscribe();
        Ok(RoomObserver {
            registry: Arc::clone(self),
            room,
            cache,
            view,
        })
    }

    /// Refetch `room` if anyone is watching it. Unobserved rooms load fresh
    /// on their next first observation anyway.
    pub fn invalidate(&self, room: &RoomId) {
        let cache = {
            let mut rooms = self.lock_rooms();
            rooms.get_mut(room).map(|entry| {
                if let Err(e) = self.ensure_listening(room, entry) {
                    warn!(room = %room, error = %e, "change listener restart failed");
                }
                entry.cache.clone()
            })
        };
        match cache {
            Some(cache) => cache.invalidate(),
            None => debug!(room = %room, "invalidation skipped, room not observed"),
        }
    }

    pub fn observer_count(&self, room: &RoomId) -> usize {
        self.lock_rooms().get(room).map_or(0, |e| e.observers)
    }

    pub fn open_rooms(&self) -> usize {
        self.lock_rooms().len()
    }

    /// Mutations for `room` on behalf of whoever `identity` reports.
    pub fn gateway(
        self: &Arc<Self>,
        room: RoomId,
        identity: Arc<dyn IdentityProvider>,
    ) -> MutationGateway {
        MutationGateway::new(
            room,
            self.backend.messages.clone(),
            identity,
            Arc::clone(self),
        )
    }

    /// Resubscribe if the room's feed closed under it. The restart is
    /// followed by a refetch, since changes may have been missed meanwhile.
    fn ensure_listening(&self, room: &RoomId, entry: &mut RoomEntry) -> Result<()> {
        if entry.listener.is_running() {
            return Ok(());
        }

        entry.listener = ChangeListener::spawn(
            self.backend.feed.as_ref(),
            FeedTopic::all(MESSAGES_TABLE),
            entry.cache.clone(),
        )?;
        info!(room = %room, "change listener restarted");
        entry.cache.invalidate();
        Ok(())
    }

    fn release(&self, room: &RoomId) {
        let closed = {
            let mut rooms = self.lock_rooms();
            let Some(entry) = rooms.get_mut(room) else {
                return;
            };
            entry.observers = entry.observers.saturating_sub(1);
            if entry.observers > 0 {
                debug!(room = %room, observers = entry.observers, "room observer removed");
                return;
            }
            rooms.remove(room)
        };

        if let Some(entry) = closed {
            entry.cache.detach();
            info!(room = %room, "room closed");
        }
    }

    fn lock_rooms(&self) -> MutexGuard<'_, HashMap<RoomId, RoomEntry>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live interest in one room. Dropping it releases the interest.
pub struct RoomObserver {
    registry: Arc<RoomRegistry>,
    room: RoomId,
    cache: Arc<MessageCache>,
    view: watch::Receiver<RoomView>,
}

impl RoomObserver {
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// `{messages, is_loading}` as of now.
    pub fn view(&self) -> RoomView {
        self.view.borrow().clone()
    }

    /// Wait for the next published view. `None` if the cache went away.
    pub async fn changed(&mut self) -> Option<RoomView> {
        self.view.changed().await.ok()?;
        let view = self.view.borrow_and_update().clone();
        Some(view)
    }

    /// Wait for the current refresh cycle to finish.
    pub async fn settled(&self) -> RoomView {
        self.cache.settled().await
    }

    /// Ask for a refetch.
    pub fn refresh(&self) {
        self.cache.invalidate();
    }

    pub fn cache(&self) -> &Arc<MessageCache> {
        &self.cache
    }
}

impl Drop for RoomObserver {
    fn drop(&mut self) {
        self.registry.release(&self.room);
    }
}
