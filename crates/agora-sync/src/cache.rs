//! Per-room message cache.
//!
//! A [`MessageCache`] owns the materialized, profile-joined view of one room
//! and refreshes it by full refetch. Consumers read the latest [`RoomView`]
//! through a watch channel; a new snapshot replaces the old one only once it
//! is completely assembled.
//!
//! Refetches are coalesced: [`MessageCache::invalidate`] starts a refresh if
//! none is running, otherwise it marks one follow-up as pending. However many
//! invalidations arrive during a refresh, exactly one more runs after it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agora_shared::backend::{MessageStore, ProfileResolver};
use agora_shared::{EnrichedMessage, RoomId};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::join;

/// One complete, ordered read of a room.
#[derive(Debug, Clone)]
pub struct Snapshot {
    ticket: u64,
    messages: Arc<Vec<EnrichedMessage>>,
}

impl Snapshot {
    /// Fetch ticket that produced this snapshot. Higher is newer.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Messages in ascending creation order.
    pub fn messages(&self) -> &[EnrichedMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnrichedMessage> {
        self.messages.iter()
    }
}

/// What the UI reads: the last good snapshot plus refresh status.
#[derive(Debug, Clone, Default)]
pub struct RoomView {
    /// `None` until the first successful load.
    pub messages: Option<Snapshot>,
    pub is_loading: bool,
    /// Failure of the latest refresh, cleared by the next success.
    pub error: Option<SyncError>,
}

#[derive(Default)]
struct Flight {
    in_flight: bool,
    pending: bool,
    detached: bool,
    next_ticket: u64,
    published: u64,
}

pub struct MessageCache {
    room: RoomId,
    store: Arc<dyn MessageStore>,
    profiles: Arc<dyn ProfileResolver>,
    limit: usize,
    view: watch::Sender<RoomView>,
    flight: Mutex<Flight>,
}

impl MessageCache {
    pub fn new(
        room: RoomId,
        store: Arc<dyn MessageStore>,
        profiles: Arc<dyn ProfileResolver>,
        config: &SyncConfig,
    ) -> Arc<Self> {
        let (view, _) = watch::channel(RoomView::default());
        Arc::new(Self {
            room,
            store,
            profiles,
            limit: config.snapshot_limit,
            view,
            flight: Mutex::new(Flight::default()),
        })
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Current view.
    pub fn view(&self) -> RoomView {
        self.view.borrow().clone()
    }

    /// Last successfully loaded snapshot, if any.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.view.borrow().messages.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RoomView> {
        self.view.subscribe()
    }

    /// Fetch, join and publish the room's current state.
    ///
    /// On failure the previous snapshot stays published and the error is
    /// recorded in the view as well as returned.
    pub async fn load(&self) -> Result<Snapshot> {
        let ticket = self.take_ticket();

        match self.fetch().await {
            Ok(messages) => {
                let snapshot = Snapshot {
                    ticket,
                    messages: Arc::new(messages),
                };
                self.publish(&snapshot);
                Ok(snapshot)
            }
            Err(e) => {
                self.record_failure(ticket, &e);
                Err(e)
            }
        }
    }

    /// Schedule a refetch. Must be called from within a tokio runtime.
    ///
    /// Idempotent while a refetch is running: the calls collapse into one
    /// trailing refetch after the current one settles.
    pub fn invalidate(self: &Arc<Self>) {
        {
            let mut flight = self.lock_flight();
            if flight.detached {
                trace!(room = %self.room, "invalidation ignored, cache detached");
                return;
            }
            if flight.in_flight {
                flight.pending = true;
                trace!(room = %self.room, "invalidation coalesced");
                return;
            }
            flight.in_flight = true;
            self.view.send_modify(|v| v.is_loading = true);
        }

        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.drive().await });
    }

    /// Wait until no refetch is running or pending, then return the view.
    pub async fn settled(&self) -> RoomView {
        let mut rx = self.view.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        if let Ok(view) = rx.wait_for(|v| !v.is_loading).await {
            return view.clone();
        }
        self.view()
    }

    /// Show a failure that is not tied to one refetch, such as the change
    /// feed going away. The next successful load clears it.
    pub fn report_failure(&self, error: SyncError) {
        self.view.send_modify(|v| v.error = Some(error));
    }

    /// Stop honouring invalidations. A refetch already running completes,
    /// but no follow-up is scheduled.
    pub fn detach(&self) {
        let mut flight = self.lock_flight();
        flight.detached = true;
        flight.pending = false;
    }

    pub fn is_detached(&self) -> bool {
        self.lock_flight().detached
    }

    async fn drive(self: Arc<Self>) {
        loop {
            if let Err(e) = self.load().await {
                warn!(room = %self.room, error = %e, "refresh failed, keeping previous snapshot");
            }
            if !self.settle() {
                break;
            }
            debug!(room = %self.room, "running coalesced refetch");
        }
    }

    /// End of one refetch. Returns whether a pending one should run next.
    fn settle(&self) -> bool {
        let mut flight = self.lock_flight();
        if flight.pending && !flight.detached {
            flight.pending = false;
            return true;
        }
        flight.pending = false;
        flight.in_flight = false;
        self.view.send_modify(|v| v.is_loading = false);
        false
    }

    async fn fetch(&self) -> Result<Vec<EnrichedMessage>> {
        let messages = self
            .store
            .fetch_recent(&self.room, self.limit)
            .await
            .map_err(SyncError::StoreUnavailable)?;

        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let authors = join::author_ids(&messages);
        let profiles = match self.profiles.resolve(&authors).await {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!(
                    room = %self.room,
                    authors = authors.len(),
                    error = %e,
                    "profile lookup failed, showing unknown authors"
                );
                HashMap::new()
            }
        };

        Ok(join::enrich(messages, &profiles))
    }

    fn take_ticket(&self) -> u64 {
        let mut flight = self.lock_flight();
        flight.next_ticket += 1;
        flight.next_ticket
    }

    fn publish(&self, snapshot: &Snapshot) {
        let mut flight = self.lock_flight();
        if snapshot.ticket <= flight.published {
            debug!(
                room = %self.room,
                ticket = snapshot.ticket,
                published = flight.published,
                "discarding out-of-date refetch"
            );
            return;
        }
        flight.published = snapshot.ticket;
        self.view.send_modify(|v| {
            v.messages = Some(snapshot.clone());
            v.error = None;
        });
        debug!(
            room = %self.room,
            ticket = snapshot.ticket,
            count = snapshot.len(),
            "snapshot published"
        );
    }

    fn record_failure(&self, ticket: u64, error: &SyncError) {
        let flight = self.lock_flight();
        if ticket <= flight.published {
            return;
        }
        self.view.send_modify(|v| v.error = Some(error.clone()));
    }

    fn lock_flight(&self) -> MutexGuard<'_, Flight> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
