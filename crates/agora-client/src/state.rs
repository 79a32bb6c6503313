//! Application state shared by the command handlers.
//!
//! [`AppState`] owns the local backend, the room registry and the gateway for
//! the configured room. The room is observed through [`AppState::observe`].

use std::sync::Arc;

use agora_shared::{StaticIdentity, UserId};
use agora_store::{Database, LocalBackend};
use agora_sync::{Backend, MutationGateway, RoomObserver, RoomRegistry};
use tracing::info;

use crate::config::ClientConfig;

pub struct AppState {
    pub config: ClientConfig,

    /// The SQLite-backed message store, profile table and change feed.
    pub backend: Arc<LocalBackend>,

    pub registry: Arc<RoomRegistry>,

    /// Send and delete for `config.room` as `config.user_id`.
    pub gateway: MutationGateway,
}

impl AppState {
    /// Open the configured database and seed the user's profile.
    pub async fn open(config: ClientConfig) -> anyhow::Result<Self> {
        let db = match &config.db_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Database::open_at(path)?
            }
            None => Database::new()?,
        };
        info!(path = ?db.path(), "database opened");
        Self::with_database(config, db).await
    }

    /// Build the state around an already opened database.
    pub async fn with_database(config: ClientConfig, db: Database) -> anyhow::Result<Self> {
        let backend = Arc::new(LocalBackend::with_feed_capacity(db, config.feed_capacity));

        if let (Some(user), Some(profile)) = (&config.user_id, config.seed_profile()) {
            backend.upsert_profile(user.clone(), profile).await?;
            info!(user = %user, "profile seeded");
        }

        let registry = RoomRegistry::new(
            Backend::from_shared(backend.clone()),
            config.sync_config(),
        );
        let identity = Arc::new(StaticIdentity(config.user_id.clone()));
        let gateway = registry.gateway(config.room.clone(), identity);

        Ok(Self {
            config,
            backend,
            registry,
            gateway,
        })
    }

    /// Start watching the configured room.
    pub fn observe(&self) -> agora_sync::error::Result<RoomObserver> {
        self.registry.observe(self.config.room.clone())
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.gateway.current_user()
    }
}
