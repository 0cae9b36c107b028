//! Registry of live map sessions keyed by map id
//!
//! A session can be destroyed without going through the manager (the host's
//! `onDestroy` hook or a `destroy` call on the handle). Each registered
//! session is watched and its entry evicted once it reaches `Destroyed`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::SessionState;
use super::actor::{SessionDeps, spawn_session};
use super::handle::MapSessionHandle;
use crate::config::{Config, IconCacheScope};
use crate::errors::{BridgeResult, MapError};
use crate::models::MapConfig;
use crate::native::MapBackend;
use crate::services::{EventNotifier, IconCache};

/// Creates sessions against a backend and routes host calls to them by id
pub struct MapManager {
    backend: Arc<dyn MapBackend>,
    notifier: Arc<dyn EventNotifier>,
    config: Arc<Config>,
    shared_icons: Arc<IconCache>,
    sessions: Arc<RwLock<SessionMap>>,
}

type SessionMap = HashMap<String, MapSessionHandle>;

/// Drop `map_id`'s entry once that exact session is destroyed
///
/// Holds only a weak reference to the map and a state receiver, so neither the
/// manager nor the session actor is kept alive by the watcher.
fn evict_when_destroyed(sessions: Weak<RwLock<SessionMap>>, map_id: String, handle: &MapSessionHandle) {
    let mut state = handle.state_receiver();
    tokio::spawn(async move {
        let _ = state.wait_for(|s| *s == SessionState::Destroyed).await;
        let Some(registry) = sessions.upgrade() else {
            return;
        };
        let mut sessions = registry.write().await;
        if sessions.get(&map_id).is_some_and(|h| h.is_session(&state)) {
            sessions.remove(&map_id);
            debug!("Evicted destroyed map {}", map_id);
        }
    });
}

impl MapManager {
    pub fn new(
        backend: Arc<dyn MapBackend>,
        notifier: Arc<dyn EventNotifier>,
        config: Config,
    ) -> Self {
        let shared_icons = Arc::new(IconCache::new(config.icon_cache.capacity_bytes));
        Self {
            backend,
            notifier,
            config: Arc::new(config),
            shared_icons,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The process-wide cache; per-session caches are not reachable from here
    pub fn shared_icon_cache(&self) -> &Arc<IconCache> {
        &self.shared_icons
    }

    fn icon_cache_for_session(&self) -> Arc<IconCache> {
        match self.config.icon_cache.scope {
            IconCacheScope::Shared => self.shared_icons.clone(),
            IconCacheScope::PerSession => {
                Arc::new(IconCache::new(self.config.icon_cache.capacity_bytes))
            }
        }
    }

    /// Create a map and wait for it to become ready
    ///
    /// Without an explicit id a random one is issued. If the ready signal does
    /// not arrive within the configured timeout the half-built session is
    /// destroyed and `MapNotReady` returned.
    pub async fn create_map(
        &self,
        map_id: Option<String>,
        config: MapConfig,
    ) -> BridgeResult<MapSessionHandle> {
        let map_id = map_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let handle = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(&map_id).map(MapSessionHandle::state) {
                Some(SessionState::Destroyed) => {
                    sessions.remove(&map_id);
                }
                Some(_) => {
                    return Err(MapError::invalid_arguments(format!(
                        "Map with id '{map_id}' already exists"
                    )));
                }
                None => {}
            }
            let deps = SessionDeps {
                session_config: self.config.session.clone(),
                icon_cache: self.icon_cache_for_session(),
                cache_scope: self.config.icon_cache.scope,
                notifier: self.notifier.clone(),
            };
            let handle = spawn_session(map_id.clone(), config, self.backend.as_ref(), deps)?;
            sessions.insert(map_id.clone(), handle.clone());
            evict_when_destroyed(Arc::downgrade(&self.sessions), map_id.clone(), &handle);
            handle
        };

        if let Err(e) = handle.wait_ready(self.config.session.ready_timeout).await {
            warn!("Map {} failed to initialize, tearing it down", map_id);
            self.sessions.write().await.remove(&map_id);
            handle.destroy().await?;
            return Err(e);
        }

        info!("Created map {}", map_id);
        Ok(handle)
    }

    /// Handle for a live session; destroyed ones awaiting eviction are skipped
    pub async fn get(&self, map_id: &str) -> Option<MapSessionHandle> {
        self.sessions
            .read()
            .await
            .get(map_id)
            .filter(|h| h.state() != SessionState::Destroyed)
            .cloned()
    }

    /// Handle for `map_id`, or `MapNotReady` if no such map exists
    pub async fn session(&self, map_id: &str) -> BridgeResult<MapSessionHandle> {
        self.get(map_id)
            .await
            .ok_or_else(|| MapError::map_not_ready(map_id))
    }

    pub async fn destroy_map(&self, map_id: &str) -> BridgeResult<()> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(map_id)
            .ok_or_else(|| MapError::map_not_ready(map_id))?;
        handle.destroy().await
    }

    pub async fn destroy_all(&self) -> usize {
        let handles: Vec<MapSessionHandle> =
            self.sessions.write().await.drain().map(|(_, h)| h).collect();
        let count = handles
            .iter()
            .filter(|h| h.state() != SessionState::Destroyed)
            .count();
        for handle in handles {
            if let Err(e) = handle.destroy().await {
                warn!("Failed to destroy map {}: {}", handle.map_id(), e);
            }
        }
        count
    }

    pub async fn map_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(_, h)| h.state() != SessionState::Destroyed)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
