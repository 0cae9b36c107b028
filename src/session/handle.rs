//! Cloneable front door to a session actor

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::SessionState;
use super::actor::{Job, MapSession, job};
use crate::config::SessionConfig;
use crate::errors::{BridgeResult, MapError};
use crate::models::{
    CameraConfig, CameraPosition, Circle, FrameRect, GroundOverlay, LatLngBounds, MapType, Marker,
    OverlayKind, Padding, Polygon, Polyline, ScreenRect, SnapshotFormat,
};
use crate::native::LifecycleEvent;
use crate::observability::BridgeMetrics;
use crate::services::IconCache;
use crate::services::snapshot::encode_snapshot;

/// Commands are queued to the session actor and answered over a oneshot
///
/// Every method fails with `MapNotReady` once the actor has stopped.
#[derive(Clone)]
pub struct MapSessionHandle {
    map_id: Arc<str>,
    jobs: mpsc::UnboundedSender<Job>,
    state: watch::Receiver<SessionState>,
    config: Arc<SessionConfig>,
    icon_cache: Arc<IconCache>,
}

impl std::fmt::Debug for MapSessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSessionHandle")
            .field("map_id", &self.map_id)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl MapSessionHandle {
    pub(super) fn new(
        map_id: String,
        jobs: mpsc::UnboundedSender<Job>,
        state: watch::Receiver<SessionState>,
        config: Arc<SessionConfig>,
        icon_cache: Arc<IconCache>,
    ) -> Self {
        Self {
            map_id: map_id.into(),
            jobs,
            state,
            config,
            icon_cache,
        }
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Independent view of the session state that does not keep the actor alive
    pub(super) fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Whether `state` was taken from this same session
    pub(super) fn is_session(&self, state: &watch::Receiver<SessionState>) -> bool {
        self.state.same_channel(state)
    }

    /// Run `f` on the actor and wait for its answer
    async fn call<R, F>(&self, f: F) -> BridgeResult<R>
    where
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut MapSession) -> BoxFuture<'a, BridgeResult<R>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let work = job(move |session| {
            async move {
                let result = f(session).await;
                let _ = tx.send(result);
            }
            .boxed()
        });
        self.jobs
            .send(work)
            .map_err(|_| MapError::map_not_ready(self.map_id.as_ref()))?;
        rx.await
            .map_err(|_| MapError::map_not_ready(self.map_id.as_ref()))?
    }

    /// Synchronous variant of [`call`](Self::call)
    async fn run<R, F>(&self, f: F) -> BridgeResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut MapSession) -> BridgeResult<R> + Send + 'static,
    {
        self.call(move |session| {
            let result = f(session);
            async move { result }.boxed()
        })
        .await
    }

    /// Wait until the map is ready; `MapNotReady` on timeout or destruction
    pub async fn wait_ready(&self, limit: Duration) -> BridgeResult<()> {
        let mut state = self.state.clone();
        let settled = timeout(
            limit,
            state.wait_for(|s| !matches!(s, SessionState::Uninitialized | SessionState::Initializing)),
        )
        .await;
        match settled {
            Ok(Ok(current)) if *current == SessionState::Ready => Ok(()),
            Ok(_) => Err(MapError::map_not_ready(self.map_id.as_ref())),
            Err(_) => {
                warn!("Map {} not ready after {:?}", self.map_id, limit);
                Err(MapError::map_not_ready(self.map_id.as_ref()))
            }
        }
    }

    pub async fn add_marker(&self, marker: Marker) -> BridgeResult<String> {
        let mut ids = self
            .call(move |s| s.add_markers(vec![marker]).boxed())
            .await?;
        ids.pop()
            .ok_or_else(|| MapError::internal("Marker add produced no id"))
    }

    pub async fn add_markers(&self, markers: Vec<Marker>) -> BridgeResult<Vec<String>> {
        self.call(move |s| s.add_markers(markers).boxed()).await
    }

    pub async fn remove_marker(&self, id: &str) -> BridgeResult<()> {
        let id = id.to_string();
        self.run(move |s| s.remove_marker(&id)).await
    }

    /// Remove the known ids; unknown ones are skipped
    pub async fn remove_markers(&self, ids: Vec<String>) -> BridgeResult<usize> {
        self.run(move |s| s.remove_markers(&ids)).await
    }

    pub async fn update_marker(&self, id: &str, marker: Marker) -> BridgeResult<String> {
        let id = id.to_string();
        self.call(move |s| async move { s.update_marker(&id, marker).await }.boxed())
            .await
    }

    pub async fn update_marker_icon(
        &self,
        id: &str,
        icon_id: String,
        icon_url: String,
    ) -> BridgeResult<()> {
        let id = id.to_string();
        self.call(move |s| {
            async move { s.update_marker_icon(&id, icon_id, icon_url).await }.boxed()
        })
        .await
    }

    /// Whether an icon is currently cached under `icon_id`
    pub fn has_icon(&self, icon_id: &str) -> bool {
        self.icon_cache.contains(icon_id)
    }

    pub async fn add_polygons(&self, polygons: Vec<Polygon>) -> BridgeResult<Vec<String>> {
        self.run(move |s| s.add_polygons(polygons)).await
    }

    pub async fn remove_polygon(&self, id: &str) -> BridgeResult<()> {
        let id = id.to_string();
        self.run(move |s| s.remove_polygon(&id)).await
    }

    pub async fn remove_polygons(&self, ids: Vec<String>) -> BridgeResult<usize> {
        self.run(move |s| s.remove_polygons(&ids)).await
    }

    pub async fn update_polygon(&self, id: &str, polygon: Polygon) -> BridgeResult<String> {
        let id = id.to_string();
        self.run(move |s| s.update_polygon(&id, polygon)).await
    }

    pub async fn add_circles(&self, circles: Vec<Circle>) -> BridgeResult<Vec<String>> {
        self.run(move |s| s.add_circles(circles)).await
    }

    pub async fn remove_circle(&self, id: &str) -> BridgeResult<()> {
        let id = id.to_string();
        self.run(move |s| s.remove_circle(&id)).await
    }

    pub async fn remove_circles(&self, ids: Vec<String>) -> BridgeResult<usize> {
        self.run(move |s| s.remove_circles(&ids)).await
    }

    pub async fn update_circle(&self, id: &str, circle: Circle) -> BridgeResult<String> {
        let id = id.to_string();
        self.run(move |s| s.update_circle(&id, circle)).await
    }

    pub async fn add_polylines(&self, polylines: Vec<Polyline>) -> BridgeResult<Vec<String>> {
        self.run(move |s| s.add_polylines(polylines)).await
    }

    pub async fn remove_polyline(&self, id: &str) -> BridgeResult<()> {
        let id = id.to_string();
        self.run(move |s| s.remove_polyline(&id)).await
    }

    pub async fn remove_polylines(&self, ids: Vec<String>) -> BridgeResult<usize> {
        self.run(move |s| s.remove_polylines(&ids)).await
    }

    pub async fn update_polyline(&self, id: &str, polyline: Polyline) -> BridgeResult<String> {
        let id = id.to_string();
        self.run(move |s| s.update_polyline(&id, polyline)).await
    }

    pub async fn add_ground_overlay(&self, overlay: GroundOverlay) -> BridgeResult<String> {
        self.call(move |s| s.add_ground_overlay(overlay).boxed())
            .await
    }

    pub async fn remove_ground_overlay(&self, id: &str) -> BridgeResult<()> {
        let id = id.to_string();
        self.run(move |s| s.remove_ground_overlay(&id)).await
    }

    pub async fn enable_clustering(&self, min_cluster_size: Option<usize>) -> BridgeResult<()> {
        self.call(move |s| s.enable_clustering(min_cluster_size).boxed())
            .await
    }

    pub async fn disable_clustering(&self) -> BridgeResult<()> {
        self.run(|s| s.disable_clustering()).await
    }

    pub async fn clustering_enabled(&self) -> BridgeResult<bool> {
        self.run(|s| Ok(s.clustering_enabled())).await
    }

    pub async fn set_camera(&self, config: CameraConfig) -> BridgeResult<()> {
        self.run(move |s| s.set_camera(&config)).await
    }

    pub async fn get_camera(&self) -> BridgeResult<CameraPosition> {
        self.run(|s| s.camera()).await
    }

    pub async fn get_zoom_level(&self) -> BridgeResult<f64> {
        self.run(|s| s.zoom_level()).await
    }

    /// Map frame in device pixels
    pub async fn get_map_bounds(&self) -> BridgeResult<ScreenRect> {
        self.run(|s| s.map_bounds()).await
    }

    pub async fn get_lat_lng_bounds(&self) -> BridgeResult<LatLngBounds> {
        self.run(|s| s.lat_lng_bounds()).await
    }

    pub async fn fit_bounds(&self, bounds: LatLngBounds, padding: i32) -> BridgeResult<()> {
        self.run(move |s| s.fit_bounds(bounds, padding)).await
    }

    pub async fn get_map_type(&self) -> BridgeResult<MapType> {
        self.run(|s| s.map_type()).await
    }

    pub async fn set_map_type(&self, map_type: &str) -> BridgeResult<()> {
        let map_type = map_type.to_string();
        self.run(move |s| s.set_map_type(&map_type)).await
    }

    pub async fn enable_indoor_maps(&self, enabled: bool) -> BridgeResult<()> {
        self.run(move |s| s.enable_indoor_maps(enabled)).await
    }

    pub async fn enable_traffic_layer(&self, enabled: bool) -> BridgeResult<()> {
        self.run(move |s| s.enable_traffic_layer(enabled)).await
    }

    pub async fn enable_current_location(&self, enabled: bool) -> BridgeResult<()> {
        self.run(move |s| s.enable_current_location(enabled)).await
    }

    pub async fn set_padding(&self, padding: Padding) -> BridgeResult<()> {
        self.run(move |s| s.set_padding(padding)).await
    }

    pub async fn update_render(&self, frame: FrameRect) -> BridgeResult<()> {
        self.run(move |s| s.update_render(frame)).await
    }

    /// Capture the map and return it base64 encoded
    ///
    /// The capture is awaited off the actor so the session keeps serving
    /// other commands while the SDK renders.
    pub async fn take_snapshot(&self, format: SnapshotFormat, quality: u8) -> BridgeResult<String> {
        let started = Instant::now();
        let capture = self.run(|s| s.start_snapshot()).await?;
        let limit = self.config.snapshot_timeout;

        let result = match timeout(limit, capture).await {
            Err(_) => Err(MapError::snapshot_failed(format!(
                "No image returned within {}",
                humantime::format_duration(limit)
            ))),
            Ok(Err(_)) => Err(MapError::snapshot_failed("Capture was abandoned by the map")),
            Ok(Ok(Err(e))) => Err(MapError::snapshot_failed(e.to_string())),
            Ok(Ok(Ok(image))) => {
                tokio::task::spawn_blocking(move || encode_snapshot(&image, format, quality))
                    .await
                    .map_err(|e| MapError::internal(format!("Snapshot encode task failed: {e}")))
                    .and_then(|encoded| encoded)
            }
        };

        BridgeMetrics::global().record_snapshot(started.elapsed().as_secs_f64(), result.is_ok());
        debug!(
            "Snapshot of map {} finished in {:?} (ok: {})",
            self.map_id,
            started.elapsed(),
            result.is_ok()
        );
        result
    }

    /// Forward a host lifecycle hook; `OnDestroy` destroys the session
    pub async fn lifecycle(&self, event: LifecycleEvent) -> BridgeResult<()> {
        self.run(move |s| s.lifecycle(event)).await
    }

    /// Idempotent; an already stopped actor counts as destroyed
    pub async fn destroy(&self) -> BridgeResult<()> {
        match self
            .run(|s| {
                s.destroy();
                Ok(())
            })
            .await
        {
            Err(MapError::MapNotReady { .. }) => Ok(()),
            other => other,
        }
    }

    pub async fn overlay_ids(&self, kind: OverlayKind) -> BridgeResult<Vec<String>> {
        self.run(move |s| Ok(s.overlay_ids(kind))).await
    }

    pub async fn marker(&self, id: &str) -> BridgeResult<Option<Marker>> {
        let id = id.to_string();
        self.run(move |s| Ok(s.marker(&id))).await
    }
}
