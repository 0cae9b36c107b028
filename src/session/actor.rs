//! The per-session actor
//!
//! One tokio task owns the native map, every registry and the clustering
//! coordinator. Host commands arrive as boxed jobs, SDK callbacks as
//! [`NativeEvent`]s, and debounce timers as recluster generations; the loop
//! handles one of them at a time, so there is never more than one mutation
//! in flight.

use std::sync::Arc;

use futures::future::BoxFuture;
use image::RgbaImage;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::SessionState;
use super::handle::MapSessionHandle;
use crate::config::{IconCacheScope, SessionConfig};
use crate::errors::{BridgeResult, MapError, NativeError};
use crate::models::{
    CameraConfig, CameraPosition, Circle, EventName, EventPayload, FrameRect, GroundOverlay,
    LatLngBounds, MapConfig, MapEvent, MapType, Marker, OverlayKind, Padding, Polygon, Polyline,
    ScreenRect,
};
use crate::native::{
    LifecycleEvent, MapBackend, NativeEvent, NativeEventSink, NativeId, NativeMap, ReadySignal,
};
use crate::services::{
    ClusterCoordinator, Debouncer, EntityBuilder, EventNotifier, IconCache, MarkerHandle,
    OverlayRegistry,
};

/// Unit of work executed on the actor with exclusive access to the session
pub(crate) type Job = Box<dyn for<'a> FnOnce(&'a mut MapSession) -> BoxFuture<'a, ()> + Send>;

/// Pin the higher-ranked signature so closures can borrow the session in their future
pub(crate) fn job<F>(f: F) -> Job
where
    F: for<'a> FnOnce(&'a mut MapSession) -> BoxFuture<'a, ()> + Send + 'static,
{
    Box::new(f)
}

/// Borrow the native map if the session is ready for mutation
pub(super) fn ready_native<'a>(
    state: SessionState,
    native: &'a mut Option<Box<dyn NativeMap>>,
    map_id: &str,
) -> BridgeResult<&'a mut dyn NativeMap> {
    match (state, native.as_deref_mut()) {
        (SessionState::Ready, Some(native)) => Ok(native),
        _ => Err(MapError::map_not_ready(map_id)),
    }
}

/// Everything a single map session owns
pub struct MapSession {
    pub(super) map_id: String,
    pub(super) config: MapConfig,
    pub(super) session_config: SessionConfig,
    pub(super) native: Option<Box<dyn NativeMap>>,
    pub(super) state: SessionState,
    state_tx: watch::Sender<SessionState>,
    pub(super) markers: OverlayRegistry<Marker, MarkerHandle>,
    pub(super) polygons: OverlayRegistry<Polygon, NativeId>,
    pub(super) circles: OverlayRegistry<Circle, NativeId>,
    pub(super) polylines: OverlayRegistry<Polyline, NativeId>,
    pub(super) ground_overlays: OverlayRegistry<GroundOverlay, NativeId>,
    pub(super) clustering: Option<ClusterCoordinator>,
    pub(super) debouncer: Debouncer,
    pub(super) recluster_tx: mpsc::UnboundedSender<u64>,
    pub(super) last_zoom: Option<f64>,
    pub(super) builder: EntityBuilder,
    cache_scope: IconCacheScope,
    notifier: Arc<dyn EventNotifier>,
}

/// Collaborators a new session is wired to
pub struct SessionDeps {
    pub session_config: SessionConfig,
    pub icon_cache: Arc<IconCache>,
    pub cache_scope: IconCacheScope,
    pub notifier: Arc<dyn EventNotifier>,
}

/// Request a native map from `backend` and start the session actor
///
/// The returned handle is usable immediately; the session stays
/// `Initializing` until the backend fires its ready signal.
pub fn spawn_session(
    map_id: String,
    config: MapConfig,
    backend: &dyn MapBackend,
    deps: SessionDeps,
) -> BridgeResult<MapSessionHandle> {
    let (state_tx, state_rx) = watch::channel(SessionState::Uninitialized);
    let (sink, native_events) = NativeEventSink::channel();
    let (ready, ready_rx) = ReadySignal::channel();

    let native = backend.create_map(&map_id, &config, sink, ready)?;
    state_tx.send_replace(SessionState::Initializing);

    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
    let (recluster_tx, recluster_rx) = mpsc::unbounded_channel();
    let builder = EntityBuilder::new(deps.icon_cache.clone(), config.device_pixel_ratio);

    let session = MapSession {
        map_id: map_id.clone(),
        config,
        session_config: deps.session_config.clone(),
        native: Some(native),
        state: SessionState::Initializing,
        state_tx,
        markers: OverlayRegistry::new(OverlayKind::Marker),
        polygons: OverlayRegistry::new(OverlayKind::Polygon),
        circles: OverlayRegistry::new(OverlayKind::Circle),
        polylines: OverlayRegistry::new(OverlayKind::Polyline),
        ground_overlays: OverlayRegistry::new(OverlayKind::GroundOverlay),
        clustering: None,
        debouncer: Debouncer::new(deps.session_config.recluster_debounce),
        recluster_tx,
        last_zoom: None,
        builder,
        cache_scope: deps.cache_scope,
        notifier: deps.notifier,
    };

    info!("Starting map session {}", map_id);
    tokio::spawn(session.run(jobs_rx, native_events, recluster_rx, ready_rx));

    Ok(MapSessionHandle::new(
        map_id,
        jobs_tx,
        state_rx,
        Arc::new(deps.session_config),
        deps.icon_cache,
    ))
}

async fn ready_signal(rx: &mut Option<oneshot::Receiver<()>>) -> Result<(), oneshot::error::RecvError> {
    match rx {
        Some(rx) => rx.await,
        None => std::future::pending().await,
    }
}

impl MapSession {
    async fn run(
        mut self,
        mut jobs: mpsc::UnboundedReceiver<Job>,
        mut native_events: mpsc::UnboundedReceiver<NativeEvent>,
        mut recluster_rx: mpsc::UnboundedReceiver<u64>,
        ready_rx: oneshot::Receiver<()>,
    ) {
        let mut ready_rx = Some(ready_rx);

        loop {
            tokio::select! {
                biased;

                signal = ready_signal(&mut ready_rx) => {
                    ready_rx = None;
                    match signal {
                        Ok(()) => self.on_ready(),
                        Err(_) => warn!("Map {} was dropped by the SDK before becoming ready", self.map_id),
                    }
                }

                job = jobs.recv() => match job {
                    Some(job) => job(&mut self).await,
                    None => break,
                },

                Some(event) = native_events.recv() => self.handle_native_event(event),

                Some(generation) = recluster_rx.recv() => self.on_recluster_timer(generation),
            }
        }

        if self.state != SessionState::Destroyed {
            self.destroy();
        }
        debug!("Map session {} actor stopped", self.map_id);
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn on_ready(&mut self) {
        if self.state != SessionState::Initializing {
            return;
        }
        self.set_state(SessionState::Ready);
        info!("Map {} is ready", self.map_id);
        self.notify(MapEvent::bare(EventName::OnMapReady, self.map_id.clone()));
    }

    pub(super) fn notify(&self, event: MapEvent) {
        self.notifier.notify(event);
    }

    pub(super) fn event(&self, name: EventName, payload: EventPayload) -> MapEvent {
        MapEvent::new(name, self.map_id.clone(), payload)
    }

    pub(super) fn native(&mut self) -> BridgeResult<&mut dyn NativeMap> {
        ready_native(self.state, &mut self.native, &self.map_id)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Clear every registry, release the native view and, for per-session caches, the icons
    pub fn destroy(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        self.debouncer.cancel();
        self.clustering = None;

        let released = self.markers.drain().len()
            + self.polygons.drain().len()
            + self.circles.drain().len()
            + self.polylines.drain().len()
            + self.ground_overlays.drain().len();

        if let Some(mut native) = self.native.take() {
            native.destroy();
        }
        if self.cache_scope == IconCacheScope::PerSession {
            self.builder.icon_cache().clear();
        }

        self.set_state(SessionState::Destroyed);
        info!("Destroyed map {} ({} overlays released)", self.map_id, released);
    }

    /// Forward a host lifecycle hook; `OnDestroy` also destroys the session
    pub fn lifecycle(&mut self, event: LifecycleEvent) -> BridgeResult<()> {
        if event == LifecycleEvent::OnDestroy {
            if let Some(native) = self.native.as_deref_mut() {
                native.lifecycle(event);
            }
            self.destroy();
            return Ok(());
        }
        match self.native.as_deref_mut() {
            Some(native) => {
                native.lifecycle(event);
                Ok(())
            }
            None => Err(MapError::map_not_ready(&self.map_id)),
        }
    }

    pub fn camera(&mut self) -> BridgeResult<CameraPosition> {
        Ok(self.native()?.camera_position())
    }

    /// Merge `config` onto the current camera and move there
    pub fn set_camera(&mut self, config: &CameraConfig) -> BridgeResult<()> {
        let native = self.native()?;
        let target = config.resolve(&native.camera_position())?;
        native.move_camera(target, config.animate());
        debug!("Camera moved to {:?} (animate: {})", target, config.animate());
        Ok(())
    }

    pub fn zoom_level(&mut self) -> BridgeResult<f64> {
        Ok(self.native()?.camera_position().zoom)
    }

    /// Visible region, or `BoundsNotFound` before layout
    pub fn lat_lng_bounds(&mut self) -> BridgeResult<LatLngBounds> {
        let map_id = self.map_id.clone();
        self.native()?
            .visible_region()
            .ok_or_else(|| MapError::bounds_not_found(map_id))
    }

    pub fn fit_bounds(&mut self, bounds: LatLngBounds, padding: i32) -> BridgeResult<()> {
        self.native()?.animate_to_bounds(bounds, padding);
        Ok(())
    }

    /// Map frame scaled to device pixels
    pub fn map_bounds(&mut self) -> BridgeResult<ScreenRect> {
        self.native()?;
        Ok(self.config.frame.to_screen(self.config.device_pixel_ratio))
    }

    pub fn update_render(&mut self, frame: FrameRect) -> BridgeResult<()> {
        let screen = frame.to_screen(self.config.device_pixel_ratio);
        self.native()?.set_frame(screen);
        self.config.frame = frame;
        Ok(())
    }

    pub fn map_type(&mut self) -> BridgeResult<MapType> {
        Ok(self.native()?.map_type())
    }

    pub fn set_map_type(&mut self, map_type: &str) -> BridgeResult<()> {
        let map_type = MapType::parse_lenient(map_type);
        self.native()?.set_map_type(map_type);
        self.config.map_type = map_type;
        Ok(())
    }

    pub fn enable_indoor_maps(&mut self, enabled: bool) -> BridgeResult<()> {
        self.native()?.set_indoor_enabled(enabled);
        Ok(())
    }

    pub fn enable_traffic_layer(&mut self, enabled: bool) -> BridgeResult<()> {
        self.native()?.set_traffic_enabled(enabled);
        Ok(())
    }

    pub fn enable_current_location(&mut self, enabled: bool) -> BridgeResult<()> {
        self.native()?.set_my_location_enabled(enabled)?;
        Ok(())
    }

    pub fn set_padding(&mut self, padding: Padding) -> BridgeResult<()> {
        self.native()?.set_padding(padding);
        Ok(())
    }

    /// Start a native capture; the caller awaits the receiver outside the actor
    pub fn start_snapshot(
        &mut self,
    ) -> BridgeResult<oneshot::Receiver<Result<RgbaImage, NativeError>>> {
        Ok(self.native()?.snapshot())
    }
}
