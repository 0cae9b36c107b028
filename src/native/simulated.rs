//! Headless native map used by the CLI and the test suite
//!
//! Every map created by a [`SimulatedBackend`] records its state behind a
//! [`SimulatedProbe`], which can also inject SDK callbacks into the session.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::{Rgba, RgbaImage};
use tokio::sync::oneshot;
use tracing::debug;

use super::{
    CircleOptions, GroundOverlayOptions, LifecycleEvent, MapBackend, MarkerIcon, MarkerOptions,
    NativeEvent, NativeEventSink, NativeId, NativeMap, PolygonOptions, PolylineOptions,
    REASON_GESTURE, ReadySignal, SnapshotReceiver,
};
use crate::errors::NativeError;
use crate::models::{
    CameraPosition, LatLng, LatLngBounds, MapConfig, MapType, OverlayKind, Padding, ScreenRect,
};
use crate::services::clustering::{RenderedCluster, SingletonMarker};

/// Largest edge of a simulated snapshot
const MAX_SNAPSHOT_EDGE: u32 = 256;
const MAX_VISIBLE_LAT: f64 = 85.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadyBehaviour {
    /// Fire the ready signal during creation
    #[default]
    Immediate,
    /// Wait for [`SimulatedProbe::fire_ready`]
    Manual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotBehaviour {
    /// Capture a solid image the size of the frame
    #[default]
    Image,
    /// Report a capture failure
    Fail,
    /// Never complete the capture
    Never,
}

/// Native state of one attached overlay
#[derive(Debug, Clone, PartialEq)]
pub enum AttachedOverlay {
    Marker(MarkerOptions),
    Polygon(PolygonOptions),
    Circle(CircleOptions),
    Polyline(PolylineOptions),
    GroundOverlay(GroundOverlayOptions),
}

impl AttachedOverlay {
    pub fn kind(&self) -> OverlayKind {
        match self {
            AttachedOverlay::Marker(_) => OverlayKind::Marker,
            AttachedOverlay::Polygon(_) => OverlayKind::Polygon,
            AttachedOverlay::Circle(_) => OverlayKind::Circle,
            AttachedOverlay::Polyline(_) => OverlayKind::Polyline,
            AttachedOverlay::GroundOverlay(_) => OverlayKind::GroundOverlay,
        }
    }
}

fn id_prefix(kind: OverlayKind) -> &'static str {
    match kind {
        OverlayKind::Marker => "m",
        OverlayKind::Polygon => "pg",
        OverlayKind::Circle => "ci",
        OverlayKind::Polyline => "pl",
        OverlayKind::GroundOverlay => "go",
    }
}

#[derive(Debug)]
struct SimulatedState {
    next_id: u64,
    attached: BTreeMap<NativeId, AttachedOverlay>,
    camera: CameraPosition,
    frame: ScreenRect,
    map_type: MapType,
    indoor_enabled: bool,
    traffic_enabled: bool,
    my_location_enabled: bool,
    padding: Padding,
    clusters: Vec<RenderedCluster>,
    singletons: Vec<SingletonMarker>,
    cluster_renders: usize,
    lifecycle: Vec<LifecycleEvent>,
    destroyed: bool,
    fail_adds_after: Option<usize>,
    adds: usize,
    snapshot: SnapshotBehaviour,
    pending_snapshots: Vec<oneshot::Sender<Result<RgbaImage, NativeError>>>,
}

impl SimulatedState {
    fn new(camera: CameraPosition, frame: ScreenRect, snapshot: SnapshotBehaviour) -> Self {
        Self {
            next_id: 0,
            attached: BTreeMap::new(),
            camera,
            frame,
            map_type: MapType::Normal,
            indoor_enabled: false,
            traffic_enabled: false,
            my_location_enabled: false,
            padding: Padding::default(),
            clusters: Vec::new(),
            singletons: Vec::new(),
            cluster_renders: 0,
            lifecycle: Vec::new(),
            destroyed: false,
            fail_adds_after: None,
            adds: 0,
            snapshot,
            pending_snapshots: Vec::new(),
        }
    }

    fn attach(&mut self, overlay: AttachedOverlay) -> Result<NativeId, NativeError> {
        if self.destroyed {
            return Err(NativeError::new("map view has been destroyed"));
        }
        if let Some(limit) = self.fail_adds_after {
            if self.adds >= limit {
                return Err(NativeError::new(format!(
                    "simulated failure adding {}",
                    overlay.kind()
                )));
            }
        }
        self.adds += 1;
        let id = format!("{}{}", id_prefix(overlay.kind()), self.next_id);
        self.next_id += 1;
        self.attached.insert(id.clone(), overlay);
        Ok(id)
    }

    fn visible_region(&self) -> Option<LatLngBounds> {
        if self.frame.width() <= 0 || self.frame.height() <= 0 {
            return None;
        }
        let degrees_per_px = 360.0 / (256.0 * 2f64.powf(self.camera.zoom));
        let half_lng = self.frame.width() as f64 * degrees_per_px / 2.0;
        let half_lat = self.frame.height() as f64 * degrees_per_px / 2.0;
        let target = self.camera.target;
        Some(LatLngBounds::new(
            LatLng::new(
                (target.lat - half_lat).max(-MAX_VISIBLE_LAT),
                target.lng - half_lng,
            ),
            LatLng::new(
                (target.lat + half_lat).min(MAX_VISIBLE_LAT),
                target.lng + half_lng,
            ),
        ))
    }
}

type SharedState = Arc<Mutex<SimulatedState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, SimulatedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Backend creating [`SimulatedMap`]s
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    ready: ReadyBehaviour,
    snapshot: SnapshotBehaviour,
    probes: Arc<Mutex<HashMap<String, SimulatedProbe>>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ready(mut self, ready: ReadyBehaviour) -> Self {
        self.ready = ready;
        self
    }

    pub fn with_snapshot(mut self, snapshot: SnapshotBehaviour) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Probe for the most recent map created under `map_id`
    pub fn probe(&self, map_id: &str) -> Option<SimulatedProbe> {
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(map_id)
            .cloned()
    }

    /// A map with no session attached, for exercising renderers directly
    pub fn detached_map(&self) -> Box<dyn NativeMap> {
        let frame = ScreenRect {
            left: 0,
            top: 0,
            right: 400,
            bottom: 400,
        };
        Box::new(SimulatedMap {
            state: Arc::new(Mutex::new(SimulatedState::new(
                CameraPosition::new(LatLng::new(0.0, 0.0), 1.0),
                frame,
                self.snapshot,
            ))),
        })
    }
}

impl MapBackend for SimulatedBackend {
    fn create_map(
        &self,
        map_id: &str,
        config: &MapConfig,
        events: NativeEventSink,
        ready: ReadySignal,
    ) -> Result<Box<dyn NativeMap>, NativeError> {
        let frame = config.frame.to_screen(config.device_pixel_ratio);
        let mut state = SimulatedState::new(
            CameraPosition::new(config.center, config.zoom),
            frame,
            self.snapshot,
        );
        state.map_type = config.map_type;
        let state = Arc::new(Mutex::new(state));

        let pending_ready = match self.ready {
            ReadyBehaviour::Immediate => {
                ready.fire();
                events.emit(NativeEvent::MapLoaded);
                None
            }
            ReadyBehaviour::Manual => Some(ready),
        };

        let probe = SimulatedProbe {
            map_id: map_id.to_string(),
            state: state.clone(),
            events,
            ready: Arc::new(Mutex::new(pending_ready)),
        };
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(map_id.to_string(), probe);

        debug!("Created simulated map {} with frame {:?}", map_id, frame);
        Ok(Box::new(SimulatedMap { state }))
    }
}

pub struct SimulatedMap {
    state: SharedState,
}

impl NativeMap for SimulatedMap {
    fn add_marker(&mut self, options: &MarkerOptions) -> Result<NativeId, NativeError> {
        lock(&self.state).attach(AttachedOverlay::Marker(options.clone()))
    }

    fn add_polygon(&mut self, options: &PolygonOptions) -> Result<NativeId, NativeError> {
        lock(&self.state).attach(AttachedOverlay::Polygon(options.clone()))
    }

    fn add_circle(&mut self, options: &CircleOptions) -> Result<NativeId, NativeError> {
        lock(&self.state).attach(AttachedOverlay::Circle(options.clone()))
    }

    fn add_polyline(&mut self, options: &PolylineOptions) -> Result<NativeId, NativeError> {
        lock(&self.state).attach(AttachedOverlay::Polyline(options.clone()))
    }

    fn add_ground_overlay(
        &mut self,
        options: &GroundOverlayOptions,
    ) -> Result<NativeId, NativeError> {
        lock(&self.state).attach(AttachedOverlay::GroundOverlay(options.clone()))
    }

    fn remove(&mut self, kind: OverlayKind, id: &str) {
        let mut state = lock(&self.state);
        if state.attached.get(id).map(AttachedOverlay::kind) == Some(kind) {
            state.attached.remove(id);
        }
    }

    fn set_marker_icon(&mut self, id: &str, icon: &MarkerIcon) -> Result<(), NativeError> {
        match lock(&self.state).attached.get_mut(id) {
            Some(AttachedOverlay::Marker(options)) => {
                options.icon = icon.clone();
                Ok(())
            }
            _ => Err(NativeError::new(format!("no attached marker {id}"))),
        }
    }

    fn camera_position(&self) -> CameraPosition {
        lock(&self.state).camera
    }

    fn move_camera(&mut self, position: CameraPosition, _animate: bool) {
        lock(&self.state).camera = position;
    }

    fn animate_to_bounds(&mut self, bounds: LatLngBounds, padding: i32) {
        let mut state = lock(&self.state);
        let usable_px = (state.frame.width().min(state.frame.height()) - 2 * padding).max(1) as f64;
        let lng_span = (bounds.northeast.lng - bounds.southwest.lng).abs().max(1e-9);
        let lat_span = (bounds.northeast.lat - bounds.southwest.lat).abs().max(1e-9);
        let span = lng_span.max(lat_span);
        let zoom = (usable_px * 360.0 / (256.0 * span)).log2().clamp(0.0, 21.0);
        state.camera = CameraPosition {
            target: bounds.center(),
            zoom,
            ..state.camera
        };
    }

    fn visible_region(&self) -> Option<LatLngBounds> {
        lock(&self.state).visible_region()
    }

    fn render_clusters(&mut self, clusters: &[RenderedCluster], singletons: &[SingletonMarker]) {
        let mut state = lock(&self.state);
        state.clusters = clusters.to_vec();
        state.singletons = singletons.to_vec();
        state.cluster_renders += 1;
    }

    fn snapshot(&mut self) -> SnapshotReceiver {
        let (tx, rx) = oneshot::channel();
        let mut state = lock(&self.state);
        match state.snapshot {
            SnapshotBehaviour::Image => {
                let width = state.frame.width().clamp(1, MAX_SNAPSHOT_EDGE as i32) as u32;
                let height = state.frame.height().clamp(1, MAX_SNAPSHOT_EDGE as i32) as u32;
                let _ = tx.send(Ok(RgbaImage::from_pixel(
                    width,
                    height,
                    Rgba([0xe5, 0xe3, 0xdf, 0xff]),
                )));
            }
            SnapshotBehaviour::Fail => {
                let _ = tx.send(Err(NativeError::new("snapshot returned no bitmap")));
            }
            SnapshotBehaviour::Never => state.pending_snapshots.push(tx),
        }
        rx
    }

    fn map_type(&self) -> MapType {
        lock(&self.state).map_type
    }

    fn set_map_type(&mut self, map_type: MapType) {
        lock(&self.state).map_type = map_type;
    }

    fn set_indoor_enabled(&mut self, enabled: bool) {
        lock(&self.state).indoor_enabled = enabled;
    }

    fn set_traffic_enabled(&mut self, enabled: bool) {
        lock(&self.state).traffic_enabled = enabled;
    }

    fn set_my_location_enabled(&mut self, enabled: bool) -> Result<(), NativeError> {
        lock(&self.state).my_location_enabled = enabled;
        Ok(())
    }

    fn set_padding(&mut self, padding: Padding) {
        lock(&self.state).padding = padding;
    }

    fn set_frame(&mut self, frame: ScreenRect) {
        lock(&self.state).frame = frame;
    }

    fn lifecycle(&mut self, event: LifecycleEvent) {
        lock(&self.state).lifecycle.push(event);
    }

    fn destroy(&mut self) {
        let mut state = lock(&self.state);
        state.attached.clear();
        state.clusters.clear();
        state.singletons.clear();
        state.pending_snapshots.clear();
        state.destroyed = true;
    }
}

/// Test and CLI handle onto a simulated map
#[derive(Debug, Clone)]
pub struct SimulatedProbe {
    map_id: String,
    state: SharedState,
    events: NativeEventSink,
    ready: Arc<Mutex<Option<ReadySignal>>>,
}

impl SimulatedProbe {
    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    /// Fire a pending manual ready signal; false if already fired
    pub fn fire_ready(&self) -> bool {
        let pending = self
            .ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            Some(ready) => {
                ready.fire();
                self.events.emit(NativeEvent::MapLoaded);
                true
            }
            None => false,
        }
    }

    /// Inject an SDK callback
    pub fn emit(&self, event: NativeEvent) -> bool {
        self.events.emit(event)
    }

    /// Simulate a user drag: move the camera and report the gesture callbacks
    pub fn pan_to(&self, position: CameraPosition) {
        lock(&self.state).camera = position;
        self.emit(NativeEvent::CameraMoveStarted {
            reason: REASON_GESTURE,
        });
        self.emit(NativeEvent::CameraMove);
        self.emit(NativeEvent::CameraIdle);
    }

    pub fn attached_ids(&self, kind: OverlayKind) -> Vec<NativeId> {
        lock(&self.state)
            .attached
            .iter()
            .filter(|(_, overlay)| overlay.kind() == kind)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn overlay(&self, id: &str) -> Option<AttachedOverlay> {
        lock(&self.state).attached.get(id).cloned()
    }

    pub fn marker_options(&self, id: &str) -> Option<MarkerOptions> {
        match self.overlay(id) {
            Some(AttachedOverlay::Marker(options)) => Some(options),
            _ => None,
        }
    }

    pub fn camera(&self) -> CameraPosition {
        lock(&self.state).camera
    }

    pub fn rendered_clusters(&self) -> Vec<RenderedCluster> {
        lock(&self.state).clusters.clone()
    }

    pub fn rendered_singletons(&self) -> Vec<String> {
        lock(&self.state)
            .singletons
            .iter()
            .map(|s| s.marker_id.clone())
            .collect()
    }

    pub fn cluster_render_count(&self) -> usize {
        lock(&self.state).cluster_renders
    }

    pub fn map_type(&self) -> MapType {
        lock(&self.state).map_type
    }

    pub fn indoor_enabled(&self) -> bool {
        lock(&self.state).indoor_enabled
    }

    pub fn traffic_enabled(&self) -> bool {
        lock(&self.state).traffic_enabled
    }

    pub fn my_location_enabled(&self) -> bool {
        lock(&self.state).my_location_enabled
    }

    pub fn padding(&self) -> Padding {
        lock(&self.state).padding
    }

    pub fn frame(&self) -> ScreenRect {
        lock(&self.state).frame
    }

    pub fn lifecycle_events(&self) -> Vec<LifecycleEvent> {
        lock(&self.state).lifecycle.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    /// Make every add after the next `successes` fail
    pub fn fail_adds_after(&self, successes: usize) {
        let mut state = lock(&self.state);
        state.fail_adds_after = Some(state.adds + successes);
    }

    pub fn clear_add_failures(&self) {
        lock(&self.state).fail_adds_after = None;
    }
}
