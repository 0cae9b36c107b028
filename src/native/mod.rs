//! Seam between a session and the platform map SDK
//!
//! A [`MapBackend`] creates one [`NativeMap`] per session. The native map is
//! owned and driven exclusively by the session actor, so the trait methods are
//! synchronous; long-running SDK work (snapshots) hands back a receiver.

use image::RgbaImage;
use tokio::sync::oneshot;

use crate::errors::NativeError;
use crate::models::{CameraPosition, LatLngBounds, MapConfig, MapType, OverlayKind, Padding, ScreenRect};
use crate::services::clustering::{RenderedCluster, SingletonMarker};

pub mod events;
pub mod options;
pub mod simulated;

pub use events::{LifecycleEvent, NativeEvent, NativeEventSink, REASON_GESTURE, ReadySignal};
pub use options::{
    CircleOptions, GroundOverlayOptions, MarkerIcon, MarkerOptions, OverlayImage, PolygonOptions,
    PolylineOptions, SpanOptions,
};
pub use simulated::{ReadyBehaviour, SimulatedBackend, SimulatedProbe, SnapshotBehaviour};

/// Identifier the SDK assigns to a live overlay handle
pub type NativeId = String;

/// Completion of an in-flight snapshot capture
pub type SnapshotReceiver = oneshot::Receiver<Result<RgbaImage, NativeError>>;

pub trait NativeMap: Send {
    fn add_marker(&mut self, options: &MarkerOptions) -> Result<NativeId, NativeError>;
    fn add_polygon(&mut self, options: &PolygonOptions) -> Result<NativeId, NativeError>;
    fn add_circle(&mut self, options: &CircleOptions) -> Result<NativeId, NativeError>;
    fn add_polyline(&mut self, options: &PolylineOptions) -> Result<NativeId, NativeError>;
    fn add_ground_overlay(
        &mut self,
        options: &GroundOverlayOptions,
    ) -> Result<NativeId, NativeError>;

    /// Detach and release a live handle; unknown ids are ignored
    fn remove(&mut self, kind: OverlayKind, id: &str);

    fn set_marker_icon(&mut self, id: &str, icon: &MarkerIcon) -> Result<(), NativeError>;

    fn camera_position(&self) -> CameraPosition;
    fn move_camera(&mut self, position: CameraPosition, animate: bool);
    fn animate_to_bounds(&mut self, bounds: LatLngBounds, padding: i32);

    /// `None` until the view has been laid out
    fn visible_region(&self) -> Option<LatLngBounds>;

    /// Replace whatever the cluster renderer currently draws
    fn render_clusters(&mut self, clusters: &[RenderedCluster], singletons: &[SingletonMarker]);

    fn snapshot(&mut self) -> SnapshotReceiver;

    fn map_type(&self) -> MapType;
    fn set_map_type(&mut self, map_type: MapType);
    fn set_indoor_enabled(&mut self, enabled: bool);
    fn set_traffic_enabled(&mut self, enabled: bool);
    fn set_my_location_enabled(&mut self, enabled: bool) -> Result<(), NativeError>;
    fn set_padding(&mut self, padding: Padding);
    fn set_frame(&mut self, frame: ScreenRect);

    fn lifecycle(&mut self, event: LifecycleEvent);

    /// Tear down the view and release every handle
    fn destroy(&mut self);
}

pub trait MapBackend: Send + Sync {
    /// Create the native view; `ready` must be fired exactly once when the map is usable
    fn create_map(
        &self,
        map_id: &str,
        config: &MapConfig,
        events: NativeEventSink,
        ready: ReadySignal,
    ) -> Result<Box<dyn NativeMap>, NativeError>;
}
